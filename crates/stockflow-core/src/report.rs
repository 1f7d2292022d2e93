//! # Document Reports
//!
//! Read-only views handed to the report (PDF) collaborator and the metrics
//! dashboard. They are assembled by the db crate and only serialized here.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::lifecycle::{discounted_unit_price, total_out_of_range, DocumentTotals};
use crate::money::Money;
use crate::types::{CommercialDocument, DiscountRate, LineItem};
use crate::validation::ValidationResult;

/// One printable line of a document.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReportLine {
    pub line_no: i64,
    pub product_id: Option<String>,
    /// `None` when the product was deleted.
    pub product_title: Option<String>,
    pub quantity: i64,
    pub unit_price: Money,
    pub discounted_unit_price: Money,
    /// quantity × unit price, before discount.
    pub line_total: Money,
}

impl ReportLine {
    pub fn from_item(
        item: &LineItem,
        product_title: Option<String>,
        discount: DiscountRate,
    ) -> ValidationResult<Self> {
        let line_total = item.line_total().ok_or_else(total_out_of_range)?;
        Ok(Self {
            line_no: item.line_no,
            product_id: item.product_id.clone(),
            product_title,
            quantity: item.quantity,
            unit_price: item.unit_price(),
            discounted_unit_price: discounted_unit_price(item.unit_price(), discount),
            line_total,
        })
    }
}

/// A document with its lines and totals.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DocumentReport {
    pub document: CommercialDocument,
    pub lines: Vec<ReportLine>,
    pub totals: DocumentTotals,
}

/// Sales figures over stock-committed orders of one tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SalesSummary {
    pub committed_documents: i64,
    /// Σ document totals (after discount).
    pub sales_value: Money,
    /// Σ quantity × purchase price snapshot.
    pub sales_cost: Money,
    /// sales value − sales cost.
    pub profit: Money,
    pub units_sold: i64,
}

/// Value of the stock currently on hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InventoryValuation {
    pub product_count: i64,
    pub total_quantity: i64,
    /// Σ quantity × cost price.
    pub cost_value: Money,
    /// Σ quantity × selling price.
    pub selling_value: Money,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_report_line_from_item() {
        let item = LineItem {
            id: "i1".to_string(),
            document_id: "d1".to_string(),
            line_no: 1,
            product_id: Some("p1".to_string()),
            quantity: 3,
            unit_price_cents: 2000,
            purchase_price_cents: 1000,
            created_at: Utc::now(),
        };
        let line = ReportLine::from_item(&item, Some("Pen".to_string()), DiscountRate::from_bps(1000))
            .unwrap();
        assert_eq!(line.line_total.cents(), 6000);
        assert_eq!(line.discounted_unit_price.cents(), 1800);
        assert_eq!(line.product_title.as_deref(), Some("Pen"));

        let oversized = LineItem {
            quantity: i64::MAX,
            ..item
        };
        assert!(ReportLine::from_item(&oversized, None, DiscountRate::zero()).is_err());
    }
}
