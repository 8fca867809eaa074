//! Billing-period types.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata describing one ingested billing period for a provider.
///
/// Supplied by the ingestion pipeline; read-only here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingManifest {
    pub billing_period_start: NaiveDate,
}

impl BillingManifest {
    pub fn new(billing_period_start: NaiveDate) -> Self {
        BillingManifest {
            billing_period_start,
        }
    }
}

/// One provider bill for one calendar billing period.
///
/// The summary timestamps record when summary rows were first created and
/// last refreshed for this bill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostEntryBill {
    pub id: i64,
    pub provider_uuid: Uuid,
    pub billing_period_start: NaiveDate,
    pub summary_data_creation_datetime: Option<DateTime<Utc>>,
    pub summary_data_updated_datetime: Option<DateTime<Utc>>,
}

impl CostEntryBill {
    /// A bill that has never had summary data created for it.
    pub fn new(id: i64, provider_uuid: Uuid, billing_period_start: NaiveDate) -> Self {
        CostEntryBill {
            id,
            provider_uuid,
            billing_period_start,
            summary_data_creation_datetime: None,
            summary_data_updated_datetime: None,
        }
    }
}

/// One day of aggregated cost for a provider, with markup applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySummaryRow {
    pub provider_uuid: Uuid,
    pub bill_id: i64,
    pub usage_date: NaiveDate,
    pub cost: Decimal,
    pub markup_cost: Decimal,
    /// Tag key/value pairs merged from the day's line items.
    pub tags: serde_json::Map<String, serde_json::Value>,
}
