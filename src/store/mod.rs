//! Per-tenant report store behind a narrow interface.
//!
//! The summary updater and the HTTP handlers depend on [`ReportStore`] only;
//! the SQLite implementation lives in [`sqlite`] and an in-memory mock for
//! tests in [`mock`]. Tenant routing itself is external: every operation
//! takes the tenant schema name and scopes its rows with it.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::CostEntryBill;

pub mod migrations;
pub mod mock;
pub mod sqlite;

pub use migrations::init_db;
pub use mock::MemoryStore;
pub use sqlite::SqliteStore;

/// Error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error("malformed stored value: {0}")]
    Corrupt(String),
}

/// Accessor for bills, cost models, and summary tables of one tenant store.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Bills for a provider whose billing period covers `period_date`
    /// (matched on the first day of that calendar month), ordered by id.
    async fn bills_for_provider(
        &self,
        schema: &str,
        provider_uuid: Uuid,
        period_date: NaiveDate,
    ) -> Result<Vec<CostEntryBill>, StoreError>;

    /// Markup percentage configured for the provider's cost model; zero when
    /// no cost model exists.
    async fn markup_for(&self, schema: &str, provider_uuid: Uuid) -> Result<Decimal, StoreError>;

    /// Whether the bill needs a full-month re-summary instead of the
    /// requested incremental range.
    async fn full_month_resummary_needed(
        &self,
        schema: &str,
        bill: &CostEntryBill,
    ) -> Result<bool, StoreError>;

    /// Delete daily summary rows for the provider in the inclusive range.
    async fn delete_daily_summaries(
        &self,
        schema: &str,
        provider_uuid: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<u64, StoreError>;

    /// Regenerate daily summary rows from raw line items for the inclusive
    /// range, applying the fractional markup multiplier. Returns the number
    /// of rows written.
    async fn populate_daily_summaries(
        &self,
        schema: &str,
        provider_uuid: Uuid,
        bill_id: i64,
        start_date: NaiveDate,
        end_date: NaiveDate,
        markup: Decimal,
    ) -> Result<u64, StoreError>;

    /// Register tag keys seen on line items in the range as enabled keys.
    async fn populate_enabled_tag_keys(
        &self,
        schema: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        bill_ids: &[i64],
    ) -> Result<(), StoreError>;

    /// Rebuild the per-bill tag summary (key -> distinct values).
    async fn populate_tag_summaries(
        &self,
        schema: &str,
        bill_ids: &[i64],
    ) -> Result<(), StoreError>;

    /// Strip disabled tag keys from summary rows in the range.
    async fn apply_enabled_tags(
        &self,
        schema: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        bill_ids: &[i64],
    ) -> Result<(), StoreError>;

    /// Persist the bill's summary timestamps.
    async fn save_bill_timestamps(
        &self,
        schema: &str,
        bill: &CostEntryBill,
    ) -> Result<(), StoreError>;

    /// Enabled tag keys for the tenant, sorted, without the `tag:` prefix.
    async fn enabled_tag_keys(&self, schema: &str) -> Result<Vec<String>, StoreError>;
}
