//! Per-provider summary table updater.
//!
//! Given a tenant schema, a provider, and an optional billing manifest, the
//! updater resolves the effective date range for re-aggregation and drives
//! the delete + repopulate cycle for daily summary rows. Re-running with the
//! same range reproduces the same rows, so re-invocation is the recovery path
//! after a partial failure. Concurrent-invocation exclusivity per
//! (schema, provider, billing period) belongs to the invoking scheduler.

use chrono::{DateTime, NaiveDate};
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::dates::{month_end, DateReference};
use crate::domain::{BillingManifest, Provider};
use crate::store::{ReportStore, StoreError};

/// A date bound supplied either as a typed date or as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateArg {
    Date(NaiveDate),
    Text(String),
}

impl DateArg {
    fn resolve(&self) -> Result<NaiveDate, SummaryError> {
        match self {
            DateArg::Date(date) => Ok(*date),
            DateArg::Text(text) => text
                .parse::<NaiveDate>()
                .or_else(|_| {
                    // Datetime strings are accepted; only the date part matters.
                    DateTime::parse_from_rfc3339(text).map(|dt| dt.date_naive())
                })
                .map_err(|_| SummaryError::InvalidDate(text.clone())),
        }
    }
}

impl From<NaiveDate> for DateArg {
    fn from(date: NaiveDate) -> Self {
        DateArg::Date(date)
    }
}

impl From<&str> for DateArg {
    fn from(text: &str) -> Self {
        DateArg::Text(text.to_string())
    }
}

impl From<String> for DateArg {
    fn from(text: String) -> Self {
        DateArg::Text(text)
    }
}

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid date bound: {0}")]
    InvalidDate(String),
}

/// Terminal outcome of a summary update run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryOutcome {
    Updated {
        start_date: NaiveDate,
        end_date: NaiveDate,
        rows: u64,
    },
    /// No bill exists for the resolved start date; nothing to do.
    NoBill {
        start_date: NaiveDate,
        end_date: NaiveDate,
    },
}

pub struct SummaryUpdater {
    schema: String,
    provider: Provider,
    manifest: Option<BillingManifest>,
    store: Arc<dyn ReportStore>,
    dates: Arc<dyn DateReference>,
}

impl SummaryUpdater {
    pub fn new(
        schema: String,
        provider: Provider,
        manifest: Option<BillingManifest>,
        store: Arc<dyn ReportStore>,
        dates: Arc<dyn DateReference>,
    ) -> Self {
        SummaryUpdater {
            schema,
            provider,
            manifest,
            store,
            dates,
        }
    }

    /// Resolve the effective date range for re-aggregation.
    ///
    /// When the manifest's billing period has a bill that needs a full-month
    /// re-summary, the range is overridden to span the whole calendar month
    /// of the billing period start; otherwise the supplied bounds are kept.
    async fn effective_range(
        &self,
        start_date: DateArg,
        end_date: DateArg,
    ) -> Result<(NaiveDate, NaiveDate), SummaryError> {
        let mut start_date = start_date.resolve()?;
        let mut end_date = end_date.resolve()?;

        if let Some(manifest) = &self.manifest {
            let bill_date = manifest.billing_period_start;
            let bills = self
                .store
                .bills_for_provider(&self.schema, self.provider.uuid, bill_date)
                .await?;
            if let Some(first_bill) = bills.first() {
                if self
                    .store
                    .full_month_resummary_needed(&self.schema, first_bill)
                    .await?
                {
                    start_date = bill_date;
                    end_date = month_end(bill_date);
                    info!(
                        schema = %self.schema,
                        provider = %self.provider.uuid,
                        "Overriding start and end date to process full month."
                    );
                }
            }
        }

        Ok((start_date, end_date))
    }

    /// Resolve and return the effective date range only.
    pub async fn update_daily_tables(
        &self,
        start_date: impl Into<DateArg>,
        end_date: impl Into<DateArg>,
    ) -> Result<(NaiveDate, NaiveDate), SummaryError> {
        let (start_date, end_date) = self
            .effective_range(start_date.into(), end_date.into())
            .await?;
        info!("update_daily_tables for: {}-{}", start_date, end_date);
        Ok((start_date, end_date))
    }

    /// Delete and regenerate daily summary rows for the effective range,
    /// propagate tags, and stamp bill summary timestamps.
    pub async fn update_summary_tables(
        &self,
        start_date: impl Into<DateArg>,
        end_date: impl Into<DateArg>,
    ) -> Result<SummaryOutcome, SummaryError> {
        let (start_date, end_date) = self
            .effective_range(start_date.into(), end_date.into())
            .await?;

        let markup_percent = self
            .store
            .markup_for(&self.schema, self.provider.uuid)
            .await?;
        let markup = markup_percent / Decimal::ONE_HUNDRED;

        let bills = self
            .store
            .bills_for_provider(&self.schema, self.provider.uuid, start_date)
            .await?;
        let Some(current_bill) = bills.first() else {
            info!(
                "No bill was found for {}. Skipping summarization",
                start_date
            );
            return Ok(SummaryOutcome::NoBill {
                start_date,
                end_date,
            });
        };
        let bill_ids: Vec<i64> = bills.iter().map(|bill| bill.id).collect();

        info!(
            schema = %self.schema,
            provider = %self.provider.uuid,
            %start_date,
            %end_date,
            "Updating report summary tables"
        );

        self.store
            .delete_daily_summaries(&self.schema, self.provider.uuid, start_date, end_date)
            .await?;
        let rows = self
            .store
            .populate_daily_summaries(
                &self.schema,
                self.provider.uuid,
                current_bill.id,
                start_date,
                end_date,
                markup,
            )
            .await?;
        self.store
            .populate_enabled_tag_keys(&self.schema, start_date, end_date, &bill_ids)
            .await?;
        self.store
            .populate_tag_summaries(&self.schema, &bill_ids)
            .await?;
        self.store
            .apply_enabled_tags(&self.schema, start_date, end_date, &bill_ids)
            .await?;

        let now = self.dates.now_utc();
        for bill in &bills {
            let mut bill = bill.clone();
            if bill.summary_data_creation_datetime.is_none() {
                bill.summary_data_creation_datetime = Some(now);
            }
            bill.summary_data_updated_datetime = Some(now);
            self.store
                .save_bill_timestamps(&self.schema, &bill)
                .await?;
        }

        Ok(SummaryOutcome::Updated {
            start_date,
            end_date,
            rows,
        })
    }
}
