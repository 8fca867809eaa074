//! In-memory report store for tests.
//!
//! Seeded through builder methods and records the delete/populate/save calls
//! it receives so orchestration tests can assert on the sequence.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use uuid::Uuid;

use crate::dates::month_start;
use crate::domain::CostEntryBill;

use super::{ReportStore, StoreError};

#[derive(Debug, Default)]
struct Inner {
    bills: Vec<CostEntryBill>,
    markup: BTreeMap<Uuid, Decimal>,
    enabled_keys: BTreeSet<String>,
    populated_rows: u64,
    deletes: Vec<(NaiveDate, NaiveDate)>,
    populates: Vec<(i64, NaiveDate, NaiveDate, Decimal)>,
    saved_bills: Vec<CostEntryBill>,
    tag_population_calls: usize,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bill(self, bill: CostEntryBill) -> Self {
        self.inner.lock().expect("store lock").bills.push(bill);
        self
    }

    pub fn with_markup(self, provider_uuid: Uuid, markup: Decimal) -> Self {
        self.inner
            .lock()
            .expect("store lock")
            .markup
            .insert(provider_uuid, markup);
        self
    }

    pub fn with_enabled_tag_key(self, key: &str) -> Self {
        self.inner
            .lock()
            .expect("store lock")
            .enabled_keys
            .insert(key.to_string());
        self
    }

    /// Row count reported by `populate_daily_summaries`.
    pub fn with_populated_rows(self, rows: u64) -> Self {
        self.inner.lock().expect("store lock").populated_rows = rows;
        self
    }

    pub fn deletes(&self) -> Vec<(NaiveDate, NaiveDate)> {
        self.inner.lock().expect("store lock").deletes.clone()
    }

    pub fn populates(&self) -> Vec<(i64, NaiveDate, NaiveDate, Decimal)> {
        self.inner.lock().expect("store lock").populates.clone()
    }

    pub fn saved_bills(&self) -> Vec<CostEntryBill> {
        self.inner.lock().expect("store lock").saved_bills.clone()
    }

    pub fn tag_population_calls(&self) -> usize {
        self.inner.lock().expect("store lock").tag_population_calls
    }
}

#[async_trait]
impl ReportStore for MemoryStore {
    async fn bills_for_provider(
        &self,
        _schema: &str,
        provider_uuid: Uuid,
        period_date: NaiveDate,
    ) -> Result<Vec<CostEntryBill>, StoreError> {
        let period = month_start(period_date);
        let inner = self.inner.lock().expect("store lock");
        Ok(inner
            .bills
            .iter()
            .filter(|bill| {
                bill.provider_uuid == provider_uuid && bill.billing_period_start == period
            })
            .cloned()
            .collect())
    }

    async fn markup_for(&self, _schema: &str, provider_uuid: Uuid) -> Result<Decimal, StoreError> {
        let inner = self.inner.lock().expect("store lock");
        Ok(inner
            .markup
            .get(&provider_uuid)
            .copied()
            .unwrap_or(Decimal::ZERO))
    }

    async fn full_month_resummary_needed(
        &self,
        _schema: &str,
        bill: &CostEntryBill,
    ) -> Result<bool, StoreError> {
        Ok(bill.summary_data_creation_datetime.is_none())
    }

    async fn delete_daily_summaries(
        &self,
        _schema: &str,
        _provider_uuid: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().expect("store lock");
        inner.deletes.push((start_date, end_date));
        Ok(0)
    }

    async fn populate_daily_summaries(
        &self,
        _schema: &str,
        _provider_uuid: Uuid,
        bill_id: i64,
        start_date: NaiveDate,
        end_date: NaiveDate,
        markup: Decimal,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().expect("store lock");
        inner.populates.push((bill_id, start_date, end_date, markup));
        Ok(inner.populated_rows)
    }

    async fn populate_enabled_tag_keys(
        &self,
        _schema: &str,
        _start_date: NaiveDate,
        _end_date: NaiveDate,
        _bill_ids: &[i64],
    ) -> Result<(), StoreError> {
        self.inner.lock().expect("store lock").tag_population_calls += 1;
        Ok(())
    }

    async fn populate_tag_summaries(
        &self,
        _schema: &str,
        _bill_ids: &[i64],
    ) -> Result<(), StoreError> {
        Ok(())
    }

    async fn apply_enabled_tags(
        &self,
        _schema: &str,
        _start_date: NaiveDate,
        _end_date: NaiveDate,
        _bill_ids: &[i64],
    ) -> Result<(), StoreError> {
        Ok(())
    }

    async fn save_bill_timestamps(
        &self,
        _schema: &str,
        bill: &CostEntryBill,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store lock");
        if let Some(existing) = inner.bills.iter_mut().find(|b| b.id == bill.id) {
            *existing = bill.clone();
        }
        inner.saved_bills.push(bill.clone());
        Ok(())
    }

    async fn enabled_tag_keys(&self, _schema: &str) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.lock().expect("store lock");
        Ok(inner.enabled_keys.iter().cloned().collect())
    }
}
