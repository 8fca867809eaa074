//! SQLite-backed report store.
//!
//! Dates are stored as `YYYY-MM-DD` text, timestamps as RFC 3339 text, and
//! money as canonical decimal strings. Aggregation happens in Rust so decimal
//! precision survives the round trip.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use uuid::Uuid;

use crate::dates::month_start;
use crate::domain::{CostEntryBill, DailySummaryRow};

use super::{ReportStore, StoreError};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteStore { pool }
    }

    /// Insert a bill for a billing period, returning the stored row.
    pub async fn create_bill(
        &self,
        schema: &str,
        provider_uuid: Uuid,
        billing_period_start: NaiveDate,
    ) -> Result<CostEntryBill, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO cost_entry_bills (tenant_schema, provider_uuid, billing_period_start)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(schema)
        .bind(provider_uuid.to_string())
        .bind(fmt_date(billing_period_start))
        .execute(&self.pool)
        .await?;

        Ok(CostEntryBill::new(
            result.last_insert_rowid(),
            provider_uuid,
            billing_period_start,
        ))
    }

    pub async fn bill(&self, schema: &str, id: i64) -> Result<Option<CostEntryBill>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, provider_uuid, billing_period_start,
                   summary_data_creation_datetime, summary_data_updated_datetime
            FROM cost_entry_bills
            WHERE tenant_schema = ? AND id = ?
            "#,
        )
        .bind(schema)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(bill_from_row).transpose()
    }

    pub async fn insert_line_item(
        &self,
        schema: &str,
        provider_uuid: Uuid,
        bill_id: i64,
        usage_date: NaiveDate,
        cost: Decimal,
        tags: &Map<String, Value>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO cost_entry_line_items
                (tenant_schema, provider_uuid, bill_id, usage_date, cost, tags)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(schema)
        .bind(provider_uuid.to_string())
        .bind(bill_id)
        .bind(fmt_date(usage_date))
        .bind(cost.to_string())
        .bind(Value::Object(tags.clone()).to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Set the cost-model markup percentage for a provider.
    pub async fn set_markup(
        &self,
        schema: &str,
        provider_uuid: Uuid,
        markup: Decimal,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO cost_models (tenant_schema, provider_uuid, markup)
            VALUES (?, ?, ?)
            ON CONFLICT (tenant_schema, provider_uuid) DO UPDATE SET markup = excluded.markup
            "#,
        )
        .bind(schema)
        .bind(provider_uuid.to_string())
        .bind(markup.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_tag_key_enabled(
        &self,
        schema: &str,
        key: &str,
        enabled: bool,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO enabled_tag_keys (tenant_schema, key, enabled)
            VALUES (?, ?, ?)
            ON CONFLICT (tenant_schema, key) DO UPDATE SET enabled = excluded.enabled
            "#,
        )
        .bind(schema)
        .bind(key)
        .bind(enabled as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn daily_summaries(
        &self,
        schema: &str,
        provider_uuid: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<DailySummaryRow>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT provider_uuid, bill_id, usage_date, cost, markup_cost, tags
            FROM daily_summary
            WHERE tenant_schema = ? AND provider_uuid = ?
              AND usage_date >= ? AND usage_date <= ?
            ORDER BY usage_date ASC
            "#,
        )
        .bind(schema)
        .bind(provider_uuid.to_string())
        .bind(fmt_date(start_date))
        .bind(fmt_date(end_date))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(DailySummaryRow {
                    provider_uuid: parse_uuid(row.get("provider_uuid"))?,
                    bill_id: row.get("bill_id"),
                    usage_date: parse_date(row.get("usage_date"))?,
                    cost: parse_decimal(row.get("cost"))?,
                    markup_cost: parse_decimal(row.get("markup_cost"))?,
                    tags: parse_tags(row.get("tags"))?,
                })
            })
            .collect()
    }

    pub async fn tag_summary(
        &self,
        schema: &str,
        bill_id: i64,
    ) -> Result<BTreeMap<String, Vec<String>>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT key, tag_values FROM tag_summary
            WHERE tenant_schema = ? AND bill_id = ?
            ORDER BY key ASC
            "#,
        )
        .bind(schema)
        .bind(bill_id)
        .fetch_all(&self.pool)
        .await?;

        let mut summary = BTreeMap::new();
        for row in rows {
            let key: String = row.get("key");
            let values: Vec<String> = serde_json::from_str(row.get("tag_values"))
                .map_err(|e| StoreError::Corrupt(format!("tag_values: {}", e)))?;
            summary.insert(key, values);
        }
        Ok(summary)
    }

    /// Line items for a provider in the inclusive range: (date, cost, tags).
    async fn line_items_in_range(
        &self,
        schema: &str,
        provider_uuid: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<(NaiveDate, Decimal, Map<String, Value>)>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT usage_date, cost, tags FROM cost_entry_line_items
            WHERE tenant_schema = ? AND provider_uuid = ?
              AND usage_date >= ? AND usage_date <= ?
            ORDER BY usage_date ASC, id ASC
            "#,
        )
        .bind(schema)
        .bind(provider_uuid.to_string())
        .bind(fmt_date(start_date))
        .bind(fmt_date(end_date))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok((
                    parse_date(row.get("usage_date"))?,
                    parse_decimal(row.get("cost"))?,
                    parse_tags(row.get("tags"))?,
                ))
            })
            .collect()
    }

    /// Line-item tags for a set of bills, optionally bounded by usage date.
    async fn tags_for_bills(
        &self,
        schema: &str,
        bill_ids: &[i64],
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<Vec<(i64, Map<String, Value>)>, StoreError> {
        if bill_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; bill_ids.len()].join(", ");
        let mut sql = format!(
            "SELECT bill_id, tags FROM cost_entry_line_items \
             WHERE tenant_schema = ? AND bill_id IN ({})",
            placeholders
        );
        if range.is_some() {
            sql.push_str(" AND usage_date >= ? AND usage_date <= ?");
        }

        let mut query = sqlx::query(&sql).bind(schema);
        for id in bill_ids {
            query = query.bind(id);
        }
        if let Some((start, end)) = range {
            query = query.bind(fmt_date(start)).bind(fmt_date(end));
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|row| Ok((row.get("bill_id"), parse_tags(row.get("tags"))?)))
            .collect()
    }
}

#[async_trait]
impl ReportStore for SqliteStore {
    async fn bills_for_provider(
        &self,
        schema: &str,
        provider_uuid: Uuid,
        period_date: NaiveDate,
    ) -> Result<Vec<CostEntryBill>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, provider_uuid, billing_period_start,
                   summary_data_creation_datetime, summary_data_updated_datetime
            FROM cost_entry_bills
            WHERE tenant_schema = ? AND provider_uuid = ? AND billing_period_start = ?
            ORDER BY id ASC
            "#,
        )
        .bind(schema)
        .bind(provider_uuid.to_string())
        .bind(fmt_date(month_start(period_date)))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(bill_from_row).collect()
    }

    async fn markup_for(&self, schema: &str, provider_uuid: Uuid) -> Result<Decimal, StoreError> {
        let row = sqlx::query(
            "SELECT markup FROM cost_models WHERE tenant_schema = ? AND provider_uuid = ?",
        )
        .bind(schema)
        .bind(provider_uuid.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => parse_decimal(row.get("markup")),
            None => Ok(Decimal::ZERO),
        }
    }

    async fn full_month_resummary_needed(
        &self,
        _schema: &str,
        bill: &CostEntryBill,
    ) -> Result<bool, StoreError> {
        // A bill that has never had summary rows created gets a full-month
        // pass; incremental ranges only make sense after the first pass.
        Ok(bill.summary_data_creation_datetime.is_none())
    }

    async fn delete_daily_summaries(
        &self,
        schema: &str,
        provider_uuid: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM daily_summary
            WHERE tenant_schema = ? AND provider_uuid = ?
              AND usage_date >= ? AND usage_date <= ?
            "#,
        )
        .bind(schema)
        .bind(provider_uuid.to_string())
        .bind(fmt_date(start_date))
        .bind(fmt_date(end_date))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn populate_daily_summaries(
        &self,
        schema: &str,
        provider_uuid: Uuid,
        bill_id: i64,
        start_date: NaiveDate,
        end_date: NaiveDate,
        markup: Decimal,
    ) -> Result<u64, StoreError> {
        let line_items = self
            .line_items_in_range(schema, provider_uuid, start_date, end_date)
            .await?;

        let mut by_day: BTreeMap<NaiveDate, (Decimal, Map<String, Value>)> = BTreeMap::new();
        for (usage_date, cost, tags) in line_items {
            let entry = by_day
                .entry(usage_date)
                .or_insert_with(|| (Decimal::ZERO, Map::new()));
            entry.0 += cost;
            for (key, value) in tags {
                entry.1.insert(key, value);
            }
        }

        let mut written = 0u64;
        for (usage_date, (cost, tags)) in by_day {
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO daily_summary
                    (tenant_schema, provider_uuid, bill_id, usage_date, cost, markup_cost, tags)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(schema)
            .bind(provider_uuid.to_string())
            .bind(bill_id)
            .bind(fmt_date(usage_date))
            .bind(cost.to_string())
            .bind((cost * markup).to_string())
            .bind(Value::Object(tags).to_string())
            .execute(&self.pool)
            .await?;
            written += 1;
        }
        Ok(written)
    }

    async fn populate_enabled_tag_keys(
        &self,
        schema: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        bill_ids: &[i64],
    ) -> Result<(), StoreError> {
        let tags = self
            .tags_for_bills(schema, bill_ids, Some((start_date, end_date)))
            .await?;

        let mut keys = BTreeSet::new();
        for (_, map) in tags {
            keys.extend(map.into_iter().map(|(key, _)| key));
        }

        for key in keys {
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO enabled_tag_keys (tenant_schema, key, enabled)
                VALUES (?, ?, 1)
                "#,
            )
            .bind(schema)
            .bind(key)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn populate_tag_summaries(
        &self,
        schema: &str,
        bill_ids: &[i64],
    ) -> Result<(), StoreError> {
        let tags = self.tags_for_bills(schema, bill_ids, None).await?;

        let mut by_key: BTreeMap<(i64, String), BTreeSet<String>> = BTreeMap::new();
        for (bill_id, map) in tags {
            for (key, value) in map {
                let value = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                by_key.entry((bill_id, key)).or_default().insert(value);
            }
        }

        for ((bill_id, key), values) in by_key {
            let values: Vec<String> = values.into_iter().collect();
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO tag_summary (tenant_schema, bill_id, key, tag_values)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(schema)
            .bind(bill_id)
            .bind(key)
            .bind(serde_json::to_string(&values).unwrap_or_else(|_| "[]".to_string()))
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn apply_enabled_tags(
        &self,
        schema: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        bill_ids: &[i64],
    ) -> Result<(), StoreError> {
        if bill_ids.is_empty() {
            return Ok(());
        }

        let enabled: BTreeSet<String> = self.enabled_tag_keys(schema).await?.into_iter().collect();

        let placeholders = vec!["?"; bill_ids.len()].join(", ");
        let sql = format!(
            "SELECT provider_uuid, usage_date, tags FROM daily_summary \
             WHERE tenant_schema = ? AND bill_id IN ({}) \
               AND usage_date >= ? AND usage_date <= ?",
            placeholders
        );
        let mut query = sqlx::query(&sql).bind(schema);
        for id in bill_ids {
            query = query.bind(id);
        }
        let rows = query
            .bind(fmt_date(start_date))
            .bind(fmt_date(end_date))
            .fetch_all(&self.pool)
            .await?;

        for row in rows {
            let provider_uuid: String = row.get("provider_uuid");
            let usage_date: String = row.get("usage_date");
            let tags = parse_tags(row.get("tags"))?;
            let filtered: Map<String, Value> = tags
                .into_iter()
                .filter(|(key, _)| enabled.contains(key))
                .collect();

            sqlx::query(
                r#"
                UPDATE daily_summary SET tags = ?
                WHERE tenant_schema = ? AND provider_uuid = ? AND usage_date = ?
                "#,
            )
            .bind(Value::Object(filtered).to_string())
            .bind(schema)
            .bind(provider_uuid)
            .bind(usage_date)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn save_bill_timestamps(
        &self,
        schema: &str,
        bill: &CostEntryBill,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE cost_entry_bills
            SET summary_data_creation_datetime = ?, summary_data_updated_datetime = ?
            WHERE tenant_schema = ? AND id = ?
            "#,
        )
        .bind(bill.summary_data_creation_datetime.map(|t| t.to_rfc3339()))
        .bind(bill.summary_data_updated_datetime.map(|t| t.to_rfc3339()))
        .bind(schema)
        .bind(bill.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn enabled_tag_keys(&self, schema: &str) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query(
            "SELECT key FROM enabled_tag_keys WHERE tenant_schema = ? AND enabled = 1 ORDER BY key",
        )
        .bind(schema)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|row| row.get("key")).collect())
    }
}

fn bill_from_row(row: sqlx::sqlite::SqliteRow) -> Result<CostEntryBill, StoreError> {
    Ok(CostEntryBill {
        id: row.get("id"),
        provider_uuid: parse_uuid(row.get("provider_uuid"))?,
        billing_period_start: parse_date(row.get("billing_period_start"))?,
        summary_data_creation_datetime: parse_timestamp(
            row.get("summary_data_creation_datetime"),
        )?,
        summary_data_updated_datetime: parse_timestamp(
            row.get("summary_data_updated_datetime"),
        )?,
    })
}

fn fmt_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_date(text: String) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(&text, "%Y-%m-%d")
        .map_err(|e| StoreError::Corrupt(format!("date {:?}: {}", text, e)))
}

fn parse_decimal(text: String) -> Result<Decimal, StoreError> {
    Decimal::from_str(&text).map_err(|e| StoreError::Corrupt(format!("decimal {:?}: {}", text, e)))
}

fn parse_uuid(text: String) -> Result<Uuid, StoreError> {
    Uuid::from_str(&text).map_err(|e| StoreError::Corrupt(format!("uuid {:?}: {}", text, e)))
}

fn parse_tags(text: String) -> Result<Map<String, Value>, StoreError> {
    match serde_json::from_str(&text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(StoreError::Corrupt(format!("tags not an object: {}", other))),
        Err(e) => Err(StoreError::Corrupt(format!("tags {:?}: {}", text, e))),
    }
}

fn parse_timestamp(text: Option<String>) -> Result<Option<DateTime<Utc>>, StoreError> {
    text.map(|t| {
        DateTime::parse_from_rfc3339(&t)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StoreError::Corrupt(format!("timestamp {:?}: {}", t, e)))
    })
    .transpose()
}
