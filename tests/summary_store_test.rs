use chrono::NaiveDate;
use ledgerd::dates::{DateReference, FixedDates};
use ledgerd::domain::{BillingManifest, Provider, ProviderType};
use ledgerd::store::{init_db, ReportStore, SqliteStore};
use ledgerd::summary::{SummaryOutcome, SummaryUpdater};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::str::FromStr;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

const SCHEMA: &str = "acct10001";

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn dec(text: &str) -> Decimal {
    Decimal::from_str(text).unwrap()
}

fn tags(pairs: &[(&str, &str)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
        .collect()
}

async fn setup_store() -> (Arc<SqliteStore>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    (Arc::new(SqliteStore::new(pool)), temp_dir)
}

fn updater(
    store: Arc<SqliteStore>,
    provider: Provider,
    manifest: Option<BillingManifest>,
) -> SummaryUpdater {
    SummaryUpdater::new(
        SCHEMA.to_string(),
        provider,
        manifest,
        store,
        Arc::new(FixedDates::on(date(2021, 2, 20))),
    )
}

#[tokio::test]
async fn test_update_builds_daily_summaries_with_markup() {
    let (store, _temp) = setup_store().await;
    let provider = Provider::new(Uuid::new_v4(), ProviderType::Gcp);
    let bill = store
        .create_bill(SCHEMA, provider.uuid, date(2021, 2, 1))
        .await
        .unwrap();
    store
        .set_markup(SCHEMA, provider.uuid, dec("10"))
        .await
        .unwrap();

    // Two line items on the 1st, one on the 2nd.
    store
        .insert_line_item(
            SCHEMA,
            provider.uuid,
            bill.id,
            date(2021, 2, 1),
            dec("1.25"),
            &tags(&[("env", "prod")]),
        )
        .await
        .unwrap();
    store
        .insert_line_item(
            SCHEMA,
            provider.uuid,
            bill.id,
            date(2021, 2, 1),
            dec("2.75"),
            &tags(&[("app", "web")]),
        )
        .await
        .unwrap();
    store
        .insert_line_item(
            SCHEMA,
            provider.uuid,
            bill.id,
            date(2021, 2, 2),
            dec("5"),
            &tags(&[("env", "stage")]),
        )
        .await
        .unwrap();

    let outcome = updater(store.clone(), provider, None)
        .update_summary_tables(date(2021, 2, 1), date(2021, 2, 28))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        SummaryOutcome::Updated {
            start_date: date(2021, 2, 1),
            end_date: date(2021, 2, 28),
            rows: 2,
        }
    );

    let rows = store
        .daily_summaries(SCHEMA, provider.uuid, date(2021, 2, 1), date(2021, 2, 28))
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].usage_date, date(2021, 2, 1));
    assert_eq!(rows[0].cost, dec("4.00"));
    assert_eq!(rows[0].markup_cost, dec("0.400"));
    assert_eq!(rows[1].cost, dec("5"));
    assert_eq!(rows[1].markup_cost, dec("0.5"));

    // Tag keys seen on line items were registered and the tag summary built.
    let keys = store.enabled_tag_keys(SCHEMA).await.unwrap();
    assert_eq!(keys, ["app", "env"]);
    let summary = store.tag_summary(SCHEMA, bill.id).await.unwrap();
    assert_eq!(summary["env"], ["prod", "stage"]);
    assert_eq!(summary["app"], ["web"]);

    // Bill stamped with the pinned clock.
    let stamped = store.bill(SCHEMA, bill.id).await.unwrap().unwrap();
    let expected = FixedDates::on(date(2021, 2, 20)).now_utc();
    assert_eq!(stamped.summary_data_creation_datetime, Some(expected));
    assert_eq!(stamped.summary_data_updated_datetime, Some(expected));
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let (store, _temp) = setup_store().await;
    let provider = Provider::new(Uuid::new_v4(), ProviderType::Aws);
    let bill = store
        .create_bill(SCHEMA, provider.uuid, date(2021, 2, 1))
        .await
        .unwrap();
    store
        .insert_line_item(
            SCHEMA,
            provider.uuid,
            bill.id,
            date(2021, 2, 3),
            dec("7.5"),
            &tags(&[]),
        )
        .await
        .unwrap();

    let u = updater(store.clone(), provider, None);
    u.update_summary_tables(date(2021, 2, 1), date(2021, 2, 28))
        .await
        .unwrap();
    let first = store
        .daily_summaries(SCHEMA, provider.uuid, date(2021, 2, 1), date(2021, 2, 28))
        .await
        .unwrap();

    u.update_summary_tables(date(2021, 2, 1), date(2021, 2, 28))
        .await
        .unwrap();
    let second = store
        .daily_summaries(SCHEMA, provider.uuid, date(2021, 2, 1), date(2021, 2, 28))
        .await
        .unwrap();

    assert_eq!(first, second);

    // Creation timestamp survives the re-run.
    let stamped = store.bill(SCHEMA, bill.id).await.unwrap().unwrap();
    let expected = FixedDates::on(date(2021, 2, 20)).now_utc();
    assert_eq!(stamped.summary_data_creation_datetime, Some(expected));
}

#[tokio::test]
async fn test_manifest_forces_full_month_on_first_summary() {
    let (store, _temp) = setup_store().await;
    let provider = Provider::new(Uuid::new_v4(), ProviderType::Azure);
    let bill = store
        .create_bill(SCHEMA, provider.uuid, date(2021, 2, 1))
        .await
        .unwrap();
    // Line items outside the requested incremental range.
    store
        .insert_line_item(
            SCHEMA,
            provider.uuid,
            bill.id,
            date(2021, 2, 2),
            dec("1"),
            &tags(&[]),
        )
        .await
        .unwrap();
    store
        .insert_line_item(
            SCHEMA,
            provider.uuid,
            bill.id,
            date(2021, 2, 25),
            dec("2"),
            &tags(&[]),
        )
        .await
        .unwrap();

    let manifest = BillingManifest::new(date(2021, 2, 1));
    let outcome = updater(store.clone(), provider, Some(manifest))
        .update_summary_tables(date(2021, 2, 10), date(2021, 2, 12))
        .await
        .unwrap();

    // Never summarized, so the range widens to the whole billing month.
    assert_eq!(
        outcome,
        SummaryOutcome::Updated {
            start_date: date(2021, 2, 1),
            end_date: date(2021, 2, 28),
            rows: 2,
        }
    );

    let rows = store
        .daily_summaries(SCHEMA, provider.uuid, date(2021, 2, 1), date(2021, 2, 28))
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn test_disabled_tag_keys_stripped_from_summaries() {
    let (store, _temp) = setup_store().await;
    let provider = Provider::new(Uuid::new_v4(), ProviderType::Gcp);
    let bill = store
        .create_bill(SCHEMA, provider.uuid, date(2021, 2, 1))
        .await
        .unwrap();
    // "app" is explicitly disabled before any summarization.
    store
        .set_tag_key_enabled(SCHEMA, "app", false)
        .await
        .unwrap();
    store
        .insert_line_item(
            SCHEMA,
            provider.uuid,
            bill.id,
            date(2021, 2, 1),
            dec("3"),
            &tags(&[("env", "prod"), ("app", "web")]),
        )
        .await
        .unwrap();

    updater(store.clone(), provider, None)
        .update_summary_tables(date(2021, 2, 1), date(2021, 2, 28))
        .await
        .unwrap();

    let rows = store
        .daily_summaries(SCHEMA, provider.uuid, date(2021, 2, 1), date(2021, 2, 28))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].tags, tags(&[("env", "prod")]));
    assert_eq!(store.enabled_tag_keys(SCHEMA).await.unwrap(), ["env"]);
}

#[tokio::test]
async fn test_no_bill_leaves_store_untouched() {
    let (store, _temp) = setup_store().await;
    let provider = Provider::new(Uuid::new_v4(), ProviderType::Ocp);

    let outcome = updater(store.clone(), provider, None)
        .update_summary_tables(date(2021, 2, 1), date(2021, 2, 10))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        SummaryOutcome::NoBill {
            start_date: date(2021, 2, 1),
            end_date: date(2021, 2, 10),
        }
    );
    let rows = store
        .daily_summaries(SCHEMA, provider.uuid, date(2021, 2, 1), date(2021, 2, 28))
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_tenants_are_isolated() {
    let (store, _temp) = setup_store().await;
    let provider = Provider::new(Uuid::new_v4(), ProviderType::Aws);
    let bill = store
        .create_bill(SCHEMA, provider.uuid, date(2021, 2, 1))
        .await
        .unwrap();
    store
        .insert_line_item(
            SCHEMA,
            provider.uuid,
            bill.id,
            date(2021, 2, 1),
            dec("9"),
            &tags(&[]),
        )
        .await
        .unwrap();

    // The same provider under another tenant has no bill.
    let other = SummaryUpdater::new(
        "acct20002".to_string(),
        provider,
        None,
        store.clone(),
        Arc::new(FixedDates::on(date(2021, 2, 20))),
    );
    let outcome = other
        .update_summary_tables(date(2021, 2, 1), date(2021, 2, 10))
        .await
        .unwrap();
    assert!(matches!(outcome, SummaryOutcome::NoBill { .. }));

    updater(store.clone(), provider, None)
        .update_summary_tables(date(2021, 2, 1), date(2021, 2, 28))
        .await
        .unwrap();
    let foreign = store
        .daily_summaries("acct20002", provider.uuid, date(2021, 2, 1), date(2021, 2, 28))
        .await
        .unwrap();
    assert!(foreign.is_empty());
}
