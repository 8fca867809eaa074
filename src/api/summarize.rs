//! Summary update trigger endpoint.
//!
//! Drives the per-provider summary updater for one billing period. The
//! scheduler invoking this endpoint owns exclusivity: at most one in-flight
//! run per (schema, provider, billing period).

use axum::extract::State;
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::AppState;
use crate::domain::{BillingManifest, Provider, ProviderType};
use crate::error::AppError;
use crate::summary::{SummaryOutcome, SummaryUpdater};

#[derive(Debug, Deserialize)]
pub struct SummarizeRequest {
    pub schema: Option<String>,
    pub provider_uuid: Uuid,
    pub provider_type: ProviderType,
    pub billing_period_start: Option<NaiveDate>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct SummarizeResponse {
    pub schema: String,
    pub provider_uuid: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<u64>,
}

pub async fn post_summarize(
    State(state): State<AppState>,
    Json(request): Json<SummarizeRequest>,
) -> Result<Json<SummarizeResponse>, AppError> {
    let schema = request
        .schema
        .unwrap_or_else(|| state.config.default_schema.clone());
    let provider = Provider::new(request.provider_uuid, request.provider_type);
    let manifest = request.billing_period_start.map(BillingManifest::new);

    let updater = SummaryUpdater::new(
        schema.clone(),
        provider,
        manifest,
        Arc::clone(&state.store),
        Arc::clone(&state.dates),
    );

    let outcome = updater
        .update_summary_tables(request.start_date, request.end_date)
        .await?;

    let response = match outcome {
        SummaryOutcome::Updated {
            start_date,
            end_date,
            rows,
        } => SummarizeResponse {
            schema,
            provider_uuid: provider.uuid,
            start_date,
            end_date,
            status: "updated",
            rows: Some(rows),
        },
        SummaryOutcome::NoBill {
            start_date,
            end_date,
        } => SummarizeResponse {
            schema,
            provider_uuid: provider.uuid,
            start_date,
            end_date,
            status: "skipped_no_bill",
            rows: None,
        },
    };

    Ok(Json(response))
}
