//! Domain types for the cost-reporting backend.
//!
//! This module provides:
//! - Provider identity (uuid + provider type)
//! - Billing-period types: manifest, cost entry bill
//! - Daily summary rows produced by the summary updater

pub mod bill;
pub mod primitives;

pub use bill::{BillingManifest, CostEntryBill, DailySummaryRow};
pub use primitives::{Provider, ProviderType, ProviderTypeParseError};
