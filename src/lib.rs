pub mod api;
pub mod config;
pub mod dates;
pub mod domain;
pub mod error;
pub mod params;
pub mod store;
pub mod summary;

pub use config::Config;
pub use dates::{DateReference, FixedDates, SystemDates};
pub use domain::{BillingManifest, CostEntryBill, Provider, ProviderType};
pub use error::AppError;
pub use params::{ReportQuery, ReportQueryValidator, ReportScope, ValidationErrors};
pub use store::{init_db, MemoryStore, ReportStore, SqliteStore};
pub use summary::{SummaryOutcome, SummaryUpdater};
