//! Summary-table update orchestration.

pub mod updater;

pub use updater::{DateArg, SummaryError, SummaryOutcome, SummaryUpdater};
