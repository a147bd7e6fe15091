//! Type definitions for the risk inference pipeline

pub mod record;
pub mod verdict;

pub use record::RiskRecord;
pub use verdict::Verdict;
