//! Comparable-sales valuation engine for collectible auction lots.
//!
//! Pipeline per lot: category gate → comparable matching → date-indexed metal
//! spot prices → robust aggregation into a persisted prediction.

pub mod batch;
pub mod config;
pub mod db;
pub mod error;
pub mod matcher;
pub mod normalizer;
pub mod policy;
pub mod spot;
pub mod types;
pub mod valuation;
