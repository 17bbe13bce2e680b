//! CLI command implementations.

pub mod apply;
pub mod report;
pub mod run;
pub mod scenarios;
