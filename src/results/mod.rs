//! Typed readers for the fitting tools' text outputs.
//!
//! Each reader turns one output-file format into a record; the decision
//! logic only ever sees the records. A file that exists but cannot supply a
//! usable record is reported as absence (`None`) or as a hard parse error,
//! depending on whether downstream code has a fallback for it.

pub mod rmfit;
pub mod rvm;
pub mod synthesis;
