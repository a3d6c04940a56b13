//! tallysheet_engine - Spreadsheet formula engine.
//!
//! [`engine::Sheet`] holds cell content together with its value cache and
//! dependency links; [`builtins`] is the function library formulas call into.

pub mod builtins;
pub mod engine;
