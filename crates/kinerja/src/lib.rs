//! Performance data import and reconciliation.
//!
//! Turns human-pasted spreadsheet text into validated per-employee competency
//! scores, reconciling the names found in the header row against an employee
//! directory snapshot.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod telemetry;
