//!  Storage is organized through [activity_store::LedgerStore].
//!  The basic idea is:
//!   - There is a directory with the whole activity ledger.
//!   - Records for a UTC day live in that day's file, one json object per line.
//!   - Records are appended facts and never rewritten.

pub mod activity_store;
pub mod entities;
