//! Read-side of the ledger: folding activity records into per-user summaries and
//! rendering them for chat or terminal output.

pub mod aggregate;
pub mod format;
pub mod query;
