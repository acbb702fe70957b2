//! Discord activity tracker. Records message, reaction and voice-presence events as an
//! append-only ledger of facts and answers `!me` direct-message requests (or the
//! `summary` cli command) with per-user activity summaries.

pub mod cli;
pub mod daemon;
pub mod gateway;
pub mod summary;
pub mod utils;
