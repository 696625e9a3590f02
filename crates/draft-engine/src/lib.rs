// Library root: re-exports all modules so integration tests and the binary
// can access the crate's public API.

pub mod app;
pub mod config;
pub mod draft;
pub mod poller;
pub mod protocol;
pub mod reconcile;
pub mod tracker;
pub mod valuation;
pub mod vision;
