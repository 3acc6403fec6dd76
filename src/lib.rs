//! DEAL DESK: inventory scoring against lender approvals
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod finance;
pub mod lenders;
pub mod engine;
pub mod storage;
