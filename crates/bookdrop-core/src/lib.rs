//! Core pipeline for authenticated file ingestion: access control, transfer
//! validation, unique on-disk naming, per-user import preferences and the
//! retrying import orchestration against a remote library service.

pub mod access;
pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod ingest;
pub mod logging;
pub mod orchestrator;
pub mod ports;
pub mod prefs;
pub mod transfer;

pub use errors::{ApiError, ApiResult, Error, Result};
