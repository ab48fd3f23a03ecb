//! Core modules of the console federation pipeline.
//!
//! # Module Organization
//!
//! ## Pipeline
//! - [`http_requester`] - single GET per hop, status classification, stale-session retry
//! - [`credential_fetcher`] - instance role and its temporary credentials
//! - [`federation`] - sign-in token exchange and login
//! - [`pipeline`] - run orchestration, restarts, foreground hand-off
//!
//! ## Drivers
//! - [`scheduler`] - periodic background refresh
//! - [`triggers`] - user-initiated foreground runs
//!
//! ## Support
//! - [`collaborators`] - notification and console view seams
//! - [`config`] - endpoints and retry policy
//! - [`errors`] - response classes and failure taxonomy

pub mod collaborators;
pub mod config;
pub mod credential_fetcher;
pub mod errors;
pub mod federation;
pub mod http_requester;
pub mod pipeline;
pub mod scheduler;
pub mod triggers;

pub use config::ConsoleConfig;
pub use pipeline::{ConsolePipeline, RunOutcome};
