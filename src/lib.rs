//! awsconsole - AWS Console sign-in from instance-role credentials
//!
//! awsconsole turns the temporary credentials of an EC2 instance profile into
//! a signed-in AWS Management Console session. It is meant for workstations
//! and bastion hosts that run on EC2 with an instance role, where there is no
//! long-lived user to log in as.
//!
//! # How it works
//!
//! Each run is four dependent HTTP hops:
//!
//! 1. List the instance roles on the metadata service and take the first.
//! 2. Fetch that role's temporary credentials.
//! 3. Exchange the credentials for a sign-in token at the federation endpoint.
//! 4. Log in to the console with the token.
//!
//! A stale upstream session (HTTP 400 on any hop) triggers a logout and a
//! retry of that hop; after too many retries the run starts over from the
//! first hop. See [`app::http_requester`] for the full status table.
//!
//! # Runs
//!
//! - **Foreground** runs are started by the user (`awsconsole open`, or a
//!   trigger of the daemon). They report failures and open the console.
//! - **Background** runs are started by [`app::scheduler::RefreshScheduler`]
//!   every 10 hours and are silent.
//!
//! Nothing is persisted: credentials and tokens live only for the run that
//! fetched them.

#![warn(clippy::all, rust_2018_idioms)]

#[macro_use]
pub mod logging_macros;

pub mod app;
pub use app::{ConsoleConfig, ConsolePipeline, RunOutcome};
