//! # Console federation pipeline
//!
//! One run walks four dependent hops and then hands the session to the host:
//!
//! ```text
//! START -> FETCHING_ROLE -> FETCHING_CREDENTIALS -> REQUESTING_TOKEN -> REQUESTING_LOGIN -> DONE
//!   ^                                                                         |
//!   +------------------------- restart (retry ceiling hit) <------------------+
//! ```
//!
//! Every run owns a fresh [`RunContext`]; nothing but the immutable
//! configuration and the transport is shared between runs, so a user-triggered
//! run and a scheduled refresh can be in flight at the same time without
//! coordinating.
//!
//! ## Foreground and background runs
//!
//! - **Foreground** runs come from a user action. Unreachable and
//!   role-not-found failures are sent to the [`NotificationSink`], and a
//!   completed run focuses the last active window and opens the console in a
//!   new active tab. When the [`ConsoleView`] keeps its own cookies the login
//!   hop is skipped and the tab opens the federated login URL, so the view
//!   signs in with the token itself.
//! - **Background** runs come from the refresh scheduler. They exist only to
//!   keep the upstream session warm and never produce a visible effect.

use super::collaborators::{ConsoleView, NotificationSink};
use super::config::ConsoleConfig;
use super::credential_fetcher::CredentialFetcher;
use super::errors::{Interruption, PipelineFailure};
use super::federation::{ConsoleSession, FederationExchanger};
use super::http_requester::{HttpTransport, Requester};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Start,
    FetchingRole,
    FetchingCredentials,
    RequestingToken,
    RequestingLogin,
    Done,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PipelineStage::Start => "starting",
            PipelineStage::FetchingRole => "fetching role",
            PipelineStage::FetchingCredentials => "fetching credentials",
            PipelineStage::RequestingToken => "requesting sign-in token",
            PipelineStage::RequestingLogin => "requesting login",
            PipelineStage::Done => "done",
        };
        f.write_str(label)
    }
}

/// State of a single run. Created at run start, dropped at run end.
#[derive(Debug)]
pub struct RunContext {
    run_id: Uuid,
    is_foreground: bool,
    stage: PipelineStage,
    attempt: u32,
    restarts: u32,
}

impl RunContext {
    pub fn new(is_foreground: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            is_foreground,
            stage: PipelineStage::Start,
            attempt: 0,
            restarts: 0,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn is_foreground(&self) -> bool {
        self.is_foreground
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    /// Reauthentication retries spent on the current hop.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    pub(crate) fn enter(&mut self, stage: PipelineStage) {
        run_debug!(self, "{} -> {}", self.stage, stage);
        self.stage = stage;
    }

    pub(crate) fn reset_attempts(&mut self) {
        self.attempt = 0;
    }

    pub(crate) fn next_attempt(&mut self) {
        self.attempt += 1;
    }

    fn restart(&mut self) {
        self.restarts += 1;
        self.attempt = 0;
        self.enter(PipelineStage::Start);
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(ConsoleSession),
    Failed(PipelineFailure),
    /// An unclassified status ended the run without any signal.
    Dropped { stage: PipelineStage, status: u16 },
    /// `max_restarts` was configured and exceeded.
    RestartLimitReached { restarts: u32 },
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed(_))
    }
}

// Never prints the login URL, it carries the sign-in token.
impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Completed(session) => write!(f, "completed for {}", session.destination),
            RunOutcome::Failed(failure) => write!(f, "failed: {}", failure),
            RunOutcome::Dropped { stage, status } => {
                write!(f, "dropped while {} (status {})", stage, status)
            }
            RunOutcome::RestartLimitReached { restarts } => {
                write!(f, "gave up after {} restarts", restarts)
            }
        }
    }
}

// Whether the last hop logs in or only builds the login URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Finish {
    Login,
    Prepare,
}

pub struct ConsolePipeline {
    config: Arc<ConsoleConfig>,
    requester: Requester,
    credentials: CredentialFetcher,
    federation: FederationExchanger,
    notifier: Arc<dyn NotificationSink>,
    view: Arc<dyn ConsoleView>,
}

impl ConsolePipeline {
    pub fn new(
        config: ConsoleConfig,
        transport: Arc<dyn HttpTransport>,
        notifier: Arc<dyn NotificationSink>,
        view: Arc<dyn ConsoleView>,
    ) -> Self {
        Self {
            requester: Requester::new(transport, &config),
            credentials: CredentialFetcher::new(&config),
            federation: FederationExchanger::new(&config),
            config: Arc::new(config),
            notifier,
            view,
        }
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    /// Run the whole pipeline once.
    pub async fn run(&self, is_foreground: bool) -> RunOutcome {
        let mut ctx = RunContext::new(is_foreground);
        run_info!(
            ctx,
            "Starting {} run",
            if is_foreground { "foreground" } else { "background" }
        );

        // A sign-in token is single use, so a view outside our cookie jar
        // must get it before the login hop would consume it.
        let finish = if is_foreground && !self.view.shares_session() {
            Finish::Prepare
        } else {
            Finish::Login
        };

        let outcome = self.drive(&mut ctx, finish).await;
        if let RunOutcome::Completed(session) = &outcome {
            if ctx.is_foreground() {
                let url = match finish {
                    Finish::Login => &session.destination,
                    Finish::Prepare => &session.login_url,
                };
                self.present(&ctx, url).await;
            }
            run_info!(ctx, "Console session established");
        }
        outcome
    }

    /// Run the first three hops and return the login URL without using it,
    /// so a browser that does not share our cookie jar can sign in itself.
    pub async fn signin_url(&self, is_foreground: bool) -> RunOutcome {
        let mut ctx = RunContext::new(is_foreground);
        run_info!(ctx, "Preparing federated sign-in URL");
        self.drive(&mut ctx, Finish::Prepare).await
    }

    async fn drive(&self, ctx: &mut RunContext, finish: Finish) -> RunOutcome {
        loop {
            match self.exchange(ctx, finish).await {
                Ok(session) => {
                    ctx.enter(PipelineStage::Done);
                    return RunOutcome::Completed(session);
                }
                Err(Interruption::Restart) => {
                    ctx.restart();
                    if let Some(max) = self.config.max_restarts {
                        if ctx.restarts() > max {
                            run_warn!(ctx, "Giving up after {} restarts", ctx.restarts());
                            return RunOutcome::RestartLimitReached {
                                restarts: ctx.restarts(),
                            };
                        }
                    }
                    run_info!(ctx, "Restarting from the first hop (restart {})", ctx.restarts());
                }
                Err(Interruption::Failed(failure)) => {
                    self.report(ctx, &failure);
                    return RunOutcome::Failed(failure);
                }
                Err(Interruption::Dropped { status }) => {
                    return RunOutcome::Dropped {
                        stage: ctx.stage(),
                        status,
                    };
                }
            }
        }
    }

    async fn exchange(
        &self,
        ctx: &mut RunContext,
        finish: Finish,
    ) -> Result<ConsoleSession, Interruption> {
        let role = self.credentials.role_name(&self.requester, ctx).await?;
        let credentials = self
            .credentials
            .credentials(&self.requester, ctx, &role)
            .await?;
        let token = self
            .federation
            .signin_token(&self.requester, ctx, credentials)
            .await?;

        match finish {
            Finish::Login => self.federation.login(&self.requester, ctx, token).await,
            Finish::Prepare => Ok(ConsoleSession {
                destination: self.config.console_url.clone(),
                login_url: self.federation.login_url(token),
            }),
        }
    }

    fn report(&self, ctx: &RunContext, failure: &PipelineFailure) {
        if ctx.is_foreground() && failure.is_user_visible() {
            self.notifier.notify(&failure.to_string());
        } else {
            run_debug!(ctx, "Not surfacing failure: {}", failure);
        }
    }

    // Collaborator errors are logged and otherwise ignored; the session is
    // already established upstream.
    async fn present(&self, ctx: &RunContext, url: &str) {
        let window = match self.view.last_focused_window().await {
            Ok(window) => window,
            Err(e) => {
                run_warn!(ctx, "No window to open the console in: {}", e);
                return;
            }
        };

        if let Err(e) = self.view.focus_window(window).await {
            run_warn!(ctx, "Failed to focus window {}: {}", window, e);
        }
        if let Err(e) = self
            .view
            .create_tab(window, url, true)
            .await
        {
            run_warn!(ctx, "Failed to open console tab: {}", e);
        }
    }
}
