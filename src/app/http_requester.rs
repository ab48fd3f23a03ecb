//! # Single-hop HTTP requests with reauthentication
//!
//! Every hop of the pipeline is one GET issued through [`Requester::request`].
//! The response status alone decides what happens next:
//!
//! | Status | Handling |
//! |---|---|
//! | 200 | body is returned to the hop |
//! | 400 | logout, then the same hop is retried with the next attempt index |
//! | 0 | `Unreachable` failure (transport gave no response) |
//! | 500 | `RoleNotFound` failure |
//! | other | dropped silently |
//!
//! Once the attempt index passes the retry ceiling the hop gives up with
//! [`Interruption::Restart`] and the orchestrator starts the run over from the
//! first hop. A 400 on the logout request itself is answered with another
//! logout from the same attempt budget. The attempt counter lives in the
//! caller's `RunContext`, so two runs in flight never share it.
//!
//! The transport is a trait so that the orchestrator can be driven by a
//! scripted transport in tests; production uses [`ReqwestTransport`], whose
//! cookie store holds the upstream console session between hops.

use super::config::ConsoleConfig;
use super::errors::{
    Interruption, PipelineFailure, ResponseClass, STATUS_OK, STATUS_STALE_SESSION,
    STATUS_UNREACHABLE,
};
use super::pipeline::RunContext;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Status and body of a completed GET.
///
/// A transport that gets no response at all reports status 0 with an empty
/// body instead of an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn unreachable() -> Self {
        Self {
            status: STATUS_UNREACHABLE,
            body: String::new(),
        }
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str) -> HttpResponse;
}

/// reqwest-backed transport with a cookie store.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str) -> HttpResponse {
        let resp = match self
            .client
            .get(url)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                debug!("No response from {}: {}", loggable_url(url), e);
                return HttpResponse::unreachable();
            }
        };

        let status = resp.status().as_u16();
        match resp.text().await {
            Ok(body) => HttpResponse { status, body },
            Err(e) => {
                debug!("Failed to read body from {}: {}", loggable_url(url), e);
                HttpResponse::unreachable()
            }
        }
    }
}

/// Issues hop requests and applies the stale-session policy.
#[derive(Clone)]
pub struct Requester {
    transport: Arc<dyn HttpTransport>,
    logout_url: String,
    retry_ceiling: u32,
}

impl Requester {
    pub fn new(transport: Arc<dyn HttpTransport>, config: &ConsoleConfig) -> Self {
        Self {
            transport,
            logout_url: config.logout_url.clone(),
            retry_ceiling: config.retry_ceiling,
        }
    }

    /// Run one hop to completion: returns the 200 body or the reason the hop
    /// stopped. The attempt counter in `ctx` starts from zero for every hop.
    pub async fn request(&self, url: &str, ctx: &mut RunContext) -> Result<String, Interruption> {
        ctx.reset_attempts();

        loop {
            if ctx.attempt() > self.retry_ceiling {
                run_warn!(
                    ctx,
                    "Too many attempts while {}. Retrying from beginning.",
                    ctx.stage()
                );
                return Err(Interruption::Restart);
            }

            run_debug!(
                ctx,
                "Making HTTP request to: {} (attempt {})",
                loggable_url(url),
                ctx.attempt()
            );
            let response = self.transport.get(url).await;

            match ResponseClass::from(response) {
                ResponseClass::Success(body) => return Ok(body),
                ResponseClass::StaleSession => {
                    run_info!(ctx, "Stale session while {}, logging out", ctx.stage());
                    self.logout(ctx).await?;
                    ctx.next_attempt();
                }
                ResponseClass::Unreachable => {
                    let failure = PipelineFailure::Unreachable;
                    run_warn!(ctx, "{}", failure);
                    return Err(failure.into());
                }
                ResponseClass::RoleNotFound => {
                    let failure = PipelineFailure::RoleNotFound;
                    run_warn!(ctx, "{}", failure);
                    return Err(failure.into());
                }
                ResponseClass::Unclassified(status) => {
                    run_debug!(ctx, "Ignoring status {} while {}", status, ctx.stage());
                    return Err(Interruption::Dropped { status });
                }
            }
        }
    }

    // The logout request never surfaces anything to the user, whatever the
    // run's foreground flag. A 400 on logout is itself a stale session: log
    // out again, spending attempts from the same budget as the hop.
    async fn logout(&self, ctx: &mut RunContext) -> Result<(), Interruption> {
        loop {
            run_debug!(ctx, "Making HTTP request to: {}", loggable_url(&self.logout_url));
            let response = self.transport.get(&self.logout_url).await;
            match response.status {
                STATUS_OK => return Ok(()),
                STATUS_STALE_SESSION => {
                    ctx.next_attempt();
                    if ctx.attempt() > self.retry_ceiling {
                        run_warn!(
                            ctx,
                            "Too many attempts logging out while {}. Retrying from beginning.",
                            ctx.stage()
                        );
                        return Err(Interruption::Restart);
                    }
                    run_info!(ctx, "Stale session on logout, logging out again");
                }
                status => {
                    run_warn!(ctx, "Logout failed with status {}", status);
                    return Err(PipelineFailure::LogoutFailed { status }.into());
                }
            }
        }
    }
}

/// URL with its query removed except for `Action`. The sign-in token request
/// carries the session credentials in its query string.
pub fn loggable_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            let action = url
                .query_pairs()
                .find(|(key, _)| key == "Action")
                .map(|(_, value)| value.into_owned());
            url.set_query(None);
            match action {
                Some(action) => format!("{}?Action={}", url, action),
                None => url.to_string(),
            }
        }
        Err(_) => "<unparseable url>".to_string(),
    }
}
