//! Instance-role credentials from the metadata service.
//!
//! Two hops: list the instance roles and take the first one, then fetch that
//! role's temporary credentials. Both go through the [`Requester`] and so
//! inherit its stale-session handling.

use super::config::ConsoleConfig;
use super::errors::{Interruption, PipelineFailure};
use super::http_requester::Requester;
use super::pipeline::{PipelineStage, RunContext};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;

/// Name of the instance profile role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleName(String);

impl RoleName {
    /// First line of the role listing. The listing may name several roles;
    /// only the first is ever used.
    pub fn from_listing(body: &str) -> Option<Self> {
        let first = body.lines().next()?.trim_end_matches('\r');
        if first.is_empty() {
            None
        } else {
            Some(Self(first.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Temporary credentials of the instance role.
///
/// Lives for one run only. `Debug` never prints the secret key or token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    session_id: String,
    session_key: String,
    session_token: String,
}

impl Credentials {
    pub fn new(
        session_id: impl Into<String>,
        session_key: impl Into<String>,
        session_token: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            session_key: session_key.into(),
            session_token: session_token.into(),
        }
    }

    /// The access key id. Safe to log.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn session_key(&self) -> &str {
        &self.session_key
    }

    pub fn session_token(&self) -> &str {
        &self.session_token
    }

    /// JSON document for the federation `Session` parameter.
    pub fn to_session_json(&self) -> String {
        serde_json::json!({
            "sessionId": self.session_id,
            "sessionKey": self.session_key,
            "sessionToken": self.session_token,
        })
        .to_string()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("session_id", &self.session_id)
            .field("session_key", &"<redacted>")
            .field("session_token", &"<redacted>")
            .finish()
    }
}

// Body of `security-credentials/<role>`. Code, Type and LastUpdated are
// ignored.
#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstanceRoleCredentials {
    access_key_id: String,
    secret_access_key: String,
    token: String,
    #[serde(default)]
    expiration: Option<DateTime<Utc>>,
}

fn parse_credentials(body: &str) -> Result<(Credentials, Option<DateTime<Utc>>), serde_json::Error> {
    let parsed: InstanceRoleCredentials = serde_json::from_str(body)?;
    let credentials = Credentials::new(parsed.access_key_id, parsed.secret_access_key, parsed.token);
    Ok((credentials, parsed.expiration))
}

pub struct CredentialFetcher {
    metadata_url: String,
}

impl CredentialFetcher {
    pub fn new(config: &ConsoleConfig) -> Self {
        Self {
            metadata_url: config.metadata_url.clone(),
        }
    }

    /// Hop 1: the first role listed by the metadata service.
    pub async fn role_name(
        &self,
        requester: &Requester,
        ctx: &mut RunContext,
    ) -> Result<RoleName, Interruption> {
        ctx.enter(PipelineStage::FetchingRole);
        let body = requester.request(&self.metadata_url, ctx).await?;

        let Some(role) = RoleName::from_listing(&body) else {
            run_warn!(ctx, "Metadata service listed no instance role");
            return Err(PipelineFailure::RoleNotFound.into());
        };
        run_debug!(ctx, "Using instance role {}", role);
        Ok(role)
    }

    /// Hop 2: temporary credentials for `role`.
    pub async fn credentials(
        &self,
        requester: &Requester,
        ctx: &mut RunContext,
        role: &RoleName,
    ) -> Result<Credentials, Interruption> {
        ctx.enter(PipelineStage::FetchingCredentials);
        let url = format!("{}{}", self.metadata_url, role);
        let body = requester.request(&url, ctx).await?;

        let (credentials, expiration) = parse_credentials(&body)
            .map_err(|e| PipelineFailure::malformed(ctx.stage(), e))?;
        run_debug!(
            ctx,
            "Got credentials {} for role {}, expiration {:?}",
            credentials.session_id(),
            role,
            expiration
        );
        Ok(credentials)
    }
}
