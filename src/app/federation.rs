//! # Federation sign-in
//!
//! Exchanges instance-role credentials for a console session in two hops:
//!
//! 1. **Token Exchange**: `Action=getSigninToken` with the credentials as a
//!    URL-encoded JSON `Session` parameter and a fixed 12 hour session
//!    duration. The response carries a `SigninToken`.
//! 2. **Login**: `Action=login` with the issuer, the URL-encoded console
//!    destination and the sign-in token. A 200 means the session is live.
//!
//! Query values are encoded the way browsers encode URI components, leaving
//! `A-Z a-z 0-9 - _ . ! ~ * ' ( )` untouched. The federation endpoint accepts
//! any encoding, but this keeps the URLs identical to the ones a browser
//! extension would send.

use super::config::ConsoleConfig;
use super::credential_fetcher::Credentials;
use super::errors::{Interruption, PipelineFailure};
use super::http_requester::Requester;
use super::pipeline::{PipelineStage, RunContext};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Deserialize;
use std::fmt;

const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub fn encode_uri_component(value: &str) -> String {
    utf8_percent_encode(value, URI_COMPONENT).to_string()
}

/// Short-lived token returned by `getSigninToken`. Consumed by the login hop.
#[derive(Clone, PartialEq, Eq)]
pub struct SigninToken(String);

impl SigninToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl fmt::Debug for SigninToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigninToken(<redacted>)")
    }
}

#[derive(Deserialize)]
struct SigninTokenResponse {
    #[serde(rename = "SigninToken")]
    signin_token: String,
}

/// Result of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleSession {
    /// Console base URL the session was opened for.
    pub destination: String,
    /// Federated login URL that established the session.
    pub login_url: String,
}

pub struct FederationExchanger {
    federation_url: String,
    console_url: String,
    issuer: String,
    session_duration_secs: u64,
}

impl FederationExchanger {
    pub fn new(config: &ConsoleConfig) -> Self {
        Self {
            federation_url: config.federation_url.clone(),
            console_url: config.console_url.clone(),
            issuer: config.issuer.clone(),
            session_duration_secs: config.session_duration_secs,
        }
    }

    pub fn signin_token_url(&self, credentials: &Credentials) -> String {
        format!(
            "{}?Action=getSigninToken&SessionDuration={}&Session={}",
            self.federation_url,
            self.session_duration_secs,
            encode_uri_component(&credentials.to_session_json())
        )
    }

    /// The token is appended as returned; it is already URL-safe.
    pub fn login_url(&self, token: SigninToken) -> String {
        format!(
            "{}?Action=login&Issuer={}&Destination={}&SigninToken={}",
            self.federation_url,
            encode_uri_component(&self.issuer),
            encode_uri_component(&self.console_url),
            token.0
        )
    }

    /// Hop 3: trade the credentials for a sign-in token.
    pub async fn signin_token(
        &self,
        requester: &Requester,
        ctx: &mut RunContext,
        credentials: Credentials,
    ) -> Result<SigninToken, Interruption> {
        ctx.enter(PipelineStage::RequestingToken);
        let url = self.signin_token_url(&credentials);

        let body = requester.request(&url, ctx).await?;
        let response: SigninTokenResponse = serde_json::from_str(&body)
            .map_err(|e| PipelineFailure::malformed(ctx.stage(), e))?;
        Ok(SigninToken(response.signin_token))
    }

    /// Hop 4: log in with the token.
    pub async fn login(
        &self,
        requester: &Requester,
        ctx: &mut RunContext,
        token: SigninToken,
    ) -> Result<ConsoleSession, Interruption> {
        ctx.enter(PipelineStage::RequestingLogin);
        let login_url = self.login_url(token);

        requester.request(&login_url, ctx).await?;
        Ok(ConsoleSession {
            destination: self.console_url.clone(),
            login_url,
        })
    }
}
