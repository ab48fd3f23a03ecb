//! Host-side collaborators of the pipeline.
//!
//! The pipeline never talks to the desktop directly. Failures of foreground
//! runs go to a [`NotificationSink`]; a successful foreground run asks a
//! [`ConsoleView`] to bring a window forward and open the console in a new
//! active tab. Both are invoked only for foreground runs.
//!
//! A view that does not share the pipeline's HTTP cookie jar, such as the
//! system browser, cannot use the session the login hop establishes. It is
//! handed the unconsumed federated login URL instead.

use super::http_requester::loggable_url;
use async_trait::async_trait;
use std::fmt;
use tracing::{debug, info, warn};

pub const NOTIFICATION_TITLE: &str = "awsconsole";

/// Receives human-readable failure messages.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, message: &str);
}

/// Identifier of a host window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(pub u64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Window and tab management of the host.
#[async_trait]
pub trait ConsoleView: Send + Sync {
    async fn last_focused_window(&self) -> anyhow::Result<WindowId>;

    async fn focus_window(&self, window: WindowId) -> anyhow::Result<()>;

    async fn create_tab(&self, window: WindowId, url: &str, active: bool) -> anyhow::Result<()>;

    /// Whether tabs opened here see the cookies set by the pipeline's
    /// transport.
    fn shares_session(&self) -> bool {
        true
    }
}

/// Writes notifications to stderr and the log.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn notify(&self, message: &str) {
        warn!("Notification: {}", message);
        eprintln!("[{}] {}", NOTIFICATION_TITLE, message);
    }
}

/// The system's default browser, treated as a single window. It runs in its
/// own process with its own cookies.
#[derive(Debug, Default, Clone)]
pub struct SystemBrowser;

impl SystemBrowser {
    pub const WINDOW: WindowId = WindowId(0);
}

#[async_trait]
impl ConsoleView for SystemBrowser {
    async fn last_focused_window(&self) -> anyhow::Result<WindowId> {
        Ok(Self::WINDOW)
    }

    async fn focus_window(&self, window: WindowId) -> anyhow::Result<()> {
        // Opening a URL raises the browser on every desktop we target.
        debug!("Focus requested for browser window {}", window);
        Ok(())
    }

    async fn create_tab(&self, window: WindowId, url: &str, active: bool) -> anyhow::Result<()> {
        let target = url.to_string();
        tokio::task::spawn_blocking(move || open::that(&target))
            .await
            .map_err(|e| anyhow::anyhow!("Browser launch task failed: {}", e))?
            .map_err(|e| anyhow::anyhow!("Failed to open browser: {}", e))?;
        info!(
            "Opened {} in browser window {} (active: {})",
            loggable_url(url),
            window,
            active
        );
        Ok(())
    }

    fn shares_session(&self) -> bool {
        false
    }
}
