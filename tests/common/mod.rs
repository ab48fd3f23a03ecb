//! Shared fixtures: a scripted AWS transport and recording collaborators.
//!
//! All three write to one [`Journal`] so tests can assert the global order of
//! HTTP requests, notifications and window calls.

#![allow(dead_code)]

use async_trait::async_trait;
use awsconsole::app::collaborators::{ConsoleView, NotificationSink, WindowId};
use awsconsole::app::http_requester::{HttpResponse, HttpTransport};
use awsconsole::{ConsoleConfig, ConsolePipeline};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

pub const ROLE_LIST_URL: &str = "http://169.254.169.254/latest/meta-data/iam/security-credentials/";
pub const CREDENTIALS_URL: &str =
    "http://169.254.169.254/latest/meta-data/iam/security-credentials/iam-role-name";
pub const TOKEN_URL: &str = "https://signin.aws.amazon.com/federation?Action=getSigninToken&SessionDuration=43200&Session=%7B%22sessionId%22%3A%22omg%22%2C%22sessionKey%22%3A%22such%22%2C%22sessionToken%22%3A%22wow%22%7D";
pub const LOGIN_URL: &str = "https://signin.aws.amazon.com/federation?Action=login&Issuer=awsconsole&Destination=https%3A%2F%2Fconsole.aws.amazon.com%2F&SigninToken=token";
pub const LOGOUT_URL: &str = "https://console.aws.amazon.com/console/logout!doLogout";
pub const CONSOLE_URL: &str = "https://console.aws.amazon.com/";

pub const UNREACHABLE_MESSAGE: &str = "The instance metadata service could not be reached.";
pub const ROLE_NOT_FOUND_MESSAGE: &str =
    "Cannot find IAM role. Are you on a machine with an instance profile?";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Get(String),
    Notify(String),
    LastFocused,
    Focus(WindowId),
    CreateTab {
        window: WindowId,
        url: String,
        active: bool,
    },
}

#[derive(Default, Clone)]
pub struct Journal(Arc<Mutex<Vec<Event>>>);

impl Journal {
    fn push(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Get(url) => Some(url),
                _ => None,
            })
            .collect()
    }

    pub fn count_requests(&self, url: &str) -> usize {
        self.requests().iter().filter(|u| u.as_str() == url).count()
    }

    pub fn notifications(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Notify(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn view_calls(&self) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| {
                matches!(
                    e,
                    Event::LastFocused | Event::Focus(_) | Event::CreateTab { .. }
                )
            })
            .collect()
    }
}

/// Answers the four pipeline hops and the logout URL like a healthy
/// instance would. Responses queued with [`ScriptedTransport::respond`] are
/// served first, in order, for their URL. Unknown URLs get a 404.
pub struct ScriptedTransport {
    journal: Journal,
    defaults: HashMap<String, HttpResponse>,
    queued: Mutex<HashMap<String, VecDeque<HttpResponse>>>,
}

impl ScriptedTransport {
    pub fn healthy(journal: Journal) -> Self {
        let mut defaults = HashMap::new();
        defaults.insert(ROLE_LIST_URL.to_string(), ok("iam-role-name\n"));
        defaults.insert(
            CREDENTIALS_URL.to_string(),
            ok(r#"{"AccessKeyId":"omg","SecretAccessKey":"such","Token":"wow"}"#),
        );
        defaults.insert(TOKEN_URL.to_string(), ok(r#"{"SigninToken":"token"}"#));
        defaults.insert(LOGIN_URL.to_string(), ok(""));
        defaults.insert(LOGOUT_URL.to_string(), ok(""));

        Self {
            journal,
            defaults,
            queued: Mutex::new(HashMap::new()),
        }
    }

    pub fn respond(&self, url: &str, status: u16, body: &str) {
        self.queued
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(HttpResponse {
                status,
                body: body.to_string(),
            });
    }

    /// Replace the default answer for `url`.
    pub fn always(mut self, url: &str, status: u16, body: &str) -> Self {
        self.defaults.insert(
            url.to_string(),
            HttpResponse {
                status,
                body: body.to_string(),
            },
        );
        self
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn get(&self, url: &str) -> HttpResponse {
        self.journal.push(Event::Get(url.to_string()));

        if let Some(response) = self
            .queued
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(|queue| queue.pop_front())
        {
            return response;
        }

        self.defaults.get(url).cloned().unwrap_or(HttpResponse {
            status: 404,
            body: String::new(),
        })
    }
}

pub fn ok(body: &str) -> HttpResponse {
    HttpResponse {
        status: 200,
        body: body.to_string(),
    }
}

pub struct RecordingNotifier(Journal);

impl NotificationSink for RecordingNotifier {
    fn notify(&self, message: &str) {
        self.0.push(Event::Notify(message.to_string()));
    }
}

/// A browser with a single window, id 1.
pub struct RecordingView {
    journal: Journal,
    shares_session: bool,
}

#[async_trait]
impl ConsoleView for RecordingView {
    async fn last_focused_window(&self) -> anyhow::Result<WindowId> {
        self.journal.push(Event::LastFocused);
        Ok(WindowId(1))
    }

    async fn focus_window(&self, window: WindowId) -> anyhow::Result<()> {
        self.journal.push(Event::Focus(window));
        Ok(())
    }

    async fn create_tab(&self, window: WindowId, url: &str, active: bool) -> anyhow::Result<()> {
        self.journal.push(Event::CreateTab {
            window,
            url: url.to_string(),
            active,
        });
        Ok(())
    }

    fn shares_session(&self) -> bool {
        self.shares_session
    }
}

pub struct Fixture {
    pub journal: Journal,
    pub transport: Arc<ScriptedTransport>,
    pub pipeline: Arc<ConsolePipeline>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(ConsoleConfig::default())
    }

    pub fn with_config(config: ConsoleConfig) -> Self {
        let journal = Journal::default();
        Self::build(config, ScriptedTransport::healthy(journal.clone()), journal, true)
    }

    pub fn with_transport(
        config: ConsoleConfig,
        configure: impl FnOnce(ScriptedTransport) -> ScriptedTransport,
    ) -> Self {
        let journal = Journal::default();
        let transport = configure(ScriptedTransport::healthy(journal.clone()));
        Self::build(config, transport, journal, true)
    }

    /// The view keeps its own cookies, like the system browser.
    pub fn with_separate_browser() -> Self {
        let journal = Journal::default();
        let transport = ScriptedTransport::healthy(journal.clone());
        Self::build(ConsoleConfig::default(), transport, journal, false)
    }

    fn build(
        config: ConsoleConfig,
        transport: ScriptedTransport,
        journal: Journal,
        shares_session: bool,
    ) -> Self {
        let transport = Arc::new(transport);
        let view = RecordingView {
            journal: journal.clone(),
            shares_session,
        };
        let pipeline = Arc::new(ConsolePipeline::new(
            config,
            transport.clone(),
            Arc::new(RecordingNotifier(journal.clone())),
            Arc::new(view),
        ));
        Self {
            journal,
            transport,
            pipeline,
        }
    }
}

pub fn happy_path() -> Vec<String> {
    [ROLE_LIST_URL, CREDENTIALS_URL, TOKEN_URL, LOGIN_URL]
        .iter()
        .map(|u| u.to_string())
        .collect()
}
