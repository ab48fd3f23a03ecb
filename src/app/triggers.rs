//! User-facing triggers for foreground runs.
//!
//! Any number of origins feed one channel and every event is handled the
//! same way: a new foreground run on its own task. The daemon wires two
//! origins, a line on stdin and `SIGUSR1` on unix.

use super::pipeline::ConsolePipeline;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOrigin {
    Keyboard,
    Signal,
}

pub type TriggerSender = mpsc::UnboundedSender<TriggerOrigin>;

pub struct ForegroundTriggers {
    sender: TriggerSender,
    receiver: mpsc::UnboundedReceiver<TriggerOrigin>,
}

impl ForegroundTriggers {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self { sender, receiver }
    }

    pub fn sender(&self) -> TriggerSender {
        self.sender.clone()
    }

    /// Handle triggers until `shutdown` is cancelled or every sender is gone.
    /// The returned handle completes after in-flight runs have finished.
    pub fn spawn(
        self,
        pipeline: Arc<ConsolePipeline>,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let Self { receiver, .. } = self;
        tokio::spawn(listen(receiver, pipeline, shutdown))
    }
}

impl Default for ForegroundTriggers {
    fn default() -> Self {
        Self::new()
    }
}

async fn listen(
    mut receiver: mpsc::UnboundedReceiver<TriggerOrigin>,
    pipeline: Arc<ConsolePipeline>,
    shutdown: CancellationToken,
) {
    let mut runs = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            origin = receiver.recv() => match origin {
                Some(origin) => {
                    info!("Event received from {:?}", origin);
                    let pipeline = pipeline.clone();
                    runs.spawn(async move {
                        let outcome = pipeline.run(true).await;
                        info!("Foreground run {}", outcome);
                    });
                }
                None => break,
            },
            Some(_) = runs.join_next(), if !runs.is_empty() => {}
        }
    }

    while runs.join_next().await.is_some() {}
    debug!("Trigger listener stopped");
}

/// Every line read from stdin is a trigger. Ends at EOF.
pub fn spawn_keyboard_origin(sender: TriggerSender) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(_)) => {
                    if sender.send(TriggerOrigin::Keyboard).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Failed to read stdin: {}", e);
                    break;
                }
            }
        }
    })
}

/// Every `SIGUSR1` is a trigger.
#[cfg(unix)]
pub fn spawn_signal_origin(sender: TriggerSender) -> anyhow::Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut signals = signal(SignalKind::user_defined1())?;
    Ok(tokio::spawn(async move {
        while signals.recv().await.is_some() {
            if sender.send(TriggerOrigin::Signal).is_err() {
                break;
            }
        }
    }))
}
