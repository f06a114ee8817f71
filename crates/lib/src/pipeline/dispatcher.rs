//! Outbound dispatch: single replies are sent inline; multi-message bursts run as a paced
//! background task so the inbound unit of work is not held for the whole sequence.

use crate::channels::{ChannelHandle, SendError};
use crate::pipeline::responder::Reply;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub const DEFAULT_PACING: Duration = Duration::from_millis(500);

/// Outcome of a paced sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequenceReport {
    pub sent: usize,
    pub failed: usize,
}

/// What `dispatch` did with a reply.
#[derive(Debug)]
pub enum Dispatched {
    Nothing,
    Single { delivered: bool },
    /// Sequence running in the background; await for its report.
    Scheduled(JoinHandle<SequenceReport>),
}

impl Dispatched {
    /// Wait for any background sequence and return (sent, failed) counts.
    pub async fn settle(self) -> SequenceReport {
        match self {
            Dispatched::Nothing => SequenceReport::default(),
            Dispatched::Single { delivered: true } => SequenceReport { sent: 1, failed: 0 },
            Dispatched::Single { delivered: false } => SequenceReport { sent: 0, failed: 1 },
            Dispatched::Scheduled(handle) => match handle.await {
                Ok(report) => report,
                Err(e) => {
                    log::warn!("dispatch: sequence task ended abnormally: {}", e);
                    SequenceReport::default()
                }
            },
        }
    }
}

/// Sends replies through a channel.
#[derive(Clone)]
pub struct Dispatcher {
    channel: Arc<dyn ChannelHandle>,
    pacing: Duration,
}

impl Dispatcher {
    pub fn new(channel: Arc<dyn ChannelHandle>, pacing: Duration) -> Self {
        Self { channel, pacing }
    }

    /// Send one message. Failures are logged and returned, never retried.
    pub async fn send(&self, to: &str, body: &str) -> Result<String, SendError> {
        match self.channel.send_message(to, body).await {
            Ok(id) => {
                log::info!("dispatch: sent reply to {} via {} ({})", to, self.channel.id(), id);
                Ok(id)
            }
            Err(e) => {
                log::warn!("dispatch: send to {} via {} failed: {}", to, self.channel.id(), e);
                Err(e)
            }
        }
    }

    /// Send `bodies` in order with the pacing delay between sends. A failed send does not stop the rest.
    pub async fn send_sequence(&self, to: &str, bodies: &[String]) -> SequenceReport {
        let mut report = SequenceReport::default();
        for (i, body) in bodies.iter().enumerate() {
            if i > 0 && !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }
            match self.send(to, body).await {
                Ok(_) => report.sent += 1,
                Err(_) => report.failed += 1,
            }
        }
        if report.failed > 0 {
            log::warn!(
                "dispatch: sequence to {} finished with {} of {} sends failed",
                to,
                report.failed,
                bodies.len()
            );
        }
        report
    }

    /// Deliver a reply: single messages inline, sequences on a spawned task.
    pub async fn dispatch(&self, to: &str, reply: Reply) -> Dispatched {
        match reply {
            Reply::None => Dispatched::Nothing,
            Reply::Single(body) => Dispatched::Single {
                delivered: self.send(to, &body).await.is_ok(),
            },
            Reply::Sequence(bodies) => {
                let this = self.clone();
                let to = to.to_string();
                Dispatched::Scheduled(tokio::spawn(async move {
                    this.send_sequence(&to, &bodies).await
                }))
            }
        }
    }
}
