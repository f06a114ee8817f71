//! Inbound event pipeline: dedup → staleness → reply decision → dispatch.
//!
//! A message id is recorded before anything else happens, so a redelivery after a crash or a
//! concurrent duplicate never produces a second reply (at-most-once).

pub mod dedup;
pub mod dispatcher;
pub mod responder;
pub mod staleness;
pub mod state;

pub use dedup::ProcessedMessageCache;
pub use dispatcher::{Dispatched, Dispatcher, SequenceReport};
pub use responder::{Decision, Reply, Responder, Transition};
pub use staleness::Freshness;
pub use state::{ConversationState, ConversationStore};

use crate::channels::{ChannelHandle, InboundMessage};
use crate::config::PipelineConfig;
use crate::directory::Directory;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// What happened to one inbound message.
#[derive(Debug)]
pub enum Outcome {
    /// Id already handled; dropped.
    Duplicate,
    /// Older than the staleness window; recorded but not answered.
    Stale { age: Duration },
    /// Handled, nothing to send.
    NoReply,
    Replied {
        transition: Transition,
        dispatched: Dispatched,
    },
}

/// Owns the shared stores and runs each inbound message through the steps.
pub struct Pipeline {
    processed: Arc<ProcessedMessageCache>,
    conversations: Arc<ConversationStore>,
    responder: Responder,
    dispatcher: Dispatcher,
    staleness_window: Duration,
}

impl Pipeline {
    pub fn new(
        directory: Arc<dyn Directory>,
        channel: Arc<dyn ChannelHandle>,
        settings: &PipelineConfig,
    ) -> Self {
        let conversations = Arc::new(ConversationStore::new());
        Self {
            processed: Arc::new(ProcessedMessageCache::new(settings.dedup_capacity)),
            responder: Responder::new(directory, conversations.clone()),
            conversations,
            dispatcher: Dispatcher::new(channel, settings.pacing()),
            staleness_window: settings.staleness_window(),
        }
    }

    pub fn processed(&self) -> &Arc<ProcessedMessageCache> {
        &self.processed
    }

    pub fn conversations(&self) -> &Arc<ConversationStore> {
        &self.conversations
    }

    pub async fn process(&self, msg: &InboundMessage) -> Outcome {
        self.process_at(msg, Utc::now()).await
    }

    /// Process `msg` as if received at `now`.
    pub async fn process_at(&self, msg: &InboundMessage, now: DateTime<Utc>) -> Outcome {
        if !self.processed.check_and_mark(&msg.id).await {
            log::info!("pipeline: skipping duplicate message {}", msg.id);
            return Outcome::Duplicate;
        }
        if let Freshness::Stale { age } =
            staleness::classify(&msg.timestamp, now, self.staleness_window)
        {
            log::info!(
                "pipeline: skipping message {} from {}s ago",
                msg.id,
                age.as_secs()
            );
            return Outcome::Stale { age };
        }
        log::info!(
            "pipeline: received {} message {} from {}",
            msg.kind.as_str(),
            msg.id,
            msg.sender
        );

        let decision = self.responder.respond(msg).await;
        if decision.reply.is_none() {
            log::debug!("pipeline: no reply for message {}", msg.id);
            return Outcome::NoReply;
        }
        let dispatched = self.dispatcher.dispatch(&msg.sender, decision.reply).await;
        Outcome::Replied {
            transition: decision.transition,
            dispatched,
        }
    }
}
