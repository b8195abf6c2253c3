use anyhow::Result;
use tracing::{debug, info};

use crate::dedup::DedupGuard;
use crate::intent::IntentExtractor;
use crate::platform::RawMessage;
use crate::reply::{format_reply, ReplyPayload};
use crate::resolver::{ListingSearch, Resolver};

/// The channel-agnostic core: extraction, tiered resolution, formatting,
/// gated on both sides by the channel's dedup guard. Shared immutably
/// across channels; each channel passes its own guard.
pub struct Pipeline<S> {
    extractor: IntentExtractor,
    resolver: Resolver<S>,
}

impl<S: ListingSearch> Pipeline<S> {
    pub fn new(extractor: IntentExtractor, resolver: Resolver<S>) -> Self {
        Self {
            extractor,
            resolver,
        }
    }

    /// Process one message. Returns the reply to deliver, or `None` when
    /// the message was already seen, is not a search query, or the reply
    /// would duplicate the last one sent on this channel. The caller must
    /// call `DedupGuard::record_sent` after a successful delivery.
    pub async fn handle(
        &self,
        guard: &mut DedupGuard,
        message: &RawMessage,
    ) -> Result<Option<ReplyPayload>> {
        if !guard.should_process(&message.text) {
            debug!("Already seen on {}: {}", message.channel_id, message.text);
            return Ok(None);
        }
        guard.record_seen(&message.text)?;

        let Some(intent) = self.extractor.extract(&message.text).await else {
            debug!("Not a service query: {}", message.text);
            return Ok(None);
        };

        info!(
            "Detected service=\"{}\" location=\"{}\" on {}",
            intent.service,
            intent.location.as_deref().unwrap_or("N/A"),
            message.channel_id
        );

        let result = self.resolver.resolve(&intent).await;
        let reply = format_reply(&result);

        if !guard.should_send(&reply.text) {
            info!("Duplicate reply detected on {}, not sending again", message.channel_id);
            return Ok(None);
        }

        Ok(Some(reply))
    }
}
