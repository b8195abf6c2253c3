use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

/// Message identity is a bounded prefix of the text; longer near-identical
/// messages colliding is an accepted approximation.
const MESSAGE_ID_CHARS: usize = 80;

/// Per-channel seen-message and last-reply tracking, persisted to flat
/// files after every mutation. A crash loses at most the in-flight item.
/// Guards are never shared across channels.
pub struct DedupGuard {
    seen_path: PathBuf,
    last_reply_path: PathBuf,
    seen: HashSet<String>,
    // Insertion order, mirrored into the file verbatim.
    seen_order: Vec<String>,
    last_reply: Option<String>,
}

impl DedupGuard {
    /// Load (or initialize) the state files for one channel. Missing or
    /// corrupt files start the guard empty rather than failing startup.
    pub fn open(state_dir: &Path, channel_id: &str) -> Result<Self> {
        std::fs::create_dir_all(state_dir).with_context(|| {
            format!("Failed to create state directory: {}", state_dir.display())
        })?;

        let slug = sanitize(channel_id);
        let seen_path = state_dir.join(format!("seen_{}.json", slug));
        let last_reply_path = state_dir.join(format!("last_reply_{}.txt", slug));

        let seen_order = match std::fs::read_to_string(&seen_path) {
            Ok(content) => match serde_json::from_str::<Vec<String>>(&content) {
                Ok(ids) => ids,
                Err(e) => {
                    warn!("Ignoring corrupt seen file {}: {}", seen_path.display(), e);
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };
        let seen = seen_order.iter().cloned().collect();

        let last_reply = std::fs::read_to_string(&last_reply_path)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(Self {
            seen_path,
            last_reply_path,
            seen,
            seen_order,
            last_reply,
        })
    }

    pub fn should_process(&self, message_text: &str) -> bool {
        !self.seen.contains(&message_id(message_text))
    }

    /// Mark a message as seen and persist the whole set synchronously.
    pub fn record_seen(&mut self, message_text: &str) -> Result<()> {
        let id = message_id(message_text);
        if self.seen.insert(id.clone()) {
            self.seen_order.push(id);
            let json = serde_json::to_string(&self.seen_order)?;
            std::fs::write(&self.seen_path, json).with_context(|| {
                format!("Failed to persist seen set: {}", self.seen_path.display())
            })?;
        }
        Ok(())
    }

    /// Exact equality against the single last-sent reply for this channel.
    pub fn should_send(&self, reply_text: &str) -> bool {
        match &self.last_reply {
            Some(last) => last != reply_text.trim(),
            None => true,
        }
    }

    /// Overwrite the last-reply record after a successful send.
    pub fn record_sent(&mut self, reply_text: &str) -> Result<()> {
        let trimmed = reply_text.trim().to_string();
        std::fs::write(&self.last_reply_path, &trimmed).with_context(|| {
            format!(
                "Failed to persist last reply: {}",
                self.last_reply_path.display()
            )
        })?;
        self.last_reply = Some(trimmed);
        Ok(())
    }
}

fn message_id(text: &str) -> String {
    match text.char_indices().nth(MESSAGE_ID_CHARS) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

fn sanitize(channel_id: &str) -> String {
    channel_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
