pub mod telegram;

/// A message received from any channel.
#[derive(Debug, Clone)]
pub struct RawMessage {
    /// The message text.
    pub text: String,
    /// Channel-specific chat/thread id as string.
    pub channel_id: String,
    /// Channel-specific sender id as string.
    pub sender_id: String,
    /// Unix timestamp of the message.
    pub timestamp: i64,
}
