use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::dedup::DedupGuard;
use crate::listings::ListingsClient;
use crate::pipeline::Pipeline;
use crate::platform::RawMessage;

/// Telegram glue around the pipeline. One guard per chat; the map lock
/// serializes message handling so guard writes never race.
pub struct AppState {
    pub pipeline: Pipeline<ListingsClient>,
    guards: Mutex<HashMap<String, DedupGuard>>,
    state_dir: PathBuf,
}

impl AppState {
    pub fn new(pipeline: Pipeline<ListingsClient>, state_dir: PathBuf) -> Self {
        Self {
            pipeline,
            guards: Mutex::new(HashMap::new()),
            state_dir,
        }
    }
}

/// Run the Telegram channel until the dispatcher stops.
pub async fn run(
    state: Arc<AppState>,
    bot_token: &str,
    allowed_chat_ids: Vec<i64>,
) -> Result<()> {
    let bot = Bot::new(bot_token);

    info!("Starting Telegram channel...");

    let handler = Update::filter_message()
        .filter_map(move |msg: Message| {
            if allowed_chat_ids.is_empty() || allowed_chat_ids.contains(&msg.chat.id.0) {
                Some(msg)
            } else {
                None
            }
        })
        .endpoint(handle_message);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let sender_id = match msg.from.as_ref() {
        Some(user) => user.id.0.to_string(),
        None => return Ok(()),
    };

    let text = match msg.text() {
        Some(t) => t.to_string(),
        None => return Ok(()),
    };

    let channel_id = msg.chat.id.0.to_string();
    info!("Message from {} in {}: {}", sender_id, channel_id, text);

    let incoming = RawMessage {
        text,
        channel_id: channel_id.clone(),
        sender_id,
        timestamp: msg.date.timestamp(),
    };

    let mut guards = state.guards.lock().await;
    let guard = match guards.entry(channel_id.clone()) {
        std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
        std::collections::hash_map::Entry::Vacant(e) => {
            match DedupGuard::open(&state.state_dir, &channel_id) {
                Ok(guard) => e.insert(guard),
                Err(err) => {
                    error!("Failed to open dedup state for {}: {:#}", channel_id, err);
                    return Ok(());
                }
            }
        }
    };

    match state.pipeline.handle(guard, &incoming).await {
        Ok(Some(reply)) => match bot.send_message(msg.chat.id, reply.text.clone()).await {
            Ok(_) => {
                info!("Replied in {} with {} listing(s)", channel_id, reply.count);
                if let Err(err) = guard.record_sent(&reply.text) {
                    error!("Failed to record sent reply: {:#}", err);
                }
            }
            // Delivery failure is logged, not retried.
            Err(err) => error!("Failed to send reply in {}: {:#}", channel_id, err),
        },
        Ok(None) => {}
        Err(err) => error!("Error processing message in {}: {:#}", channel_id, err),
    }

    Ok(())
}
