use std::sync::Arc;

use serenity::all::{Client, Context, EventHandler, GatewayIntents, Message, Ready};

use crate::channels::dispatcher::MessageDispatcher;
use crate::channels::types::NormalizedMessage;
use crate::commands;

struct DiscordHandler {
    dispatcher: Arc<MessageDispatcher>,
}

#[serenity::async_trait]
impl EventHandler for DiscordHandler {
    async fn message(&self, ctx: Context, msg: Message) {
        // Ignore messages from bots (including ourselves)
        if msg.author.bot {
            return;
        }

        let text = msg.content.clone();
        if text.is_empty() {
            return;
        }

        let state = self.dispatcher.state();

        // Commands work on any channel the bot can read; unrecognized
        // "!" text falls through to normal chat handling.
        if let Some(reply) = commands::handle(&text, &msg.author.name, state).await {
            for chunk in split_message(&reply, 2000) {
                if let Err(e) = msg.channel_id.say(&ctx.http, &chunk).await {
                    log::error!("[DISCORD] Failed to send command reply: {}", e);
                }
            }
            return;
        }

        // Free-form chat only happens on the home channel
        if msg.channel_id.get() != state.config.home_channel_id {
            return;
        }

        let user_name = match msg.author.discriminator {
            Some(disc) => format!("{}#{}", msg.author.name, disc),
            None => msg.author.name.clone(),
        };

        let normalized = NormalizedMessage {
            channel_id: msg.channel_id.get().to_string(),
            user_id: msg.author.id.to_string(),
            user_name,
            text,
        };

        let result = self.dispatcher.dispatch(normalized).await;

        if let Some(error) = result.error {
            let error_msg = format!("Sorry, I ran into an error: {}", error);
            let _ = msg.channel_id.say(&ctx.http, &error_msg).await;
        } else if !result.response.is_empty() {
            // Discord has a 2000 character limit per message
            for chunk in split_message(&result.response, 2000) {
                if let Err(e) = msg.channel_id.say(&ctx.http, &chunk).await {
                    log::error!("[DISCORD] Failed to send message: {}", e);
                }
            }
        }
    }

    async fn ready(&self, _ctx: Context, ready: Ready) {
        log::info!("[DISCORD] Bot connected as {}", ready.user.name);
    }
}

/// Split a message into chunks respecting Discord's character limit
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        if current.len() + line.len() + 1 > max_len {
            if !current.is_empty() {
                chunks.push(current);
                current = String::new();
            }
            if line.len() > max_len {
                let mut remaining = line;
                while remaining.len() > max_len {
                    let mut cut = max_len;
                    while !remaining.is_char_boundary(cut) {
                        cut -= 1;
                    }
                    chunks.push(remaining[..cut].to_string());
                    remaining = &remaining[cut..];
                }
                if !remaining.is_empty() {
                    current = remaining.to_string();
                }
            } else {
                current = line.to_string();
            }
        } else {
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Start the Discord listener. Blocks for the lifetime of the gateway
/// connection.
pub async fn start_discord_listener(dispatcher: Arc<MessageDispatcher>) -> Result<(), String> {
    let token = dispatcher.state().config.discord_bot_token.clone();

    let intents = GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let handler = DiscordHandler { dispatcher };

    let mut client = Client::builder(&token, intents)
        .event_handler(handler)
        .await
        .map_err(|e| format!("Failed to create Discord client: {}", e))?;

    log::info!("[DISCORD] Client created, connecting to gateway");

    client
        .start()
        .await
        .map_err(|e| format!("Discord client error: {}", e))
}

#[cfg(test)]
mod tests {
    use super::split_message;

    #[test]
    fn short_messages_stay_whole() {
        assert_eq!(split_message("hello", 2000), vec!["hello"]);
    }

    #[test]
    fn long_messages_split_on_lines() {
        let text = format!("{}\n{}", "a".repeat(1500), "b".repeat(1500));
        let chunks = split_message(&text, 2000);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.len() <= 2000));
    }

    #[test]
    fn oversized_single_line_is_hard_split() {
        let text = "x".repeat(4500);
        let chunks = split_message(&text, 2000);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.len() <= 2000));
    }
}
