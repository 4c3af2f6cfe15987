use std::env;
use std::path::PathBuf;

#[derive(Clone)]
pub struct Config {
    pub discord_bot_token: String,
    pub anthropic_api_key: String,
    /// Discord channel the bot chats in and sends proactive messages to.
    pub home_channel_id: u64,
    pub bot_name: String,
    pub model: String,
    pub max_tokens: u32,
    pub data_dir: PathBuf,
    pub response_prompt_path: String,
    pub report_command: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            discord_bot_token: env::var("DISCORD_BOT_TOKEN")
                .expect("DISCORD_BOT_TOKEN must be set"),
            anthropic_api_key: env::var("ANTHROPIC_API_KEY")
                .expect("ANTHROPIC_API_KEY must be set"),
            home_channel_id: env::var("HOME_CHANNEL_ID")
                .expect("HOME_CHANNEL_ID must be set")
                .parse()
                .expect("HOME_CHANNEL_ID must be a valid channel id"),
            bot_name: env::var("BOT_NAME").unwrap_or_else(|_| "MIRA".to_string()),
            model: env::var("MODEL")
                .unwrap_or_else(|_| "claude-3-5-haiku-20241022".to_string()),
            max_tokens: env::var("MAX_TOKENS")
                .unwrap_or_else(|_| "500".to_string())
                .parse()
                .expect("MAX_TOKENS must be a valid number"),
            data_dir: env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string()).into(),
            response_prompt_path: env::var("RESPONSE_PROMPT_PATH")
                .unwrap_or_else(|_| "./prompts/system_response.txt".to_string()),
            report_command: env::var("REPORT_COMMAND")
                .unwrap_or_else(|_| "./generate_report.sh".to_string()),
        }
    }

    pub fn history_log_path(&self) -> PathBuf {
        self.data_dir.join("logs").join("history.jsonl")
    }

    pub fn rules_path(&self) -> PathBuf {
        self.data_dir.join("explicit_rules.json")
    }

    pub fn facts_path(&self) -> PathBuf {
        self.data_dir.join("facts.md")
    }

    pub fn contextual_rules_path(&self) -> PathBuf {
        self.data_dir.join("contextual_rules.md")
    }
}
