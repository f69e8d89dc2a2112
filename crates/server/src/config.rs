use config::ConfigError;
use serde::Deserialize;
use std::collections::HashMap;

const ENV_PREFIX: &str = "THREADLENS_";

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub reddit: RedditSettings,
    pub llm: LlmSettings,
    pub analysis: AnalysisConfig,
}

#[derive(Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub cors_origins: String,
}

#[derive(Deserialize, Clone)]
pub struct DatabaseSettings {
    pub url: String,
}

#[derive(Deserialize, Clone)]
pub struct RedditSettings {
    pub user_agent: String,
    pub proxy: Option<String>,
    pub max_retries: u32,
    pub max_retry_delay_secs: u64,
    pub timeout_secs: u64,
}

#[derive(Deserialize, Clone)]
pub struct LlmSettings {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub vision_model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

#[derive(Deserialize, Clone)]
pub struct AnalysisConfig {
    pub top_k: usize,
    pub count_tolerance: f64,
    pub score_tolerance: f64,
    pub request_timeout_secs: u64,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());
        let env_map = collect_env_vars(std::env::vars());

        let s = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("server.cors_origins", "*")?
            .set_default("database.url", "sqlite://data/threadlens.db")?
            .set_default(
                "reddit.user_agent",
                concat!("threadlens/", env!("CARGO_PKG_VERSION")),
            )?
            .set_default("reddit.max_retries", 4)?
            .set_default("reddit.max_retry_delay_secs", 15)?
            .set_default("reddit.timeout_secs", 10)?
            .set_default("llm.base_url", "https://api.openai.com/v1")?
            .set_default("llm.api_key", "")?
            .set_default("llm.model", "gpt-4o-mini")?
            .set_default("llm.vision_model", "gpt-4o-mini")?
            .set_default("llm.temperature", 0.2)?
            .set_default("llm.timeout_secs", 120)?
            .set_default("analysis.top_k", 5)?
            .set_default("analysis.count_tolerance", 0.10)?
            .set_default("analysis.score_tolerance", 0.30)?
            .set_default("analysis.request_timeout_secs", 300)?
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::File::with_name(&format!("config.{}", run_mode)).required(false))
            .add_source(config::File::from_str(
                &serde_json::to_string(&env_map)
                    .map_err(|e| ConfigError::Message(e.to_string()))?,
                config::FileFormat::Json,
            ))
            .build()?;

        s.try_deserialize()
    }
}

/// `THREADLENS_LLM__API_KEY=..` becomes `llm.api_key`.
fn collect_env_vars(vars: impl Iterator<Item = (String, String)>) -> HashMap<String, String> {
    vars.filter(|(k, _)| k.starts_with(ENV_PREFIX))
        .map(|(k, v)| {
            let key = k.trim_start_matches(ENV_PREFIX).replace("__", ".").to_lowercase();
            (key, v)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_are_nested_and_filtered() {
        let vars = vec![
            ("THREADLENS_LLM__API_KEY".to_string(), "secret".to_string()),
            ("THREADLENS_SERVER__PORT".to_string(), "8080".to_string()),
            ("HOME".to_string(), "/root".to_string()),
        ];
        let map = collect_env_vars(vars.into_iter());

        assert_eq!(map.len(), 2);
        assert_eq!(map["llm.api_key"], "secret");
        assert_eq!(map["server.port"], "8080");
    }
}
