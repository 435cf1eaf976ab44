use eli10_core::IntentStrategy;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Where chat completions are sent. All three speak the OpenAI wire format.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Provider {
    Ollama,
    OpenAI,
    Gemini,
}

impl Provider {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::Ollama => "http://localhost:11434/v1",
            Provider::OpenAI => "https://api.openai.com/v1",
            Provider::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub provider: Provider,
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub llm_base_url: String,
    pub chat_model: String,
    pub intent_strategy: IntentStrategy,
    pub audio_dir: PathBuf,
    pub tts_language: String,
    pub log_level: Level,
    /// Directory of prompt overrides; built-in templates are used when unset.
    pub prompts_path: Option<PathBuf>,
    pub topic_packs_path: Option<PathBuf>,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let provider_str = std::env::var("LLM_PROVIDER").unwrap_or_else(|_| "ollama".to_string());
        let provider = match provider_str.to_lowercase().as_str() {
            "ollama" => Provider::Ollama,
            "openai" => Provider::OpenAI,
            "gemini" => Provider::Gemini,
            other => {
                return Err(ConfigError::InvalidValue(
                    "LLM_PROVIDER".to_string(),
                    format!("'{}' is not one of ollama, openai, gemini", other),
                ));
            }
        };

        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        let gemini_api_key = std::env::var("GEMINI_API_KEY").ok();

        let llm_base_url = std::env::var("LLM_BASE_URL")
            .unwrap_or_else(|_| provider.default_base_url().to_string());

        let chat_model = std::env::var("CHAT_MODEL").unwrap_or_else(|_| "llama3.1:8b".to_string());

        let intent_strategy = match std::env::var("INTENT_STRATEGY") {
            Ok(value) => value
                .parse::<IntentStrategy>()
                .map_err(|e| ConfigError::InvalidValue("INTENT_STRATEGY".to_string(), e))?,
            Err(_) => IntentStrategy::default(),
        };

        let audio_dir = std::env::var("AUDIO_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("audio"));
        let tts_language = std::env::var("TTS_LANGUAGE").unwrap_or_else(|_| "en".to_string());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let prompts_path = std::env::var("PROMPTS_PATH").ok().map(PathBuf::from);
        let topic_packs_path = std::env::var("TOPIC_PACKS_PATH").ok().map(PathBuf::from);

        match provider {
            Provider::Ollama => {}
            Provider::OpenAI => {
                if openai_api_key.is_none() {
                    return Err(ConfigError::MissingVar(
                        "OPENAI_API_KEY must be set for 'openai' provider".to_string(),
                    ));
                }
            }
            Provider::Gemini => {
                if gemini_api_key.is_none() {
                    return Err(ConfigError::MissingVar(
                        "GEMINI_API_KEY must be set for 'gemini' provider".to_string(),
                    ));
                }
            }
        }

        Ok(Self {
            bind_address,
            provider,
            openai_api_key,
            gemini_api_key,
            llm_base_url,
            chat_model,
            intent_strategy,
            audio_dir,
            tts_language,
            log_level,
            prompts_path,
            topic_packs_path,
        })
    }

    /// The key sent with chat requests. Ollama ignores it.
    pub fn api_key(&self) -> &str {
        match self.provider {
            Provider::Ollama => "ollama",
            Provider::OpenAI => self.openai_api_key.as_deref().unwrap_or_default(),
            Provider::Gemini => self.gemini_api_key.as_deref().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use tracing::Level;

    fn clear_env_vars() {
        unsafe {
            env::remove_var("BIND_ADDRESS");
            env::remove_var("LLM_PROVIDER");
            env::remove_var("OPENAI_API_KEY");
            env::remove_var("GEMINI_API_KEY");
            env::remove_var("LLM_BASE_URL");
            env::remove_var("CHAT_MODEL");
            env::remove_var("INTENT_STRATEGY");
            env::remove_var("AUDIO_DIR");
            env::remove_var("TTS_LANGUAGE");
            env::remove_var("RUST_LOG");
            env::remove_var("PROMPTS_PATH");
            env::remove_var("TOPIC_PACKS_PATH");
        }
    }

    #[test]
    fn test_config_error_display() {
        let missing_var = ConfigError::MissingVar("TEST_VAR".to_string());
        assert_eq!(
            format!("{}", missing_var),
            "Missing environment variable: TEST_VAR"
        );

        let invalid_value =
            ConfigError::InvalidValue("TEST_VAR".to_string(), "bad_value".to_string());
        assert_eq!(
            format!("{}", invalid_value),
            "Invalid value for environment variable TEST_VAR: bad_value"
        );
    }

    #[test]
    #[serial]
    fn test_config_defaults_to_local_ollama() {
        clear_env_vars();

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "0.0.0.0:8000");
        assert_eq!(config.provider, Provider::Ollama);
        assert_eq!(config.llm_base_url, "http://localhost:11434/v1");
        assert_eq!(config.chat_model, "llama3.1:8b");
        assert_eq!(config.intent_strategy, IntentStrategy::Model);
        assert_eq!(config.audio_dir, PathBuf::from("audio"));
        assert_eq!(config.tts_language, "en");
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.prompts_path, None);
        assert_eq!(config.topic_packs_path, None);
        assert_eq!(config.api_key(), "ollama");
    }

    #[test]
    #[serial]
    fn test_config_from_env_gemini_provider() {
        clear_env_vars();
        unsafe {
            env::set_var("LLM_PROVIDER", "gemini");
            env::set_var("GEMINI_API_KEY", "test-gemini-key");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.provider, Provider::Gemini);
        assert_eq!(
            config.llm_base_url,
            "https://generativelanguage.googleapis.com/v1beta/openai"
        );
        assert_eq!(config.api_key(), "test-gemini-key");
        assert_eq!(config.openai_api_key, None);
    }

    #[test]
    #[serial]
    fn test_config_from_env_custom_values() {
        clear_env_vars();
        unsafe {
            env::set_var("BIND_ADDRESS", "127.0.0.1:8080");
            env::set_var("LLM_PROVIDER", "OpenAI");
            env::set_var("OPENAI_API_KEY", "custom-openai-key");
            env::set_var("LLM_BASE_URL", "http://proxy.local/v1");
            env::set_var("CHAT_MODEL", "gpt-4o-mini");
            env::set_var("INTENT_STRATEGY", "lexical");
            env::set_var("AUDIO_DIR", "/tmp/eli10-audio");
            env::set_var("TTS_LANGUAGE", "fr");
            env::set_var("RUST_LOG", "debug");
            env::set_var("PROMPTS_PATH", "/custom/prompts");
            env::set_var("TOPIC_PACKS_PATH", "/custom/packs.json");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "127.0.0.1:8080");
        assert_eq!(config.provider, Provider::OpenAI);
        assert_eq!(config.llm_base_url, "http://proxy.local/v1");
        assert_eq!(config.chat_model, "gpt-4o-mini");
        assert_eq!(config.intent_strategy, IntentStrategy::Lexical);
        assert_eq!(config.audio_dir, PathBuf::from("/tmp/eli10-audio"));
        assert_eq!(config.tts_language, "fr");
        assert_eq!(config.log_level, Level::DEBUG);
        assert_eq!(config.prompts_path, Some(PathBuf::from("/custom/prompts")));
        assert_eq!(
            config.topic_packs_path,
            Some(PathBuf::from("/custom/packs.json"))
        );
    }

    #[test]
    #[serial]
    fn test_config_invalid_bind_address() {
        clear_env_vars();
        unsafe {
            env::set_var("BIND_ADDRESS", "not-a-valid-address");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "BIND_ADDRESS"),
            _ => panic!("Expected InvalidValue for BIND_ADDRESS"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_provider_and_strategy() {
        clear_env_vars();
        unsafe {
            env::set_var("LLM_PROVIDER", "watson");
        }
        match Config::from_env().unwrap_err() {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "LLM_PROVIDER"),
            _ => panic!("Expected InvalidValue for LLM_PROVIDER"),
        }

        clear_env_vars();
        unsafe {
            env::set_var("INTENT_STRATEGY", "coin-flip");
        }
        match Config::from_env().unwrap_err() {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "INTENT_STRATEGY"),
            _ => panic!("Expected InvalidValue for INTENT_STRATEGY"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_log_level() {
        clear_env_vars();
        unsafe {
            env::set_var("RUST_LOG", "not-a-level");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "RUST_LOG"),
            _ => panic!("Expected InvalidValue for RUST_LOG"),
        }
    }

    #[test]
    #[serial]
    fn test_config_missing_api_keys() {
        clear_env_vars();
        unsafe {
            env::set_var("LLM_PROVIDER", "openai");
        }
        match Config::from_env().unwrap_err() {
            ConfigError::MissingVar(msg) => assert!(msg.contains("OPENAI_API_KEY")),
            _ => panic!("Expected MissingVar for OPENAI_API_KEY"),
        }

        clear_env_vars();
        unsafe {
            env::set_var("LLM_PROVIDER", "gemini");
        }
        match Config::from_env().unwrap_err() {
            ConfigError::MissingVar(msg) => assert!(msg.contains("GEMINI_API_KEY")),
            _ => panic!("Expected MissingVar for GEMINI_API_KEY"),
        }
    }
}
