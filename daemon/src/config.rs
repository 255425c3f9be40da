use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default = "Config::default")]
pub struct Config {
    #[serde(default)]
    pub recognition: RecognitionConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub commands: CommandsConfig,
    #[serde(default)]
    pub dictation: DictationConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RecognitionConfig {
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_restart_delay")]
    pub restart_delay_ms: u64,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            restart_delay_ms: default_restart_delay(),
        }
    }
}

fn default_language() -> String {
    "en-US".to_string()
}

fn default_restart_delay() -> u64 {
    100
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SpeechConfig {
    #[serde(default = "default_speech_enabled")]
    pub enabled: bool,
    #[serde(default = "default_rate")]
    pub rate: f32,
    #[serde(default = "default_volume")]
    pub volume: f32,
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,
    #[serde(default = "default_resume_delay")]
    pub resume_delay_ms: u64,
    #[serde(default = "default_interrupt_settle")]
    pub interrupt_settle_ms: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: default_speech_enabled(),
            rate: default_rate(),
            volume: default_volume(),
            voice: None,
            max_chunk_chars: default_max_chunk_chars(),
            resume_delay_ms: default_resume_delay(),
            interrupt_settle_ms: default_interrupt_settle(),
        }
    }
}

fn default_speech_enabled() -> bool {
    true
}

fn default_rate() -> f32 {
    1.0
}

fn default_volume() -> f32 {
    0.8
}

fn default_max_chunk_chars() -> usize {
    200
}

fn default_resume_delay() -> u64 {
    500
}

fn default_interrupt_settle() -> u64 {
    100
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CommandsConfig {
    #[serde(default = "default_confirm_actions")]
    pub confirm_actions: bool,
    /// Zero keeps a pending confirmation until it is answered.
    #[serde(default = "default_confirmation_timeout")]
    pub confirmation_timeout_ms: u64,
    #[serde(default = "default_status_reset")]
    pub status_reset_ms: u64,
    /// Extra phrases, mapped to action ids such as `"delete"` or `"compose-email"`.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            confirm_actions: default_confirm_actions(),
            confirmation_timeout_ms: default_confirmation_timeout(),
            status_reset_ms: default_status_reset(),
            aliases: BTreeMap::new(),
        }
    }
}

impl CommandsConfig {
    pub fn confirmation_timeout(&self) -> Option<Duration> {
        (self.confirmation_timeout_ms > 0).then(|| Duration::from_millis(self.confirmation_timeout_ms))
    }
}

fn default_confirm_actions() -> bool {
    true
}

fn default_confirmation_timeout() -> u64 {
    10000
}

fn default_status_reset() -> u64 {
    1000
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DictationConfig {
    #[serde(default = "default_duplicate_window")]
    pub duplicate_window_ms: u64,
}

impl Default for DictationConfig {
    fn default() -> Self {
        Self {
            duplicate_window_ms: default_duplicate_window(),
        }
    }
}

fn default_duplicate_window() -> u64 {
    2000
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RateLimitConfig {
    #[serde(default = "default_commands_per_second")]
    pub commands_per_second: u32,
    #[serde(default = "default_burst_capacity")]
    pub burst_capacity: u32,
    #[serde(default = "default_rate_limit_enabled")]
    pub enabled: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            commands_per_second: default_commands_per_second(),
            burst_capacity: default_burst_capacity(),
            enabled: default_rate_limit_enabled(),
        }
    }
}

fn default_commands_per_second() -> u32 {
    10
}

fn default_burst_capacity() -> u32 {
    20
}

fn default_rate_limit_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TimeoutsConfig {
    #[serde(default = "default_socket_operation_timeout")]
    pub socket_operation_timeout_seconds: u64,
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            socket_operation_timeout_seconds: default_socket_operation_timeout(),
            tick_interval_ms: default_tick_interval(),
        }
    }
}

fn default_socket_operation_timeout() -> u64 {
    10
}

fn default_tick_interval() -> u64 {
    50
}

impl Default for Config {
    fn default() -> Self {
        Self {
            recognition: RecognitionConfig::default(),
            speech: SpeechConfig::default(),
            commands: CommandsConfig::default(),
            dictation: DictationConfig::default(),
            rate_limit: RateLimitConfig::default(),
            timeouts: TimeoutsConfig::default(),
        }
    }
}

pub fn load_config() -> Result<Config> {
    match get_config_path() {
        Some(config_path) => load_config_from(&config_path),
        None => {
            tracing::warn!("No config directory available, using defaults");
            Ok(Config::default())
        }
    }
}

pub fn load_config_from(config_path: &Path) -> Result<Config> {
    if !config_path.exists() {
        tracing::info!("Config file not found at {:?}, using defaults", config_path);
        return Ok(Config::default());
    }

    tracing::info!("Loading config from {:?}", config_path);
    let config_str = std::fs::read_to_string(config_path)
        .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

    let config: Config = toml::from_str(&config_str)
        .map_err(|e| anyhow::anyhow!("Failed to parse config file: {}", e))?;

    tracing::info!("Config loaded successfully");
    Ok(config)
}

fn get_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("voxmail").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.recognition.language, "en-US");
        assert_eq!(config.recognition.restart_delay_ms, 100);

        assert!(config.speech.enabled);
        assert_eq!(config.speech.rate, 1.0);
        assert_eq!(config.speech.volume, 0.8);
        assert_eq!(config.speech.voice, None);
        assert_eq!(config.speech.max_chunk_chars, 200);
        assert_eq!(config.speech.resume_delay_ms, 500);
        assert_eq!(config.speech.interrupt_settle_ms, 100);

        assert!(config.commands.confirm_actions);
        assert_eq!(config.commands.confirmation_timeout_ms, 10000);
        assert_eq!(config.commands.status_reset_ms, 1000);
        assert!(config.commands.aliases.is_empty());

        assert_eq!(config.dictation.duplicate_window_ms, 2000);

        assert_eq!(config.rate_limit.commands_per_second, 10);
        assert_eq!(config.rate_limit.burst_capacity, 20);
        assert!(config.rate_limit.enabled);

        assert_eq!(config.timeouts.socket_operation_timeout_seconds, 10);
        assert_eq!(config.timeouts.tick_interval_ms, 50);
    }

    #[test]
    fn test_config_toml_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();

        assert!(toml_str.contains("[recognition]"));
        assert!(toml_str.contains("[speech]"));
        assert!(toml_str.contains("[commands]"));
        assert!(toml_str.contains("[dictation]"));
        assert!(toml_str.contains("[rate_limit]"));
        assert!(toml_str.contains("[timeouts]"));
    }

    #[test]
    fn test_config_toml_round_trip() {
        let mut config = Config::default();
        config
            .commands
            .aliases
            .insert("trash it".to_string(), "delete".to_string());
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(config, parsed);
    }

    #[test]
    fn test_config_with_custom_sections() {
        let toml_str = r#"
            [recognition]
            language = "en-GB"
            restart_delay_ms = 250

            [speech]
            rate = 1.25
            volume = 0.5
            voice = "Daniel"
            max_chunk_chars = 120

            [commands]
            confirm_actions = false
            confirmation_timeout_ms = 0

            [commands.aliases]
            "trash it" = "delete"
            "new message" = "compose-email"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();

        assert_eq!(config.recognition.language, "en-GB");
        assert_eq!(config.recognition.restart_delay_ms, 250);
        assert_eq!(config.speech.rate, 1.25);
        assert_eq!(config.speech.volume, 0.5);
        assert_eq!(config.speech.voice.as_deref(), Some("Daniel"));
        assert_eq!(config.speech.max_chunk_chars, 120);
        assert_eq!(config.speech.resume_delay_ms, 500);
        assert!(!config.commands.confirm_actions);
        assert_eq!(config.commands.confirmation_timeout(), None);
        assert_eq!(
            config.commands.aliases.get("new message").map(String::as_str),
            Some("compose-email")
        );
    }

    #[test]
    fn test_config_with_missing_fields_uses_defaults() {
        let toml_str = r#"
            [speech]
            volume = 0.3

            [dictation]
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();

        assert_eq!(config.speech.volume, 0.3);
        assert_eq!(config.speech.rate, 1.0);
        assert_eq!(config.dictation.duplicate_window_ms, 2000);
        assert_eq!(config.recognition.language, "en-US");
    }

    #[test]
    fn test_config_with_invalid_toml() {
        let toml_str = "invalid toml content [unclosed";
        let result: Result<Config, _> = toml::from_str(toml_str);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_with_invalid_types() {
        let toml_str = r#"
            [recognition]
            restart_delay_ms = "soon"
        "#;
        let result: Result<Config, _> = toml::from_str(toml_str);
        assert!(result.is_err());
    }

    #[test]
    fn test_confirmation_timeout_duration() {
        let config = Config::default();
        assert_eq!(
            config.commands.confirmation_timeout(),
            Some(Duration::from_millis(10000))
        );
    }

    #[test]
    fn test_default_helpers() {
        assert_eq!(default_language(), "en-US");
        assert_eq!(default_restart_delay(), 100);
        assert_eq!(default_max_chunk_chars(), 200);
        assert_eq!(default_duplicate_window(), 2000);
        assert_eq!(default_commands_per_second(), 10);
        assert_eq!(default_burst_capacity(), 20);
    }

    #[test]
    fn test_load_config_from_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[dictation]\nduplicate_window_ms = 750").unwrap();

        let config = load_config_from(file.path()).unwrap();
        assert_eq!(config.dictation.duplicate_window_ms, 750);
        assert_eq!(config.speech.max_chunk_chars, 200);
    }

    #[test]
    fn test_load_config_from_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[speech\nrate = ").unwrap();

        let err = load_config_from(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
