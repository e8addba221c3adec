//! Модуль конфигурации библиотеки chunked-speech
//!
//! Голос и модель передаются удаленному API без изменений; здесь
//! проверяются только границы, которые важны самому конвейеру.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpeechError};

/// Максимальная длина одного запроса к OpenAI TTS в символах
pub const MAX_CHARS: usize = 4096;

/// Базовый адрес OpenAI API
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Конфигурация синтеза и распознавания речи
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// API ключ для OpenAI
    pub api_key: String,
    /// Базовый адрес API
    pub api_base: String,
    /// Голос TTS
    pub voice: String,
    /// Модель TTS
    pub model: String,
    /// Максимальный размер сегмента в символах
    pub max_chars: usize,
    /// Ограничение одновременных запросов; `None` означает запрос на каждый
    /// сегмент сразу
    pub max_concurrent_requests: Option<usize>,
    /// Таймаут одного HTTP запроса в секундах
    pub request_timeout_secs: Option<u64>,
    /// Модель распознавания речи
    pub transcription_model: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            voice: "alloy".to_string(),
            model: "tts-1".to_string(),
            max_chars: MAX_CHARS,
            max_concurrent_requests: None,
            request_timeout_secs: None,
            transcription_model: "whisper-1".to_string(),
        }
    }
}

impl SpeechConfig {
    /// Собрать конфигурацию из переменных окружения поверх значений по умолчанию
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Прочитать конфигурацию из JSON файла
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: SpeechConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(key) = lookup("OPENAI_API_KEY") {
            config.api_key = key;
        }
        if let Some(base) = lookup("OPENAI_API_BASE") {
            config.api_base = base;
        }
        if let Some(voice) = lookup("TTS_VOICE") {
            config.voice = voice;
        }
        if let Some(model) = lookup("TTS_MODEL") {
            config.model = model;
        }
        if let Some(value) = lookup("TTS_MAX_CHARS") {
            config.max_chars = parse_number("TTS_MAX_CHARS", &value)?;
        }
        if let Some(value) = lookup("TTS_MAX_CONCURRENT") {
            config.max_concurrent_requests = Some(parse_number("TTS_MAX_CONCURRENT", &value)?);
        }
        if let Some(value) = lookup("TTS_REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = Some(parse_number("TTS_REQUEST_TIMEOUT_SECS", &value)?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Проверить значения конфигурации
    pub fn validate(&self) -> Result<()> {
        if self.max_chars == 0 {
            return Err(SpeechError::Configuration("max_chars must be greater than zero".to_string()));
        }
        if self.max_concurrent_requests == Some(0) {
            return Err(SpeechError::Configuration(
                "max_concurrent_requests must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Проверить наличие API ключа
    pub fn require_api_key(&self) -> Result<&str> {
        let key = self.api_key.trim();
        if key.is_empty() {
            log::error!("OpenAI API key is empty");
            return Err(SpeechError::Configuration("OpenAI API key is required".to_string()));
        }
        Ok(key)
    }

    /// Таймаут запроса, если он задан
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| SpeechError::Configuration(format!("{} must be a positive number, got '{}'", name, value)))
}
