//! # OpenAI TTS Integration
//!
//! Клиент `POST /audio/speech` OpenAI API. Один вызов - один сегмент текста;
//! разбиение, параллельность и склейка находятся в диспетчере.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::{SpeechBackend, SynthesisParameters};
use crate::config::{SpeechConfig, DEFAULT_API_BASE};
use crate::error::{Result, SpeechError};

/// Формат аудио, который запрашивается у API
const RESPONSE_FORMAT: &str = "mp3";

/// Параметры запроса к API OpenAI TTS
#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

/// Клиент для работы с OpenAI TTS API
#[derive(Debug, Clone)]
pub struct OpenAiSpeechClient {
    client: Client,
    api_key: String,
    api_base: String,
}

impl OpenAiSpeechClient {
    /// Создать клиент с адресом API по умолчанию
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let config = SpeechConfig {
            api_key: api_key.into(),
            ..SpeechConfig::default()
        };
        Self::from_config(&config)
    }

    /// Создать клиент из конфигурации
    pub fn from_config(config: &SpeechConfig) -> Result<Self> {
        let api_key = config.require_api_key()?.to_string();
        Ok(Self {
            client: build_http_client(config)?,
            api_key,
            api_base: config.api_base.clone(),
        })
    }

    /// Заменить базовый адрес API
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn speech_url(&self) -> String {
        endpoint_url(&self.api_base, "audio/speech")
    }
}

#[async_trait]
impl SpeechBackend for OpenAiSpeechClient {
    async fn synthesize_segment(
        &self,
        text: &str,
        params: &SynthesisParameters,
        cancel: &CancellationToken,
    ) -> Result<Bytes> {
        if cancel.is_cancelled() {
            return Err(SpeechError::Cancelled);
        }

        let body = SpeechRequest {
            model: &params.model,
            input: text,
            voice: &params.voice,
            response_format: RESPONSE_FORMAT,
        };

        log::debug!(
            "Sending TTS request to OpenAI API ({} chars, voice {}, model {})",
            text.chars().count(),
            params.voice,
            params.model
        );

        let request = self
            .client
            .post(self.speech_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SpeechError::Cancelled),
            response = request => response?,
        };

        let status = response.status();
        if !status.is_success() {
            let error_text = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SpeechError::Cancelled),
                text = response.text() => text.unwrap_or_default(),
            };
            let message = api_error_message(&error_text, "Speech generation failed");
            log::error!("OpenAI API error (status {}): {}", status, message);
            return Err(SpeechError::Transport(message));
        }

        let audio = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SpeechError::Cancelled),
            audio = response.bytes() => audio?,
        };

        log::debug!("Received {} bytes of audio from OpenAI API", audio.len());
        Ok(audio)
    }
}

/// HTTP клиент с таймаутом из конфигурации
pub(crate) fn build_http_client(config: &SpeechConfig) -> Result<Client> {
    let mut builder = Client::builder();
    if let Some(timeout) = config.request_timeout() {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

/// Полный адрес метода API
pub(crate) fn endpoint_url(api_base: &str, path: &str) -> String {
    let base = if api_base.trim().is_empty() {
        DEFAULT_API_BASE
    } else {
        api_base.trim()
    };
    format!("{}/{}", base.trim_end_matches('/'), path)
}

/// Текст ошибки из ответа вида `{"error": {"message": ...}}`
pub(crate) fn api_error_message(body: &str, fallback: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|body| body.error)
        .and_then(|error| error.message)
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_message() {
        let body = r#"{"error": {"message": "Invalid API key", "type": "invalid_request_error"}}"#;
        assert_eq!(api_error_message(body, "fallback"), "Invalid API key");

        assert_eq!(api_error_message(r#"{"error": {}}"#, "fallback"), "fallback");
        assert_eq!(api_error_message(r#"{"error": {"message": ""}}"#, "fallback"), "fallback");
        assert_eq!(api_error_message("<html>Bad gateway</html>", "fallback"), "fallback");
        assert_eq!(api_error_message("", "fallback"), "fallback");
    }

    #[test]
    fn test_endpoint_url() {
        assert_eq!(
            endpoint_url("https://api.openai.com/v1", "audio/speech"),
            "https://api.openai.com/v1/audio/speech"
        );
        assert_eq!(endpoint_url("http://localhost:8080/v1/", "audio/speech"), "http://localhost:8080/v1/audio/speech");
        assert_eq!(endpoint_url("", "audio/speech"), "https://api.openai.com/v1/audio/speech");
    }

    #[test]
    fn test_request_body() {
        let body = SpeechRequest {
            model: "tts-1-hd",
            input: "Привет",
            voice: "nova",
            response_format: RESPONSE_FORMAT,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "model": "tts-1-hd",
                "input": "Привет",
                "voice": "nova",
                "response_format": "mp3"
            })
        );
    }

    #[test]
    fn test_client_requires_api_key() {
        assert!(matches!(OpenAiSpeechClient::new("  "), Err(SpeechError::Configuration(_))));
        assert!(OpenAiSpeechClient::new("sk-test").is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_before_request() {
        let client = OpenAiSpeechClient::new("sk-test")
            .unwrap()
            .with_api_base("http://127.0.0.1:9");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let params = SynthesisParameters::new("alloy", "tts-1");
        let result = client.synthesize_segment("Hello.", &params, &cancel).await;
        assert!(matches!(result, Err(SpeechError::Cancelled)));
    }
}
