//! Модуль распознавания речи через OpenAI API
//!
//! Один запрос `POST /audio/transcriptions` с multipart-загрузкой файла.
//! Проверка типа и размера файла остается на стороне вызывающего.

use std::path::Path;

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::config::SpeechConfig;
use crate::error::{Result, SpeechError};
use crate::outcome::Outcome;
use crate::tts::openai::{api_error_message, build_http_client, endpoint_url};

/// Результат распознавания
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcription {
    /// Распознанный текст
    pub text: String,
}

/// Клиент для работы с OpenAI Whisper API
#[derive(Debug, Clone)]
pub struct OpenAiTranscriptionClient {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
}

impl OpenAiTranscriptionClient {
    pub fn from_config(config: &SpeechConfig) -> Result<Self> {
        let api_key = config.require_api_key()?.to_string();
        Ok(Self {
            client: build_http_client(config)?,
            api_key,
            api_base: config.api_base.clone(),
            model: config.transcription_model.clone(),
        })
    }

    /// Распознать аудиофайл с диска
    pub async fn transcribe_file(
        &self,
        path: impl AsRef<Path>,
        cancel: &CancellationToken,
    ) -> Result<Outcome<Transcription>> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio.mp3".to_string());

        log::info!("Reading audio file for transcription: {}", path.display());
        let audio = tokio::fs::read(path).await.map_err(|e| {
            log::error!("Failed to read audio file {}: {}", path.display(), e);
            SpeechError::Io(e)
        })?;

        self.transcribe_bytes(audio, &file_name, cancel).await
    }

    /// Распознать аудио из памяти
    pub async fn transcribe_bytes(
        &self,
        audio: Vec<u8>,
        file_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Outcome<Transcription>> {
        if cancel.is_cancelled() {
            return Ok(Outcome::Cancelled);
        }

        log::info!(
            "Sending transcription request ({} bytes, model {})",
            audio.len(),
            self.model
        );

        let part = Part::bytes(audio)
            .file_name(file_name.to_string())
            .mime_str(mime_type_for(file_name))?;
        let form = Form::new().part("file", part).text("model", self.model.clone());

        let request = self
            .client
            .post(endpoint_url(&self.api_base, "audio/transcriptions"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(Outcome::Cancelled),
            response = request => response?,
        };

        let status = response.status();
        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(Outcome::Cancelled),
            body = response.text() => body?,
        };

        if !status.is_success() {
            let message = api_error_message(&body, "Transcription failed");
            log::error!("OpenAI transcription error (status {}): {}", status, message);
            return Err(SpeechError::Transport(message));
        }

        let transcription: Transcription = serde_json::from_str(&body)?;
        log::info!("Transcription completed: {} chars", transcription.text.chars().count());
        Ok(Outcome::Completed(transcription))
    }
}

/// MIME тип по расширению файла
fn mime_type_for(file_name: &str) -> &'static str {
    let extension = Path::new(file_name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "mp3" | "mpga" | "mpeg" => "audio/mpeg",
        "wav" => "audio/wav",
        "m4a" | "mp4" => "audio/mp4",
        "webm" => "audio/webm",
        "ogg" | "oga" => "audio/ogg",
        "flac" => "audio/flac",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_type_for() {
        assert_eq!(mime_type_for("speech.MP3"), "audio/mpeg");
        assert_eq!(mime_type_for("voice.wav"), "audio/wav");
        assert_eq!(mime_type_for("memo.m4a"), "audio/mp4");
        assert_eq!(mime_type_for("noext"), "application/octet-stream");
    }

    #[test]
    fn test_transcription_parsing() {
        let transcription: Transcription = serde_json::from_str(r#"{"text": "Привет, мир"}"#).unwrap();
        assert_eq!(transcription.text, "Привет, мир");
    }

    #[tokio::test]
    async fn test_missing_file() {
        let config = SpeechConfig {
            api_key: "sk-test".to_string(),
            ..SpeechConfig::default()
        };
        let client = OpenAiTranscriptionClient::from_config(&config).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let error = tokio_test::assert_err!(
            client
                .transcribe_file(dir.path().join("missing.mp3"), &CancellationToken::new())
                .await
        );
        match error {
            SpeechError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            other => panic!("expected io error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancelled_before_request() {
        let config = SpeechConfig {
            api_key: "sk-test".to_string(),
            api_base: "http://127.0.0.1:9".to_string(),
            ..SpeechConfig::default()
        };
        let client = OpenAiTranscriptionClient::from_config(&config).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = client.transcribe_bytes(vec![1, 2, 3], "a.mp3", &cancel).await.unwrap();
        assert!(outcome.is_cancelled());
    }
}
