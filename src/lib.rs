//! Основной файл библиотеки chunked-speech
//!
//! Библиотека озвучивает текст произвольной длины через OpenAI TTS: текст
//! режется на сегменты, сегменты синтезируются параллельно с отслеживанием
//! прогресса и возможностью отмены, а результаты склеиваются по порядку.
//! Дополнительно доступно распознавание аудиофайлов (Whisper).

pub mod assembler;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod logger;
pub mod outcome;
pub mod progress;
pub mod segmenter;
pub mod transcription;
pub mod tts;

use std::sync::Arc;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;

pub use crate::assembler::{concatenate, AudioAssembler};
pub use crate::config::SpeechConfig;
pub use crate::dispatcher::SynthesisDispatcher;
pub use crate::error::{Result, SpeechError};
pub use crate::outcome::Outcome;
pub use crate::progress::{ChannelObserver, ProgressObserver, ProgressState, ProgressTracker};
pub use crate::segmenter::{segment_text, split_text_into_chunks, Segment};
pub use crate::transcription::{OpenAiTranscriptionClient, Transcription};
pub use crate::tts::{OpenAiSpeechClient, SpeechBackend, SynthesisParameters};

/// Основная структура для синтеза речи
pub struct SpeechSynthesizer<B: ?Sized> {
    config: SpeechConfig,
    dispatcher: SynthesisDispatcher<B>,
}

impl SpeechSynthesizer<OpenAiSpeechClient> {
    /// Создать синтезатор поверх OpenAI API
    pub fn from_config(config: SpeechConfig) -> Result<Self> {
        let backend = Arc::new(OpenAiSpeechClient::from_config(&config)?);
        Self::with_backend(config, backend)
    }
}

impl<B> SpeechSynthesizer<B>
where
    B: SpeechBackend + ?Sized + 'static,
{
    /// Создать синтезатор с произвольной реализацией удаленного синтеза
    pub fn with_backend(config: SpeechConfig, backend: Arc<B>) -> Result<Self> {
        config.validate()?;
        let dispatcher =
            SynthesisDispatcher::new(backend).with_max_concurrent_requests(config.max_concurrent_requests);
        Ok(Self { config, dispatcher })
    }

    pub fn config(&self) -> &SpeechConfig {
        &self.config
    }

    /// Озвучить текст целиком.
    ///
    /// Возвращает один буфер MP3, `Outcome::Cancelled` при отмене или
    /// первую ошибку любого сегмента.
    pub async fn generate_speech(
        &self,
        text: &str,
        cancel: &CancellationToken,
        observer: Option<Arc<dyn ProgressObserver>>,
    ) -> Result<Outcome<Bytes>> {
        let segments = segment_text(text, self.config.max_chars);
        if segments.is_empty() {
            return Err(SpeechError::EmptyInput);
        }

        log::debug!(
            "Split {} chars of text into {} segment(s) (max {} chars)",
            text.chars().count(),
            segments.len(),
            self.config.max_chars
        );

        let params = SynthesisParameters::from_config(&self.config);
        let outcome = self
            .dispatcher
            .synthesize(&segments, &params, cancel, observer)
            .await?;

        Ok(outcome.map(|parts| concatenate(&parts)))
    }
}

/// Публичный API для удобного использования
pub async fn generate_speech(
    api_key: &str,
    text: &str,
    voice: &str,
    model: &str,
    cancel: &CancellationToken,
    observer: Option<Arc<dyn ProgressObserver>>,
) -> Result<Outcome<Bytes>> {
    let config = SpeechConfig {
        api_key: api_key.to_string(),
        voice: voice.to_string(),
        model: model.to_string(),
        ..SpeechConfig::default()
    };

    let synthesizer = SpeechSynthesizer::from_config(config)?;
    synthesizer.generate_speech(text, cancel, observer).await
}

#[cfg(test)]
mod tests {
    mod test_dispatcher;
    mod test_openai_client;
    mod test_synthesizer;
    pub(crate) mod fakes;
}
