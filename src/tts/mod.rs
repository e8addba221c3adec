//! Модуль для работы с TTS
//!
//! Содержит трейт удаленного синтеза одного сегмента и его реализацию
//! поверх OpenAI API.

pub mod openai;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::config::SpeechConfig;
use crate::error::Result;

pub use openai::OpenAiSpeechClient;

/// Параметры синтеза, общие для всех сегментов одного вызова.
///
/// Значения не проверяются локально и передаются API как есть.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisParameters {
    /// Голос TTS
    pub voice: String,
    /// Модель TTS
    pub model: String,
}

impl SynthesisParameters {
    pub fn new(voice: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            voice: voice.into(),
            model: model.into(),
        }
    }

    pub fn from_config(config: &SpeechConfig) -> Self {
        Self::new(config.voice.clone(), config.model.clone())
    }
}

/// Удаленный синтез одного сегмента текста.
///
/// Реализация должна прекращать работу и возвращать
/// `SpeechError::Cancelled`, как только `cancel` отменен.
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    async fn synthesize_segment(
        &self,
        text: &str,
        params: &SynthesisParameters,
        cancel: &CancellationToken,
    ) -> Result<Bytes>;
}
