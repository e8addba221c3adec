//! Модуль обработки ошибок библиотеки chunked-speech
//!
//! Этот модуль содержит типы ошибок, которые могут возникнуть при синтезе
//! и распознавании речи.

use thiserror::Error;

/// Ошибки библиотеки chunked-speech
#[derive(Debug, Error)]
pub enum SpeechError {
    /// Удаленный запрос завершился ошибкой
    #[error("Transport error: {0}")]
    Transport(String),

    /// Ошибка HTTP клиента
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Операция отменена.
    ///
    /// Внутренний маркер между транспортом и диспетчером: наружу отмена
    /// выходит как `Outcome::Cancelled`, а не как ошибка.
    #[error("Operation cancelled")]
    Cancelled,

    /// При сборке отсутствует результат сегмента
    #[error("Missing audio for segment {0}")]
    MissingSegment(usize),

    /// Некорректная вставка в слоты сборщика
    #[error("Assembly error: {0}")]
    Assembly(String),

    /// Нечего синтезировать
    #[error("Input text is empty")]
    EmptyInput,

    /// Ошибка конфигурации
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Задача сегмента упала или была прервана
    #[error("Segment task failed: {0}")]
    TaskFailed(String),

    /// Ошибка ввода-вывода
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Ошибка сериализации/десериализации JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SpeechError {
    /// Является ли ошибка маркером отмены
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SpeechError::Cancelled)
    }
}

/// Тип Result для библиотеки chunked-speech
pub type Result<T> = std::result::Result<T, SpeechError>;
