//! Результат отменяемой операции
//!
//! Отмена пользователем - не ошибка, поэтому она не попадает в
//! `SpeechError`, а возвращается отдельным вариантом.

/// Результат операции синтеза или распознавания
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// Операция завершена
    Completed(T),
    /// Операция отменена, частичный результат отброшен
    Cancelled,
}

impl<T> Outcome<T> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }

    /// Результат, если операция завершена
    pub fn completed(self) -> Option<T> {
        match self {
            Outcome::Completed(value) => Some(value),
            Outcome::Cancelled => None,
        }
    }

    pub fn map<U, F>(self, f: F) -> Outcome<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Outcome::Completed(value) => Outcome::Completed(f(value)),
            Outcome::Cancelled => Outcome::Cancelled,
        }
    }
}
