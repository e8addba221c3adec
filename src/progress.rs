//! Модуль для отслеживания прогресса синтеза
//!
//! Наблюдатель получает пары «готово/всего» по мере завершения сегментов.
//! Сегменты завершаются в произвольном порядке и из разных задач, поэтому
//! все уведомления одного вызова проходят через один `ProgressTracker`.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Состояние прогресса одного вызова синтеза
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressState {
    /// Количество завершенных сегментов
    pub completed: usize,
    /// Общее количество сегментов
    pub total: usize,
}

impl ProgressState {
    pub fn new(completed: usize, total: usize) -> Self {
        Self { completed, total }
    }

    /// Процент выполнения (0.0 - 100.0)
    pub fn percent(&self) -> f32 {
        if self.total == 0 {
            return 0.0;
        }
        (self.completed as f32 / self.total as f32 * 100.0).clamp(0.0, 100.0)
    }

    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.completed == self.total
    }
}

impl fmt::Display for ProgressState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.completed, self.total)
    }
}

/// Трейт для наблюдателя, получающего уведомления о прогрессе
pub trait ProgressObserver: Send + Sync {
    /// Метод, вызываемый при обновлении прогресса
    fn on_progress_update(&self, progress: ProgressState);
}

impl<F> ProgressObserver for F
where
    F: Fn(ProgressState) + Send + Sync,
{
    fn on_progress_update(&self, progress: ProgressState) {
        self(progress)
    }
}

/// Наблюдатель, пересылающий прогресс в канал Tokio
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<ProgressState>,
}

impl ChannelObserver {
    /// Создать наблюдателя и приемник для одного потребителя
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressState>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressObserver for ChannelObserver {
    fn on_progress_update(&self, progress: ProgressState) {
        if let Err(e) = self.tx.send(progress) {
            log::debug!("Progress receiver dropped: {}", e);
        }
    }
}

struct TrackerState {
    completed: usize,
    total: usize,
    closed: bool,
}

/// Трекер прогресса одного вызова.
///
/// Счетчик и вызов наблюдателя защищены одним мьютексом: параллельные
/// завершения не теряются, а наблюдатель никогда не вызывается конкурентно.
/// После `close()` уведомлений больше нет.
pub struct ProgressTracker {
    observer: Option<Arc<dyn ProgressObserver>>,
    state: Mutex<TrackerState>,
}

impl ProgressTracker {
    /// Создать трекер на `total` сегментов
    pub fn new(total: usize, observer: Option<Arc<dyn ProgressObserver>>) -> Self {
        Self {
            observer,
            state: Mutex::new(TrackerState {
                completed: 0,
                total,
                closed: false,
            }),
        }
    }

    /// Сообщить о начале работы (`0/total`)
    pub fn report_started(&self) {
        let state = self.state.lock();
        if state.closed {
            return;
        }
        self.notify(ProgressState::new(state.completed, state.total));
    }

    /// Учесть завершение одного сегмента.
    ///
    /// Возвращает новое состояние или `None`, если трекер уже закрыт.
    pub fn record_completion(&self) -> Option<ProgressState> {
        let mut state = self.state.lock();
        if state.closed {
            return None;
        }

        state.completed = (state.completed + 1).min(state.total);
        let progress = ProgressState::new(state.completed, state.total);
        self.notify(progress);
        Some(progress)
    }

    /// Закрыть трекер: дальнейшие уведомления подавляются
    pub fn close(&self) {
        self.state.lock().closed = true;
    }

    /// Текущее состояние без уведомления
    pub fn snapshot(&self) -> ProgressState {
        let state = self.state.lock();
        ProgressState::new(state.completed, state.total)
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    // Вызывается только под блокировкой state
    fn notify(&self, progress: ProgressState) {
        if let Some(observer) = &self.observer {
            observer.on_progress_update(progress);
        }
    }
}
