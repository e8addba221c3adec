//! Подставной удаленный синтез для тестов конвейера

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, SpeechError};
use crate::progress::{ProgressObserver, ProgressState};
use crate::tts::{SpeechBackend, SynthesisParameters};

/// Поведение для конкретного текста сегмента
#[derive(Debug, Clone)]
pub(crate) enum Script {
    /// Вернуть текст сегмента как «аудио» после задержки
    Echo { delay_ms: u64 },
    /// Вернуть ошибку транспорта после задержки
    Fail { delay_ms: u64, message: &'static str },
    /// Никогда не отвечать и не смотреть на токен отмены
    Hang,
}

#[derive(Default)]
pub(crate) struct Counters {
    pub calls: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    /// Сколько незавершенных запросов было сброшено
    pub dropped: AtomicUsize,
}

pub(crate) struct FakeBackend {
    scripts: HashMap<String, Script>,
    default_script: Script,
    pub counters: Arc<Counters>,
    pub requests: Mutex<Vec<(String, SynthesisParameters)>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            default_script: Script::Echo { delay_ms: 0 },
            counters: Arc::new(Counters::default()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_default(mut self, script: Script) -> Self {
        self.default_script = script;
        self
    }

    pub fn script(mut self, text: &str, script: Script) -> Self {
        self.scripts.insert(text.to_string(), script);
        self
    }

    pub fn calls(&self) -> usize {
        self.counters.calls.load(Ordering::SeqCst)
    }
}

/// Считает запросы в полете и сброшенные на середине
struct InFlightGuard {
    counters: Arc<Counters>,
    finished: bool,
}

impl InFlightGuard {
    fn enter(counters: Arc<Counters>) -> Self {
        let now = counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        counters.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self {
            counters,
            finished: false,
        }
    }

    fn finish(mut self) {
        self.finished = true;
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
        if !self.finished {
            self.counters.dropped.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl SpeechBackend for FakeBackend {
    async fn synthesize_segment(
        &self,
        text: &str,
        params: &SynthesisParameters,
        _cancel: &CancellationToken,
    ) -> Result<Bytes> {
        self.counters.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push((text.to_string(), params.clone()));

        let guard = InFlightGuard::enter(self.counters.clone());
        let script = self.scripts.get(text).cloned().unwrap_or_else(|| self.default_script.clone());

        let result = match script {
            Script::Echo { delay_ms } => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Ok(Bytes::copy_from_slice(text.as_bytes()))
            }
            Script::Fail { delay_ms, message } => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Err(SpeechError::Transport(message.to_string()))
            }
            Script::Hang => std::future::pending().await,
        };

        guard.finish();
        result
    }
}

/// Наблюдатель, записывающий все обновления
pub(crate) fn recording_observer() -> (Arc<dyn ProgressObserver>, Arc<Mutex<Vec<ProgressState>>>) {
    let updates = Arc::new(Mutex::new(Vec::new()));
    let sink = updates.clone();
    let observer: Arc<dyn ProgressObserver> = Arc::new(move |progress: ProgressState| {
        sink.lock().push(progress);
    });
    (observer, updates)
}
