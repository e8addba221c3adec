//! Модуль параллельного синтеза сегментов
//!
//! Каждый сегмент отправляется отдельным запросом в своей задаче Tokio.
//! Задачи завершаются в произвольном порядке; результаты раскладываются по
//! слотам `AudioAssembler`, так что порядок на выходе всегда совпадает с
//! порядком сегментов. Первая ошибка или отмена прерывает все остальные
//! запросы, частичные результаты отбрасываются.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::assembler::AudioAssembler;
use crate::error::{Result, SpeechError};
use crate::outcome::Outcome;
use crate::progress::{ProgressObserver, ProgressTracker};
use crate::segmenter::Segment;
use crate::tts::{SpeechBackend, SynthesisParameters};

/// Диспетчер запросов синтеза
pub struct SynthesisDispatcher<B: ?Sized> {
    backend: Arc<B>,
    /// Ограничение одновременных запросов; `None` - все сегменты сразу
    max_concurrent_requests: Option<usize>,
}

impl<B: ?Sized> Clone for SynthesisDispatcher<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            max_concurrent_requests: self.max_concurrent_requests,
        }
    }
}

impl<B> SynthesisDispatcher<B>
where
    B: SpeechBackend + ?Sized + 'static,
{
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            max_concurrent_requests: None,
        }
    }

    /// Ограничить число одновременных запросов
    pub fn with_max_concurrent_requests(mut self, limit: Option<usize>) -> Self {
        self.max_concurrent_requests = limit.filter(|limit| *limit > 0);
        self
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Синтезировать все сегменты.
    ///
    /// Возвращает буферы в порядке индексов сегментов, `Outcome::Cancelled`
    /// при отмене `cancel` или первую ошибку любого сегмента.
    pub async fn synthesize(
        &self,
        segments: &[Segment],
        params: &SynthesisParameters,
        cancel: &CancellationToken,
        observer: Option<Arc<dyn ProgressObserver>>,
    ) -> Result<Outcome<Vec<Bytes>>> {
        if segments.is_empty() {
            return Err(SpeechError::EmptyInput);
        }

        let tracker = Arc::new(ProgressTracker::new(segments.len(), observer));

        log::info!(
            "Synthesizing {} segment(s) (voice {}, model {})",
            segments.len(),
            params.voice,
            params.model
        );

        if let [segment] = segments {
            return self.synthesize_single(segment, params, cancel, &tracker).await;
        }

        self.synthesize_concurrent(segments, params, cancel, tracker).await
    }

    async fn synthesize_single(
        &self,
        segment: &Segment,
        params: &SynthesisParameters,
        cancel: &CancellationToken,
        tracker: &ProgressTracker,
    ) -> Result<Outcome<Vec<Bytes>>> {
        if cancel.is_cancelled() {
            tracker.close();
            return Ok(Outcome::Cancelled);
        }

        tracker.report_started();

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SpeechError::Cancelled),
            result = self.backend.synthesize_segment(&segment.text, params, cancel) => result,
        };

        match result {
            Ok(audio) if !cancel.is_cancelled() => {
                tracker.record_completion();
                log::info!("Speech generation completed: 1 segment, {} bytes", audio.len());
                Ok(Outcome::Completed(vec![audio]))
            }
            Ok(_) | Err(SpeechError::Cancelled) => {
                tracker.close();
                log::warn!("Speech generation cancelled");
                Ok(Outcome::Cancelled)
            }
            Err(e) => {
                tracker.close();
                log::error!("Failed to generate speech: {}", e);
                Err(e)
            }
        }
    }

    async fn synthesize_concurrent(
        &self,
        segments: &[Segment],
        params: &SynthesisParameters,
        cancel: &CancellationToken,
        tracker: Arc<ProgressTracker>,
    ) -> Result<Outcome<Vec<Bytes>>> {
        // Внутренние сбои отменяют только дочерний токен, не токен вызывающего
        let call_token = cancel.child_token();
        let semaphore = self
            .max_concurrent_requests
            .map(|limit| Arc::new(Semaphore::new(limit)));

        let mut tasks = JoinSet::new();
        for segment in segments {
            let backend = self.backend.clone();
            let params = params.clone();
            let token = call_token.clone();
            let semaphore = semaphore.clone();
            let index = segment.index;
            let text = segment.text.clone();

            tasks.spawn(async move {
                let result = run_segment(backend.as_ref(), &text, &params, &token, semaphore).await;
                let result = match result {
                    Ok(_) if token.is_cancelled() => Err(SpeechError::Cancelled),
                    result => result,
                };
                (index, result)
            });
        }

        let mut assembler = AudioAssembler::new(segments.len());

        loop {
            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    abort_call(&call_token, &tracker);
                    log::warn!("Speech generation cancelled at {}", tracker.snapshot());
                    return Ok(Outcome::Cancelled);
                }
                joined = tasks.join_next() => joined,
            };

            let Some(joined) = joined else {
                break;
            };

            let failure = match joined {
                Ok((index, Ok(audio))) => {
                    let len = audio.len();
                    match assembler.insert(index, audio) {
                        Ok(()) => {
                            log::debug!("Segment {} done ({} bytes)", index, len);
                            tracker.record_completion();
                            // Все слоты заполнены: отмена после этого момента уже не действует
                            if assembler.is_complete() {
                                break;
                            }
                            continue;
                        }
                        Err(e) => e,
                    }
                }
                Ok((_, Err(SpeechError::Cancelled))) => {
                    abort_call(&call_token, &tracker);
                    log::warn!("Speech generation cancelled at {}", tracker.snapshot());
                    return Ok(Outcome::Cancelled);
                }
                Ok((index, Err(e))) => {
                    log::error!("Failed to generate speech for segment {}: {}", index, e);
                    e
                }
                Err(e) => SpeechError::TaskFailed(e.to_string()),
            };

            abort_call(&call_token, &tracker);
            return Err(failure);
        }

        let segments = match assembler.into_segments() {
            Ok(segments) => segments,
            Err(e) => {
                tracker.close();
                log::error!("Speech generation finished with a hole in the results: {}", e);
                return Err(e);
            }
        };

        log::info!("Speech generation completed: {} segments", segments.len());
        Ok(Outcome::Completed(segments))
    }
}

/// Прервать все запросы вызова и заглушить прогресс.
///
/// Оставшиеся задачи снимаются при удалении `JoinSet`.
fn abort_call(call_token: &CancellationToken, tracker: &ProgressTracker) {
    call_token.cancel();
    tracker.close();
}

async fn run_segment<B>(
    backend: &B,
    text: &str,
    params: &SynthesisParameters,
    token: &CancellationToken,
    semaphore: Option<Arc<Semaphore>>,
) -> Result<Bytes>
where
    B: SpeechBackend + ?Sized,
{
    if token.is_cancelled() {
        return Err(SpeechError::Cancelled);
    }

    let _permit = match semaphore {
        Some(semaphore) => {
            let permit = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(SpeechError::Cancelled),
                permit = semaphore.acquire_owned() => permit,
            };
            Some(permit.map_err(|e| SpeechError::TaskFailed(e.to_string()))?)
        }
        None => None,
    };

    tokio::select! {
        biased;
        _ = token.cancelled() => Err(SpeechError::Cancelled),
        result = backend.synthesize_segment(text, params, token) => result,
    }
}
