//! Модуль сборки итогового аудио из сегментов
//!
//! Результаты сегментов складываются в слоты по индексу, а не в порядке
//! поступления, и склеиваются побайтно. Контейнер не проверяется и не
//! перекодируется: склейка рассчитывает на то, что формат (MP3) допускает
//! простую конкатенацию потоков.

use bytes::{Bytes, BytesMut};

use crate::error::{Result, SpeechError};

/// Сборщик аудио с фиксированным числом слотов
#[derive(Debug)]
pub struct AudioAssembler {
    slots: Vec<Option<Bytes>>,
}

impl AudioAssembler {
    /// Создать сборщик на `total` сегментов
    pub fn new(total: usize) -> Self {
        Self {
            slots: vec![None; total],
        }
    }

    /// Количество ожидаемых сегментов
    pub fn total(&self) -> usize {
        self.slots.len()
    }

    /// Количество заполненных слотов
    pub fn filled(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// Положить результат сегмента в его слот
    pub fn insert(&mut self, index: usize, audio: Bytes) -> Result<()> {
        let total = self.slots.len();
        let slot = self.slots.get_mut(index).ok_or_else(|| {
            SpeechError::Assembly(format!("segment index {} out of range (total {})", index, total))
        })?;

        if slot.is_some() {
            return Err(SpeechError::Assembly(format!("segment {} received twice", index)));
        }

        *slot = Some(audio);
        Ok(())
    }

    /// Вернуть буферы сегментов в порядке индексов.
    ///
    /// Пустой слот означает ошибку диспетчера и возвращается как
    /// `SpeechError::MissingSegment`.
    pub fn into_segments(self) -> Result<Vec<Bytes>> {
        self.slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| slot.ok_or(SpeechError::MissingSegment(index)))
            .collect()
    }

    /// Склеить все сегменты в один буфер
    pub fn assemble(self) -> Result<Bytes> {
        let segments = self.into_segments()?;
        Ok(concatenate(&segments))
    }
}

/// Побайтная конкатенация буферов в переданном порядке
pub fn concatenate(parts: &[Bytes]) -> Bytes {
    if let [single] = parts {
        return single.clone();
    }

    let total_len = parts.iter().map(Bytes::len).sum();
    let mut output = BytesMut::with_capacity(total_len);
    for part in parts {
        output.extend_from_slice(part);
    }
    output.freeze()
}
