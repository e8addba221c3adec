//! Модуль разбиения текста на сегменты для TTS
//!
//! OpenAI TTS принимает не более 4096 символов за запрос, поэтому длинный
//! текст режется на куски по границам предложений, а слишком длинные
//! предложения - по словам. Границы предложений определяются только по
//! знакам `.`, `!` и `?`: сокращения и десятичные дроби будут разрезаны.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

// Ведущая пунктуация выделяется отдельно, иначе она теряется при поиске
static SENTENCE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[.!?]+|[^.!?]+[.!?]+|[^.!?]+$").unwrap());

/// Сегмент текста для одного запроса синтеза
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Позиция сегмента в исходном тексте
    pub index: usize,
    /// Текст сегмента
    pub text: String,
}

/// Разбить текст на сегменты с плотными индексами от нуля
pub fn segment_text(text: &str, max_chars: usize) -> Vec<Segment> {
    split_text_into_chunks(text, max_chars)
        .into_iter()
        .enumerate()
        .map(|(index, text)| Segment { index, text })
        .collect()
}

/// Разбить текст на куски длиной не более `max_chars` символов.
///
/// Единственное исключение - слово длиннее `max_chars`: оно возвращается
/// целиком отдельным куском.
pub fn split_text_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    if char_len(trimmed) <= max_chars {
        return vec![trimmed.to_string()];
    }

    let mut sentences: Vec<&str> = SENTENCE_REGEX.find_iter(trimmed).map(|m| m.as_str()).collect();
    if sentences.is_empty() {
        sentences.push(trimmed);
    }

    let mut chunks = Vec::new();
    let mut current = ChunkBuffer::new(max_chars);

    for sentence in sentences {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }

        if char_len(sentence) > max_chars {
            current.flush_into(&mut chunks);

            let mut words = ChunkBuffer::new(max_chars);
            for word in sentence.split_whitespace() {
                words.push(word, &mut chunks);
            }
            words.flush_into(&mut chunks);
        } else {
            current.push(sentence, &mut chunks);
        }
    }

    current.flush_into(&mut chunks);
    chunks
}

/// Накопитель кусков, склеиваемых через пробел
struct ChunkBuffer {
    text: String,
    len: usize,
    max_chars: usize,
}

impl ChunkBuffer {
    fn new(max_chars: usize) -> Self {
        Self {
            text: String::new(),
            len: 0,
            max_chars,
        }
    }

    fn push(&mut self, piece: &str, chunks: &mut Vec<String>) {
        let piece_len = char_len(piece);

        if !self.text.is_empty() && self.len + 1 + piece_len > self.max_chars {
            self.flush_into(chunks);
        }

        if !self.text.is_empty() {
            self.text.push(' ');
            self.len += 1;
        }
        self.text.push_str(piece);
        self.len += piece_len;
    }

    fn flush_into(&mut self, chunks: &mut Vec<String>) {
        let text = std::mem::take(&mut self.text);
        self.len = 0;

        let text = text.trim();
        if !text.is_empty() {
            chunks.push(text.to_string());
        }
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_single_trimmed_chunk() {
        assert_eq!(split_text_into_chunks("  Hello  world!  ", 4096), vec!["Hello  world!"]);
        assert_eq!(split_text_into_chunks("Hi. Ok.", 7), vec!["Hi. Ok."]);
    }

    #[test]
    fn test_empty_text() {
        assert!(split_text_into_chunks("", 10).is_empty());
        assert!(split_text_into_chunks(" \n\t ", 10).is_empty());
        assert!(segment_text("   ", 10).is_empty());
    }

    #[test]
    fn test_sentences_split_at_boundary() {
        assert_eq!(split_text_into_chunks("Hi. Ok.", 5), vec!["Hi.", "Ok."]);
    }

    #[test]
    fn test_sentences_packed_greedily() {
        let chunks = split_text_into_chunks("One two. Three four. Five six seven.", 20);
        assert_eq!(chunks, vec!["One two. Three four.", "Five six seven."]);
    }

    #[test]
    fn test_multiple_terminators_stay_with_sentence() {
        let chunks = split_text_into_chunks("Really?! Yes... Fine", 10);
        assert_eq!(chunks, vec!["Really?!", "Yes...", "Fine"]);
    }

    #[test]
    fn test_long_sentence_split_on_words() {
        let chunks = split_text_into_chunks("aaaa bbbb cccc dddd.", 10);
        assert_eq!(chunks, vec!["aaaa bbbb", "cccc dddd."]);
    }

    #[test]
    fn test_pending_buffer_flushed_before_long_sentence() {
        let chunks = split_text_into_chunks("Ok. aaaa bbbb cccc dddd. Go.", 10);
        assert_eq!(chunks, vec!["Ok.", "aaaa bbbb", "cccc dddd.", "Go."]);
    }

    #[test]
    fn test_oversized_token_kept_verbatim() {
        assert_eq!(split_text_into_chunks("abcdefghij", 5), vec!["abcdefghij"]);

        let chunks = split_text_into_chunks("Hi abcdefghij yo", 5);
        assert_eq!(chunks, vec!["Hi", "abcdefghij", "yo"]);
    }

    #[test]
    fn test_leading_punctuation_not_dropped() {
        let chunks = split_text_into_chunks("...Hello there.", 5);
        assert_eq!(chunks, vec!["...", "Hello", "there."]);
    }

    #[test]
    fn test_punctuation_only_text() {
        assert_eq!(split_text_into_chunks("?!?!?!", 3), vec!["?!?!?!"]);
    }

    #[test]
    fn test_length_counted_in_chars() {
        // 3 символа, но 5 байт
        assert_eq!(split_text_into_chunks("Ёж.", 3), vec!["Ёж."]);
        assert_eq!(split_text_into_chunks("Привет мир", 3), vec!["Привет", "мир"]);
    }

    #[test]
    fn test_chunks_respect_limit_and_keep_order() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(40)
            + "Pack my box with five dozen liquor jugs! How vexingly quick daft zebras jump?";
        let max_chars = 100;
        let chunks = split_text_into_chunks(&text, max_chars);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= max_chars, "chunk too long: {}", chunk);
            assert!(!chunk.trim().is_empty());
        }

        let normalized: Vec<&str> = text.split_whitespace().collect();
        let rejoined = chunks.join(" ");
        let rejoined: Vec<&str> = rejoined.split_whitespace().collect();
        assert_eq!(rejoined, normalized);
    }

    #[test]
    fn test_segment_indexes_are_dense() {
        let segments = segment_text("One. Two. Three.", 5);
        let indexes: Vec<usize> = segments.iter().map(|s| s.index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
        assert_eq!(segments[2].text, "Three.");
    }
}
