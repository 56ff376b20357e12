use super::{MAX_CHUNK_SIZE, MIN_CHUNK_SIZE};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// A sentence is any run of text followed by its terminators, or a trailing
/// run without one. Terminators stay attached so no content is dropped.
static SENTENCE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^.!?]*[.!?]+|[^.!?]+").expect("sentence pattern is valid"));

/// One bounded slice of the input text, the unit of work sent per remote call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkEstimate {
    pub chunks: usize,
    pub batches: usize,
}

pub fn clamp_chunk_size(chunk_size: usize) -> usize {
    chunk_size.clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE)
}

/// Split text into ordered chunks of at most `max_length` characters
///
/// Sentences are packed greedily. A sentence that cannot fit on its own is
/// packed word by word, and a word that cannot fit is cut at `max_length`
/// characters. Text that already fits is returned unchanged as one chunk.
pub fn chunk_text(text: &str, max_length: usize) -> Vec<Chunk> {
    let max_length = max_length.max(1);

    if char_len(text) <= max_length {
        return vec![Chunk {
            index: 0,
            text: text.to_string(),
        }];
    }

    let mut builder = ChunkBuilder::new(max_length);
    for unit in SENTENCE_PATTERN.find_iter(text) {
        let sentence = unit.as_str().trim();
        if !sentence.is_empty() {
            builder.push_sentence(sentence);
        }
    }

    let mut pieces = builder.finish();
    if pieces.is_empty() {
        pieces.push(split_at_char(text, max_length).0.to_string());
    }

    pieces
        .into_iter()
        .enumerate()
        .map(|(index, text)| Chunk { index, text })
        .collect()
}

/// Predict chunk and batch counts for a text without dispatching anything
pub fn estimate(text: &str, chunk_size: usize, concurrency: usize) -> ChunkEstimate {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return ChunkEstimate {
            chunks: 0,
            batches: 0,
        };
    }

    let chunks = chunk_text(trimmed, clamp_chunk_size(chunk_size)).len();
    let concurrency = concurrency.max(1);

    ChunkEstimate {
        chunks,
        batches: chunks.div_ceil(concurrency),
    }
}

struct ChunkBuilder {
    max_length: usize,
    pieces: Vec<String>,
    current: String,
}

impl ChunkBuilder {
    fn new(max_length: usize) -> Self {
        Self {
            max_length,
            pieces: Vec::new(),
            current: String::new(),
        }
    }

    fn push_sentence(&mut self, sentence: &str) {
        if self.fits(sentence) {
            self.append(sentence);
            return;
        }

        self.flush();

        if char_len(sentence) <= self.max_length {
            self.current.push_str(sentence);
            return;
        }

        for word in sentence.split_whitespace() {
            self.push_word(word);
        }
    }

    fn push_word(&mut self, word: &str) {
        if self.fits(word) {
            self.append(word);
            return;
        }

        self.flush();

        let mut rest = word;
        while char_len(rest) > self.max_length {
            let (head, tail) = split_at_char(rest, self.max_length);
            self.pieces.push(head.to_string());
            rest = tail;
        }
        self.current.push_str(rest);
    }

    fn fits(&self, unit: &str) -> bool {
        if self.current.is_empty() {
            char_len(unit) <= self.max_length
        } else {
            char_len(&self.current) + 1 + char_len(unit) <= self.max_length
        }
    }

    fn append(&mut self, unit: &str) {
        if !self.current.is_empty() {
            self.current.push(' ');
        }
        self.current.push_str(unit);
    }

    fn flush(&mut self) {
        if !self.current.is_empty() {
            self.pieces.push(std::mem::take(&mut self.current));
        }
    }

    fn finish(mut self) -> Vec<String> {
        self.flush();
        self.pieces
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Split after `count` characters, never inside a code point
fn split_at_char(text: &str, count: usize) -> (&str, &str) {
    match text.char_indices().nth(count) {
        Some((byte_index, _)) => text.split_at(byte_index),
        None => (text, ""),
    }
}
