//! Text chunkers for the ingestion pipeline.
//!
//! Two policies cover the two ingestion paths. Uploaded documents are split
//! on whitespace against a character budget, so chunks are sequences of
//! whole words and no word is ever cut in half. Corpus files are split into
//! overlapping windows that prefer paragraph and sentence boundaries, so
//! neighboring chunks share context.
//!
//! Both policies return an empty sequence for empty or whitespace-only
//! input and never fail.

/// How a document body is split into passages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkingPolicy {
    /// Whole words accumulated until adding the next word would exceed
    /// `budget` characters. No overlap between chunks.
    WordBounded { budget: usize },
    /// Windows of at most `size` bytes, each repeating the trailing
    /// `overlap` bytes of the previous window.
    SlidingWindow { size: usize, overlap: usize },
}

/// Split text into chunks under the given policy.
pub fn chunk_text(policy: ChunkingPolicy, text: &str) -> Vec<String> {
    match policy {
        ChunkingPolicy::WordBounded { budget } => word_bounded(text, budget),
        ChunkingPolicy::SlidingWindow { size, overlap } => sliding_window(text, size, overlap),
    }
}

fn word_bounded(text: &str, budget: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;

    for word in text.split_whitespace() {
        let word_chars = word.chars().count();
        let would_be = if current.is_empty() {
            word_chars
        } else {
            current_chars + 1 + word_chars // +1 for the joining space
        };

        if would_be > budget && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_chars = 0;
        }

        if !current.is_empty() {
            current.push(' ');
            current_chars += 1;
        }
        current.push_str(word);
        current_chars += word_chars;
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

fn sliding_window(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    if text.len() <= size {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < text.len() {
        let hard_end = snap_char_boundary(text, (start + size).min(text.len()));
        let end = if hard_end < text.len() {
            find_break_point(&text[start..hard_end])
                .map(|offset| start + offset)
                .unwrap_or(hard_end)
        } else {
            hard_end
        };

        let window = &text[start..end];
        if !window.trim().is_empty() {
            chunks.push(window.to_string());
        }

        if end >= text.len() {
            break;
        }

        let step = end - start;
        if step <= overlap {
            // Window barely advanced; skipping the overlap avoids looping forever.
            start = end;
        } else {
            let next = snap_char_boundary(text, end - overlap);
            start = if next > start { next } else { end };
        }
    }

    chunks
}

/// Finds a natural cut near the end of a window, preferring paragraph
/// breaks, then sentence ends, then line breaks, then clause punctuation,
/// then any space. Returns the byte offset to cut at, or `None` when the
/// window has no usable boundary.
fn find_break_point(window: &str) -> Option<usize> {
    let len = window.len();

    if let Some(pos) = window.rfind("\n\n") {
        if pos > len / 3 {
            return Some(pos + 2);
        }
    }

    for pattern in [". ", "! ", "? ", ".\n", "!\n", "?\n"] {
        if let Some(pos) = window.rfind(pattern) {
            if pos > len / 3 {
                return Some(pos + pattern.len());
            }
        }
    }

    if let Some(pos) = window.rfind('\n') {
        if pos > len / 3 {
            return Some(pos + 1);
        }
    }

    for pattern in [", ", "; "] {
        if let Some(pos) = window.rfind(pattern) {
            if pos > len / 2 {
                return Some(pos + pattern.len());
            }
        }
    }

    if let Some(pos) = window.rfind(' ') {
        if pos > 0 {
            return Some(pos + 1);
        }
    }

    None
}

/// Moves `index` down to the nearest UTF-8 character boundary.
fn snap_char_boundary(text: &str, mut index: usize) -> usize {
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}
