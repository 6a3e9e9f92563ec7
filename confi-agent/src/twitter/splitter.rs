//! Splits long generated text into postable chunks.
//!
//! Paragraphs are packed greedily first. A paragraph that is too long on its
//! own is split by sentence, and a sentence that is still too long is split by
//! word. URLs are swapped for placeholders during the sentence pass so dots
//! and question marks inside them never end a sentence. Placeholders are
//! delimited by private-use characters, so placeholder-looking text already
//! in the input is left alone, and they are measured at the length of the URL
//! they stand for. Whitespace between sentences and words is kept as written.

use once_cell::sync::Lazy;
use regex::Regex;

static URL_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://[^\s]+").unwrap());

static PLACEHOLDER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x{E000}(\d+)\x{E001}").unwrap());

static WORD_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S+").unwrap());

/// A sentence is a run of text ending in terminal punctuation, or the tail of
/// the text without one.
static SENTENCE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^.!?]*[.!?]+|[^.!?]+$").unwrap());

const PARAGRAPH_SEPARATOR: &str = "\n\n";

const PLACEHOLDER_OPEN: char = '\u{E000}';
const PLACEHOLDER_CLOSE: char = '\u{E001}';

/// URLs pulled out of a paragraph, indexed by placeholder number
struct ProtectedText {
    text: String,
    urls: Vec<String>,
}

impl ProtectedText {
    fn new(paragraph: &str) -> Self {
        let mut urls = Vec::new();
        let text = URL_PATTERN
            .replace_all(paragraph, |caps: &regex::Captures| {
                let placeholder =
                    format!("{}{}{}", PLACEHOLDER_OPEN, urls.len(), PLACEHOLDER_CLOSE);
                urls.push(caps[0].to_string());
                placeholder
            })
            .into_owned();
        Self { text, urls }
    }

    fn restore(&self, chunk: &str) -> String {
        if self.urls.is_empty() {
            return chunk.to_string();
        }
        PLACEHOLDER_PATTERN
            .replace_all(chunk, |caps: &regex::Captures| {
                caps[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| self.urls.get(i))
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }

    /// Length of a placeholder-bearing fragment once its URLs are restored
    fn measure(&self, fragment: &str) -> usize {
        self.restore(fragment.trim()).chars().count()
    }
}

/// Greedy accumulator shared by the paragraph, sentence and word passes
struct Packer<'a> {
    max_len: usize,
    separator: &'a str,
    chunks: Vec<String>,
    current: String,
}

impl<'a> Packer<'a> {
    fn new(max_len: usize, separator: &'a str) -> Self {
        Self {
            max_len,
            separator,
            chunks: Vec::new(),
            current: String::new(),
        }
    }

    fn joined(&self, separator: &str, piece: &str) -> String {
        if self.current.is_empty() {
            piece.to_string()
        } else {
            format!("{}{}{}", self.current, separator, piece)
        }
    }

    /// Append `piece` if the result still fits according to `measure`
    fn try_append(&mut self, piece: &str, measure: impl Fn(&str) -> usize) -> bool {
        let separator = self.separator;
        self.try_append_with(separator, piece, measure)
    }

    /// Like `try_append`, joining with the whitespace found in the source
    fn try_append_with(
        &mut self,
        separator: &str,
        piece: &str,
        measure: impl Fn(&str) -> usize,
    ) -> bool {
        let candidate = self.joined(separator, piece);
        if measure(&candidate) <= self.max_len {
            self.current = candidate;
            true
        } else {
            false
        }
    }

    fn flush(&mut self) {
        let chunk = self.current.trim();
        if !chunk.is_empty() {
            self.chunks.push(chunk.to_string());
        }
        self.current.clear();
    }

    fn finish(mut self) -> Vec<String> {
        self.flush();
        self.chunks
    }
}

/// Split `content` into chunks of at most `max_len` chars.
///
/// A single word longer than `max_len` (including a long URL) is returned
/// whole as its own chunk.
pub fn split_tweet_content(content: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    let plain = |s: &str| s.trim().chars().count();
    let mut packer = Packer::new(max_len, PARAGRAPH_SEPARATOR);

    for paragraph in content.split(PARAGRAPH_SEPARATOR).map(str::trim) {
        if paragraph.is_empty() {
            continue;
        }
        if packer.try_append(paragraph, plain) {
            continue;
        }

        packer.flush();
        if plain(paragraph) <= max_len {
            packer.current = paragraph.to_string();
            continue;
        }

        // The last piece stays open so following paragraphs can join it
        let mut pieces = split_paragraph(paragraph, max_len);
        let last = pieces.pop().unwrap_or_default();
        packer.chunks.extend(pieces);
        packer.current = last;
    }

    packer.finish()
}

fn split_paragraph(paragraph: &str, max_len: usize) -> Vec<String> {
    let protected = ProtectedText::new(paragraph);
    let measure = |s: &str| protected.measure(s);

    let sentences: Vec<&str> = {
        let found: Vec<&str> = SENTENCE_PATTERN
            .find_iter(&protected.text)
            .map(|m| m.as_str())
            .collect();
        if found.is_empty() {
            vec![protected.text.as_str()]
        } else {
            found
        }
    };

    let mut packer = Packer::new(max_len, " ");
    for raw in sentences {
        let sentence = raw.trim();
        if sentence.is_empty() {
            continue;
        }
        let separator = match leading_whitespace(raw) {
            "" => " ",
            ws => ws,
        };
        if packer.try_append_with(separator, sentence, measure) {
            continue;
        }

        packer.flush();
        if measure(sentence) <= max_len {
            packer.current = sentence.to_string();
            continue;
        }

        for (separator, word) in words_with_separators(sentence) {
            if !packer.try_append_with(separator, word, measure) {
                packer.flush();
                packer.current = word.to_string();
            }
        }
    }

    packer
        .finish()
        .into_iter()
        .map(|chunk| protected.restore(&chunk))
        .collect()
}

fn leading_whitespace(text: &str) -> &str {
    &text[..text.len() - text.trim_start().len()]
}

/// Each whitespace-delimited word with the whitespace run before it
fn words_with_separators(text: &str) -> Vec<(&str, &str)> {
    let mut prev_end = 0;
    WORD_PATTERN
        .find_iter(text)
        .map(|m| {
            let separator = &text[prev_end..m.start()];
            prev_end = m.end();
            (separator, m.as_str())
        })
        .collect()
}

/// Cut `text` at the last sentence end that fits in `max_len`, falling back
/// to a word boundary with an ellipsis.
pub fn truncate_to_complete_sentence(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }

    let budget: String = text.chars().take(max_len).collect();
    if let Some(idx) = budget.rfind(|c: char| c == '.' || c == '!' || c == '?') {
        let candidate = budget[..=idx].trim();
        if !candidate.is_empty() {
            return candidate.to_string();
        }
    }

    let room = max_len.saturating_sub(3);
    let head: String = text.chars().take(room).collect();
    match head.rfind(' ') {
        Some(idx) if idx > 0 => format!("{}...", head[..idx].trim_end()),
        _ => format!("{}...", head),
    }
}
