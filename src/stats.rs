//! maidkit - Per-record text statistics
//!
//! Cheap length measures over the conversation text of a record. The
//! token count is a regex proxy, not a real tokenizer.

use regex::Regex;
use serde_json::Value;

/// Text statistics for one record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextStats {
    /// Unicode code points in the joined text
    pub chars: usize,
    /// Word runs plus individual non-space symbols
    pub tokens_like: usize,
}

/// Computes [`TextStats`] for `messages` arrays
pub struct TextStatsCounter {
    token_regex: Regex,
}

impl Default for TextStatsCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl TextStatsCounter {
    pub fn new() -> Self {
        Self {
            // Letters, digits and `_` only; combining marks stand alone
            token_regex: Regex::new(r"[\p{L}\p{N}_]+|\S").expect("valid regex: token proxy"),
        }
    }

    /// Count token-like units: each alphanumeric/underscore run counts
    /// once, every other non-whitespace character counts on its own.
    pub fn count_tokens(&self, text: &str) -> usize {
        self.token_regex.find_iter(text).count()
    }

    /// Statistics over the `content` of every object element, joined by `\n`
    pub fn measure(&self, messages: &[Value]) -> TextStats {
        let text = join_contents(messages);
        TextStats {
            chars: text.chars().count(),
            tokens_like: self.count_tokens(&text),
        }
    }
}

/// Join the `content` strings of every object element of `messages`.
///
/// Non-object elements are skipped. An object without a string `content`
/// still contributes an empty entry, so it adds a separator.
pub fn join_contents(messages: &[Value]) -> String {
    messages
        .iter()
        .filter_map(Value::as_object)
        .map(|m| m.get("content").and_then(Value::as_str).unwrap_or(""))
        .collect::<Vec<_>>()
        .join("\n")
}
