//! maidkit - Dataset builder
//!
//! Expands a small persona dataset to a target size: tags each record with
//! a keyword-guessed category, marks the system turn with the style, then
//! pads by cloning records round-robin with rotated category labels.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

use crate::error::{DatasetError, Result};
use crate::validator::messages_of;

/// Marker prefix looked for in the system turn
const STYLE_MARKER: &str = "[STYLE=";

/// Conversation category assigned to each record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Greeting,
    Encouragement,
    Todo,
    Template,
    Short,
    Tech,
}

impl Category {
    /// All categories, in keyword-matching and rotation order
    pub const ALL: [Category; 6] = [
        Category::Greeting,
        Category::Encouragement,
        Category::Todo,
        Category::Template,
        Category::Short,
        Category::Tech,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Greeting => "greeting",
            Category::Encouragement => "encouragement",
            Category::Todo => "todo",
            Category::Template => "template",
            Category::Short => "short",
            Category::Tech => "tech",
        }
    }

    fn keywords(&self) -> &'static [&'static str] {
        match self {
            Category::Greeting => &["朝", "おは", "挨拶", "はじめ", "一言"],
            Category::Encouragement => &["励ま", "応援", "がんば", "勇気", "元気"],
            Category::Todo => &["ToDo", "タスク", "やること", "チェック", "一覧"],
            Category::Template => &["テンプレ", "雛形", "フォーマット", "例", "書き方"],
            Category::Short => &["短く", "手短", "一行", "短文", "ミニ"],
            Category::Tech => &["コード", "Git", "Docker", "推論", "学習", "VRAM", "エラー"],
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Guess a category from user text.
///
/// Categories are tried in [`Category::ALL`] order and the first keyword
/// hit wins; matching is case-insensitive. Falls back to `short`.
pub fn guess_category(text: &str) -> Category {
    let text = text.to_lowercase();
    Category::ALL
        .iter()
        .copied()
        .find(|cat| {
            cat.keywords()
                .iter()
                .any(|kw| text.contains(&kw.to_lowercase()))
        })
        .unwrap_or(Category::Short)
}

/// A record as written by the builder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyledRecord {
    pub messages: Vec<Value>,
    pub style: String,
    pub category: Category,
}

/// Builder settings
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Minimum number of output records
    pub target: usize,
    /// Style name written to `style` and the system marker
    pub style: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            target: 200,
            style: "maid".to_string(),
        }
    }
}

/// Dataset expansion builder
pub struct Builder {
    config: BuildConfig,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new(BuildConfig::default())
    }
}

impl Builder {
    pub fn new(config: BuildConfig) -> Self {
        Self { config }
    }

    /// Tag and style-mark one source record.
    ///
    /// A record without `messages` becomes an empty conversation; a
    /// `messages` that is present but not a list is a schema error.
    pub fn normalize(&self, index: usize, record: &Value) -> Result<StyledRecord> {
        let mut messages = match record {
            Value::Object(obj) if !obj.contains_key("messages") => Vec::new(),
            _ => messages_of(index, record)?.to_vec(),
        };
        self.mark_system(&mut messages);
        let category = guess_category(first_user_content(&messages));

        Ok(StyledRecord {
            messages,
            style: self.config.style.clone(),
            category,
        })
    }

    /// Prefix the leading system turn with the style marker unless it
    /// already carries one
    fn mark_system(&self, messages: &mut [Value]) {
        let Some(Value::Object(first)) = messages.first_mut() else {
            return;
        };
        if first.get("role").and_then(Value::as_str) != Some("system") {
            return;
        }

        let content = match first.get("content") {
            Some(Value::String(s)) => s.as_str(),
            None => "",
            Some(_) => return,
        };
        if content.contains(STYLE_MARKER) {
            return;
        }

        let marked = format!("{}{}]\n{}", STYLE_MARKER, self.config.style, content);
        first.insert("content".to_string(), Value::String(marked));
    }

    /// Normalize every source record, then pad up to the target count
    pub fn build(&self, records: &[(usize, Value)]) -> Result<Vec<StyledRecord>> {
        let mut out = records
            .iter()
            .map(|(index, record)| self.normalize(*index, record))
            .collect::<Result<Vec<_>>>()?;
        info!("Normalized {} source records", out.len());

        if out.is_empty() {
            if self.config.target > 0 {
                warn!("No source records; nothing to pad from");
            }
            return Ok(out);
        }

        let mut i = 0;
        while out.len() < self.config.target {
            let mut clone = out[i % out.len()].clone();
            clone.category = Category::ALL[out.len() % Category::ALL.len()];
            out.push(clone);
            i += 1;
        }

        Ok(out)
    }
}

fn first_user_content(messages: &[Value]) -> &str {
    messages
        .iter()
        .filter_map(Value::as_object)
        .find(|m| m.get("role").and_then(Value::as_str) == Some("user"))
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .unwrap_or("")
}

/// Records per category, for reporting
pub fn category_counts(records: &[StyledRecord]) -> BTreeMap<Category, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        *counts.entry(record.category).or_insert(0) += 1;
    }
    counts
}

/// Write records as JSON Lines, returning the number written
pub fn write_jsonl<T: Serialize, P: AsRef<Path>>(records: &[T], dst: P) -> Result<usize> {
    let dst = dst.as_ref();
    let io_err = |source: std::io::Error| DatasetError::Io {
        path: dst.to_path_buf(),
        source,
    };

    let file = File::create(dst).map_err(io_err)?;
    let mut writer = BufWriter::new(file);

    for record in records {
        serde_json::to_writer(&mut writer, record).map_err(|e| io_err(e.into()))?;
        writer.write_all(b"\n").map_err(io_err)?;
    }
    writer.flush().map_err(io_err)?;

    Ok(records.len())
}
