//! maidkit - Dataset validator
//!
//! Checks every record of a chat dataset for a `messages` list, counts
//! exact duplicates by canonical JSON form, and summarizes text lengths.
//! The first bad record aborts the run; no partial summary is produced.

use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

use crate::data::Dataset;
use crate::error::{DatasetError, Result};
use crate::stats::TextStatsCounter;

/// Corpus-level validation report
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    /// Input path as given
    pub file: String,
    /// Records processed
    pub count: usize,
    /// Records whose canonical form was already seen
    pub dup_count: usize,
    pub dup_ratio: f64,
    /// Mean code points per record, 2 decimals
    pub avg_chars: f64,
    /// Mean token-like units per record, 2 decimals
    pub avg_tokens_like: f64,
}

impl Serialize for Summary {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Summary", 6)?;
        state.serialize_field("file", &self.file)?;
        state.serialize_field("count", &self.count)?;
        state.serialize_field("dup_count", &self.dup_count)?;
        state.serialize_field("dup_ratio", &self.dup_ratio)?;
        // An empty corpus has no mean; report the averages as integer 0
        if self.count == 0 {
            state.serialize_field("avg_chars", &0u64)?;
            state.serialize_field("avg_tokens_like", &0u64)?;
        } else {
            state.serialize_field("avg_chars", &self.avg_chars)?;
            state.serialize_field("avg_tokens_like", &self.avg_tokens_like)?;
        }
        state.end()
    }
}

/// Check that `record` is an object with a `messages` array and return it
pub fn messages_of(index: usize, record: &Value) -> Result<&[Value]> {
    record
        .get("messages")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .ok_or(DatasetError::Schema { index })
}

/// Serialize with object keys sorted at every depth.
///
/// Non-ASCII text is written as-is, so two records share a canonical
/// form exactly when they are the same JSON up to key order and spacing.
pub fn canonical_form(value: &Value) -> String {
    sorted(value).to_string()
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(obj) => {
            let mut entries: Vec<(&String, &Value)> = obj.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let map: Map<String, Value> = entries
                .into_iter()
                .map(|(k, v)| (k.clone(), sorted(v)))
                .collect();
            Value::Object(map)
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

/// Round to 2 decimals, ties to even on the exact binary value
fn round2(x: f64) -> f64 {
    format!("{:.2}", x).parse().unwrap_or(x)
}

/// Validator for chat-format datasets
pub struct Validator {
    counter: TextStatsCounter,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator {
    pub fn new() -> Self {
        Self {
            counter: TextStatsCounter::new(),
        }
    }

    /// Open and validate the dataset at `path`
    pub fn validate_path<P: AsRef<Path>>(&self, path: P) -> Result<Summary> {
        let dataset = Dataset::open(path)?;
        self.validate(&dataset)
    }

    /// Validate an already opened dataset
    pub fn validate(&self, dataset: &Dataset) -> Result<Summary> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut count = 0usize;
        let mut dup_count = 0usize;
        let mut char_sum = 0usize;
        let mut tok_sum = 0usize;

        for item in dataset.records()? {
            let (index, record) = item?;
            let messages = messages_of(index, &record)?;

            // A group of n identical records counts n - 1 duplicates
            if !seen.insert(canonical_form(&record)) {
                dup_count += 1;
                debug!("Record {} duplicates an earlier record", index);
            }

            let stats = self.counter.measure(messages);
            char_sum += stats.chars;
            tok_sum += stats.tokens_like;
            count += 1;
        }

        let (dup_ratio, avg_chars, avg_tokens_like) = if count > 0 {
            let n = count as f64;
            (
                dup_count as f64 / n,
                round2(char_sum as f64 / n),
                round2(tok_sum as f64 / n),
            )
        } else {
            (0.0, 0.0, 0.0)
        };

        Ok(Summary {
            file: dataset.path.clone(),
            count,
            dup_count,
            dup_ratio,
            avg_chars,
            avg_tokens_like,
        })
    }
}

/// Validate the dataset at `path` with a default [`Validator`]
pub fn validate<P: AsRef<Path>>(path: P) -> Result<Summary> {
    Validator::new().validate_path(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Unit;
    use anyhow::Result;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn summarize(text: &str) -> crate::error::Result<Summary> {
        Validator::new().validate(&Dataset::from_bytes("mem", text.as_bytes().to_vec()))
    }

    fn write_temp(text: &str) -> Result<NamedTempFile> {
        let mut file = NamedTempFile::new()?;
        file.write_all(text.as_bytes())?;
        Ok(file)
    }

    #[test]
    fn test_counts_non_blank_lines() -> Result<()> {
        let text = concat!(
            r#"{"messages": [{"role": "user", "content": "a"}]}"#,
            "\n\n",
            r#"{"messages": [{"role": "user", "content": "b"}]}"#,
            "\n   \n",
            r#"{"messages": [{"role": "user", "content": "c"}]}"#,
            "\n",
        );
        let summary = summarize(text)?;
        assert_eq!(summary.count, 3);
        assert_eq!(summary.dup_count, 0);
        assert_eq!(summary.avg_chars, 1.0);
        Ok(())
    }

    #[test]
    fn test_counts_array_elements() -> Result<()> {
        let text = r#"  [
            {"messages": [{"role": "user", "content": "Hi, there!"}]},
            {"messages": []}
        ]"#;
        let summary = summarize(text)?;
        assert_eq!(summary.count, 2);
        assert_eq!(summary.avg_chars, 5.0);
        assert_eq!(summary.avg_tokens_like, 2.0);
        Ok(())
    }

    #[test]
    fn test_three_identical_records() -> Result<()> {
        let line = r#"{"messages": [{"role": "user", "content": "hello"}]}"#;
        let summary = summarize(&format!("{line}\n{line}\n{line}\n"))?;
        assert_eq!(summary.count, 3);
        assert_eq!(summary.dup_count, 2);
        assert!((summary.dup_ratio - 2.0 / 3.0).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn test_key_order_insensitive() -> Result<()> {
        let text = concat!(
            r#"{"style": "maid", "messages": [{"role": "user", "content": "x"}]}"#,
            "\n",
            r#"{"messages":[{"content":"x","role":"user"}],"style":"maid"}"#,
            "\n",
        );
        let summary = summarize(text)?;
        assert_eq!(summary.dup_count, 1);
        Ok(())
    }

    #[test]
    fn test_passthrough_fields_distinguish_records() -> Result<()> {
        let text = concat!(
            r#"{"category": "todo", "messages": []}"#,
            "\n",
            r#"{"category": "tech", "messages": []}"#,
        );
        assert_eq!(summarize(text)?.dup_count, 0);
        Ok(())
    }

    #[test]
    fn test_canonical_form() {
        let a = json!({"b": 1, "a": {"y": "メイド", "x": [ {"k": 2, "j": 1} ]}});
        assert_eq!(
            canonical_form(&a),
            r#"{"a":{"x":[{"j":1,"k":2}],"y":"メイド"},"b":1}"#
        );
    }

    #[test]
    fn test_malformed_line_fails_fast() {
        let err = summarize("{\"messages\":[]}\nNOT JSON\n").err();
        match err {
            Some(DatasetError::Parse { unit, message }) => {
                assert_eq!(unit, Unit::Line(2));
                assert!(!message.is_empty());
            }
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_messages_is_schema_error() {
        let err = summarize("{\"messages\":[]}\n{\"foo\": 1}\n").err();
        assert!(matches!(err, Some(DatasetError::Schema { index: 2 })));
    }

    #[test]
    fn test_messages_must_be_a_list() {
        let err = summarize(r#"[{"messages": []}, {"messages": "hi"}]"#).err();
        assert!(matches!(err, Some(DatasetError::Schema { index: 2 })));

        let err = summarize("[1]").err();
        assert!(matches!(err, Some(DatasetError::Schema { index: 1 })));
    }

    #[test]
    fn test_empty_input() -> Result<()> {
        let summary = summarize("")?;
        assert_eq!(summary.count, 0);
        assert_eq!(summary.dup_count, 0);
        assert_eq!(summary.dup_ratio, 0.0);
        assert_eq!(summary.avg_chars, 0.0);
        assert_eq!(summary.avg_tokens_like, 0.0);

        assert_eq!(summarize("  \n\n")?.count, 0);
        assert_eq!(summarize("[]")?.count, 0);
        Ok(())
    }

    #[test]
    fn test_averages_round_to_two_decimals() -> Result<()> {
        let text = concat!(
            r#"{"messages": [{"role": "user", "content": "a"}]}"#,
            "\n",
            r#"{"messages": [{"role": "user", "content": "a"}, {"role": "assistant", "content": ""}]}"#,
            "\n",
            r#"{"messages": []}"#,
        );
        // chars: 1 + 2 + 0 = 3 over 3 records; tokens: 1 + 1 + 0 = 2 over 3
        let summary = summarize(text)?;
        assert_eq!(summary.avg_chars, 1.0);
        assert_eq!(summary.avg_tokens_like, 0.67);
        Ok(())
    }

    #[test]
    fn test_average_ties_round_to_even() -> Result<()> {
        // 7 x 125 + 126 = 1001 code points over 8 records = 125.125
        let mut text = String::new();
        for i in 0..8 {
            let len = if i == 7 { 126 } else { 125 };
            let content = "a".repeat(len);
            text.push_str(&format!(
                "{{\"messages\": [{{\"role\": \"user\", \"content\": \"{content}\"}}]}}\n"
            ));
        }
        let summary = summarize(&text)?;
        assert_eq!(summary.count, 8);
        assert_eq!(summary.avg_chars, 125.12);
        assert_eq!(summary.avg_tokens_like, 1.0);

        assert_eq!(round2(0.125), 0.12);
        assert_eq!(round2(0.375), 0.38);
        assert_eq!(round2(2.0 / 3.0), 0.67);
        Ok(())
    }

    #[test]
    fn test_empty_summary_serializes_integer_averages() -> Result<()> {
        let json = serde_json::to_string(&summarize("")?)?;
        assert_eq!(
            json,
            r#"{"file":"mem","count":0,"dup_count":0,"dup_ratio":0.0,"avg_chars":0,"avg_tokens_like":0}"#
        );

        // A non-empty corpus of empty turns still reports float averages
        let json = serde_json::to_string(&summarize(r#"{"messages": []}"#)?)?;
        assert!(json.ends_with(r#""avg_chars":0.0,"avg_tokens_like":0.0}"#));
        Ok(())
    }

    #[test]
    fn test_validate_file_is_idempotent() -> Result<()> {
        let line = r#"{"messages": [{"role": "system", "content": "[STYLE=maid]"}, {"role": "user", "content": "おはよう！"}]}"#;
        let file = write_temp(&format!("{line}\n{line}\n"))?;

        let first = validate(file.path())?;
        let second = validate(file.path())?;
        assert_eq!(first, second);
        assert_eq!(first.file, file.path().display().to_string());
        assert_eq!(first.count, 2);
        assert_eq!(first.dup_count, 1);
        Ok(())
    }

    #[test]
    fn test_missing_file() {
        let err = validate("no/such/dataset.jsonl").err();
        assert!(matches!(err, Some(DatasetError::NotFound { .. })));
    }

    #[test]
    fn test_summary_json_shape() -> Result<()> {
        let summary = summarize(r#"{"messages": [{"role": "user", "content": "Hi, there!"}]}"#)?;
        let value = serde_json::to_value(&summary)?;
        let keys: Vec<&str> = value
            .as_object()
            .map(|o| o.keys().map(String::as_str).collect())
            .unwrap_or_default();
        assert_eq!(keys.len(), 6);
        assert_eq!(value["file"], "mem");
        assert_eq!(value["count"], 1);
        assert_eq!(value["avg_tokens_like"], 4.0);
        Ok(())
    }
}
