//! maidkit - Dataset loading
//!
//! Maps a dataset file into memory once and yields its records lazily.
//! Both JSON Lines and a single top-level JSON array are accepted; the
//! container is detected from the first non-whitespace character.

use memmap2::Mmap;
use serde_json::Value;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{DatasetError, Result, Unit};

/// Storage backend for the dataset
enum DataStorage {
    /// Memory-mapped file
    Mmap(Mmap),
    /// In-memory buffer (stdin, empty files, tests)
    InMemory(Vec<u8>),
}

impl DataStorage {
    fn as_bytes(&self) -> &[u8] {
        match self {
            DataStorage::Mmap(m) => m.as_ref(),
            DataStorage::InMemory(v) => v.as_slice(),
        }
    }
}

/// Container format of a dataset file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    /// One JSON value per non-blank line
    Lines,
    /// A single top-level JSON array
    Array,
}

impl Container {
    /// Detect the container from raw text.
    ///
    /// Content whose first non-whitespace character is `[` is an array,
    /// anything else (including empty content) is line-delimited.
    pub fn detect(text: &str) -> Self {
        if text.trim_start().starts_with('[') {
            Container::Array
        } else {
            Container::Lines
        }
    }
}

/// A dataset read once into memory
pub struct Dataset {
    storage: DataStorage,
    /// Path as given, for display
    pub path: String,
    /// Size in bytes
    pub size: u64,
}

impl Dataset {
    /// Open a dataset file.
    ///
    /// A missing path is reported as [`DatasetError::NotFound`] before
    /// anything is read.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        if !path_ref.exists() {
            return Err(DatasetError::NotFound {
                path: path_ref.to_path_buf(),
            });
        }

        let io_err = |source: io::Error| DatasetError::Io {
            path: path_ref.to_path_buf(),
            source,
        };

        let file = File::open(path_ref).map_err(io_err)?;
        let size = file.metadata().map_err(io_err)?.len();

        // Zero-length files cannot be mapped on every platform
        let storage = if size == 0 {
            DataStorage::InMemory(Vec::new())
        } else {
            let mmap = unsafe { Mmap::map(&file) }.map_err(io_err)?;
            DataStorage::Mmap(mmap)
        };

        let dataset = Self {
            storage,
            path: path_ref.display().to_string(),
            size,
        };
        debug!("Opened {} ({})", dataset.path, dataset.size_human());
        Ok(dataset)
    }

    /// Read dataset from stdin
    ///
    /// Supports pipeline workflows: `cat data.jsonl | maidkit validate -`
    pub fn from_stdin() -> Result<Self> {
        let mut buffer = Vec::new();
        io::stdin()
            .lock()
            .read_to_end(&mut buffer)
            .map_err(|source| DatasetError::Io {
                path: PathBuf::from("<stdin>"),
                source,
            })?;
        Ok(Self::from_bytes("<stdin>", buffer))
    }

    /// Wrap an in-memory buffer
    pub fn from_bytes(path: impl Into<String>, buffer: Vec<u8>) -> Self {
        let size = buffer.len() as u64;
        Self {
            storage: DataStorage::InMemory(buffer),
            path: path.into(),
            size,
        }
    }

    /// The dataset content as UTF-8 text
    pub fn text(&self) -> Result<&str> {
        std::str::from_utf8(self.storage.as_bytes()).map_err(|e| DatasetError::Parse {
            unit: Unit::TopLevel,
            message: format!("invalid UTF-8: {}", e),
        })
    }

    /// Detected container format
    pub fn container(&self) -> Result<Container> {
        Ok(Container::detect(self.text()?))
    }

    /// Iterate over `(index, record)` pairs.
    ///
    /// Line-delimited input yields the 1-based line number (blank lines
    /// counted) as the index; array input yields the 1-based element
    /// position. An array is parsed up front, so a malformed array or a
    /// non-array top-level value fails here. Line parse errors surface
    /// from the iterator, after which it yields nothing further.
    pub fn records(&self) -> Result<Records<'_>> {
        let text = self.text()?;
        let container = Container::detect(text);
        debug!("Detected {:?} container in {}", container, self.path);

        let inner = match container {
            Container::Lines => RecordsInner::Lines(text.split('\n').enumerate()),
            Container::Array => {
                // Detection skips any Unicode whitespace, JSON only allows ASCII
                let value: Value =
                    serde_json::from_str(text.trim_start()).map_err(|e| DatasetError::Parse {
                        unit: Unit::TopLevel,
                        message: e.to_string(),
                    })?;
                match value {
                    Value::Array(items) => RecordsInner::Array(items.into_iter().enumerate()),
                    _ => {
                        return Err(DatasetError::Format {
                            message: "top-level JSON must be an array".to_string(),
                        })
                    }
                }
            }
        };

        Ok(Records { inner, done: false })
    }

    /// Collect every record, stopping at the first error
    pub fn load_all(&self) -> Result<Vec<(usize, Value)>> {
        self.records()?.collect()
    }

    /// Human-readable size of the dataset
    pub fn size_human(&self) -> String {
        format_size(self.size)
    }
}

/// Format a byte count with binary units, e.g. `2.00 KB`
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}

enum RecordsInner<'a> {
    Lines(std::iter::Enumerate<std::str::Split<'a, char>>),
    Array(std::iter::Enumerate<std::vec::IntoIter<Value>>),
}

/// Lazy, fail-fast iterator over the records of a [`Dataset`]
pub struct Records<'a> {
    inner: RecordsInner<'a>,
    done: bool,
}

impl Iterator for Records<'_> {
    type Item = Result<(usize, Value)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match &mut self.inner {
            RecordsInner::Array(items) => items.next().map(|(i, value)| Ok((i + 1, value))),
            RecordsInner::Lines(lines) => {
                for (i, line) in lines.by_ref() {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let line_num = i + 1;
                    return Some(match serde_json::from_str(line) {
                        Ok(value) => Ok((line_num, value)),
                        Err(e) => {
                            self.done = true;
                            Err(DatasetError::Parse {
                                unit: Unit::Line(line_num),
                                message: e.to_string(),
                            })
                        }
                    });
                }
                None
            }
        }
    }
}
