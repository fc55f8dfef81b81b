use crate::error::{DistSortError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Integer key every record is ordered by
pub type Key = i64;

/// One sortable row: the text it was read from and the key parsed out of it.
///
/// Records are compared by key only. The text is kept so output can be
/// written back exactly as it was read. On the wire a record is just its
/// text; the key is parsed again on decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    text: String,
    key: Key,
}

impl Record {
    /// Parse a record from a line. Surrounding whitespace is trimmed.
    pub fn parse(line: &str) -> std::result::Result<Self, std::num::ParseIntError> {
        let text = line.trim();
        let key = text.parse::<Key>()?;
        Ok(Self {
            text: text.to_string(),
            key,
        })
    }

    /// Parse a record, attributing failures to a 1-based line number
    pub fn parse_line(line_number: usize, line: &str) -> Result<Self> {
        Self::parse(line).map_err(|source| DistSortError::RecordParse {
            line: line_number,
            text: line.trim().to_string(),
            source,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn key(&self) -> Key {
        self.key
    }
}

impl Serialize for Record {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.text)
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        Record::parse(&text)
            .map_err(|e| serde::de::Error::custom(format!("invalid record '{text}': {e}")))
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
