use super::Record;
use serde::{Deserialize, Deserializer, Serialize};

/// A named, ordered collection of records plus an "is sorted" flag.
///
/// The flag is only ever raised by code that has just put the records in
/// key order ([`Batch::sort_in_place`]) or checked that they are
/// ([`Batch::seal_sorted`]). Any mutation lowers it again. A decoded
/// batch keeps a received flag only if its records really are in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Batch {
    name: String,
    records: Vec<Record>,
    sorted: bool,
}

impl Batch {
    /// Create an empty, unsorted batch
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: Vec::new(),
            sorted: false,
        }
    }

    /// Create an unsorted batch from existing records
    pub fn from_records(name: impl Into<String>, records: Vec<Record>) -> Self {
        Self {
            name: name.into(),
            records,
            sorted: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    /// Append a record
    pub fn push(&mut self, record: Record) {
        self.records.push(record);
        self.sorted = false;
    }

    /// Whether the records are in non-decreasing key order
    pub fn is_in_key_order(&self) -> bool {
        self.records.windows(2).all(|w| w[0].key() <= w[1].key())
    }

    /// Stable sort by key, then mark the batch sorted
    pub fn sort_in_place(&mut self) {
        self.records.sort_by_key(Record::key);
        self.sorted = true;
    }

    /// Raise the sorted flag if, and only if, the records are in key order.
    ///
    /// Returns the resulting flag.
    pub fn seal_sorted(&mut self) -> bool {
        self.sorted = self.is_in_key_order();
        self.sorted
    }

    /// Whether a sorted flag seen on this batch can be trusted
    pub fn is_verified_sorted(&self) -> bool {
        self.sorted && self.is_in_key_order()
    }
}

#[derive(Deserialize)]
struct WireBatch {
    name: String,
    records: Vec<Record>,
    sorted: bool,
}

impl<'de> Deserialize<'de> for Batch {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let wire = WireBatch::deserialize(deserializer)?;
        let mut batch = Batch::from_records(wire.name, wire.records);
        if wire.sorted {
            batch.seal_sorted();
        }
        Ok(batch)
    }
}
