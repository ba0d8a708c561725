//! Tabular record store shared with the rest of the catalog preprocessing.
//!
//! The color pipeline only reads `id` and `img_url`; every other column is
//! carried through untouched in [`ItemRecord::attributes`] so downstream
//! collaborators see the full row.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use image::Rgb;
use serde::{Deserialize, Serialize};

use crate::catalog_color::item::ColorOutcome;

/// One catalog item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: String,
    #[serde(default)]
    pub img_url: Option<String>,
    /// Pass-through columns
    #[serde(flatten)]
    pub attributes: BTreeMap<String, String>,
}

impl ItemRecord {
    pub fn new(id: impl Into<String>, img_url: Option<impl Into<String>>) -> Self {
        Self {
            id: id.into(),
            img_url: img_url.map(Into::into),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(column.into(), value.into());
        self
    }
}

/// Input table: item records in catalog order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemTable {
    records: Vec<ItemRecord>,
}

impl ItemTable {
    pub fn new(records: Vec<ItemRecord>) -> Self {
        Self { records }
    }

    pub fn push(&mut self, record: ItemRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ItemRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ItemRecord> {
        self.records.iter()
    }

    pub fn into_records(self) -> Vec<ItemRecord> {
        self.records
    }
}

impl FromIterator<ItemRecord> for ItemTable {
    fn from_iter<T: IntoIterator<Item = ItemRecord>>(iter: T) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ItemTable {
    type Item = ItemRecord;
    type IntoIter = std::vec::IntoIter<ItemRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

/// Value of one of the `R`, `G`, `B` output cells.
///
/// Fallback rows store the text `"0"` rather than a number, matching the
/// checkpoint format downstream consumers already read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorCell {
    Value(u8),
    Fallback,
}

impl ColorCell {
    /// Numeric value of the cell; fallback cells are 0.
    pub fn value(self) -> u8 {
        match self {
            Self::Value(value) => value,
            Self::Fallback => 0,
        }
    }
}

impl fmt::Display for ColorCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => write!(f, "{value}"),
            Self::Fallback => f.write_str("0"),
        }
    }
}

/// An input row with its color result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedRow {
    pub record: ItemRecord,
    pub outcome: ColorOutcome,
}

impl AnnotatedRow {
    /// `R`, `G`, `B` cells in column order.
    pub fn color_cells(&self) -> [ColorCell; 3] {
        match &self.outcome {
            ColorOutcome::Success(Rgb([red, green, blue])) => [
                ColorCell::Value(*red),
                ColorCell::Value(*green),
                ColorCell::Value(*blue),
            ],
            ColorOutcome::Fallback(_) => [ColorCell::Fallback; 3],
        }
    }

    pub fn rgb(&self) -> Rgb<u8> {
        self.outcome.rgb()
    }

    /// Value of the `color_status` column.
    pub fn status(&self) -> &'static str {
        self.outcome.status()
    }
}

/// Output table: input rows in input order, one color result each.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotatedTable {
    rows: Vec<AnnotatedRow>,
}

impl AnnotatedTable {
    /// Pairs records with outcomes positionally.
    ///
    /// # Panics
    ///
    /// Panics if the counts differ; the orchestrator always produces one
    /// outcome per record.
    pub(crate) fn from_outcomes(table: ItemTable, outcomes: Vec<ColorOutcome>) -> Self {
        assert_eq!(
            table.len(),
            outcomes.len(),
            "one color outcome is required per item"
        );
        let rows = table
            .into_iter()
            .zip(outcomes)
            .map(|(record, outcome)| AnnotatedRow { record, outcome })
            .collect();
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[AnnotatedRow] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AnnotatedRow> {
        self.rows.iter()
    }

    /// Emitted colors in row order.
    pub fn colors(&self) -> Vec<Rgb<u8>> {
        self.rows.iter().map(AnnotatedRow::rgb).collect()
    }

    /// Union of pass-through column names, sorted.
    pub fn attribute_columns(&self) -> BTreeSet<&str> {
        self.rows
            .iter()
            .flat_map(|row| row.record.attributes.keys().map(String::as_str))
            .collect()
    }

    pub fn into_rows(self) -> Vec<AnnotatedRow> {
        self.rows
    }
}
