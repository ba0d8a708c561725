//! Durable output for annotated tables.

use std::path::{Path, PathBuf};

use rust_xlsxwriter::Workbook;
use tracing::info;

use crate::config::CHECKPOINT_FILE;
use crate::error::SinkError;
use crate::table::{AnnotatedTable, ColorCell};

/// Excel's per-sheet row limit.
const MAX_ROWS: usize = 1_048_576;
/// Excel's per-sheet column limit.
const MAX_COLUMNS: usize = 16_384;

/// Destination for a finished annotated table.
pub trait TableSink {
    fn write(&mut self, table: &AnnotatedTable) -> Result<(), SinkError>;
}

/// Writes the annotated table to a single-sheet `.xlsx` workbook.
///
/// Header: `id`, `img_url`, the pass-through columns in sorted order, `R`,
/// `G`, `B`, `color_status`. Successful colors are numbers, fallback colors
/// are the text `"0"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XlsxSink {
    path: PathBuf,
}

impl XlsxSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Sink writing `temp_preprocess_color.xlsx` in the working directory.
    pub fn checkpoint() -> Self {
        Self::new(CHECKPOINT_FILE)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn build_workbook(table: &AnnotatedTable) -> Result<Workbook, SinkError> {
        let attributes: Vec<&str> = table.attribute_columns().into_iter().collect();

        let mut header = vec!["id", "img_url"];
        header.extend(attributes.iter().copied());
        header.extend(["R", "G", "B", "color_status"]);

        if table.len() + 1 > MAX_ROWS {
            return Err(SinkError::TooManyRows {
                rows: table.len(),
                limit: MAX_ROWS - 1,
            });
        }
        if header.len() > MAX_COLUMNS {
            return Err(SinkError::TooManyColumns {
                columns: header.len(),
                limit: MAX_COLUMNS,
            });
        }

        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();

        for (col, name) in header.iter().enumerate() {
            worksheet.write_string(0, col as u16, *name)?;
        }

        let color_col = (2 + attributes.len()) as u16;
        for (index, row) in table.iter().enumerate() {
            let row_num = (index + 1) as u32;
            let record = &row.record;

            worksheet.write_string(row_num, 0, record.id.as_str())?;
            if let Some(url) = &record.img_url {
                worksheet.write_string(row_num, 1, url.as_str())?;
            }
            for (offset, column) in attributes.iter().enumerate() {
                if let Some(value) = record.attributes.get(*column) {
                    worksheet.write_string(row_num, (2 + offset) as u16, value.as_str())?;
                }
            }

            for (offset, cell) in row.color_cells().into_iter().enumerate() {
                let col = color_col + offset as u16;
                match cell {
                    ColorCell::Value(value) => {
                        worksheet.write_number(row_num, col, f64::from(value))?;
                    }
                    ColorCell::Fallback => {
                        worksheet.write_string(row_num, col, "0")?;
                    }
                }
            }
            worksheet.write_string(row_num, color_col + 3, row.status())?;
        }

        Ok(workbook)
    }
}

impl TableSink for XlsxSink {
    fn write(&mut self, table: &AnnotatedTable) -> Result<(), SinkError> {
        let mut workbook = Self::build_workbook(table)?;
        workbook.save(&self.path)?;
        info!(
            path = %self.path.display(),
            rows = table.len(),
            "Wrote color checkpoint"
        );
        Ok(())
    }
}
