use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{CellRange, MirrorSyncError, SheetClient};

/// In-process sheet grid. Reads follow the Sheets API shape: trailing empty
/// cells and rows are dropped, interior empty rows come back empty.
#[derive(Default)]
pub struct MemorySheet {
    grid: Mutex<Vec<Vec<String>>>,
    writes: AtomicUsize,
    header_formats: AtomicUsize,
    frozen_rows: AtomicUsize,
    offline: AtomicBool,
}

impl MemorySheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an unreachable sheet: every call fails while set.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn header_format_count(&self) -> usize {
        self.header_formats.load(Ordering::SeqCst)
    }

    pub fn frozen_rows(&self) -> usize {
        self.frozen_rows.load(Ordering::SeqCst)
    }

    /// Copy of the grid with trailing blanks trimmed.
    pub fn rows(&self) -> Vec<Vec<String>> {
        let grid = self.grid.lock();
        trim_rows(grid.iter().map(|row| trim_cells(row.clone())).collect())
    }

    fn check_online(&self) -> Result<(), MirrorSyncError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(MirrorSyncError::Unavailable("memory sheet is offline".into()));
        }
        Ok(())
    }
}

fn trim_cells(mut row: Vec<String>) -> Vec<String> {
    while row.last().is_some_and(|c| c.is_empty()) {
        row.pop();
    }
    row
}

fn trim_rows(mut rows: Vec<Vec<String>>) -> Vec<Vec<String>> {
    while rows.last().is_some_and(|r| r.is_empty()) {
        rows.pop();
    }
    rows
}

#[async_trait]
impl SheetClient for MemorySheet {
    async fn read_range(&self, range: &str) -> Result<Vec<Vec<String>>, MirrorSyncError> {
        self.check_online()?;
        let range = CellRange::parse(range)?;
        let grid = self.grid.lock();

        let first = range.start_row.unwrap_or(1) - 1;
        let last = range.end_row.unwrap_or(grid.len()).min(grid.len());
        let rows = (first..last)
            .map(|r| {
                let row = &grid[r];
                let cells = (range.start_col..=range.end_col)
                    .map(|c| row.get(c).cloned().unwrap_or_default())
                    .collect();
                trim_cells(cells)
            })
            .collect();
        Ok(trim_rows(rows))
    }

    async fn write_range(
        &self,
        range: &str,
        values: Vec<Vec<String>>,
    ) -> Result<(), MirrorSyncError> {
        self.check_online()?;
        let parsed = CellRange::parse(range)?;
        let width = parsed.end_col - parsed.start_col + 1;
        let start = parsed.start_row.unwrap_or(1) - 1;
        if let Some(end) = parsed.end_row {
            if values.len() > end - start {
                return Err(MirrorSyncError::Range(range.to_string()));
            }
        }

        let mut grid = self.grid.lock();
        for (offset, row_values) in values.into_iter().enumerate() {
            if row_values.len() > width {
                return Err(MirrorSyncError::Range(range.to_string()));
            }
            let r = start + offset;
            if grid.len() <= r {
                grid.resize_with(r + 1, Vec::new);
            }
            let row = &mut grid[r];
            for (i, value) in row_values.into_iter().enumerate() {
                let c = parsed.start_col + i;
                if row.len() <= c {
                    row.resize(c + 1, String::new());
                }
                row[c] = value;
            }
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn format_header(&self, _columns: usize) -> Result<(), MirrorSyncError> {
        self.check_online()?;
        self.header_formats.fetch_add(1, Ordering::SeqCst);
        self.frozen_rows.store(1, Ordering::SeqCst);
        Ok(())
    }
}
