//! Bounding-box tracking for a set of positions.
//!
//! The sheet keeps two of these: one over non-empty cells (the printable
//! region) and one over every materialized cell (capacity checks). Rows come
//! cheap from the ordered set; the max column is cached and recomputed by a
//! scan only after a removal invalidates it.

use std::cell::Cell;
use std::collections::BTreeSet;

use cellgrid_common::{Position, Size};

#[derive(Debug, Default)]
pub(crate) struct SizeMonitor {
    cells: BTreeSet<Position>,
    max_col: Cell<Option<i32>>,
}

impl SizeMonitor {
    pub fn add(&mut self, pos: Position) {
        self.cells.insert(pos);
        if let Some(mc) = self.max_col.get() {
            self.max_col.set(Some(mc.max(pos.col)));
        }
        // A cold cache stays cold; seeding it from one position would hide
        // larger columns already in the set.
    }

    pub fn remove(&mut self, pos: Position) {
        self.cells.remove(&pos);
        self.max_col.set(None);
    }

    /// The exclusive bounding box, `(0, 0)` when empty.
    pub fn size(&self) -> Size {
        let Some(last) = self.cells.iter().next_back() else {
            return Size::default();
        };
        let max_col = match self.max_col.get() {
            Some(mc) => mc,
            None => {
                let mc = self.cells.iter().map(|p| p.col).max().unwrap_or(0);
                self.max_col.set(Some(mc));
                mc
            }
        };
        Size::new(last.row + 1, max_col + 1)
    }

    pub fn rows_inserted(&mut self, before: i32, count: i32) {
        self.shift(|pos| {
            (pos.row >= before).then(|| Position::new(pos.row + count, pos.col))
        });
    }

    pub fn cols_inserted(&mut self, before: i32, count: i32) {
        self.shift(|pos| {
            (pos.col >= before).then(|| Position::new(pos.row, pos.col + count))
        });
        self.max_col.set(None);
    }

    pub fn rows_deleted(&mut self, first: i32, count: i32) {
        self.drop_and_shift(
            |pos| pos.row >= first && pos.row < first + count,
            |pos| {
                (pos.row >= first + count).then(|| Position::new(pos.row - count, pos.col))
            },
        );
    }

    pub fn cols_deleted(&mut self, first: i32, count: i32) {
        self.drop_and_shift(
            |pos| pos.col >= first && pos.col < first + count,
            |pos| {
                (pos.col >= first + count).then(|| Position::new(pos.row, pos.col - count))
            },
        );
    }

    fn shift(&mut self, remap: impl Fn(Position) -> Option<Position>) {
        self.cells = self
            .cells
            .iter()
            .map(|&pos| remap(pos).unwrap_or(pos))
            .collect();
    }

    fn drop_and_shift(
        &mut self,
        in_band: impl Fn(Position) -> bool,
        remap: impl Fn(Position) -> Option<Position>,
    ) {
        self.cells = self
            .cells
            .iter()
            .filter(|&&pos| !in_band(pos))
            .map(|&pos| remap(pos).unwrap_or(pos))
            .collect();
        self.max_col.set(None);
    }
}
