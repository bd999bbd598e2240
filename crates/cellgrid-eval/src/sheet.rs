//! The sheet: owner of the cell grid and orchestrator of every edit.
//!
//! The grid is a sparse row-major vector of rows; rows grow independently
//! and a slot is `None` until a cell materializes there — either by an
//! explicit `set_cell` or implicitly as an empty placeholder the moment some
//! formula references it. Two monitors track bounding boxes: `printable`
//! covers non-empty cells, `occupied` covers everything materialized and
//! backs the capacity check on inserts.
//!
//! Dependency bookkeeping invariants (checked by the test suite):
//! forward and reverse edges mirror each other, the forward graph stays
//! acyclic, and a cold cache is always recomputed on the next read.

use std::io::{self, Write};
use std::rc::Rc;

use rustc_hash::FxHashSet;

use cellgrid_common::{CellValue, Position, Size};
use cellgrid_parse::ASTNode;

use crate::adjuster::{ShiftAxis, ShiftOp};
use crate::cell::{Cell, CellData, CellState, classify};
use crate::error::SheetError;
use crate::evaluator::{ValueResolver, evaluate};
use crate::size_monitor::SizeMonitor;

#[derive(Debug, Default)]
pub struct Sheet {
    rows: Vec<Vec<Option<Box<Cell>>>>,
    printable: SizeMonitor,
    occupied: SizeMonitor,
    /// Cells that are logically empty but kept alive by inbound references.
    empty_cells: FxHashSet<Position>,
}

impl Sheet {
    pub fn new() -> Self {
        Self::default()
    }

    /* ===================  reads  =================== */

    /// The cell at `pos`, if one has materialized there.
    pub fn cell(&self, pos: Position) -> Result<Option<&Cell>, SheetError> {
        self.check_pos(pos)?;
        Ok(self.cell_ref(pos))
    }

    /// The computed value at `pos`. An absent cell reads as zero, the same
    /// way formulas see it.
    pub fn value(&mut self, pos: Position) -> Result<CellValue, SheetError> {
        self.check_pos(pos)?;
        Ok(self
            .value_at(pos)
            .unwrap_or(CellValue::Number(0.0)))
    }

    /// The tightest bounding box covering all non-empty cells.
    pub fn printable_size(&self) -> Size {
        self.printable.size()
    }

    /// Every materialized cell, placeholders included, in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.rows
            .iter()
            .flat_map(|row| row.iter().flatten().map(Box::as_ref))
    }

    /// Print computed values, rows `\n`-terminated, cells `\t`-separated.
    /// Absent cells contribute no characters. Evaluation may warm caches,
    /// hence `&mut self`.
    pub fn print_values<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        let size = self.printable_size();
        for row in 0..size.rows {
            for col in 0..size.cols {
                if col > 0 {
                    out.write_all(b"\t")?;
                }
                let pos = Position::new(row, col);
                if self.cell_ref(pos).is_some()
                    && let Some(value) = self.value_at(pos)
                {
                    write!(out, "{value}")?;
                }
            }
            out.write_all(b"\n")?;
        }
        Ok(())
    }

    /// Print text forms in the same layout as [`Sheet::print_values`].
    pub fn print_texts<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let size = self.printable_size();
        for row in 0..size.rows {
            for col in 0..size.cols {
                if col > 0 {
                    out.write_all(b"\t")?;
                }
                if let Some(cell) = self.cell_ref(Position::new(row, col)) {
                    write!(out, "{}", cell.text())?;
                }
            }
            out.write_all(b"\n")?;
        }
        Ok(())
    }

    /* ===================  cell edits  =================== */

    pub fn set_cell(&mut self, pos: Position, text: &str) -> Result<(), SheetError> {
        self.check_pos(pos)?;

        if self.cell_ref(pos).is_some() {
            let old_state = self.cell_ref(pos).map(|c| c.state);
            let new_state = self.apply_set(pos, text)?;
            let old_state = old_state.unwrap_or(CellState::Empty);

            if old_state == CellState::Empty && new_state != CellState::Empty {
                self.empty_cells.remove(&pos);
                self.printable.add(pos);
            }
            if old_state != CellState::Empty && new_state == CellState::Empty {
                self.printable.remove(pos);
                let keep = self
                    .cell_ref(pos)
                    .is_some_and(|c| !c.reverse_refs.is_empty());
                if keep {
                    self.empty_cells.insert(pos);
                } else {
                    self.occupied.remove(pos);
                    self.drop_slot(pos);
                }
            }
            return Ok(());
        }

        if text.is_empty() {
            return Ok(());
        }

        // Classify and cycle-check before materializing anything, so a
        // rejected edit leaves no trace.
        let (state, data) = classify(text)?;
        let refs = data.referenced_cells().to_vec();
        if self.creates_cycle(pos, &refs) {
            return Err(SheetError::CircularDependency(pos));
        }

        self.ensure_slot(pos);
        let mut cell = Cell::new(pos);
        cell.state = state;
        cell.data = data;
        cell.forward_refs = refs.clone();
        cell.last_set = Some((text.to_string(), false));
        self.place(cell);
        self.set_refs(pos, &refs);
        self.printable.add(pos);
        self.occupied.add(pos);
        Ok(())
    }

    /// Destroy the cell at `pos`. Dependents keep their (now dangling)
    /// references and re-evaluate the absent cell as zero.
    pub fn clear_cell(&mut self, pos: Position) -> Result<(), SheetError> {
        self.check_pos(pos)?;
        if self.cell_ref(pos).is_none() {
            return Ok(());
        }
        self.reset_cache(pos, true);
        self.clear_refs(pos);
        self.printable.remove(pos);
        self.occupied.remove(pos);
        self.empty_cells.remove(&pos);
        self.drop_slot(pos);
        Ok(())
    }

    /* ===================  structural edits  =================== */

    pub fn insert_rows(&mut self, before: i32, count: i32) -> Result<(), SheetError> {
        let before = before.clamp(0, Position::MAX_ROWS);
        let count = count.clamp(0, Position::MAX_ROWS);
        self.validate_expand(before, count, ShiftAxis::Rows)?;

        self.shift_cells(ShiftOp::Insert {
            axis: ShiftAxis::Rows,
            before,
            count,
        });
        self.printable.rows_inserted(before, count);
        self.occupied.rows_inserted(before, count);
        if (before as usize) < self.rows.len() {
            self.rows
                .splice(before as usize..before as usize, (0..count).map(|_| Vec::new()));
        }
        self.rebuild_edges();
        Ok(())
    }

    pub fn insert_cols(&mut self, before: i32, count: i32) -> Result<(), SheetError> {
        let before = before.clamp(0, Position::MAX_COLS);
        let count = count.clamp(0, Position::MAX_COLS);
        self.validate_expand(before, count, ShiftAxis::Cols)?;

        self.shift_cells(ShiftOp::Insert {
            axis: ShiftAxis::Cols,
            before,
            count,
        });
        self.printable.cols_inserted(before, count);
        self.occupied.cols_inserted(before, count);
        for row in &mut self.rows {
            if (before as usize) < row.len() {
                row.splice(before as usize..before as usize, (0..count).map(|_| None));
            }
        }
        self.rebuild_edges();
        Ok(())
    }

    pub fn delete_rows(&mut self, first: i32, count: i32) {
        let first = first.clamp(0, Position::MAX_ROWS);
        let count = count.clamp(0, Position::MAX_ROWS - first);
        if count == 0 {
            return;
        }

        self.invalidate_band(ShiftAxis::Rows, first, count);
        self.shift_cells(ShiftOp::Delete {
            axis: ShiftAxis::Rows,
            first,
            count,
        });
        let lo = (first as usize).min(self.rows.len());
        let hi = ((first + count) as usize).min(self.rows.len());
        self.rows.drain(lo..hi);
        self.printable.rows_deleted(first, count);
        self.occupied.rows_deleted(first, count);
        self.rebuild_edges();
        self.sweep_empty_cells();
    }

    pub fn delete_cols(&mut self, first: i32, count: i32) {
        let first = first.clamp(0, Position::MAX_COLS);
        let count = count.clamp(0, Position::MAX_COLS - first);
        if count == 0 {
            return;
        }

        self.invalidate_band(ShiftAxis::Cols, first, count);
        self.shift_cells(ShiftOp::Delete {
            axis: ShiftAxis::Cols,
            first,
            count,
        });
        for row in &mut self.rows {
            let lo = (first as usize).min(row.len());
            let hi = ((first + count) as usize).min(row.len());
            row.drain(lo..hi);
        }
        self.printable.cols_deleted(first, count);
        self.occupied.cols_deleted(first, count);
        self.rebuild_edges();
        self.sweep_empty_cells();
    }

    /* ===================  set internals  =================== */

    /// The full `Set` protocol on an existing cell. Returns the state after
    /// the call (the old state when the edit was a no-op).
    fn apply_set(&mut self, pos: Position, text: &str) -> Result<CellState, SheetError> {
        let cell = self
            .cell_ref(pos)
            .expect("apply_set requires a materialized cell");
        let old_state = cell.state;

        // Fast path: replay the previous outcome for a repeated argument.
        if let Some((last_text, cycled)) = &cell.last_set
            && last_text == text
        {
            return if *cycled {
                Err(SheetError::CircularDependency(pos))
            } else {
                Ok(old_state)
            };
        }

        let (state, data) = classify(text)?;

        // No-op detection: same kind of content, same visible text.
        if old_state == CellState::Empty && state == CellState::Empty {
            return Ok(old_state);
        }
        let same_text = || self.cell_ref(pos).is_some_and(|c| c.text() == data.text_form());
        if old_state == CellState::Text && state == CellState::Text && same_text() {
            return Ok(old_state);
        }
        if old_state != CellState::Empty
            && state != CellState::Empty
            && old_state != CellState::Text
            && state != CellState::Text
            && same_text()
        {
            return Ok(old_state);
        }

        let refs = data.referenced_cells().to_vec();
        if self.creates_cycle(pos, &refs) {
            if let Some(cell) = self.cell_mut(pos) {
                cell.last_set = Some((text.to_string(), true));
            }
            return Err(SheetError::CircularDependency(pos));
        }

        self.clear_refs(pos);
        if let Some(cell) = self.cell_mut(pos) {
            cell.data = data;
            cell.state = state;
            cell.forward_refs = refs.clone();
        }
        self.set_refs(pos, &refs);
        self.reset_cache(pos, true);
        if let Some(cell) = self.cell_mut(pos) {
            cell.last_set = Some((text.to_string(), false));
        }
        Ok(state)
    }

    /// Would pointing `origin` at `new_refs` close a loop? Iterative DFS
    /// over the existing forward edges.
    fn creates_cycle(&self, origin: Position, new_refs: &[Position]) -> bool {
        let mut stack: Vec<Position> = new_refs.to_vec();
        let mut visited: FxHashSet<Position> = FxHashSet::default();
        while let Some(pos) = stack.pop() {
            if pos == origin {
                return true;
            }
            if !visited.insert(pos) {
                continue;
            }
            if let Some(cell) = self.cell_ref(pos) {
                stack.extend(cell.forward_refs.iter().copied());
            }
        }
        false
    }

    /// Remove `pos` from the reverse set of each of its targets.
    fn clear_refs(&mut self, pos: Position) {
        let targets = match self.cell_ref(pos) {
            Some(cell) => cell.forward_refs.clone(),
            None => return,
        };
        for target in targets {
            if let Some(cell) = self.cell_mut(target) {
                cell.reverse_refs.remove(&pos);
            }
        }
    }

    /// Insert `pos` into the reverse set of each target, materializing empty
    /// placeholders as needed.
    fn set_refs(&mut self, pos: Position, refs: &[Position]) {
        for &target in refs {
            self.force_initialize(target);
            if let Some(cell) = self.cell_mut(target) {
                cell.reverse_refs.insert(pos);
            }
        }
    }

    /// Mark-dirty downstream: drop the cache at `start` (unconditionally
    /// when forced), then walk reverse edges, short-circuiting at cells
    /// whose cache is already cold.
    fn reset_cache(&mut self, start: Position, force: bool) {
        let mut stack: Vec<(Position, bool)> = vec![(start, force)];
        while let Some((pos, force)) = stack.pop() {
            let Some(cell) = self.cell_mut(pos) else {
                continue;
            };
            if force || cell.is_cached() {
                cell.reset_own_cache();
                stack.extend(cell.reverse_refs.iter().map(|&p| (p, false)));
            }
        }
    }

    /* ===================  evaluation  =================== */

    fn value_at(&mut self, pos: Position) -> Option<CellValue> {
        enum Plan {
            Ready(CellValue),
            Evaluate(Rc<ASTNode>),
        }

        let plan = {
            let cell = self.cell_ref(pos)?;
            if let Some(err) = cell.state_error() {
                Plan::Ready(err)
            } else {
                match &cell.data {
                    CellData::Text { value, .. } => Plan::Ready(value.clone()),
                    CellData::Formula(f) => match f.cached_value() {
                        Some(value) => Plan::Ready(value.clone()),
                        None => Plan::Evaluate(f.ast()),
                    },
                }
            }
        };

        match plan {
            Plan::Ready(value) => Some(value),
            Plan::Evaluate(ast) => {
                let value = evaluate(&ast, &mut Resolver(self));
                if let Some(cell) = self.cell_mut(pos)
                    && let CellData::Formula(f) = &mut cell.data
                {
                    f.set_cached_value(value.clone());
                }
                Some(value)
            }
        }
    }

    /* ===================  structural internals  =================== */

    /// Pre-insert capacity check: the pivot plus the new span and the
    /// occupied bounding box plus the new span must both stay inside the
    /// grid. Nothing is mutated on failure.
    fn validate_expand(
        &self,
        before: i32,
        count: i32,
        axis: ShiftAxis,
    ) -> Result<(), SheetError> {
        let (limit, bound) = match axis {
            ShiftAxis::Rows => (Position::MAX_ROWS, self.occupied.size().rows),
            ShiftAxis::Cols => (Position::MAX_COLS, self.occupied.size().cols),
        };
        if before + count >= limit || bound + count >= limit {
            return Err(SheetError::TableTooBig(axis));
        }
        Ok(())
    }

    /// Run the shift over every materialized cell: drop its memos, rewrite
    /// its formula, move its recorded position. Grid relocation and edge
    /// repair happen afterwards.
    fn shift_cells(&mut self, op: ShiftOp) {
        for row in &mut self.rows {
            for slot in row.iter_mut().flatten() {
                let cell = slot.as_mut();
                cell.reset_own_cache();
                if let CellData::Formula(f) = &mut cell.data {
                    f.apply(op);
                    cell.forward_refs = f.referenced_cells().to_vec();
                }
                cell.position = shift_position(cell.position, op);
            }
        }
    }

    /// Turn every cell inside the deleted band into a sticky `#REF!`, then
    /// propagate that state through the transitive reverse-dependents.
    /// Cells already in `RefError` are terminal.
    fn invalidate_band(&mut self, axis: ShiftAxis, first: i32, count: i32) {
        let mut stack: Vec<Position> = Vec::new();
        for row in &mut self.rows {
            for slot in row.iter_mut().flatten() {
                let cell = slot.as_mut();
                let k = match axis {
                    ShiftAxis::Rows => cell.position.row,
                    ShiftAxis::Cols => cell.position.col,
                };
                if k >= first && k < first + count {
                    cell.state = CellState::RefError;
                    stack.extend(cell.reverse_refs.iter().copied());
                }
            }
        }

        let mut visited: FxHashSet<Position> = FxHashSet::default();
        while let Some(pos) = stack.pop() {
            if !visited.insert(pos) {
                continue;
            }
            let Some(cell) = self.cell_mut(pos) else {
                continue;
            };
            if cell.state == CellState::RefError {
                continue;
            }
            cell.state = CellState::RefError;
            stack.extend(cell.reverse_refs.iter().copied());
        }
    }

    /// Recompute every reverse set and the empty-cell registry from the
    /// surviving forward-reference lists, materializing placeholders for
    /// references to unallocated slots.
    fn rebuild_edges(&mut self) {
        let mut edges: Vec<(Position, Vec<Position>)> = Vec::new();
        let mut empties: FxHashSet<Position> = FxHashSet::default();
        for row in &mut self.rows {
            for slot in row.iter_mut().flatten() {
                let cell = slot.as_mut();
                cell.reverse_refs.clear();
                if !cell.forward_refs.is_empty() {
                    edges.push((cell.position, cell.forward_refs.clone()));
                }
                if cell.state == CellState::Empty {
                    empties.insert(cell.position);
                }
            }
        }
        self.empty_cells = empties;
        for (source, refs) in edges {
            self.set_refs(source, &refs);
        }
    }

    /// Destroy cells that are empty and no longer referenced by anyone.
    fn sweep_empty_cells(&mut self) {
        let doomed: Vec<Position> = self
            .empty_cells
            .iter()
            .copied()
            .filter(|&pos| {
                self.cell_ref(pos)
                    .is_some_and(|c| c.state == CellState::Empty && c.reverse_refs.is_empty())
            })
            .collect();
        for pos in doomed {
            self.empty_cells.remove(&pos);
            self.occupied.remove(pos);
            self.drop_slot(pos);
        }
    }

    /* ===================  grid plumbing  =================== */

    fn check_pos(&self, pos: Position) -> Result<(), SheetError> {
        if pos.is_valid() {
            Ok(())
        } else {
            Err(SheetError::InvalidPosition(pos))
        }
    }

    fn cell_ref(&self, pos: Position) -> Option<&Cell> {
        self.rows
            .get(pos.row as usize)?
            .get(pos.col as usize)?
            .as_deref()
    }

    fn cell_mut(&mut self, pos: Position) -> Option<&mut Cell> {
        self.rows
            .get_mut(pos.row as usize)?
            .get_mut(pos.col as usize)?
            .as_deref_mut()
    }

    /// Grow the grid so `pos` indexes a real slot.
    fn ensure_slot(&mut self, pos: Position) {
        let row = pos.row as usize;
        let col = pos.col as usize;
        if row >= self.rows.len() {
            self.rows.resize_with(row + 1, Vec::new);
        }
        if col >= self.rows[row].len() {
            self.rows[row].resize_with(col + 1, || None);
        }
    }

    fn place(&mut self, cell: Cell) {
        let pos = cell.position;
        self.ensure_slot(pos);
        self.rows[pos.row as usize][pos.col as usize] = Some(Box::new(cell));
    }

    fn drop_slot(&mut self, pos: Position) {
        if let Some(row) = self.rows.get_mut(pos.row as usize)
            && let Some(slot) = row.get_mut(pos.col as usize)
        {
            *slot = None;
        }
    }

    /// Materialize an empty placeholder cell, registered as occupied but
    /// not printable.
    fn force_initialize(&mut self, pos: Position) {
        if self.cell_ref(pos).is_some() {
            return;
        }
        self.place(Cell::new(pos));
        self.occupied.add(pos);
        self.empty_cells.insert(pos);
    }

}

/// Shift a cell's own coordinate under a structural edit. A cell inside a
/// deleted band keeps its coordinate; the sheet removes it physically.
fn shift_position(pos: Position, op: ShiftOp) -> Position {
    let k = match op.axis() {
        ShiftAxis::Rows => pos.row,
        ShiftAxis::Cols => pos.col,
    };
    let shifted = match op {
        ShiftOp::Insert { before, count, .. } => {
            if k < before {
                return pos;
            }
            k + count
        }
        ShiftOp::Delete { first, count, .. } => {
            if k < first + count {
                return pos;
            }
            k - count
        }
    };
    match op.axis() {
        ShiftAxis::Rows => Position::new(shifted, pos.col),
        ShiftAxis::Cols => Position::new(pos.row, shifted),
    }
}

/// Value lookups during evaluation recurse back into the sheet.
struct Resolver<'a>(&'a mut Sheet);

impl ValueResolver for Resolver<'_> {
    fn cell_value(&mut self, pos: Position) -> Option<CellValue> {
        self.0.value_at(pos)
    }
}
