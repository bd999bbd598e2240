//! A single cell: its content, its state, and its place in the dependency
//! graph.
//!
//! Content is a closed two-variant sum (text or formula), switched on at
//! every read. Cells name each other by `Position`, never by pointer, so the
//! graph survives grid relocations. The three error states are sticky
//! overlays imposed by structural edits: they win over the underlying data
//! until the cell is overwritten.

use rustc_hash::FxHashSet;

use cellgrid_common::{CellError, CellValue, Position};
use cellgrid_parse::ParserError;

use crate::formula::Formula;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    Empty,
    Text,
    Formula,
    RefError,
    ValueError,
    Div0Error,
}

/// What a cell stores: a text literal with its precomputed value, or a
/// formula bundle.
#[derive(Debug, Clone)]
pub(crate) enum CellData {
    Text { text: String, value: CellValue },
    Formula(Formula),
}

impl CellData {
    pub(crate) fn text(text: &str) -> Self {
        let value = if text.is_empty() {
            CellValue::Number(0.0)
        } else if let Some(n) = clean_double(text) {
            CellValue::Number(n)
        } else if let Some(stripped) = text.strip_prefix('\'') {
            CellValue::Text(stripped.to_string())
        } else {
            CellValue::Text(text.to_string())
        };
        CellData::Text {
            text: text.to_string(),
            value,
        }
    }

    /// The cell's text form: stored text verbatim, or `=` + canonical print.
    pub(crate) fn text_form(&self) -> String {
        match self {
            CellData::Text { text, .. } => text.clone(),
            CellData::Formula(f) => format!("={}", f.expression()),
        }
    }

    pub(crate) fn referenced_cells(&self) -> &[Position] {
        match self {
            CellData::Text { .. } => &[],
            CellData::Formula(f) => f.referenced_cells(),
        }
    }

    fn is_cached(&self) -> bool {
        match self {
            CellData::Text { .. } => true,
            CellData::Formula(f) => f.is_cached(),
        }
    }

    fn reset_cache(&mut self) {
        if let CellData::Formula(f) = self {
            f.reset_cache();
        }
    }
}

/// Classify raw cell input into a state and its data.
///
/// Empty input is an empty cell; `=` followed by anything is a formula (a
/// lone `=` is plain text); everything else is text, numeric when it parses
/// as a clean finite double, apostrophe-escaped otherwise.
pub(crate) fn classify(text: &str) -> Result<(CellState, CellData), ParserError> {
    if text.is_empty() {
        Ok((CellState::Empty, CellData::text("")))
    } else if text.len() > 1 && text.starts_with('=') {
        let formula = Formula::parse(&text[1..])?;
        Ok((CellState::Formula, CellData::Formula(formula)))
    } else {
        Ok((CellState::Text, CellData::text(text)))
    }
}

fn clean_double(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => Some(n),
        _ => None,
    }
}

#[derive(Debug)]
pub struct Cell {
    pub(crate) position: Position,
    pub(crate) state: CellState,
    pub(crate) data: CellData,
    /// Positions this cell's formula reads, in reference-list order.
    pub(crate) forward_refs: Vec<Position>,
    /// Positions whose cells read this one.
    pub(crate) reverse_refs: FxHashSet<Position>,
    /// Memo of the last `Set` argument and whether it raised a cycle, for
    /// the repeated-call fast path.
    pub(crate) last_set: Option<(String, bool)>,
}

impl Cell {
    pub(crate) fn new(position: Position) -> Self {
        Self {
            position,
            state: CellState::Empty,
            data: CellData::text(""),
            forward_refs: Vec::new(),
            reverse_refs: FxHashSet::default(),
            last_set: None,
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn state(&self) -> CellState {
        self.state
    }

    /// The text form: `""` for empty cells, the stored literal for text
    /// cells, `=` + canonical expression for formulas.
    pub fn text(&self) -> String {
        self.data.text_form()
    }

    /// Positions this cell's formula reads, ascending, deduplicated.
    pub fn referenced_cells(&self) -> &[Position] {
        &self.forward_refs
    }

    /// Positions whose formulas read this cell.
    pub fn referencing_cells(&self) -> impl Iterator<Item = Position> + '_ {
        self.reverse_refs.iter().copied()
    }

    /// The sticky error imposed by the cell state, if any.
    pub(crate) fn state_error(&self) -> Option<CellValue> {
        match self.state {
            CellState::RefError => Some(CellValue::Error(CellError::Ref)),
            CellState::ValueError => Some(CellValue::Error(CellError::Value)),
            CellState::Div0Error => Some(CellValue::Error(CellError::Div0)),
            _ => None,
        }
    }

    pub(crate) fn is_cached(&self) -> bool {
        self.data.is_cached()
    }

    /// Drop the value memo and the repeated-`Set` memo.
    pub(crate) fn reset_own_cache(&mut self) {
        self.data.reset_cache();
        self.last_set = None;
    }
}
