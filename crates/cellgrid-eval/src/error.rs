//! The public API error of the engine.
//!
//! These are the synchronous failures of sheet operations. They always leave
//! the sheet unchanged relative to the call. Value-level errors (`#REF!`,
//! `#VALUE!`, `#DIV/0!`) are not here — those are data, carried by
//! [`cellgrid_common::CellValue`].

use thiserror::Error;

use cellgrid_common::Position;
use cellgrid_parse::ParserError;

use crate::adjuster::ShiftAxis;

#[derive(Debug, Error)]
pub enum SheetError {
    /// A public call received a position outside the 16384×16384 grid.
    #[error("invalid position ({}, {})", .0.row, .0.col)]
    InvalidPosition(Position),

    /// An insert would push the occupied region past the grid bound.
    #[error("{0} capacity exceeded")]
    TableTooBig(ShiftAxis),

    /// The assignment would make the cell reach itself through the
    /// dependency graph.
    #[error("circular dependency through {0}")]
    CircularDependency(Position),

    /// The formula text was rejected by the grammar.
    #[error("{0}")]
    Formula(#[from] ParserError),
}
