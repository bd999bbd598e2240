//! Meta crate that re-exports the cellgrid building blocks with sensible
//! defaults. Depend on this crate and opt into specific layers via feature
//! flags, keeping access to the underlying crates when deeper integration is
//! required.

#[cfg(feature = "common")]
pub use cellgrid_common as common;

#[cfg(feature = "parse")]
pub use cellgrid_parse as parse;

#[cfg(feature = "eval")]
pub use cellgrid_eval as eval;

#[cfg(feature = "common")]
pub use cellgrid_common::{CellError, CellValue, Position, Size};

#[cfg(feature = "parse")]
pub use cellgrid_parse::{ASTNode, ParserError, ShrinkMode};

#[cfg(feature = "eval")]
pub use cellgrid_eval::{Cell, CellState, Formula, Sheet, SheetError, ShiftOutcome};
