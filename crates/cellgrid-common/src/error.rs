//! Value-level error codes.
//!
//! These are the errors a cell's *value* can be — data, not `Err`. They are
//! computed during evaluation, cached like any other value, and printed with
//! their spreadsheet-style tags.

use std::{error::Error, fmt};

/// The error codes a cell value can carry.
///
/// Names are CamelCase (idiomatic Rust) while `Display` renders the
/// spreadsheet form (`#REF!`, `#VALUE!`, `#DIV/0!`).
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CellError {
    /// A reference to a deleted or out-of-range cell.
    Ref,
    /// Arithmetic over a non-numeric operand.
    Value,
    /// Division by zero, or any arithmetic result that is not finite.
    Div0,
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ref => "#REF!",
            Self::Value => "#VALUE!",
            Self::Div0 => "#DIV/0!",
        })
    }
}

impl Error for CellError {}

impl PartialEq<str> for CellError {
    fn eq(&self, other: &str) -> bool {
        self.to_string() == other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags() {
        assert_eq!(CellError::Ref.to_string(), "#REF!");
        assert_eq!(CellError::Value.to_string(), "#VALUE!");
        assert_eq!(CellError::Div0.to_string(), "#DIV/0!");
    }
}
