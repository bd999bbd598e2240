//! Reference adjustment for structural changes.
//!
//! When rows or columns are inserted or deleted, every stored formula is
//! rewritten: references on the far side of the pivot slide by `count`,
//! references inside a deleted band degrade to the out-of-range sentinel.
//! The rewrite rebuilds the tree as-is (parentheses included) — canonical
//! re-printing is deferred to the next text read.

use std::fmt::{self, Display};

use cellgrid_common::Position;
use cellgrid_parse::{ASTNode, ASTNodeType};

/// Which coordinate a structural edit moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftAxis {
    Rows,
    Cols,
}

impl Display for ShiftAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShiftAxis::Rows => "rows",
            ShiftAxis::Cols => "cols",
        })
    }
}

/// A structural edit, as seen by a formula.
#[derive(Debug, Clone, Copy)]
pub enum ShiftOp {
    Insert {
        axis: ShiftAxis,
        before: i32,
        count: i32,
    },
    Delete {
        axis: ShiftAxis,
        first: i32,
        count: i32,
    },
}

impl ShiftOp {
    pub fn axis(self) -> ShiftAxis {
        match self {
            ShiftOp::Insert { axis, .. } | ShiftOp::Delete { axis, .. } => axis,
        }
    }
}

/// How much a rewrite changed, ordered: a rename survives evaluation, a
/// change means at least one reference was lost. The max over all references
/// is the result for the whole formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ShiftOutcome {
    Unchanged,
    RefsRenamed,
    RefsChanged,
}

/// Centralized reference-adjustment logic for structural changes.
pub struct ReferenceAdjuster {
    op: ShiftOp,
}

impl ReferenceAdjuster {
    pub fn new(op: ShiftOp) -> Self {
        Self { op }
    }

    /// Rewrite a tree for the shift operation, reporting the strongest
    /// outcome observed across its references.
    pub fn adjust(&self, ast: &ASTNode) -> (ASTNode, ShiftOutcome) {
        let mut outcome = ShiftOutcome::Unchanged;
        let node = self.adjust_node(ast, &mut outcome);
        (node, outcome)
    }

    fn adjust_node(&self, ast: &ASTNode, outcome: &mut ShiftOutcome) -> ASTNode {
        let node_type = match &ast.node_type {
            ASTNodeType::Literal(text) => ASTNodeType::Literal(text.clone()),
            ASTNodeType::Reference(pos) => {
                ASTNodeType::Reference(self.adjust_position(*pos, outcome))
            }
            ASTNodeType::UnaryOp { op, operand } => ASTNodeType::UnaryOp {
                op: *op,
                operand: Box::new(self.adjust_node(operand, outcome)),
            },
            ASTNodeType::BinaryOp { op, left, right } => ASTNodeType::BinaryOp {
                op: *op,
                left: Box::new(self.adjust_node(left, outcome)),
                right: Box::new(self.adjust_node(right, outcome)),
            },
            ASTNodeType::Paren(inner) => {
                ASTNodeType::Paren(Box::new(self.adjust_node(inner, outcome)))
            }
        };
        ASTNode::new(node_type)
    }

    fn adjust_position(&self, pos: Position, outcome: &mut ShiftOutcome) -> Position {
        // An already-invalid reference stays the sentinel, silently.
        if !pos.is_valid() {
            return Position::INVALID;
        }
        let (k, limit) = match self.op.axis() {
            ShiftAxis::Rows => (pos.row, Position::MAX_ROWS),
            ShiftAxis::Cols => (pos.col, Position::MAX_COLS),
        };
        let shifted = match self.op {
            ShiftOp::Insert { before, count, .. } => {
                if k < before {
                    return pos;
                }
                // The sheet validates capacity before shifting, so in
                // practice this stays in range; a standalone rewrite that
                // overflows loses the reference.
                if k + count >= limit {
                    escalate(outcome, ShiftOutcome::RefsChanged);
                    return Position::INVALID;
                }
                k + count
            }
            ShiftOp::Delete { first, count, .. } => {
                if k >= first && k < first + count {
                    escalate(outcome, ShiftOutcome::RefsChanged);
                    return Position::INVALID;
                }
                if k < first {
                    return pos;
                }
                k - count
            }
        };
        escalate(outcome, ShiftOutcome::RefsRenamed);
        match self.op.axis() {
            ShiftAxis::Rows => Position::new(shifted, pos.col),
            ShiftAxis::Cols => Position::new(pos.row, shifted),
        }
    }
}

fn escalate(outcome: &mut ShiftOutcome, at_least: ShiftOutcome) {
    if *outcome < at_least {
        *outcome = at_least;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellgrid_parse::{ShrinkMode, parse, shrink};

    fn apply(expr: &str, op: ShiftOp) -> (String, ShiftOutcome) {
        let (node, outcome) = ReferenceAdjuster::new(op).adjust(&parse(expr).unwrap());
        (shrink(&node, ShrinkMode::Simple), outcome)
    }

    #[test]
    fn insert_shifts_at_and_after_the_pivot() {
        let op = ShiftOp::Insert {
            axis: ShiftAxis::Rows,
            before: 1,
            count: 2,
        };
        assert_eq!(apply("A1+B2", op), ("A1+B4".into(), ShiftOutcome::RefsRenamed));
        let op = ShiftOp::Insert {
            axis: ShiftAxis::Cols,
            before: 0,
            count: 3,
        };
        assert_eq!(apply("A1+B2", op), ("D1+E2".into(), ShiftOutcome::RefsRenamed));
    }

    #[test]
    fn insert_before_nothing_is_unchanged() {
        let op = ShiftOp::Insert {
            axis: ShiftAxis::Rows,
            before: 5,
            count: 2,
        };
        assert_eq!(apply("A1+B2", op), ("A1+B2".into(), ShiftOutcome::Unchanged));
    }

    #[test]
    fn delete_band_loses_references() {
        let op = ShiftOp::Delete {
            axis: ShiftAxis::Rows,
            first: 0,
            count: 1,
        };
        assert_eq!(
            apply("A1+C3", op),
            ("A16385+C2".into(), ShiftOutcome::RefsChanged)
        );
    }

    #[test]
    fn delete_after_references_is_unchanged() {
        let op = ShiftOp::Delete {
            axis: ShiftAxis::Cols,
            first: 3,
            count: 1,
        };
        assert_eq!(apply("B2", op), ("B2".into(), ShiftOutcome::Unchanged));
    }

    #[test]
    fn sentinel_stays_sentinel() {
        let op = ShiftOp::Delete {
            axis: ShiftAxis::Rows,
            first: 0,
            count: 1,
        };
        assert_eq!(
            apply("A16385+1", op),
            ("A16385+1".into(), ShiftOutcome::Unchanged)
        );
    }

    #[test]
    fn parens_are_copied_through() {
        let op = ShiftOp::Insert {
            axis: ShiftAxis::Rows,
            before: 0,
            count: 1,
        };
        let (node, _) = ReferenceAdjuster::new(op).adjust(&parse("(A1+B1)/2").unwrap());
        assert_eq!(
            cellgrid_parse::to_bare_string(&node),
            "(A2+B2)/2"
        );
    }
}
