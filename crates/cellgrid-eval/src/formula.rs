//! The per-cell formula bundle.
//!
//! A `Formula` owns the stored (unshrunk) expression text, its parse tree,
//! the sorted list of referenced positions, and two memos: the computed
//! value and the canonical display text. Structural edits rewrite the tree
//! and re-print it bare; the canonical form is re-derived lazily so repeated
//! shifts never lose grouping information.

use std::rc::Rc;

use once_cell::unsync::OnceCell;

use cellgrid_common::{CellValue, Position};
use cellgrid_parse::{ASTNode, ParserError, ShrinkMode, parse, shrink, to_bare_string};

use crate::adjuster::{ReferenceAdjuster, ShiftAxis, ShiftOp, ShiftOutcome};
use crate::evaluator::{ValueResolver, evaluate};

#[derive(Debug, Clone)]
pub struct Formula {
    /// Stored expression text, bare form; updated in place by shifts.
    expr: String,
    ast: Rc<ASTNode>,
    referenced_cells: Vec<Position>,
    cached_value: Option<CellValue>,
    /// Canonical display form (`ShrinkMode::PrintErrors`), derived on demand.
    shrunk: OnceCell<String>,
}

impl Formula {
    /// Parse an expression (without the leading `=`).
    pub fn parse(expr: &str) -> Result<Self, ParserError> {
        let ast = parse(expr)?;
        let referenced_cells = ast.collect_references();
        Ok(Self {
            expr: expr.to_string(),
            ast: Rc::new(ast),
            referenced_cells,
            cached_value: None,
            shrunk: OnceCell::new(),
        })
    }

    /// The stored expression text (bare reconstruction after a shift).
    pub fn expr(&self) -> &str {
        &self.expr
    }

    /// The canonical form, invalid references printed as `#REF!`.
    pub fn expression(&self) -> &str {
        self.shrunk
            .get_or_init(|| shrink(&self.ast, ShrinkMode::PrintErrors))
    }

    /// Referenced positions, ascending, deduplicated, sentinels excluded.
    pub fn referenced_cells(&self) -> &[Position] {
        &self.referenced_cells
    }

    /// Evaluate against a value source. Does not touch the value cache; the
    /// owning cell decides what to memoize.
    pub fn evaluate(&self, cells: &mut dyn ValueResolver) -> CellValue {
        evaluate(&self.ast, cells)
    }

    pub fn handle_inserted_rows(&mut self, before: i32, count: i32) -> ShiftOutcome {
        self.apply(ShiftOp::Insert {
            axis: ShiftAxis::Rows,
            before,
            count,
        })
    }

    pub fn handle_inserted_cols(&mut self, before: i32, count: i32) -> ShiftOutcome {
        self.apply(ShiftOp::Insert {
            axis: ShiftAxis::Cols,
            before,
            count,
        })
    }

    pub fn handle_deleted_rows(&mut self, first: i32, count: i32) -> ShiftOutcome {
        self.apply(ShiftOp::Delete {
            axis: ShiftAxis::Rows,
            first,
            count,
        })
    }

    pub fn handle_deleted_cols(&mut self, first: i32, count: i32) -> ShiftOutcome {
        self.apply(ShiftOp::Delete {
            axis: ShiftAxis::Cols,
            first,
            count,
        })
    }

    pub(crate) fn apply(&mut self, op: ShiftOp) -> ShiftOutcome {
        let op = clamp(op);
        let (ast, outcome) = ReferenceAdjuster::new(op).adjust(&self.ast);
        self.expr = to_bare_string(&ast);
        self.referenced_cells = ast.collect_references();
        self.ast = Rc::new(ast);
        self.cached_value = None;
        if outcome != ShiftOutcome::Unchanged {
            self.shrunk = OnceCell::new();
        }
        outcome
    }

    pub(crate) fn ast(&self) -> Rc<ASTNode> {
        Rc::clone(&self.ast)
    }

    pub(crate) fn cached_value(&self) -> Option<&CellValue> {
        self.cached_value.as_ref()
    }

    pub(crate) fn set_cached_value(&mut self, value: CellValue) {
        self.cached_value = Some(value);
    }

    pub(crate) fn is_cached(&self) -> bool {
        self.cached_value.is_some()
    }

    pub(crate) fn reset_cache(&mut self) {
        self.cached_value = None;
    }
}

fn clamp(op: ShiftOp) -> ShiftOp {
    let limit = match op.axis() {
        ShiftAxis::Rows => Position::MAX_ROWS,
        ShiftAxis::Cols => Position::MAX_COLS,
    };
    match op {
        ShiftOp::Insert { axis, before, count } => ShiftOp::Insert {
            axis,
            before: before.clamp(0, limit),
            count: count.clamp(0, limit),
        },
        ShiftOp::Delete { axis, first, count } => ShiftOp::Delete {
            axis,
            first: first.clamp(0, limit),
            count: count.clamp(0, limit),
        },
    }
}
