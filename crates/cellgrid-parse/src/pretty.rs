//! Expression printers.
//!
//! Two renderings of a parse tree:
//!
//! * [`to_bare_string`] — verbatim reconstruction. Every parenthesis node in
//!   the tree prints. This is the stable storage form: rewriting references
//!   after a structural edit re-prints the tree bare, so no grouping
//!   information is lost across repeated shifts.
//! * [`shrink`] — the canonical form with minimal parentheses, re-derived on
//!   demand. A parenthesis survives only where precedence or associativity
//!   requires it.
//!
//! The out-of-range sentinel prints as `A16385` in [`ShrinkMode::Simple`]
//! (and in the bare form) and as `#REF!` in [`ShrinkMode::PrintErrors`],
//! the user-visible rendering.

use cellgrid_common::CellError;

use crate::parser::{ASTNode, ASTNodeType, BinaryOp};

/// Textual form of the out-of-range reference inside stored expressions.
pub const INVALID_REF_TOKEN: &str = "A16385";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShrinkMode {
    /// Sentinel passes through verbatim; reparsable.
    Simple,
    /// Sentinel renders as `#REF!`; for display.
    PrintErrors,
}

/// Where a node sits relative to its parent, for paren decisions.
#[derive(Debug, Clone, Copy)]
enum Site {
    Root,
    UnaryOperand,
    Left(BinaryOp),
    Right(BinaryOp),
}

/// Re-emit the tree exactly, parentheses included.
pub fn to_bare_string(node: &ASTNode) -> String {
    let mut out = String::new();
    write_bare(node, &mut out);
    out
}

fn write_bare(node: &ASTNode, out: &mut String) {
    match &node.node_type {
        ASTNodeType::Literal(text) => out.push_str(text),
        ASTNodeType::Reference(pos) => {
            if pos.is_valid() {
                out.push_str(&pos.to_string());
            } else {
                out.push_str(INVALID_REF_TOKEN);
            }
        }
        ASTNodeType::UnaryOp { op, operand } => {
            out.push(op.symbol());
            write_bare(operand, out);
        }
        ASTNodeType::BinaryOp { op, left, right } => {
            write_bare(left, out);
            out.push(op.symbol());
            write_bare(right, out);
        }
        ASTNodeType::Paren(inner) => {
            out.push('(');
            write_bare(inner, out);
            out.push(')');
        }
    }
}

/// Canonical re-print with minimal parentheses.
pub fn shrink(node: &ASTNode, mode: ShrinkMode) -> String {
    let mut out = String::new();
    write_shrunk(node, mode, Site::Root, &mut out);
    out
}

fn write_shrunk(node: &ASTNode, mode: ShrinkMode, site: Site, out: &mut String) {
    match &node.node_type {
        ASTNodeType::Literal(text) => out.push_str(text),
        ASTNodeType::Reference(pos) => {
            if pos.is_valid() {
                out.push_str(&pos.to_string());
            } else {
                match mode {
                    ShrinkMode::Simple => out.push_str(INVALID_REF_TOKEN),
                    ShrinkMode::PrintErrors => out.push_str(&CellError::Ref.to_string()),
                }
            }
        }
        ASTNodeType::UnaryOp { op, operand } => {
            out.push(op.symbol());
            write_shrunk(operand, mode, Site::UnaryOperand, out);
        }
        ASTNodeType::BinaryOp { op, left, right } => {
            write_shrunk(left, mode, Site::Left(*op), out);
            out.push(op.symbol());
            write_shrunk(right, mode, Site::Right(*op), out);
        }
        ASTNodeType::Paren(_) => {
            // Nested parens collapse to one decision on the innermost child.
            let inner = node.peel_parens();
            if keep_parens(site, inner) {
                out.push('(');
                write_shrunk(inner, mode, Site::Root, out);
                out.push(')');
            } else {
                write_shrunk(inner, mode, site, out);
            }
        }
    }
}

/// A parenthesized binary child keeps its parens only when stripping them
/// would rebind operands:
/// * right operand of `-` when the child is `+` or `-`;
/// * either operand of `*` or `/` when the child is `+` or `-`;
/// * right operand of `/` when the child is `*` or `/`;
/// * operand of a unary `+`/`-` when the child is `+` or `-`.
fn keep_parens(site: Site, inner: &ASTNode) -> bool {
    let ASTNodeType::BinaryOp { op: child, .. } = &inner.node_type else {
        return false;
    };
    match site {
        Site::Root => false,
        Site::UnaryOperand => child.is_additive(),
        Site::Left(parent) => matches!(parent, BinaryOp::Mul | BinaryOp::Div) && child.is_additive(),
        Site::Right(parent) => match parent {
            BinaryOp::Add => false,
            BinaryOp::Sub => child.is_additive(),
            BinaryOp::Mul => child.is_additive(),
            BinaryOp::Div => true,
        },
    }
}
