//! Formula evaluation.
//!
//! Depth-first post-order walk over the parse tree with a value stack of
//! doubles and a sticky first-error latch: once an error is latched the rest
//! of the walk is skipped and the latch is the result. If the walk finishes
//! clean but the top of the stack is not finite, the result is `#DIV/0!`
//! (this covers `1/0`, `0/0`, and overflow).

use cellgrid_common::{CellError, CellValue, Position};
use cellgrid_parse::{ASTNode, ASTNodeType, BinaryOp, UnaryOp};

/// Source of neighbor-cell values during evaluation.
///
/// `None` means the cell was never materialized; it reads as zero. Resolving
/// may recursively evaluate the neighbor, hence `&mut self`.
pub trait ValueResolver {
    fn cell_value(&mut self, pos: Position) -> Option<CellValue>;
}

/// Evaluate a parsed expression against a value source.
pub fn evaluate(node: &ASTNode, cells: &mut dyn ValueResolver) -> CellValue {
    let mut stack: Vec<f64> = Vec::new();
    let mut latch: Option<CellError> = None;
    walk(node, cells, &mut stack, &mut latch);
    if let Some(err) = latch {
        return CellValue::Error(err);
    }
    let Some(top) = stack.pop() else {
        // Unreachable for any tree the parser produces.
        return CellValue::Error(CellError::Value);
    };
    if top.is_finite() {
        CellValue::Number(top)
    } else {
        CellValue::Error(CellError::Div0)
    }
}

fn walk(
    node: &ASTNode,
    cells: &mut dyn ValueResolver,
    stack: &mut Vec<f64>,
    latch: &mut Option<CellError>,
) {
    if latch.is_some() {
        return;
    }
    match &node.node_type {
        ASTNodeType::Literal(text) => match text.parse::<f64>() {
            Ok(n) if n.is_finite() => stack.push(n),
            _ => *latch = Some(CellError::Value),
        },
        ASTNodeType::Reference(pos) => {
            if !pos.is_valid() {
                *latch = Some(CellError::Ref);
                return;
            }
            match cells.cell_value(*pos) {
                None => stack.push(0.0),
                Some(CellValue::Number(n)) => stack.push(n),
                Some(CellValue::Text(s)) => match text_operand(&s) {
                    Ok(n) => stack.push(n),
                    Err(err) => *latch = Some(err),
                },
                Some(CellValue::Error(err)) => *latch = Some(err),
            }
        }
        ASTNodeType::UnaryOp { op, operand } => {
            walk(operand, cells, stack, latch);
            if latch.is_some() {
                return;
            }
            if *op == UnaryOp::Minus
                && let Some(top) = stack.last_mut()
            {
                *top = -*top;
            }
        }
        ASTNodeType::BinaryOp { op, left, right } => {
            walk(left, cells, stack, latch);
            walk(right, cells, stack, latch);
            if latch.is_some() {
                return;
            }
            let (Some(rhs), Some(lhs)) = (stack.pop(), stack.pop()) else {
                *latch = Some(CellError::Value);
                return;
            };
            stack.push(match op {
                BinaryOp::Add => lhs + rhs,
                BinaryOp::Sub => lhs - rhs,
                BinaryOp::Mul => lhs * rhs,
                BinaryOp::Div => lhs / rhs,
            });
        }
        ASTNodeType::Paren(inner) => walk(inner, cells, stack, latch),
    }
}

/// A text operand must be a strict integer: leading ASCII whitespace is
/// skipped, but anything left after the digits — trailing whitespace
/// included — fails the parse. Only the exact empty string reads as zero.
fn text_operand(s: &str) -> Result<f64, CellError> {
    if s.is_empty() {
        return Ok(0.0);
    }
    s.trim_start()
        .parse::<i64>()
        .map(|n| n as f64)
        .map_err(|_| CellError::Value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellgrid_parse::parse;

    /// Resolver over a fixed list of (position, value) pairs.
    struct Fixed(Vec<(Position, CellValue)>);

    impl ValueResolver for Fixed {
        fn cell_value(&mut self, pos: Position) -> Option<CellValue> {
            self.0.iter().find(|(p, _)| *p == pos).map(|(_, v)| v.clone())
        }
    }

    fn eval(expr: &str) -> CellValue {
        evaluate(&parse(expr).unwrap(), &mut Fixed(Vec::new()))
    }

    #[test]
    fn arithmetic() {
        assert_eq!(eval("1"), CellValue::Number(1.0));
        assert_eq!(eval("42"), CellValue::Number(42.0));
        assert_eq!(eval("2 + 2"), CellValue::Number(4.0));
        assert_eq!(eval("2 + 2*2"), CellValue::Number(6.0));
        assert_eq!(eval("4/2 + 6/3"), CellValue::Number(4.0));
        assert_eq!(eval("(2+3)*4 + (3-4)*5"), CellValue::Number(15.0));
        assert_eq!(
            eval("(12+13) * (14+(13-24/(1+1))*55-46)"),
            CellValue::Number(575.0)
        );
        assert_eq!(eval("-3"), CellValue::Number(-3.0));
        assert_eq!(eval("+3"), CellValue::Number(3.0));
        assert_eq!(eval("--3"), CellValue::Number(3.0));
    }

    #[test]
    fn non_finite_results_are_div0() {
        assert_eq!(eval("1/0"), CellValue::Error(CellError::Div0));
        assert_eq!(eval("0/0"), CellValue::Error(CellError::Div0));
        assert_eq!(eval("1e+200/1e-200"), CellValue::Error(CellError::Div0));
        assert_eq!(eval("1e308+1e308"), CellValue::Error(CellError::Div0));
    }

    #[test]
    fn overflowing_literal_is_value_error() {
        assert_eq!(eval("1e999"), CellValue::Error(CellError::Value));
    }

    #[test]
    fn sentinel_reference_is_ref_error() {
        assert_eq!(eval("A16385"), CellValue::Error(CellError::Ref));
        assert_eq!(eval("1+A16385"), CellValue::Error(CellError::Ref));
    }

    #[test]
    fn cell_operands() {
        let a1 = Position::from_a1("A1");
        let a2 = Position::from_a1("A2");
        let mut cells = Fixed(vec![
            (a1, CellValue::Number(1.0)),
            (a2, CellValue::Text("15".into())),
        ]);
        let eval_with = |cells: &mut Fixed, expr: &str| evaluate(&parse(expr).unwrap(), cells);

        assert_eq!(eval_with(&mut cells, "A1"), CellValue::Number(1.0));
        assert_eq!(eval_with(&mut cells, "A1+A2"), CellValue::Number(16.0));
        // Absent cells read as zero.
        assert_eq!(eval_with(&mut cells, "A1+B7"), CellValue::Number(1.0));
        // Empty text reads as zero.
        cells.0.push((Position::from_a1("B1"), CellValue::Text(String::new())));
        assert_eq!(eval_with(&mut cells, "A1+B1"), CellValue::Number(1.0));
    }

    #[test]
    fn non_numeric_text_is_value_error() {
        let b2 = Position::from_a1("B2");
        for text in ["hello", "12hello", "3D", "15.5", "A1"] {
            let mut cells = Fixed(vec![(b2, CellValue::Text(text.into()))]);
            assert_eq!(
                evaluate(&parse("B2").unwrap(), &mut cells),
                CellValue::Error(CellError::Value),
                "{text}"
            );
        }
    }

    #[test]
    fn text_operand_whitespace_is_leading_only() {
        let b2 = Position::from_a1("B2");
        let eval_text = |text: &str| {
            let mut cells = Fixed(vec![(b2, CellValue::Text(text.into()))]);
            evaluate(&parse("B2").unwrap(), &mut cells)
        };
        // Leading whitespace is skipped, like `in >> num` would.
        assert_eq!(eval_text(" 5"), CellValue::Number(5.0));
        assert_eq!(eval_text("  +7"), CellValue::Number(7.0));
        // Anything unconsumed after the digits fails, whitespace included.
        assert_eq!(eval_text("5 "), CellValue::Error(CellError::Value));
        assert_eq!(eval_text(" 5 "), CellValue::Error(CellError::Value));
        assert_eq!(eval_text("5 2"), CellValue::Error(CellError::Value));
        // Only the exact empty string reads as zero.
        assert_eq!(eval_text(""), CellValue::Number(0.0));
        assert_eq!(eval_text(" "), CellValue::Error(CellError::Value));
        assert_eq!(eval_text("\t"), CellValue::Error(CellError::Value));
    }

    #[test]
    fn first_error_wins() {
        let a1 = Position::from_a1("A1");
        let b1 = Position::from_a1("B1");
        let mut cells = Fixed(vec![
            (a1, CellValue::Error(CellError::Ref)),
            (b1, CellValue::Error(CellError::Div0)),
        ]);
        assert_eq!(
            evaluate(&parse("A1+B1").unwrap(), &mut cells),
            CellValue::Error(CellError::Ref)
        );
        assert_eq!(
            evaluate(&parse("B1+A1").unwrap(), &mut cells),
            CellValue::Error(CellError::Div0)
        );
    }
}
