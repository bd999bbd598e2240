pub mod parser;
pub mod pretty;
pub mod tokenizer;

pub use parser::{ASTNode, ASTNodeType, BinaryOp, Parser, ParserError, UnaryOp, parse};
pub use pretty::{INVALID_REF_TOKEN, ShrinkMode, shrink, to_bare_string};
pub use tokenizer::{Token, TokenKind, Tokenizer, TokenizerError};

// Re-export common types
pub use cellgrid_common::{A1Decode, CellError, CellValue, Position, Size};
