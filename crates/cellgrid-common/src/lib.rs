pub mod error;
pub mod position;
pub mod value;

pub use error::CellError;
pub use position::{A1Decode, Position, Size, decode_a1};
pub use value::CellValue;
