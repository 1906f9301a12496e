mod column;
mod kind;
pub mod markers;
pub(crate) mod sized;
mod value;

pub use column::{Column, Columns};
pub use kind::{DecimalDetails, IntegerKind, Kind, KindDetails};
pub use sized::SizeHint;
pub use value::Value;
