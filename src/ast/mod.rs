//! Filter and record AST consumed by the transpiler.

pub mod filter;
pub mod operators;
pub mod record;
pub mod values;

pub use filter::{Clause, Condition, Filter, Where};
pub use operators::{Operator, Pattern};
pub use record::Record;
pub use values::Value;
