//! Schema reconciliation: introspect, diff, apply.

pub mod apply;
pub mod diff;
pub mod introspect;
pub mod reconcile;

pub use apply::{Applier, ErrorSink};
pub use diff::{ColumnChange, EntityPlan, IndexChange};
pub use introspect::{LiveColumn, LiveIndex};
pub use reconcile::{is_current, plan, reconcile};
