//! Structural mapping between untyped sources and declared records.
//!
//! - `schema` - field descriptors and the [`Record`] trait
//! - `value` - source values and type-directed assignment
//! - `plan` - [`BindingPlan`] and the shared [`PlanCache`]
//! - `validate` - declarative rule checks run after binding

mod plan;
mod schema;
mod validate;
mod value;

pub use plan::{BindingPlan, PlanCache};
pub use schema::{Field, FieldKind, Record, Rules, Slot, Source, Tags, View, no_such_slot};
pub use validate::validate;
pub use value::{SourceValue, UploadedFile, assign};

/// Errors raised while populating or validating a record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindError {
    #[error("unknown field `{0}`")]
    UnknownField(String),

    #[error("{field} is invalid")]
    Invalid { field: &'static str },

    #[error("{0}")]
    Validation(String),

    #[error("expected a JSON object")]
    NotAnObject,
}
