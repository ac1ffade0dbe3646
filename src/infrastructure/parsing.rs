//! Product field extraction
//!
//! A site's [`ExtractionPlan`] lists, per field, candidate lookups tried in
//! order. [`lookup`] answers a single candidate with an `Option`; the
//! [`ProductRecordBuilder`] folds candidates into a typed record.

pub mod error;
pub mod lookup;
pub mod plan;
pub mod product_builder;

pub use error::{ExtractionError, ExtractionResult, PlanError};
pub use lookup::{LookupContext, PatternSet, apply_transforms, lookup};
pub use plan::{
    ExtractionPlan, FieldRule, FieldSource, Lookup, LookupScope, PathRewrite, Pick, SubscopeRule,
    SwatchRule, Transform, ValueSource,
};
pub use product_builder::{ProductRecordBuilder, apply_price_pair, coerce};
