//! Domain layer
//!
//! Pure data and rules: no DOM access, no file or network I/O.

pub mod category;
pub mod dedup;
pub mod delay;
pub mod pagination;
pub mod product;
