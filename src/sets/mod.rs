//! Bit-packed membership sets over a shared, growing population.
//!
//! # Submodules
//!
//! - [`packed`]: the packed-word membership set with growth, aggregates and algebra
//! - [`superset`]: the owner of the ordered population, the active-members mask and
//!   the registry of named sets

mod encoding;
mod naming;
pub mod packed;
pub mod superset;

pub use packed::PackedSet;
pub use superset::{ACTIVE_MEMBERS_SET_NAME, SuperSet};
