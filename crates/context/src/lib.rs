//! Declarative map context: the caller-owned description of what the map
//! should show, and the differ that compares two snapshots of it.

pub mod diff;
pub mod error;
pub mod model;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

pub use diff::*;
pub use error::*;
pub use model::*;
