#![forbid(unsafe_code)]

//! Core: shared primitives for the Discadelta layout solvers.

pub mod geometry;
pub mod logging;

pub use geometry::{FlexDirection, Length};

// Re-export tracing macros at crate root for ergonomic use.
#[cfg(feature = "tracing")]
pub use logging::{debug, error, info, trace, warn};
