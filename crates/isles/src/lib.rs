//! Umbrella crate for Isles.
//!
//! Re-exports the engine and protocol crates so front ends can depend on a
//! single crate name (`isles`).

pub use isles_engine as engine;
pub use isles_protocol as protocol;
