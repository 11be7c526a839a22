//! Typed wrappers around each bridge operation.

pub mod actions;
pub mod capture;
pub mod pipeline;
pub mod resources;
pub mod search;
