//! TTL & Invalidation Controller.

mod controller;
mod preset;

pub use controller::{TtlController, WarmSpec};
pub use preset::TtlPreset;

#[cfg(test)]
mod tests;
