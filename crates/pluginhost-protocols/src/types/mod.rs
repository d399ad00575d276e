//! Value types shared across the PluginHost framework.

mod broadcast;
mod component;
mod intent;

pub use broadcast::*;
pub use component::*;
pub use intent::*;

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
