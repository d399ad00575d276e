//! Launch-mode emulation over a single physical proxy activity class.

mod decision;
mod resolver;

pub use decision::{LaunchDecision, LaunchOutcome};
pub use resolver::LaunchModeResolver;

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
