//! Plugin services multiplexed over a fixed pool of proxy services.

mod multiplexer;
mod proxy_pool;
mod record;

pub use multiplexer::ServiceMultiplexer;
pub use proxy_pool::{ProxyPool, redirect_intent, redirected_target};
pub use record::{ServiceRecord, ServiceState};

#[cfg(test)]
#[path = "multiplexer_tests.rs"]
mod tests;
