//! # PluginHost Core
//!
//! Emulates the OS component lifecycle for plugins that the OS does not know
//! about. A small pool of statically registered proxies is made to behave
//! like an unbounded set of independently installed components.
//!
//! ## Components
//!
//! - [`TaskStack`] - Ordered component records of one logical task
//! - [`PluginStacks`] / [`GlobalStackRegistry`] - Per-plugin and physical stack views
//! - [`LaunchModeResolver`] - singleTop / singleTask / clearTop emulation
//! - [`ServiceMultiplexer`] - Plugin services behind a fixed proxy pool
//! - [`RecoveryCoordinator`] - Re-issues navigation after a process restart
//! - [`PluginHost`] - Owns all of the above for one process

pub mod broadcast;
pub mod host;
pub mod launch;
pub mod pending;
pub mod record;
pub mod recovery;
pub mod runtime;
pub mod service;
pub mod sink;
pub mod stack;

pub use broadcast::{BroadcastBus, BroadcastReceiver, ReceiverId};
pub use host::{
    HostCollaborators, HostState, PluginDump, PluginHost, ServiceDump, StackDump, StartOutcome,
};
pub use launch::{LaunchDecision, LaunchModeResolver, LaunchOutcome};
pub use pending::{PendingIntentRequest, PendingIntents};
pub use record::ComponentRecord;
pub use recovery::{
    Interception, NavigationState, ReadyPredicate, RecoveryCoordinator, RecoveryTicket, TicketKind,
    TicketStore,
};
pub use runtime::ResolverChain;
pub use service::{
    ProxyPool, ServiceMultiplexer, ServiceRecord, ServiceState, redirect_intent, redirected_target,
};
pub use sink::TracingErrorSink;
pub use stack::{GlobalStackRegistry, PluginDirectory, PluginStacks, StackKind, TaskStack};

#[cfg(test)]
pub(crate) mod testing;
