//! Re-issuing navigation after the hosting process was recreated.

mod coordinator;
mod receivers;
mod ticket;

pub use coordinator::{Interception, NavigationState, ReadyPredicate, RecoveryCoordinator};
pub use ticket::{RecoveryTicket, TicketKind, TicketStore};

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
