//! Result of resolving a launch request.

use std::sync::Arc;

use uuid::Uuid;

use crate::record::ComponentRecord;

/// How the OS-level launch should be interpreted.
#[derive(Debug, Clone)]
pub enum LaunchOutcome {
    /// A new instance will be created.
    NewInstance,
    /// The existing instance receives the intent as a new-intent delivery.
    DeliverToExisting(Arc<ComponentRecord>),
    /// A not-yet-created pending request for the same class will act as the
    /// existing instance.
    MatchedPending(Uuid),
    /// Launch mode is not emulated; the request goes through unchanged.
    PassThrough,
}

impl LaunchOutcome {
    pub fn name(&self) -> &'static str {
        match self {
            LaunchOutcome::NewInstance => "new_instance",
            LaunchOutcome::DeliverToExisting(_) => "deliver_to_existing",
            LaunchOutcome::MatchedPending(_) => "matched_pending",
            LaunchOutcome::PassThrough => "pass_through",
        }
    }
}

/// Everything the resolver decided and did for one launch.
#[derive(Debug, Clone)]
pub struct LaunchDecision {
    pub outcome: LaunchOutcome,
    /// Records finished (and popped) while resolving, in finish order.
    pub finished: Vec<Arc<ComponentRecord>>,
    /// The background stack was merged into the foreground one.
    pub merged_background: bool,
    /// Task the plugin switched its focus to.
    pub switched_task: Option<String>,
}

impl LaunchDecision {
    pub fn new(outcome: LaunchOutcome) -> Self {
        Self {
            outcome,
            finished: Vec::new(),
            merged_background: false,
            switched_task: None,
        }
    }

    pub fn creates_instance(&self) -> bool {
        matches!(
            self.outcome,
            LaunchOutcome::NewInstance | LaunchOutcome::PassThrough
        )
    }

    /// The existing record the intent is redelivered to, if any.
    pub fn reused(&self) -> Option<&Arc<ComponentRecord>> {
        match &self.outcome {
            LaunchOutcome::DeliverToExisting(record) => Some(record),
            _ => None,
        }
    }
}
