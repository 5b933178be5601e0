//! Event dispatcher with deferred re-delivery.

use tracing::{debug, info};

use crate::event::{EventReport, HookContext, OperatorEvent};
use crate::operator::Operator;
use crate::state::OperatorState;

/// Delivers events to an [`Operator`], replaying deferred ones first.
///
/// A deferred event carries no partial state; it is handled from scratch
/// on every re-delivery until it is no longer deferred. An event equal to one
/// already queued is not queued twice.
pub struct Dispatcher {
    operator: Operator,
}

impl Dispatcher {
    pub const fn new(operator: Operator) -> Self {
        Self { operator }
    }

    pub fn state(&self) -> &OperatorState {
        self.operator.state()
    }

    pub fn into_state(self) -> OperatorState {
        self.operator.into_state()
    }

    /// Re-deliver deferred events, then deliver `event`.
    ///
    /// Returns one report per delivery, in delivery order.
    pub async fn dispatch(&mut self, event: OperatorEvent, hook: &HookContext) -> Vec<EventReport> {
        let mut reports = self.redeliver(hook).await;
        reports.push(self.deliver(event, hook).await);
        reports
    }

    /// Re-deliver deferred events only.
    pub async fn redeliver(&mut self, hook: &HookContext) -> Vec<EventReport> {
        let queued = std::mem::take(&mut self.operator.state_mut().deferred);
        if !queued.is_empty() {
            info!(count = queued.len(), "Re-delivering deferred events");
        }

        let mut reports = Vec::with_capacity(queued.len());
        for event in queued {
            reports.push(self.deliver(event, hook).await);
        }
        reports
    }

    async fn deliver(&mut self, event: OperatorEvent, hook: &HookContext) -> EventReport {
        let report = self.operator.handle(&event, hook).await;
        if report.deferred {
            let queue = &mut self.operator.state_mut().deferred;
            if queue.contains(&event) {
                debug!(event = event.name(), "Already queued for re-delivery");
            } else {
                debug!(event = event.name(), "Queued for re-delivery");
                queue.push(event);
            }
        }
        report
    }
}
