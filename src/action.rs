use crate::component::Action;
use perch_core::{ContextUpdater, GlobalContext, NodeId, SetContext};

/// What actions get to see of the screen they run in.
#[derive(Debug, Clone)]
pub struct RootContext {
    updater: ContextUpdater,
    global: GlobalContext,
}

impl RootContext {
    pub(crate) fn new(updater: ContextUpdater, global: GlobalContext) -> RootContext {
        RootContext { updater, global }
    }

    /// Queues a context update on behalf of `origin`.
    ///
    /// The screen applies it once the running actions return.
    pub fn set_context(&self, origin: NodeId, update: SetContext) {
        self.updater.set(origin, update);
    }

    pub fn global(&self) -> &GlobalContext {
        &self.global
    }
}

/// Executes server-described actions.
pub trait ActionHandler {
    /// Runs a list of actions triggered by `origin`.
    fn execute(&mut self, root: &RootContext, origin: NodeId, actions: &[Action]);
}
