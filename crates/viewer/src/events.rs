//! Typed publish/subscribe for viewer notifications.

use serde::Serialize;
use shared::{ModelId, ProjectId};

use crate::engine::NavMode;
use crate::state::tabs::ViewId;
use crate::state::tool::ToolId;

/// Handle returned by [`Emitter::on`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener<E> = Box<dyn FnMut(&E)>;

/// Listener list for one event type
pub struct Emitter<E> {
    listeners: Vec<(SubscriptionId, Listener<E>)>,
    next_id: u64,
}

impl<E> Default for Emitter<E> {
    fn default() -> Self {
        Self {
            listeners: Vec::new(),
            next_id: 0,
        }
    }
}

impl<E> Emitter<E> {
    pub fn on(&mut self, listener: impl FnMut(&E) + 'static) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Returns false if it was not subscribed.
    pub fn off(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    /// Deliver to every listener in subscription order
    pub fn fire(&mut self, event: &E) {
        for (_, listener) in &mut self.listeners {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

/// Notifications published by the viewer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ViewerEvent {
    ProjectLoaded { project_id: ProjectId },
    ProjectUnloaded { project_id: ProjectId },
    ModelLoaded { model_id: ModelId },
    ModelUnloaded { model_id: ModelId },
    ToolToggled { tool: ToolId, active: bool },
    NavModeChanged { mode: NavMode },
    ThreeDModeChanged { active: bool },
    TabOpened { tab: ViewId },
    ViewpointLoaded,
    Reset,
}
