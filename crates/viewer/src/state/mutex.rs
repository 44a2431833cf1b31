//! Mutual exclusion between modal tools.

use super::tool::ToolId;

/// Groups of tools of which at most one may be active
#[derive(Debug, Clone, Default)]
pub struct MutexCoordinator {
    groups: Vec<Vec<ToolId>>,
}

impl MutexCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an ordered group
    pub fn add_group(&mut self, members: impl IntoIterator<Item = ToolId>) {
        let group: Vec<ToolId> = members.into_iter().collect();
        if group.len() > 1 {
            self.groups.push(group);
        }
    }

    pub fn is_registered(&self, id: ToolId) -> bool {
        self.groups.iter().any(|g| g.contains(&id))
    }

    /// Tools that must be deactivated when `activated` turns on, in group order.
    /// Empty for tools outside every group.
    pub fn siblings_of(&self, activated: ToolId) -> Vec<ToolId> {
        let mut out = Vec::new();
        for group in self.groups.iter().filter(|g| g.contains(&activated)) {
            for &member in group {
                if member != activated && !out.contains(&member) {
                    out.push(member);
                }
            }
        }
        out
    }

    pub fn groups(&self) -> &[Vec<ToolId>] {
        &self.groups
    }
}
