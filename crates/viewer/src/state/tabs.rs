//! Explorer and inspector tab state.

use serde::{Deserialize, Serialize};

use crate::error::ViewerError;

/// Reported by [`ExplorerTabs::get_open_tab`] when no tab is open
pub const NO_TAB: &str = "none";

/// Panel views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewId {
    Models,
    Objects,
    Classes,
    Storeys,
    Properties,
}

impl ViewId {
    /// Query order of [`ExplorerTabs::get_open_tab`]
    pub const ALL: [ViewId; 5] = [
        ViewId::Models,
        ViewId::Objects,
        ViewId::Classes,
        ViewId::Storeys,
        ViewId::Properties,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ViewId::Models => "models",
            ViewId::Objects => "objects",
            ViewId::Classes => "classes",
            ViewId::Storeys => "storeys",
            ViewId::Properties => "properties",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == name)
    }
}

/// Who asked for a view change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationSource {
    /// End-user click on a tab; disabled tabs refuse it
    User,
    /// Internal transition; ignores the enabled flag
    Programmatic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewEntry {
    pub id: ViewId,
    pub enabled: bool,
    /// "active" marker on the tab trigger
    pub trigger_active: bool,
    pub content_visible: bool,
}

/// Mutually exclusive views sharing one panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewGroup {
    name: &'static str,
    entries: Vec<ViewEntry>,
}

impl ViewGroup {
    /// The first view starts open
    pub fn new(name: &'static str, views: &[ViewId]) -> Self {
        let entries = views
            .iter()
            .enumerate()
            .map(|(i, &id)| ViewEntry {
                id,
                enabled: true,
                trigger_active: i == 0,
                content_visible: i == 0,
            })
            .collect();
        Self { name, entries }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn entries(&self) -> &[ViewEntry] {
        &self.entries
    }

    pub fn contains(&self, view: ViewId) -> bool {
        self.entries.iter().any(|e| e.id == view)
    }

    /// Show `view` and hide the rest. Unknown views and user clicks on
    /// disabled tabs leave the group untouched.
    pub fn activate(&mut self, view: ViewId, source: ActivationSource) -> Result<(), ViewerError> {
        let Some(entry) = self.entries.iter().find(|e| e.id == view) else {
            return Err(ViewerError::UnknownIdentifier(format!(
                "view '{}' not in group '{}'",
                view.as_str(),
                self.name
            )));
        };
        if source == ActivationSource::User && !entry.enabled {
            return Err(ViewerError::InvalidArgument(format!(
                "view '{}' is disabled",
                view.as_str()
            )));
        }

        for e in &mut self.entries {
            e.trigger_active = false;
            e.content_visible = false;
        }
        for e in self.entries.iter_mut().filter(|e| e.id == view) {
            e.trigger_active = true;
            e.content_visible = true;
        }
        Ok(())
    }

    /// Clear every marker and hide all content
    pub fn deactivate_all(&mut self) {
        for e in &mut self.entries {
            e.trigger_active = false;
            e.content_visible = false;
        }
    }

    /// The view whose trigger is marked active
    pub fn open_view(&self) -> Option<ViewId> {
        self.entries.iter().find(|e| e.trigger_active).map(|e| e.id)
    }

    pub fn is_visible(&self, view: ViewId) -> bool {
        self.entries
            .iter()
            .any(|e| e.id == view && e.content_visible)
    }

    /// Enable or disable a trigger without touching what is shown.
    /// Returns false for views outside the group.
    pub fn set_enabled(&mut self, view: ViewId, enabled: bool) -> bool {
        match self.entries.iter_mut().find(|e| e.id == view) {
            Some(e) => {
                e.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn is_enabled(&self, view: ViewId) -> bool {
        self.entries.iter().any(|e| e.id == view && e.enabled)
    }
}

/// All tab groups of the viewer
#[derive(Debug, Clone)]
pub struct ExplorerTabs {
    explorer: ViewGroup,
    models_explorer: Option<ViewGroup>,
    inspector: Option<ViewGroup>,
}

impl Default for ExplorerTabs {
    fn default() -> Self {
        Self::new(false, true)
    }
}

impl ExplorerTabs {
    /// `separate_models_explorer` moves the models view into its own panel
    pub fn new(separate_models_explorer: bool, with_inspector: bool) -> Self {
        let (explorer, models_explorer) = if separate_models_explorer {
            (
                ViewGroup::new(
                    "explorer",
                    &[ViewId::Objects, ViewId::Classes, ViewId::Storeys],
                ),
                Some(ViewGroup::new("models_explorer", &[ViewId::Models])),
            )
        } else {
            (
                ViewGroup::new(
                    "explorer",
                    &[ViewId::Models, ViewId::Objects, ViewId::Classes, ViewId::Storeys],
                ),
                None,
            )
        };
        let inspector = with_inspector.then(|| ViewGroup::new("inspector", &[ViewId::Properties]));
        Self {
            explorer,
            models_explorer,
            inspector,
        }
    }

    pub fn groups(&self) -> impl Iterator<Item = &ViewGroup> {
        std::iter::once(&self.explorer)
            .chain(self.models_explorer.as_ref())
            .chain(self.inspector.as_ref())
    }

    fn groups_mut(&mut self) -> impl Iterator<Item = &mut ViewGroup> {
        std::iter::once(&mut self.explorer)
            .chain(self.models_explorer.as_mut())
            .chain(self.inspector.as_mut())
    }

    pub fn group_of(&self, view: ViewId) -> Option<&ViewGroup> {
        self.groups().find(|g| g.contains(view))
    }

    /// Open a tab by name
    pub fn open_tab(&mut self, name: &str, source: ActivationSource) -> Result<ViewId, ViewerError> {
        let view = ViewId::from_name(name)
            .ok_or_else(|| ViewerError::UnknownIdentifier(format!("tab '{name}'")))?;
        self.open_view(view, source)?;
        Ok(view)
    }

    pub fn open_view(&mut self, view: ViewId, source: ActivationSource) -> Result<(), ViewerError> {
        let group = self
            .groups_mut()
            .find(|g| g.contains(view))
            .ok_or_else(|| ViewerError::NotFound(format!("tab '{}'", view.as_str())))?;
        group.activate(view, source)
    }

    /// First open view in query order, or [`NO_TAB`]
    pub fn get_open_tab(&self) -> &'static str {
        ViewId::ALL
            .into_iter()
            .find(|&v| self.group_of(v).is_some_and(|g| g.open_view() == Some(v)))
            .map(|v| v.as_str())
            .unwrap_or(NO_TAB)
    }

    pub fn set_enabled(&mut self, view: ViewId, enabled: bool) -> bool {
        self.groups_mut().any(|g| g.set_enabled(view, enabled))
    }

    pub fn is_enabled(&self, view: ViewId) -> bool {
        self.group_of(view).is_some_and(|g| g.is_enabled(view))
    }

    pub fn is_visible(&self, view: ViewId) -> bool {
        self.group_of(view).is_some_and(|g| g.is_visible(view))
    }

    /// Collapse every group
    pub fn close_all(&mut self) {
        for g in self.groups_mut() {
            g.deactivate_all();
        }
    }
}
