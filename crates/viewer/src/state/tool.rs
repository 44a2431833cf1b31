//! Toolbar tools: identity, grouping and the active/enabled flags.

use serde::{Deserialize, Serialize};

/// Every tool the toolbar knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolId {
    Hide,
    Select,
    Marquee,
    Section,
    MeasureDistance,
    MeasureAngle,
    ThreeD,
    Ortho,
    FirstPerson,
    ShowSpaces,
    NavCube,
    Query,
}

/// How a tool behaves on the toolbar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolGroup {
    /// Captures pointer input while active; candidates for mutual exclusion
    Modal,
    /// Independent on/off switch
    Toggle,
}

impl ToolId {
    pub const ALL: [ToolId; 12] = [
        ToolId::Hide,
        ToolId::Select,
        ToolId::Marquee,
        ToolId::Section,
        ToolId::MeasureDistance,
        ToolId::MeasureAngle,
        ToolId::ThreeD,
        ToolId::Ortho,
        ToolId::FirstPerson,
        ToolId::ShowSpaces,
        ToolId::NavCube,
        ToolId::Query,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolId::Hide => "hide",
            ToolId::Select => "select",
            ToolId::Marquee => "marquee",
            ToolId::Section => "section",
            ToolId::MeasureDistance => "measure_distance",
            ToolId::MeasureAngle => "measure_angle",
            ToolId::ThreeD => "three_d",
            ToolId::Ortho => "ortho",
            ToolId::FirstPerson => "first_person",
            ToolId::ShowSpaces => "show_spaces",
            ToolId::NavCube => "nav_cube",
            ToolId::Query => "query",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }

    pub fn group(&self) -> ToolGroup {
        match self {
            ToolId::Hide
            | ToolId::Select
            | ToolId::Marquee
            | ToolId::Section
            | ToolId::MeasureDistance
            | ToolId::MeasureAngle => ToolGroup::Modal,
            _ => ToolGroup::Toggle,
        }
    }
}

impl std::fmt::Display for ToolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A toolbar tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tool {
    pub id: ToolId,
    active: bool,
    enabled: bool,
}

impl Tool {
    /// Inactive and enabled
    pub fn new(id: ToolId) -> Self {
        Self {
            id,
            active: false,
            enabled: true,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn group(&self) -> ToolGroup {
        self.id.group()
    }

    /// Change the active flag. Returns whether the flag changed; a disabled
    /// tool refuses activation.
    pub fn set_active(&mut self, active: bool) -> bool {
        if active && !self.enabled {
            return false;
        }
        let changed = self.active != active;
        self.active = active;
        changed
    }

    /// Change the enabled flag. Returns true if this forced the tool inactive.
    pub fn set_enabled(&mut self, enabled: bool) -> bool {
        self.enabled = enabled;
        if !enabled && self.active {
            self.active = false;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_tool_is_inactive() {
        let tool = Tool::new(ToolId::Select);
        assert!(!tool.is_active());
        assert!(tool.is_enabled());
        assert_eq!(tool.group(), ToolGroup::Modal);
    }

    #[test]
    fn test_disabled_tool_cannot_activate() {
        let mut tool = Tool::new(ToolId::Hide);
        tool.set_enabled(false);
        assert!(!tool.set_active(true));
        assert!(!tool.is_active());
    }

    #[test]
    fn test_disabling_active_tool_deactivates() {
        let mut tool = Tool::new(ToolId::Marquee);
        assert!(tool.set_active(true));
        assert!(tool.set_enabled(false));
        assert!(!tool.is_active());
        // already inactive, nothing forced
        assert!(!tool.set_enabled(false));
    }

    #[test]
    fn test_tool_names_round_trip() {
        for id in ToolId::ALL {
            assert_eq!(ToolId::from_name(id.as_str()), Some(id));
            let json = serde_json::to_string(&id).unwrap();
            assert_eq!(json, format!("\"{}\"", id.as_str()));
        }
        assert_eq!(ToolId::from_name("lasso"), None);
    }
}
