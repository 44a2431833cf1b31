//! Navigation-mode mediator.
//!
//! Two independent switches, 3D/2D and first-person, resolve to one engine
//! navigation mode. The mediator reaches the toolbar and the engine only
//! through [`NavModeHost`].

use crate::engine::NavMode;

use super::tool::ToolId;

/// What the mediator is allowed to do to its surroundings
pub trait NavModeHost {
    /// Switch a tool off without notifying the mediator back
    fn force_deactivate(&mut self, tool: ToolId);
    fn set_tool_enabled(&mut self, tool: ToolId, enabled: bool);
    fn set_nav_mode(&mut self, mode: NavMode);
}

/// Resolution table
///
/// | 3D    | first person | mode        |
/// |-------|--------------|-------------|
/// | true  | true         | firstPerson |
/// | true  | false        | orbit       |
/// | false | true         | firstPerson |
/// | false | false        | planView    |
pub fn resolve(three_d_active: bool, first_person_active: bool) -> NavMode {
    match (three_d_active, first_person_active) {
        (_, true) => NavMode::FirstPerson,
        (true, false) => NavMode::Orbit,
        (false, false) => NavMode::PlanView,
    }
}

/// Navigation intents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavModeMediator {
    three_d_active: bool,
    first_person_active: bool,
}

impl Default for NavModeMediator {
    fn default() -> Self {
        Self {
            three_d_active: true,
            first_person_active: false,
        }
    }
}

impl NavModeMediator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn three_d_active(&self) -> bool {
        self.three_d_active
    }

    pub fn first_person_active(&self) -> bool {
        self.first_person_active
    }

    pub fn mode(&self) -> NavMode {
        resolve(self.three_d_active, self.first_person_active)
    }

    /// Entering 3D drops first person and re-enables the marquee. Leaving 3D
    /// drops both the marquee and first person.
    pub fn set_three_d_mode_active(&mut self, active: bool, host: &mut impl NavModeHost) -> NavMode {
        self.three_d_active = active;
        self.first_person_active = false;
        if active {
            host.force_deactivate(ToolId::FirstPerson);
            host.set_tool_enabled(ToolId::Marquee, true);
        } else {
            host.force_deactivate(ToolId::Marquee);
            host.set_tool_enabled(ToolId::Marquee, false);
            host.force_deactivate(ToolId::FirstPerson);
        }
        let mode = self.mode();
        host.set_nav_mode(mode);
        mode
    }

    /// Leaves the 3D flag alone, so switching first person off falls back to
    /// whatever that flag implies
    pub fn set_first_person_mode_active(
        &mut self,
        active: bool,
        host: &mut impl NavModeHost,
    ) -> NavMode {
        self.first_person_active = active;
        let mode = self.mode();
        host.set_nav_mode(mode);
        mode
    }
}
