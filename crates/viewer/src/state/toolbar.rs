//! Toolbar: the tool set, modal exclusivity and per-tool working state.

use std::collections::BTreeMap;

use glam::DVec3;
use serde::Serialize;
use shared::ObjectId;

use super::mutex::MutexCoordinator;
use super::tool::{Tool, ToolGroup, ToolId};
use crate::engine::{Aabb, Engine, Ray};

/// A tool flipping on or off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ToolChange {
    pub tool: ToolId,
    pub active: bool,
}

/// A finished measurement
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Measurement {
    Distance {
        start: [f64; 3],
        end: [f64; 3],
        length: f64,
    },
    Angle {
        origin: [f64; 3],
        corner: [f64; 3],
        target: [f64; 3],
        degrees: f64,
    },
}

/// What a click did
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClickOutcome {
    /// Nothing hit, or no tool consumed the click
    None,
    Hidden { object_id: ObjectId },
    SelectionToggled { object_id: ObjectId, selected: bool },
    MarqueeStarted { corner: [f64; 3] },
    MarqueeSelected { object_ids: Vec<ObjectId> },
    SectionCreated { plane_id: String },
    MeasurementPoint { tool: ToolId, points: usize },
    MeasurementCompleted { measurement: Measurement },
    Queried { object_id: ObjectId },
}

/// All toolbar tools and the state modal tools accumulate between clicks
#[derive(Debug, Clone)]
pub struct Toolbar {
    tools: BTreeMap<ToolId, Tool>,
    mutex: MutexCoordinator,
    marquee_corner: Option<DVec3>,
    pending_points: Vec<DVec3>,
    measurements: Vec<Measurement>,
    section_control: Option<String>,
}

impl Default for Toolbar {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Toolbar {
    /// Build the tool set. Measurement tools exist only when enabled.
    pub fn new(enable_measurements: bool) -> Self {
        let tools: BTreeMap<ToolId, Tool> = ToolId::ALL
            .into_iter()
            .filter(|id| {
                enable_measurements
                    || !matches!(id, ToolId::MeasureDistance | ToolId::MeasureAngle)
            })
            .map(|id| (id, Tool::new(id)))
            .collect();

        let mut mutex = MutexCoordinator::new();
        mutex.add_group(
            tools
                .values()
                .filter(|t| t.group() == ToolGroup::Modal)
                .map(|t| t.id),
        );

        Self {
            tools,
            mutex,
            marquee_corner: None,
            pending_points: Vec::new(),
            measurements: Vec::new(),
            section_control: None,
        }
    }

    // ── Tool state ────────────────────────────────────────────

    pub fn tool(&self, id: ToolId) -> Option<&Tool> {
        self.tools.get(&id)
    }

    pub fn tools(&self) -> impl Iterator<Item = &Tool> {
        self.tools.values()
    }

    pub fn is_active(&self, id: ToolId) -> bool {
        self.tools.get(&id).is_some_and(|t| t.is_active())
    }

    pub fn is_enabled(&self, id: ToolId) -> bool {
        self.tools.get(&id).is_some_and(|t| t.is_enabled())
    }

    /// The modal tool currently capturing clicks
    pub fn active_modal(&self) -> Option<ToolId> {
        self.tools
            .values()
            .find(|t| t.group() == ToolGroup::Modal && t.is_active())
            .map(|t| t.id)
    }

    pub fn mutex(&self) -> &MutexCoordinator {
        &self.mutex
    }

    /// Turn a tool on and switch off its mutex siblings. Returns every flag
    /// change, the activated tool first.
    pub fn activate(&mut self, id: ToolId) -> Vec<ToolChange> {
        let Some(tool) = self.tools.get_mut(&id) else {
            tracing::warn!("activate() - tool not available: '{id}'");
            return Vec::new();
        };
        if !tool.is_enabled() {
            tracing::debug!("activate() - tool disabled: '{id}'");
            return Vec::new();
        }
        if !tool.set_active(true) {
            return Vec::new();
        }

        let mut changes = vec![ToolChange {
            tool: id,
            active: true,
        }];
        for sibling in self.mutex.siblings_of(id) {
            changes.extend(self.deactivate(sibling));
        }
        changes
    }

    /// Turn a tool off and undo its working state. Never touches other tools.
    pub fn deactivate(&mut self, id: ToolId) -> Option<ToolChange> {
        let tool = self.tools.get_mut(&id)?;
        if !tool.set_active(false) {
            return None;
        }
        self.on_deactivated(id);
        Some(ToolChange {
            tool: id,
            active: false,
        })
    }

    pub fn set_enabled(&mut self, id: ToolId, enabled: bool) -> Option<ToolChange> {
        let tool = self.tools.get_mut(&id)?;
        if !tool.set_enabled(enabled) {
            return None;
        }
        self.on_deactivated(id);
        Some(ToolChange {
            tool: id,
            active: false,
        })
    }

    fn on_deactivated(&mut self, id: ToolId) {
        match id {
            ToolId::Marquee => self.marquee_corner = None,
            ToolId::MeasureDistance | ToolId::MeasureAngle => self.pending_points.clear(),
            ToolId::Section => self.section_control = None,
            _ => {}
        }
    }

    // ── Working state ─────────────────────────────────────────

    pub fn marquee_corner(&self) -> Option<DVec3> {
        self.marquee_corner
    }

    pub fn pending_points(&self) -> &[DVec3] {
        &self.pending_points
    }

    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    pub fn clear_measurements(&mut self) {
        self.measurements.clear();
        self.pending_points.clear();
    }

    /// Plane currently shown with an edit control
    pub fn section_control(&self) -> Option<&str> {
        self.section_control.as_deref()
    }

    pub fn hide_section_control(&mut self) {
        self.section_control = None;
    }

    // ── Clicks ────────────────────────────────────────────────

    /// Route a click ray to the active modal tool, or to the query toggle
    pub fn handle_click<E: Engine + ?Sized>(&mut self, ray: &Ray, engine: &mut E) -> ClickOutcome {
        let Some(hit) = engine.pick(ray) else {
            return ClickOutcome::None;
        };

        match self.active_modal() {
            Some(ToolId::Hide) => {
                engine.set_objects_visible(std::slice::from_ref(&hit.object_id), false);
                ClickOutcome::Hidden {
                    object_id: hit.object_id,
                }
            }
            Some(ToolId::Select) => {
                let selected = !engine.is_selected(&hit.object_id);
                engine.set_objects_selected(std::slice::from_ref(&hit.object_id), selected);
                ClickOutcome::SelectionToggled {
                    object_id: hit.object_id,
                    selected,
                }
            }
            Some(ToolId::Marquee) => self.marquee_click(hit.world_pos, engine),
            Some(ToolId::Section) => {
                let dir = ray.direction.normalize_or_zero();
                let plane_id = engine.create_section_plane(hit.world_pos, dir);
                self.section_control = Some(plane_id.clone());
                ClickOutcome::SectionCreated { plane_id }
            }
            Some(tool @ ToolId::MeasureDistance) => self.measure_click(tool, hit.world_pos, 2),
            Some(tool @ ToolId::MeasureAngle) => self.measure_click(tool, hit.world_pos, 3),
            _ if self.is_active(ToolId::Query) => ClickOutcome::Queried {
                object_id: hit.object_id,
            },
            _ => ClickOutcome::None,
        }
    }

    fn marquee_click<E: Engine + ?Sized>(&mut self, point: DVec3, engine: &mut E) -> ClickOutcome {
        let Some(corner) = self.marquee_corner.take() else {
            self.marquee_corner = Some(point);
            return ClickOutcome::MarqueeStarted {
                corner: point.to_array(),
            };
        };

        // The box spans the full scene height
        let (zmin, zmax) = engine
            .scene_aabb()
            .map(|a| (a.min.z, a.max.z))
            .unwrap_or((point.z.min(corner.z), point.z.max(corner.z)));
        let region = Aabb::new(
            DVec3::new(corner.x.min(point.x), corner.y.min(point.y), zmin),
            DVec3::new(corner.x.max(point.x), corner.y.max(point.y), zmax),
        );

        let object_ids: Vec<ObjectId> = engine
            .visible_object_ids()
            .into_iter()
            .filter(|id| {
                engine
                    .aabb(std::slice::from_ref(id))
                    .is_some_and(|b| b.intersects(&region))
            })
            .collect();
        engine.set_objects_selected(&object_ids, true);
        ClickOutcome::MarqueeSelected { object_ids }
    }

    fn measure_click(&mut self, tool: ToolId, point: DVec3, needed: usize) -> ClickOutcome {
        // An angle leg needs two distinct points
        if tool == ToolId::MeasureAngle
            && self
                .pending_points
                .last()
                .is_some_and(|last| last.distance_squared(point) <= f64::EPSILON)
        {
            tracing::warn!("handle_click() - angle point coincides with the previous one, ignored");
            return ClickOutcome::MeasurementPoint {
                tool,
                points: self.pending_points.len(),
            };
        }
        self.pending_points.push(point);
        if self.pending_points.len() < needed {
            return ClickOutcome::MeasurementPoint {
                tool,
                points: self.pending_points.len(),
            };
        }

        let pts = std::mem::take(&mut self.pending_points);
        let measurement = if needed == 2 {
            Measurement::Distance {
                start: pts[0].to_array(),
                end: pts[1].to_array(),
                length: pts[0].distance(pts[1]),
            }
        } else {
            let a = pts[0] - pts[1];
            let b = pts[2] - pts[1];
            Measurement::Angle {
                origin: pts[0].to_array(),
                corner: pts[1].to_array(),
                target: pts[2].to_array(),
                degrees: a.angle_between(b).to_degrees(),
            }
        };
        self.measurements.push(measurement.clone());
        ClickOutcome::MeasurementCompleted { measurement }
    }
}
