//! Rendering-engine collaborator.
//!
//! The viewer never touches geometry directly. Everything it knows about the
//! scene (object state, camera, section planes, ray picks) goes through the
//! [`Engine`] trait. [`HeadlessEngine`] is the in-memory implementation used
//! by the harness, the command protocol and the binary.

pub mod headless;
pub mod picking;

use glam::DVec3;
use serde::{Deserialize, Serialize};
use shared::{MetaObjectData, ModelId, ModelMetadata, ObjectId};

pub use headless::HeadlessEngine;
pub use picking::{Aabb, Ray};

/// Camera navigation mode as understood by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NavMode {
    #[default]
    Orbit,
    FirstPerson,
    PlanView,
}

impl NavMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            NavMode::Orbit => "orbit",
            NavMode::FirstPerson => "firstPerson",
            NavMode::PlanView => "planView",
        }
    }
}

/// Camera projection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Projection {
    #[default]
    Perspective,
    Ortho,
}

/// Full camera pose plus projection parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    pub eye: DVec3,
    pub look: DVec3,
    pub up: DVec3,
    pub projection: Projection,
    /// Vertical field of view in degrees (perspective)
    pub fov: f64,
    /// Height of the visible area in world units (ortho)
    pub ortho_scale: f64,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            eye: DVec3::new(0.0, 0.0, 10.0),
            look: DVec3::ZERO,
            up: DVec3::Y,
            projection: Projection::Perspective,
            fov: 60.0,
            ortho_scale: 1.0,
        }
    }
}

impl CameraState {
    /// Look point minus eye
    pub fn direction(&self) -> DVec3 {
        self.look - self.eye
    }

    pub fn with_pose(mut self, eye: DVec3, look: DVec3, up: DVec3) -> Self {
        self.eye = eye;
        self.look = look;
        self.up = up;
        self
    }
}

/// A section (clipping) plane
#[derive(Debug, Clone, PartialEq)]
pub struct SectionPlane {
    pub id: String,
    pub pos: DVec3,
    pub dir: DVec3,
    pub active: bool,
}

/// Where a camera transition should end up
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FlightTarget {
    /// Frame the box, keeping the current view direction
    Aabb(Aabb),
    /// Explicit pose
    Pose { eye: DVec3, look: DVec3, up: DVec3 },
}

/// Completion callback of an animated camera flight
pub type FlightDone = Box<dyn FnOnce()>;

/// Result of a ray pick
#[derive(Debug, Clone, PartialEq)]
pub struct PickHit {
    pub object_id: ObjectId,
    pub world_pos: DVec3,
}

/// Emphasis material of selected/highlighted objects
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialStyle {
    pub glow_through: bool,
    pub fill_alpha: f64,
    pub edge_alpha: f64,
}

impl MaterialStyle {
    /// Glow-through material; alpha follows the flag (0.5 when on, 1.0 when off)
    pub fn glow_through(enabled: bool) -> Self {
        let alpha = if enabled { 0.5 } else { 1.0 };
        Self {
            glow_through: enabled,
            fill_alpha: alpha,
            edge_alpha: alpha,
        }
    }
}

/// A render setting pushed to the engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineSetting {
    BackgroundColor([f64; 3]),
    CameraNear(f64),
    CameraFar(f64),
    SmartPivot(bool),
    SaoEnabled(bool),
    SaoBias(f64),
    SaoIntensity(f64),
    SaoKernelRadius(f64),
    SaoNumSamples(f64),
    SaoBlur(bool),
    EdgesEnabled(bool),
    PbrEnabled(bool),
    ScaleCanvasResolution(bool),
    ViewFitFov(f64),
    ViewFitDuration(f64),
    PerspectiveFov(f64),
    XrayPickable(bool),
    SelectedMaterial(MaterialStyle),
    HighlightMaterial(MaterialStyle),
    DtxEnabled(bool),
}

impl EngineSetting {
    /// Stable name used for lookups and log lines
    pub fn name(&self) -> &'static str {
        match self {
            EngineSetting::BackgroundColor(_) => "background_color",
            EngineSetting::CameraNear(_) => "camera_near",
            EngineSetting::CameraFar(_) => "camera_far",
            EngineSetting::SmartPivot(_) => "smart_pivot",
            EngineSetting::SaoEnabled(_) => "sao_enabled",
            EngineSetting::SaoBias(_) => "sao_bias",
            EngineSetting::SaoIntensity(_) => "sao_intensity",
            EngineSetting::SaoKernelRadius(_) => "sao_kernel_radius",
            EngineSetting::SaoNumSamples(_) => "sao_num_samples",
            EngineSetting::SaoBlur(_) => "sao_blur",
            EngineSetting::EdgesEnabled(_) => "edges_enabled",
            EngineSetting::PbrEnabled(_) => "pbr_enabled",
            EngineSetting::ScaleCanvasResolution(_) => "scale_canvas_resolution",
            EngineSetting::ViewFitFov(_) => "view_fit_fov",
            EngineSetting::ViewFitDuration(_) => "view_fit_duration",
            EngineSetting::PerspectiveFov(_) => "perspective_fov",
            EngineSetting::XrayPickable(_) => "xray_pickable",
            EngineSetting::SelectedMaterial(_) => "selected_material",
            EngineSetting::HighlightMaterial(_) => "highlight_material",
            EngineSetting::DtxEnabled(_) => "dtx_enabled",
        }
    }
}

/// Operations the viewer needs from a rendering engine.
///
/// Object identifiers are engine entity ids. Only leaf objects (those with
/// geometry) are entities; container objects such as storeys exist only as
/// metadata and are reached through [`Engine::subtree_object_ids`].
pub trait Engine {
    // ── Scene objects ─────────────────────────────────────────

    /// Ids of all entities, in stable order
    fn object_ids(&self) -> Vec<ObjectId>;

    /// Whether the id names an entity or a metadata node
    fn has_object(&self, id: &str) -> bool;

    /// Whether the id names an entity with geometry
    fn is_entity(&self, id: &str) -> bool;

    fn meta_object(&self, id: &str) -> Option<&MetaObjectData>;

    /// Entity ids contained in the subtree rooted at `id` (including `id` itself
    /// when it is an entity)
    fn subtree_object_ids(&self, id: &str) -> Vec<ObjectId>;

    /// Map an external (IFC GUID) identifier back to an object id
    fn resolve_external_id(&self, external_id: &str) -> Option<ObjectId>;

    /// External identifier of an object, falling back to its id
    fn external_id_of(&self, id: &str) -> String {
        self.meta_object(id)
            .map(|m| m.external_id().to_string())
            .unwrap_or_else(|| id.to_string())
    }

    /// Metadata ids whose IFC type matches
    fn objects_of_type(&self, ifc_type: &str) -> Vec<ObjectId>;

    // ── Object state ──────────────────────────────────────────

    fn is_visible(&self, id: &str) -> bool;
    fn is_selected(&self, id: &str) -> bool;
    fn is_highlighted(&self, id: &str) -> bool;
    fn is_xrayed(&self, id: &str) -> bool;
    fn colorize(&self, id: &str) -> Option<[f64; 3]>;

    fn visible_object_ids(&self) -> Vec<ObjectId> {
        self.object_ids()
            .into_iter()
            .filter(|id| self.is_visible(id))
            .collect()
    }

    fn selected_object_ids(&self) -> Vec<ObjectId> {
        self.object_ids()
            .into_iter()
            .filter(|id| self.is_selected(id))
            .collect()
    }

    fn xrayed_object_ids(&self) -> Vec<ObjectId> {
        self.object_ids()
            .into_iter()
            .filter(|id| self.is_xrayed(id))
            .collect()
    }

    /// Ids that are not entities are ignored by all setters below
    fn set_objects_visible(&mut self, ids: &[ObjectId], visible: bool);
    fn set_objects_selected(&mut self, ids: &[ObjectId], selected: bool);
    fn set_objects_highlighted(&mut self, ids: &[ObjectId], highlighted: bool);
    fn set_objects_xrayed(&mut self, ids: &[ObjectId], xrayed: bool);
    fn set_objects_pickable(&mut self, ids: &[ObjectId], pickable: bool);
    fn set_objects_colorized(&mut self, ids: &[ObjectId], color: Option<[f64; 3]>);

    // ── Queries ───────────────────────────────────────────────

    /// Union of the boxes of the given entities
    fn aabb(&self, ids: &[ObjectId]) -> Option<Aabb>;

    /// Box of everything loaded
    fn scene_aabb(&self) -> Option<Aabb>;

    /// Nearest visible, pickable entity hit by the ray
    fn pick(&self, ray: &Ray) -> Option<PickHit>;

    // ── Camera ────────────────────────────────────────────────

    fn camera(&self) -> CameraState;

    /// Replace the camera instantly, interrupting any flight
    fn set_camera(&mut self, camera: CameraState);

    /// Move the camera instantly
    fn jump_to(&mut self, target: FlightTarget);

    /// Animate the camera; `done` fires when the flight lands
    fn fly_to(&mut self, target: FlightTarget, duration: f64, done: Option<FlightDone>);

    fn nav_mode(&self) -> NavMode;
    fn set_nav_mode(&mut self, mode: NavMode);

    // ── Section planes ────────────────────────────────────────

    fn section_planes(&self) -> Vec<SectionPlane>;
    fn create_section_plane(&mut self, pos: DVec3, dir: DVec3) -> String;
    fn destroy_section_plane(&mut self, id: &str) -> bool;
    fn clear_section_planes(&mut self);
    fn set_section_planes_active(&mut self, active: bool);
    fn flip_section_planes(&mut self);

    // ── Rendering ─────────────────────────────────────────────

    fn apply_setting(&mut self, setting: EngineSetting) -> Result<(), String>;

    /// Data URL of the current frame
    fn snapshot(&self) -> Option<String>;

    // ── Models ────────────────────────────────────────────────

    fn load_model(
        &mut self,
        model_id: &str,
        metadata: &ModelMetadata,
        geometry: &[u8],
    ) -> Result<(), String>;
    fn unload_model(&mut self, model_id: &str) -> bool;
    fn model_ids(&self) -> Vec<ModelId>;
    fn model_aabb(&self, model_id: &str) -> Option<Aabb>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glow_through_alpha() {
        let on = MaterialStyle::glow_through(true);
        assert_eq!(on.fill_alpha, 0.5);
        assert_eq!(on.edge_alpha, 0.5);
        let off = MaterialStyle::glow_through(false);
        assert_eq!(off.fill_alpha, 1.0);
        assert_eq!(off.edge_alpha, 1.0);
    }

    #[test]
    fn test_nav_mode_names() {
        assert_eq!(NavMode::Orbit.as_str(), "orbit");
        assert_eq!(NavMode::FirstPerson.as_str(), "firstPerson");
        assert_eq!(NavMode::PlanView.as_str(), "planView");
        assert_eq!(serde_json::to_string(&NavMode::PlanView).unwrap(), r#""planView""#);
    }

    #[test]
    fn test_camera_direction() {
        let cam = CameraState::default().with_pose(DVec3::ZERO, DVec3::new(1.0, 1.0, 2.0), DVec3::Z);
        assert_eq!(cam.direction(), DVec3::new(1.0, 1.0, 2.0));
    }
}
