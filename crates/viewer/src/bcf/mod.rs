//! BCF viewpoint codec: live engine state to and from [`BcfViewpoint`].
//!
//! The engine camera stores a look *point*; BCF stores a look *direction*.
//! Saving writes `look - eye`, loading rebuilds `eye + direction` (or the
//! first surface hit along that direction when ray casting is on).

mod load;
mod save;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use shared::bcf::DEFAULT_ORIGINATING_SYSTEM;
use shared::{ObjectId, IFC_OPENING, IFC_SPACE, IFC_SPACE_BOUNDARY};

use crate::engine::{CameraState, Engine};

pub use load::load_viewpoint;
pub use save::save_viewpoint;

/// Options of [`save_viewpoint`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveOptions {
    /// Hidden by default, visible objects become the exceptions
    pub default_invisible: bool,
    /// Force spaces visible/hidden while computing exceptions
    pub spaces_visible: Option<bool>,
    pub space_boundaries_visible: Option<bool>,
    pub openings_visible: Option<bool>,
    /// Embed a snapshot of the current frame
    pub snapshot: bool,
    pub reverse_clipping_planes: bool,
    /// Export x-rayed objects as coloring with zero alpha
    pub xray_as_zero_alpha: bool,
    pub originating_system: String,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            default_invisible: false,
            spaces_visible: None,
            space_boundaries_visible: None,
            openings_visible: None,
            snapshot: true,
            reverse_clipping_planes: false,
            xray_as_zero_alpha: false,
            originating_system: DEFAULT_ORIGINATING_SYSTEM.to_string(),
        }
    }
}

/// Options of [`load_viewpoint`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Find the look point by casting a ray along the camera direction
    pub ray_cast: bool,
    /// Jump instead of flying
    pub immediate: bool,
    /// Flight duration in seconds
    pub duration: f64,
    /// Clear selection, highlight, x-ray and colors first
    pub reset: bool,
    pub reverse_clipping_planes: bool,
    /// Expand containers to the leaf objects inside them
    pub update_composite_objects: bool,
    /// Coloring with zero alpha means x-ray
    pub xray_as_zero_alpha: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            ray_cast: true,
            immediate: true,
            duration: 0.5,
            reset: true,
            reverse_clipping_planes: false,
            update_composite_objects: false,
            xray_as_zero_alpha: false,
        }
    }
}

/// What a load did
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadReport {
    /// Referenced identifiers not present in the scene, first occurrence order
    pub missing: Vec<String>,
    pub clipping_planes: usize,
    pub camera_applied: bool,
    /// The request was the reset sentinel
    pub reset: bool,
}

/// Scene state captured after the first model load, restored by the reset
/// sentinel
#[derive(Debug, Clone, PartialEq)]
pub struct ResetMemento {
    pub camera: CameraState,
    objects: BTreeMap<ObjectId, ObjectMemento>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ObjectMemento {
    visible: bool,
    colorize: Option<[f64; 3]>,
}

impl ResetMemento {
    pub fn capture<E: Engine + ?Sized>(engine: &E) -> Self {
        let objects = engine
            .object_ids()
            .into_iter()
            .map(|id| {
                let m = ObjectMemento {
                    visible: engine.is_visible(&id),
                    colorize: engine.colorize(&id),
                };
                (id, m)
            })
            .collect();
        Self {
            camera: engine.camera(),
            objects,
        }
    }

    /// Put captured objects and the camera back. Objects loaded later are left alone.
    pub fn restore<E: Engine + ?Sized>(&self, engine: &mut E) {
        for (id, m) in &self.objects {
            let ids = std::slice::from_ref(id);
            engine.set_objects_visible(ids, m.visible);
            engine.set_objects_colorized(ids, m.colorize);
        }
        engine.set_camera(self.camera);
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// IFC types whose visibility is steered by view setup hints
pub(crate) const HINTED_TYPES: [&str; 3] = [IFC_SPACE, IFC_SPACE_BOUNDARY, IFC_OPENING];

/// Entities of an IFC type
pub(crate) fn entities_of_type<E: Engine + ?Sized>(engine: &E, ifc_type: &str) -> Vec<ObjectId> {
    engine
        .objects_of_type(ifc_type)
        .into_iter()
        .filter(|id| engine.is_entity(id))
        .collect()
}

/// `[r, g, b]` in 0..=1 to `"rrggbb"`
pub fn color_to_hex(rgb: [f64; 3]) -> String {
    let c = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    format!("{:02x}{:02x}{:02x}", c(rgb[0]), c(rgb[1]), c(rgb[2]))
}

/// Parse `"rrggbb"` or `"aarrggbb"` (optional leading `#`) into rgb and alpha
pub fn parse_hex_color(hex: &str) -> Option<([f64; 3], f64)> {
    let hex = hex.trim_start_matches('#');
    let byte = |i: usize| {
        hex.get(i..i + 2)
            .and_then(|s| u8::from_str_radix(s, 16).ok())
            .map(|b| f64::from(b) / 255.0)
    };
    match hex.len() {
        6 => Some(([byte(0)?, byte(2)?, byte(4)?], 1.0)),
        8 => Some(([byte(2)?, byte(4)?, byte(6)?], byte(0)?)),
        _ => None,
    }
}
