//! In-memory engine without a GPU.
//!
//! Entities are boxes taken from the model geometry document
//! (`{"entities": {"<id>": [xmin, ymin, zmin, xmax, ymax, zmax]}}`). Camera
//! flights are queued and land on [`HeadlessEngine::complete_flights`], which
//! stands in for the render loop finishing an animation.

use std::collections::{BTreeMap, BTreeSet};

use glam::DVec3;
use serde::Deserialize;
use shared::{MetaObjectData, ModelId, ModelMetadata, ObjectId, IFC_OPENING, IFC_SPACE};

use super::picking::{pick_nearest, Aabb, Ray};
use super::{
    CameraState, Engine, EngineSetting, FlightDone, FlightTarget, NavMode, PickHit, Projection,
    SectionPlane,
};

/// Types loaded hidden and unpickable
const HIDDEN_ON_LOAD: &[&str] = &[IFC_SPACE, IFC_OPENING];

#[derive(Debug, Deserialize)]
struct GeometryDoc {
    #[serde(default)]
    entities: BTreeMap<ObjectId, [f64; 6]>,
}

#[derive(Debug, Clone)]
struct EntityState {
    aabb: Aabb,
    visible: bool,
    pickable: bool,
    selected: bool,
    highlighted: bool,
    xrayed: bool,
    colorize: Option<[f64; 3]>,
}

#[derive(Debug, Default)]
struct ModelRecord {
    meta_ids: Vec<ObjectId>,
    entity_ids: Vec<ObjectId>,
}

struct PendingFlight {
    camera: CameraState,
    done: Option<FlightDone>,
}

/// Headless rendering engine
pub struct HeadlessEngine {
    entities: BTreeMap<ObjectId, EntityState>,
    meta: BTreeMap<ObjectId, MetaObjectData>,
    children: BTreeMap<ObjectId, Vec<ObjectId>>,
    external_index: BTreeMap<String, ObjectId>,
    models: BTreeMap<ModelId, ModelRecord>,
    camera: CameraState,
    nav_mode: NavMode,
    section_planes: Vec<SectionPlane>,
    next_plane_id: u32,
    pending_flight: Option<PendingFlight>,
    settings: BTreeMap<&'static str, EngineSetting>,
    view_fit_fov: f64,
    xray_pickable: bool,
    snapshot: Option<String>,
}

impl Default for HeadlessEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessEngine {
    pub fn new() -> Self {
        Self {
            entities: BTreeMap::new(),
            meta: BTreeMap::new(),
            children: BTreeMap::new(),
            external_index: BTreeMap::new(),
            models: BTreeMap::new(),
            camera: CameraState::default(),
            nav_mode: NavMode::Orbit,
            section_planes: Vec::new(),
            next_plane_id: 0,
            pending_flight: None,
            settings: BTreeMap::new(),
            view_fit_fov: 45.0,
            xray_pickable: false,
            snapshot: None,
        }
    }

    /// Land the pending flight, if any. Returns whether one was in progress.
    pub fn complete_flights(&mut self) -> bool {
        match self.pending_flight.take() {
            Some(flight) => {
                self.camera = flight.camera;
                if let Some(done) = flight.done {
                    done();
                }
                true
            }
            None => false,
        }
    }

    pub fn is_flying(&self) -> bool {
        self.pending_flight.is_some()
    }

    /// Last applied value of a render setting, by [`EngineSetting::name`]
    pub fn setting(&self, name: &str) -> Option<&EngineSetting> {
        self.settings.get(name)
    }

    /// Image returned by `snapshot()`
    pub fn set_snapshot(&mut self, data_url: Option<String>) {
        self.snapshot = data_url;
    }

    pub fn is_pickable(&self, id: &str) -> bool {
        self.entities.get(id).is_some_and(|e| e.pickable)
    }

    fn target_camera(&self, target: FlightTarget) -> CameraState {
        match target {
            FlightTarget::Pose { eye, look, up } => self.camera.with_pose(eye, look, up),
            FlightTarget::Aabb(aabb) => self.fit_camera(&aabb),
        }
    }

    /// Frame the box from the current view direction
    fn fit_camera(&self, aabb: &Aabb) -> CameraState {
        let center = aabb.center();
        let radius = (aabb.diagonal() * 0.5).max(1e-6);
        let half_fov = (self.view_fit_fov.to_radians() * 0.5).max(1e-3);
        let dist = radius / half_fov.tan();

        let mut dir = self.camera.direction().normalize_or_zero();
        if dir == DVec3::ZERO {
            dir = DVec3::NEG_Z;
        }

        let mut cam = self
            .camera
            .with_pose(center - dir * dist, center, self.camera.up);
        if cam.projection == Projection::Ortho {
            cam.ortho_scale = aabb.diagonal().max(1e-6);
        }
        cam
    }

    fn for_entities(&mut self, ids: &[ObjectId], mut f: impl FnMut(&mut EntityState)) {
        for id in ids {
            if let Some(e) = self.entities.get_mut(id) {
                f(e);
            }
        }
    }

    fn collect_subtree(&self, id: &str, out: &mut Vec<ObjectId>, seen: &mut BTreeSet<ObjectId>) {
        if !seen.insert(id.to_string()) {
            return;
        }
        if self.entities.contains_key(id) {
            out.push(id.to_string());
        }
        if let Some(kids) = self.children.get(id) {
            for kid in kids {
                self.collect_subtree(kid, out, seen);
            }
        }
    }
}

fn check_finite(name: &str, v: f64) -> Result<(), String> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(format!("{name} must be a finite number, got {v}"))
    }
}

impl Engine for HeadlessEngine {
    fn object_ids(&self) -> Vec<ObjectId> {
        self.entities.keys().cloned().collect()
    }

    fn has_object(&self, id: &str) -> bool {
        self.entities.contains_key(id) || self.meta.contains_key(id)
    }

    fn is_entity(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    fn meta_object(&self, id: &str) -> Option<&MetaObjectData> {
        self.meta.get(id)
    }

    fn subtree_object_ids(&self, id: &str) -> Vec<ObjectId> {
        let mut out = Vec::new();
        let mut seen = BTreeSet::new();
        self.collect_subtree(id, &mut out, &mut seen);
        out
    }

    fn resolve_external_id(&self, external_id: &str) -> Option<ObjectId> {
        self.external_index.get(external_id).cloned().or_else(|| {
            self.entities
                .contains_key(external_id)
                .then(|| external_id.to_string())
        })
    }

    fn objects_of_type(&self, ifc_type: &str) -> Vec<ObjectId> {
        self.meta
            .values()
            .filter(|m| m.ifc_type == ifc_type)
            .map(|m| m.id.clone())
            .collect()
    }

    fn is_visible(&self, id: &str) -> bool {
        self.entities.get(id).is_some_and(|e| e.visible)
    }

    fn is_selected(&self, id: &str) -> bool {
        self.entities.get(id).is_some_and(|e| e.selected)
    }

    fn is_highlighted(&self, id: &str) -> bool {
        self.entities.get(id).is_some_and(|e| e.highlighted)
    }

    fn is_xrayed(&self, id: &str) -> bool {
        self.entities.get(id).is_some_and(|e| e.xrayed)
    }

    fn colorize(&self, id: &str) -> Option<[f64; 3]> {
        self.entities.get(id).and_then(|e| e.colorize)
    }

    fn set_objects_visible(&mut self, ids: &[ObjectId], visible: bool) {
        self.for_entities(ids, |e| e.visible = visible);
    }

    fn set_objects_selected(&mut self, ids: &[ObjectId], selected: bool) {
        self.for_entities(ids, |e| e.selected = selected);
    }

    fn set_objects_highlighted(&mut self, ids: &[ObjectId], highlighted: bool) {
        self.for_entities(ids, |e| e.highlighted = highlighted);
    }

    fn set_objects_xrayed(&mut self, ids: &[ObjectId], xrayed: bool) {
        self.for_entities(ids, |e| e.xrayed = xrayed);
    }

    fn set_objects_pickable(&mut self, ids: &[ObjectId], pickable: bool) {
        self.for_entities(ids, |e| e.pickable = pickable);
    }

    fn set_objects_colorized(&mut self, ids: &[ObjectId], color: Option<[f64; 3]>) {
        self.for_entities(ids, |e| e.colorize = color);
    }

    fn aabb(&self, ids: &[ObjectId]) -> Option<Aabb> {
        Aabb::union(ids.iter().filter_map(|id| self.entities.get(id).map(|e| &e.aabb)))
    }

    fn scene_aabb(&self) -> Option<Aabb> {
        Aabb::union(self.entities.values().map(|e| &e.aabb))
    }

    fn pick(&self, ray: &Ray) -> Option<PickHit> {
        let candidates = self.entities.iter().filter_map(|(id, e)| {
            let pickable = e.visible && e.pickable && (!e.xrayed || self.xray_pickable);
            pickable.then_some((id.as_str(), &e.aabb))
        });
        pick_nearest(ray, candidates).map(|(id, t)| PickHit {
            object_id: id.to_string(),
            world_pos: ray.at(t),
        })
    }

    fn camera(&self) -> CameraState {
        self.camera
    }

    fn set_camera(&mut self, camera: CameraState) {
        self.pending_flight = None;
        self.camera = camera;
    }

    fn jump_to(&mut self, target: FlightTarget) {
        let cam = self.target_camera(target);
        self.set_camera(cam);
    }

    fn fly_to(&mut self, target: FlightTarget, duration: f64, done: Option<FlightDone>) {
        let camera = self.target_camera(target);
        if duration <= 0.0 {
            self.set_camera(camera);
            if let Some(done) = done {
                done();
            }
            return;
        }
        if self.pending_flight.is_some() {
            tracing::debug!("fly_to() - interrupting camera flight in progress");
        }
        self.pending_flight = Some(PendingFlight { camera, done });
    }

    fn nav_mode(&self) -> NavMode {
        self.nav_mode
    }

    fn set_nav_mode(&mut self, mode: NavMode) {
        self.nav_mode = mode;
    }

    fn section_planes(&self) -> Vec<SectionPlane> {
        self.section_planes.clone()
    }

    fn create_section_plane(&mut self, pos: DVec3, dir: DVec3) -> String {
        self.next_plane_id += 1;
        let id = format!("section-plane-{}", self.next_plane_id);
        self.section_planes.push(SectionPlane {
            id: id.clone(),
            pos,
            dir,
            active: true,
        });
        id
    }

    fn destroy_section_plane(&mut self, id: &str) -> bool {
        let before = self.section_planes.len();
        self.section_planes.retain(|p| p.id != id);
        self.section_planes.len() != before
    }

    fn clear_section_planes(&mut self) {
        self.section_planes.clear();
    }

    fn set_section_planes_active(&mut self, active: bool) {
        for plane in &mut self.section_planes {
            plane.active = active;
        }
    }

    fn flip_section_planes(&mut self) {
        for plane in &mut self.section_planes {
            plane.dir = -plane.dir;
        }
    }

    fn apply_setting(&mut self, setting: EngineSetting) -> Result<(), String> {
        match &setting {
            EngineSetting::BackgroundColor(rgb) => {
                if rgb.iter().any(|c| !c.is_finite() || *c < 0.0 || *c > 1.0) {
                    return Err(format!("background color out of range: {rgb:?}"));
                }
            }
            EngineSetting::CameraNear(v) => {
                check_finite("camera near", *v)?;
                if *v <= 0.0 {
                    return Err(format!("camera near must be positive, got {v}"));
                }
            }
            EngineSetting::CameraFar(v) => {
                check_finite("camera far", *v)?;
                if *v <= 0.0 {
                    return Err(format!("camera far must be positive, got {v}"));
                }
            }
            EngineSetting::SaoNumSamples(v) => {
                check_finite("SAO samples", *v)?;
                if *v < 1.0 {
                    return Err(format!("SAO samples must be at least 1, got {v}"));
                }
            }
            EngineSetting::ViewFitFov(v) => {
                check_finite("view fit FOV", *v)?;
                if *v <= 0.0 || *v >= 180.0 {
                    return Err(format!("view fit FOV out of range: {v}"));
                }
                self.view_fit_fov = *v;
            }
            EngineSetting::PerspectiveFov(v) => {
                check_finite("perspective FOV", *v)?;
                if *v <= 0.0 || *v >= 180.0 {
                    return Err(format!("perspective FOV out of range: {v}"));
                }
                self.camera.fov = *v;
            }
            EngineSetting::SaoBias(v)
            | EngineSetting::SaoIntensity(v)
            | EngineSetting::SaoKernelRadius(v)
            | EngineSetting::ViewFitDuration(v) => check_finite(setting.name(), *v)?,
            EngineSetting::XrayPickable(v) => self.xray_pickable = *v,
            EngineSetting::SmartPivot(_)
            | EngineSetting::SaoEnabled(_)
            | EngineSetting::SaoBlur(_)
            | EngineSetting::EdgesEnabled(_)
            | EngineSetting::PbrEnabled(_)
            | EngineSetting::ScaleCanvasResolution(_)
            | EngineSetting::SelectedMaterial(_)
            | EngineSetting::HighlightMaterial(_)
            | EngineSetting::DtxEnabled(_) => {}
        }
        self.settings.insert(setting.name(), setting);
        Ok(())
    }

    fn snapshot(&self) -> Option<String> {
        self.snapshot.clone()
    }

    fn load_model(
        &mut self,
        model_id: &str,
        metadata: &ModelMetadata,
        geometry: &[u8],
    ) -> Result<(), String> {
        if self.models.contains_key(model_id) {
            return Err(format!("Model already loaded: {model_id}"));
        }
        let doc: GeometryDoc = serde_json::from_slice(geometry)
            .map_err(|e| format!("Invalid geometry for model {model_id}: {e}"))?;

        let mut record = ModelRecord::default();

        for meta in &metadata.meta_objects {
            if let Some(parent) = &meta.parent {
                self.children
                    .entry(parent.clone())
                    .or_default()
                    .push(meta.id.clone());
            }
            self.external_index
                .insert(meta.external_id().to_string(), meta.id.clone());
            self.meta.insert(meta.id.clone(), meta.clone());
            record.meta_ids.push(meta.id.clone());
        }

        for (id, bounds) in doc.entities {
            let hidden = self
                .meta
                .get(&id)
                .is_some_and(|m| HIDDEN_ON_LOAD.contains(&m.ifc_type.as_str()));
            self.entities.insert(
                id.clone(),
                EntityState {
                    aabb: Aabb::from_array(bounds),
                    visible: !hidden,
                    pickable: !hidden,
                    selected: false,
                    highlighted: false,
                    xrayed: false,
                    colorize: None,
                },
            );
            record.entity_ids.push(id);
        }

        tracing::debug!(
            "Engine loaded model {model_id}: {} metaobjects, {} entities",
            record.meta_ids.len(),
            record.entity_ids.len()
        );
        self.models.insert(model_id.to_string(), record);
        Ok(())
    }

    fn unload_model(&mut self, model_id: &str) -> bool {
        let Some(record) = self.models.remove(model_id) else {
            return false;
        };
        for id in &record.entity_ids {
            self.entities.remove(id);
        }
        for id in &record.meta_ids {
            if let Some(meta) = self.meta.remove(id) {
                self.external_index.remove(meta.external_id());
                if let Some(parent) = &meta.parent {
                    if let Some(kids) = self.children.get_mut(parent) {
                        kids.retain(|k| k != id);
                    }
                }
            }
            self.children.remove(id);
        }
        true
    }

    fn model_ids(&self) -> Vec<ModelId> {
        self.models.keys().cloned().collect()
    }

    fn model_aabb(&self, model_id: &str) -> Option<Aabb> {
        let record = self.models.get(model_id)?;
        self.aabb(&record.entity_ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn meta(id: &str, ifc_type: &str, parent: Option<&str>) -> MetaObjectData {
        MetaObjectData {
            id: id.into(),
            name: id.into(),
            ifc_type: ifc_type.into(),
            parent: parent.map(String::from),
            external_id: Some(format!("guid-{id}")),
        }
    }

    fn engine_with_storey() -> HeadlessEngine {
        let mut engine = HeadlessEngine::new();
        let metadata = ModelMetadata {
            id: "m".into(),
            project_id: "p".into(),
            meta_objects: vec![
                meta("storey", "IfcBuildingStorey", None),
                meta("wall", "IfcWall", Some("storey")),
                meta("slab", "IfcSlab", Some("storey")),
                meta("space", IFC_SPACE, Some("storey")),
            ],
        };
        let geometry = br#"{"entities": {
            "wall": [0, 0, 0, 1, 1, 3],
            "slab": [0, 0, -0.2, 10, 10, 0],
            "space": [1, 1, 0, 9, 9, 3]
        }}"#;
        engine.load_model("m", &metadata, geometry).unwrap();
        engine
    }

    #[test]
    fn test_spaces_load_hidden_and_unpickable() {
        let engine = engine_with_storey();
        assert!(!engine.is_visible("space"));
        assert!(!engine.is_pickable("space"));
        assert!(engine.is_visible("wall"));
    }

    #[test]
    fn test_subtree_contains_only_entities() {
        let engine = engine_with_storey();
        let ids = engine.subtree_object_ids("storey");
        assert_eq!(ids.len(), 3);
        assert!(!ids.contains(&"storey".to_string()));
        assert!(engine.has_object("storey"));
        assert!(!engine.is_entity("storey"));
    }

    #[test]
    fn test_external_id_resolution() {
        let engine = engine_with_storey();
        assert_eq!(engine.resolve_external_id("guid-wall").as_deref(), Some("wall"));
        assert_eq!(engine.external_id_of("wall"), "guid-wall");
        assert!(engine.resolve_external_id("guid-nothing").is_none());
    }

    #[test]
    fn test_duplicate_model_rejected() {
        let mut engine = engine_with_storey();
        let err = engine
            .load_model("m", &ModelMetadata::default(), br#"{"entities": {}}"#)
            .unwrap_err();
        assert!(err.contains("already loaded"));
    }

    #[test]
    fn test_unload_removes_everything() {
        let mut engine = engine_with_storey();
        assert!(engine.unload_model("m"));
        assert!(engine.object_ids().is_empty());
        assert!(!engine.has_object("storey"));
        assert!(engine.resolve_external_id("guid-wall").is_none());
        assert!(!engine.unload_model("m"));
    }

    #[test]
    fn test_pick_skips_hidden() {
        let mut engine = engine_with_storey();
        let ray = Ray::new(DVec3::new(0.5, 0.5, 10.0), DVec3::NEG_Z);
        assert_eq!(engine.pick(&ray).unwrap().object_id, "wall");

        engine.set_objects_visible(&["wall".to_string()], false);
        assert_eq!(engine.pick(&ray).unwrap().object_id, "slab");
    }

    #[test]
    fn test_fly_to_waits_for_completion() {
        let mut engine = HeadlessEngine::new();
        let landed = Rc::new(Cell::new(false));
        let flag = landed.clone();
        let look = DVec3::new(1.0, 2.0, 3.0);
        engine.fly_to(
            FlightTarget::Pose {
                eye: DVec3::ZERO,
                look,
                up: DVec3::Z,
            },
            0.5,
            Some(Box::new(move || flag.set(true))),
        );
        assert!(engine.is_flying());
        assert!(!landed.get());
        assert_ne!(engine.camera().look, look);

        assert!(engine.complete_flights());
        assert!(landed.get());
        assert_eq!(engine.camera().look, look);
    }

    #[test]
    fn test_jump_interrupts_flight() {
        let mut engine = HeadlessEngine::new();
        let landed = Rc::new(Cell::new(false));
        let flag = landed.clone();
        engine.fly_to(
            FlightTarget::Pose {
                eye: DVec3::ZERO,
                look: DVec3::X,
                up: DVec3::Z,
            },
            1.0,
            Some(Box::new(move || flag.set(true))),
        );
        engine.jump_to(FlightTarget::Pose {
            eye: DVec3::ZERO,
            look: DVec3::Y,
            up: DVec3::Z,
        });
        assert!(!engine.complete_flights());
        assert!(!landed.get());
        assert_eq!(engine.camera().look, DVec3::Y);
    }

    #[test]
    fn test_fit_keeps_view_direction() {
        let mut engine = engine_with_storey();
        let before = engine.camera().direction().normalize();
        let aabb = engine.scene_aabb().unwrap();
        engine.jump_to(FlightTarget::Aabb(aabb));
        let cam = engine.camera();
        assert!((cam.look - aabb.center()).length() < 1e-9);
        assert!((cam.direction().normalize() - before).length() < 1e-9);
    }

    #[test]
    fn test_apply_setting_validation() {
        let mut engine = HeadlessEngine::new();
        assert!(engine.apply_setting(EngineSetting::CameraNear(0.05)).is_ok());
        assert!(engine.apply_setting(EngineSetting::CameraNear(-1.0)).is_err());
        assert!(engine.apply_setting(EngineSetting::SaoBias(f64::NAN)).is_err());
        assert_eq!(
            engine.setting("camera_near"),
            Some(&EngineSetting::CameraNear(0.05))
        );
    }

    #[test]
    fn test_section_planes() {
        let mut engine = HeadlessEngine::new();
        let id = engine.create_section_plane(DVec3::ZERO, DVec3::Z);
        engine.flip_section_planes();
        assert_eq!(engine.section_planes()[0].dir, DVec3::NEG_Z);
        assert!(engine.destroy_section_plane(&id));
        assert!(engine.section_planes().is_empty());
    }
}
