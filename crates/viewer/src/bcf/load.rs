use std::collections::BTreeSet;

use glam::DVec3;
use shared::bcf::{BcfPoint, BcfViewpoint, Component, ViewpointRequest};
use shared::{ObjectId, IFC_OPENING, IFC_SPACE, IFC_SPACE_BOUNDARY};

use super::{entities_of_type, parse_hex_color, LoadOptions, LoadReport, ResetMemento, HINTED_TYPES};
use crate::engine::{Engine, FlightDone, FlightTarget, Projection, Ray};

fn to_vec(p: &BcfPoint) -> DVec3 {
    DVec3::new(p.x, p.y, p.z)
}

/// Apply a viewpoint (or the reset sentinel) to the engine.
///
/// Components naming objects that are not loaded are skipped, logged once
/// each and listed in the report. `done` fires once the camera is in place.
pub fn load_viewpoint<E: Engine + ?Sized>(
    engine: &mut E,
    request: &ViewpointRequest,
    options: &LoadOptions,
    memento: Option<&ResetMemento>,
    done: Option<FlightDone>,
) -> LoadReport {
    match request {
        ViewpointRequest::Reset => {
            reset_view(engine, memento);
            if let Some(done) = done {
                done();
            }
            LoadReport {
                reset: true,
                camera_applied: true,
                ..Default::default()
            }
        }
        ViewpointRequest::Viewpoint(vp) => apply_viewpoint(engine, vp, options, done),
    }
}

/// Clear planes and emphasis, then restore the memento, or show everything
/// except hinted types and return to the default camera
fn reset_view<E: Engine + ?Sized>(engine: &mut E, memento: Option<&ResetMemento>) {
    engine.clear_section_planes();
    clear_emphasis(engine);
    match memento {
        Some(memento) => memento.restore(engine),
        None => {
            let all = engine.object_ids();
            engine.set_objects_visible(&all, true);
            engine.set_objects_colorized(&all, None);
            for ifc_type in HINTED_TYPES {
                let ids = entities_of_type(&*engine, ifc_type);
                engine.set_objects_visible(&ids, false);
            }
            engine.set_camera(crate::engine::CameraState::default());
        }
    }
}

fn clear_emphasis<E: Engine + ?Sized>(engine: &mut E) {
    let all = engine.object_ids();
    engine.set_objects_selected(&all, false);
    engine.set_objects_highlighted(&all, false);
    engine.set_objects_xrayed(&all, false);
}

/// Resolves components to entity ids and remembers what was missing
struct Resolver<'a> {
    options: &'a LoadOptions,
    seen_missing: BTreeSet<String>,
    missing: Vec<String>,
}

impl Resolver<'_> {
    fn entity_ids<E: Engine + ?Sized>(&mut self, engine: &E, components: &[Component]) -> Vec<ObjectId> {
        let mut out = Vec::new();
        for c in components {
            let Some(lookup) = c.lookup_id() else {
                tracing::debug!("load_bcf_viewpoint() - component without identifier skipped");
                continue;
            };
            let object_id = engine.resolve_external_id(lookup).or_else(|| {
                engine.has_object(lookup).then(|| lookup.to_string())
            });
            let Some(object_id) = object_id else {
                if self.seen_missing.insert(lookup.to_string()) {
                    tracing::warn!("load_bcf_viewpoint() - object not found: '{lookup}'");
                    self.missing.push(lookup.to_string());
                }
                continue;
            };

            if self.options.update_composite_objects {
                out.extend(engine.subtree_object_ids(&object_id));
            } else if engine.is_entity(&object_id) {
                out.push(object_id);
            } else {
                tracing::debug!(
                    "load_bcf_viewpoint() - '{object_id}' is a container, not expanded"
                );
            }
        }
        out
    }
}

fn apply_viewpoint<E: Engine + ?Sized>(
    engine: &mut E,
    vp: &BcfViewpoint,
    options: &LoadOptions,
    done: Option<FlightDone>,
) -> LoadReport {
    let mut resolver = Resolver {
        options,
        seen_missing: BTreeSet::new(),
        missing: Vec::new(),
    };

    if options.reset {
        clear_emphasis(engine);
        let all = engine.object_ids();
        engine.set_objects_colorized(&all, None);
    }

    // Clipping planes
    engine.clear_section_planes();
    for plane in &vp.clipping_planes {
        let dir = to_vec(&plane.direction);
        let dir = if options.reverse_clipping_planes { -dir } else { dir };
        engine.create_section_plane(to_vec(&plane.location), dir);
    }

    // Visibility
    if let Some(visibility) = vp.visibility() {
        let all = engine.object_ids();
        engine.set_objects_visible(&all, visibility.default_visibility);

        if let Some(hints) = &visibility.view_setup_hints {
            for (ifc_type, visible) in [
                (IFC_SPACE, hints.spaces_visible),
                (IFC_SPACE_BOUNDARY, hints.space_boundaries_visible),
                (IFC_OPENING, hints.openings_visible),
            ] {
                let ids = entities_of_type(&*engine, ifc_type);
                engine.set_objects_visible(&ids, visible);
            }
        }

        let exceptions = resolver.entity_ids(&*engine, &visibility.exceptions);
        engine.set_objects_visible(&exceptions, !visibility.default_visibility);
    }

    // Selection
    if let Some(components) = &vp.components {
        let all = engine.object_ids();
        engine.set_objects_selected(&all, false);
        let selected = resolver.entity_ids(&*engine, &components.selection);
        engine.set_objects_selected(&selected, true);

        for coloring in &components.coloring {
            let Some((rgb, alpha)) = parse_hex_color(&coloring.color) else {
                tracing::warn!("load_bcf_viewpoint() - invalid color '{}'", coloring.color);
                continue;
            };
            let ids = resolver.entity_ids(&*engine, &coloring.components);
            if options.xray_as_zero_alpha && alpha == 0.0 {
                engine.set_objects_xrayed(&ids, true);
            } else {
                engine.set_objects_colorized(&ids, Some(rgb));
            }
        }
    }

    let camera_applied = apply_camera(engine, vp, options, done);

    LoadReport {
        missing: resolver.missing,
        clipping_planes: vp.clipping_planes.len(),
        camera_applied,
        reset: false,
    }
}

fn apply_camera<E: Engine + ?Sized>(
    engine: &mut E,
    vp: &BcfViewpoint,
    options: &LoadOptions,
    done: Option<FlightDone>,
) -> bool {
    let mut camera = engine.camera();
    let (view_point, direction, up) = if let Some(cam) = &vp.perspective_camera {
        camera.projection = Projection::Perspective;
        camera.fov = cam.field_of_view;
        (&cam.camera_view_point, &cam.camera_direction, &cam.camera_up_vector)
    } else if let Some(cam) = &vp.orthogonal_camera {
        camera.projection = Projection::Ortho;
        camera.ortho_scale = cam.view_to_world_scale;
        (&cam.camera_view_point, &cam.camera_direction, &cam.camera_up_vector)
    } else {
        if let Some(done) = done {
            done();
        }
        return false;
    };

    let eye = to_vec(view_point);
    let mut dir = to_vec(direction);
    let up = to_vec(up);

    if !(dir.is_finite() && dir.length_squared() > 0.0) {
        tracing::warn!("load_bcf_viewpoint() - degenerate camera direction, keeping the current one");
        dir = camera.direction().try_normalize().unwrap_or(DVec3::Y);
    }

    let look = if options.ray_cast {
        engine
            .pick(&Ray::new(eye, dir))
            .map(|hit| hit.world_pos)
            .filter(|p| p.is_finite())
            .unwrap_or(eye + dir)
    } else {
        eye + dir
    };

    // Projection parameters first, then the pose
    engine.set_camera(camera);
    let target = FlightTarget::Pose { eye, look, up };
    if options.immediate {
        engine.jump_to(target);
        if let Some(done) = done {
            done();
        }
    } else {
        engine.fly_to(target, options.duration, done);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bcf::{save_viewpoint, SaveOptions};
    use crate::engine::{CameraState, HeadlessEngine};
    use crate::fixtures;
    use shared::bcf::{ClippingPlane, Coloring, Components, PerspectiveCamera, Visibility};
    use std::cell::Cell;
    use std::rc::Rc;
    use std::sync::{Arc, Mutex};
    use tracing::field::{Field, Visit};
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    /// Collects the message of every warning
    #[derive(Clone, Default)]
    struct WarnRecorder(Arc<Mutex<Vec<String>>>);

    struct MessageVisitor(String);

    impl Visit for MessageVisitor {
        fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
            if field.name() == "message" {
                self.0 = format!("{value:?}");
            }
        }
    }

    impl<S: Subscriber> Layer<S> for WarnRecorder {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == Level::WARN {
                let mut visitor = MessageVisitor(String::new());
                event.record(&mut visitor);
                self.0.lock().unwrap().push(visitor.0);
            }
        }
    }

    fn ids(v: &[&str]) -> Vec<ObjectId> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn guid_component(id: &str) -> Component {
        Component {
            ifc_guid: Some(fixtures::guid(id)),
            originating_system: None,
            authoring_tool_id: None,
        }
    }

    fn perspective(eye: [f64; 3], dir: [f64; 3]) -> PerspectiveCamera {
        PerspectiveCamera {
            camera_view_point: BcfPoint::from_array(eye),
            camera_direction: BcfPoint::from_array(dir),
            camera_up_vector: BcfPoint::new(0.0, 0.0, 1.0),
            field_of_view: 55.0,
        }
    }

    fn no_ray_cast() -> LoadOptions {
        LoadOptions {
            ray_cast: false,
            ..Default::default()
        }
    }

    fn load(engine: &mut HeadlessEngine, vp: BcfViewpoint, options: &LoadOptions) -> LoadReport {
        load_viewpoint(engine, &ViewpointRequest::from(vp), options, None, None)
    }

    #[test]
    fn test_look_is_eye_plus_direction_without_ray_cast() {
        let mut engine = HeadlessEngine::new();
        engine.set_camera(CameraState::default().with_pose(
            DVec3::ZERO,
            DVec3::new(1.0, 1.0, 2.0),
            DVec3::Z,
        ));
        let vp = save_viewpoint(&mut engine, &SaveOptions::default());

        engine.set_camera(CameraState::default());
        load(&mut engine, vp, &no_ray_cast());

        let cam = engine.camera();
        assert_eq!(cam.eye, DVec3::ZERO);
        assert_eq!(cam.look, DVec3::new(1.0, 1.0, 2.0));
        assert_eq!(cam.up, DVec3::Z);
    }

    #[test]
    fn test_ray_cast_finds_surface() {
        let mut engine = fixtures::building_engine();
        // Straight down onto the upper slab (top at z = 3)
        let vp = BcfViewpoint {
            perspective_camera: Some(perspective([5.0, 5.0, 20.0], [0.0, 0.0, -1.0])),
            ..Default::default()
        };
        load(&mut engine, vp.clone(), &LoadOptions::default());
        assert!((engine.camera().look - DVec3::new(5.0, 5.0, 3.0)).length() < 1e-9);
        assert_eq!(engine.camera().fov, 55.0);

        load(&mut engine, vp, &no_ray_cast());
        assert_eq!(engine.camera().look, DVec3::new(5.0, 5.0, 19.0));
    }

    #[test]
    fn test_ray_cast_falls_back_when_nothing_hit() {
        let mut engine = fixtures::building_engine();
        let vp = BcfViewpoint {
            perspective_camera: Some(perspective([100.0, 100.0, 100.0], [0.0, 0.0, 1.0])),
            ..Default::default()
        };
        load(&mut engine, vp, &LoadOptions::default());
        assert_eq!(engine.camera().look, DVec3::new(100.0, 100.0, 101.0));
    }

    #[test]
    fn test_visibility_round_trip() {
        let mut engine = fixtures::building_engine();
        let hidden = ids(&[fixtures::WALL_NORTH, fixtures::SLAB]);
        engine.set_objects_visible(&hidden, false);
        let hidden_before: Vec<ObjectId> = engine
            .object_ids()
            .into_iter()
            .filter(|id| !engine.is_visible(id))
            .collect();

        let vp = save_viewpoint(&mut engine, &SaveOptions::default());

        let all = engine.object_ids();
        engine.set_objects_visible(&all, true);
        let report = load(&mut engine, vp, &no_ray_cast());
        assert!(report.missing.is_empty());

        let hidden_after: Vec<ObjectId> = engine
            .object_ids()
            .into_iter()
            .filter(|id| !engine.is_visible(id))
            .collect();
        assert_eq!(hidden_after, hidden_before);
    }

    #[test]
    fn test_missing_object_reported_once() {
        let mut engine = fixtures::building_engine();
        let vp = BcfViewpoint {
            components: Some(Components {
                visibility: Some(Visibility {
                    default_visibility: true,
                    exceptions: vec![
                        guid_component(fixtures::WALL_NORTH),
                        Component {
                            ifc_guid: Some("not-in-this-model".into()),
                            ..Default::default()
                        },
                        guid_component(fixtures::WALL_SOUTH),
                    ],
                    view_setup_hints: None,
                }),
                selection: vec![Component {
                    ifc_guid: Some("not-in-this-model".into()),
                    ..Default::default()
                }],
                coloring: vec![],
            }),
            ..Default::default()
        };
        let report = load(&mut engine, vp, &no_ray_cast());
        assert_eq!(report.missing, vec!["not-in-this-model".to_string()]);
        assert!(!engine.is_visible(fixtures::WALL_NORTH));
        assert!(!engine.is_visible(fixtures::WALL_SOUTH));
        assert!(engine.is_visible(fixtures::SLAB));
        assert!(!report.camera_applied);
    }

    #[test]
    fn test_composite_expansion() {
        let vp = BcfViewpoint {
            components: Some(Components {
                visibility: Some(Visibility {
                    default_visibility: true,
                    exceptions: vec![guid_component(fixtures::STOREY_1)],
                    view_setup_hints: None,
                }),
                selection: vec![guid_component(fixtures::STOREY_2)],
                coloring: vec![],
            }),
            ..Default::default()
        };

        let mut engine = fixtures::building_engine();
        load(&mut engine, vp.clone(), &no_ray_cast());
        assert!(engine.is_visible(fixtures::WALL_NORTH));
        assert!(engine.selected_object_ids().is_empty());

        let mut engine = fixtures::building_engine();
        let report = load(
            &mut engine,
            vp,
            &LoadOptions {
                update_composite_objects: true,
                ..no_ray_cast()
            },
        );
        assert!(report.missing.is_empty());
        assert!(!engine.is_visible(fixtures::WALL_NORTH));
        assert!(!engine.is_visible(fixtures::SLAB));
        assert!(engine.is_visible(fixtures::WALL_UPPER));
        assert!(engine.is_selected(fixtures::WALL_UPPER));
        assert!(engine.is_selected(fixtures::SLAB_2));
    }

    #[test]
    fn test_clipping_planes_recreated() {
        let mut engine = fixtures::building_engine();
        engine.create_section_plane(DVec3::ZERO, DVec3::X);
        let vp = BcfViewpoint {
            clipping_planes: vec![ClippingPlane {
                location: BcfPoint::new(1.0, 2.0, 3.0),
                direction: BcfPoint::new(0.0, 0.0, 1.0),
            }],
            ..Default::default()
        };
        let report = load(
            &mut engine,
            vp,
            &LoadOptions {
                reverse_clipping_planes: true,
                ..no_ray_cast()
            },
        );
        let planes = engine.section_planes();
        assert_eq!(report.clipping_planes, 1);
        assert_eq!(planes.len(), 1);
        assert_eq!(planes[0].pos, DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(planes[0].dir, DVec3::NEG_Z);
    }

    #[test]
    fn test_coloring_and_xray() {
        let mut engine = fixtures::building_engine();
        let vp = BcfViewpoint {
            components: Some(Components {
                visibility: None,
                selection: vec![],
                coloring: vec![
                    Coloring {
                        color: "ff0000".into(),
                        components: vec![guid_component(fixtures::WALL_NORTH)],
                    },
                    Coloring {
                        color: "00ffffff".into(),
                        components: vec![guid_component(fixtures::SLAB)],
                    },
                ],
            }),
            ..Default::default()
        };
        load(
            &mut engine,
            vp,
            &LoadOptions {
                xray_as_zero_alpha: true,
                ..no_ray_cast()
            },
        );
        assert_eq!(engine.colorize(fixtures::WALL_NORTH), Some([1.0, 0.0, 0.0]));
        assert!(engine.is_xrayed(fixtures::SLAB));
        assert_eq!(engine.colorize(fixtures::SLAB), None);
    }

    #[test]
    fn test_reset_option_clears_emphasis() {
        let mut engine = fixtures::building_engine();
        engine.set_objects_xrayed(&ids(&[fixtures::WALL_SOUTH]), true);
        engine.set_objects_highlighted(&ids(&[fixtures::WALL_SOUTH]), true);

        load(
            &mut engine,
            BcfViewpoint::default(),
            &LoadOptions {
                reset: false,
                ..no_ray_cast()
            },
        );
        assert!(engine.is_xrayed(fixtures::WALL_SOUTH));

        load(&mut engine, BcfViewpoint::default(), &no_ray_cast());
        assert!(!engine.is_xrayed(fixtures::WALL_SOUTH));
        assert!(!engine.is_highlighted(fixtures::WALL_SOUTH));
    }

    #[test]
    fn test_reset_sentinel_restores_memento() {
        let mut engine = fixtures::building_engine();
        let memento = ResetMemento::capture(&engine);

        engine.set_objects_visible(&ids(&[fixtures::WALL_NORTH]), false);
        engine.set_objects_selected(&ids(&[fixtures::SLAB]), true);
        engine.create_section_plane(DVec3::ZERO, DVec3::Z);
        engine.set_camera(CameraState::default().with_pose(DVec3::ONE, DVec3::ZERO, DVec3::Z));

        let report = load_viewpoint(
            &mut engine,
            &ViewpointRequest::from_json(r#""RESET""#).unwrap(),
            &LoadOptions::default(),
            Some(&memento),
            None,
        );
        assert!(report.reset);
        assert!(engine.is_visible(fixtures::WALL_NORTH));
        assert!(!engine.is_visible(fixtures::SPACE));
        assert!(engine.selected_object_ids().is_empty());
        assert!(engine.section_planes().is_empty());
        assert_eq!(engine.camera(), memento.camera);
    }

    #[test]
    fn test_reset_sentinel_without_memento() {
        let mut engine = fixtures::building_engine();
        engine.set_objects_visible(&ids(&[fixtures::WALL_NORTH]), false);
        engine.set_camera(CameraState::default().with_pose(DVec3::ONE, DVec3::ZERO, DVec3::Z));

        load_viewpoint(&mut engine, &ViewpointRequest::Reset, &LoadOptions::default(), None, None);
        assert!(engine.is_visible(fixtures::WALL_NORTH));
        assert!(!engine.is_visible(fixtures::OPENING));
        assert_eq!(engine.camera(), CameraState::default());
    }

    #[test]
    fn test_fly_calls_done_on_landing() {
        let mut engine = fixtures::building_engine();
        let landed = Rc::new(Cell::new(false));
        let flag = landed.clone();
        let vp = BcfViewpoint {
            perspective_camera: Some(perspective([0.0, 0.0, 0.0], [1.0, 1.0, 2.0])),
            ..Default::default()
        };
        load_viewpoint(
            &mut engine,
            &ViewpointRequest::from(vp),
            &LoadOptions {
                immediate: false,
                ..no_ray_cast()
            },
            None,
            Some(Box::new(move || flag.set(true))),
        );
        assert!(!landed.get());
        engine.complete_flights();
        assert!(landed.get());
        assert_eq!(engine.camera().look, DVec3::new(1.0, 1.0, 2.0));
    }

    #[test]
    fn test_round_trip_keeps_spaces_and_openings() {
        let mut engine = fixtures::building_engine();
        let all = engine.object_ids();
        engine.set_objects_visible(&all, true);
        engine.set_objects_visible(&ids(&[fixtures::WALL_NORTH]), false);

        let vp = save_viewpoint(&mut engine, &SaveOptions::default());

        engine.set_objects_visible(&all, true);
        load(&mut engine, vp, &no_ray_cast());

        let hidden: Vec<ObjectId> = engine
            .object_ids()
            .into_iter()
            .filter(|id| !engine.is_visible(id))
            .collect();
        assert_eq!(hidden, ids(&[fixtures::WALL_NORTH]));
    }

    #[test]
    fn test_forced_hint_applies_only_to_its_type() {
        let mut engine = fixtures::building_engine();
        let all = engine.object_ids();
        engine.set_objects_visible(&all, true);
        engine.set_objects_visible(&ids(&[fixtures::WALL_NORTH]), false);

        let vp = save_viewpoint(
            &mut engine,
            &SaveOptions {
                spaces_visible: Some(false),
                ..Default::default()
            },
        );
        assert!(engine.is_visible(fixtures::SPACE));

        engine.set_objects_visible(&all, true);
        load(&mut engine, vp, &no_ray_cast());
        assert!(!engine.is_visible(fixtures::SPACE));
        assert!(engine.is_visible(fixtures::OPENING));
        assert!(!engine.is_visible(fixtures::WALL_NORTH));
        assert!(engine.is_visible(fixtures::WALL_SOUTH));
    }

    #[test]
    fn test_missing_object_warned_once_across_lists() {
        let ghost = || Component {
            ifc_guid: Some("ghost-guid".into()),
            ..Default::default()
        };
        let vp = BcfViewpoint {
            components: Some(Components {
                visibility: Some(Visibility {
                    default_visibility: true,
                    exceptions: vec![ghost(), guid_component(fixtures::WALL_NORTH)],
                    view_setup_hints: None,
                }),
                selection: vec![ghost()],
                coloring: vec![Coloring {
                    color: "ff0000".into(),
                    components: vec![ghost(), guid_component(fixtures::SLAB)],
                }],
            }),
            ..Default::default()
        };

        let recorder = WarnRecorder::default();
        let subscriber = tracing_subscriber::registry().with(recorder.clone());
        let mut engine = fixtures::building_engine();
        let report = tracing::subscriber::with_default(subscriber, || {
            load(&mut engine, vp, &no_ray_cast())
        });

        assert_eq!(report.missing, vec!["ghost-guid".to_string()]);
        let warnings = recorder.0.lock().unwrap();
        let ghost_warnings = warnings.iter().filter(|m| m.contains("ghost-guid")).count();
        assert_eq!(ghost_warnings, 1);
        assert!(!engine.is_visible(fixtures::WALL_NORTH));
        assert_eq!(engine.colorize(fixtures::SLAB), Some([1.0, 0.0, 0.0]));
    }

    #[test]
    fn test_zero_direction_keeps_current_view_direction() {
        let mut engine = fixtures::building_engine();
        engine.set_camera(CameraState::default());
        let vp = BcfViewpoint {
            perspective_camera: Some(perspective([5.0, 5.0, 20.0], [0.0, 0.0, 0.0])),
            ..Default::default()
        };
        load(&mut engine, vp, &LoadOptions::default());

        let cam = engine.camera();
        assert_eq!(cam.eye, DVec3::new(5.0, 5.0, 20.0));
        assert!(cam.look.is_finite());
        // Straight down onto the upper slab
        assert!((cam.look - DVec3::new(5.0, 5.0, 3.0)).length() < 1e-9);
    }
}
