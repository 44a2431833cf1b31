use std::collections::BTreeMap;

use shared::bcf::{
    BcfPoint, BcfViewpoint, ClippingPlane, Coloring, Component, Components, OrthogonalCamera,
    PerspectiveCamera, Snapshot, ViewSetupHints, Visibility,
};
use shared::{ObjectId, IFC_OPENING, IFC_SPACE, IFC_SPACE_BOUNDARY};

use super::{color_to_hex, entities_of_type, SaveOptions};
use crate::engine::{Engine, Projection};

/// Capture the current engine state as a viewpoint.
///
/// The only mutation is the temporary visibility forcing requested by the
/// `*_visible` options, which is undone before returning.
pub fn save_viewpoint<E: Engine + ?Sized>(engine: &mut E, options: &SaveOptions) -> BcfViewpoint {
    let camera = engine.camera();
    let eye = BcfPoint::from_array(camera.eye.to_array());
    let direction = BcfPoint::from_array(camera.direction().to_array());
    let up = BcfPoint::from_array(camera.up.to_array());

    let (perspective_camera, orthogonal_camera) = match camera.projection {
        Projection::Perspective => (
            Some(PerspectiveCamera {
                camera_view_point: eye,
                camera_direction: direction,
                camera_up_vector: up,
                field_of_view: camera.fov,
            }),
            None,
        ),
        Projection::Ortho => (
            None,
            Some(OrthogonalCamera {
                camera_view_point: eye,
                camera_direction: direction,
                camera_up_vector: up,
                view_to_world_scale: camera.ortho_scale,
            }),
        ),
    };

    let clipping_planes = engine
        .section_planes()
        .into_iter()
        .map(|plane| {
            let dir = if options.reverse_clipping_planes {
                -plane.dir
            } else {
                plane.dir
            };
            ClippingPlane {
                location: BcfPoint::from_array(plane.pos.to_array()),
                direction: BcfPoint::from_array(dir.to_array()),
            }
        })
        .collect();

    let snapshot = if options.snapshot {
        engine.snapshot().map(|data| Snapshot {
            snapshot_type: "png".to_string(),
            snapshot_data: data,
        })
    } else {
        None
    };

    let visibility = with_forced_visibility(engine, options, |engine| {
        let default_visibility = !options.default_invisible;
        let exceptions = engine
            .object_ids()
            .into_iter()
            .filter(|id| engine.is_visible(id) != default_visibility)
            .map(|id| component(engine, &id, options))
            .collect();
        Visibility {
            default_visibility,
            exceptions,
            view_setup_hints: view_setup_hints(options, default_visibility),
        }
    });

    let selection = engine
        .selected_object_ids()
        .into_iter()
        .map(|id| component(engine, &id, options))
        .collect();

    let coloring = collect_coloring(engine, options);

    BcfViewpoint {
        guid: Some(uuid::Uuid::new_v4().to_string()),
        perspective_camera,
        orthogonal_camera,
        lines: Vec::new(),
        clipping_planes,
        bitmaps: Vec::new(),
        snapshot,
        components: Some(Components {
            visibility: Some(visibility),
            selection,
            coloring,
        }),
    }
}

/// Hints only when a type was forced; unforced types carry the default
fn view_setup_hints(options: &SaveOptions, default_visibility: bool) -> Option<ViewSetupHints> {
    let forced = [
        options.spaces_visible,
        options.space_boundaries_visible,
        options.openings_visible,
    ];
    if forced.iter().all(Option::is_none) {
        return None;
    }
    Some(ViewSetupHints {
        spaces_visible: options.spaces_visible.unwrap_or(default_visibility),
        space_boundaries_visible: options.space_boundaries_visible.unwrap_or(default_visibility),
        openings_visible: options.openings_visible.unwrap_or(default_visibility),
    })
}

fn component<E: Engine + ?Sized>(engine: &E, id: &str, options: &SaveOptions) -> Component {
    Component::new(engine.external_id_of(id), &options.originating_system, id)
}

/// Run `f` with hinted types forced to the requested visibility, then put
/// their previous visibility back
fn with_forced_visibility<E: Engine + ?Sized, R>(
    engine: &mut E,
    options: &SaveOptions,
    f: impl FnOnce(&E) -> R,
) -> R {
    let forced = [
        (IFC_SPACE, options.spaces_visible),
        (IFC_SPACE_BOUNDARY, options.space_boundaries_visible),
        (IFC_OPENING, options.openings_visible),
    ];

    let mut previous: Vec<(ObjectId, bool)> = Vec::new();
    for (ifc_type, visible) in forced {
        let Some(visible) = visible else { continue };
        let ids = entities_of_type(&*engine, ifc_type);
        previous.extend(ids.iter().map(|id| (id.clone(), engine.is_visible(id))));
        engine.set_objects_visible(&ids, visible);
    }

    let result = f(&*engine);

    for (id, was_visible) in previous {
        engine.set_objects_visible(std::slice::from_ref(&id), was_visible);
    }
    result
}

/// Colorized objects grouped by color, plus x-rayed objects with zero alpha
fn collect_coloring<E: Engine + ?Sized>(engine: &E, options: &SaveOptions) -> Vec<Coloring> {
    let mut groups: BTreeMap<String, Vec<Component>> = BTreeMap::new();
    for id in engine.object_ids() {
        let colorize = engine.colorize(&id);
        let xrayed = options.xray_as_zero_alpha && engine.is_xrayed(&id);
        let color = match (colorize, xrayed) {
            (c, true) => format!("00{}", color_to_hex(c.unwrap_or([1.0, 1.0, 1.0]))),
            (Some(c), false) => color_to_hex(c),
            (None, false) => continue,
        };
        groups
            .entry(color)
            .or_default()
            .push(component(engine, &id, options));
    }
    groups
        .into_iter()
        .map(|(color, components)| Coloring { color, components })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{CameraState, HeadlessEngine};
    use crate::fixtures;
    use glam::DVec3;

    fn ids(v: &[&str]) -> Vec<ObjectId> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn exception_guids(vp: &BcfViewpoint) -> Vec<String> {
        vp.visibility()
            .unwrap()
            .exceptions
            .iter()
            .filter_map(|c| c.ifc_guid.clone())
            .collect()
    }

    #[test]
    fn test_direction_is_look_minus_eye() {
        let mut engine = HeadlessEngine::new();
        engine.set_camera(CameraState::default().with_pose(
            DVec3::ZERO,
            DVec3::new(1.0, 1.0, 2.0),
            DVec3::Z,
        ));
        let vp = save_viewpoint(&mut engine, &SaveOptions::default());
        let cam = vp.perspective_camera.unwrap();
        assert_eq!(cam.camera_direction, BcfPoint::new(1.0, 1.0, 2.0));
        assert_eq!(cam.camera_view_point, BcfPoint::new(0.0, 0.0, 0.0));
        assert_eq!(cam.camera_up_vector, BcfPoint::new(0.0, 0.0, 1.0));
        assert!(vp.orthogonal_camera.is_none());
        assert!(vp.guid.is_some());
    }

    #[test]
    fn test_direction_offset_eye() {
        let mut engine = HeadlessEngine::new();
        engine.set_camera(CameraState::default().with_pose(
            DVec3::new(10.0, 0.0, 0.0),
            DVec3::new(11.0, 1.0, 2.0),
            DVec3::Z,
        ));
        let vp = save_viewpoint(&mut engine, &SaveOptions::default());
        assert_eq!(
            vp.perspective_camera.unwrap().camera_direction,
            BcfPoint::new(1.0, 1.0, 2.0)
        );
    }

    #[test]
    fn test_ortho_camera() {
        let mut engine = HeadlessEngine::new();
        let mut cam = CameraState::default();
        cam.projection = Projection::Ortho;
        cam.ortho_scale = 42.0;
        engine.set_camera(cam);
        let vp = save_viewpoint(&mut engine, &SaveOptions::default());
        assert!(vp.perspective_camera.is_none());
        assert_eq!(vp.orthogonal_camera.unwrap().view_to_world_scale, 42.0);
    }

    #[test]
    fn test_exceptions_follow_default_visibility() {
        let mut engine = fixtures::building_engine();
        engine.set_objects_visible(&ids(&[fixtures::WALL_NORTH]), false);

        let vp = save_viewpoint(&mut engine, &SaveOptions::default());
        let vis = vp.visibility().unwrap();
        assert!(vis.default_visibility);
        let guids = exception_guids(&vp);
        assert!(guids.contains(&fixtures::guid(fixtures::WALL_NORTH)));
        // spaces and openings load hidden
        assert!(guids.contains(&fixtures::guid(fixtures::SPACE)));
        assert!(!guids.contains(&fixtures::guid(fixtures::WALL_SOUTH)));

        let vp = save_viewpoint(
            &mut engine,
            &SaveOptions {
                default_invisible: true,
                ..Default::default()
            },
        );
        let guids = exception_guids(&vp);
        assert!(!vp.visibility().unwrap().default_visibility);
        assert!(guids.contains(&fixtures::guid(fixtures::WALL_SOUTH)));
        assert!(!guids.contains(&fixtures::guid(fixtures::WALL_NORTH)));
    }

    #[test]
    fn test_forced_space_visibility_is_reverted() {
        let mut engine = fixtures::building_engine();
        assert!(!engine.is_visible(fixtures::SPACE));

        let vp = save_viewpoint(
            &mut engine,
            &SaveOptions {
                spaces_visible: Some(true),
                ..Default::default()
            },
        );
        assert!(!exception_guids(&vp).contains(&fixtures::guid(fixtures::SPACE)));
        let hints = vp.visibility().unwrap().view_setup_hints.unwrap();
        assert!(hints.spaces_visible);
        // unforced types carry the default visibility
        assert!(hints.openings_visible);
        assert!(!engine.is_visible(fixtures::SPACE));
    }

    #[test]
    fn test_no_hints_unless_forced() {
        let mut engine = fixtures::building_engine();
        let vp = save_viewpoint(&mut engine, &SaveOptions::default());
        assert!(vp.visibility().unwrap().view_setup_hints.is_none());
    }

    #[test]
    fn test_selection_and_components() {
        let mut engine = fixtures::building_engine();
        engine.set_objects_selected(&ids(&[fixtures::SLAB]), true);
        let vp = save_viewpoint(&mut engine, &SaveOptions::default());
        let sel = vp.selection();
        assert_eq!(sel.len(), 1);
        assert_eq!(sel[0].ifc_guid, Some(fixtures::guid(fixtures::SLAB)));
        assert_eq!(sel[0].authoring_tool_id.as_deref(), Some(fixtures::SLAB));
        assert_eq!(sel[0].originating_system.as_deref(), Some("bim-viewer"));
    }

    #[test]
    fn test_clipping_planes_reversed() {
        let mut engine = HeadlessEngine::new();
        engine.create_section_plane(DVec3::new(1.0, 2.0, 3.0), DVec3::NEG_Z);

        let vp = save_viewpoint(&mut engine, &SaveOptions::default());
        assert_eq!(vp.clipping_planes[0].direction, BcfPoint::new(0.0, 0.0, -1.0));
        assert_eq!(vp.clipping_planes[0].location, BcfPoint::new(1.0, 2.0, 3.0));

        let vp = save_viewpoint(
            &mut engine,
            &SaveOptions {
                reverse_clipping_planes: true,
                ..Default::default()
            },
        );
        assert_eq!(vp.clipping_planes[0].direction, BcfPoint::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_snapshot_embedding() {
        let mut engine = HeadlessEngine::new();
        engine.set_snapshot(Some("data:image/png;base64,AAAA".into()));
        let vp = save_viewpoint(&mut engine, &SaveOptions::default());
        assert_eq!(vp.snapshot.unwrap().snapshot_type, "png");

        let vp = save_viewpoint(
            &mut engine,
            &SaveOptions {
                snapshot: false,
                ..Default::default()
            },
        );
        assert!(vp.snapshot.is_none());
    }

    #[test]
    fn test_coloring_grouped_by_color() {
        let mut engine = fixtures::building_engine();
        engine.set_objects_colorized(&ids(&[fixtures::WALL_NORTH, fixtures::WALL_SOUTH]), Some([1.0, 0.0, 0.0]));
        engine.set_objects_xrayed(&ids(&[fixtures::SLAB]), true);

        let vp = save_viewpoint(
            &mut engine,
            &SaveOptions {
                xray_as_zero_alpha: true,
                ..Default::default()
            },
        );
        let coloring = &vp.components.as_ref().unwrap().coloring;
        assert_eq!(coloring.len(), 2);
        let red = coloring.iter().find(|c| c.color == "ff0000").unwrap();
        assert_eq!(red.components.len(), 2);
        let xray = coloring.iter().find(|c| c.color == "00ffffff").unwrap();
        assert_eq!(xray.components[0].authoring_tool_id.as_deref(), Some(fixtures::SLAB));
    }
}
