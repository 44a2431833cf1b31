//! Integration tests for saving and loading BCF viewpoints through the viewer.

use bim_viewer_lib::bcf::{LoadOptions, SaveOptions};
use bim_viewer_lib::engine::Engine;
use bim_viewer_lib::events::ViewerEvent;
use bim_viewer_lib::fixtures;
use bim_viewer_lib::harness::TestHarness;
use glam::DVec3;
use serde_json::json;
use shared::{CameraParams, ObjectId, ViewpointRequest};

fn loaded() -> TestHarness {
    let mut h = TestHarness::new();
    h.load_project(fixtures::PROJECT_ID).unwrap();
    h
}

fn ids(v: &[&str]) -> Vec<ObjectId> {
    v.iter().map(|s| s.to_string()).collect()
}

fn hidden(h: &TestHarness) -> Vec<ObjectId> {
    let engine = h.viewer.engine();
    engine
        .object_ids()
        .into_iter()
        .filter(|id| !engine.is_visible(id))
        .collect()
}

#[test]
fn test_viewpoint_visibility_round_trip() {
    let mut h = loaded();
    h.viewer
        .set_objects_visible(&ids(&[fixtures::WALL_NORTH, fixtures::SLAB_2]), false);
    let expected = hidden(&h);
    assert!(expected.contains(&fixtures::WALL_NORTH.to_string()));

    let vp = h.viewer.save_bcf_viewpoint(&SaveOptions::default());

    h.viewer.set_all_objects_visible(true);
    assert!(hidden(&h).is_empty());

    let report = h
        .viewer
        .load_bcf_viewpoint(&vp.into(), &LoadOptions::default(), None);
    assert!(report.missing.is_empty());
    assert_eq!(hidden(&h), expected);
}

#[test]
fn test_viewpoint_direction_is_relative() {
    let mut h = loaded();
    h.viewer.set_camera(&CameraParams {
        eye: Some([0.0, 0.0, 0.0]),
        look: Some([1.0, 1.0, 2.0]),
        up: Some([0.0, 0.0, 1.0]),
    });

    let vp = h.viewer.save_bcf_viewpoint(&SaveOptions::default());
    let doc = serde_json::to_value(&vp).unwrap();
    assert_eq!(
        doc["perspective_camera"]["camera_direction"],
        json!({"x": 1.0, "y": 1.0, "z": 2.0})
    );

    h.viewer.set_camera(&CameraParams {
        eye: Some([30.0, 30.0, 30.0]),
        look: Some([0.0, 0.0, 0.0]),
        up: Some([0.0, 0.0, 1.0]),
    });
    let options = LoadOptions {
        ray_cast: false,
        ..Default::default()
    };
    let report = h
        .viewer
        .load_bcf_viewpoint_json(&doc, &options)
        .unwrap();
    assert!(report.camera_applied);

    let cam = h.viewer.engine().camera();
    assert_eq!(cam.eye, DVec3::ZERO);
    assert_eq!(cam.look, DVec3::new(1.0, 1.0, 2.0));
    assert_eq!(cam.up, DVec3::Z);
}

#[test]
fn test_viewpoint_partial_application() {
    let mut h = loaded();
    let doc = json!({
        "perspective_camera": {
            "camera_view_point": {"x": 5.0, "y": -20.0, "z": 5.0},
            "camera_direction": {"x": 0.0, "y": 1.0, "z": 0.0},
            "camera_up_vector": {"x": 0.0, "y": 0.0, "z": 1.0},
            "field_of_view": 60.0
        },
        "components": {
            "visibility": {
                "default_visibility": true,
                "exceptions": [
                    {"ifc_guid": fixtures::guid(fixtures::WALL_SOUTH)},
                    {"ifc_guid": "ghost-guid"},
                    {"ifc_guid": "ghost-guid"}
                ]
            },
            "selection": [
                {"ifc_guid": fixtures::guid(fixtures::SLAB)},
                {"ifc_guid": "ghost-guid"}
            ]
        }
    });

    let report = h
        .viewer
        .load_bcf_viewpoint_json(&doc, &LoadOptions::default())
        .unwrap();
    assert_eq!(report.missing, vec!["ghost-guid"]);
    assert!(!h.is_visible(fixtures::WALL_SOUTH));
    assert!(h.is_visible(fixtures::WALL_NORTH));
    assert!(h.viewer.engine().is_selected(fixtures::SLAB));
    assert!(h.events().contains(&ViewerEvent::ViewpointLoaded));
}

#[test]
fn test_viewpoint_composite_objects_expand() {
    let mut h = loaded();
    let doc = json!({
        "components": {
            "visibility": {
                "default_visibility": true,
                "exceptions": [{"ifc_guid": fixtures::guid(fixtures::STOREY_2)}]
            }
        }
    });

    let flat = LoadOptions {
        update_composite_objects: false,
        ..Default::default()
    };
    h.viewer.load_bcf_viewpoint_json(&doc, &flat).unwrap();
    assert!(h.is_visible(fixtures::WALL_UPPER));

    let composite = LoadOptions {
        update_composite_objects: true,
        ..Default::default()
    };
    h.viewer.load_bcf_viewpoint_json(&doc, &composite).unwrap();
    assert!(!h.is_visible(fixtures::WALL_UPPER));
    assert!(!h.is_visible(fixtures::SLAB_2));
    assert!(h.is_visible(fixtures::WALL_NORTH));
}

#[test]
fn test_viewpoint_reset_sentinel() {
    let mut h = loaded();
    let initial = h.viewer.engine().camera();

    let json = r#"[
        {"command": "activate_tool", "tool": "section"},
        {"command": "click", "origin": [5.0, 5.0, 100.0], "direction": [0.0, 0.0, -1.0]},
        {"command": "set_all_objects_xrayed", "xrayed": true},
        {"command": "set_objects_visible", "ids": ["storey-1"], "visible": false},
        {"command": "set_camera", "eye": [40.0, 40.0, 40.0]}
    ]"#;
    let responses = bim_viewer_lib::command::execute_json_batch(&mut h, json).unwrap();
    assert!(responses.iter().all(|r| r.success));
    assert_eq!(h.viewer.get_num_sections(), 1);

    for sentinel in ["reset", "RESET"] {
        let report = h
            .viewer
            .load_bcf_viewpoint_json(&json!(sentinel), &LoadOptions::default())
            .unwrap();
        assert!(report.reset);
    }
    assert_eq!(h.viewer.get_num_sections(), 0);
    assert!(h.viewer.engine().xrayed_object_ids().is_empty());
    assert!(h.is_visible(fixtures::WALL_NORTH));
    assert!(!h.is_visible(fixtures::SPACE));
    assert_eq!(h.viewer.engine().camera(), initial);
    assert!(h.events().contains(&ViewerEvent::Reset));

    assert!(h
        .viewer
        .load_bcf_viewpoint_json(&json!("Reset"), &LoadOptions::default())
        .is_err());
}

#[test]
fn test_viewpoint_ortho_keeps_toolbar_in_sync() {
    let mut h = loaded();
    let doc = json!({
        "orthogonal_camera": {
            "camera_view_point": {"x": 5.0, "y": 5.0, "z": 50.0},
            "camera_direction": {"x": 0.0, "y": 0.0, "z": -1.0},
            "camera_up_vector": {"x": 0.0, "y": 1.0, "z": 0.0},
            "view_to_world_scale": 12.0
        }
    });
    let request = ViewpointRequest::from_value(doc).unwrap();
    h.viewer
        .load_bcf_viewpoint(&request, &LoadOptions::default(), None);

    assert!(h.viewer.get_ortho_enabled());
    assert!(h
        .viewer
        .toolbar()
        .is_active(bim_viewer_lib::state::ToolId::Ortho));
    assert_eq!(h.viewer.engine().camera().ortho_scale, 12.0);
}
