//! Integration tests for the ViewerCommand JSON protocol.
//!
//! Tests the full command pipeline: JSON string -> parse -> execute -> response.

use bim_viewer_lib::command::{execute_json, execute_json_batch};
use bim_viewer_lib::fixtures;
use bim_viewer_lib::harness::TestHarness;

fn loaded() -> TestHarness {
    let mut h = TestHarness::new();
    h.load_project(fixtures::PROJECT_ID).unwrap();
    h
}

#[test]
fn test_command_config_rejection_in_batch() {
    let mut h = TestHarness::new();

    let json = r#"[
        {"command": "set_config", "name": "doesNotExist", "value": 1},
        {"command": "set_config", "name": "saoEnabled", "value": true},
        {"command": "get_config", "name": "doesNotExist"},
        {"command": "get_config", "name": "saoEnabled"}
    ]"#;

    let responses = execute_json_batch(&mut h, json).unwrap();
    assert_eq!(responses.len(), 4);
    assert!(!responses[0].success);
    assert!(responses[1].success, "Failed: {:?}", responses[1].error);
    assert!(!responses[2].success);
    assert_eq!(responses[3].data.as_ref().unwrap()["value"], true);
}

#[test]
fn test_command_set_configs_reports_each_failure() {
    let mut h = TestHarness::new();

    let json = r#"{"command": "set_configs", "configs": {
        "cameraNear": -5,
        "edgesEnabled": false,
        "backgroundColor": [2.0, 0.0, 0.0]
    }}"#;

    let resp = execute_json(&mut h, json).unwrap();
    assert!(!resp.success);
    let errors = resp.data.unwrap()["errors"].as_array().unwrap().len();
    assert_eq!(errors, 2);
    assert_eq!(
        h.viewer.get_config("edgesEnabled"),
        Some(serde_json::Value::Bool(false))
    );
}

#[test]
fn test_command_modal_tools_stay_exclusive() {
    let mut h = loaded();
    let sequence = ["hide", "select", "section", "marquee", "measure_distance", "select", "measure_angle"];

    for tool in sequence {
        let json = format!(r#"{{"command": "activate_tool", "tool": "{tool}"}}"#);
        let resp = execute_json(&mut h, &json).unwrap();
        assert!(resp.success, "Failed: {:?}", resp.error);

        let data = execute_json(&mut h, r#"{"command": "inspect"}"#)
            .unwrap()
            .data
            .unwrap();
        let active_modal: Vec<_> = data["tools"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|t| t["active"] == true)
            .filter(|t| {
                matches!(
                    t["id"].as_str(),
                    Some("hide" | "select" | "marquee" | "section" | "measure_distance" | "measure_angle")
                )
            })
            .map(|t| t["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(active_modal, vec![tool.to_string()]);
    }
}

#[test]
fn test_command_tabs_exclusive() {
    let mut h = loaded();

    for tab in ["models", "objects", "classes", "storeys"] {
        let json = format!(r#"{{"command": "click_tab", "tab": "{tab}"}}"#);
        assert!(execute_json(&mut h, &json).unwrap().success);

        let resp = execute_json(&mut h, r#"{"command": "get_open_tab"}"#).unwrap();
        assert_eq!(resp.data.unwrap()["tab"], tab);
    }

    let resp = execute_json(&mut h, r#"{"command": "open_tab", "tab": "bogus"}"#).unwrap();
    assert!(!resp.success);
    let resp = execute_json(&mut h, r#"{"command": "get_open_tab"}"#).unwrap();
    assert_eq!(resp.data.unwrap()["tab"], "storeys");
}

#[test]
fn test_command_plan_view_workflow() {
    let mut h = loaded();

    let json = r#"[
        {"command": "activate_tool", "tool": "marquee"},
        {"command": "set_3d_enabled", "enabled": false},
        {"command": "activate_tool", "tool": "marquee"},
        {"command": "set_first_person_enabled", "enabled": true},
        {"command": "set_first_person_enabled", "enabled": false},
        {"command": "set_3d_enabled", "enabled": true}
    ]"#;

    let responses = execute_json_batch(&mut h, json).unwrap();
    assert!(responses[0].success);
    assert_eq!(responses[1].data.as_ref().unwrap()["nav_mode"], "planView");
    // marquee is disabled in plan view
    assert!(!responses[2].success);
    assert_eq!(responses[3].data.as_ref().unwrap()["nav_mode"], "firstPerson");
    assert_eq!(responses[4].data.as_ref().unwrap()["nav_mode"], "planView");
    assert_eq!(responses[5].data.as_ref().unwrap()["nav_mode"], "orbit");
}

#[test]
fn test_command_load_all_models() {
    let mut h = loaded();

    let resp = execute_json(&mut h, r#"{"command": "load_all_models"}"#).unwrap();
    assert!(resp.success);
    let loaded = resp.data.unwrap()["models_loaded"].as_array().unwrap().len();
    assert_eq!(loaded, 2);
    assert!(h.is_visible(fixtures::COLUMN));

    let resp = execute_json(
        &mut h,
        r#"{"command": "load_model", "model_id": "design"}"#,
    )
    .unwrap();
    assert!(!resp.success);
    assert!(resp.error.unwrap().contains("already loaded"));
}

#[test]
fn test_command_unload_everything_disables_controls() {
    let mut h = loaded();

    let json = r#"[
        {"command": "open_tab", "tab": "objects"},
        {"command": "unload_all_models"},
        {"command": "inspect"}
    ]"#;

    let responses = execute_json_batch(&mut h, json).unwrap();
    let data = responses[2].data.as_ref().unwrap();
    assert_eq!(data["open_tab"], "models");
    assert_eq!(data["controls_enabled"], false);
    assert_eq!(data["object_count"], 0);

    let resp = execute_json(&mut h, r#"{"command": "click_tab", "tab": "objects"}"#).unwrap();
    assert!(!resp.success);
}

#[test]
fn test_command_sections_and_measurements() {
    let mut h = loaded();

    let json = r#"[
        {"command": "activate_tool", "tool": "section"},
        {"command": "click", "origin": [5.0, 5.0, 100.0], "direction": [0.0, 0.0, -1.0]},
        {"command": "get_num_sections"},
        {"command": "activate_tool", "tool": "measure_distance"},
        {"command": "click", "origin": [1.0, 1.0, 100.0], "direction": [0.0, 0.0, -1.0]},
        {"command": "click", "origin": [4.0, 5.0, 100.0], "direction": [0.0, 0.0, -1.0]},
        {"command": "get_num_measurements"},
        {"command": "clear_sections"},
        {"command": "clear_measurements"},
        {"command": "get_num_sections"},
        {"command": "get_num_measurements"}
    ]"#;

    let responses = execute_json_batch(&mut h, json).unwrap();
    for resp in &responses {
        assert!(resp.success, "Failed: {:?}", resp.error);
    }
    assert_eq!(responses[1].data.as_ref().unwrap()["outcome"], "section_created");
    assert_eq!(responses[2].data.as_ref().unwrap()["count"], 1);
    let measurement = &responses[5].data.as_ref().unwrap()["measurement"];
    assert_eq!(measurement["length"], 5.0);
    assert_eq!(responses[6].data.as_ref().unwrap()["count"], 1);
    assert_eq!(responses[9].data.as_ref().unwrap()["count"], 0);
    assert_eq!(responses[10].data.as_ref().unwrap()["count"], 0);
}

#[test]
fn test_command_select_storey_and_events() {
    let mut h = loaded();
    h.take_events();

    let json = format!(
        r#"[
            {{"command": "select_storey", "storey_id": "{}"}},
            {{"command": "select_storey", "storey_id": "{}"}},
            {{"command": "take_events"}}
        ]"#,
        fixtures::STOREY_1,
        fixtures::WALL_NORTH
    );

    let responses = execute_json_batch(&mut h, &json).unwrap();
    assert!(responses[0].success);
    assert!(!responses[1].success);
    assert!(h.is_visible(fixtures::WALL_NORTH));
    assert!(!h.is_visible(fixtures::WALL_UPPER));
    assert!(responses[2].data.as_ref().unwrap()["events"].is_array());
}
