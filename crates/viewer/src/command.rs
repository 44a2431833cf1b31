//! JSON command protocol for scripting the viewer.
//!
//! One command per JSON object, tagged by `"command"`. Every command answers
//! with a [`CommandResponse`]; failures never abort a batch.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shared::{CameraParams, ModelId, ObjectId, ViewerStateDoc};

use crate::bcf::{LoadOptions, SaveOptions};
use crate::engine::Ray;
use crate::error::ViewerError;
use crate::harness::TestHarness;
use crate::state::ToolId;

fn yes() -> bool {
    true
}

/// A command the viewer can execute
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ViewerCommand {
    // Projects and models
    GetProjects,
    LoadProject {
        project_id: String,
    },
    UnloadProject,
    LoadModel {
        model_id: ModelId,
    },
    UnloadModel {
        model_id: ModelId,
    },
    LoadAllModels,
    UnloadAllModels,
    GetObjectInfo {
        model_id: ModelId,
        object_id: ObjectId,
    },

    // Configs
    SetConfig {
        name: String,
        value: Value,
    },
    SetConfigs {
        configs: BTreeMap<String, Value>,
    },
    GetConfig {
        name: String,
    },

    // Tabs and tools
    OpenTab {
        tab: String,
    },
    /// Open a tab as if the user clicked it
    ClickTab {
        tab: String,
    },
    GetOpenTab,
    ActivateTool {
        tool: ToolId,
        #[serde(default = "yes")]
        active: bool,
    },
    #[serde(rename = "set_3d_enabled")]
    Set3dEnabled {
        enabled: bool,
    },
    SetOrthoEnabled {
        enabled: bool,
    },
    SetFirstPersonEnabled {
        enabled: bool,
    },
    SetControlsEnabled {
        enabled: bool,
    },

    // Objects
    SetObjectsVisible {
        ids: Vec<ObjectId>,
        visible: bool,
    },
    SetAllObjectsVisible {
        visible: bool,
    },
    SetObjectsXrayed {
        ids: Vec<ObjectId>,
        xrayed: bool,
    },
    SetAllObjectsXrayed {
        xrayed: bool,
    },
    SetObjectsSelected {
        ids: Vec<ObjectId>,
        selected: bool,
    },
    SetAllObjectsSelected {
        selected: bool,
    },

    // Camera
    FlyToObject {
        object_id: ObjectId,
    },
    JumpToObject {
        object_id: ObjectId,
    },
    ViewFitObjects {
        ids: Vec<ObjectId>,
    },
    ViewFitAll,
    ViewFitModels {
        model_ids: Vec<ModelId>,
    },
    SetCamera {
        #[serde(flatten)]
        camera: CameraParams,
    },
    /// Land the flight in progress
    CompleteFlights,
    SelectStorey {
        storey_id: ObjectId,
    },
    SetViewerState {
        state: ViewerStateDoc,
    },

    // Viewpoints
    SaveViewpoint {
        #[serde(default)]
        options: SaveOptions,
    },
    /// `viewpoint` is a BCF viewpoint document or the string `"reset"`
    LoadViewpoint {
        viewpoint: Value,
        #[serde(default)]
        options: LoadOptions,
    },
    ResetView,

    // Sections and measurements
    ClearSections,
    DisableSections,
    EnableSections,
    FlipSections,
    GetNumSections,
    ClearMeasurements,
    GetNumMeasurements,

    /// Route a pick ray to the active tool
    Click {
        origin: [f64; 3],
        direction: [f64; 3],
    },
    /// Summary of the viewer state
    Inspect,
    /// Events fired since the last call
    TakeEvents,
}

/// Response from executing a command
#[derive(Debug, Serialize, Deserialize)]
pub struct CommandResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl CommandResponse {
    fn ok() -> Self {
        Self {
            success: true,
            error: None,
            data: None,
        }
    }

    fn ok_with_data(data: Value) -> Self {
        Self {
            success: true,
            error: None,
            data: Some(data),
        }
    }

    fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(msg.into()),
            data: None,
        }
    }
}

impl From<Result<(), ViewerError>> for CommandResponse {
    fn from(result: Result<(), ViewerError>) -> Self {
        match result {
            Ok(()) => Self::ok(),
            Err(e) => Self::err(e.to_string()),
        }
    }
}

fn errors_response(errors: Vec<ViewerError>) -> CommandResponse {
    if errors.is_empty() {
        return CommandResponse::ok();
    }
    let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
    CommandResponse {
        success: false,
        error: Some(messages.join("; ")),
        data: Some(json!({ "errors": messages })),
    }
}

/// Run a server request to completion and capture its outcome
fn await_reply<T: 'static>(
    harness: &mut TestHarness,
    request: impl FnOnce(&mut TestHarness, crate::server::Done<T>, crate::server::Failed),
) -> Result<T, String> {
    let slot = std::rc::Rc::new(std::cell::RefCell::new(None));
    let (ok, fail) = (slot.clone(), slot.clone());
    request(
        harness,
        Box::new(move |v| *ok.borrow_mut() = Some(Ok(v))),
        Box::new(move |msg| *fail.borrow_mut() = Some(Err(msg))),
    );
    harness.settle();
    let outcome = slot.borrow_mut().take();
    outcome.unwrap_or_else(|| Err("No reply from server".to_string()))
}

/// Execute a single command on the harness
pub fn execute_command(harness: &mut TestHarness, cmd: ViewerCommand) -> CommandResponse {
    let viewer = &mut harness.viewer;
    match cmd {
        ViewerCommand::GetProjects => {
            match await_reply(harness, |h, done, error| h.viewer.get_projects_info(done, error)) {
                Ok(info) => CommandResponse::ok_with_data(json!(info)),
                Err(e) => CommandResponse::err(e),
            }
        }

        ViewerCommand::LoadProject { project_id } => match harness.load_project(&project_id) {
            Ok(()) => CommandResponse::ok_with_data(json!({
                "models_loaded": harness.viewer.get_loaded_model_ids(),
            })),
            Err(e) => CommandResponse::err(e),
        },

        ViewerCommand::UnloadProject => {
            viewer.unload_project();
            CommandResponse::ok()
        }

        ViewerCommand::LoadModel { model_id } => match harness.load_model(&model_id) {
            Ok(()) => CommandResponse::ok(),
            Err(e) => CommandResponse::err(e),
        },

        ViewerCommand::UnloadModel { model_id } => viewer.unload_model(&model_id).into(),

        ViewerCommand::LoadAllModels => {
            viewer.load_all_models(None);
            harness.settle();
            CommandResponse::ok_with_data(json!({
                "models_loaded": harness.viewer.get_loaded_model_ids(),
            }))
        }

        ViewerCommand::UnloadAllModels => {
            viewer.unload_all_models();
            CommandResponse::ok()
        }

        ViewerCommand::GetObjectInfo {
            model_id,
            object_id,
        } => {
            let reply = await_reply(harness, |h, done, error| {
                h.viewer.get_object_info(&model_id, &object_id, done, error)
            });
            match reply {
                Ok(info) => CommandResponse::ok_with_data(info),
                Err(e) => CommandResponse::err(e),
            }
        }

        ViewerCommand::SetConfig { name, value } => viewer.set_config(&name, &value).into(),

        ViewerCommand::SetConfigs { configs } => errors_response(viewer.set_configs(&configs)),

        ViewerCommand::GetConfig { name } => match viewer.get_config(&name) {
            Some(value) => CommandResponse::ok_with_data(json!({ "name": name, "value": value })),
            None => CommandResponse::err(format!("Unknown configuration: '{name}'")),
        },

        ViewerCommand::OpenTab { tab } => viewer.open_tab(&tab).into(),

        ViewerCommand::ClickTab { tab } => viewer.click_tab(&tab).into(),

        ViewerCommand::GetOpenTab => {
            CommandResponse::ok_with_data(json!({ "tab": viewer.get_open_tab() }))
        }

        ViewerCommand::ActivateTool { tool, active } => viewer.activate_tool(tool, active).into(),

        ViewerCommand::Set3dEnabled { enabled } => {
            viewer.set_3d_enabled(enabled, None);
            CommandResponse::ok_with_data(json!({ "nav_mode": viewer.nav_mode() }))
        }

        ViewerCommand::SetOrthoEnabled { enabled } => {
            viewer.set_ortho_enabled(enabled, None);
            CommandResponse::ok()
        }

        ViewerCommand::SetFirstPersonEnabled { enabled } => {
            viewer.set_first_person_enabled(enabled);
            CommandResponse::ok_with_data(json!({ "nav_mode": viewer.nav_mode() }))
        }

        ViewerCommand::SetControlsEnabled { enabled } => {
            viewer.set_controls_enabled(enabled);
            CommandResponse::ok()
        }

        ViewerCommand::SetObjectsVisible { ids, visible } => {
            viewer.set_objects_visible(&ids, visible);
            CommandResponse::ok()
        }

        ViewerCommand::SetAllObjectsVisible { visible } => {
            viewer.set_all_objects_visible(visible);
            CommandResponse::ok()
        }

        ViewerCommand::SetObjectsXrayed { ids, xrayed } => {
            viewer.set_objects_xrayed(&ids, xrayed);
            CommandResponse::ok()
        }

        ViewerCommand::SetAllObjectsXrayed { xrayed } => {
            viewer.set_all_objects_xrayed(xrayed);
            CommandResponse::ok()
        }

        ViewerCommand::SetObjectsSelected { ids, selected } => {
            viewer.set_objects_selected(&ids, selected);
            CommandResponse::ok()
        }

        ViewerCommand::SetAllObjectsSelected { selected } => {
            viewer.set_all_objects_selected(selected);
            CommandResponse::ok()
        }

        ViewerCommand::FlyToObject { object_id } => viewer.fly_to_object(&object_id, None).into(),

        ViewerCommand::JumpToObject { object_id } => viewer.jump_to_object(&object_id).into(),

        ViewerCommand::ViewFitObjects { ids } => {
            viewer.view_fit_objects(&ids, None);
            CommandResponse::ok()
        }

        ViewerCommand::ViewFitAll => {
            viewer.view_fit_all(None);
            CommandResponse::ok()
        }

        ViewerCommand::ViewFitModels { model_ids } => {
            viewer.view_fit_models(&model_ids, None);
            CommandResponse::ok()
        }

        ViewerCommand::SetCamera { camera } => {
            viewer.set_camera(&camera);
            CommandResponse::ok()
        }

        ViewerCommand::CompleteFlights => {
            let landed = harness.complete_flights();
            CommandResponse::ok_with_data(json!({ "landed": landed }))
        }

        ViewerCommand::SelectStorey { storey_id } => viewer.select_storey(&storey_id, None).into(),

        ViewerCommand::SetViewerState { state } => {
            errors_response(viewer.set_viewer_state(&state, None))
        }

        ViewerCommand::SaveViewpoint { options } => {
            let viewpoint = viewer.save_bcf_viewpoint(&options);
            CommandResponse::ok_with_data(json!(viewpoint))
        }

        ViewerCommand::LoadViewpoint { viewpoint, options } => {
            match viewer.load_bcf_viewpoint_json(&viewpoint, &options) {
                Ok(report) => CommandResponse::ok_with_data(json!(report)),
                Err(e) => CommandResponse::err(e.to_string()),
            }
        }

        ViewerCommand::ResetView => {
            let report = viewer.reset_view();
            CommandResponse::ok_with_data(json!(report))
        }

        ViewerCommand::ClearSections => {
            viewer.clear_sections();
            CommandResponse::ok()
        }

        ViewerCommand::DisableSections => {
            viewer.disable_sections();
            CommandResponse::ok()
        }

        ViewerCommand::EnableSections => {
            viewer.enable_sections();
            CommandResponse::ok()
        }

        ViewerCommand::FlipSections => {
            viewer.flip_sections();
            CommandResponse::ok()
        }

        ViewerCommand::GetNumSections => {
            CommandResponse::ok_with_data(json!({ "count": viewer.get_num_sections() }))
        }

        ViewerCommand::ClearMeasurements => {
            viewer.clear_measurements();
            CommandResponse::ok()
        }

        ViewerCommand::GetNumMeasurements => {
            CommandResponse::ok_with_data(json!({ "count": viewer.get_num_measurements() }))
        }

        ViewerCommand::Click { origin, direction } => {
            let ray = Ray::new(
                glam::DVec3::from_array(origin),
                glam::DVec3::from_array(direction),
            );
            let outcome = viewer.click(&ray);
            CommandResponse::ok_with_data(json!(outcome))
        }

        ViewerCommand::Inspect => CommandResponse::ok_with_data(harness.inspect()),

        ViewerCommand::TakeEvents => {
            let events = harness.take_events();
            CommandResponse::ok_with_data(json!({ "events": events }))
        }
    }
}

/// Parse and execute a single JSON command string
pub fn execute_json(harness: &mut TestHarness, json: &str) -> Result<CommandResponse, String> {
    let cmd: ViewerCommand =
        serde_json::from_str(json).map_err(|e| format!("Invalid command JSON: {e}"))?;
    Ok(execute_command(harness, cmd))
}

/// Parse and execute multiple JSON commands (array)
pub fn execute_json_batch(
    harness: &mut TestHarness,
    json: &str,
) -> Result<Vec<CommandResponse>, String> {
    let cmds: Vec<ViewerCommand> =
        serde_json::from_str(json).map_err(|e| format!("Invalid commands JSON: {e}"))?;
    Ok(cmds
        .into_iter()
        .map(|cmd| execute_command(harness, cmd))
        .collect())
}
