//! Viewer façade.
//!
//! [`BimViewer`] owns the engine, the server and every piece of UI state, and
//! is the only place where they meet. Toggle tools (3D, ortho, first person,
//! show spaces) mirror state that lives elsewhere: the navigation mediator,
//! the camera projection, and the spaces flag. They are re-synced whenever
//! controls are enabled.

use std::collections::BTreeMap;

use glam::DVec3;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::{
    BcfViewpoint, CameraParams, ModelId, ObjectId, ProjectInfo, ProjectsInfo, ViewerStateDoc,
    ViewpointRequest, IFC_BUILDING_STOREY, IFC_SPACE,
};
use tracing::{debug, error, info, warn};

use crate::bcf::{self, entities_of_type, LoadOptions, LoadReport, ResetMemento, SaveOptions};
use crate::engine::{
    Aabb, CameraState, Engine, EngineSetting, FlightDone, FlightTarget, NavMode, Projection, Ray,
};
use crate::error::ViewerError;
use crate::events::{Emitter, SubscriptionId, ViewerEvent};
use crate::models::{Callback, ModelsEvent, ModelsExplorer, Step};
use crate::server::{Done, Failed, Server};
use crate::state::{
    ActivationSource, ClickOutcome, ConfigKey, ConfigStore, ConfigTarget, ExplorerTabs,
    NavModeHost, NavModeMediator, ToolChange, ToolGroup, ToolId, Toolbar, ViewId,
    ViewerPreferences,
};

/// Construction options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerOptions {
    /// Create the distance and angle measurement tools
    pub enable_measurements: bool,
    /// Create the inspector panel with the properties view
    pub enable_properties_inspector: bool,
    /// Put the models view in its own panel
    pub separate_models_explorer: bool,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            enable_measurements: true,
            enable_properties_inspector: true,
            separate_models_explorer: false,
        }
    }
}

// ── Adapters ──────────────────────────────────────────────────

/// Config effects routed to the engine and the viewer's own flags
struct ConfigSink<'a, E: Engine> {
    engine: &'a mut E,
    spaces_shown: &'a mut bool,
    object_colors: &'a mut BTreeMap<String, [f64; 3]>,
}

impl<E: Engine> ConfigTarget for ConfigSink<'_, E> {
    fn apply_engine_setting(&mut self, setting: EngineSetting) -> Result<(), String> {
        self.engine.apply_setting(setting)
    }

    fn set_spaces_shown(&mut self, shown: bool) {
        *self.spaces_shown = shown;
        show_spaces(&mut *self.engine, shown);
    }

    fn set_object_colors(&mut self, colors: BTreeMap<String, [f64; 3]>) {
        *self.object_colors = colors;
        apply_object_colors(&mut *self.engine, &*self.object_colors);
    }
}

/// Mediator side effects routed to the toolbar and the engine
struct NavSink<'a, E: Engine> {
    engine: &'a mut E,
    toolbar: &'a mut Toolbar,
    controls_enabled: bool,
    changes: Vec<ToolChange>,
}

impl<E: Engine> NavModeHost for NavSink<'_, E> {
    fn force_deactivate(&mut self, tool: ToolId) {
        self.changes.extend(self.toolbar.deactivate(tool));
    }

    fn set_tool_enabled(&mut self, tool: ToolId, enabled: bool) {
        let enabled = enabled && self.controls_enabled;
        self.changes.extend(self.toolbar.set_enabled(tool, enabled));
    }

    fn set_nav_mode(&mut self, mode: NavMode) {
        self.engine.set_nav_mode(mode);
    }
}

fn show_spaces<E: Engine + ?Sized>(engine: &mut E, shown: bool) {
    let ids = entities_of_type(&*engine, IFC_SPACE);
    engine.set_objects_visible(&ids, shown);
    engine.set_objects_pickable(&ids, shown);
}

fn apply_object_colors<E: Engine + ?Sized>(engine: &mut E, colors: &BTreeMap<String, [f64; 3]>) {
    for (ifc_type, rgb) in colors {
        let ids = entities_of_type(&*engine, ifc_type);
        engine.set_objects_colorized(&ids, Some(*rgb));
    }
}

// ── Viewer ────────────────────────────────────────────────────

/// BIM viewer: explorer tabs, toolbar, navigation modes, configs, model
/// loading and BCF viewpoints over one engine and one server
pub struct BimViewer<E: Engine, S: Server> {
    engine: E,
    server: S,
    options: ViewerOptions,
    toolbar: Toolbar,
    nav: NavModeMediator,
    tabs: ExplorerTabs,
    config: ConfigStore,
    models: ModelsExplorer,
    events: Emitter<ViewerEvent>,
    memento: Option<ResetMemento>,
    object_colors: BTreeMap<String, [f64; 3]>,
    spaces_shown: bool,
    controls_enabled: bool,
    /// Camera to return to when leaving plan view
    saved_3d_camera: Option<CameraState>,
    project_done: Option<Callback>,
}

impl<E: Engine, S: Server> BimViewer<E, S> {
    pub fn new(engine: E, server: S, options: ViewerOptions) -> Self {
        let mut viewer = Self {
            engine,
            server,
            toolbar: Toolbar::new(options.enable_measurements),
            nav: NavModeMediator::new(),
            tabs: ExplorerTabs::new(
                options.separate_models_explorer,
                options.enable_properties_inspector,
            ),
            options,
            config: ConfigStore::new(),
            models: ModelsExplorer::new(),
            events: Emitter::default(),
            memento: None,
            object_colors: BTreeMap::new(),
            spaces_shown: false,
            controls_enabled: true,
            saved_3d_camera: None,
            project_done: None,
        };

        viewer.engine.set_nav_mode(viewer.nav.mode());
        viewer.sync_toggle(ToolId::ThreeD, true);
        viewer.sync_toggle(ToolId::NavCube, true);

        let errors = viewer.config.apply_defaults(&mut ConfigSink {
            engine: &mut viewer.engine,
            spaces_shown: &mut viewer.spaces_shown,
            object_colors: &mut viewer.object_colors,
        });
        if !errors.is_empty() {
            warn!("new() - {} default configuration(s) failed", errors.len());
        }

        viewer.set_controls_enabled(false);
        viewer
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn server(&self) -> &S {
        &self.server
    }

    pub fn server_mut(&mut self) -> &mut S {
        &mut self.server
    }

    pub fn options(&self) -> &ViewerOptions {
        &self.options
    }

    pub fn toolbar(&self) -> &Toolbar {
        &self.toolbar
    }

    pub fn tabs(&self) -> &ExplorerTabs {
        &self.tabs
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn models(&self) -> &ModelsExplorer {
        &self.models
    }

    /// State restored by the reset sentinel, captured after the first model load
    pub fn memento(&self) -> Option<&ResetMemento> {
        self.memento.as_ref()
    }

    // ── Events ────────────────────────────────────────────────

    pub fn on(&mut self, listener: impl FnMut(&ViewerEvent) + 'static) -> SubscriptionId {
        self.events.on(listener)
    }

    pub fn off(&mut self, id: SubscriptionId) -> bool {
        self.events.off(id)
    }

    fn fire(&mut self, event: ViewerEvent) {
        self.events.fire(&event);
    }

    fn fire_tool_changes(&mut self, changes: Vec<ToolChange>) {
        for change in changes {
            self.fire(ViewerEvent::ToolToggled {
                tool: change.tool,
                active: change.active,
            });
        }
    }

    /// Bring a toggle tool's flag in line with the state it mirrors
    fn sync_toggle(&mut self, id: ToolId, active: bool) {
        let changes = if active {
            self.toolbar.activate(id)
        } else {
            self.toolbar.deactivate(id).into_iter().collect()
        };
        self.fire_tool_changes(changes);
    }

    // ── Configs ───────────────────────────────────────────────

    pub fn set_config(&mut self, name: &str, value: &Value) -> Result<(), ViewerError> {
        let result = self.config.set_config(
            name,
            value,
            &mut ConfigSink {
                engine: &mut self.engine,
                spaces_shown: &mut self.spaces_shown,
                object_colors: &mut self.object_colors,
            },
        );
        self.sync_toggle(ToolId::ShowSpaces, self.spaces_shown);
        result
    }

    /// Apply a batch. Each entry stands alone; the failures are returned.
    pub fn set_configs(&mut self, configs: &BTreeMap<String, Value>) -> Vec<ViewerError> {
        let errors = self.config.set_configs(
            configs,
            &mut ConfigSink {
                engine: &mut self.engine,
                spaces_shown: &mut self.spaces_shown,
                object_colors: &mut self.object_colors,
            },
        );
        self.sync_toggle(ToolId::ShowSpaces, self.spaces_shown);
        errors
    }

    pub fn get_config(&self, name: &str) -> Option<Value> {
        self.config.get_config(name)
    }

    fn view_fit_duration(&self) -> f64 {
        self.config.get_f64(ConfigKey::ViewFitDuration).unwrap_or(0.5)
    }

    /// Current configs and open tab, for persisting between sessions
    pub fn preferences(&self) -> ViewerPreferences {
        let tab = self.get_open_tab();
        ViewerPreferences {
            configs: self.config.to_map(),
            last_tab: (tab != crate::state::NO_TAB).then(|| tab.to_string()),
        }
    }

    pub fn apply_preferences(&mut self, prefs: &ViewerPreferences) -> Vec<ViewerError> {
        let mut errors = self.set_configs(&prefs.configs);
        if let Some(tab) = &prefs.last_tab {
            if let Err(e) = self.open_tab(tab) {
                errors.push(e);
            }
        }
        errors
    }

    // ── Projects & models ─────────────────────────────────────

    pub fn get_projects_info(&mut self, done: Done<ProjectsInfo>, error: Failed) {
        self.server.get_projects(done, error);
    }

    pub fn get_project_info(&mut self, project_id: &str, done: Done<ProjectInfo>, error: Failed) {
        self.server.get_project(project_id, done, error);
    }

    pub fn get_object_info(
        &mut self,
        model_id: &str,
        object_id: &str,
        done: Done<Value>,
        error: Failed,
    ) {
        let Some(project_id) = self.models.project_id().map(str::to_string) else {
            error("No project loaded".to_string());
            return;
        };
        self.server
            .get_object_info(&project_id, model_id, object_id, done, error);
    }

    /// Load a project and its initial models. `done` fires after the project's
    /// viewer state has been applied.
    pub fn load_project(&mut self, project_id: &str, done: Option<Callback>, error: Option<Failed>) {
        if project_id.is_empty() {
            error!("load_project() - Argument expected: project_id");
            return;
        }
        if self.models.project().is_some() {
            self.unload_project();
        }
        self.project_done = done;
        self.set_controls_enabled(false);
        self.models
            .load_project(project_id, &mut self.server, None, error);
        self.pump();
    }

    pub fn unload_project(&mut self) {
        let events = self.models.unload_project(&mut self.engine);
        self.project_done = None;
        for event in events {
            self.handle_models_event(event);
        }
        self.memento = None;
        self.saved_3d_camera = None;
        self.open_models_tab();
        self.set_controls_enabled(false);
    }

    pub fn get_loaded_project_id(&self) -> Option<&str> {
        self.models.project_id()
    }

    pub fn get_model_ids(&self) -> Vec<ModelId> {
        self.models.model_ids()
    }

    pub fn get_loaded_model_ids(&self) -> Vec<ModelId> {
        self.models.loaded_model_ids()
    }

    pub fn is_model_loaded(&self, model_id: &str) -> bool {
        self.models.is_model_loaded(model_id)
    }

    pub fn load_model(
        &mut self,
        model_id: &str,
        done: Option<Callback>,
        error: Option<Failed>,
    ) -> Result<(), ViewerError> {
        self.models
            .load_model(model_id, done, error)
            .inspect_err(|e| error!("load_model() - {e}"))?;
        self.pump();
        Ok(())
    }

    /// Load every model not loaded yet, one after another
    pub fn load_all_models(&mut self, done: Option<Callback>) {
        self.models.load_all_models(done);
        self.pump();
    }

    pub fn unload_model(&mut self, model_id: &str) -> Result<(), ViewerError> {
        let event = self
            .models
            .unload_model(model_id, &mut self.engine)
            .inspect_err(|e| error!("unload_model() - {e}"))?;
        self.handle_models_event(event);
        Ok(())
    }

    pub fn unload_all_models(&mut self) {
        for event in self.models.unload_all_models(&mut self.engine) {
            self.handle_models_event(event);
        }
    }

    /// Process every server reply that has arrived. Returns the number of
    /// loading events handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        loop {
            match self.models.step(&mut self.engine, &mut self.server) {
                Step::Idle => break,
                Step::Progressed => {}
                Step::Event(event) => {
                    self.handle_models_event(event);
                    handled += 1;
                }
            }
        }
        handled
    }

    fn handle_models_event(&mut self, event: ModelsEvent) {
        match event {
            ModelsEvent::ProjectLoaded(info) => {
                let errors = self.set_configs(&info.viewer_configs);
                for e in &errors {
                    warn!("load_project() - {e}");
                }
                self.fire(ViewerEvent::ProjectLoaded {
                    project_id: info.id,
                });
            }
            ModelsEvent::ProjectReady(info) => {
                for e in self.set_viewer_state(&info.viewer_state, None) {
                    warn!("load_project() - {e}");
                }
                if let Some(done) = self.project_done.take() {
                    done();
                }
            }
            ModelsEvent::ModelLoaded(model_id) => {
                if self.spaces_shown {
                    show_spaces(&mut self.engine, true);
                }
                apply_object_colors(&mut self.engine, &self.object_colors);
                if self.models.num_models_loaded() == 1 {
                    if let Some(aabb) = self.engine.scene_aabb() {
                        self.engine.jump_to(FlightTarget::Aabb(aabb));
                    }
                }
                if self.memento.is_none() {
                    self.memento = Some(ResetMemento::capture(&self.engine));
                }
                self.set_controls_enabled(true);
                self.fire(ViewerEvent::ModelLoaded { model_id });
            }
            ModelsEvent::ModelLoadFailed { model_id, message } => {
                debug!("handle_models_event() - '{model_id}' failed: {message}");
            }
            ModelsEvent::ModelUnloaded(model_id) => {
                if self.models.num_models_loaded() == 0 {
                    self.memento = None;
                    self.set_controls_enabled(false);
                    self.open_models_tab();
                }
                self.fire(ViewerEvent::ModelUnloaded { model_id });
            }
            ModelsEvent::ProjectUnloaded(project_id) => {
                self.fire(ViewerEvent::ProjectUnloaded { project_id });
            }
        }
    }

    // ── Tabs ──────────────────────────────────────────────────

    /// Open a tab from code. Disabled tabs may be opened this way.
    pub fn open_tab(&mut self, name: &str) -> Result<(), ViewerError> {
        self.activate_tab(name, ActivationSource::Programmatic)
    }

    /// Open a tab on behalf of the user. Disabled tabs refuse.
    pub fn click_tab(&mut self, name: &str) -> Result<(), ViewerError> {
        self.activate_tab(name, ActivationSource::User)
    }

    fn activate_tab(&mut self, name: &str, source: ActivationSource) -> Result<(), ViewerError> {
        let tab = self
            .tabs
            .open_tab(name, source)
            .inspect_err(|e| error!("open_tab() - {e}"))?;
        self.fire(ViewerEvent::TabOpened { tab });
        Ok(())
    }

    fn open_models_tab(&mut self) {
        if let Err(e) = self.open_tab(ViewId::Models.as_str()) {
            error!("open_models_tab() - {e}");
        }
    }

    pub fn get_open_tab(&self) -> &'static str {
        self.tabs.get_open_tab()
    }

    // ── Controls & tools ──────────────────────────────────────

    /// Enable or disable every tab and tool the user can reach. The models tab
    /// stays enabled; the marquee stays disabled in plan view.
    pub fn set_controls_enabled(&mut self, enabled: bool) {
        self.controls_enabled = enabled;
        for view in [ViewId::Objects, ViewId::Classes, ViewId::Storeys, ViewId::Properties] {
            self.tabs.set_enabled(view, enabled);
        }

        let ids: Vec<ToolId> = self
            .toolbar
            .tools()
            .map(|t| t.id)
            .filter(|id| *id != ToolId::NavCube)
            .collect();
        let mut changes = Vec::new();
        for id in ids {
            let tool_enabled = match id {
                ToolId::Marquee => enabled && self.nav.three_d_active(),
                _ => enabled,
            };
            changes.extend(self.toolbar.set_enabled(id, tool_enabled));
        }
        self.fire_tool_changes(changes);

        if enabled {
            self.sync_toggle(ToolId::ThreeD, self.nav.three_d_active());
            self.sync_toggle(ToolId::FirstPerson, self.nav.first_person_active());
            self.sync_toggle(ToolId::Ortho, self.get_ortho_enabled());
            self.sync_toggle(ToolId::ShowSpaces, self.spaces_shown);
        }
    }

    pub fn controls_enabled(&self) -> bool {
        self.controls_enabled
    }

    /// Switch a tool on or off on behalf of the user
    pub fn activate_tool(&mut self, id: ToolId, active: bool) -> Result<(), ViewerError> {
        let Some(tool) = self.toolbar.tool(id) else {
            error!("activate_tool() - tool not available: '{id}'");
            return Err(ViewerError::NotFound(format!("tool '{id}'")));
        };
        if active && !tool.is_enabled() {
            error!("activate_tool() - tool disabled: '{id}'");
            return Err(ViewerError::InvalidArgument(format!("tool '{id}' is disabled")));
        }

        match id {
            ToolId::ThreeD => self.set_3d_enabled(active, None),
            ToolId::Ortho => self.set_ortho_enabled(active, None),
            ToolId::FirstPerson => self.set_first_person_enabled(active),
            ToolId::ShowSpaces => self.set_spaces_shown(active),
            _ => {
                debug_assert!(
                    id.group() == ToolGroup::Modal || matches!(id, ToolId::NavCube | ToolId::Query)
                );
                self.sync_toggle(id, active);
            }
        }
        Ok(())
    }

    /// Switch between 3D (orbit) and 2D (plan view). With `done` the camera
    /// flies; otherwise it jumps.
    pub fn set_3d_enabled(&mut self, enabled: bool, done: Option<FlightDone>) {
        let was_three_d = self.nav.three_d_active();
        let mut sink = NavSink {
            engine: &mut self.engine,
            toolbar: &mut self.toolbar,
            controls_enabled: self.controls_enabled,
            changes: Vec::new(),
        };
        let mode = self.nav.set_three_d_mode_active(enabled, &mut sink);
        let changes = sink.changes;
        self.fire_tool_changes(changes);
        self.sync_toggle(ToolId::ThreeD, enabled);

        if enabled {
            match self.saved_3d_camera.take() {
                Some(saved) => self.restore_3d_camera(saved, done),
                None => {
                    if let Some(done) = done {
                        done();
                    }
                }
            }
        } else {
            if was_three_d {
                self.saved_3d_camera = Some(self.engine.camera());
            }
            let aabb = self.engine.scene_aabb();
            self.plan_view(aabb, done);
        }

        self.sync_toggle(ToolId::Ortho, self.get_ortho_enabled());
        info!("set_3d_enabled() - {enabled}, nav mode {}", mode.as_str());
        self.fire(ViewerEvent::NavModeChanged { mode });
        self.fire(ViewerEvent::ThreeDModeChanged { active: enabled });
    }

    pub fn get_3d_enabled(&self) -> bool {
        self.nav.three_d_active()
    }

    pub fn set_first_person_enabled(&mut self, enabled: bool) {
        let mut sink = NavSink {
            engine: &mut self.engine,
            toolbar: &mut self.toolbar,
            controls_enabled: self.controls_enabled,
            changes: Vec::new(),
        };
        let mode = self.nav.set_first_person_mode_active(enabled, &mut sink);
        let changes = sink.changes;
        self.fire_tool_changes(changes);
        self.sync_toggle(ToolId::FirstPerson, enabled);
        self.fire(ViewerEvent::NavModeChanged { mode });
    }

    pub fn get_first_person_enabled(&self) -> bool {
        self.nav.first_person_active()
    }

    pub fn nav_mode(&self) -> NavMode {
        self.engine.nav_mode()
    }

    /// Switch the projection, keeping the apparent size of the view
    pub fn set_ortho_enabled(&mut self, enabled: bool, done: Option<FlightDone>) {
        let mut cam = self.engine.camera();
        let projection = if enabled {
            Projection::Ortho
        } else {
            Projection::Perspective
        };
        if cam.projection != projection {
            if enabled {
                let dist = cam.direction().length();
                cam.ortho_scale = (2.0 * dist * (cam.fov.to_radians() * 0.5).tan()).max(1e-6);
            }
            cam.projection = projection;
            self.engine.set_camera(cam);
        }
        self.sync_toggle(ToolId::Ortho, enabled);
        if let Some(done) = done {
            done();
        }
    }

    pub fn get_ortho_enabled(&self) -> bool {
        self.engine.camera().projection == Projection::Ortho
    }

    /// Allow spaces to be shown, or keep them hidden and unpickable
    pub fn set_spaces_shown(&mut self, shown: bool) {
        if let Err(e) = self.set_config(ConfigKey::ShowSpaces.name(), &Value::Bool(shown)) {
            error!("set_spaces_shown() - {e}");
        }
    }

    pub fn get_spaces_shown(&self) -> bool {
        self.spaces_shown
    }

    // ── Camera ────────────────────────────────────────────────

    fn move_camera(&mut self, target: Option<FlightTarget>, done: Option<FlightDone>) {
        match (target, done) {
            (Some(target), Some(done)) => {
                let duration = self.view_fit_duration();
                self.engine.fly_to(target, duration, Some(done));
            }
            (Some(target), None) => self.engine.jump_to(target),
            (None, Some(done)) => done(),
            (None, None) => {}
        }
    }

    /// Orthographic top-down view framing `aabb`
    fn plan_view(&mut self, aabb: Option<Aabb>, done: Option<FlightDone>) {
        let mut cam = self.engine.camera();
        let center = aabb.map(|a| a.center()).unwrap_or(cam.look);
        let dist = cam.direction().length().max(1.0);
        cam = cam.with_pose(center + DVec3::Z * dist, center, DVec3::Y);
        cam.projection = Projection::Ortho;
        self.engine.set_camera(cam);
        self.move_camera(aabb.map(FlightTarget::Aabb), done);
    }

    fn restore_3d_camera(&mut self, saved: CameraState, done: Option<FlightDone>) {
        match done {
            Some(done) => {
                let mut cam = self.engine.camera();
                cam.projection = saved.projection;
                cam.fov = saved.fov;
                cam.ortho_scale = saved.ortho_scale;
                self.engine.set_camera(cam);
                let target = FlightTarget::Pose {
                    eye: saved.eye,
                    look: saved.look,
                    up: saved.up,
                };
                self.move_camera(Some(target), Some(done));
            }
            None => self.engine.set_camera(saved),
        }
    }

    /// Entity ids under each given id, unknown ids logged and skipped
    fn expand(&self, ids: &[ObjectId], op: &str) -> Vec<ObjectId> {
        let mut out = Vec::new();
        for id in ids {
            let sub = self.engine.subtree_object_ids(id);
            if sub.is_empty() {
                warn!("{op}() - Object not found in viewer: '{id}'");
            }
            for s in sub {
                if !out.contains(&s) {
                    out.push(s);
                }
            }
        }
        out
    }

    fn clear_highlights(&mut self) {
        let highlighted: Vec<ObjectId> = self
            .engine
            .object_ids()
            .into_iter()
            .filter(|id| self.engine.is_highlighted(id))
            .collect();
        self.engine.set_objects_highlighted(&highlighted, false);
    }

    /// Show, highlight and fly to an object and everything inside it
    pub fn fly_to_object(&mut self, object_id: &str, done: Option<FlightDone>) -> Result<(), ViewerError> {
        if object_id.is_empty() {
            error!("fly_to_object() - Argument expected: object_id");
            return Err(ViewerError::InvalidArgument("object_id".into()));
        }
        let ids = self.engine.subtree_object_ids(object_id);
        let Some(aabb) = self.engine.aabb(&ids) else {
            error!("fly_to_object() - Object not found in viewer: '{object_id}'");
            if let Some(done) = done {
                done();
            }
            return Err(ViewerError::NotFound(format!("object '{object_id}'")));
        };
        self.clear_highlights();
        self.engine.set_objects_visible(&ids, true);
        self.engine.set_objects_highlighted(&ids, true);
        let duration = self.view_fit_duration();
        self.engine.fly_to(FlightTarget::Aabb(aabb), duration, done);
        Ok(())
    }

    pub fn jump_to_object(&mut self, object_id: &str) -> Result<(), ViewerError> {
        if object_id.is_empty() {
            error!("jump_to_object() - Argument expected: object_id");
            return Err(ViewerError::InvalidArgument("object_id".into()));
        }
        let ids = self.engine.subtree_object_ids(object_id);
        let Some(aabb) = self.engine.aabb(&ids) else {
            error!("jump_to_object() - Object not found in viewer: '{object_id}'");
            return Err(ViewerError::NotFound(format!("object '{object_id}'")));
        };
        self.engine.set_objects_visible(&ids, true);
        self.engine.jump_to(FlightTarget::Aabb(aabb));
        Ok(())
    }

    /// Fly to fit the given objects. Nothing found is not an error.
    pub fn view_fit_objects(&mut self, object_ids: &[ObjectId], done: Option<FlightDone>) {
        let ids = self.expand(object_ids, "view_fit_objects");
        let Some(aabb) = self.engine.aabb(&ids) else {
            if let Some(done) = done {
                done();
            }
            return;
        };
        self.clear_highlights();
        self.engine.set_objects_visible(&ids, true);
        self.engine.set_objects_highlighted(&ids, true);
        let duration = self.view_fit_duration();
        self.engine.fly_to(FlightTarget::Aabb(aabb), duration, done);
    }

    pub fn view_fit_all(&mut self, done: Option<FlightDone>) {
        let aabb = self.engine.scene_aabb();
        let duration = self.view_fit_duration();
        match aabb {
            Some(aabb) => self.engine.fly_to(FlightTarget::Aabb(aabb), duration, done),
            None => {
                if let Some(done) = done {
                    done();
                }
            }
        }
    }

    /// Fit the given models. Animated when `done` is given.
    pub fn view_fit_models(&mut self, model_ids: &[ModelId], done: Option<FlightDone>) {
        let boxes: Vec<Aabb> = model_ids
            .iter()
            .filter_map(|id| {
                let aabb = self.engine.model_aabb(id);
                if aabb.is_none() {
                    warn!("view_fit_models() - Model not loaded: '{id}'");
                }
                aabb
            })
            .collect();
        let aabb = Aabb::union(boxes.iter());
        self.move_camera(aabb.map(FlightTarget::Aabb), done);
    }

    /// Set any of eye, look and up, instantly
    pub fn set_camera(&mut self, params: &CameraParams) {
        let cam = self.engine.camera();
        let eye = params.eye.map(DVec3::from_array).unwrap_or(cam.eye);
        let look = params.look.map(DVec3::from_array).unwrap_or(cam.look);
        let up = params.up.map(DVec3::from_array).unwrap_or(cam.up);
        self.engine.set_camera(cam.with_pose(eye, look, up));
    }

    // ── Objects ───────────────────────────────────────────────

    pub fn set_objects_visible(&mut self, object_ids: &[ObjectId], visible: bool) {
        let ids = self.expand(object_ids, "set_objects_visible");
        self.engine.set_objects_visible(&ids, visible);
    }

    pub fn set_all_objects_visible(&mut self, visible: bool) {
        let ids = if visible {
            self.engine.object_ids()
        } else {
            self.engine.visible_object_ids()
        };
        self.engine.set_objects_visible(&ids, visible);
    }

    pub fn set_objects_xrayed(&mut self, object_ids: &[ObjectId], xrayed: bool) {
        let ids = self.expand(object_ids, "set_objects_xrayed");
        self.engine.set_objects_xrayed(&ids, xrayed);
    }

    pub fn set_all_objects_xrayed(&mut self, xrayed: bool) {
        let ids = if xrayed {
            self.engine.object_ids()
        } else {
            self.engine.xrayed_object_ids()
        };
        self.engine.set_objects_xrayed(&ids, xrayed);
    }

    pub fn set_objects_selected(&mut self, object_ids: &[ObjectId], selected: bool) {
        let ids = self.expand(object_ids, "set_objects_selected");
        self.engine.set_objects_selected(&ids, selected);
    }

    pub fn set_all_objects_selected(&mut self, selected: bool) {
        let ids = if selected {
            self.engine.object_ids()
        } else {
            self.engine.selected_object_ids()
        };
        self.engine.set_objects_selected(&ids, selected);
    }

    // ── Storeys & viewer state ────────────────────────────────

    /// Isolate a storey and frame it: plan view in 2D, current direction in 3D.
    /// With `done` the camera flies; otherwise it jumps.
    pub fn select_storey(&mut self, storey_id: &str, done: Option<FlightDone>) -> Result<(), ViewerError> {
        let Some(meta) = self.engine.meta_object(storey_id) else {
            error!("select_storey() - Object is not found: '{storey_id}'");
            return Err(ViewerError::NotFound(format!("object '{storey_id}'")));
        };
        if meta.ifc_type != IFC_BUILDING_STOREY {
            error!("select_storey() - Object is not an IfcBuildingStorey: '{storey_id}'");
            return Err(ViewerError::InvalidArgument(format!(
                "'{storey_id}' is not an {IFC_BUILDING_STOREY}"
            )));
        }

        let storey_ids = self.engine.subtree_object_ids(storey_id);
        let all = self.engine.object_ids();
        let others: Vec<ObjectId> = all
            .iter()
            .filter(|id| !storey_ids.contains(id))
            .cloned()
            .collect();
        self.engine.set_objects_xrayed(&all, false);
        self.engine.set_objects_visible(&others, false);
        self.engine.set_objects_visible(&storey_ids, true);
        if !self.spaces_shown {
            show_spaces(&mut self.engine, false);
        }

        let aabb = self.engine.aabb(&storey_ids);
        if self.nav.three_d_active() {
            self.move_camera(aabb.map(FlightTarget::Aabb), done);
        } else {
            self.plan_view(aabb, done);
        }
        info!("select_storey() - '{storey_id}'");
        Ok(())
    }

    /// Batch-apply UI state. A missing `threeDActive` means 3D. Every part is
    /// attempted; the failures are returned.
    pub fn set_viewer_state(&mut self, state: &ViewerStateDoc, done: Option<FlightDone>) -> Vec<ViewerError> {
        let mut errors = Vec::new();
        if let Some(tab) = &state.tab_open {
            if let Err(e) = self.open_tab(tab) {
                errors.push(e);
            }
        }
        if let Some(params) = &state.set_camera {
            self.set_camera(params);
        }
        if let Some(storey) = &state.selected_storey {
            if let Err(e) = self.select_storey(storey, None) {
                errors.push(e);
            }
        }
        self.set_3d_enabled(state.three_d_active.unwrap_or(true), done);
        errors
    }

    // ── Viewpoints ────────────────────────────────────────────

    pub fn save_bcf_viewpoint(&mut self, options: &SaveOptions) -> BcfViewpoint {
        bcf::save_viewpoint(&mut self.engine, options)
    }

    /// Apply a viewpoint or the reset sentinel, then sync the ortho tool to
    /// the resulting projection
    pub fn load_bcf_viewpoint(
        &mut self,
        request: &ViewpointRequest,
        options: &LoadOptions,
        done: Option<FlightDone>,
    ) -> LoadReport {
        let report = bcf::load_viewpoint(
            &mut self.engine,
            request,
            options,
            self.memento.as_ref(),
            done,
        );
        self.sync_toggle(ToolId::Ortho, self.get_ortho_enabled());
        if report.reset {
            self.toolbar.hide_section_control();
            self.fire(ViewerEvent::Reset);
        } else {
            self.fire(ViewerEvent::ViewpointLoaded);
        }
        report
    }

    /// Parse a viewpoint document (or `"reset"`) and load it
    pub fn load_bcf_viewpoint_json(
        &mut self,
        value: &Value,
        options: &LoadOptions,
    ) -> Result<LoadReport, ViewerError> {
        let request = ViewpointRequest::from_value(value.clone())
            .inspect_err(|e| error!("load_bcf_viewpoint() - {e}"))?;
        Ok(self.load_bcf_viewpoint(&request, options, None))
    }

    /// Clear section planes and emphasis, and restore initial visibility and camera
    pub fn reset_view(&mut self) -> LoadReport {
        self.load_bcf_viewpoint(&ViewpointRequest::Reset, &LoadOptions::default(), None)
    }

    // ── Sections & measurements ───────────────────────────────

    pub fn clear_sections(&mut self) {
        self.toolbar.hide_section_control();
        self.engine.clear_section_planes();
    }

    pub fn disable_sections(&mut self) {
        self.engine.set_section_planes_active(false);
    }

    pub fn enable_sections(&mut self) {
        self.engine.set_section_planes_active(true);
    }

    pub fn flip_sections(&mut self) {
        self.engine.flip_section_planes();
    }

    pub fn hide_section_edit_control(&mut self) {
        self.toolbar.hide_section_control();
    }

    pub fn get_num_sections(&self) -> usize {
        self.engine.section_planes().len()
    }

    pub fn get_enable_measurements(&self) -> bool {
        self.options.enable_measurements
    }

    pub fn clear_measurements(&mut self) {
        self.toolbar.clear_measurements();
    }

    pub fn get_num_measurements(&self) -> usize {
        self.toolbar.measurements().len()
    }

    // ── Clicks ────────────────────────────────────────────────

    /// Route a canvas click to the active tool
    pub fn click(&mut self, ray: &Ray) -> ClickOutcome {
        let outcome = self.toolbar.handle_click(ray, &mut self.engine);
        if let ClickOutcome::Queried { object_id } = &outcome {
            info!("click() - queried '{object_id}'");
            if self.options.enable_properties_inspector {
                if let Err(e) = self.open_tab(ViewId::Properties.as_str()) {
                    debug!("click() - {e}");
                }
            }
        }
        outcome
    }
}
