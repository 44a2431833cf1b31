//! Headless test harness for driving the viewer programmatically.
//!
//! Wraps a [`BimViewer`] over a [`HeadlessEngine`] and a [`StaticServer`],
//! records every event it fires and settles deferred server replies.

use std::cell::RefCell;
use std::rc::Rc;

use glam::DVec3;
use serde_json::json;

use crate::engine::{Engine, HeadlessEngine, Ray};
use crate::events::ViewerEvent;
use crate::fixtures;
use crate::server::StaticServer;
use crate::state::ClickOutcome;
use crate::viewer::{BimViewer, ViewerOptions};

/// Height clicks are cast down from
const CLICK_HEIGHT: f64 = 1000.0;

/// Headless test harness: viewer plus event and error recorders
pub struct TestHarness {
    pub viewer: BimViewer<HeadlessEngine, StaticServer>,
    events: Rc<RefCell<Vec<ViewerEvent>>>,
    errors: Rc<RefCell<Vec<String>>>,
}

impl TestHarness {
    /// Harness over the two-model fixture building, nothing loaded yet
    pub fn new() -> Self {
        Self::with_server(fixtures::static_server())
    }

    pub fn with_server(server: StaticServer) -> Self {
        Self::with_options(server, ViewerOptions::default())
    }

    pub fn with_options(server: StaticServer, options: ViewerOptions) -> Self {
        let mut viewer = BimViewer::new(HeadlessEngine::new(), server, options);
        let events = Rc::new(RefCell::new(Vec::new()));
        let recorder = events.clone();
        viewer.on(move |e| recorder.borrow_mut().push(e.clone()));
        Self {
            viewer,
            events,
            errors: Rc::new(RefCell::new(Vec::new())),
        }
    }

    // ── Loading ───────────────────────────────────────────────

    /// Load a project and wait for every reply. Returns the first error
    /// reported by the server.
    pub fn load_project(&mut self, project_id: &str) -> Result<(), String> {
        let before = self.errors.borrow().len();
        let errors = self.errors.clone();
        self.viewer.load_project(
            project_id,
            None,
            Some(Box::new(move |msg| errors.borrow_mut().push(msg))),
        );
        self.settle();
        self.errors
            .borrow()
            .get(before)
            .map_or(Ok(()), |msg| Err(msg.clone()))
    }

    pub fn load_model(&mut self, model_id: &str) -> Result<(), String> {
        let before = self.errors.borrow().len();
        let errors = self.errors.clone();
        self.viewer
            .load_model(
                model_id,
                None,
                Some(Box::new(move |msg| errors.borrow_mut().push(msg))),
            )
            .map_err(|e| e.to_string())?;
        self.settle();
        self.errors
            .borrow()
            .get(before)
            .map_or(Ok(()), |msg| Err(msg.clone()))
    }

    /// Queue server replies until [`TestHarness::settle`] or
    /// [`TestHarness::flush_one`]
    pub fn set_deferred(&mut self, deferred: bool) {
        self.viewer.server_mut().set_deferred(deferred);
    }

    /// Release one server reply and process it
    pub fn flush_one(&mut self) -> bool {
        let flushed = self.viewer.server_mut().flush_one();
        self.viewer.pump();
        flushed
    }

    /// Release and process replies until nothing is pending. Returns the
    /// number of replies released.
    pub fn settle(&mut self) -> usize {
        let mut released = 0;
        self.viewer.pump();
        while self.flush_one() {
            released += 1;
        }
        released
    }

    /// Land the camera flight in progress
    pub fn complete_flights(&mut self) -> bool {
        self.viewer.engine_mut().complete_flights()
    }

    // ── Interaction ───────────────────────────────────────────

    /// Click straight down onto the plan position `(x, y)`
    pub fn click_at(&mut self, x: f64, y: f64) -> ClickOutcome {
        let ray = Ray::new(DVec3::new(x, y, CLICK_HEIGHT), DVec3::NEG_Z);
        self.viewer.click(&ray)
    }

    // ── Inspection ────────────────────────────────────────────

    pub fn events(&self) -> Vec<ViewerEvent> {
        self.events.borrow().clone()
    }

    /// Drain recorded events
    pub fn take_events(&mut self) -> Vec<ViewerEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.borrow().clone()
    }

    pub fn is_visible(&self, id: &str) -> bool {
        self.viewer.engine().is_visible(id)
    }

    pub fn visible_count(&self) -> usize {
        self.viewer.engine().visible_object_ids().len()
    }

    pub fn object_count(&self) -> usize {
        self.viewer.engine().object_ids().len()
    }

    /// Summary of the viewer state
    pub fn inspect(&self) -> serde_json::Value {
        let engine = self.viewer.engine();
        let cam = engine.camera();
        let tools: Vec<_> = self
            .viewer
            .toolbar()
            .tools()
            .map(|t| {
                json!({
                    "id": t.id,
                    "active": t.is_active(),
                    "enabled": t.is_enabled(),
                })
            })
            .collect();
        json!({
            "project_id": self.viewer.get_loaded_project_id(),
            "models_loaded": self.viewer.get_loaded_model_ids(),
            "object_count": engine.object_ids().len(),
            "visible": engine.visible_object_ids(),
            "selected": engine.selected_object_ids(),
            "xrayed": engine.xrayed_object_ids(),
            "nav_mode": engine.nav_mode(),
            "three_d": self.viewer.get_3d_enabled(),
            "open_tab": self.viewer.get_open_tab(),
            "controls_enabled": self.viewer.controls_enabled(),
            "camera": {
                "eye": cam.eye.to_array(),
                "look": cam.look.to_array(),
                "up": cam.up.to_array(),
                "projection": cam.projection,
            },
            "sections": self.viewer.get_num_sections(),
            "measurements": self.viewer.get_num_measurements(),
            "tools": tools,
        })
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
