//! Project and model loading.
//!
//! Server replies arrive through callbacks which post a [`LoadMessage`] into a
//! channel; [`ModelsExplorer::step`] drains it. Model jobs run strictly one at
//! a time in queue order, so "load all" attempts every model in the listed
//! order and its completion job runs only after the last attempt resolved.

use std::collections::{BTreeSet, VecDeque};
use std::sync::mpsc::{self, Receiver, Sender};

use shared::{ModelId, ModelMetadata, ProjectId, ProjectInfo};
use tracing::{debug, error, info, warn};

use crate::engine::Engine;
use crate::error::ViewerError;
use crate::server::{Failed, Server};

/// Completion callback without a payload
pub type Callback = Box<dyn FnOnce()>;

enum LoadMessage {
    Project(Result<ProjectInfo, String>),
    Metadata {
        model_id: ModelId,
        result: Result<ModelMetadata, String>,
    },
    Geometry {
        model_id: ModelId,
        metadata: ModelMetadata,
        result: Result<Vec<u8>, String>,
    },
}

enum Job {
    Model {
        model_id: ModelId,
        /// Already loaded counts as success instead of an error
        skip_if_loaded: bool,
        done: Option<Callback>,
        error: Option<Failed>,
    },
    /// Runs after every job queued before it
    Barrier { done: Option<Callback> },
    /// End of the initial content of a freshly loaded project
    ProjectReady { done: Option<Callback> },
}

struct InFlightModel {
    model_id: ModelId,
    done: Option<Callback>,
    error: Option<Failed>,
}

struct PendingProject {
    project_id: ProjectId,
    done: Option<Callback>,
    error: Option<Failed>,
}

/// What happened during one [`ModelsExplorer::step`]
#[derive(Debug, Clone, PartialEq)]
pub enum ModelsEvent {
    ProjectLoaded(ProjectInfo),
    /// The project's initial models have all been attempted
    ProjectReady(ProjectInfo),
    ModelLoaded(ModelId),
    ModelLoadFailed { model_id: ModelId, message: String },
    ModelUnloaded(ModelId),
    ProjectUnloaded(ProjectId),
}

/// Result of [`ModelsExplorer::step`]
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Nothing to do until a server reply arrives
    Idle,
    /// State advanced without anything to report
    Progressed,
    Event(ModelsEvent),
}

/// Loads projects and their models through a [`Server`]
pub struct ModelsExplorer {
    project: Option<ProjectInfo>,
    pending_project: Option<PendingProject>,
    loaded: BTreeSet<ModelId>,
    queue: VecDeque<Job>,
    in_flight: Option<InFlightModel>,
    tx: Sender<(u64, LoadMessage)>,
    rx: Receiver<(u64, LoadMessage)>,
    /// Bumped on project change so replies for the old project are dropped
    generation: u64,
}

impl Default for ModelsExplorer {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelsExplorer {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            project: None,
            pending_project: None,
            loaded: BTreeSet::new(),
            queue: VecDeque::new(),
            in_flight: None,
            tx,
            rx,
            generation: 0,
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn project(&self) -> Option<&ProjectInfo> {
        self.project.as_ref()
    }

    pub fn project_id(&self) -> Option<&str> {
        self.project.as_ref().map(|p| p.id.as_str())
    }

    /// Models of the current project, in listed order
    pub fn model_ids(&self) -> Vec<ModelId> {
        self.project
            .as_ref()
            .map(|p| p.models.iter().map(|m| m.id.clone()).collect())
            .unwrap_or_default()
    }

    pub fn has_model(&self, model_id: &str) -> bool {
        self.project
            .as_ref()
            .is_some_and(|p| p.models.iter().any(|m| m.id == model_id))
    }

    pub fn loaded_model_ids(&self) -> Vec<ModelId> {
        self.loaded.iter().cloned().collect()
    }

    pub fn is_model_loaded(&self, model_id: &str) -> bool {
        self.loaded.contains(model_id)
    }

    pub fn num_models_loaded(&self) -> usize {
        self.loaded.len()
    }

    /// A request is outstanding or jobs are queued
    pub fn is_busy(&self) -> bool {
        self.pending_project.is_some() || self.in_flight.is_some() || !self.queue.is_empty()
    }

    // ── Projects ──────────────────────────────────────────────

    /// Request a project. The current project (if any) must be unloaded first
    /// with [`ModelsExplorer::unload_project`].
    pub fn load_project<S: Server + ?Sized>(
        &mut self,
        project_id: &str,
        server: &mut S,
        done: Option<Callback>,
        error: Option<Failed>,
    ) {
        self.generation += 1;
        self.queue.clear();
        self.in_flight = None;
        self.pending_project = Some(PendingProject {
            project_id: project_id.to_string(),
            done,
            error,
        });
        info!("load_project() - requesting '{project_id}'");
        let generation = self.generation;
        let ok_tx = self.tx.clone();
        let err_tx = self.tx.clone();
        server.get_project(
            project_id,
            Box::new(move |info| {
                let _ = ok_tx.send((generation, LoadMessage::Project(Ok(info))));
            }),
            Box::new(move |msg| {
                let _ = err_tx.send((generation, LoadMessage::Project(Err(msg))));
            }),
        );
    }

    /// Unload every model and forget the project
    pub fn unload_project<E: Engine + ?Sized>(&mut self, engine: &mut E) -> Vec<ModelsEvent> {
        self.generation += 1;
        self.queue.clear();
        self.in_flight = None;
        self.pending_project = None;
        let mut events = self.unload_all_models(engine);
        if let Some(project) = self.project.take() {
            info!("unload_project() - '{}'", project.id);
            events.push(ModelsEvent::ProjectUnloaded(project.id));
        }
        events
    }

    // ── Models ────────────────────────────────────────────────

    /// Queue one model
    pub fn load_model(
        &mut self,
        model_id: &str,
        done: Option<Callback>,
        error: Option<Failed>,
    ) -> Result<(), ViewerError> {
        if self.project.is_none() {
            return Err(ViewerError::InvalidArgument(
                "No project loaded".to_string(),
            ));
        }
        if !self.has_model(model_id) {
            return Err(ViewerError::NotFound(format!(
                "Model not in currently loaded project: '{model_id}'"
            )));
        }
        self.queue.push_back(Job::Model {
            model_id: model_id.to_string(),
            skip_if_loaded: false,
            done,
            error,
        });
        Ok(())
    }

    /// Queue every model of the project that is not loaded yet, then `done`
    pub fn load_all_models(&mut self, done: Option<Callback>) {
        for model_id in self.model_ids() {
            if !self.loaded.contains(&model_id) {
                self.queue.push_back(Job::Model {
                    model_id,
                    skip_if_loaded: true,
                    done: None,
                    error: None,
                });
            }
        }
        self.queue.push_back(Job::Barrier { done });
    }

    pub fn unload_model<E: Engine + ?Sized>(
        &mut self,
        model_id: &str,
        engine: &mut E,
    ) -> Result<ModelsEvent, ViewerError> {
        if !self.loaded.remove(model_id) {
            return Err(ViewerError::NotFound(format!(
                "Model not loaded: '{model_id}'"
            )));
        }
        engine.unload_model(model_id);
        info!("unload_model() - '{model_id}'");
        Ok(ModelsEvent::ModelUnloaded(model_id.to_string()))
    }

    pub fn unload_all_models<E: Engine + ?Sized>(&mut self, engine: &mut E) -> Vec<ModelsEvent> {
        let ids: Vec<ModelId> = self.loaded.iter().cloned().collect();
        ids.iter()
            .filter_map(|id| self.unload_model(id, engine).ok())
            .collect()
    }

    // ── Driving ───────────────────────────────────────────────

    /// Handle one server reply, or start the next queued job.
    pub fn step<E: Engine + ?Sized, S: Server + ?Sized>(
        &mut self,
        engine: &mut E,
        server: &mut S,
    ) -> Step {
        while let Ok((generation, message)) = self.rx.try_recv() {
            if generation != self.generation {
                debug!("step() - dropping reply for a replaced project");
                continue;
            }
            return self.handle_message(message, engine, server);
        }

        if self.pending_project.is_some() || self.in_flight.is_some() {
            return Step::Idle;
        }

        match self.queue.pop_front() {
            Some(job) => self.start_job(job, engine, server),
            None => Step::Idle,
        }
    }

    fn handle_message<E: Engine + ?Sized, S: Server + ?Sized>(
        &mut self,
        message: LoadMessage,
        engine: &mut E,
        server: &mut S,
    ) -> Step {
        match message {
            LoadMessage::Project(result) => {
                let Some(pending) = self.pending_project.take() else {
                    return Step::Progressed;
                };
                match result {
                    Ok(info) => {
                        info!(
                            "load_project() - '{}' loaded, {} model(s)",
                            pending.project_id,
                            info.models.len()
                        );
                        for model_id in &info.viewer_content.models_loaded {
                            self.queue.push_back(Job::Model {
                                model_id: model_id.clone(),
                                skip_if_loaded: true,
                                done: None,
                                error: None,
                            });
                        }
                        self.queue.push_back(Job::ProjectReady { done: pending.done });
                        self.project = Some(info.clone());
                        Step::Event(ModelsEvent::ProjectLoaded(info))
                    }
                    Err(msg) => {
                        error!(
                            "load_project() - failed to load '{}': {msg}",
                            pending.project_id
                        );
                        if let Some(error) = pending.error {
                            error(msg);
                        }
                        Step::Progressed
                    }
                }
            }
            LoadMessage::Metadata { model_id, result } => match result {
                Ok(metadata) => {
                    self.request_geometry(&model_id, metadata, server);
                    Step::Progressed
                }
                Err(msg) => self.finish_model(&model_id, Err(msg)),
            },
            LoadMessage::Geometry {
                model_id,
                metadata,
                result,
            } => {
                let result =
                    result.and_then(|bytes| engine.load_model(&model_id, &metadata, &bytes));
                self.finish_model(&model_id, result)
            }
        }
    }

    fn start_job<E: Engine + ?Sized, S: Server + ?Sized>(
        &mut self,
        job: Job,
        engine: &E,
        server: &mut S,
    ) -> Step {
        match job {
            Job::Model {
                model_id,
                skip_if_loaded,
                done,
                error,
            } => {
                if self.loaded.contains(&model_id) || engine.model_ids().contains(&model_id) {
                    if skip_if_loaded {
                        debug!("load_model() - '{model_id}' already loaded");
                        if let Some(done) = done {
                            done();
                        }
                    } else {
                        let msg = format!("Model already loaded: '{model_id}'");
                        warn!("load_model() - {msg}");
                        if let Some(error) = error {
                            error(msg);
                        }
                    }
                    return Step::Progressed;
                }
                self.request_metadata(&model_id, server);
                self.in_flight = Some(InFlightModel {
                    model_id,
                    done,
                    error,
                });
                Step::Progressed
            }
            Job::Barrier { done } => {
                if let Some(done) = done {
                    done();
                }
                Step::Progressed
            }
            Job::ProjectReady { done } => {
                if let Some(done) = done {
                    done();
                }
                match &self.project {
                    Some(info) => Step::Event(ModelsEvent::ProjectReady(info.clone())),
                    None => Step::Progressed,
                }
            }
        }
    }

    fn request_metadata<S: Server + ?Sized>(&mut self, model_id: &str, server: &mut S) {
        let Some(project_id) = self.project_id().map(str::to_string) else {
            return;
        };
        debug!("load_model() - requesting metadata of '{model_id}'");
        let generation = self.generation;
        let (ok_tx, err_tx) = (self.tx.clone(), self.tx.clone());
        let (ok_id, err_id) = (model_id.to_string(), model_id.to_string());
        server.get_metadata(
            &project_id,
            model_id,
            Box::new(move |metadata| {
                let _ = ok_tx.send((
                    generation,
                    LoadMessage::Metadata {
                        model_id: ok_id,
                        result: Ok(metadata),
                    },
                ));
            }),
            Box::new(move |msg| {
                let _ = err_tx.send((
                    generation,
                    LoadMessage::Metadata {
                        model_id: err_id,
                        result: Err(msg),
                    },
                ));
            }),
        );
    }

    fn request_geometry<S: Server + ?Sized>(
        &mut self,
        model_id: &str,
        metadata: ModelMetadata,
        server: &mut S,
    ) {
        let Some(project_id) = self.project_id().map(str::to_string) else {
            return;
        };
        debug!("load_model() - requesting geometry of '{model_id}'");
        let generation = self.generation;
        let (ok_tx, err_tx) = (self.tx.clone(), self.tx.clone());
        let (ok_id, err_id) = (model_id.to_string(), model_id.to_string());
        let err_metadata = metadata.clone();
        server.get_geometry(
            &project_id,
            model_id,
            Box::new(move |bytes| {
                let _ = ok_tx.send((
                    generation,
                    LoadMessage::Geometry {
                        model_id: ok_id,
                        metadata,
                        result: Ok(bytes),
                    },
                ));
            }),
            Box::new(move |msg| {
                let _ = err_tx.send((
                    generation,
                    LoadMessage::Geometry {
                        model_id: err_id,
                        metadata: err_metadata,
                        result: Err(msg),
                    },
                ));
            }),
        );
    }

    fn finish_model(&mut self, model_id: &str, result: Result<(), String>) -> Step {
        let in_flight = match self.in_flight.take() {
            Some(job) if job.model_id == model_id => job,
            other => {
                self.in_flight = other;
                return Step::Progressed;
            }
        };
        match result {
            Ok(()) => {
                self.loaded.insert(model_id.to_string());
                info!("load_model() - '{model_id}' loaded");
                if let Some(done) = in_flight.done {
                    done();
                }
                Step::Event(ModelsEvent::ModelLoaded(model_id.to_string()))
            }
            Err(message) => {
                error!("load_model() - failed to load '{model_id}': {message}");
                if let Some(error) = in_flight.error {
                    error(message.clone());
                }
                Step::Event(ModelsEvent::ModelLoadFailed {
                    model_id: model_id.to_string(),
                    message,
                })
            }
        }
    }
}
