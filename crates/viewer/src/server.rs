//! Data-access collaborator: projects, model metadata, geometry and object
//! info, each delivered through a success callback or an error callback.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};
use shared::{ModelId, ModelMetadata, ObjectId, ProjectId, ProjectInfo, ProjectSummary, ProjectsInfo};

use crate::error::ViewerError;

/// Success callback
pub type Done<T> = Box<dyn FnOnce(T)>;
/// Error callback with a readable message
pub type Failed = Box<dyn FnOnce(String)>;

/// Data source of the viewer
pub trait Server {
    fn get_projects(&mut self, done: Done<ProjectsInfo>, error: Failed);

    fn get_project(&mut self, project_id: &str, done: Done<ProjectInfo>, error: Failed);

    fn get_metadata(
        &mut self,
        project_id: &str,
        model_id: &str,
        done: Done<ModelMetadata>,
        error: Failed,
    );

    /// Raw geometry document handed to the engine unchanged
    fn get_geometry(&mut self, project_id: &str, model_id: &str, done: Done<Vec<u8>>, error: Failed);

    fn get_object_info(
        &mut self,
        project_id: &str,
        model_id: &str,
        object_id: &str,
        done: Done<serde_json::Value>,
        error: Failed,
    );
}

/// One model inside a [`StaticProjectDoc`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticModelDoc {
    pub metadata: ModelMetadata,
    /// `{"entities": {"<id>": [xmin, ymin, zmin, xmax, ymax, zmax]}}`
    pub geometry: serde_json::Value,
}

/// Everything a [`StaticServer`] knows about one project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticProjectDoc {
    pub project: ProjectInfo,
    #[serde(default)]
    pub models: BTreeMap<ModelId, StaticModelDoc>,
    /// Object info keyed by object id
    #[serde(default)]
    pub objects: BTreeMap<ObjectId, serde_json::Value>,
}

/// In-memory server.
///
/// Replies immediately by default. In deferred mode replies are queued and
/// released one at a time with [`StaticServer::flush_one`].
#[derive(Default)]
pub struct StaticServer {
    projects: BTreeMap<ProjectId, StaticProjectDoc>,
    failing_models: BTreeSet<ModelId>,
    requests: Vec<String>,
    deferred: bool,
    pending: VecDeque<Box<dyn FnOnce()>>,
}

impl StaticServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project(mut self, doc: StaticProjectDoc) -> Self {
        self.add_project(doc);
        self
    }

    pub fn add_project(&mut self, doc: StaticProjectDoc) {
        self.projects.insert(doc.project.id.clone(), doc);
    }

    /// Parse a project document (see [`StaticProjectDoc`])
    pub fn from_json(json: &str) -> Result<Self, ViewerError> {
        let doc: StaticProjectDoc = serde_json::from_str(json)?;
        Ok(Self::new().with_project(doc))
    }

    /// Geometry requests for this model will fail
    pub fn fail_model(&mut self, model_id: &str) {
        self.failing_models.insert(model_id.to_string());
    }

    pub fn set_deferred(&mut self, deferred: bool) {
        self.deferred = deferred;
    }

    /// Release the oldest queued reply. Returns false when nothing was queued.
    pub fn flush_one(&mut self) -> bool {
        match self.pending.pop_front() {
            Some(reply) => {
                reply();
                true
            }
            None => false,
        }
    }

    pub fn flush_all(&mut self) -> usize {
        let mut n = 0;
        while self.flush_one() {
            n += 1;
        }
        n
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Every request received, as `"<call>:<args>"`
    pub fn requests(&self) -> &[String] {
        &self.requests
    }

    fn reply<T: 'static>(&mut self, result: Result<T, String>, done: Done<T>, error: Failed) {
        let reply: Box<dyn FnOnce()> = Box::new(move || match result {
            Ok(v) => done(v),
            Err(msg) => error(msg),
        });
        if self.deferred {
            self.pending.push_back(reply);
        } else {
            reply();
        }
    }

    fn model(&self, project_id: &str, model_id: &str) -> Result<&StaticModelDoc, String> {
        let project = self
            .projects
            .get(project_id)
            .ok_or_else(|| format!("Project not found: {project_id}"))?;
        project
            .models
            .get(model_id)
            .ok_or_else(|| format!("Model not found: {project_id}/{model_id}"))
    }
}

impl Server for StaticServer {
    fn get_projects(&mut self, done: Done<ProjectsInfo>, error: Failed) {
        self.requests.push("get_projects".to_string());
        let info = ProjectsInfo {
            projects: self
                .projects
                .values()
                .map(|doc| ProjectSummary {
                    id: doc.project.id.clone(),
                    name: doc.project.name.clone(),
                })
                .collect(),
        };
        self.reply(Ok(info), done, error);
    }

    fn get_project(&mut self, project_id: &str, done: Done<ProjectInfo>, error: Failed) {
        self.requests.push(format!("get_project:{project_id}"));
        let result = self
            .projects
            .get(project_id)
            .map(|doc| doc.project.clone())
            .ok_or_else(|| format!("Project not found: {project_id}"));
        self.reply(result, done, error);
    }

    fn get_metadata(
        &mut self,
        project_id: &str,
        model_id: &str,
        done: Done<ModelMetadata>,
        error: Failed,
    ) {
        self.requests
            .push(format!("get_metadata:{project_id}/{model_id}"));
        let result = self.model(project_id, model_id).map(|m| m.metadata.clone());
        self.reply(result, done, error);
    }

    fn get_geometry(&mut self, project_id: &str, model_id: &str, done: Done<Vec<u8>>, error: Failed) {
        self.requests
            .push(format!("get_geometry:{project_id}/{model_id}"));
        let result = if self.failing_models.contains(model_id) {
            Err(format!("Geometry unavailable: {project_id}/{model_id}"))
        } else {
            self.model(project_id, model_id).and_then(|m| {
                serde_json::to_vec(&m.geometry).map_err(|e| e.to_string())
            })
        };
        self.reply(result, done, error);
    }

    fn get_object_info(
        &mut self,
        project_id: &str,
        model_id: &str,
        object_id: &str,
        done: Done<serde_json::Value>,
        error: Failed,
    ) {
        self.requests
            .push(format!("get_object_info:{project_id}/{model_id}/{object_id}"));
        let result = self
            .projects
            .get(project_id)
            .and_then(|p| p.objects.get(object_id).cloned())
            .ok_or_else(|| format!("Object not found: {project_id}/{model_id}/{object_id}"));
        self.reply(result, done, error);
    }
}
