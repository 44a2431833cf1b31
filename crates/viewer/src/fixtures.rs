//! Factory functions for test data.
//!
//! A small two-storey building split over two models, plus helpers that wrap
//! it in an engine, a project document or a [`StaticServer`].

use std::collections::BTreeMap;

use serde_json::json;
use shared::*;

use crate::engine::{Engine, HeadlessEngine};
use crate::server::{StaticModelDoc, StaticProjectDoc, StaticServer};

pub const PROJECT_ID: &str = "duplex";
pub const DESIGN_MODEL: &str = "design";
pub const STRUCTURE_MODEL: &str = "structure";

pub const SITE: &str = "site";
pub const BUILDING: &str = "building";
pub const STOREY_1: &str = "storey-1";
pub const STOREY_2: &str = "storey-2";
pub const WALL_NORTH: &str = "wall-north";
pub const WALL_SOUTH: &str = "wall-south";
pub const SLAB: &str = "slab-1";
pub const SPACE: &str = "space-1";
pub const OPENING: &str = "opening-1";
pub const WALL_UPPER: &str = "wall-upper";
pub const SLAB_2: &str = "slab-2";
pub const COLUMN: &str = "column-1";

/// External (IFC GUID) identifier of a fixture object
pub fn guid(id: &str) -> String {
    format!("{id}-guid")
}

fn meta(id: &str, ifc_type: &str, parent: Option<&str>) -> MetaObjectData {
    MetaObjectData {
        id: id.to_string(),
        name: id.to_string(),
        ifc_type: ifc_type.to_string(),
        parent: parent.map(str::to_string),
        external_id: Some(guid(id)),
    }
}

// ── Models ──────────────────────────────────────────────────────

pub fn design_metadata() -> ModelMetadata {
    ModelMetadata {
        id: DESIGN_MODEL.to_string(),
        project_id: PROJECT_ID.to_string(),
        meta_objects: vec![
            meta(SITE, "IfcSite", None),
            meta(BUILDING, "IfcBuilding", Some(SITE)),
            meta(STOREY_1, IFC_BUILDING_STOREY, Some(BUILDING)),
            meta(STOREY_2, IFC_BUILDING_STOREY, Some(BUILDING)),
            meta(WALL_NORTH, "IfcWall", Some(STOREY_1)),
            meta(WALL_SOUTH, "IfcWall", Some(STOREY_1)),
            meta(SLAB, "IfcSlab", Some(STOREY_1)),
            meta(SPACE, IFC_SPACE, Some(STOREY_1)),
            meta(OPENING, IFC_OPENING, Some(STOREY_1)),
            meta(WALL_UPPER, "IfcWall", Some(STOREY_2)),
            meta(SLAB_2, "IfcSlab", Some(STOREY_2)),
        ],
    }
}

pub fn design_geometry() -> serde_json::Value {
    json!({
        "entities": {
            WALL_NORTH: [0.0, 9.8, 0.0, 10.0, 10.0, 3.0],
            WALL_SOUTH: [0.0, 0.0, 0.0, 10.0, 0.2, 3.0],
            SLAB: [0.0, 0.0, -0.2, 10.0, 10.0, 0.0],
            SPACE: [0.2, 0.2, 0.0, 9.8, 9.8, 3.0],
            OPENING: [4.0, 0.0, 1.0, 5.0, 0.2, 2.0],
            WALL_UPPER: [0.0, 9.8, 3.0, 10.0, 10.0, 6.0],
            SLAB_2: [0.0, 0.0, 2.8, 10.0, 10.0, 3.0],
        }
    })
}

pub fn structure_metadata() -> ModelMetadata {
    ModelMetadata {
        id: STRUCTURE_MODEL.to_string(),
        project_id: PROJECT_ID.to_string(),
        meta_objects: vec![
            meta("structure-root", "IfcBuilding", None),
            meta(COLUMN, "IfcColumn", Some("structure-root")),
        ],
    }
}

pub fn structure_geometry() -> serde_json::Value {
    json!({
        "entities": {
            COLUMN: [20.0, 20.0, 0.0, 20.5, 20.5, 6.0],
        }
    })
}

/// Engine with the design model loaded
pub fn building_engine() -> HeadlessEngine {
    let mut engine = HeadlessEngine::new();
    let geometry = design_geometry().to_string();
    if let Err(e) = engine.load_model(DESIGN_MODEL, &design_metadata(), geometry.as_bytes()) {
        panic!("fixture model failed to load: {e}");
    }
    engine
}

// ── Projects ────────────────────────────────────────────────────

/// Project with both models, opening the design model on load
pub fn building_project() -> ProjectInfo {
    ProjectInfo {
        id: PROJECT_ID.to_string(),
        name: "Duplex".to_string(),
        models: vec![
            ModelInfo {
                id: DESIGN_MODEL.to_string(),
                name: "Design".to_string(),
            },
            ModelInfo {
                id: STRUCTURE_MODEL.to_string(),
                name: "Structure".to_string(),
            },
        ],
        viewer_configs: BTreeMap::new(),
        viewer_content: ViewerContent {
            models_loaded: vec![DESIGN_MODEL.to_string()],
        },
        viewer_state: ViewerStateDoc::default(),
    }
}

pub fn project_doc() -> StaticProjectDoc {
    let mut models = BTreeMap::new();
    models.insert(
        DESIGN_MODEL.to_string(),
        StaticModelDoc {
            metadata: design_metadata(),
            geometry: design_geometry(),
        },
    );
    models.insert(
        STRUCTURE_MODEL.to_string(),
        StaticModelDoc {
            metadata: structure_metadata(),
            geometry: structure_geometry(),
        },
    );
    let mut objects = BTreeMap::new();
    objects.insert(
        WALL_NORTH.to_string(),
        json!({"id": WALL_NORTH, "name": "Basic Wall", "type": "IfcWall"}),
    );
    StaticProjectDoc {
        project: building_project(),
        models,
        objects,
    }
}

pub fn static_server() -> StaticServer {
    StaticServer::new().with_project(project_doc())
}

/// Server holding three single-object models `a`, `b`, `c` and no initial
/// content
pub fn abc_server() -> StaticServer {
    let mut models = BTreeMap::new();
    let mut infos = Vec::new();
    for (i, id) in ["a", "b", "c"].into_iter().enumerate() {
        let entity = format!("{id}-box");
        let x = i as f64 * 2.0;
        models.insert(
            id.to_string(),
            StaticModelDoc {
                metadata: ModelMetadata {
                    id: id.to_string(),
                    project_id: "abc".to_string(),
                    meta_objects: vec![meta(&entity, "IfcWall", None)],
                },
                geometry: json!({"entities": {entity: [x, 0.0, 0.0, x + 1.0, 1.0, 1.0]}}),
            },
        );
        infos.push(ModelInfo {
            id: id.to_string(),
            name: id.to_uppercase(),
        });
    }
    StaticServer::new().with_project(StaticProjectDoc {
        project: ProjectInfo {
            id: "abc".to_string(),
            name: "ABC".to_string(),
            models: infos,
            viewer_configs: BTreeMap::new(),
            viewer_content: ViewerContent::default(),
            viewer_state: ViewerStateDoc::default(),
        },
        models,
        objects: BTreeMap::new(),
    })
}
