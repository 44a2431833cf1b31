pub mod bcf;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use bcf::{BcfViewpoint, ViewpointRequest};

/// Уникальный идентификатор объекта в сцене (дескриптор сущности движка)
pub type ObjectId = String;

/// Идентификатор модели
pub type ModelId = String;

/// Идентификатор проекта
pub type ProjectId = String;

/// Тип IFC для пространств
pub const IFC_SPACE: &str = "IfcSpace";
/// Тип IFC для проёмов
pub const IFC_OPENING: &str = "IfcOpeningElement";
/// Тип IFC для границ пространств
pub const IFC_SPACE_BOUNDARY: &str = "IfcSpaceBoundary";
/// Тип IFC для этажей
pub const IFC_BUILDING_STOREY: &str = "IfcBuildingStorey";

/// Краткая запись о проекте в списке проектов
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub id: ProjectId,
    pub name: String,
}

/// Список доступных проектов
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProjectsInfo {
    pub projects: Vec<ProjectSummary>,
}

/// Модель внутри проекта
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: ModelId,
    pub name: String,
}

/// Модели, загружаемые сразу после открытия проекта
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ViewerContent {
    #[serde(default)]
    pub models_loaded: Vec<ModelId>,
}

/// Параметры камеры для `set_camera`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CameraParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eye: Option<[f64; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub look: Option<[f64; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub up: Option<[f64; 3]>,
}

/// Состояние интерфейса, применяемое пакетно (`set_viewer_state`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ViewerStateDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_open: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub three_d_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_camera: Option<CameraParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_storey: Option<ObjectId>,
}

/// Описание проекта
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInfo {
    pub id: ProjectId,
    pub name: String,
    #[serde(default)]
    pub models: Vec<ModelInfo>,
    /// Настройки вьювера, применяемые при открытии проекта
    #[serde(default)]
    pub viewer_configs: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub viewer_content: ViewerContent,
    #[serde(default)]
    pub viewer_state: ViewerStateDoc,
}

/// Метаобъект модели (узел дерева IFC)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaObjectData {
    pub id: ObjectId,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub ifc_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ObjectId>,
    /// Внешний (IFC GUID) идентификатор; если нет, совпадает с `id`
    #[serde(default, rename = "externalId", skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

impl MetaObjectData {
    /// Внешний идентификатор объекта
    pub fn external_id(&self) -> &str {
        self.external_id.as_deref().unwrap_or(&self.id)
    }
}

/// Метаданные модели
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ModelMetadata {
    #[serde(default)]
    pub id: ModelId,
    #[serde(default)]
    pub project_id: ProjectId,
    #[serde(default)]
    pub meta_objects: Vec<MetaObjectData>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_info_camel_case() {
        let json = r#"{
            "id": "Duplex",
            "name": "Duplex",
            "models": [{"id": "design", "name": "Design"}, {"id": "structure", "name": "Structure"}],
            "viewerConfigs": {"saoEnabled": true},
            "viewerContent": {"modelsLoaded": ["design"]},
            "viewerState": {"tabOpen": "storeys", "threeDActive": false}
        }"#;
        let p: ProjectInfo = serde_json::from_str(json).unwrap();
        assert_eq!(p.models.len(), 2);
        assert_eq!(p.viewer_configs["saoEnabled"], serde_json::json!(true));
        assert_eq!(p.viewer_content.models_loaded, vec!["design".to_string()]);
        assert_eq!(p.viewer_state.tab_open.as_deref(), Some("storeys"));
        assert_eq!(p.viewer_state.three_d_active, Some(false));
    }

    #[test]
    fn test_project_info_minimal() {
        let p: ProjectInfo = serde_json::from_str(r#"{"id": "p", "name": "P"}"#).unwrap();
        assert!(p.models.is_empty());
        assert!(p.viewer_configs.is_empty());
        assert!(p.viewer_state.tab_open.is_none());
    }

    #[test]
    fn test_meta_object_external_id_fallback() {
        let json = r#"{"id": "wall-1", "name": "Wall", "type": "IfcWall", "parent": "storey-1"}"#;
        let m: MetaObjectData = serde_json::from_str(json).unwrap();
        assert_eq!(m.external_id(), "wall-1");
        assert_eq!(m.parent.as_deref(), Some("storey-1"));

        let json = r#"{"id": "wall-2", "type": "IfcWall", "externalId": "3cUkl32yn9qRSPvBJVyWYp"}"#;
        let m: MetaObjectData = serde_json::from_str(json).unwrap();
        assert_eq!(m.external_id(), "3cUkl32yn9qRSPvBJVyWYp");
    }
}
