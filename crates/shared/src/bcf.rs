//! BCF viewpoint: переносимый снимок состояния вьювера (формат BCF-API JSON)

use serde::{Deserialize, Serialize};

/// Система-источник, записываемая в компоненты сохранённой точки обзора
pub const DEFAULT_ORIGINATING_SYSTEM: &str = "bim-viewer";

/// Точка или вектор в мировых координатах BCF (Z вверх)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct BcfPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl BcfPoint {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn from_array(v: [f64; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

/// Перспективная камера: точка глаза, НАПРАВЛЕНИЕ взгляда (не точка!), вектор вверх
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerspectiveCamera {
    pub camera_view_point: BcfPoint,
    pub camera_direction: BcfPoint,
    pub camera_up_vector: BcfPoint,
    /// Угол обзора в градусах
    pub field_of_view: f64,
}

/// Ортогональная камера
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrthogonalCamera {
    pub camera_view_point: BcfPoint,
    pub camera_direction: BcfPoint,
    pub camera_up_vector: BcfPoint,
    /// Масштаб вида (высота видимой области в мировых единицах)
    pub view_to_world_scale: f64,
}

/// Линия-аннотация (передаётся как есть)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub start_point: BcfPoint,
    pub end_point: BcfPoint,
}

/// Плоскость сечения
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClippingPlane {
    pub location: BcfPoint,
    pub direction: BcfPoint,
}

/// Встроенный снимок экрана
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// "png" или "jpg"
    pub snapshot_type: String,
    /// Data URL или base64 изображения
    pub snapshot_data: String,
}

/// Ссылка на объект модели по внешнему идентификатору
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Component {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ifc_guid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub originating_system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authoring_tool_id: Option<String>,
}

impl Component {
    /// Компонент, адресованный внешним идентификатором
    pub fn new(external_id: impl Into<String>, originating_system: &str, tool_id: impl Into<String>) -> Self {
        Self {
            ifc_guid: Some(external_id.into()),
            originating_system: Some(originating_system.to_string()),
            authoring_tool_id: Some(tool_id.into()),
        }
    }

    /// Идентификатор для поиска в сцене: сначала ifc_guid, затем authoring_tool_id
    pub fn lookup_id(&self) -> Option<&str> {
        self.ifc_guid
            .as_deref()
            .or(self.authoring_tool_id.as_deref())
    }
}

/// Подсказки отображения служебных типов IFC
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ViewSetupHints {
    #[serde(default)]
    pub spaces_visible: bool,
    #[serde(default)]
    pub space_boundaries_visible: bool,
    #[serde(default)]
    pub openings_visible: bool,
}

/// Видимость: значение по умолчанию + исключения
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visibility {
    pub default_visibility: bool,
    #[serde(default)]
    pub exceptions: Vec<Component>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_setup_hints: Option<ViewSetupHints>,
}

impl Default for Visibility {
    fn default() -> Self {
        Self {
            default_visibility: true,
            exceptions: Vec::new(),
            view_setup_hints: None,
        }
    }
}

/// Окраска группы объектов; цвет "RRGGBB" или "AARRGGBB"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coloring {
    pub color: String,
    #[serde(default)]
    pub components: Vec<Component>,
}

/// Блок компонентов точки обзора
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Components {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(default)]
    pub selection: Vec<Component>,
    #[serde(default)]
    pub coloring: Vec<Coloring>,
}

/// Точка обзора BCF
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BcfViewpoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perspective_camera: Option<PerspectiveCamera>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orthogonal_camera: Option<OrthogonalCamera>,
    #[serde(default)]
    pub lines: Vec<Line>,
    #[serde(default)]
    pub clipping_planes: Vec<ClippingPlane>,
    #[serde(default)]
    pub bitmaps: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<Snapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Components>,
}

impl BcfViewpoint {
    /// Видимость из блока компонентов, если задана
    pub fn visibility(&self) -> Option<&Visibility> {
        self.components.as_ref().and_then(|c| c.visibility.as_ref())
    }

    /// Выделенные компоненты (пустой срез, если блока нет)
    pub fn selection(&self) -> &[Component] {
        self.components
            .as_ref()
            .map(|c| c.selection.as_slice())
            .unwrap_or(&[])
    }
}

/// Запрос на восстановление: сброс вида или конкретная точка обзора
#[derive(Debug, Clone, PartialEq)]
pub enum ViewpointRequest {
    /// Сентинел "reset" / "RESET"
    Reset,
    Viewpoint(Box<BcfViewpoint>),
}

/// Ошибки разбора запроса точки обзора
#[derive(Debug, Clone, PartialEq)]
pub enum ViewpointParseError {
    /// Строка, не являющаяся сентинелом сброса
    UnknownSentinel(String),
    /// Документ не соответствует формату BCF
    Malformed(String),
}

impl std::fmt::Display for ViewpointParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViewpointParseError::UnknownSentinel(s) => {
                write!(f, "Unknown viewpoint sentinel '{}', expected \"reset\"", s)
            }
            ViewpointParseError::Malformed(msg) => write!(f, "Malformed BCF viewpoint: {}", msg),
        }
    }
}

impl std::error::Error for ViewpointParseError {}

impl ViewpointRequest {
    /// Разобрать JSON-значение: строка-сентинел или объект BCF
    pub fn from_value(value: serde_json::Value) -> Result<Self, ViewpointParseError> {
        match value {
            serde_json::Value::String(s) => match s.as_str() {
                "reset" | "RESET" => Ok(ViewpointRequest::Reset),
                _ => Err(ViewpointParseError::UnknownSentinel(s)),
            },
            other => serde_json::from_value::<BcfViewpoint>(other)
                .map(|vp| ViewpointRequest::Viewpoint(Box::new(vp)))
                .map_err(|e| ViewpointParseError::Malformed(e.to_string())),
        }
    }

    /// Разобрать JSON-строку
    pub fn from_json(json: &str) -> Result<Self, ViewpointParseError> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| ViewpointParseError::Malformed(e.to_string()))?;
        Self::from_value(value)
    }
}

impl From<BcfViewpoint> for ViewpointRequest {
    fn from(vp: BcfViewpoint) -> Self {
        ViewpointRequest::Viewpoint(Box::new(vp))
    }
}

impl<'de> Deserialize<'de> for ViewpointRequest {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        ViewpointRequest::from_value(value).map_err(serde::de::Error::custom)
    }
}
