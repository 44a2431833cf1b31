//! Viewer configuration: a closed set of named settings, each with a value
//! coercion and an effect on the engine.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::engine::{EngineSetting, MaterialStyle};
use crate::error::ViewerError;

/// Expected value type of a setting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKind {
    /// `true` or the string `"true"`; anything else reads as false
    Bool,
    /// Number or numeric string
    Float,
    /// `[r, g, b]`, components in 0..=1
    Color,
    /// Stored as given
    Opaque,
}

/// Recognized configuration keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfigKey {
    BackgroundColor,
    CameraNear,
    CameraFar,
    SmartPivot,
    SaoEnabled,
    SaoBias,
    SaoIntensity,
    SaoKernelRadius,
    SaoNumSamples,
    SaoBlur,
    EdgesEnabled,
    PbrEnabled,
    ScaleCanvasResolution,
    ViewFitFov,
    ViewFitDuration,
    PerspectiveFov,
    ExcludeUnclassifiedObjects,
    XrayContext,
    XrayPickable,
    SelectedGlowThrough,
    HighlightGlowThrough,
    ExternalMetadata,
    ShowSpaces,
    DtxEnabled,
    ObjectColors,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 25] = [
        ConfigKey::BackgroundColor,
        ConfigKey::CameraNear,
        ConfigKey::CameraFar,
        ConfigKey::SmartPivot,
        ConfigKey::SaoEnabled,
        ConfigKey::SaoBias,
        ConfigKey::SaoIntensity,
        ConfigKey::SaoKernelRadius,
        ConfigKey::SaoNumSamples,
        ConfigKey::SaoBlur,
        ConfigKey::EdgesEnabled,
        ConfigKey::PbrEnabled,
        ConfigKey::ScaleCanvasResolution,
        ConfigKey::ViewFitFov,
        ConfigKey::ViewFitDuration,
        ConfigKey::PerspectiveFov,
        ConfigKey::ExcludeUnclassifiedObjects,
        ConfigKey::XrayContext,
        ConfigKey::XrayPickable,
        ConfigKey::SelectedGlowThrough,
        ConfigKey::HighlightGlowThrough,
        ConfigKey::ExternalMetadata,
        ConfigKey::ShowSpaces,
        ConfigKey::DtxEnabled,
        ConfigKey::ObjectColors,
    ];

    /// Name on the configuration surface
    pub fn name(&self) -> &'static str {
        match self {
            ConfigKey::BackgroundColor => "backgroundColor",
            ConfigKey::CameraNear => "cameraNear",
            ConfigKey::CameraFar => "cameraFar",
            ConfigKey::SmartPivot => "smartPivot",
            ConfigKey::SaoEnabled => "saoEnabled",
            ConfigKey::SaoBias => "saoBias",
            ConfigKey::SaoIntensity => "saoIntensity",
            ConfigKey::SaoKernelRadius => "saoKernelRadius",
            ConfigKey::SaoNumSamples => "saoNumSamples",
            ConfigKey::SaoBlur => "saoBlur",
            ConfigKey::EdgesEnabled => "edgesEnabled",
            ConfigKey::PbrEnabled => "pbrEnabled",
            ConfigKey::ScaleCanvasResolution => "scaleCanvasResolution",
            ConfigKey::ViewFitFov => "viewFitFOV",
            ConfigKey::ViewFitDuration => "viewFitDuration",
            ConfigKey::PerspectiveFov => "perspectiveFOV",
            ConfigKey::ExcludeUnclassifiedObjects => "excludeUnclassifiedObjects",
            ConfigKey::XrayContext => "xrayContext",
            ConfigKey::XrayPickable => "xrayPickable",
            ConfigKey::SelectedGlowThrough => "selectedGlowThrough",
            ConfigKey::HighlightGlowThrough => "highlightGlowThrough",
            ConfigKey::ExternalMetadata => "externalMetadata",
            ConfigKey::ShowSpaces => "showSpaces",
            ConfigKey::DtxEnabled => "dtxEnabled",
            ConfigKey::ObjectColors => "objectColors",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    pub fn kind(&self) -> ConfigKind {
        match self {
            ConfigKey::BackgroundColor => ConfigKind::Color,
            ConfigKey::CameraNear
            | ConfigKey::CameraFar
            | ConfigKey::SaoBias
            | ConfigKey::SaoIntensity
            | ConfigKey::SaoKernelRadius
            | ConfigKey::SaoNumSamples
            | ConfigKey::ViewFitFov
            | ConfigKey::ViewFitDuration
            | ConfigKey::PerspectiveFov => ConfigKind::Float,
            ConfigKey::ObjectColors | ConfigKey::XrayContext => ConfigKind::Opaque,
            _ => ConfigKind::Bool,
        }
    }

    /// Value applied at construction
    pub fn default_value(&self) -> Value {
        match self {
            ConfigKey::BackgroundColor => serde_json::json!([1.0, 1.0, 1.0]),
            ConfigKey::CameraNear => Value::from("0.05"),
            ConfigKey::CameraFar => Value::from("3000.0"),
            ConfigKey::SmartPivot => Value::Bool(true),
            ConfigKey::SaoEnabled => Value::Bool(true),
            ConfigKey::SaoBias => Value::from(0.5),
            ConfigKey::SaoIntensity => Value::from(0.15),
            ConfigKey::SaoKernelRadius => Value::from(100),
            ConfigKey::SaoNumSamples => Value::from(40),
            ConfigKey::SaoBlur => Value::Bool(true),
            ConfigKey::EdgesEnabled => Value::Bool(true),
            ConfigKey::PbrEnabled => Value::Bool(false),
            ConfigKey::ScaleCanvasResolution => Value::Bool(false),
            ConfigKey::ViewFitFov => Value::from(45),
            ConfigKey::ViewFitDuration => Value::from(0.5),
            ConfigKey::PerspectiveFov => Value::from(60),
            ConfigKey::ExcludeUnclassifiedObjects => Value::Bool(false),
            ConfigKey::XrayContext => Value::Bool(true),
            ConfigKey::XrayPickable => Value::Bool(false),
            ConfigKey::SelectedGlowThrough => Value::Bool(true),
            ConfigKey::HighlightGlowThrough => Value::Bool(true),
            ConfigKey::ExternalMetadata => Value::Bool(false),
            ConfigKey::ShowSpaces => Value::Bool(false),
            ConfigKey::DtxEnabled => Value::Bool(false),
            ConfigKey::ObjectColors => Value::Object(Default::default()),
        }
    }

    /// Convert a raw value to this key's type
    pub fn coerce(&self, value: &Value) -> Result<ConfigValue, String> {
        match self.kind() {
            ConfigKind::Bool => Ok(ConfigValue::Bool(parse_bool(value))),
            ConfigKind::Float => parse_float(value).map(ConfigValue::Float),
            ConfigKind::Color => parse_color(value).map(ConfigValue::Color),
            ConfigKind::Opaque => Ok(ConfigValue::Opaque(value.clone())),
        }
    }
}

/// A coerced configuration value
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Bool(bool),
    Float(f64),
    Color([f64; 3]),
    Opaque(Value),
}

impl ConfigValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConfigValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ConfigValue::Bool(b) => Value::Bool(*b),
            ConfigValue::Float(v) => serde_json::Number::from_f64(*v)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ConfigValue::Color(c) => serde_json::json!(c),
            ConfigValue::Opaque(v) => v.clone(),
        }
    }
}

fn parse_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s == "true",
        _ => false,
    }
}

fn parse_float(value: &Value) -> Result<f64, String> {
    let v = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    v.filter(|v| v.is_finite())
        .ok_or_else(|| format!("expected a number, got {value}"))
}

fn parse_color(value: &Value) -> Result<[f64; 3], String> {
    let invalid = || format!("expected [r, g, b], got {value}");
    let arr = value.as_array().ok_or_else(invalid)?;
    if arr.len() != 3 {
        return Err(invalid());
    }
    let mut rgb = [0.0; 3];
    for (slot, v) in rgb.iter_mut().zip(arr) {
        *slot = v.as_f64().ok_or_else(invalid)?;
    }
    Ok(rgb)
}

/// Parse the `objectColors` document: IFC type to `[r, g, b]`
pub fn parse_object_colors(value: &Value) -> Result<BTreeMap<String, [f64; 3]>, String> {
    let map = value
        .as_object()
        .ok_or_else(|| format!("objectColors must be an object, got {value}"))?;
    map.iter()
        .map(|(ifc_type, color)| {
            parse_color(color)
                .map(|c| (ifc_type.clone(), c))
                .map_err(|e| format!("objectColors.{ifc_type}: {e}"))
        })
        .collect()
}

/// Where configuration effects land
pub trait ConfigTarget {
    fn apply_engine_setting(&mut self, setting: EngineSetting) -> Result<(), String>;
    fn set_spaces_shown(&mut self, shown: bool);
    fn set_object_colors(&mut self, colors: BTreeMap<String, [f64; 3]>);
}

/// Last applied value of each setting
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    values: BTreeMap<ConfigKey, ConfigValue>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one setting. Unknown names are logged and ignored; a failed
    /// coercion stores nothing; a failed apply keeps the stored value.
    pub fn set_config(
        &mut self,
        name: &str,
        value: &Value,
        target: &mut impl ConfigTarget,
    ) -> Result<(), ViewerError> {
        let Some(key) = ConfigKey::from_name(name) else {
            tracing::warn!("set_config() - unsupported configuration: '{name}'");
            return Err(ViewerError::UnknownIdentifier(format!("configuration '{name}'")));
        };
        self.set(key, value, target).inspect_err(|e| {
            tracing::error!("set_config() - {e}");
        })
    }

    /// Apply a batch; each entry stands alone. Returns the failures.
    pub fn set_configs<'a>(
        &mut self,
        configs: impl IntoIterator<Item = (&'a String, &'a Value)>,
        target: &mut impl ConfigTarget,
    ) -> Vec<ViewerError> {
        configs
            .into_iter()
            .filter_map(|(name, value)| self.set_config(name, value, target).err())
            .collect()
    }

    /// Apply every default
    pub fn apply_defaults(&mut self, target: &mut impl ConfigTarget) -> Vec<ViewerError> {
        ConfigKey::ALL
            .into_iter()
            .filter_map(|key| {
                self.set(key, &key.default_value(), target)
                    .inspect_err(|e| tracing::error!("apply_defaults() - {e}"))
                    .err()
            })
            .collect()
    }

    fn set(
        &mut self,
        key: ConfigKey,
        value: &Value,
        target: &mut impl ConfigTarget,
    ) -> Result<(), ViewerError> {
        let apply_err = |message: String| ViewerError::ConfigApply {
            key: key.name().to_string(),
            message,
        };
        let coerced = key.coerce(value).map_err(apply_err)?;
        self.values.insert(key, coerced.clone());
        apply(key, &coerced, target).map_err(apply_err)
    }

    pub fn get(&self, key: ConfigKey) -> Option<&ConfigValue> {
        self.values.get(&key)
    }

    /// Stored value as JSON; `None` for unknown or never-set names
    pub fn get_config(&self, name: &str) -> Option<Value> {
        let key = ConfigKey::from_name(name)?;
        self.values.get(&key).map(ConfigValue::to_json)
    }

    pub fn get_bool(&self, key: ConfigKey) -> bool {
        self.get(key).and_then(ConfigValue::as_bool).unwrap_or(false)
    }

    pub fn get_f64(&self, key: ConfigKey) -> Option<f64> {
        self.get(key).and_then(ConfigValue::as_f64)
    }

    /// All stored values by name
    pub fn to_map(&self) -> BTreeMap<String, Value> {
        self.values
            .iter()
            .map(|(k, v)| (k.name().to_string(), v.to_json()))
            .collect()
    }
}

fn apply(key: ConfigKey, value: &ConfigValue, target: &mut impl ConfigTarget) -> Result<(), String> {
    let setting = match (key, value) {
        (ConfigKey::BackgroundColor, ConfigValue::Color(c)) => EngineSetting::BackgroundColor(*c),
        (ConfigKey::CameraNear, ConfigValue::Float(v)) => EngineSetting::CameraNear(*v),
        (ConfigKey::CameraFar, ConfigValue::Float(v)) => EngineSetting::CameraFar(*v),
        (ConfigKey::SmartPivot, ConfigValue::Bool(b)) => EngineSetting::SmartPivot(*b),
        (ConfigKey::SaoEnabled, ConfigValue::Bool(b)) => EngineSetting::SaoEnabled(*b),
        (ConfigKey::SaoBias, ConfigValue::Float(v)) => EngineSetting::SaoBias(*v),
        (ConfigKey::SaoIntensity, ConfigValue::Float(v)) => EngineSetting::SaoIntensity(*v),
        (ConfigKey::SaoKernelRadius, ConfigValue::Float(v)) => EngineSetting::SaoKernelRadius(*v),
        (ConfigKey::SaoNumSamples, ConfigValue::Float(v)) => EngineSetting::SaoNumSamples(*v),
        (ConfigKey::SaoBlur, ConfigValue::Bool(b)) => EngineSetting::SaoBlur(*b),
        (ConfigKey::EdgesEnabled, ConfigValue::Bool(b)) => EngineSetting::EdgesEnabled(*b),
        (ConfigKey::PbrEnabled, ConfigValue::Bool(b)) => EngineSetting::PbrEnabled(*b),
        (ConfigKey::ScaleCanvasResolution, ConfigValue::Bool(b)) => {
            EngineSetting::ScaleCanvasResolution(*b)
        }
        (ConfigKey::ViewFitFov, ConfigValue::Float(v)) => EngineSetting::ViewFitFov(*v),
        (ConfigKey::ViewFitDuration, ConfigValue::Float(v)) => EngineSetting::ViewFitDuration(*v),
        (ConfigKey::PerspectiveFov, ConfigValue::Float(v)) => EngineSetting::PerspectiveFov(*v),
        (ConfigKey::XrayPickable, ConfigValue::Bool(b)) => EngineSetting::XrayPickable(*b),
        (ConfigKey::SelectedGlowThrough, ConfigValue::Bool(b)) => {
            EngineSetting::SelectedMaterial(MaterialStyle::glow_through(*b))
        }
        (ConfigKey::HighlightGlowThrough, ConfigValue::Bool(b)) => {
            EngineSetting::HighlightMaterial(MaterialStyle::glow_through(*b))
        }
        (ConfigKey::DtxEnabled, ConfigValue::Bool(b)) => EngineSetting::DtxEnabled(*b),
        (ConfigKey::ShowSpaces, ConfigValue::Bool(b)) => {
            target.set_spaces_shown(*b);
            return Ok(());
        }
        (ConfigKey::ObjectColors, ConfigValue::Opaque(v)) => {
            target.set_object_colors(parse_object_colors(v)?);
            return Ok(());
        }
        // Read by the viewer when it needs them
        (ConfigKey::ExcludeUnclassifiedObjects, _)
        | (ConfigKey::XrayContext, _)
        | (ConfigKey::ExternalMetadata, _) => return Ok(()),
        (key, value) => {
            return Err(format!("value {value:?} does not fit '{}'", key.name()));
        }
    };
    target.apply_engine_setting(setting)
}
