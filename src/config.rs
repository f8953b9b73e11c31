// src/config.rs

use crate::model::species::parse_hex_color;
use crate::model::{LatticeError, LatticeSpec, Rgb};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Environment variable through which the embedding shell hands over the
/// parameter set as JSON.
pub const PARAMS_ENV: &str = "IONVIEW_PARAMS";

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeClass {
  Small,
  #[default]
  Medium,
  Large,
}

/// Pixel geometry of the electron shell view for one size class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShellDimensions {
  pub width: f64,
  pub height: f64,
  pub nucleus_radius: f64,
  pub electron_radius: f64,
}

impl SizeClass {
  pub fn dimensions(&self) -> ShellDimensions {
    let (width, nucleus_radius, electron_radius) = match self {
      SizeClass::Small => (100.0, 15.0, 3.0),
      SizeClass::Medium => (200.0, 30.0, 5.0),
      SizeClass::Large => (300.0, 45.0, 8.0),
    };
    ShellDimensions {
      width,
      height: width,
      nucleus_radius,
      electron_radius,
    }
  }
}

// --- Scene (3D view) ---

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
  pub fov_deg: f64,
  pub near: f64,
  pub far: f64,
  pub distance: f64,
  pub damping_factor: f64,
  // Fraction per scroll step
  pub zoom_step: f64,
}

impl Default for CameraConfig {
  fn default() -> Self {
    Self {
      fov_deg: 75.0,
      near: 0.1,
      far: 1000.0,
      distance: 5.0,
      damping_factor: 0.05,
      zoom_step: 0.1,
    }
  }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightConfig {
  pub ambient_intensity: f64,
  pub directional_intensity: f64,
  pub directional_position: [f64; 3],
}

impl Default for LightConfig {
  fn default() -> Self {
    Self {
      ambient_intensity: 0.5,
      directional_intensity: 1.0,
      directional_position: [5.0, 5.0, 5.0],
    }
  }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
  pub camera: CameraConfig,
  pub lights: LightConfig,
  pub background_color: Rgb,
}

impl Default for SceneConfig {
  fn default() -> Self {
    Self {
      camera: CameraConfig::default(),
      lights: LightConfig::default(),
      // #111827
      background_color: (17.0 / 255.0, 24.0 / 255.0, 39.0 / 255.0),
    }
  }
}

// --- RenderStyle (transform view + colour overrides) ---

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderStyle {
  pub ion_spacing: f64,
  pub ion_diameter: f64,
  pub selected_scale: f64,
  pub perspective: f64,
  // Degrees of rotation per dragged pixel
  pub drag_sensitivity: f64,
  pub background_color: Rgb,
  // Per-species fill colours, given as [r, g, b] or "#rrggbb"
  #[serde(deserialize_with = "deserialize_colors")]
  pub element_colors: HashMap<String, Rgb>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ColorValue {
  Hex(String),
  Linear(Rgb),
}

fn deserialize_colors<'de, D>(deserializer: D) -> Result<HashMap<String, Rgb>, D::Error>
where
  D: Deserializer<'de>,
{
  let raw = HashMap::<String, ColorValue>::deserialize(deserializer)?;
  raw
    .into_iter()
    .map(|(element, value)| match value {
      ColorValue::Linear(rgb) => Ok((element, rgb)),
      ColorValue::Hex(text) => match parse_hex_color(&text) {
        Some(rgb) => Ok((element, rgb)),
        None => Err(serde::de::Error::custom(format!(
          "invalid colour '{}' for {}",
          text, element
        ))),
      },
    })
    .collect()
}

impl Default for RenderStyle {
  fn default() -> Self {
    Self {
      ion_spacing: 40.0,
      ion_diameter: 30.0,
      selected_scale: 1.3,
      perspective: 1000.0,
      drag_sensitivity: 0.5,
      background_color: (0.12, 0.13, 0.16),
      element_colors: HashMap::new(),
    }
  }
}

impl RenderStyle {
  /// Fill colour for `element`, honouring an override when one is set.
  pub fn color_for(&self, element: &str, default: Rgb) -> Rgb {
    self.element_colors.get(element).copied().unwrap_or(default)
  }
}

// --- Main Config Struct ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
  // Host key such as "nacl"; validated by `lattice_spec`
  pub structure: String,
  // Signed so a negative request from the shell reaches validation
  pub extent: i64,
  pub interactive: bool,
  pub size_class: SizeClass,
  // Ion shown by the electron shell view, e.g. "Na+"
  pub ion: String,
  pub scene: SceneConfig,
  pub style: RenderStyle,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      structure: "nacl".to_string(),
      extent: 3,
      interactive: true,
      size_class: SizeClass::Medium,
      ion: "Na+".to_string(),
      scene: SceneConfig::default(),
      style: RenderStyle::default(),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
  Parse(String),
}

impl fmt::Display for ConfigError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      ConfigError::Parse(msg) => write!(f, "Error parsing parameters: {}", msg),
    }
  }
}

impl std::error::Error for ConfigError {}

impl Config {
  pub fn from_json(json: &str) -> Result<Self, ConfigError> {
    serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
  }

  /// Reads the parameter blob from `IONVIEW_PARAMS`, falling back to
  /// defaults. Returns the config and a message for the console.
  pub fn from_env() -> (Self, String) {
    match std::env::var(PARAMS_ENV) {
      Ok(json) => match Self::from_json(&json) {
        Ok(cfg) => (cfg, format!("Parameters loaded from {}", PARAMS_ENV)),
        Err(e) => (Self::default(), format!("{}. Using defaults.", e)),
      },
      Err(_) => (
        Self::default(),
        "No parameters given. Using defaults.".to_string(),
      ),
    }
  }

  /// The requested lattice. Unknown structure names and out-of-range
  /// extents are rejected here, never replaced.
  pub fn lattice_spec(&self) -> Result<LatticeSpec, LatticeError> {
    LatticeSpec::parse(&self.structure, self.extent)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::StructureType;

  #[test]
  fn test_empty_json_gives_defaults() {
    let cfg = Config::from_json("{}").unwrap();
    assert_eq!(cfg, Config::default());
    assert_eq!(cfg.scene.camera.fov_deg, 75.0);
    assert_eq!(cfg.style.drag_sensitivity, 0.5);
  }

  #[test]
  fn test_partial_override() {
    let cfg = Config::from_json(
      r##"{
        "structure": "cscl",
        "extent": 4,
        "interactive": false,
        "size_class": "large",
        "style": { "element_colors": { "Cs": [1.0, 0.0, 0.0], "Cl": "#00ff00" } },
        "scene": { "camera": { "distance": 8.0 } }
      }"##,
    )
    .unwrap();

    assert_eq!(cfg.lattice_spec().unwrap().structure, StructureType::CesiumChloride);
    assert!(!cfg.interactive);
    assert_eq!(cfg.size_class.dimensions().nucleus_radius, 45.0);
    assert_eq!(cfg.scene.camera.distance, 8.0);
    assert_eq!(cfg.scene.camera.damping_factor, 0.05);
    assert_eq!(cfg.style.color_for("Cs", (0.0, 0.0, 0.0)), (1.0, 0.0, 0.0));
    assert_eq!(cfg.style.color_for("Cl", (0.5, 0.5, 0.5)), (0.0, 1.0, 0.0));
    assert_eq!(cfg.style.color_for("Na", (0.5, 0.5, 0.5)), (0.5, 0.5, 0.5));
    assert_eq!(cfg.lattice_spec().unwrap().extent, 4);
  }

  #[test]
  fn test_structure_aliases() {
    let cfg = Config::from_json(r#"{ "structure": "fluorite" }"#).unwrap();
    assert_eq!(cfg.lattice_spec().unwrap().structure, StructureType::Fluorite);
  }

  #[test]
  fn test_invalid_input_is_reported() {
    // The rest of the parameter set survives an unknown structure
    let cfg = Config::from_json(r#"{ "structure": "zincblende", "extent": 2 }"#).unwrap();
    assert_eq!(cfg.extent, 2);
    assert_eq!(
      cfg.lattice_spec(),
      Err(LatticeError::InvalidStructureType("zincblende".into()))
    );

    assert!(matches!(
      Config::from_json(r##"{ "style": { "element_colors": { "Na": "#12345" } } }"##),
      Err(ConfigError::Parse(_))
    ));

    let cfg = Config::from_json(r#"{ "extent": -2 }"#).unwrap();
    assert_eq!(cfg.lattice_spec(), Err(LatticeError::NegativeExtent(-2)));
  }
}
