// src/model/species.rs
// Species tables: symbols, colours and render radii per structure type, plus
// the ion presets shown by the electron shell animator.

use super::ion::ChargeClass;
use super::lattice::StructureType;

/// Linear (r, g, b) in 0..1, the same tuple form the style tables use.
pub type Rgb = (f64, f64, f64);

/// Converts a packed 0xRRGGBB value.
pub fn rgb_from_u32(hex: u32) -> Rgb {
  (
    ((hex >> 16) & 0xff) as f64 / 255.0,
    ((hex >> 8) & 0xff) as f64 / 255.0,
    (hex & 0xff) as f64 / 255.0,
  )
}

/// Parses `#rrggbb`, `rrggbb` or the short `#rgb` form.
pub fn parse_hex_color(text: &str) -> Option<Rgb> {
  let digits = text.trim().trim_start_matches('#');
  if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
    return None;
  }
  match digits.len() {
    6 => u32::from_str_radix(digits, 16).ok().map(rgb_from_u32),
    3 => {
      let expanded: String = digits.chars().flat_map(|c| [c, c]).collect();
      u32::from_str_radix(&expanded, 16).ok().map(rgb_from_u32)
    }
    _ => None,
  }
}

/// Visual description of one species inside a given structure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Species {
  pub symbol: &'static str,
  pub charge: ChargeClass,
  pub color: Rgb,
  pub emissive: Rgb,
  pub radius: f64,
}

/// Returns (symbol, color, emissive, radius) for the species of `charge` in
/// `structure`. Cations and anions are sized differently per structure.
pub fn species_for(structure: StructureType, charge: ChargeClass) -> Species {
  let (symbol, color, emissive, radius) = match (structure, charge) {
    // --- Rock salt ---
    (StructureType::RockSalt, ChargeClass::Cation) => ("Na", 0x9c59ff, 0x3a0070, 0.2),
    (StructureType::RockSalt, ChargeClass::Anion) => ("Cl", 0x59ff8e, 0x007030, 0.3),

    // --- Cesium chloride (Cs+ is the larger ion) ---
    (StructureType::CesiumChloride, ChargeClass::Cation) => ("Cs", 0xff9c59, 0x703000, 0.3),
    (StructureType::CesiumChloride, ChargeClass::Anion) => ("Cl", 0x59ff8e, 0x007030, 0.25),

    // --- Fluorite ---
    (StructureType::Fluorite, ChargeClass::Cation) => ("Ca", 0xff5959, 0x700000, 0.25),
    (StructureType::Fluorite, ChargeClass::Anion) => ("F", 0x59c2ff, 0x004070, 0.2),

    // --- Rutile ---
    (StructureType::Rutile, ChargeClass::Cation) => ("Ti", 0xa0a0a0, 0x303030, 0.2),
    (StructureType::Rutile, ChargeClass::Anion) => ("O", 0xff5959, 0x700000, 0.25),
  };

  Species {
    symbol,
    charge,
    color: rgb_from_u32(color),
    emissive: rgb_from_u32(emissive),
    radius,
  }
}

// ============================================================================
// ION PRESETS (electron shell animator)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IonPreset {
  pub label: &'static str,
  pub electrons: u32,
  pub color: Rgb,
  pub electron_color: Rgb,
}

pub const PRESET_LABELS: &[&str] = &["Na+", "Cl-", "Cs+", "Ca2+", "Ti4+", "O2-"];

/// Looks up the preset for an ion label such as `Na+` or `O2-`.
pub fn ion_preset(label: &str) -> Option<IonPreset> {
  PRESET_LABELS
    .iter()
    .any(|l| *l == label)
    .then(|| ion_preset_or_default(label))
}

/// Preset for `label`, or the Na+ preset for labels the catalogue lacks.
pub fn ion_preset_or_default(label: &str) -> IonPreset {
  let (label, electrons, color, electron_color) = match label {
    "Cl-" => ("Cl-", 18, 0x59ff8e, 0x00ddff),
    "Cs+" => ("Cs+", 54, 0xff9c59, 0x59ff8e),
    "Ca2+" => ("Ca2+", 18, 0xff5959, 0x59c2ff),
    "Ti4+" => ("Ti4+", 18, 0xa0a0a0, 0xff5959),
    "O2-" => ("O2-", 10, 0xff5959, 0x00ddff),
    _ => ("Na+", 10, 0x9c59ff, 0x59ff8e),
  };
  IonPreset {
    label,
    electrons,
    color: rgb_from_u32(color),
    electron_color: rgb_from_u32(electron_color),
  }
}
