// src/model/lattice.rs
// Deterministic ion-site generation for the four modelled structure types.
// Only rock salt is an exact unit-cell tiling; cesium chloride, fluorite and
// rutile are illustrative clusters.

use super::ion::{ChargeClass, Ion, IonId};
use super::species::species_for;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Upper bound on the grid extent accepted at the boundary.
pub const MAX_EXTENT: usize = 32;

/// Fractional offsets of the two anions placed near an even fluorite site.
const FLUORITE_ANION_OFFSETS: [([f64; 3], &str); 2] =
  [([0.25, 0.25, 0.25], "f1"), ([0.75, 0.75, 0.25], "f2")];

// --- 1. STRUCTURE TYPE ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StructureType {
  #[serde(rename = "nacl", alias = "rock-salt")]
  RockSalt,
  #[serde(rename = "cscl", alias = "cesium-chloride")]
  CesiumChloride,
  #[serde(rename = "caf2", alias = "fluorite")]
  Fluorite,
  #[serde(rename = "tio2", alias = "rutile")]
  Rutile,
}

impl StructureType {
  pub const ALL: [StructureType; 4] = [
    StructureType::RockSalt,
    StructureType::CesiumChloride,
    StructureType::Fluorite,
    StructureType::Rutile,
  ];

  /// Short key used by the host shell (`nacl`, `cscl`, `caf2`, `tio2`).
  pub fn key(&self) -> &'static str {
    match self {
      StructureType::RockSalt => "nacl",
      StructureType::CesiumChloride => "cscl",
      StructureType::Fluorite => "caf2",
      StructureType::Rutile => "tio2",
    }
  }

  pub fn display_name(&self) -> &'static str {
    match self {
      StructureType::RockSalt => "Rock salt (NaCl)",
      StructureType::CesiumChloride => "Cesium chloride (CsCl)",
      StructureType::Fluorite => "Fluorite (CaF2)",
      StructureType::Rutile => "Rutile (TiO2)",
    }
  }

  pub fn index(&self) -> usize {
    match self {
      StructureType::RockSalt => 0,
      StructureType::CesiumChloride => 1,
      StructureType::Fluorite => 2,
      StructureType::Rutile => 3,
    }
  }

  pub fn from_index(index: usize) -> Option<Self> {
    Self::ALL.get(index).copied()
  }
}

impl Default for StructureType {
  fn default() -> Self {
    StructureType::RockSalt
  }
}

impl fmt::Display for StructureType {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.write_str(self.display_name())
  }
}

impl FromStr for StructureType {
  type Err = LatticeError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "nacl" | "rock-salt" | "rocksalt" | "rock_salt" => Ok(StructureType::RockSalt),
      "cscl" | "cesium-chloride" | "cesium_chloride" => Ok(StructureType::CesiumChloride),
      "caf2" | "fluorite" => Ok(StructureType::Fluorite),
      "tio2" | "rutile" => Ok(StructureType::Rutile),
      _ => Err(LatticeError::InvalidStructureType(s.to_string())),
    }
  }
}

// --- 2. ERROR HANDLING ---

#[derive(Debug, Clone, PartialEq)]
pub enum LatticeError {
  InvalidStructureType(String),
  NegativeExtent(i64),
  ExtentTooLarge { requested: usize, max: usize },
}

impl fmt::Display for LatticeError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      LatticeError::InvalidStructureType(name) => {
        write!(f, "Unrecognized structure type '{}'", name)
      }
      LatticeError::NegativeExtent(n) => write!(f, "Grid extent must be non-negative, got {}", n),
      LatticeError::ExtentTooLarge { requested, max } => write!(
        f,
        "Grid extent too large: {} requested, max {} allowed",
        requested, max
      ),
    }
  }
}

impl std::error::Error for LatticeError {}

// --- 3. VALIDATED INPUT ---

/// Validated (structure type, grid extent) pair. Generation from a `LatticeSpec` is
/// total; every rejection happens here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatticeSpec {
  pub structure: StructureType,
  pub extent: usize,
}

impl LatticeSpec {
  pub fn new(structure: StructureType, extent: i64) -> Result<Self, LatticeError> {
    if extent < 0 {
      return Err(LatticeError::NegativeExtent(extent));
    }
    let extent = extent as usize;
    if extent > MAX_EXTENT {
      return Err(LatticeError::ExtentTooLarge {
        requested: extent,
        max: MAX_EXTENT,
      });
    }
    Ok(Self { structure, extent })
  }

  /// Parses a structure name coming from the host shell.
  pub fn parse(structure: &str, extent: i64) -> Result<Self, LatticeError> {
    Self::new(structure.parse()?, extent)
  }

  pub fn generate(&self) -> Vec<Ion> {
    generate(self.structure, self.extent)
  }
}

impl Default for LatticeSpec {
  fn default() -> Self {
    Self {
      structure: StructureType::RockSalt,
      extent: 3,
    }
  }
}

// --- 4. GENERATION ---

/// Produces the ordered ion sequence for `structure` over the cube `[0, n)^3`.
/// Pure and deterministic; `n == 0` yields an empty sequence.
pub fn generate(structure: StructureType, n: usize) -> Vec<Ion> {
  match structure {
    StructureType::RockSalt => rock_salt(n),
    StructureType::CesiumChloride => cesium_chloride(n),
    StructureType::Fluorite => fluorite(n),
    StructureType::Rutile => rutile(n),
  }
}

fn make_ion(structure: StructureType, charge: ChargeClass, id: IonId, position: [f64; 3]) -> Ion {
  let species = species_for(structure, charge);
  Ion {
    id,
    charge,
    element: species.symbol,
    position,
    color: species.color,
    radius: species.radius,
  }
}

fn sites(n: usize) -> impl Iterator<Item = (usize, usize, usize)> {
  (0..n).flat_map(move |x| (0..n).flat_map(move |y| (0..n).map(move |z| (x, y, z))))
}

fn parity_charge(x: usize, y: usize, z: usize) -> ChargeClass {
  if (x + y + z) % 2 == 0 {
    ChargeClass::Cation
  } else {
    ChargeClass::Anion
  }
}

fn on_edge(c: usize, n: usize) -> bool {
  c == 0 || c + 1 == n
}

fn rock_salt(n: usize) -> Vec<Ion> {
  sites(n)
    .map(|(x, y, z)| {
      make_ion(
        StructureType::RockSalt,
        parity_charge(x, y, z),
        IonId::at(x, y, z),
        [x as f64, y as f64, z as f64],
      )
    })
    .collect()
}

fn cesium_chloride(n: usize) -> Vec<Ion> {
  let center = n / 2;
  let mut ions = Vec::new();
  for (x, y, z) in sites(n) {
    let pos = [x as f64, y as f64, z as f64];
    if on_edge(x, n) || on_edge(y, n) || on_edge(z, n) {
      ions.push(make_ion(
        StructureType::CesiumChloride,
        ChargeClass::Cation,
        IonId::at(x, y, z),
        pos,
      ));
    } else if x == center && y == center && z == center {
      ions.push(make_ion(
        StructureType::CesiumChloride,
        ChargeClass::Anion,
        IonId::at(x, y, z),
        pos,
      ));
    }
  }
  ions
}

fn fluorite(n: usize) -> Vec<Ion> {
  let mut ions = Vec::new();
  for (x, y, z) in sites(n) {
    if on_edge(x, n) && on_edge(y, n) && on_edge(z, n) {
      ions.push(make_ion(
        StructureType::Fluorite,
        ChargeClass::Cation,
        IonId::at(x, y, z),
        [x as f64, y as f64, z as f64],
      ));
    }

    // Two of the tetrahedral holes near each even site
    if (x + y + z) % 2 == 0 {
      for (offset, suffix) in FLUORITE_ANION_OFFSETS {
        ions.push(make_ion(
          StructureType::Fluorite,
          ChargeClass::Anion,
          IonId::with_suffix(x, y, z, suffix),
          [
            x as f64 + offset[0],
            y as f64 + offset[1],
            z as f64 + offset[2],
          ],
        ));
      }
    }
  }
  ions
}

fn rutile(n: usize) -> Vec<Ion> {
  sites(n)
    .map(|(x, y, z)| {
      let charge = parity_charge(x, y, z);
      let suffix = if charge.is_cation() { "ti" } else { "o" };
      make_ion(
        StructureType::Rutile,
        charge,
        IonId::with_suffix(x, y, z, suffix),
        [x as f64, y as f64, z as f64],
      )
    })
    .collect()
}
