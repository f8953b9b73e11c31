// src/model/ion.rs

use super::species::Rgb;
use serde::Serialize;
use std::fmt;

/// Species charge class of a lattice site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChargeClass {
  Cation,
  Anion,
}

impl ChargeClass {
  pub fn as_str(&self) -> &'static str {
    match self {
      ChargeClass::Cation => "cation",
      ChargeClass::Anion => "anion",
    }
  }

  pub fn is_cation(&self) -> bool {
    matches!(self, ChargeClass::Cation)
  }
}

impl fmt::Display for ChargeClass {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Stable identifier derived from the integer lattice coordinates of a site,
/// e.g. `ion-1-0-2` or `ion-0-0-0-f1` for a sub-lattice site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct IonId(String);

impl IonId {
  pub fn at(x: usize, y: usize, z: usize) -> Self {
    Self(format!("ion-{}-{}-{}", x, y, z))
  }

  pub fn with_suffix(x: usize, y: usize, z: usize, suffix: &str) -> Self {
    Self(format!("ion-{}-{}-{}-{}", x, y, z, suffix))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for IonId {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// One lattice site. Immutable once generated; a regeneration replaces the
/// whole set.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Ion {
  pub id: IonId,
  pub charge: ChargeClass,
  pub element: &'static str,
  // Lattice units, may carry fractional sub-lattice offsets
  pub position: [f64; 3],
  pub color: Rgb,
  pub radius: f64,
}

impl Ion {
  pub fn is_cation(&self) -> bool {
    self.charge.is_cation()
  }

  /// Text shown in the side panel for a selected ion: `Na (cation)`.
  pub fn describe(&self) -> String {
    format!("{} ({})", self.element, self.charge)
  }
}
