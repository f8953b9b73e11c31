//src/model/mod.rs
pub mod ion;
pub mod lattice;
pub mod species;

// Re-exports for cleaner imports
pub use ion::{ChargeClass, Ion, IonId};
pub use lattice::{generate, LatticeError, LatticeSpec, StructureType};
pub use species::{IonPreset, Rgb, Species};
