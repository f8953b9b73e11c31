pub mod camera;
pub mod device;
pub mod ion_grid;
pub mod painter;
pub mod primitives;
pub mod scene;

// Re-export the types the window code works with
pub use device::{new_surface_slot, CairoDevice, SurfaceSlot};
pub use ion_grid::IonGridView;
pub use scene::{SceneManager, SceneStatus, SharedScene, SurfaceHost};
