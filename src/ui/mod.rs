pub mod host;
pub mod interactions;

// Re-exports
pub use host::GtkSurfaceHost;
pub use interactions::{setup_grid_interactions, setup_scene_interactions};
