pub mod sidebar;

pub use sidebar::ViewAreas;
