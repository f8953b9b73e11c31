pub mod scheduler;
pub mod shells;

pub use scheduler::{CallbackHandle, FrameScheduler, GtkFrameScheduler, VirtualClock};
pub use shells::{partition, ShellAnimator, ShellState};
