// src/animation/shells.rs
// Electron shells orbiting a nucleus.

use super::scheduler::{CallbackHandle, FrameScheduler};
use log::{debug, info};
use std::cell::RefCell;
use std::f64::consts::TAU;
use std::rc::Rc;

pub const MAX_SHELLS: usize = 3;
pub const ELECTRONS_PER_SHELL: u32 = 8;

/// Radians per frame, innermost first.
pub const SHELL_SPEEDS: [f64; MAX_SHELLS] = [0.005, 0.003, 0.002];

/// Splits `electrons` over at most three shells, innermost first, eight per
/// shell. Electrons beyond the third shell are not represented.
pub fn partition(electrons: u32) -> Vec<u32> {
  let shells = (electrons.div_ceil(ELECTRONS_PER_SHELL) as usize).min(MAX_SHELLS);
  let mut remaining = electrons;
  (0..shells)
    .map(|_| {
      let n = remaining.min(ELECTRONS_PER_SHELL);
      remaining -= n;
      n
    })
    .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shell {
  pub electrons: u32,
  pub speed: f64,
  pub angle: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShellState {
  electrons: u32,
  shells: Vec<Shell>,
  frames: u64,
}

impl ShellState {
  pub fn new(electrons: u32) -> Self {
    let shells = partition(electrons)
      .into_iter()
      .zip(SHELL_SPEEDS)
      .map(|(electrons, speed)| Shell {
        electrons,
        speed,
        angle: 0.0,
      })
      .collect();
    Self {
      electrons,
      shells,
      frames: 0,
    }
  }

  /// One frame: every shell turns by its own speed.
  pub fn advance(&mut self) {
    for shell in &mut self.shells {
      // Wrapped only to keep the float small
      shell.angle = (shell.angle + shell.speed) % TAU;
    }
    self.frames += 1;
  }

  /// Angular positions of the electrons of shell `index`, evenly spread
  /// behind the shell's current angle.
  pub fn electron_angles(&self, index: usize) -> Vec<f64> {
    let Some(shell) = self.shells.get(index) else {
      return Vec::new();
    };
    let n = shell.electrons;
    (0..n)
      .map(|j| shell.angle + j as f64 * TAU / n as f64)
      .collect()
  }

  pub fn shells(&self) -> &[Shell] {
    &self.shells
  }

  pub fn electrons(&self) -> u32 {
    self.electrons
  }

  pub fn represented(&self) -> u32 {
    self.shells.iter().map(|s| s.electrons).sum()
  }

  /// Electrons beyond the three drawn shells (e.g. 30 for Cs+).
  pub fn unrepresented(&self) -> u32 {
    self.electrons - self.represented()
  }

  pub fn frames(&self) -> u64 {
    self.frames
  }
}

/// Ring radius of shell `index` around a nucleus of `nucleus_radius` pixels.
pub fn ring_radius(nucleus_radius: f64, index: usize) -> f64 {
  nucleus_radius * (index as f64 + 2.0)
}

// ============================================================================
// ANIMATOR
// ============================================================================

/// Drives a `ShellState` from a frame scheduler. The frame callback is
/// cancelled on `stop` or when the animator is dropped, whichever comes first.
pub struct ShellAnimator {
  state: Rc<RefCell<ShellState>>,
  handle: Option<CallbackHandle>,
}

impl ShellAnimator {
  pub fn new(electrons: u32) -> Self {
    let state = ShellState::new(electrons);
    if state.unrepresented() > 0 {
      debug!(
        "{} of {} electrons not drawn (max {} shells)",
        state.unrepresented(),
        electrons,
        MAX_SHELLS
      );
    }
    Self {
      state: Rc::new(RefCell::new(state)),
      handle: None,
    }
  }

  /// Starts the per-frame update; `on_frame` runs after each advance (the
  /// host queues a redraw there). Returns `false` if already running.
  pub fn start(&mut self, scheduler: &dyn FrameScheduler, on_frame: impl Fn() + 'static) -> bool {
    if self.is_running() {
      return false;
    }
    let state = Rc::downgrade(&self.state);
    let handle = scheduler.schedule_repeating(Box::new(move |_| {
      if let Some(state) = state.upgrade() {
        if let Ok(mut s) = state.try_borrow_mut() {
          s.advance();
        }
        on_frame();
      }
    }));
    self.handle = Some(handle);
    info!("Electron shells animating ({} electrons)", self.state.borrow().electrons());
    true
  }

  /// Cancels the frame callback. Idempotent: returns `false` when nothing
  /// was running.
  pub fn stop(&mut self) -> bool {
    match self.handle.take() {
      Some(handle) => {
        let cancelled = handle.cancel();
        if cancelled {
          info!("Electron shell animation stopped");
        }
        cancelled
      }
      None => false,
    }
  }

  /// Replaces the shells for a new electron count. Angles restart at zero;
  /// a running animation keeps running.
  pub fn set_electrons(&mut self, electrons: u32) {
    *self.state.borrow_mut() = ShellState::new(electrons);
  }

  pub fn is_running(&self) -> bool {
    self.handle.as_ref().map(|h| h.is_active()).unwrap_or(false)
  }

  pub fn state(&self) -> Rc<RefCell<ShellState>> {
    self.state.clone()
  }
}

impl Drop for ShellAnimator {
  fn drop(&mut self) {
    self.stop();
  }
}
