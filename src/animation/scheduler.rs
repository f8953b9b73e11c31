// src/animation/scheduler.rs
// Cancellable repeating callbacks, independent of the host's frame primitive.
// `VirtualClock` is advanced by hand (tests, headless use); `GtkFrameScheduler`
// rides on widget tick callbacks.

use gtk4::glib;
use gtk4::prelude::*;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// Frame callback. Receives the host frame time in milliseconds.
pub type FrameTask = Box<dyn FnMut(f64)>;

/// Handle to any recurring registration: a frame task or an event listener.
///
/// `cancel` is idempotent: the first call releases the registration and
/// returns `true`, every later call is a no-op returning `false`.
pub struct CallbackHandle {
  active: Cell<bool>,
  on_cancel: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl CallbackHandle {
  pub fn new(on_cancel: impl FnOnce() + 'static) -> Self {
    Self {
      active: Cell::new(true),
      on_cancel: RefCell::new(Some(Box::new(on_cancel))),
    }
  }

  pub fn cancel(&self) -> bool {
    let release = self.on_cancel.borrow_mut().take();
    match release {
      Some(release) => {
        self.active.set(false);
        release();
        true
      }
      None => false,
    }
  }

  pub fn is_active(&self) -> bool {
    self.active.get()
  }
}

impl std::fmt::Debug for CallbackHandle {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    f.debug_struct("CallbackHandle")
      .field("active", &self.active.get())
      .finish()
  }
}

pub trait FrameScheduler {
  /// Runs `task` once per frame until the returned handle is cancelled.
  fn schedule_repeating(&self, task: FrameTask) -> CallbackHandle;
}

// ============================================================================
// VIRTUAL CLOCK
// ============================================================================

struct ClockTask {
  id: u64,
  task: Rc<RefCell<FrameTask>>,
}

struct ClockInner {
  now_ms: f64,
  frame_ms: f64,
  next_id: u64,
  tasks: Vec<ClockTask>,
}

/// Manually advanced frame source.
#[derive(Clone)]
pub struct VirtualClock {
  inner: Rc<RefCell<ClockInner>>,
}

impl VirtualClock {
  /// 60 Hz frames.
  pub fn new() -> Self {
    Self::with_frame_ms(1000.0 / 60.0)
  }

  pub fn with_frame_ms(frame_ms: f64) -> Self {
    Self {
      inner: Rc::new(RefCell::new(ClockInner {
        now_ms: 0.0,
        frame_ms,
        next_id: 0,
        tasks: Vec::new(),
      })),
    }
  }

  pub fn now_ms(&self) -> f64 {
    self.inner.borrow().now_ms
  }

  pub fn active_tasks(&self) -> usize {
    self.inner.borrow().tasks.len()
  }

  /// Steps `frames` frames, running every live task once per frame in
  /// registration order. Tasks cancelled mid-frame do not run again.
  pub fn advance(&self, frames: usize) {
    for _ in 0..frames {
      let (now, snapshot) = {
        let mut inner = self.inner.borrow_mut();
        inner.now_ms += inner.frame_ms;
        let snapshot: Vec<(u64, Rc<RefCell<FrameTask>>)> = inner
          .tasks
          .iter()
          .map(|t| (t.id, t.task.clone()))
          .collect();
        (inner.now_ms, snapshot)
      };

      for (id, task) in snapshot {
        let live = self.inner.borrow().tasks.iter().any(|t| t.id == id);
        if live {
          (task.borrow_mut())(now);
        }
      }
    }
  }
}

impl Default for VirtualClock {
  fn default() -> Self {
    Self::new()
  }
}

impl FrameScheduler for VirtualClock {
  fn schedule_repeating(&self, task: FrameTask) -> CallbackHandle {
    let id = {
      let mut inner = self.inner.borrow_mut();
      let id = inner.next_id;
      inner.next_id += 1;
      inner.tasks.push(ClockTask {
        id,
        task: Rc::new(RefCell::new(task)),
      });
      id
    };

    let weak: Weak<RefCell<ClockInner>> = Rc::downgrade(&self.inner);
    CallbackHandle::new(move || {
      if let Some(inner) = weak.upgrade() {
        inner.borrow_mut().tasks.retain(|t| t.id != id);
      }
    })
  }
}

// ============================================================================
// GTK FRAME SCHEDULER
// ============================================================================

/// Schedules tasks on a widget's frame clock.
pub struct GtkFrameScheduler {
  widget: gtk4::Widget,
}

impl GtkFrameScheduler {
  pub fn new(widget: &impl IsA<gtk4::Widget>) -> Self {
    Self {
      widget: widget.clone().upcast(),
    }
  }
}

impl FrameScheduler for GtkFrameScheduler {
  fn schedule_repeating(&self, task: FrameTask) -> CallbackHandle {
    let task = RefCell::new(task);
    let tick_id = self.widget.add_tick_callback(move |_, clock| {
      // frame_time is in microseconds
      (task.borrow_mut())(clock.frame_time() as f64 / 1000.0);
      glib::ControlFlow::Continue
    });
    CallbackHandle::new(move || tick_id.remove())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_handle_cancel_is_idempotent() {
    let released = Rc::new(Cell::new(0));
    let r = released.clone();
    let handle = CallbackHandle::new(move || r.set(r.get() + 1));

    assert!(handle.is_active());
    assert!(handle.cancel());
    assert!(!handle.cancel());
    assert!(!handle.is_active());
    assert_eq!(released.get(), 1);
  }

  #[test]
  fn test_virtual_clock_runs_until_cancelled() {
    let clock = VirtualClock::with_frame_ms(10.0);
    let frames = Rc::new(Cell::new(0));
    let f = frames.clone();
    let handle = clock.schedule_repeating(Box::new(move |_| f.set(f.get() + 1)));

    clock.advance(3);
    assert_eq!(frames.get(), 3);
    assert!((clock.now_ms() - 30.0).abs() < 1e-9);

    handle.cancel();
    handle.cancel();
    clock.advance(5);
    assert_eq!(frames.get(), 3);
    assert_eq!(clock.active_tasks(), 0);
  }

  #[test]
  fn test_task_cancelled_mid_frame_does_not_run() {
    let clock = VirtualClock::new();
    let second_runs = Rc::new(Cell::new(0));

    let slot: Rc<RefCell<Option<CallbackHandle>>> = Rc::new(RefCell::new(None));
    let s = slot.clone();
    let _first = clock.schedule_repeating(Box::new(move |_| {
      if let Some(h) = s.borrow().as_ref() {
        h.cancel();
      }
    }));
    let r = second_runs.clone();
    *slot.borrow_mut() = Some(clock.schedule_repeating(Box::new(move |_| r.set(r.get() + 1))));

    clock.advance(2);
    assert_eq!(second_runs.get(), 0);
    assert_eq!(clock.active_tasks(), 1);
  }
}
