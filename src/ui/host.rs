// src/ui/host.rs

use crate::animation::scheduler::CallbackHandle;
use crate::model::Rgb;
use crate::rendering::painter::draw_scene_surface;
use crate::rendering::{CairoDevice, SceneStatus, SharedScene, SurfaceHost, SurfaceSlot};
use gtk4::prelude::*;
use gtk4::DrawingArea;
use log::warn;
use std::cell::Cell;
use std::rc::Rc;

/// Binds the 3D scene's off-screen surface to a `DrawingArea`.
pub struct GtkSurfaceHost {
  area: DrawingArea,
  attached: Rc<Cell<bool>>,
}

impl GtkSurfaceHost {
  /// Installs the area's draw func. It reads the scene's live status on every
  /// paint: the loading or error overlay until the surface is attached or
  /// whenever the scene reports an error, the surface otherwise.
  pub fn new(
    area: &DrawingArea,
    scene: &SharedScene<CairoDevice>,
    slot: SurfaceSlot,
    background: Rgb,
  ) -> Self {
    let attached = Rc::new(Cell::new(false));
    let weak = Rc::downgrade(scene);
    let flag = attached.clone();

    area.set_draw_func(move |_, cr, w, h| {
      let live = match weak.upgrade() {
        Some(scene) => scene
          .try_borrow()
          .map(|sc| sc.status().clone())
          .unwrap_or(SceneStatus::Uninitialized),
        None => SceneStatus::Disposed,
      };
      let status = visible_status(flag.get(), live);
      if let Err(e) = draw_scene_surface(cr, &slot, &status, background, w as f64, h as f64) {
        warn!("3D view paint failed: {}", e);
      }
    });

    Self {
      area: area.clone(),
      attached,
    }
  }
}

/// The surface only shows once attached; before that a ready scene still
/// paints as loading.
fn visible_status(attached: bool, live: SceneStatus) -> SceneStatus {
  match live {
    SceneStatus::Ready if !attached => SceneStatus::Uninitialized,
    status => status,
  }
}

impl SurfaceHost for GtkSurfaceHost {
  fn container_size(&self) -> Option<(u32, u32)> {
    // Before the first allocation fall back to the requested content size
    let (w, h) = match (self.area.width(), self.area.height()) {
      (w, h) if w > 0 && h > 0 => (w, h),
      _ => (self.area.content_width(), self.area.content_height()),
    };
    if w > 0 && h > 0 {
      Some((w as u32, h as u32))
    } else {
      None
    }
  }

  fn attach_surface(&self) {
    self.attached.set(true);
    self.area.queue_draw();
  }

  fn detach_surface(&self) {
    self.attached.set(false);
    self.area.queue_draw();
  }

  fn on_resize(&self, listener: Box<dyn Fn(u32, u32)>) -> CallbackHandle {
    let id = self.area.connect_resize(move |_, w, h| {
      if w > 0 && h > 0 {
        listener(w as u32, h as u32);
      }
    });
    let area = self.area.clone();
    CallbackHandle::new(move || area.disconnect(id))
  }

  fn request_redraw(&self) {
    self.area.queue_draw();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_errors_show_whether_attached_or_not() {
    let err = SceneStatus::Error("Invalid lattice: bad".into());
    assert_eq!(visible_status(true, err.clone()), err);
    assert_eq!(visible_status(false, err.clone()), err);
  }

  #[test]
  fn test_surface_shows_only_once_attached() {
    assert_eq!(visible_status(false, SceneStatus::Ready), SceneStatus::Uninitialized);
    assert_eq!(visible_status(true, SceneStatus::Ready), SceneStatus::Ready);
    assert_eq!(visible_status(false, SceneStatus::Disposed), SceneStatus::Disposed);
  }
}
