// src/ui/interactions.rs

use crate::rendering::{CairoDevice, IonGridView, SharedScene};
use gtk4::glib;
use gtk4::{self as gtk, prelude::*};
use gtk4::{
  EventControllerMotion, EventControllerScroll, EventControllerScrollFlags, GestureClick,
  GestureDrag,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Orbit and zoom for the 3D view. The scene's own render loop picks up the
/// queued motion on its next frame.
pub fn setup_scene_interactions(drawing_area: &gtk::DrawingArea, scene: SharedScene<CairoDevice>) {
  // 1. MOUSE DRAG (ORBIT)
  let drag = GestureDrag::new();
  // GestureDrag reports offsets from the press point; keep the previous one
  let last = Rc::new(Cell::new((0.0, 0.0)));

  let l = last.clone();
  drag.connect_drag_begin(move |_, _, _| l.set((0.0, 0.0)));

  let s = scene.clone();
  let l = last.clone();
  drag.connect_drag_update(move |_, x, y| {
    let (px, py) = l.replace((x, y));
    if let Ok(mut sc) = s.try_borrow_mut() {
      sc.orbit(x - px, y - py);
    }
  });
  drawing_area.add_controller(drag);

  // 2. SCROLL (ZOOM)
  let scroll = EventControllerScroll::new(EventControllerScrollFlags::VERTICAL);
  let s = scene.clone();
  scroll.connect_scroll(move |_, _, dy| {
    if let Ok(mut sc) = s.try_borrow_mut() {
      sc.zoom(dy);
    }
    glib::Propagation::Stop
  });
  drawing_area.add_controller(scroll);
}

/// Drag rotation, pointer leave and click selection for the transform view.
pub fn setup_grid_interactions(drawing_area: &gtk::DrawingArea, grid: Rc<RefCell<IonGridView>>) {
  // 1. MOUSE DRAG (ROTATION)
  let drag = GestureDrag::new();
  let g = grid.clone();
  drag.connect_drag_begin(move |_, x, y| {
    g.borrow_mut().pointer_press(x, y);
  });

  let g = grid.clone();
  let da = drawing_area.clone();
  drag.connect_drag_update(move |gesture, x, y| {
    let Some((sx, sy)) = gesture.start_point() else {
      return;
    };
    if g.borrow_mut().pointer_move(sx + x, sy + y) {
      da.queue_draw();
    }
  });

  let g = grid.clone();
  drag.connect_drag_end(move |_, _, _| {
    g.borrow_mut().pointer_release();
  });
  drawing_area.add_controller(drag);

  // 2. LEAVE (ends a drag like release)
  let motion = EventControllerMotion::new();
  let g = grid.clone();
  motion.connect_leave(move |_| {
    g.borrow_mut().pointer_leave();
  });
  drawing_area.add_controller(motion);

  // 3. CLICK (SELECTION)
  let click = GestureClick::new();
  let g = grid.clone();
  let da = drawing_area.clone();
  click.connect_released(move |_, _, x, y| {
    let w = da.width() as f64;
    let h = da.height() as f64;
    // The view logs the new selection to the console
    if g.borrow_mut().click_at(x, y, w, h) {
      da.queue_draw();
    }
  });
  drawing_area.add_controller(click);
}
