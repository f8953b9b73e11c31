// src/rendering/painter.rs
// Cairo painting for the three views: the transform lattice view, the
// electron shell view and the blit of the 3D scene surface.

use super::device::SurfaceSlot;
use super::ion_grid::IonGridView;
use super::primitives::{draw_caption, draw_ion_disc, draw_label};
use super::scene::SceneStatus;
use crate::animation::shells::{ring_radius, ShellState};
use crate::config::ShellDimensions;
use crate::model::{IonPreset, Rgb};
use gtk4::cairo;
use std::f64::consts::PI;

const WHITE: Rgb = (1.0, 1.0, 1.0);
const ERROR_RED: Rgb = (1.0, 0.4, 0.4);

fn paint_background(cr: &cairo::Context, color: Rgb) -> Result<(), cairo::Error> {
  cr.set_source_rgb(color.0, color.1, color.2);
  cr.paint()
}

// ============================================================================
// TRANSFORM VIEW
// ============================================================================

pub fn draw_ion_grid(
  cr: &cairo::Context,
  view: &IonGridView,
  width: f64,
  height: f64,
) -> Result<(), cairo::Error> {
  paint_background(cr, view.style().background_color)?;

  if let Some(notice) = view.notice() {
    return draw_label(cr, width / 2.0, height / 2.0, notice, 14.0, ERROR_RED);
  }

  for ion in view.project(width, height) {
    draw_ion_disc(cr, ion.x, ion.y, ion.radius, ion.color)?;
    draw_label(cr, ion.x, ion.y, ion.element, ion.radius * 0.6, WHITE)?;

    if ion.selected {
      cr.set_source_rgb(1.0, 1.0, 1.0);
      cr.set_line_width(2.0);
      cr.arc(ion.x, ion.y, ion.radius + 2.0, 0.0, 2.0 * PI);
      cr.stroke()?;
    }
  }

  // Side panel
  if let Some(label) = view.selection_label() {
    draw_caption(cr, 10.0, height - 10.0, &label)?;
  }
  Ok(())
}

// ============================================================================
// ELECTRON SHELLS
// ============================================================================

/// Nucleus labelled with the preset's ion label, one faint ring per shell
/// and the electrons at their current angles, centred on the canvas.
pub fn draw_shells(
  cr: &cairo::Context,
  state: &ShellState,
  preset: &IonPreset,
  dims: &ShellDimensions,
  width: f64,
  height: f64,
) -> Result<(), cairo::Error> {
  let (cx, cy) = (width / 2.0, height / 2.0);
  let nucleus_color = preset.color;
  let electron_color = preset.electron_color;

  cr.set_source_rgb(nucleus_color.0, nucleus_color.1, nucleus_color.2);
  cr.arc(cx, cy, dims.nucleus_radius, 0.0, 2.0 * PI);
  cr.fill()?;
  draw_label(cr, cx, cy, preset.label, dims.nucleus_radius * 0.6, WHITE)?;

  for (i, _) in state.shells().iter().enumerate() {
    let r = ring_radius(dims.nucleus_radius, i);

    cr.set_source_rgba(1.0, 1.0, 1.0, 0.2);
    cr.set_line_width(1.0);
    cr.new_sub_path();
    cr.arc(cx, cy, r, 0.0, 2.0 * PI);
    cr.stroke()?;

    cr.set_source_rgb(electron_color.0, electron_color.1, electron_color.2);
    for angle in state.electron_angles(i) {
      let (x, y) = (cx + angle.cos() * r, cy + angle.sin() * r);
      cr.new_sub_path();
      cr.arc(x, y, dims.electron_radius, 0.0, 2.0 * PI);
    }
    cr.fill()?;
  }
  Ok(())
}

// ============================================================================
// 3D SCENE
// ============================================================================

/// Copies the scene's off-screen surface into the widget, or paints the
/// loading / error overlay when there is nothing to show.
pub fn draw_scene_surface(
  cr: &cairo::Context,
  slot: &SurfaceSlot,
  status: &SceneStatus,
  background: Rgb,
  width: f64,
  height: f64,
) -> Result<(), cairo::Error> {
  paint_background(cr, background)?;

  if let SceneStatus::Ready = status {
    if let Some(surface) = slot.borrow().as_ref() {
      cr.set_source_surface(surface, 0.0, 0.0)?;
      return cr.paint();
    }
  }

  let message = match status {
    SceneStatus::Uninitialized | SceneStatus::Ready => "Loading 3D viewer...".to_string(),
    SceneStatus::Error(msg) => msg.clone(),
    SceneStatus::Disposed => return Ok(()),
  };
  let color = match status {
    SceneStatus::Error(_) => ERROR_RED,
    _ => WHITE,
  };
  draw_label(cr, width / 2.0, height / 2.0, &message, 14.0, color)
}
