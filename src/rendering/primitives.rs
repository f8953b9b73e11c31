// src/rendering/primitives.rs

use super::device::PhongMaterial;
use crate::model::Rgb;
use gtk4::cairo::{self, FontSlant, FontWeight, RadialGradient};
use std::f64::consts::PI;

/// Ambient plus one directional light, with the light direction already in
/// view space (x right, y up, z towards the viewer).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphereLighting {
  pub ambient: f64,
  pub directional: f64,
  pub light_dir: [f64; 3],
}

impl Default for SphereLighting {
  fn default() -> Self {
    let inv = 1.0 / 3f64.sqrt();
    Self {
      ambient: 0.5,
      directional: 1.0,
      light_dir: [inv, inv, inv],
    }
  }
}

fn shade(c: Rgb, k: f64, add: Rgb) -> Rgb {
  (
    (c.0 * k + add.0).clamp(0.0, 1.0),
    (c.1 * k + add.1).clamp(0.0, 1.0),
    (c.2 * k + add.2).clamp(0.0, 1.0),
  )
}

/// Phong-like sphere impostor: the highlight sits where the directional
/// light hits, the rim falls off to the ambient level.
pub fn draw_lit_sphere(
  cr: &cairo::Context,
  x: f64,
  y: f64,
  radius: f64,
  material: &PhongMaterial,
  light: &SphereLighting,
) -> Result<(), cairo::Error> {
  if !(radius.is_finite() && radius > 0.0) {
    return Ok(());
  }

  let (em_r, em_g, em_b) = material.emissive;
  let glow = (
    em_r * material.emissive_intensity,
    em_g * material.emissive_intensity,
    em_b * material.emissive_intensity,
  );

  // Screen y grows downward
  let [lx, ly, lz] = light.light_dir;
  let facing = lz.max(0.0);
  let hx = x + lx * radius * 0.45;
  let hy = y - ly * radius * 0.45;

  // Sharper highlight for shinier materials
  let highlight_size = (0.35 - material.shininess / 400.0).clamp(0.05, 0.35);

  let gradient = RadialGradient::new(hx, hy, radius * highlight_size * 0.3, x, y, radius);

  let lit = light.ambient + light.directional * (0.5 + 0.5 * facing);
  let spec = (light.directional * 0.9).min(1.0);
  let (sr, sg, sb) = shade(material.color, 1.0 - spec, (spec, spec, spec));
  let (br, bg, bb) = shade(material.color, lit.min(1.2), glow);
  let (ar, ag, ab) = shade(material.color, light.ambient, glow);
  let (dr, dg, db) = shade(material.color, light.ambient * 0.4, glow);

  gradient.add_color_stop_rgb(0.0, sr, sg, sb);
  gradient.add_color_stop_rgb(0.1 + highlight_size * 0.5, br, bg, bb);
  gradient.add_color_stop_rgb(0.85, ar, ag, ab);
  gradient.add_color_stop_rgb(1.0, dr, dg, db);

  cr.set_source(&gradient)?;
  cr.arc(x, y, radius, 0.0, 2.0 * PI);
  cr.fill()
}

/// Flat ion disc with a soft halo of the same colour, the look of the
/// transform view.
pub fn draw_ion_disc(
  cr: &cairo::Context,
  x: f64,
  y: f64,
  radius: f64,
  color: Rgb,
) -> Result<(), cairo::Error> {
  let (r, g, b) = color;

  let halo = RadialGradient::new(x, y, radius * 0.8, x, y, radius * 1.35);
  halo.add_color_stop_rgba(0.0, r, g, b, 0.5);
  halo.add_color_stop_rgba(1.0, r, g, b, 0.0);
  cr.set_source(&halo)?;
  cr.arc(x, y, radius * 1.35, 0.0, 2.0 * PI);
  cr.fill()?;

  cr.set_source_rgb(r, g, b);
  cr.arc(x, y, radius, 0.0, 2.0 * PI);
  cr.fill()
}

/// Centred bold label.
pub fn draw_label(
  cr: &cairo::Context,
  x: f64,
  y: f64,
  text: &str,
  size: f64,
  color: Rgb,
) -> Result<(), cairo::Error> {
  cr.select_font_face("Sans", FontSlant::Normal, FontWeight::Bold);
  cr.set_font_size(size);
  let ext = cr.text_extents(text)?;
  cr.set_source_rgb(color.0, color.1, color.2);
  cr.move_to(
    x - ext.width() / 2.0 - ext.x_bearing(),
    y - ext.height() / 2.0 - ext.y_bearing(),
  );
  cr.show_text(text)?;
  // Drop the current point so the next arc does not join the text
  cr.new_path();
  Ok(())
}

/// Boxed caption anchored at its bottom-left corner.
pub fn draw_caption(cr: &cairo::Context, x: f64, y: f64, text: &str) -> Result<(), cairo::Error> {
  cr.select_font_face("Sans", FontSlant::Normal, FontWeight::Normal);
  cr.set_font_size(13.0);
  let ext = cr.text_extents(text)?;
  let pad = 6.0;

  cr.set_source_rgba(0.0, 0.0, 0.0, 0.7);
  cr.rectangle(
    x,
    y - ext.height() - 2.0 * pad,
    ext.width() + 2.0 * pad,
    ext.height() + 2.0 * pad,
  );
  cr.fill()?;

  cr.set_source_rgb(1.0, 1.0, 1.0);
  cr.move_to(x + pad - ext.x_bearing(), y - pad - (ext.height() + ext.y_bearing()));
  cr.show_text(text)?;
  cr.new_path();
  Ok(())
}
