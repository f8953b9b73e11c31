// src/rendering/device.rs
// Graphics resources behind the 3D scene. Geometry, material and surface
// handles are unmanaged: whoever acquires one must release it explicitly.

use super::primitives::{draw_lit_sphere, SphereLighting};
use crate::model::Rgb;
use cairo::{Context, Format, ImageSurface};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphereGeometry {
  pub radius: f64,
}

impl SphereGeometry {
  pub fn new(radius: f64) -> Self {
    Self { radius }
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhongMaterial {
  pub color: Rgb,
  pub emissive: Rgb,
  pub emissive_intensity: f64,
  pub shininess: f64,
}

impl PhongMaterial {
  pub fn new(color: Rgb, emissive: Rgb) -> Self {
    Self {
      color,
      emissive,
      emissive_intensity: 0.2,
      shininess: 100.0,
    }
  }
}

/// One sphere to draw, already projected by the scene.
#[derive(Debug, Clone, Copy)]
pub struct DrawItem {
  pub geometry: GeometryId,
  pub material: MaterialId,
  pub x: f64,
  pub y: f64,
  pub radius_px: f64,
  pub depth: f64,
}

pub struct FrameDraw<'a> {
  pub background: Rgb,
  pub lighting: SphereLighting,
  // Drawn in slice order; the scene sorts far to near
  pub items: &'a [DrawItem],
}

/// Acquisition / release counters, used to prove every acquire is paired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStats {
  pub surfaces_created: u64,
  pub surfaces_destroyed: u64,
  pub geometries_created: u64,
  pub geometries_released: u64,
  pub materials_created: u64,
  pub materials_released: u64,
  pub frames_drawn: u64,
}

impl DeviceStats {
  pub fn live_geometries(&self) -> u64 {
    self.geometries_created - self.geometries_released
  }

  pub fn live_materials(&self) -> u64 {
    self.materials_created - self.materials_released
  }

  pub fn live_surfaces(&self) -> u64 {
    self.surfaces_created - self.surfaces_destroyed
  }

  pub fn is_balanced(&self) -> bool {
    self.live_geometries() == 0 && self.live_materials() == 0 && self.live_surfaces() == 0
  }
}

// --- ERROR HANDLING ---

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceError {
  SurfaceUnavailable(String),
  NoSurface,
  ResourceExhausted(&'static str),
  UnknownResource(&'static str, u64),
  Draw(String),
}

impl fmt::Display for DeviceError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      DeviceError::SurfaceUnavailable(msg) => write!(f, "Drawable surface unavailable: {}", msg),
      DeviceError::NoSurface => write!(f, "No drawable surface has been created"),
      DeviceError::ResourceExhausted(kind) => write!(f, "Could not allocate {} resource", kind),
      DeviceError::UnknownResource(kind, id) => write!(f, "Unknown {} handle {}", kind, id),
      DeviceError::Draw(msg) => write!(f, "Draw failed: {}", msg),
    }
  }
}

impl std::error::Error for DeviceError {}

pub trait GraphicsDevice {
  fn create_surface(&mut self, width: u32, height: u32) -> Result<(), DeviceError>;
  fn resize_surface(&mut self, width: u32, height: u32) -> Result<(), DeviceError>;
  fn surface_size(&self) -> Option<(u32, u32)>;
  /// Releases the surface; no-op when none exists.
  fn destroy_surface(&mut self);

  fn create_geometry(&mut self, geometry: SphereGeometry) -> Result<GeometryId, DeviceError>;
  fn create_material(&mut self, material: PhongMaterial) -> Result<MaterialId, DeviceError>;
  fn release_geometry(&mut self, id: GeometryId);
  fn release_material(&mut self, id: MaterialId);

  fn draw(&mut self, frame: &FrameDraw<'_>) -> Result<(), DeviceError>;
  fn stats(&self) -> DeviceStats;
}

// ============================================================================
// CAIRO DEVICE
// ============================================================================

/// Surface shared between the device (writer) and the hosting widget (reader).
pub type SurfaceSlot = Rc<RefCell<Option<ImageSurface>>>;

pub fn new_surface_slot() -> SurfaceSlot {
  Rc::new(RefCell::new(None))
}

/// Software device rasterizing shaded spheres into an off-screen image.
pub struct CairoDevice {
  slot: SurfaceSlot,
  geometries: HashMap<GeometryId, SphereGeometry>,
  materials: HashMap<MaterialId, PhongMaterial>,
  next_id: u64,
  stats: DeviceStats,
}

impl CairoDevice {
  pub fn new(slot: SurfaceSlot) -> Self {
    Self {
      slot,
      geometries: HashMap::new(),
      materials: HashMap::new(),
      next_id: 1,
      stats: DeviceStats::default(),
    }
  }

  fn next(&mut self) -> u64 {
    let id = self.next_id;
    self.next_id += 1;
    id
  }

  fn make_surface(width: u32, height: u32) -> Result<ImageSurface, DeviceError> {
    if width == 0 || height == 0 {
      return Err(DeviceError::SurfaceUnavailable(format!(
        "container has zero size ({}x{})",
        width, height
      )));
    }
    ImageSurface::create(Format::ARgb32, width as i32, height as i32)
      .map_err(|e| DeviceError::SurfaceUnavailable(e.to_string()))
  }
}

impl GraphicsDevice for CairoDevice {
  fn create_surface(&mut self, width: u32, height: u32) -> Result<(), DeviceError> {
    let surface = Self::make_surface(width, height)?;
    if self.slot.borrow_mut().replace(surface).is_none() {
      self.stats.surfaces_created += 1;
    }
    Ok(())
  }

  fn resize_surface(&mut self, width: u32, height: u32) -> Result<(), DeviceError> {
    if self.slot.borrow().is_none() {
      return Err(DeviceError::NoSurface);
    }
    let surface = Self::make_surface(width, height)?;
    *self.slot.borrow_mut() = Some(surface);
    Ok(())
  }

  fn surface_size(&self) -> Option<(u32, u32)> {
    self
      .slot
      .borrow()
      .as_ref()
      .map(|s| (s.width() as u32, s.height() as u32))
  }

  fn destroy_surface(&mut self) {
    if let Some(surface) = self.slot.borrow_mut().take() {
      surface.finish();
      self.stats.surfaces_destroyed += 1;
    }
  }

  fn create_geometry(&mut self, geometry: SphereGeometry) -> Result<GeometryId, DeviceError> {
    let id = GeometryId(self.next());
    self.geometries.insert(id, geometry);
    self.stats.geometries_created += 1;
    Ok(id)
  }

  fn create_material(&mut self, material: PhongMaterial) -> Result<MaterialId, DeviceError> {
    let id = MaterialId(self.next());
    self.materials.insert(id, material);
    self.stats.materials_created += 1;
    Ok(id)
  }

  fn release_geometry(&mut self, id: GeometryId) {
    if self.geometries.remove(&id).is_some() {
      self.stats.geometries_released += 1;
    }
  }

  fn release_material(&mut self, id: MaterialId) {
    if self.materials.remove(&id).is_some() {
      self.stats.materials_released += 1;
    }
  }

  fn draw(&mut self, frame: &FrameDraw<'_>) -> Result<(), DeviceError> {
    let slot = self.slot.borrow();
    let surface = slot.as_ref().ok_or(DeviceError::NoSurface)?;
    let cr = Context::new(surface).map_err(|e| DeviceError::Draw(e.to_string()))?;

    let (r, g, b) = frame.background;
    cr.set_source_rgb(r, g, b);
    cr.paint().map_err(|e| DeviceError::Draw(e.to_string()))?;

    for item in frame.items {
      if !self.geometries.contains_key(&item.geometry) {
        return Err(DeviceError::UnknownResource("geometry", item.geometry.0));
      }
      let material = self
        .materials
        .get(&item.material)
        .ok_or(DeviceError::UnknownResource("material", item.material.0))?;

      draw_lit_sphere(&cr, item.x, item.y, item.radius_px, material, &frame.lighting)
        .map_err(|e| DeviceError::Draw(e.to_string()))?;
    }

    drop(cr);
    surface.flush();
    self.stats.frames_drawn += 1;
    Ok(())
  }

  fn stats(&self) -> DeviceStats {
    self.stats
  }
}
