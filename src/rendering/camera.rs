// src/rendering/camera.rs
// Perspective camera and damped orbit controller for the 3D lattice scene.

use nalgebra::{Isometry3, Perspective3, Point3, Vector3};
use std::f64::consts::PI;

const MIN_POLAR: f64 = 1e-6;

#[derive(Debug, Clone)]
pub struct PerspectiveCamera {
  pub fov_deg: f64,
  pub aspect: f64,
  pub near: f64,
  pub far: f64,
  pub position: Point3<f64>,
  pub target: Point3<f64>,
  projection: Perspective3<f64>,
}

/// A point projected to the drawable surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenPoint {
  pub x: f64,
  pub y: f64,
  // Distance along the view axis, larger is further away
  pub depth: f64,
}

impl PerspectiveCamera {
  pub fn new(fov_deg: f64, aspect: f64, near: f64, far: f64) -> Self {
    let aspect = sanitize_aspect(aspect);
    Self {
      fov_deg,
      aspect,
      near,
      far,
      position: Point3::new(0.0, 0.0, 5.0),
      target: Point3::origin(),
      projection: Perspective3::new(aspect, fov_deg.to_radians(), near, far),
    }
  }

  pub fn set_aspect(&mut self, aspect: f64) {
    self.aspect = sanitize_aspect(aspect);
    self.update_projection_matrix();
  }

  pub fn update_projection_matrix(&mut self) {
    self.projection = Perspective3::new(self.aspect, self.fov_deg.to_radians(), self.near, self.far);
  }

  pub fn view(&self) -> Isometry3<f64> {
    Isometry3::look_at_rh(&self.position, &self.target, &Vector3::y())
  }

  /// Maps a world point to pixel coordinates on a `width` x `height`
  /// surface. Returns `None` for points behind the near plane or past the far
  /// plane.
  pub fn project(&self, world: &Point3<f64>, width: f64, height: f64) -> Option<ScreenPoint> {
    let eye = self.view().transform_point(world);
    let depth = -eye.z;
    if depth < self.near || depth > self.far {
      return None;
    }
    let ndc = self.projection.project_point(&eye);
    Some(ScreenPoint {
      x: (ndc.x + 1.0) * 0.5 * width,
      y: (1.0 - ndc.y) * 0.5 * height,
      depth,
    })
  }

  /// Pixel radius of a sphere of world radius `radius` seen at `depth`.
  pub fn projected_radius(&self, radius: f64, depth: f64, height: f64) -> f64 {
    let half_fov = (self.fov_deg.to_radians() * 0.5).tan();
    if depth <= 0.0 || half_fov <= 0.0 {
      return 0.0;
    }
    radius / (depth * half_fov) * height * 0.5
  }

  /// Rotates a world direction into view space (used for light placement).
  pub fn direction_to_view(&self, dir: &Vector3<f64>) -> Vector3<f64> {
    self.view().rotation * dir
  }
}

fn sanitize_aspect(aspect: f64) -> f64 {
  if aspect.is_finite() && aspect > 0.0 {
    aspect
  } else {
    1.0
  }
}

// ============================================================================
// ORBIT CONTROLLER
// ============================================================================

/// Damped orbit around a target. Drag and zoom input accumulate pending
/// deltas; each `update` applies a `damping_factor` share of them and decays
/// the rest, so the camera eases to a stop instead of snapping.
#[derive(Debug, Clone)]
pub struct OrbitController {
  pub damping_factor: f64,
  pub rotate_speed: f64,
  pub min_distance: f64,
  pub max_distance: f64,
  target: Point3<f64>,
  radius: f64,
  // Azimuth around +Y
  theta: f64,
  // Polar angle from +Y
  phi: f64,
  delta_theta: f64,
  delta_phi: f64,
  // Pending zoom as ln(scale)
  delta_log_scale: f64,
}

impl OrbitController {
  /// Starts from the camera's current placement.
  pub fn new(camera: &PerspectiveCamera, damping_factor: f64) -> Self {
    let offset = camera.position - camera.target;
    let radius = offset.norm().max(MIN_POLAR);
    Self {
      damping_factor: damping_factor.clamp(0.0, 1.0),
      rotate_speed: 1.0,
      min_distance: 1.0,
      max_distance: 100.0,
      target: camera.target,
      radius,
      theta: offset.x.atan2(offset.z),
      phi: (offset.y / radius).clamp(-1.0, 1.0).acos(),
      delta_theta: 0.0,
      delta_phi: 0.0,
      delta_log_scale: 0.0,
    }
  }

  /// Queues a rotation for a pointer drag of (`dx`, `dy`) pixels on a
  /// surface `height` pixels tall.
  pub fn rotate_by_pixels(&mut self, dx: f64, dy: f64, height: f64) {
    let h = height.max(1.0);
    self.delta_theta -= 2.0 * PI * dx / h * self.rotate_speed;
    self.delta_phi -= 2.0 * PI * dy / h * self.rotate_speed;
  }

  /// Queues a zoom; `factor > 1` moves the camera away.
  pub fn dolly(&mut self, factor: f64) {
    if factor.is_finite() && factor > 0.0 {
      self.delta_log_scale += factor.ln();
    }
  }

  pub fn distance(&self) -> f64 {
    self.radius
  }

  pub fn has_pending_motion(&self) -> bool {
    self.delta_theta.abs() > 1e-9
      || self.delta_phi.abs() > 1e-9
      || self.delta_log_scale.abs() > 1e-9
  }

  /// Advances the damping by one frame and writes the new placement into
  /// `camera`. Returns whether the camera moved.
  pub fn update(&mut self, camera: &mut PerspectiveCamera) -> bool {
    let before = camera.position;

    self.theta += self.delta_theta * self.damping_factor;
    self.phi += self.delta_phi * self.damping_factor;
    self.phi = self.phi.clamp(MIN_POLAR, PI - MIN_POLAR);
    let step = (self.delta_log_scale * self.damping_factor).exp();
    self.radius = (self.radius * step).clamp(self.min_distance, self.max_distance);

    let sin_phi = self.phi.sin();
    let offset = Vector3::new(
      self.radius * sin_phi * self.theta.sin(),
      self.radius * self.phi.cos(),
      self.radius * sin_phi * self.theta.cos(),
    );
    camera.position = self.target + offset;
    camera.target = self.target;

    self.delta_theta *= 1.0 - self.damping_factor;
    self.delta_phi *= 1.0 - self.damping_factor;
    self.delta_log_scale *= 1.0 - self.damping_factor;

    (camera.position - before).norm() > 1e-12
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn camera() -> PerspectiveCamera {
    PerspectiveCamera::new(75.0, 1.0, 0.1, 1000.0)
  }

  #[test]
  fn test_target_projects_to_center() {
    let cam = camera();
    let p = cam.project(&Point3::origin(), 200.0, 100.0).unwrap();
    assert!((p.x - 100.0).abs() < 1e-9);
    assert!((p.y - 50.0).abs() < 1e-9);
    assert!((p.depth - 5.0).abs() < 1e-9);
  }

  #[test]
  fn test_behind_camera_is_culled() {
    let cam = camera();
    assert!(cam.project(&Point3::new(0.0, 0.0, 10.0), 100.0, 100.0).is_none());
  }

  #[test]
  fn test_up_is_up_on_screen() {
    let cam = camera();
    let p = cam.project(&Point3::new(0.0, 1.0, 0.0), 100.0, 100.0).unwrap();
    assert!(p.y < 50.0);
  }

  #[test]
  fn test_aspect_guard() {
    let mut cam = camera();
    cam.set_aspect(0.0);
    assert_eq!(cam.aspect, 1.0);
    cam.set_aspect(2.0);
    assert_eq!(cam.aspect, 2.0);
  }

  #[test]
  fn test_orbit_is_damped() {
    let mut cam = camera();
    let mut orbit = OrbitController::new(&cam, 0.05);
    orbit.rotate_by_pixels(100.0, 0.0, 100.0);

    let start = cam.position;
    assert!(orbit.update(&mut cam));
    let first_step = (cam.position - start).norm();

    // One frame only applies a fraction of the requested rotation
    let full = 2.0 * PI;
    assert!(orbit.has_pending_motion());
    let applied = (cam.position.x).atan2(cam.position.z).abs();
    assert!(applied < full * 0.06);
    assert!(first_step > 0.0);

    // Distance to the target is preserved
    assert!(((cam.position - cam.target).norm() - 5.0).abs() < 1e-9);

    for _ in 0..2000 {
      orbit.update(&mut cam);
    }
    assert!(!orbit.has_pending_motion());
    assert!(!orbit.update(&mut cam));
  }

  #[test]
  fn test_dolly_is_damped() {
    let mut cam = camera();
    let mut orbit = OrbitController::new(&cam, 0.05);
    orbit.dolly(2.0);

    assert!(orbit.update(&mut cam));
    let first = orbit.distance();
    assert!(first > 5.0 && first < 5.0 * 2f64.powf(0.06));
    assert!(orbit.has_pending_motion());

    for _ in 0..2000 {
      orbit.update(&mut cam);
    }
    assert!(!orbit.has_pending_motion());
    assert!((orbit.distance() - 10.0).abs() < 1e-6);
    assert!(((cam.position - cam.target).norm() - 10.0).abs() < 1e-6);
  }

  #[test]
  fn test_dolly_is_clamped() {
    let mut cam = camera();
    let mut orbit = OrbitController::new(&cam, 0.05);
    orbit.dolly(1000.0);
    for _ in 0..2000 {
      orbit.update(&mut cam);
    }
    assert!((orbit.distance() - orbit.max_distance).abs() < 1e-9);
    orbit.dolly(1e-6);
    for _ in 0..2000 {
      orbit.update(&mut cam);
    }
    assert!((orbit.distance() - orbit.min_distance).abs() < 1e-9);
  }
}
