// src/rendering/ion_grid.rs
// Pseudo-3D lattice view drawn with plain 2D compositing. The whole assembly
// is rotated once by two accumulated angles; each ion is then translated and
// scaled by a CSS-like perspective divide.

use crate::config::RenderStyle;
use crate::model::{ChargeClass, Ion, IonId, LatticeError, LatticeSpec, Rgb};
use log::{debug, info, warn};
use nalgebra::{Rotation3, Vector3};
use std::cmp::Ordering;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RotationState {
  // Degrees, about the screen x axis
  pub pitch_deg: f64,
  // Degrees, about the screen y axis
  pub yaw_deg: f64,
  pub dragging: bool,
  pub selected: Option<IonId>,
  last_pointer: Option<(f64, f64)>,
}

impl RotationState {
  /// Group rotation `Rx(pitch) * Ry(yaw)`.
  pub fn rotation(&self) -> Rotation3<f64> {
    Rotation3::from_axis_angle(&Vector3::x_axis(), self.pitch_deg.to_radians())
      * Rotation3::from_axis_angle(&Vector3::y_axis(), self.yaw_deg.to_radians())
  }
}

/// One ion placed on the canvas, ready to paint.
#[derive(Debug, Clone)]
pub struct ProjectedIon {
  pub id: IonId,
  pub element: &'static str,
  pub charge: ChargeClass,
  pub color: Rgb,
  pub x: f64,
  pub y: f64,
  pub radius: f64,
  // Towards the viewer is positive
  pub depth: f64,
  pub selected: bool,
}

impl ProjectedIon {
  pub fn contains(&self, x: f64, y: f64) -> bool {
    let (dx, dy) = (x - self.x, y - self.y);
    dx * dx + dy * dy <= self.radius * self.radius
  }
}

pub struct IonGridView {
  style: RenderStyle,
  interactive: bool,
  spec: LatticeSpec,
  ions: Vec<Ion>,
  centroid: Vector3<f64>,
  rotation: RotationState,
  // Why the view holds no ions, shown in place of the lattice
  notice: Option<String>,
}

impl IonGridView {
  pub fn new(spec: LatticeSpec, style: RenderStyle, interactive: bool) -> Self {
    let mut view = Self {
      style,
      interactive,
      spec,
      ions: Vec::new(),
      centroid: Vector3::zeros(),
      rotation: RotationState::default(),
      notice: None,
    };
    view.regenerate(spec);
    view
  }

  // ============================================================================
  // REGENERATION
  // ============================================================================

  /// Replaces the whole ion set. Rotation angles survive; the selection
  /// survives only if the same site exists in the new set.
  pub fn regenerate(&mut self, spec: LatticeSpec) -> usize {
    self.ions = spec.generate();
    self.spec = spec;
    self.centroid = centroid(&self.ions);
    self.notice = None;

    if let Some(id) = self.rotation.selected.take() {
      if self.ions.iter().any(|ion| ion.id == id) {
        self.rotation.selected = Some(id);
      } else {
        debug!("Selection {} dropped by regeneration", id);
      }
    }

    debug!("Ion grid regenerated: {} ({} ions)", spec.structure, self.ions.len());
    self.ions.len()
  }

  /// Validates a request from the host before touching the current set.
  pub fn regenerate_from(&mut self, structure: &str, extent: i64) -> Result<usize, LatticeError> {
    let spec = LatticeSpec::parse(structure, extent).map_err(|e| {
      warn!("Ion grid kept its lattice: {}", e);
      e
    })?;
    Ok(self.regenerate(spec))
  }

  pub fn set_interactive(&mut self, interactive: bool) {
    self.interactive = interactive;
    if !interactive {
      self.rotation.dragging = false;
      self.rotation.last_pointer = None;
      self.rotation.selected = None;
    }
  }

  /// Empties the view and shows why. Used when there is no accepted lattice
  /// to keep, e.g. a rejected startup request.
  pub fn show_rejection(&mut self, e: &LatticeError) {
    self.ions.clear();
    self.centroid = Vector3::zeros();
    self.rotation.selected = None;
    self.notice = Some(e.to_string());
  }

  // ============================================================================
  // POINTER INPUT
  // ============================================================================

  pub fn pointer_press(&mut self, x: f64, y: f64) {
    if !self.interactive {
      return;
    }
    self.rotation.dragging = true;
    self.rotation.last_pointer = Some((x, y));
  }

  /// Adds `dx * k` to yaw and `dy * k` to pitch while a drag is in progress.
  /// Returns whether the angles changed.
  pub fn pointer_move(&mut self, x: f64, y: f64) -> bool {
    if !self.interactive || !self.rotation.dragging {
      return false;
    }
    let Some((lx, ly)) = self.rotation.last_pointer.replace((x, y)) else {
      return false;
    };
    let (dx, dy) = (x - lx, y - ly);
    if dx == 0.0 && dy == 0.0 {
      return false;
    }

    let k = self.style.drag_sensitivity;
    self.rotation.yaw_deg += dx * k;
    self.rotation.pitch_deg += dy * k;
    true
  }

  pub fn pointer_release(&mut self) {
    self.rotation.dragging = false;
    self.rotation.last_pointer = None;
  }

  /// Leaving the surface ends a drag exactly like a release.
  pub fn pointer_leave(&mut self) {
    self.pointer_release();
  }

  // ============================================================================
  // SELECTION
  // ============================================================================

  /// Exclusive toggle. Returns the ion selected after the click, if any.
  pub fn click(&mut self, id: &IonId) -> Option<&Ion> {
    if !self.interactive {
      return None;
    }
    if !self.ions.iter().any(|ion| &ion.id == id) {
      return self.selected();
    }

    if self.rotation.selected.as_ref() == Some(id) {
      self.rotation.selected = None;
    } else {
      self.rotation.selected = Some(id.clone());
    }

    match self.selection_label() {
      Some(label) => info!("Selected {}", label),
      None => debug!("Selection cleared"),
    }
    self.selected()
  }

  /// Resolves a click on a `width` x `height` canvas to the topmost ion under
  /// the pointer and toggles it. Clicks on empty space change nothing.
  pub fn click_at(&mut self, x: f64, y: f64, width: f64, height: f64) -> bool {
    if !self.interactive {
      return false;
    }
    match self.hit_test(x, y, width, height) {
      Some(id) => {
        self.click(&id);
        true
      }
      None => false,
    }
  }

  pub fn hit_test(&self, x: f64, y: f64, width: f64, height: f64) -> Option<IonId> {
    self
      .project(width, height)
      .into_iter()
      .rev()
      .find(|p| p.contains(x, y))
      .map(|p| p.id)
  }

  pub fn selected(&self) -> Option<&Ion> {
    let id = self.rotation.selected.as_ref()?;
    self.ions.iter().find(|ion| &ion.id == id)
  }

  /// Side panel text for the selected ion, e.g. `Na (cation)`.
  pub fn selection_label(&self) -> Option<String> {
    self.selected().map(Ion::describe)
  }

  // ============================================================================
  // PROJECTION
  // ============================================================================

  /// Places every ion on a `width` x `height` canvas in paint order: far to
  /// near, with the selected ion last.
  pub fn project(&self, width: f64, height: f64) -> Vec<ProjectedIon> {
    let rot = self.rotation.rotation();
    let (cx, cy) = (width / 2.0, height / 2.0);
    let spacing = self.style.ion_spacing;
    let perspective = self.style.perspective;
    let base_radius = self.style.ion_diameter / 2.0;

    let mut out: Vec<ProjectedIon> = self
      .ions
      .iter()
      .filter_map(|ion| {
        let [x, y, z] = ion.position;
        let local = (Vector3::new(x, y, z) - self.centroid) * spacing;
        let p = rot * local;

        // Points at or behind the eye are not drawn
        let scale = if perspective > 0.0 {
          let d = perspective - p.z;
          if d <= 0.0 {
            return None;
          }
          perspective / d
        } else {
          1.0
        };

        let selected = self.rotation.selected.as_ref() == Some(&ion.id);
        let mut radius = base_radius * scale;
        if selected {
          radius *= self.style.selected_scale;
        }

        Some(ProjectedIon {
          id: ion.id.clone(),
          element: ion.element,
          charge: ion.charge,
          color: self.style.color_for(ion.element, ion.color),
          x: cx + p.x * scale,
          y: cy + p.y * scale,
          radius,
          depth: p.z,
          selected,
        })
      })
      .collect();

    out.sort_by(|a, b| {
      a.selected
        .cmp(&b.selected)
        .then(a.depth.partial_cmp(&b.depth).unwrap_or(Ordering::Equal))
    });
    out
  }

  // --- Accessors ---

  pub fn ions(&self) -> &[Ion] {
    &self.ions
  }

  pub fn spec(&self) -> LatticeSpec {
    self.spec
  }

  pub fn rotation(&self) -> &RotationState {
    &self.rotation
  }

  pub fn is_interactive(&self) -> bool {
    self.interactive
  }

  pub fn style(&self) -> &RenderStyle {
    &self.style
  }

  pub fn notice(&self) -> Option<&str> {
    self.notice.as_deref()
  }
}

fn centroid(ions: &[Ion]) -> Vector3<f64> {
  if ions.is_empty() {
    return Vector3::zeros();
  }
  let sum = ions.iter().fold(Vector3::zeros(), |acc, ion| {
    acc + Vector3::new(ion.position[0], ion.position[1], ion.position[2])
  });
  sum / ions.len() as f64
}
