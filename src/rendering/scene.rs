// src/rendering/scene.rs
// Lifecycle of the 3D lattice view: surface, camera, lights, orbit control,
// one visual element per ion, and the self-rescheduling render loop.
//
// uninitialized -> ready -> (populate)* -> disposed
//              \-> error

use super::camera::{OrbitController, PerspectiveCamera};
use super::device::{
  DeviceError, DeviceStats, DrawItem, FrameDraw, GeometryId, GraphicsDevice, MaterialId,
  PhongMaterial, SphereGeometry,
};
use super::primitives::SphereLighting;
use crate::animation::scheduler::{CallbackHandle, FrameScheduler};
use crate::config::{RenderStyle, SceneConfig};
use crate::model::species::species_for;
use crate::model::{Ion, IonId, LatticeError, LatticeSpec};
use log::{debug, error, info, warn};
use nalgebra::{Point3, Vector3};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

/// The container a scene's drawable surface is bound to.
pub trait SurfaceHost {
  /// Current container size in pixels, `None` when there is nothing to draw
  /// into.
  fn container_size(&self) -> Option<(u32, u32)>;
  fn attach_surface(&self);
  fn detach_surface(&self);
  fn on_resize(&self, listener: Box<dyn Fn(u32, u32)>) -> CallbackHandle;
  fn request_redraw(&self);
}

#[derive(Debug, Clone, PartialEq)]
pub enum SceneStatus {
  Uninitialized,
  Ready,
  Error(String),
  Disposed,
}

impl fmt::Display for SceneStatus {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      SceneStatus::Uninitialized => write!(f, "uninitialized"),
      SceneStatus::Ready => write!(f, "ready"),
      SceneStatus::Error(msg) => write!(f, "error ({})", msg),
      SceneStatus::Disposed => write!(f, "disposed"),
    }
  }
}

// --- ERROR HANDLING ---

#[derive(Debug, Clone, PartialEq)]
pub enum SceneError {
  NoDrawableSurface,
  Device(DeviceError),
  Lattice(LatticeError),
  InvalidState { op: &'static str, status: SceneStatus },
}

impl fmt::Display for SceneError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      SceneError::NoDrawableSurface => write!(f, "Failed to initialize 3D viewer: no drawable surface"),
      SceneError::Device(e) => write!(f, "Failed to initialize 3D viewer: {}", e),
      SceneError::Lattice(e) => write!(f, "Invalid lattice: {}", e),
      SceneError::InvalidState { op, status } => {
        write!(f, "Cannot {} while the scene is {}", op, status)
      }
    }
  }
}

impl std::error::Error for SceneError {}

impl From<DeviceError> for SceneError {
  fn from(e: DeviceError) -> Self {
    SceneError::Device(e)
  }
}

impl From<LatticeError> for SceneError {
  fn from(e: LatticeError) -> Self {
    SceneError::Lattice(e)
  }
}

// ============================================================================
// SCENE STATE
// ============================================================================

/// Visual element for one ion. Holds the only references to its geometry and
/// material, so the element list doubles as the release manifest.
#[derive(Debug, Clone)]
pub struct IonElement {
  pub ion_id: IonId,
  pub position: Point3<f64>,
  pub radius: f64,
  geometry: GeometryId,
  material: MaterialId,
}

struct SceneState<D: GraphicsDevice> {
  device: D,
  host: Rc<dyn SurfaceHost>,
  camera: PerspectiveCamera,
  controls: OrbitController,
  lighting: SphereLighting,
  light_position: Vector3<f64>,
  elements: Vec<IonElement>,
  size: (u32, u32),
  render_task: Option<CallbackHandle>,
  resize_listener: Option<CallbackHandle>,
}

impl<D: GraphicsDevice> SceneState<D> {
  fn create_element(
    &mut self,
    ion: &Ion,
    spec: &LatticeSpec,
    offset: f64,
    style: &RenderStyle,
  ) -> Result<IonElement, DeviceError> {
    let species = species_for(spec.structure, ion.charge);
    let color = style.color_for(ion.element, ion.color);

    let geometry = self.device.create_geometry(SphereGeometry::new(ion.radius))?;
    let material = match self
      .device
      .create_material(PhongMaterial::new(color, species.emissive))
    {
      Ok(m) => m,
      Err(e) => {
        self.device.release_geometry(geometry);
        return Err(e);
      }
    };

    Ok(IonElement {
      ion_id: ion.id.clone(),
      position: Point3::new(
        ion.position[0] - offset,
        ion.position[1] - offset,
        ion.position[2] - offset,
      ),
      radius: ion.radius,
      geometry,
      material,
    })
  }

  /// Releases every element's geometry and material, then forgets them.
  fn clear_elements(&mut self) -> usize {
    let count = self.elements.len();
    for el in self.elements.drain(..) {
      self.device.release_geometry(el.geometry);
      self.device.release_material(el.material);
    }
    count
  }

  fn populate(&mut self, spec: &LatticeSpec, style: &RenderStyle) -> Result<usize, DeviceError> {
    let removed = self.clear_elements();
    if removed > 0 {
      debug!("Released {} scene elements", removed);
    }

    let ions = spec.generate();
    // Keep the cluster centred on the orbit target
    let offset = spec.extent as f64 / 2.0 - 0.5;
    self.elements.reserve(ions.len());

    for ion in &ions {
      match self.create_element(ion, spec, offset, style) {
        Ok(el) => self.elements.push(el),
        Err(e) => {
          // Never leave a partial set behind
          self.clear_elements();
          return Err(e);
        }
      }
    }
    Ok(self.elements.len())
  }

  fn render(&mut self, background: (f64, f64, f64)) -> Result<(), DeviceError> {
    self.controls.update(&mut self.camera);

    let (w, h) = (self.size.0 as f64, self.size.1 as f64);
    let mut items: Vec<DrawItem> = self
      .elements
      .iter()
      .filter_map(|el| {
        let p = self.camera.project(&el.position, w, h)?;
        Some(DrawItem {
          geometry: el.geometry,
          material: el.material,
          x: p.x,
          y: p.y,
          radius_px: self.camera.projected_radius(el.radius, p.depth, h),
          depth: p.depth,
        })
      })
      .collect();

    // Far to near
    items.sort_by(|a, b| b.depth.partial_cmp(&a.depth).unwrap_or(Ordering::Equal));

    let dir = self.camera.direction_to_view(&self.light_position);
    let dir = if dir.norm() > 0.0 { dir.normalize() } else { Vector3::z() };
    let lighting = SphereLighting {
      light_dir: [dir.x, dir.y, dir.z],
      ..self.lighting
    };

    self.device.draw(&FrameDraw {
      background,
      lighting,
      items: &items,
    })
  }

  /// Releases everything this state acquired. Safe on partially built state.
  fn teardown(&mut self) {
    if let Some(task) = self.render_task.take() {
      task.cancel();
    }
    if let Some(listener) = self.resize_listener.take() {
      listener.cancel();
    }
    self.host.detach_surface();
    let released = self.clear_elements();
    self.device.destroy_surface();
    debug!("Scene teardown released {} elements", released);
  }
}

// ============================================================================
// SCENE MANAGER
// ============================================================================

pub type SharedScene<D> = Rc<RefCell<SceneManager<D>>>;

pub struct SceneManager<D: GraphicsDevice> {
  config: SceneConfig,
  style: RenderStyle,
  status: SceneStatus,
  spec: LatticeSpec,
  state: Option<SceneState<D>>,
  frames_rendered: u64,
}

impl<D: GraphicsDevice + 'static> SceneManager<D> {
  pub fn new(config: SceneConfig, style: RenderStyle) -> SharedScene<D> {
    Rc::new(RefCell::new(Self {
      config,
      style,
      status: SceneStatus::Uninitialized,
      spec: LatticeSpec::default(),
      state: None,
      frames_rendered: 0,
    }))
  }

  /// Binds a surface to `host`, builds camera, controls and lights, populates
  /// `spec`, then registers the resize listener and starts the render loop.
  /// Any failure leaves the manager in `Error` with nothing acquired, from
  /// where a later call may try again.
  pub fn initialize(
    this: &SharedScene<D>,
    host: Rc<dyn SurfaceHost>,
    scheduler: &dyn FrameScheduler,
    device: D,
    spec: LatticeSpec,
  ) -> Result<(), SceneError> {
    {
      let mut mgr = this.borrow_mut();
      let retry = matches!(mgr.status, SceneStatus::Error(_)) && mgr.state.is_none();
      if mgr.status != SceneStatus::Uninitialized && !retry {
        return Err(SceneError::InvalidState {
          op: "initialize",
          status: mgr.status.clone(),
        });
      }
      if retry {
        info!("Retrying 3D scene initialization");
      }

      match mgr.build_state(host.clone(), device, &spec) {
        Ok(state) => {
          mgr.spec = spec;
          mgr.state = Some(state);
        }
        Err(e) => {
          error!("{}", e);
          mgr.status = SceneStatus::Error(e.to_string());
          return Err(e);
        }
      }
    }

    // Callbacks hold weak references; the manager may be borrowed when they
    // fire re-entrantly, in which case that frame or event is skipped.
    let weak = Rc::downgrade(this);
    let resize_listener = host.on_resize(Box::new(move |w, h| {
      if let Some(mgr) = weak.upgrade() {
        if let Ok(mut mgr) = mgr.try_borrow_mut() {
          mgr.resize(w, h);
        }
      }
    }));

    let weak = Rc::downgrade(this);
    let render_task = scheduler.schedule_repeating(Box::new(move |_| {
      if let Some(mgr) = weak.upgrade() {
        if let Ok(mut mgr) = mgr.try_borrow_mut() {
          if let Err(e) = mgr.render_frame() {
            warn!("Frame skipped: {}", e);
          }
        }
      }
    }));

    host.attach_surface();

    let mut mgr = this.borrow_mut();
    let count = match mgr.state.as_mut() {
      Some(state) => {
        state.resize_listener = Some(resize_listener);
        state.render_task = Some(render_task);
        state.elements.len()
      }
      None => {
        resize_listener.cancel();
        render_task.cancel();
        return Err(SceneError::InvalidState {
          op: "initialize",
          status: mgr.status.clone(),
        });
      }
    };
    mgr.status = SceneStatus::Ready;
    info!("3D scene ready: {} with {} ions", mgr.spec.structure, count);
    Ok(())
  }

  fn build_state(
    &self,
    host: Rc<dyn SurfaceHost>,
    mut device: D,
    spec: &LatticeSpec,
  ) -> Result<SceneState<D>, SceneError> {
    let (w, h) = host
      .container_size()
      .filter(|&(w, h)| w > 0 && h > 0)
      .ok_or(SceneError::NoDrawableSurface)?;
    device.create_surface(w, h)?;

    let cam_cfg = &self.config.camera;
    let mut camera =
      PerspectiveCamera::new(cam_cfg.fov_deg, w as f64 / h as f64, cam_cfg.near, cam_cfg.far);
    camera.position = Point3::new(0.0, 0.0, cam_cfg.distance);
    let controls = OrbitController::new(&camera, cam_cfg.damping_factor);

    let lights = &self.config.lights;
    let [lx, ly, lz] = lights.directional_position;

    let mut state = SceneState {
      device,
      host,
      camera,
      controls,
      lighting: SphereLighting {
        ambient: lights.ambient_intensity,
        directional: lights.directional_intensity,
        ..SphereLighting::default()
      },
      light_position: Vector3::new(lx, ly, lz),
      elements: Vec::new(),
      size: (w, h),
      render_task: None,
      resize_listener: None,
    };

    if let Err(e) = state.populate(spec, &self.style) {
      state.device.destroy_surface();
      return Err(e.into());
    }
    Ok(state)
  }

  /// Replaces the element set with the ions of `spec`. The previous set is
  /// fully released before the first new element is created.
  pub fn populate(&mut self, spec: LatticeSpec) -> Result<usize, SceneError> {
    let style = &self.style;
    let state = match self.state.as_mut() {
      Some(state) => state,
      None => {
        return Err(SceneError::InvalidState {
          op: "populate",
          status: self.status.clone(),
        })
      }
    };

    match state.populate(&spec, style) {
      Ok(count) => {
        self.spec = spec;
        self.status = SceneStatus::Ready;
        info!(
          "Scene populated: {} (extent {}), {} ions",
          spec.structure, spec.extent, count
        );
        state.host.request_redraw();
        Ok(count)
      }
      Err(e) => {
        let e = SceneError::from(e);
        error!("{}", e);
        self.status = SceneStatus::Error(e.to_string());
        Err(e)
      }
    }
  }

  /// Validates a structure name and extent from the host, then populates.
  /// An invalid request leaves the current element set untouched.
  pub fn populate_from(&mut self, structure: &str, extent: i64) -> Result<usize, SceneError> {
    let spec = LatticeSpec::parse(structure, extent).map_err(|e| {
      warn!("Rejected lattice request: {}", e);
      SceneError::from(e)
    })?;
    self.populate(spec)
  }

  /// Puts a rejected lattice request on show as the error state. The current
  /// element set stays; the next successful populate clears the error.
  pub fn reject_lattice(&mut self, e: LatticeError) {
    if self.status == SceneStatus::Disposed {
      return;
    }
    let e = SceneError::from(e);
    warn!("{}", e);
    self.status = SceneStatus::Error(e.to_string());
    if let Some(state) = self.state.as_ref() {
      state.host.request_redraw();
    }
  }

  /// Container resized: recompute the camera aspect and projection and match
  /// the surface size. Ion elements are untouched.
  pub fn resize(&mut self, width: u32, height: u32) {
    let Some(state) = self.state.as_mut() else {
      return;
    };
    if width == 0 || height == 0 {
      debug!("Ignoring resize to {}x{}", width, height);
      return;
    }

    state.camera.set_aspect(width as f64 / height as f64);
    match state.device.resize_surface(width, height) {
      Ok(()) => {
        state.size = (width, height);
        debug!("Scene resized to {}x{}", width, height);
      }
      Err(e) => warn!("Surface resize failed: {}", e),
    }
    state.host.request_redraw();
  }

  /// One frame: advance damping, draw.
  pub fn render_frame(&mut self) -> Result<(), SceneError> {
    let background = self.config.background_color;
    let state = match self.state.as_mut() {
      Some(state) => state,
      None => {
        return Err(SceneError::InvalidState {
          op: "render",
          status: self.status.clone(),
        })
      }
    };
    state.render(background)?;
    state.host.request_redraw();
    self.frames_rendered += 1;
    Ok(())
  }

  /// Pointer drag on the surface, in pixels.
  pub fn orbit(&mut self, dx: f64, dy: f64) {
    if let Some(state) = self.state.as_mut() {
      let height = state.size.1 as f64;
      state.controls.rotate_by_pixels(dx, dy, height);
    }
  }

  /// Scroll input; positive `steps` zooms out.
  pub fn zoom(&mut self, steps: f64) {
    let step = self.config.camera.zoom_step;
    if let Some(state) = self.state.as_mut() {
      state.controls.dolly((1.0 + step).powf(steps));
    }
  }

  // --- Accessors ---

  pub fn status(&self) -> &SceneStatus {
    &self.status
  }

  pub fn spec(&self) -> LatticeSpec {
    self.spec
  }

  pub fn elements(&self) -> &[IonElement] {
    self.state.as_ref().map(|s| s.elements.as_slice()).unwrap_or(&[])
  }

  pub fn camera(&self) -> Option<&PerspectiveCamera> {
    self.state.as_ref().map(|s| &s.camera)
  }

  pub fn surface_size(&self) -> Option<(u32, u32)> {
    self.state.as_ref().and_then(|s| s.device.surface_size())
  }

  pub fn device_stats(&self) -> Option<DeviceStats> {
    self.state.as_ref().map(|s| s.device.stats())
  }

  pub fn frames_rendered(&self) -> u64 {
    self.frames_rendered
  }

  pub fn is_render_loop_active(&self) -> bool {
    self
      .state
      .as_ref()
      .and_then(|s| s.render_task.as_ref())
      .map(|t| t.is_active())
      .unwrap_or(false)
  }
}

impl<D: GraphicsDevice> SceneManager<D> {
  /// Cancels the render loop, deregisters the resize listener, detaches the
  /// surface and releases every element. Returns `false` when there was
  /// nothing left to dispose.
  pub fn dispose(&mut self) -> bool {
    let disposed = match self.state.take() {
      Some(mut state) => {
        state.teardown();
        info!("3D scene disposed after {} frames", self.frames_rendered);
        true
      }
      None => false,
    };
    self.status = SceneStatus::Disposed;
    disposed
  }
}

impl<D: GraphicsDevice> Drop for SceneManager<D> {
  fn drop(&mut self) {
    self.dispose();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::animation::scheduler::VirtualClock;
  use crate::model::StructureType;
  use std::cell::Cell;

  // --- Counting device with failure injection ---

  #[derive(Default)]
  struct Ledger {
    stats: DeviceStats,
    surface: Option<(u32, u32)>,
    live_geometries: Vec<u64>,
    live_materials: Vec<u64>,
    next_id: u64,
    // Fail the n-th material creation (1-based)
    fail_material_at: Option<u64>,
    fail_surface: bool,
  }

  #[derive(Clone, Default)]
  struct CountingDevice {
    ledger: Rc<RefCell<Ledger>>,
  }

  impl GraphicsDevice for CountingDevice {
    fn create_surface(&mut self, width: u32, height: u32) -> Result<(), DeviceError> {
      let mut l = self.ledger.borrow_mut();
      if l.fail_surface {
        return Err(DeviceError::SurfaceUnavailable("no context".into()));
      }
      l.surface = Some((width, height));
      l.stats.surfaces_created += 1;
      Ok(())
    }

    fn resize_surface(&mut self, width: u32, height: u32) -> Result<(), DeviceError> {
      let mut l = self.ledger.borrow_mut();
      match l.surface {
        Some(_) => {
          l.surface = Some((width, height));
          Ok(())
        }
        None => Err(DeviceError::NoSurface),
      }
    }

    fn surface_size(&self) -> Option<(u32, u32)> {
      self.ledger.borrow().surface
    }

    fn destroy_surface(&mut self) {
      let mut l = self.ledger.borrow_mut();
      if l.surface.take().is_some() {
        l.stats.surfaces_destroyed += 1;
      }
    }

    fn create_geometry(&mut self, _geometry: SphereGeometry) -> Result<GeometryId, DeviceError> {
      let mut l = self.ledger.borrow_mut();
      l.next_id += 1;
      let id = l.next_id;
      l.live_geometries.push(id);
      l.stats.geometries_created += 1;
      Ok(GeometryId(id))
    }

    fn create_material(&mut self, _material: PhongMaterial) -> Result<MaterialId, DeviceError> {
      let mut l = self.ledger.borrow_mut();
      if l.fail_material_at == Some(l.stats.materials_created + 1) {
        return Err(DeviceError::ResourceExhausted("material"));
      }
      l.next_id += 1;
      let id = l.next_id;
      l.live_materials.push(id);
      l.stats.materials_created += 1;
      Ok(MaterialId(id))
    }

    fn release_geometry(&mut self, id: GeometryId) {
      let mut l = self.ledger.borrow_mut();
      let before = l.live_geometries.len();
      l.live_geometries.retain(|&g| g != id.0);
      assert_eq!(before, l.live_geometries.len() + 1, "double or unknown release");
      l.stats.geometries_released += 1;
    }

    fn release_material(&mut self, id: MaterialId) {
      let mut l = self.ledger.borrow_mut();
      let before = l.live_materials.len();
      l.live_materials.retain(|&m| m != id.0);
      assert_eq!(before, l.live_materials.len() + 1, "double or unknown release");
      l.stats.materials_released += 1;
    }

    fn draw(&mut self, frame: &FrameDraw<'_>) -> Result<(), DeviceError> {
      let mut l = self.ledger.borrow_mut();
      for item in frame.items {
        assert!(l.live_geometries.contains(&item.geometry.0));
        assert!(l.live_materials.contains(&item.material.0));
      }
      l.stats.frames_drawn += 1;
      Ok(())
    }

    fn stats(&self) -> DeviceStats {
      self.ledger.borrow().stats
    }
  }

  // --- Fake container ---

  #[derive(Default)]
  struct FakeHost {
    size: Cell<Option<(u32, u32)>>,
    attached: Cell<bool>,
    detach_calls: Cell<u32>,
    redraws: Cell<u32>,
    listeners: Rc<RefCell<Vec<(u64, Rc<dyn Fn(u32, u32)>)>>>,
    next_listener: Cell<u64>,
  }

  impl FakeHost {
    fn sized(w: u32, h: u32) -> Rc<Self> {
      let host = Rc::new(FakeHost::default());
      host.size.set(Some((w, h)));
      host
    }

    fn fire_resize(&self, w: u32, h: u32) {
      self.size.set(Some((w, h)));
      let listeners: Vec<_> = self.listeners.borrow().iter().map(|(_, l)| l.clone()).collect();
      for l in listeners {
        l(w, h);
      }
    }

    fn listener_count(&self) -> usize {
      self.listeners.borrow().len()
    }
  }

  impl SurfaceHost for FakeHost {
    fn container_size(&self) -> Option<(u32, u32)> {
      self.size.get()
    }

    fn attach_surface(&self) {
      self.attached.set(true);
    }

    fn detach_surface(&self) {
      self.attached.set(false);
      self.detach_calls.set(self.detach_calls.get() + 1);
    }

    fn on_resize(&self, listener: Box<dyn Fn(u32, u32)>) -> CallbackHandle {
      let id = self.next_listener.get();
      self.next_listener.set(id + 1);
      self.listeners.borrow_mut().push((id, Rc::from(listener)));
      let listeners = self.listeners.clone();
      CallbackHandle::new(move || listeners.borrow_mut().retain(|(i, _)| *i != id))
    }

    fn request_redraw(&self) {
      self.redraws.set(self.redraws.get() + 1);
    }
  }

  fn spec(structure: StructureType, n: i64) -> LatticeSpec {
    LatticeSpec::new(structure, n).unwrap()
  }

  fn ready_scene(
    host: &Rc<FakeHost>,
    clock: &VirtualClock,
    device: CountingDevice,
    s: LatticeSpec,
  ) -> SharedScene<CountingDevice> {
    let scene = SceneManager::new(SceneConfig::default(), RenderStyle::default());
    SceneManager::initialize(&scene, host.clone(), clock, device, s).unwrap();
    scene
  }

  #[test]
  fn test_initialize_populates_and_starts_loop() {
    let host = FakeHost::sized(400, 200);
    let clock = VirtualClock::new();
    let device = CountingDevice::default();
    let ledger = device.ledger.clone();
    let scene = ready_scene(&host, &clock, device, spec(StructureType::RockSalt, 3));

    {
      let s = scene.borrow();
      assert_eq!(*s.status(), SceneStatus::Ready);
      assert_eq!(s.elements().len(), 27);
      assert_eq!(s.surface_size(), Some((400, 200)));
      assert!((s.camera().unwrap().aspect - 2.0).abs() < 1e-12);
      assert!(s.is_render_loop_active());
    }
    assert!(host.attached.get());
    assert_eq!(host.listener_count(), 1);
    assert_eq!(clock.active_tasks(), 1);

    clock.advance(4);
    assert_eq!(scene.borrow().frames_rendered(), 4);
    assert_eq!(ledger.borrow().stats.frames_drawn, 4);
  }

  #[test]
  fn test_elements_are_centred() {
    let host = FakeHost::sized(100, 100);
    let clock = VirtualClock::new();
    let scene = ready_scene(&host, &clock, CountingDevice::default(), spec(StructureType::RockSalt, 2));
    let s = scene.borrow();
    let sum = s
      .elements()
      .iter()
      .fold(Vector3::zeros(), |acc, e| acc + e.position.coords);
    assert!(sum.norm() < 1e-12);
    assert!(s.elements().iter().all(|e| e.position.x.abs() == 0.5));
  }

  #[test]
  fn test_repopulate_releases_previous_set_first() {
    let host = FakeHost::sized(100, 100);
    let clock = VirtualClock::new();
    let device = CountingDevice::default();
    let ledger = device.ledger.clone();
    let scene = ready_scene(&host, &clock, device, spec(StructureType::RockSalt, 3));

    let count = scene
      .borrow_mut()
      .populate(spec(StructureType::CesiumChloride, 3))
      .unwrap();
    assert_eq!(count, 27);

    let l = ledger.borrow();
    assert_eq!(l.stats.geometries_created, 54);
    assert_eq!(l.stats.geometries_released, 27);
    assert_eq!(l.stats.materials_released, 27);
    assert_eq!(l.live_geometries.len(), 27);
    assert_eq!(l.live_materials.len(), 27);
  }

  #[test]
  fn test_populate_cycles_then_dispose_balance() {
    let host = FakeHost::sized(100, 100);
    let clock = VirtualClock::new();
    let device = CountingDevice::default();
    let ledger = device.ledger.clone();
    let scene = ready_scene(&host, &clock, device, spec(StructureType::Fluorite, 2));

    for structure in StructureType::ALL {
      for n in [0, 1, 4] {
        scene.borrow_mut().populate(spec(structure, n)).unwrap();
        clock.advance(1);
      }
    }

    assert!(scene.borrow_mut().dispose());
    let l = ledger.borrow();
    assert!(l.stats.is_balanced(), "{:?}", l.stats);
    assert!(l.live_geometries.is_empty());
    assert!(l.live_materials.is_empty());
  }

  #[test]
  fn test_dispose_twice_is_a_noop() {
    let host = FakeHost::sized(100, 100);
    let clock = VirtualClock::new();
    let device = CountingDevice::default();
    let ledger = device.ledger.clone();
    let scene = ready_scene(&host, &clock, device, spec(StructureType::RockSalt, 2));

    assert!(scene.borrow_mut().dispose());
    assert!(!scene.borrow_mut().dispose());

    assert_eq!(*scene.borrow().status(), SceneStatus::Disposed);
    assert_eq!(host.detach_calls.get(), 1);
    assert!(!host.attached.get());
    assert_eq!(host.listener_count(), 0);
    assert_eq!(clock.active_tasks(), 0);

    let stats = ledger.borrow().stats;
    assert_eq!(stats.geometries_released, 8);
    assert_eq!(stats.materials_released, 8);
    assert_eq!(stats.surfaces_destroyed, 1);

    // Loop stays stopped
    clock.advance(3);
    assert_eq!(ledger.borrow().stats.frames_drawn, 0);
  }

  #[test]
  fn test_operations_after_dispose_are_rejected() {
    let host = FakeHost::sized(100, 100);
    let clock = VirtualClock::new();
    let scene = ready_scene(&host, &clock, CountingDevice::default(), spec(StructureType::RockSalt, 2));
    scene.borrow_mut().dispose();

    let err = scene.borrow_mut().populate(spec(StructureType::RockSalt, 2));
    assert!(matches!(
      err,
      Err(SceneError::InvalidState { op: "populate", status: SceneStatus::Disposed })
    ));
    assert!(scene.borrow_mut().render_frame().is_err());
    scene.borrow_mut().resize(10, 10);
  }

  #[test]
  fn test_resize_updates_camera_and_surface_only() {
    let host = FakeHost::sized(300, 300);
    let clock = VirtualClock::new();
    let scene = ready_scene(&host, &clock, CountingDevice::default(), spec(StructureType::RockSalt, 3));

    let before: Vec<_> = scene
      .borrow()
      .elements()
      .iter()
      .map(|e| (e.ion_id.clone(), e.position))
      .collect();

    host.fire_resize(800, 400);

    let s = scene.borrow();
    assert_eq!(s.surface_size(), Some((800, 400)));
    assert!((s.camera().unwrap().aspect - 2.0).abs() < 1e-12);
    let after: Vec<_> = s.elements().iter().map(|e| (e.ion_id.clone(), e.position)).collect();
    assert_eq!(before, after);
  }

  #[test]
  fn test_missing_container_is_an_error_state() {
    let host = Rc::new(FakeHost::default());
    let clock = VirtualClock::new();
    let device = CountingDevice::default();
    let ledger = device.ledger.clone();
    let scene: SharedScene<CountingDevice> =
      SceneManager::new(SceneConfig::default(), RenderStyle::default());

    let result = SceneManager::initialize(
      &scene,
      host.clone(),
      &clock,
      device,
      spec(StructureType::RockSalt, 3),
    );
    assert_eq!(result, Err(SceneError::NoDrawableSurface));
    assert!(matches!(scene.borrow().status(), SceneStatus::Error(_)));
    assert_eq!(clock.active_tasks(), 0);
    assert_eq!(host.listener_count(), 0);
    assert!(!host.attached.get());
    assert_eq!(ledger.borrow().stats, DeviceStats::default());
  }

  #[test]
  fn test_surface_failure_is_an_error_state() {
    let host = FakeHost::sized(100, 100);
    let clock = VirtualClock::new();
    let device = CountingDevice::default();
    device.ledger.borrow_mut().fail_surface = true;
    let scene: SharedScene<CountingDevice> =
      SceneManager::new(SceneConfig::default(), RenderStyle::default());

    let result =
      SceneManager::initialize(&scene, host, &clock, device, spec(StructureType::RockSalt, 3));
    assert!(matches!(result, Err(SceneError::Device(_))));
    match scene.borrow().status() {
      SceneStatus::Error(msg) => assert!(msg.contains("Failed to initialize 3D viewer")),
      other => panic!("unexpected status {:?}", other),
    }
    assert_eq!(clock.active_tasks(), 0);
  }

  #[test]
  fn test_failure_mid_populate_releases_everything() {
    let host = FakeHost::sized(100, 100);
    let clock = VirtualClock::new();
    let device = CountingDevice::default();
    let ledger = device.ledger.clone();
    ledger.borrow_mut().fail_material_at = Some(5);
    let scene: SharedScene<CountingDevice> =
      SceneManager::new(SceneConfig::default(), RenderStyle::default());

    let result =
      SceneManager::initialize(&scene, host, &clock, device, spec(StructureType::RockSalt, 3));
    assert!(matches!(
      result,
      Err(SceneError::Device(DeviceError::ResourceExhausted("material")))
    ));

    let l = ledger.borrow();
    assert!(l.stats.is_balanced(), "{:?}", l.stats);
    assert_eq!(l.stats.geometries_created, 5);
    assert_eq!(l.stats.materials_created, 4);
    assert_eq!(clock.active_tasks(), 0);
  }

  #[test]
  fn test_failed_repopulate_leaves_no_partial_set() {
    let host = FakeHost::sized(100, 100);
    let clock = VirtualClock::new();
    let device = CountingDevice::default();
    let ledger = device.ledger.clone();
    let scene = ready_scene(&host, &clock, device, spec(StructureType::RockSalt, 2));

    // 8 materials exist; fail the third of the next set
    ledger.borrow_mut().fail_material_at = Some(11);
    assert!(scene.borrow_mut().populate(spec(StructureType::Rutile, 3)).is_err());
    assert!(scene.borrow().elements().is_empty());
    assert!(matches!(scene.borrow().status(), SceneStatus::Error(_)));
    {
      let l = ledger.borrow();
      assert!(l.live_geometries.is_empty());
      assert!(l.live_materials.is_empty());
    }

    // A live state is never rebuilt over
    let again = SceneManager::initialize(
      &scene,
      host.clone(),
      &clock,
      CountingDevice::default(),
      spec(StructureType::Rutile, 2),
    );
    assert!(matches!(again, Err(SceneError::InvalidState { op: "initialize", .. })));
    assert_eq!(clock.active_tasks(), 1);

    // Recovers on the next valid populate
    ledger.borrow_mut().fail_material_at = None;
    assert_eq!(scene.borrow_mut().populate(spec(StructureType::Rutile, 2)).unwrap(), 8);
    assert_eq!(*scene.borrow().status(), SceneStatus::Ready);
  }

  #[test]
  fn test_invalid_request_keeps_current_set() {
    let host = FakeHost::sized(100, 100);
    let clock = VirtualClock::new();
    let scene = ready_scene(&host, &clock, CountingDevice::default(), spec(StructureType::RockSalt, 2));

    let err = scene.borrow_mut().populate_from("wurtzite", 2);
    assert!(matches!(err, Err(SceneError::Lattice(LatticeError::InvalidStructureType(_)))));
    let err = scene.borrow_mut().populate_from("nacl", -3);
    assert!(matches!(err, Err(SceneError::Lattice(LatticeError::NegativeExtent(-3)))));

    assert_eq!(scene.borrow().elements().len(), 8);
    assert_eq!(*scene.borrow().status(), SceneStatus::Ready);
    assert_eq!(scene.borrow_mut().populate_from("tio2", 1).unwrap(), 1);
  }

  #[test]
  fn test_second_initialize_is_rejected() {
    let host = FakeHost::sized(100, 100);
    let clock = VirtualClock::new();
    let scene = ready_scene(&host, &clock, CountingDevice::default(), spec(StructureType::RockSalt, 2));

    let again = SceneManager::initialize(
      &scene,
      host.clone(),
      &clock,
      CountingDevice::default(),
      spec(StructureType::RockSalt, 2),
    );
    assert!(matches!(again, Err(SceneError::InvalidState { op: "initialize", .. })));
    assert_eq!(clock.active_tasks(), 1);
    assert_eq!(host.listener_count(), 1);
  }

  #[test]
  fn test_orbit_moves_camera_over_frames() {
    let host = FakeHost::sized(100, 100);
    let clock = VirtualClock::new();
    let scene = ready_scene(&host, &clock, CountingDevice::default(), spec(StructureType::RockSalt, 2));

    let start = scene.borrow().camera().unwrap().position;
    scene.borrow_mut().orbit(50.0, 0.0);
    clock.advance(1);
    let one = scene.borrow().camera().unwrap().position;
    clock.advance(30);
    let later = scene.borrow().camera().unwrap().position;

    assert!((one - start).norm() > 0.0);
    assert!((later - one).norm() > (one - start).norm());

    // Zoom eases in over frames like rotation
    let full = 5.0 * 1.1f64.powi(3);
    scene.borrow_mut().zoom(3.0);
    clock.advance(1);
    let cam = scene.borrow().camera().unwrap().clone();
    let first = (cam.position - cam.target).norm();
    assert!(first > 5.0 && first < full);

    clock.advance(2000);
    let cam = scene.borrow().camera().unwrap().clone();
    assert!(((cam.position - cam.target).norm() - full).abs() < 1e-6);
  }

  #[test]
  fn test_initialize_retries_after_error() {
    let host = Rc::new(FakeHost::default());
    let clock = VirtualClock::new();
    let scene: SharedScene<CountingDevice> =
      SceneManager::new(SceneConfig::default(), RenderStyle::default());

    let first = SceneManager::initialize(
      &scene,
      host.clone(),
      &clock,
      CountingDevice::default(),
      spec(StructureType::RockSalt, 2),
    );
    assert_eq!(first, Err(SceneError::NoDrawableSurface));

    host.size.set(Some((200, 100)));
    SceneManager::initialize(
      &scene,
      host.clone(),
      &clock,
      CountingDevice::default(),
      spec(StructureType::RockSalt, 2),
    )
    .unwrap();

    assert_eq!(*scene.borrow().status(), SceneStatus::Ready);
    assert_eq!(scene.borrow().elements().len(), 8);
    assert_eq!(clock.active_tasks(), 1);
    assert_eq!(host.listener_count(), 1);
  }

  #[test]
  fn test_dropping_scene_releases_everything() {
    let host = FakeHost::sized(100, 100);
    let clock = VirtualClock::new();
    let device = CountingDevice::default();
    let ledger = device.ledger.clone();
    let scene = ready_scene(&host, &clock, device, spec(StructureType::Fluorite, 2));
    assert_eq!(clock.active_tasks(), 1);

    drop(scene);

    assert_eq!(clock.active_tasks(), 0);
    assert_eq!(host.listener_count(), 0);
    assert!(!host.attached.get());
    let l = ledger.borrow();
    assert!(l.stats.is_balanced(), "{:?}", l.stats);
    assert_eq!(l.stats.surfaces_destroyed, 1);
  }

  #[test]
  fn test_rejected_lattice_shows_error_until_repopulated() {
    let host = FakeHost::sized(100, 100);
    let clock = VirtualClock::new();
    let scene = ready_scene(&host, &clock, CountingDevice::default(), spec(StructureType::RockSalt, 0));

    scene
      .borrow_mut()
      .reject_lattice(LatticeError::InvalidStructureType("wurtzite".into()));
    match scene.borrow().status() {
      SceneStatus::Error(msg) => assert!(msg.contains("wurtzite")),
      other => panic!("unexpected status {:?}", other),
    }
    // The loop keeps running so a later request can recover
    assert!(scene.borrow().is_render_loop_active());

    assert_eq!(scene.borrow_mut().populate(spec(StructureType::RockSalt, 2)).unwrap(), 8);
    assert_eq!(*scene.borrow().status(), SceneStatus::Ready);

    scene.borrow_mut().dispose();
    scene
      .borrow_mut()
      .reject_lattice(LatticeError::NegativeExtent(-1));
    assert_eq!(*scene.borrow().status(), SceneStatus::Disposed);
  }
}
