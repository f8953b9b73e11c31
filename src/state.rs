// src/state.rs

use crate::animation::{FrameScheduler, ShellAnimator};
use crate::config::Config;
use crate::model::species::{ion_preset, ion_preset_or_default};
use crate::model::{IonPreset, LatticeError, LatticeSpec, StructureType};
use crate::rendering::scene::SceneError;
use crate::rendering::{
  new_surface_slot, CairoDevice, IonGridView, SceneManager, SceneStatus, SharedScene,
  SurfaceHost, SurfaceSlot,
};
use log::{debug, info, warn};
use std::cell::RefCell;
use std::rc::Rc;

/// Everything one window owns: the parameter set and the three views.
pub struct AppState {
  pub config: Config,
  pub scene: SharedScene<CairoDevice>,
  pub scene_slot: SurfaceSlot,
  pub grid: Rc<RefCell<IonGridView>>,
  pub shells: ShellAnimator,
  pub preset: IonPreset,
  // Lattice request refused at startup, shown until one is accepted
  rejected: Option<LatticeError>,
  torn_down: bool,
}

impl AppState {
  /// Builds the views from `config`. A lattice request that fails validation
  /// is rejected: both lattice views start empty and show the reason. The 3D
  /// scene is not initialized until its widget exists.
  pub fn new(config: Config) -> Self {
    let (spec, rejected) = match config.lattice_spec() {
      Ok(spec) => (spec, None),
      Err(e) => {
        warn!("Rejected lattice request: {}", e);
        let structure = config.structure.parse::<StructureType>().unwrap_or_default();
        (LatticeSpec { structure, extent: 0 }, Some(e))
      }
    };

    if ion_preset(&config.ion).is_none() {
      warn!("Unknown ion '{}'", config.ion);
    }
    let preset = ion_preset_or_default(&config.ion);

    let mut grid = IonGridView::new(spec, config.style.clone(), config.interactive);
    if let Some(e) = &rejected {
      grid.show_rejection(e);
    }
    let scene = SceneManager::new(config.scene.clone(), config.style.clone());

    Self {
      shells: ShellAnimator::new(preset.electrons),
      preset,
      grid: Rc::new(RefCell::new(grid)),
      scene,
      scene_slot: new_surface_slot(),
      config,
      rejected,
      torn_down: false,
    }
  }

  /// Initializes the 3D scene on `host` with the current lattice. A lattice
  /// rejected at startup is carried over as the scene's error state.
  pub fn start_scene(
    &self,
    host: Rc<dyn SurfaceHost>,
    scheduler: &dyn FrameScheduler,
  ) -> Result<(), SceneError> {
    let device = CairoDevice::new(self.scene_slot.clone());
    SceneManager::initialize(&self.scene, host, scheduler, device, self.lattice_spec())?;
    if let Some(e) = self.rejected.clone() {
      self.scene.borrow_mut().reject_lattice(e);
    }
    Ok(())
  }


  pub fn lattice_spec(&self) -> LatticeSpec {
    self.grid.borrow().spec()
  }

  /// Regenerates both lattice views. The request is validated first, so a
  /// rejected one leaves both views as they were.
  pub fn apply_lattice(
    &mut self,
    structure: StructureType,
    extent: i64,
  ) -> Result<usize, LatticeError> {
    let spec = LatticeSpec::new(structure, extent)?;
    self.config.structure = structure.key().to_string();
    self.config.extent = extent;
    self.rejected = None;

    let count = self.grid.borrow_mut().regenerate(spec);

    let mut scene = self.scene.borrow_mut();
    let live = !matches!(scene.status(), SceneStatus::Uninitialized | SceneStatus::Disposed);
    if live {
      if let Err(e) = scene.populate(spec) {
        warn!("3D scene kept no ions: {}", e);
      }
    } else {
      debug!("3D scene not live; lattice change applies to the transform view only");
    }
    info!("Lattice set to {} (extent {}), {} ions", structure, extent, count);
    Ok(count)
  }

  pub fn set_interactive(&mut self, interactive: bool) {
    self.config.interactive = interactive;
    self.grid.borrow_mut().set_interactive(interactive);
  }

  pub fn set_ion(&mut self, label: &str) {
    let preset = ion_preset_or_default(label);
    self.config.ion = preset.label.to_string();
    self.preset = preset;
    self.shells.set_electrons(preset.electrons);

    let unrepresented = self.shells.state().borrow().unrepresented();
    if unrepresented > 0 {
      info!(
        "{}: {} electrons, {} beyond the third shell not drawn",
        preset.label, preset.electrons, unrepresented
      );
    } else {
      info!("{}: {} electrons", preset.label, preset.electrons);
    }
  }

  /// Disposes the 3D scene and stops the shell animation. Runs once; later
  /// calls return `false`.
  pub fn teardown(&mut self) -> bool {
    if self.torn_down {
      return false;
    }
    self.torn_down = true;
    self.shells.stop();
    self.scene.borrow_mut().dispose();
    true
  }
}
