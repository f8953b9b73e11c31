// src/panels/sidebar.rs

use gtk4::prelude::*;
use gtk4::{
  Align, Box as GtkBox, CheckButton, DrawingArea, DropDown, Expander, Label, Orientation,
  PolicyType, ScrolledWindow, SpinButton,
};

use crate::model::species::PRESET_LABELS;
use crate::model::StructureType;
use crate::state::AppState;
use log::warn;
use std::cell::RefCell;
use std::rc::Rc;

// Practical range for a legible lattice
const EXTENT_MIN: f64 = 1.0;
const EXTENT_MAX: f64 = 6.0;

/// The drawing areas the controls need to repaint.
#[derive(Clone)]
pub struct ViewAreas {
  pub scene: DrawingArea,
  pub grid: DrawingArea,
  pub shells: DrawingArea,
}

/// Spin range for the grid size. Widened to take in a configured extent
/// outside the usual range, so the control always shows what is drawn.
fn extent_range(extent: usize) -> (f64, f64) {
  let extent = extent as f64;
  (EXTENT_MIN.min(extent), EXTENT_MAX.max(extent))
}

fn labeled(label: &str, widget: &impl IsA<gtk4::Widget>) -> GtkBox {
  let b = GtkBox::new(Orientation::Vertical, 2);
  b.append(&Label::builder().label(label).halign(Align::Start).build());
  b.append(widget);
  b
}

pub fn build(state: Rc<RefCell<AppState>>, areas: &ViewAreas) -> ScrolledWindow {
  // 1. Root Container (Scrollable)
  let scroll = ScrolledWindow::builder()
    .hscrollbar_policy(PolicyType::Never)
    .vscrollbar_policy(PolicyType::Automatic)
    .min_content_width(200)
    .build();

  let root_vbox = GtkBox::new(Orientation::Vertical, 10);
  root_vbox.set_margin_start(10);
  root_vbox.set_margin_end(10);
  root_vbox.set_margin_top(10);
  root_vbox.set_margin_bottom(10);
  scroll.set_child(Some(&root_vbox));

  let (spec, interactive, ion) = {
    let st = state.borrow();
    (st.lattice_spec(), st.config.interactive, st.preset.label)
  };

  // ============================================================
  // SECTION 1: LATTICE
  // ============================================================
  let lattice_expander = Expander::new(Some("Lattice"));
  lattice_expander.set_expanded(true);

  let lattice_box = GtkBox::new(Orientation::Vertical, 15);
  lattice_box.set_margin_top(10);
  lattice_box.set_margin_start(5);

  let names: Vec<&str> = StructureType::ALL.iter().map(|s| s.display_name()).collect();
  let structure_dd = DropDown::from_strings(&names);
  structure_dd.set_selected(spec.structure.index() as u32);

  let (lo, hi) = extent_range(spec.extent);
  let extent_spin = SpinButton::with_range(lo, hi, 1.0);
  extent_spin.set_value(spec.extent as f64);

  lattice_box.append(&labeled("Structure", &structure_dd));
  lattice_box.append(&labeled("Grid size (N)", &extent_spin));

  // Both controls feed the same request
  let apply: Rc<dyn Fn()> = {
    let s = state.clone();
    let dd = structure_dd.clone();
    let spin = extent_spin.clone();
    let areas = areas.clone();
    Rc::new(move || {
      let Some(structure) = StructureType::from_index(dd.selected() as usize) else {
        return;
      };
      let extent = spin.value_as_int() as i64;
      let Ok(mut st) = s.try_borrow_mut() else {
        return;
      };
      if let Err(e) = st.apply_lattice(structure, extent) {
        warn!("{}", e);
      }
      areas.scene.queue_draw();
      areas.grid.queue_draw();
    })
  };

  let a = apply.clone();
  structure_dd.connect_selected_notify(move |_| a());
  let a = apply.clone();
  extent_spin.connect_value_changed(move |_| a());

  lattice_expander.set_child(Some(&lattice_box));
  root_vbox.append(&lattice_expander);

  // ============================================================
  // SECTION 2: INTERACTION
  // ============================================================
  let interactive_check = CheckButton::with_label("Interactive (drag / click)");
  interactive_check.set_active(interactive);
  let s = state.clone();
  let grid_area = areas.grid.clone();
  interactive_check.connect_toggled(move |btn| {
    if let Ok(mut st) = s.try_borrow_mut() {
      st.set_interactive(btn.is_active());
      grid_area.queue_draw();
    }
  });
  root_vbox.append(&interactive_check);

  // ============================================================
  // SECTION 3: ELECTRON SHELLS
  // ============================================================
  let shells_expander = Expander::new(Some("Electron Shells"));
  shells_expander.set_expanded(true);

  let ion_dd = DropDown::from_strings(PRESET_LABELS);
  if let Some(i) = PRESET_LABELS.iter().position(|l| *l == ion) {
    ion_dd.set_selected(i as u32);
  }
  let s = state.clone();
  let shells_area = areas.shells.clone();
  ion_dd.connect_selected_notify(move |dd| {
    let Some(label) = PRESET_LABELS.get(dd.selected() as usize) else {
      return;
    };
    if let Ok(mut st) = s.try_borrow_mut() {
      st.set_ion(label);
      shells_area.queue_draw();
    }
  });

  let shells_box = GtkBox::new(Orientation::Vertical, 15);
  shells_box.set_margin_top(10);
  shells_box.set_margin_start(5);
  shells_box.append(&labeled("Ion", &ion_dd));
  shells_expander.set_child(Some(&shells_box));
  root_vbox.append(&shells_expander);

  scroll
}
