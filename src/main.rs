use gtk4::prelude::*;
use gtk4::Box as GtkBox;
use gtk4::{
  glib, Application, ApplicationWindow, CssProvider, DrawingArea, Frame, Orientation, Paned,
  ScrolledWindow, TextView, STYLE_PROVIDER_PRIORITY_APPLICATION,
};
use log::{info, warn, LevelFilter};
use std::cell::RefCell;
use std::rc::Rc;

pub mod animation;
pub mod config;
pub mod model;
pub mod panels;
pub mod rendering;
pub mod state;
pub mod ui;
pub mod utils;

use animation::GtkFrameScheduler;
use config::Config;
use panels::ViewAreas;
use rendering::painter;
use state::AppState;
use ui::GtkSurfaceHost;

fn main() -> glib::ExitCode {
  let app = Application::builder()
    .application_id("org.ionview.IonView")
    .build();

  app.connect_activate(build_ui);
  app.run()
}

// Dark frames around the canvases, like the lattice backgrounds
fn install_css() {
  let provider = CssProvider::new();
  provider.load_from_data(
    "
        frame.view-frame > border { border-color: #374151; }
        frame.view-frame > label { font-weight: bold; }
        textview.console text { background-color: #111827; color: #e5e7eb; }
    ",
  );

  if let Some(display) = gdk4::Display::default() {
    gtk4::style_context_add_provider_for_display(
      &display,
      &provider,
      STYLE_PROVIDER_PRIORITY_APPLICATION,
    );
  }
}

fn framed(title: &str, child: &impl IsA<gtk4::Widget>) -> Frame {
  let frame = Frame::new(Some(title));
  frame.add_css_class("view-frame");
  frame.set_child(Some(child));
  frame
}

fn build_ui(app: &Application) {
  install_css();

  let window = ApplicationWindow::builder()
    .application(app)
    .title("IonView - Ionic Crystal Lattices")
    .default_width(1200)
    .default_height(800)
    .build();

  // Console first, so every later message reaches it
  let console_view = TextView::builder()
    .editable(false)
    .cursor_visible(false)
    .monospace(true)
    .left_margin(10)
    .right_margin(10)
    .top_margin(10)
    .bottom_margin(10)
    .build();
  console_view.add_css_class("console");
  if let Err(e) = utils::logger::init(&console_view, LevelFilter::Info) {
    eprintln!("Console logger unavailable: {}", e);
  }

  let (config, config_msg) = Config::from_env();
  info!("{}", config_msg);

  let background = config.scene.background_color;
  let dims = config.size_class.dimensions();
  let state = Rc::new(RefCell::new(AppState::new(config)));

  // --- Drawing areas ---
  let scene_area = DrawingArea::builder()
    .content_width(480)
    .content_height(360)
    .hexpand(true)
    .vexpand(true)
    .build();
  let grid_area = DrawingArea::builder()
    .content_width(480)
    .content_height(360)
    .hexpand(true)
    .vexpand(true)
    .build();
  let shells_area = DrawingArea::builder()
    .content_width(dims.width as i32)
    .content_height(dims.height as i32)
    .build();

  let areas = ViewAreas {
    scene: scene_area.clone(),
    grid: grid_area.clone(),
    shells: shells_area.clone(),
  };

  // --- Layout: sidebar | (views / console) ---
  let views_hbox = GtkBox::new(Orientation::Horizontal, 6);
  views_hbox.append(&framed("3D Lattice", &scene_area));
  views_hbox.append(&framed("Interactive Grid", &grid_area));
  views_hbox.append(&framed("Electron Shells", &shells_area));

  let console_scroll = ScrolledWindow::builder()
    .min_content_height(150)
    .child(&console_view)
    .build();

  let right_pane = Paned::new(Orientation::Vertical);
  right_pane.set_start_child(Some(&views_hbox));
  right_pane.set_end_child(Some(&framed("Console", &console_scroll)));
  right_pane.set_hexpand(true);

  let sidebar = panels::sidebar::build(state.clone(), &areas);
  let main_hbox = GtkBox::new(Orientation::Horizontal, 0);
  main_hbox.append(&sidebar);
  main_hbox.append(&right_pane);
  window.set_child(Some(&main_hbox));

  // --- Draw functions ---

  // The scene view paints through its host: surface when ready, overlay otherwise
  let scene_host = {
    let st = state.borrow();
    Rc::new(GtkSurfaceHost::new(
      &scene_area,
      &st.scene,
      st.scene_slot.clone(),
      background,
    ))
  };

  let s = state.clone();
  grid_area.set_draw_func(move |_, cr, w, h| {
    let Ok(st) = s.try_borrow() else { return };
    let grid = st.grid.borrow();
    if let Err(e) = painter::draw_ion_grid(cr, &grid, w as f64, h as f64) {
      warn!("Grid paint failed: {}", e);
    }
  });

  let s = state.clone();
  shells_area.set_draw_func(move |_, cr, w, h| {
    let Ok(st) = s.try_borrow() else { return };
    let shells = st.shells.state();
    let shells = shells.borrow();
    if let Err(e) = painter::draw_shells(cr, &shells, &st.preset, &dims, w as f64, h as f64) {
      warn!("Shell paint failed: {}", e);
    }
  });

  // --- Interactions ---
  ui::setup_scene_interactions(&scene_area, state.borrow().scene.clone());
  ui::setup_grid_interactions(&grid_area, state.borrow().grid.clone());

  // --- Teardown: exactly once, before the widgets go away ---
  let s = state.clone();
  window.connect_close_request(move |_| {
    if s.borrow_mut().teardown() {
      info!("Views torn down");
    }
    glib::Propagation::Proceed
  });

  window.present();

  // --- Start the views ---
  let mut st = state.borrow_mut();

  let weak_shells = shells_area.downgrade();
  st.shells.start(&GtkFrameScheduler::new(&shells_area), move || {
    if let Some(area) = weak_shells.upgrade() {
      area.queue_draw();
    }
  });
  let unrepresented = st.shells.state().borrow().unrepresented();
  if unrepresented > 0 {
    info!(
      "{}: {} electrons beyond the third shell not drawn",
      st.preset.label, unrepresented
    );
  }

  // Failures are logged by the scene; repaint to show the error overlay
  if st
    .start_scene(scene_host, &GtkFrameScheduler::new(&scene_area))
    .is_err()
  {
    scene_area.queue_draw();
  }
}
