// src/utils/logger.rs
// `log` backend that appends colour-tagged lines to the window console.

use gtk4::prelude::*;
use gtk4::{glib, TextView};
use log::{Level, LevelFilter, Metadata, Record, SetLoggerError};
use std::sync::OnceLock;

static CONSOLE: OnceLock<glib::SendWeakRef<TextView>> = OnceLock::new();
static MAX_LEVEL: OnceLock<LevelFilter> = OnceLock::new();
static LOGGER: ConsoleLogger = ConsoleLogger;

// Keeps long sessions from growing the buffer without bound
const MAX_CONSOLE_LINES: i32 = 500;

// (tag, foreground, bold)
const LEVEL_TAGS: [(&str, &str, bool); 4] = [
  ("error", "#ff4444", true),
  ("warn", "#ffbb33", false),
  ("info", "#33b5e5", false),
  ("debug", "#aaaaaa", false),
];

struct ConsoleLogger;

pub fn init(view: &TextView, level: LevelFilter) -> Result<(), SetLoggerError> {
  let tag_table = view.buffer().tag_table();
  for (name, color, bold) in LEVEL_TAGS {
    if tag_table.lookup(name).is_none() {
      let tag = gtk4::TextTag::new(Some(name));
      tag.set_property("foreground", color);
      if bold {
        tag.set_property("weight", 700);
      }
      tag_table.add(&tag);
    }
  }

  let _ = CONSOLE.set(view.downgrade().into());
  let _ = MAX_LEVEL.set(level);
  log::set_logger(&LOGGER).map(|()| log::set_max_level(level))
}

fn tag_for(level: Level) -> &'static str {
  match level {
    Level::Error => "error",
    Level::Warn => "warn",
    Level::Info => "info",
    Level::Debug | Level::Trace => "debug",
  }
}

/// `ionview::rendering::scene` -> `scene`
fn short_target(target: &str) -> &str {
  target.rsplit("::").next().unwrap_or(target)
}

fn format_line(level: Level, target: &str, message: &str) -> String {
  format!("{:<5} [{}] {}\n", level, short_target(target), message)
}

impl log::Log for ConsoleLogger {
  fn enabled(&self, metadata: &Metadata) -> bool {
    let max = MAX_LEVEL.get().copied().unwrap_or(LevelFilter::Info);
    metadata.level() <= max && metadata.target().starts_with(env!("CARGO_PKG_NAME"))
  }

  fn log(&self, record: &Record) {
    if !self.enabled(record.metadata()) {
      return;
    }
    let line = format_line(record.level(), record.target(), &record.args().to_string());
    let tag = tag_for(record.level());

    // Records can arrive while a widget is mid-update; append on the next
    // main loop iteration.
    glib::MainContext::default().spawn_local(async move {
      let Some(view) = CONSOLE.get().and_then(|w| w.upgrade()) else {
        return;
      };
      let buffer = view.buffer();
      let mut end = buffer.end_iter();
      buffer.insert_with_tags_by_name(&mut end, &line, &[tag]);

      let excess = buffer.line_count() - MAX_CONSOLE_LINES;
      if excess > 0 {
        let mut start = buffer.start_iter();
        if let Some(mut cut) = buffer.iter_at_line(excess) {
          buffer.delete(&mut start, &mut cut);
        }
      }

      let mark = buffer.create_mark(None, &buffer.end_iter(), false);
      view.scroll_to_mark(&mark, 0.0, true, 0.0, 1.0);
      buffer.delete_mark(&mark);
    });
  }

  fn flush(&self) {}
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_line_format() {
    assert_eq!(
      format_line(Level::Warn, "ionview::rendering::scene", "Frame skipped"),
      "WARN  [scene] Frame skipped\n"
    );
    assert_eq!(format_line(Level::Info, "ionview", "x"), "INFO  [ionview] x\n");
  }

  #[test]
  fn test_trace_shares_debug_tag() {
    assert_eq!(tag_for(Level::Trace), "debug");
    assert_eq!(tag_for(Level::Error), "error");
  }
}
