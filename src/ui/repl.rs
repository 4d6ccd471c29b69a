// MecmLog - ui/repl.rs
//
// Interactive line-driven session.
//
// Architecture:
//   - A reader thread forwards input lines over an mpsc channel.
//   - The loop waits on that channel for at most CONTROLLER_TICK_MS, then
//     ticks the controller, so debounced searches fire and worker results are
//     applied without ever blocking on the filter pass.
//   - Plain text is search input; lines starting with ':' are commands.

use crate::app::controller::{ControllerEvent, FilterController};
use crate::app::session::{self, Session};
use crate::app::worker::FilterWorker;
use crate::core::aggregate::SourceReader;
use crate::core::discovery::DiscoveryConfig;
use crate::core::export;
use crate::core::facets;
use crate::core::filter::SearchMode;
use crate::core::model::{FacetCategory, LogEntry, LogType};
use crate::ui::table::{self, RenderOptions};
use crate::util::constants;
use crate::util::error::ExportError;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};

const HELP: &str = "\
Type text to search (debounced). Commands:
  :regex                 toggle regex mode
  :clear                 clear the search text
  :clear-all             clear search, regex mode, facets and time window
  :source [VALUE]        toggle a source (no value: all sources)
  :component [VALUE]     toggle a component (no value: all components)
  :type [VALUE]          toggle a type (no value: all types)
  :anchor N              toggle a time window around row N
  :facets CATEGORY [F]   list values of sources|components|types containing F
  :add PATH              load another file or folder
  :show                  print the visible rows
  :export PATH           write visible rows (.csv or .json)
  :help                  this text
  :quit                  leave";

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Search(String),
    ToggleRegex,
    ClearSearch,
    ClearAll,
    Facet {
        category: FacetCategory,
        value: Option<String>,
    },
    Anchor(usize),
    Facets {
        category: FacetCategory,
        filter: String,
    },
    Add(PathBuf),
    Show,
    Export(PathBuf),
    Help,
    Quit,
}

/// Parse one input line.
pub fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim_end_matches(&['\r', '\n'][..]);
    let Some(rest) = line.strip_prefix(':') else {
        return Ok(Command::Search(line.to_string()));
    };

    let rest = rest.trim();
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    let arg_opt = (!arg.is_empty()).then(|| arg.to_string());

    match name.to_ascii_lowercase().as_str() {
        "regex" => Ok(Command::ToggleRegex),
        "clear" => Ok(Command::ClearSearch),
        "clear-all" => Ok(Command::ClearAll),
        "source" | "component" | "type" => {
            let category = FacetCategory::from_name(name).ok_or("unknown facet")?;
            let value = match (category, arg_opt) {
                (FacetCategory::Type, Some(v)) => Some(
                    LogType::from_label(&v)
                        .ok_or_else(|| format!("unknown type '{v}'"))?
                        .label()
                        .to_string(),
                ),
                (_, v) => v,
            };
            Ok(Command::Facet { category, value })
        }
        "anchor" => arg
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .map(Command::Anchor)
            .ok_or_else(|| "usage: :anchor N (a row number)".to_string()),
        "facets" => {
            let (category, filter) = match arg.split_once(char::is_whitespace) {
                Some((c, f)) => (c, f.trim()),
                None => (arg, ""),
            };
            let category = FacetCategory::from_name(category)
                .ok_or_else(|| "usage: :facets sources|components|types [FILTER]".to_string())?;
            Ok(Command::Facets {
                category,
                filter: filter.to_string(),
            })
        }
        "add" => arg_opt
            .map(|p| Command::Add(PathBuf::from(p)))
            .ok_or_else(|| "usage: :add PATH".to_string()),
        "show" | "" => Ok(Command::Show),
        "export" => arg_opt
            .map(|p| Command::Export(PathBuf::from(p)))
            .ok_or_else(|| "usage: :export PATH".to_string()),
        "help" | "?" => Ok(Command::Help),
        "quit" | "q" | "exit" => Ok(Command::Quit),
        other => Err(format!("unknown command ':{other}' (try :help)")),
    }
}

/// Whether the loop keeps going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Interactive session state.
pub struct Repl<'r> {
    session: Session,
    controller: FilterController<FilterWorker>,
    reader: &'r dyn SourceReader,
    discovery: DiscoveryConfig,
    color: bool,
    was_in_progress: bool,
}

impl<'r> Repl<'r> {
    pub fn new(
        session: Session,
        controller: FilterController<FilterWorker>,
        reader: &'r dyn SourceReader,
        discovery: DiscoveryConfig,
        color: bool,
    ) -> Self {
        Self {
            session,
            controller,
            reader,
            discovery,
            color,
            was_in_progress: false,
        }
    }

    /// Run until `:quit` or end of input.
    pub fn run<R, W>(mut self, input: R, out: &mut W) -> io::Result<()>
    where
        R: BufRead + Send + 'static,
        W: Write,
    {
        let (tx, rx) = mpsc::channel::<String>();
        std::thread::spawn(move || {
            for line in input.lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Input read failed");
                        break;
                    }
                }
            }
        });

        writeln!(out, "{}", table::status_line(self.controller.summary(), false, None, None, None))?;
        writeln!(out, "Type :help for commands.")?;

        let tick = Duration::from_millis(constants::CONTROLLER_TICK_MS);
        loop {
            match rx.recv_timeout(tick) {
                Ok(line) => {
                    if self.handle_line(&line, Instant::now(), out)? == Flow::Quit {
                        break;
                    }
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {}
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    // Input closed: let outstanding work land, then stop.
                    self.settle(out)?;
                    break;
                }
            }
            self.poll(Instant::now(), out)?;
        }

        tracing::info!("Interactive session ended");
        Ok(())
    }

    /// Tick until nothing is pending. Used when input ends.
    pub fn settle<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        let tick = Duration::from_millis(constants::CONTROLLER_TICK_MS);
        while self.controller.in_progress() {
            std::thread::sleep(tick);
            self.poll(Instant::now(), out)?;
        }
        Ok(())
    }

    /// Tick the controller and print whatever changed.
    pub fn poll<W: Write>(&mut self, now: Instant, out: &mut W) -> io::Result<()> {
        let changed = self.controller.tick(now);
        let in_progress = self.controller.in_progress();

        if changed {
            self.print_view(out)?;
        } else if in_progress && !self.was_in_progress {
            writeln!(out, "[filtering...]")?;
        }
        self.was_in_progress = in_progress;
        Ok(())
    }

    /// Handle one input line.
    pub fn handle_line<W: Write>(&mut self, line: &str, now: Instant, out: &mut W) -> io::Result<Flow> {
        let command = match parse_command(line) {
            Ok(c) => c,
            Err(msg) => {
                writeln!(out, "  ! {msg}")?;
                return Ok(Flow::Continue);
            }
        };

        match command {
            Command::Search(text) => {
                self.controller.on_event(ControllerEvent::SearchInput(text), now);
            }
            Command::ToggleRegex => {
                self.controller.on_event(ControllerEvent::ToggleRegex, now);
                let state = match self.controller.inputs().mode {
                    SearchMode::Regex => "on",
                    SearchMode::Literal => "off",
                };
                writeln!(out, "Regex mode {state}")?;
            }
            Command::ClearSearch => self.controller.on_event(ControllerEvent::ClearSearch, now),
            Command::ClearAll => self.controller.on_event(ControllerEvent::ClearAll, now),
            Command::Facet { category, value } => {
                let event = match value {
                    Some(value) => {
                        if !self.session.catalogue().values(category).contains(&value) {
                            writeln!(out, "  ! '{value}' does not occur in {}", category.title())?;
                        }
                        ControllerEvent::ToggleFacet { category, value }
                    }
                    None => ControllerEvent::ClearFacet(category),
                };
                self.controller.on_event(event, now);
                writeln!(out, "{}", self.facet_heading(category))?;
            }
            Command::Anchor(row) => match self.session.entries().get(row - 1) {
                Some(entry) => {
                    let ts = entry.timestamp.clone();
                    self.controller.on_event(ControllerEvent::ToggleAnchor(ts), now);
                    match self.controller.time_range_label() {
                        Some(label) => writeln!(out, "{label}")?,
                        None if self.controller.inputs().anchor.is_some() => writeln!(
                            out,
                            "  ! row {row} has no usable timestamp; the time window matches nothing"
                        )?,
                        None => writeln!(out, "Time window cleared")?,
                    }
                }
                None => writeln!(out, "  ! no row {row}")?,
            },
            Command::Facets { category, filter } => self.print_facets(category, &filter, out)?,
            Command::Add(path) => self.add(&path, out)?,
            Command::Show => self.print_view(out)?,
            Command::Export(path) => self.export(&path, out)?,
            Command::Help => writeln!(out, "{HELP}")?,
            Command::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    fn facet_heading(&self, category: FacetCategory) -> String {
        let mut selected: Vec<&String> = self.controller.facets().values(category).iter().collect();
        selected.sort();
        let heading = facets::heading(category, self.controller.facets());
        if selected.is_empty() {
            format!("{heading}: all")
        } else {
            let list: Vec<String> = selected.iter().map(|s| table::sanitize(s).into_owned()).collect();
            format!("{heading}: {}", list.join(", "))
        }
    }

    fn print_facets<W: Write>(&self, category: FacetCategory, filter: &str, out: &mut W) -> io::Result<()> {
        let values = self.session.catalogue().narrow(category, filter);
        let selected = self.controller.facets().values(category);
        writeln!(out, "{}", facets::heading(category, self.controller.facets()))?;
        for value in values.iter().take(constants::MAX_FACET_VALUES_LISTED) {
            let mark = if selected.contains(*value) { "x" } else { " " };
            writeln!(out, "  [{mark}] {}", table::sanitize(value))?;
        }
        if values.len() > constants::MAX_FACET_VALUES_LISTED {
            writeln!(
                out,
                "  ... {} more (narrow with a filter)",
                values.len() - constants::MAX_FACET_VALUES_LISTED
            )?;
        }
        Ok(())
    }

    fn add<W: Write>(&mut self, path: &Path, out: &mut W) -> io::Result<()> {
        let (paths, mut warnings) = session::resolve_paths(&[path.to_path_buf()], &self.discovery);
        let added = self.session.add_sources(&paths, self.reader);
        warnings.extend(self.session.take_warnings());
        for warning in &warnings {
            writeln!(out, "  ! {}", table::sanitize(warning))?;
        }
        writeln!(out, "Added {added} entries ({} total)", self.session.entries().len())?;
        if added > 0 {
            self.controller.replace_rows(self.session.rows().clone());
        }
        Ok(())
    }

    fn visible_entries(&self) -> Vec<&LogEntry> {
        let entries = self.session.entries();
        self.controller
            .visible_indices()
            .into_iter()
            .filter_map(|i| entries.get(i))
            .collect()
    }

    fn export<W: Write>(&self, path: &Path, out: &mut W) -> io::Result<()> {
        let visible = self.visible_entries();
        let result = std::fs::File::create(path)
            .map_err(|e| ExportError::Io {
                path: path.to_path_buf(),
                source: e,
            })
            .and_then(|file| {
                let writer = io::BufWriter::new(file);
                let is_json = path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
                if is_json {
                    export::export_json(&visible, writer, path)
                } else {
                    export::export_csv(&visible, writer, path)
                }
            });
        match result {
            Ok(n) => writeln!(out, "Exported {n} rows to {}", path.display()),
            Err(e) => {
                tracing::warn!(error = %e, "Export failed");
                writeln!(out, "  ! {e}")
            }
        }
    }

    fn print_view<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let options = RenderOptions {
            color: self.color,
            limit: Some(constants::MAX_INTERACTIVE_ROWS),
        };
        let shown = table::render_rows(
            out,
            self.session.entries(),
            self.controller.visibility(),
            self.controller.highlight_mode(),
            options,
        )?;
        let summary = self.controller.summary();
        if summary.visible > shown {
            writeln!(out, "  ... {} more rows not shown", summary.visible - shown)?;
        }
        let label = self.controller.time_range_label();
        writeln!(
            out,
            "{}",
            table::status_line(
                summary,
                self.controller.in_progress(),
                label.as_deref(),
                self.controller.pattern_error(),
                self.controller.pass_failure(),
            )
        )
    }
}
