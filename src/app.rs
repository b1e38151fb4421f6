use std::cmp::min;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, info, warn};

use crate::csv::Row;
use crate::debounce::{Debouncer, FilterTrigger};
use crate::filter::{FilterMap, FilterArg, apply_filter_args, filter_rows, limit_rows};
use crate::loader::{LoadRequest, LoadResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    Normal,
    /// Typing into the filter of the selected column.
    Filtering,
    /// Typing an export path.
    Exporting,
}

/// View settings fixed at startup.
#[derive(Debug, Clone)]
pub struct ViewConfig {
    pub source_label: String,
    pub display_limit: usize,
    pub trigger: FilterTrigger,
    pub debounce: Duration,
    pub initial_filters: Vec<FilterArg>,
}

pub struct App {
    pub should_quit: bool,

    // UI state
    pub mode: AppMode,
    pub status: String,
    pub source_label: String,
    pub loading: bool,
    /// Set when the last load failed; cleared by a successful load.
    pub load_error: Option<String>,

    // Table data
    pub headers: Vec<String>,
    /// Every parsed row; filter passes always start from here.
    pub rows: Vec<Row>,
    /// Rows matching the current filters.
    pub matched: Vec<Row>,
    pub display_limit: usize,

    // Cell selection (row is an index into the displayed prefix)
    pub sel_row: usize,
    pub sel_col: usize,

    // Filters
    pub filters: FilterMap,
    pub trigger: FilterTrigger,
    pub debouncer: Debouncer,
    /// Filters were edited under the manual trigger but not applied yet.
    pub filters_stale: bool,
    pending_args: Vec<FilterArg>,

    pub export_path: String,

    pub show_help: bool,
    pub show_cell_viewer: bool,

    // Channels
    pub req_tx: Sender<LoadRequest>,
    pub resp_rx: Receiver<LoadResponse>,
}

impl App {
    pub fn new(
        config: ViewConfig,
        req_tx: Sender<LoadRequest>,
        resp_rx: Receiver<LoadResponse>,
    ) -> Self {
        Self {
            should_quit: false,
            mode: AppMode::Normal,
            status: "Press ? for help, / to filter the selected column, q to quit".into(),
            source_label: config.source_label,
            loading: false,
            load_error: None,
            headers: vec![],
            rows: vec![],
            matched: vec![],
            display_limit: config.display_limit,
            sel_row: 0,
            sel_col: 0,
            filters: FilterMap::default(),
            trigger: config.trigger,
            debouncer: Debouncer::new(config.debounce),
            filters_stale: false,
            pending_args: config.initial_filters,
            export_path: String::new(),
            show_help: false,
            show_cell_viewer: false,
            req_tx,
            resp_rx,
        }
    }

    pub fn request_load(&mut self) {
        let _ = self.req_tx.send(LoadRequest::Load);
        self.loading = true;
        self.status = format!("Loading {}...", self.source_label);
    }

    pub fn handle_load_response(&mut self, resp: LoadResponse) {
        match resp {
            LoadResponse::Loaded { table, elapsed } => {
                self.loading = false;
                self.load_error = None;
                self.filters = if self.headers.is_empty() {
                    FilterMap::from_headers(&table.headers)
                } else {
                    self.filters.reseed(&table.headers)
                };
                let args = std::mem::take(&mut self.pending_args);
                for arg in apply_filter_args(&mut self.filters, &table.headers, &args) {
                    warn!(column = %arg.column, "filter names no column");
                }
                self.headers = table.headers;
                self.rows = table.rows;
                self.apply_filters();
                self.sel_col = self.sel_col.min(self.headers.len().saturating_sub(1));
                self.status = format!(
                    "Loaded {} rows, {} columns in {} ms",
                    self.rows.len(),
                    self.headers.len(),
                    elapsed.as_millis()
                );
            }
            LoadResponse::Exported { path, rows } => {
                self.status = format!("Exported {} rows to {}", rows, path);
            }
            LoadResponse::ExportFailed(msg) => {
                self.status = format!("Export failed: {msg}");
            }
            LoadResponse::Error(msg) => {
                self.loading = false;
                self.status = format!("Error: {msg}");
                self.load_error = Some(msg);
            }
        }
    }

    // ===== Filter pass =====

    /// Recompute the matched rows from the full row set.
    pub fn apply_filters(&mut self) {
        self.debouncer.cancel();
        self.filters_stale = false;
        self.matched = filter_rows(&self.rows, &self.filters);
        debug!(
            matched = self.matched.len(),
            total = self.rows.len(),
            "filter pass"
        );
        let shown = self.visible_rows().len();
        self.sel_row = self.sel_row.min(shown.saturating_sub(1));
    }

    /// React to an edit of the filter map according to the trigger policy.
    pub fn filters_changed(&mut self, now: Instant) {
        match self.trigger {
            FilterTrigger::Immediate => self.apply_filters(),
            FilterTrigger::Debounced => self.debouncer.schedule(now),
            FilterTrigger::Manual => self.filters_stale = true,
        }
    }

    /// Run a debounced pass if one is due. Returns true when rows were recomputed.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.debouncer.fire_if_due(now) {
            self.apply_filters();
            return true;
        }
        false
    }

    pub fn reset_filters(&mut self) {
        self.filters.reset();
        self.apply_filters();
        info!("filters reset");
        self.status = "Filters cleared".into();
    }

    pub fn visible_rows(&self) -> &[Row] {
        limit_rows(&self.matched, self.display_limit)
    }

    pub fn current_column(&self) -> Option<&str> {
        self.headers.get(self.sel_col).map(|s| s.as_str())
    }

    pub fn current_filter(&self) -> &str {
        self.current_column()
            .and_then(|c| self.filters.get(c))
            .unwrap_or_default()
    }

    // ===== Filter input =====

    pub fn begin_filter_input(&mut self) {
        if self.headers.is_empty() {
            self.status = "Nothing to filter (no data)".into();
            return;
        }
        self.mode = AppMode::Filtering;
        self.status = self.filter_prompt();
    }

    pub fn filter_input_char(&mut self, c: char, now: Instant) {
        if let Some(buf) = self.current_filter_mut() {
            buf.push(c);
            self.filters_changed(now);
        }
        self.status = self.filter_prompt();
    }

    pub fn filter_input_backspace(&mut self, now: Instant) {
        if let Some(buf) = self.current_filter_mut()
            && buf.pop().is_some()
        {
            self.filters_changed(now);
        }
        self.status = self.filter_prompt();
    }

    /// Leave filter input and run the pass now, whatever the trigger.
    pub fn commit_filter_input(&mut self) {
        self.mode = AppMode::Normal;
        self.apply_filters();
        self.status = format!(
            "{} of {} rows match",
            self.matched.len(),
            self.rows.len()
        );
    }

    /// Leave filter input, clearing the selected column's filter.
    pub fn cancel_filter_input(&mut self) {
        if let Some(buf) = self.current_filter_mut() {
            buf.clear();
        }
        self.mode = AppMode::Normal;
        self.apply_filters();
        self.status = "Column filter cleared".into();
    }

    fn current_filter_mut(&mut self) -> Option<&mut String> {
        let col = self.headers.get(self.sel_col)?.clone();
        self.filters.get_mut(&col)
    }

    fn filter_prompt(&self) -> String {
        format!(
            "Filter {}: {}_  (Enter apply, Esc clear, Tab next column)",
            self.current_column().unwrap_or_default(),
            self.current_filter()
        )
    }

    // ===== Export =====

    pub fn begin_export(&mut self) {
        self.mode = AppMode::Exporting;
        self.export_path.clear();
        self.status = "Export CSV path: type and Enter to save (Esc to cancel)".into();
    }

    pub fn export_input_char(&mut self, c: char) {
        self.export_path.push(c);
        self.status = format!("Export CSV: {}_", self.export_path);
    }

    pub fn export_input_backspace(&mut self) {
        self.export_path.pop();
        self.status = format!("Export CSV: {}_", self.export_path);
    }

    /// Export the whole filtered result, not just the displayed prefix.
    pub fn submit_export(&mut self) {
        self.mode = AppMode::Normal;
        let path = std::mem::take(&mut self.export_path);
        if path.is_empty() {
            self.status = "Export cancelled".into();
            return;
        }
        if self.debouncer.is_pending() || self.filters_stale {
            self.apply_filters();
        }
        let _ = self.req_tx.send(LoadRequest::Export {
            path: path.clone(),
            headers: self.headers.clone(),
            rows: self.matched.clone(),
        });
        self.status = format!("Exporting CSV to {}...", path);
    }

    pub fn cancel_export(&mut self) {
        self.mode = AppMode::Normal;
        self.export_path.clear();
        self.status = "Export cancelled".into();
    }

    // ===== Navigation =====

    pub fn move_cell_left(&mut self) {
        self.sel_col = self.sel_col.saturating_sub(1);
    }

    pub fn move_cell_right(&mut self) {
        if self.headers.is_empty() {
            return;
        }
        self.sel_col = min(self.sel_col + 1, self.headers.len() - 1);
    }

    /// Cycle the selected column, wrapping around.
    pub fn next_column(&mut self) {
        if self.headers.is_empty() {
            return;
        }
        self.sel_col = (self.sel_col + 1) % self.headers.len();
    }

    pub fn move_cell_up(&mut self) {
        self.sel_row = self.sel_row.saturating_sub(1);
    }

    pub fn move_cell_down(&mut self) {
        let last = self.visible_rows().len().saturating_sub(1);
        self.sel_row = min(self.sel_row + 1, last);
    }

    pub fn page_down(&mut self, page: usize) {
        let last = self.visible_rows().len().saturating_sub(1);
        self.sel_row = min(self.sel_row.saturating_add(page), last);
    }

    pub fn page_up(&mut self, page: usize) {
        self.sel_row = self.sel_row.saturating_sub(page);
    }

    pub fn select_first_row(&mut self) {
        self.sel_row = 0;
    }

    pub fn select_last_row(&mut self) {
        self.sel_row = self.visible_rows().len().saturating_sub(1);
    }

    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    pub fn toggle_cell_viewer(&mut self) {
        self.show_cell_viewer = !self.show_cell_viewer;
    }

    pub fn current_row(&self) -> Option<&Row> {
        self.visible_rows().get(self.sel_row)
    }

    pub fn current_cell_text(&self) -> Option<&str> {
        let col = self.current_column()?;
        self.current_row()?.get(col)
    }

    // ===== Copy to clipboard/file helpers (TSV) =====

    pub fn copy_current_cell(&mut self) {
        match self.current_cell_text().map(|s| s.to_string()) {
            Some(cell) => self.copy_to_clipboard_or_file(cell, "cell"),
            None => self.status = "Nothing to copy (no data)".into(),
        }
    }

    pub fn copy_current_row(&mut self) {
        match self.current_row().map(row_tsv) {
            Some(line) => self.copy_to_clipboard_or_file(line, "row"),
            None => self.status = "Nothing to copy (no data)".into(),
        }
    }

    /// Copy the displayed rows with a header line.
    pub fn copy_visible_rows(&mut self) {
        if self.visible_rows().is_empty() {
            self.status = "Nothing to copy (no data)".into();
            return;
        }
        let mut out = self.headers.join("\t");
        out.push('\n');
        for row in self.visible_rows() {
            out.push_str(&row_tsv(row));
            out.push('\n');
        }
        self.copy_to_clipboard_or_file(out, "page");
    }

    /// Best-effort clipboard copy; falls back to writing a temp .tsv file on failure.
    fn copy_to_clipboard_or_file(&mut self, content: String, label: &str) {
        let candidates: &[(&str, &[&str])] = &[
            ("pbcopy", &[]),
            ("wl-copy", &[]),
            ("xclip", &["-selection", "clipboard"]),
            ("xsel", &["--clipboard", "--input"]),
            ("clip", &[]),
        ];
        for (prog, args) in candidates {
            if try_clipboard_prog(prog, args, &content) {
                debug!(prog, label, "copied to clipboard");
                self.status = format!("Copied {} to clipboard via {}", label, prog);
                return;
            }
        }
        let mut file_path = std::env::temp_dir();
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        file_path.push(format!("csv-viewer-{}.tsv", ts));
        match std::fs::write(&file_path, content.as_bytes()) {
            Ok(_) => {
                self.status = format!(
                    "Wrote {} TSV to {} (no clipboard tool found)",
                    label,
                    file_path.display()
                );
            }
            Err(e) => {
                warn!(error = %e, "tsv fallback write failed");
                self.status = format!("Failed to write {} TSV: {}", label, e);
            }
        }
    }
}

fn row_tsv(row: &Row) -> String {
    row.values().collect::<Vec<_>>().join("\t")
}

fn try_clipboard_prog(prog: &str, args: &[&str], content: &str) -> bool {
    match std::process::Command::new(prog)
        .args(args)
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
    {
        Ok(mut child) => {
            if let Some(mut stdin) = child.stdin.take() {
                use std::io::Write;
                let _ = stdin.write_all(content.as_bytes());
            }
            child.wait().map(|s| s.success()).unwrap_or(false)
        }
        Err(_) => false,
    }
}
