//! Command-line argument parsing for the `narrative` tool
//!
//! Supports:
//! - Laying out one or more manuscripts on a chosen grid
//! - JSON export of the paged layout
//! - Plain or regex search with match cells
//! - Restoring autosaved sessions when no file is given

use clap::Parser;
use std::path::PathBuf;

use crate::find::FindQuery;
use crate::layout::{GridSize, Page};

/// Vertical manuscript layout
#[derive(Parser, Debug)]
#[command(
    name = "narrative",
    version,
    about = "Lay out Japanese manuscripts on a vertical genko yoshi grid"
)]
pub struct CliArgs {
    /// Manuscript files to open
    #[arg(value_name = "PATHS")]
    pub paths: Vec<PathBuf>,

    /// Do not restore autosaved sessions
    #[arg(short = 'n', long)]
    pub new: bool,

    /// Cells per column (overrides config)
    #[arg(long, value_name = "N")]
    pub rows: Option<usize>,

    /// Columns per page (overrides config)
    #[arg(long, value_name = "N")]
    pub cols: Option<usize>,

    /// Print the layout as JSON
    #[arg(long)]
    pub json: bool,

    /// Only print page N (1-based)
    #[arg(long, value_name = "N")]
    pub page: Option<usize>,

    /// Report the cells of every match of PATTERN
    #[arg(long, value_name = "PATTERN")]
    pub find: Option<String>,

    /// Treat --find as a regular expression
    #[arg(long)]
    pub regex: bool,

    /// Case-insensitive --find
    #[arg(short = 'i', long)]
    pub ignore_case: bool,

    /// Disable tate-chu-yoko grouping
    #[arg(long)]
    pub no_tcy: bool,
}

/// What the run works on
#[derive(Debug, Clone)]
pub enum StartupMode {
    /// Restore autosaved sessions
    Restore,
    /// Nothing to open
    Empty,
    /// Open the given files as tabs
    Files(Vec<PathBuf>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone)]
pub struct StartupConfig {
    pub mode: StartupMode,
    /// Grid override; fields left out come from the config file
    pub rows: Option<usize>,
    pub cols: Option<usize>,
    pub output: OutputFormat,
    /// 0-indexed page filter
    pub page: Option<usize>,
    pub query: Option<FindQuery>,
    pub tate_chu_yoko: bool,
}

impl CliArgs {
    /// Convert parsed CLI args into startup configuration
    pub fn into_config(self) -> Result<StartupConfig, String> {
        if self.rows == Some(0) || self.cols == Some(0) {
            return Err("--rows and --cols must be positive".to_string());
        }
        if self.page == Some(0) {
            return Err("--page starts at 1".to_string());
        }
        if (self.regex || self.ignore_case) && self.find.is_none() {
            return Err("--regex and --ignore-case need --find".to_string());
        }

        let mode = if !self.paths.is_empty() {
            StartupMode::Files(self.paths)
        } else if self.new {
            StartupMode::Empty
        } else {
            StartupMode::Restore
        };

        let query = self.find.map(|pattern| {
            let query = if self.regex {
                FindQuery::regex(pattern)
            } else {
                FindQuery::plain(pattern)
            };
            if self.ignore_case {
                query.case_insensitive()
            } else {
                query
            }
        });

        Ok(StartupConfig {
            mode,
            rows: self.rows,
            cols: self.cols,
            output: if self.json {
                OutputFormat::Json
            } else {
                OutputFormat::Text
            },
            // Convert from 1-indexed (user input) to 0-indexed (internal)
            page: self.page.map(|p| p - 1),
            query,
            tate_chu_yoko: !self.no_tcy,
        })
    }
}

impl StartupConfig {
    /// Grid to use given the configured one
    pub fn grid(&self, configured: GridSize) -> GridSize {
        GridSize {
            rows: self.rows.unwrap_or(configured.rows),
            cols: self.cols.unwrap_or(configured.cols),
        }
    }
}

/// Draw a page as text: columns right to left, one line per row.
/// Empty cells and line breaks draw as an ideographic space.
pub fn render_page(page: &Page) -> String {
    let mut out = String::with_capacity(page.rows * (page.cols * 3 + 1));
    for row in 0..page.rows {
        for col in (0..page.cols).rev() {
            match page.cell(col, row) {
                Some(cell) if !cell.hint.is_line_break() => out.push_str(&cell.glyph),
                _ => out.push('\u{3000}'),
            }
        }
        // Trailing blanks carry no information
        let trimmed = out.trim_end_matches('\u{3000}').len();
        out.truncate(trimmed);
        out.push('\n');
    }
    out
}
