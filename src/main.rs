use anyhow::{Context, Result};
use clap::Parser;

use narrative_edit::cli::{render_page, CliArgs, OutputFormat, StartupConfig, StartupMode};
use narrative_edit::config::AppConfig;
use narrative_edit::engine::{DocumentId, Engine};
use narrative_edit::session::SessionStore;

fn main() -> Result<()> {
    narrative_edit::tracing::init();

    let args = CliArgs::parse();
    let startup = args.into_config().map_err(anyhow::Error::msg)?;

    let config = AppConfig::load();
    let grid = startup.grid(config.grid_size());
    let mut engine = Engine::new(config);
    engine.options.tate_chu_yoko = startup.tate_chu_yoko;
    engine.config.manuscript_grid_rows = grid.rows;
    engine.config.manuscript_grid_cols = grid.cols;

    let ids: Vec<DocumentId> = match &startup.mode {
        StartupMode::Files(paths) => paths
            .iter()
            .map(|path| {
                engine
                    .open_file(path)
                    .with_context(|| format!("opening {}", path.display()))
            })
            .collect::<Result<_>>()?,
        StartupMode::Restore => {
            let store = SessionStore::open_default().map_err(anyhow::Error::msg)?;
            engine.restore_all(&store)?
        }
        StartupMode::Empty => Vec::new(),
    };

    if ids.is_empty() {
        eprintln!("Nothing to lay out. Pass a manuscript file.");
        return Ok(());
    }

    for id in ids {
        print_document(&mut engine, id, &startup)?;
    }

    // Grid overrides are per run; only the recent files list persists
    let mut persisted = AppConfig::load();
    persisted.recent_files = engine.config.recent_files.clone();
    if let Err(e) = persisted.save() {
        tracing::warn!("Could not save config: {}", e);
    }
    Ok(())
}

fn print_document(engine: &mut Engine, id: DocumentId, startup: &StartupConfig) -> Result<()> {
    let document = engine.get_mut(id)?;
    let pages = document.export_layout();
    let selected: Vec<_> = pages
        .iter()
        .filter(|page| startup.page.map_or(true, |p| p == page.index))
        .collect();

    match startup.output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&selected)?);
        }
        OutputFormat::Text => {
            let (page, column, cell) = document.current_page_column_cell();
            println!(
                "== {} ({} chars, {} pages, caret at page {} column {} cell {})",
                document.info.display_name,
                document.character_count(),
                pages.len(),
                page,
                column,
                cell
            );
            for page in selected {
                println!("-- page {}", page.index + 1);
                print!("{}", render_page(page));
            }
        }
    }

    if let Some(query) = &startup.query {
        let matches = document.match_cells(query)?;
        println!("{} matches for {:?}", matches.len(), query.pattern);
        for cells in matches {
            let Some(first) = cells.first() else {
                continue;
            };
            // 1-based like the status bar
            println!(
                "  page {} column {} cell {} ({} cells)",
                first.page + 1,
                first.col + 1,
                first.row + 1,
                cells.len()
            );
        }
    }
    Ok(())
}
