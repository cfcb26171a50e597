//! docview - document viewer
//!
//! A CLI front end for the viewer core: prints outlines, runs scoped
//! searches, renders the viewer page and extracts .docx files into
//! browsable archives.

#![deny(unsafe_code)]
#![cfg_attr(all(not(debug_assertions), not(test)), deny(clippy::all))]
#![cfg_attr(all(not(debug_assertions), not(test)), deny(clippy::pedantic))]
#![cfg_attr(all(not(debug_assertions), not(test)), deny(missing_docs))]
// Allow some pedantic lints that are too strict for this project
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use docview::archive::{archive_name, extract_to_archive, write_archive};
use docview::config::ViewerConfig;
use docview::docx::DocxConverter;
use docview::page::render_page;
use docview::source::DirectorySource;
use docview::viewer::{Viewer, ALL_SCOPE};
use std::path::{Path, PathBuf};

/// Main entry point for the docview CLI application
fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:?}", e);
        std::process::exit(1);
    }
}

/// Run the CLI application
fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Outline {
            input,
            article,
            verbose,
        } => {
            init_logging(verbose);
            handle_outline_command(&input, article)?;
        }

        Commands::Search {
            input,
            query,
            scope,
            article,
            output,
            verbose,
        } => {
            init_logging(verbose);
            handle_search_command(&input, &query, &scope, article, output)?;
        }

        Commands::Render {
            input,
            output,
            article,
            query,
            scope,
            navigate,
            verbose,
        } => {
            init_logging(verbose);
            handle_render_command(&input, &output, article, query, &scope, navigate)?;
        }

        Commands::Extract {
            input,
            output,
            verbose,
        } => {
            init_logging(verbose);
            handle_extract_command(&input, output)?;
        }
    }

    Ok(())
}

/// Initialize logging if verbose
fn init_logging(verbose: bool) {
    if verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    }
}

/// Open a content directory or a single document
///
/// A directory is opened like the web viewer does (manifest first, then the
/// fallback document); a file is loaded directly.
fn open_viewer(input: &Path, article: Option<usize>) -> Result<Viewer<DirectorySource>> {
    let mut viewer = if input.is_dir() {
        let config = ViewerConfig::load_or_default(input)
            .with_context(|| format!("Failed to load configuration from {}", input.display()))?;
        Viewer::open(DirectorySource::new(input), config)
    } else {
        let dir = input
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let file_name = input
            .file_name()
            .and_then(|name| name.to_str())
            .with_context(|| format!("Invalid document path {}", input.display()))?;
        let config = ViewerConfig::load_or_default(dir)
            .with_context(|| format!("Failed to load configuration from {}", dir.display()))?;

        let mut viewer = Viewer::new(DirectorySource::new(dir), config);
        viewer
            .load_document(file_name)
            .with_context(|| format!("Failed to open {}", input.display()))?;
        viewer
    };

    if let Some(number) = article {
        if number == 0 {
            anyhow::bail!("Article numbers start at 1");
        }
        viewer
            .load_article(number - 1)
            .with_context(|| format!("Failed to open article {}", number))?;
    }

    for message in viewer.take_notifications() {
        eprintln!("Warning: {}", message);
    }
    if viewer.content_root().is_none() {
        anyhow::bail!("No content could be loaded from {}", input.display());
    }

    Ok(viewer)
}

/// Handle the outline command
fn handle_outline_command(input: &Path, article: Option<usize>) -> Result<()> {
    let viewer = open_viewer(input, article)?;

    if let Some(path) = viewer.document_path() {
        println!("Outline of {}", path);
    }

    let Some(outline) = viewer.outline().filter(|o| !o.is_empty()) else {
        println!("No headings found");
        return Ok(());
    };

    for index in outline.depth_first() {
        let Some(heading) = outline.get(index) else {
            continue;
        };
        println!(
            "{}{} (#{})",
            "  ".repeat(outline.depth(index)),
            heading.text.trim(),
            heading.id.as_deref().unwrap_or("-")
        );
    }

    Ok(())
}

/// Handle the search command
fn handle_search_command(
    input: &Path,
    query: &str,
    scope: &str,
    article: Option<usize>,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut viewer = open_viewer(input, article)?;

    if scope != ALL_SCOPE && viewer.outline().and_then(|o| o.find(scope)).is_none() {
        anyhow::bail!(
            "Unknown scope '{}'. Run 'docview outline' to list heading ids",
            scope
        );
    }

    let count = viewer.search(scope, query);
    println!(
        "{} match{} for \"{}\"",
        count,
        if count == 1 { "" } else { "es" },
        viewer.query()
    );

    if let Some(output) = output {
        write_page(&viewer, &output)?;
    }

    Ok(())
}

/// Handle the render command
fn handle_render_command(
    input: &Path,
    output: &Path,
    article: Option<usize>,
    query: Option<String>,
    scope: &str,
    navigate: Option<String>,
) -> Result<()> {
    let mut viewer = open_viewer(input, article)?;

    if let Some(query) = query {
        let count = viewer.search(scope, &query);
        println!("Highlighted {} matches", count);
    }

    if let Some(id) = navigate {
        viewer
            .navigate(&id)
            .with_context(|| format!("No element with id '{}'", id))?;
        // A navigated-to heading is the one in view
        viewer.report_visibility(&[docview::observer::Visibility::new(id, 1.0)]);
    }

    write_page(&viewer, output)
}

fn write_page(viewer: &Viewer<DirectorySource>, output: &Path) -> Result<()> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    std::fs::write(output, render_page(viewer))
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!("✓ Successfully wrote: {}", output.display());
    Ok(())
}

/// Handle the extract command
fn handle_extract_command(input: &Path, output: Option<PathBuf>) -> Result<()> {
    let name = input
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("Invalid document path {}", input.display()))?;
    let default_name =
        archive_name(name).with_context(|| format!("{} is not a .docx file", input.display()))?;
    let output = output.unwrap_or_else(|| input.with_file_name(default_name));

    let bytes =
        std::fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;

    println!("Extracting {}...", input.display());
    let archive = extract_to_archive(name, &bytes, &DocxConverter::new())
        .with_context(|| format!("Failed to extract {}", input.display()))?;
    write_archive(&output, &archive)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!("✓ Successfully wrote: {}", output.display());
    Ok(())
}
