//! Command-line interface definitions for docview

use clap::{Parser, Subcommand};
use docview::viewer::ALL_SCOPE;
use std::path::PathBuf;

/// CLI structure for the docview application
#[derive(Parser)]
#[command(name = "docview")]
#[command(version)]
#[command(about = "Document viewer with outline navigation and scoped search", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands for docview
#[derive(Subcommand)]
pub enum Commands {
    /// Print the heading outline of a document
    Outline {
        /// Content directory or single document (defaults to current directory)
        #[arg(value_name = "PATH", default_value = ".")]
        input: PathBuf,

        /// Article number from the manifest (1-based)
        #[arg(short, long)]
        article: Option<usize>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Count (and optionally highlight) matches of a query
    Search {
        /// Content directory or single document
        #[arg(value_name = "PATH")]
        input: PathBuf,

        /// Text to search for (literal, case-insensitive)
        query: String,

        /// Heading id whose section is searched
        #[arg(short, long, default_value = ALL_SCOPE)]
        scope: String,

        /// Article number from the manifest (1-based)
        #[arg(short, long)]
        article: Option<usize>,

        /// Write the highlighted viewer page to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Render the viewer page to an HTML file
    Render {
        /// Content directory or single document (defaults to current directory)
        #[arg(value_name = "PATH", default_value = ".")]
        input: PathBuf,

        /// Output file path
        #[arg(short, long, default_value = "viewer.html")]
        output: PathBuf,

        /// Article number from the manifest (1-based)
        #[arg(short, long)]
        article: Option<usize>,

        /// Highlight matches of this query
        #[arg(short, long)]
        query: Option<String>,

        /// Heading id whose section is searched
        #[arg(short, long, default_value = ALL_SCOPE)]
        scope: String,

        /// Heading id to navigate to
        #[arg(short, long)]
        navigate: Option<String>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Extract a .docx file into index.html + images/ as a zip archive
    Extract {
        /// The .docx file to extract
        #[arg(value_name = "DOCX")]
        input: PathBuf,

        /// Output archive path (defaults to the document name with .zip)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}
