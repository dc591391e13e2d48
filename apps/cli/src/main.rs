use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use markdown_preview_core::{
    print_markdown, print_markdown_to, PipelineStage, Renderer, RendererConfig, SearchQuery,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Render Markdown to sanitized HTML", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Renderer configuration (.json, .yaml or .yml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a Markdown file and write the HTML to stdout
    Render {
        file: PathBuf,

        /// Highlight occurrences of this text
        #[arg(long, short)]
        query: Option<String>,

        #[arg(long)]
        case_sensitive: bool,

        /// 1-based index of the active match
        #[arg(long, default_value_t = 0)]
        active: usize,

        /// Emit html, expressions and matchCount as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write a printable HTML document and print its path
    Print {
        file: PathBuf,

        /// Document title (defaults to the file name)
        #[arg(long)]
        title: Option<String>,

        /// Directory for print files (defaults to the configured temp directory)
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Leave out the KaTeX/Mermaid scripts
        #[arg(long)]
        no_scripts: bool,
    },
    /// List the pipeline stages in order
    Stages,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Render {
            file,
            query,
            case_sensitive,
            active,
            json,
        } => {
            let markdown = read_markdown(&file)?;
            let query = SearchQuery::new(query.unwrap_or_default())
                .case_sensitive(case_sensitive)
                .active(active);

            let result = Renderer::new(config)
                .render(&markdown, &query)
                .with_context(|| format!("failed to render {}", file.display()))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print!("{}", result.html);
            }
            log::info!(
                "rendered {}: {} expression(s), {} match(es)",
                file.display(),
                result.expressions.len(),
                result.match_count
            );
        }
        Commands::Print {
            file,
            title,
            out_dir,
            no_scripts,
        } => {
            let markdown = read_markdown(&file)?;
            let title = title.unwrap_or_else(|| default_title(&file));

            let mut config = config;
            if no_scripts {
                config.print.client_renderers = false;
            }
            let renderer = Renderer::new(config);

            let path = match out_dir {
                Some(dir) => print_markdown_to(&renderer, &markdown, &title, &dir),
                None => print_markdown(&renderer, &markdown, &title),
            }
            .with_context(|| format!("failed to export {}", file.display()))?;

            println!("{}", path.display());
        }
        Commands::Stages => {
            for (i, stage) in PipelineStage::ALL.iter().enumerate() {
                println!("{}. {:<10} {}", i + 1, stage.name(), stage.description());
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<RendererConfig> {
    match path {
        Some(path) => RendererConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(RendererConfig::default()),
    }
}

fn read_markdown(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn default_title(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Untitled".to_string())
}
