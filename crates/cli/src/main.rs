//! CLI tool for generating math lesson slide decks.

mod workspace;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mathslides_core::{ContentUnit, GenerationConfig, LayoutSchema, MathNotationFormatter, Topic};
use mathslides_pptx::{
    output_file_name, Collaborators, GenerateDocument, GenerationOrchestrator, GenerationRequest,
    LayoutStrategy, PackageInspector, TemplateStrategy,
};
use std::fs;
use std::path::{Path, PathBuf};
use workspace::{FsWorkspace, RecordedResponse};

/// Generate PowerPoint decks from math lesson content.
#[derive(Parser, Debug)]
#[command(name = "mathslides")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Settings file (JSON): language, author, template tags
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a new deck from content units and a layout schema
    Build {
        /// Content units (JSON array)
        #[arg(long)]
        content: PathBuf,

        /// Layout schema (JSON)
        #[arg(long)]
        layout: PathBuf,

        /// Deck title
        #[arg(short, long)]
        title: String,

        /// Output file (default: <title>.pptx in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Fill the placeholder tags of a template deck
    Fill {
        /// Template package (.pptx)
        #[arg(long)]
        template: PathBuf,

        /// Content units (JSON array)
        #[arg(long)]
        content: PathBuf,

        /// Deck title
        #[arg(short, long)]
        title: String,

        /// Output file (default: <title>.pptx in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print slide count, shapes and texts of a deck as JSON
    Inspect {
        /// Input package (.pptx)
        input: PathBuf,

        /// Write the JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Convert LaTeX notation to plain text
    FormatMath {
        /// Expression(s) to convert; reads stdin when omitted
        expressions: Vec<String>,
    },

    /// Generate a deck for a topic from a workspace directory
    Generate {
        /// Workspace with topics.json, content/, layouts/ and templates/
        #[arg(short, long)]
        workspace: PathBuf,

        /// Topic id
        #[arg(long)]
        topic: u32,

        /// Layout or template name (*.pptx selects a template)
        #[arg(long)]
        template: String,

        /// Saved text generator response used when the topic has no content
        #[arg(long)]
        response: Option<PathBuf>,

        /// Output directory (default: <workspace>/output)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    let config = match &args.config {
        Some(path) => GenerationConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => GenerationConfig::default(),
    };

    match args.command {
        Command::Build {
            content,
            layout,
            title,
            output,
        } => {
            let units = read_units(&content)?;
            let json = fs::read_to_string(&layout)
                .with_context(|| format!("Failed to read layout {}", layout.display()))?;
            let schema = LayoutSchema::from_json(&json)
                .with_context(|| format!("Invalid layout {}", layout.display()))?;

            let strategy = LayoutStrategy::new(schema, (&config).into());
            let output_path = output.unwrap_or_else(|| PathBuf::from(output_file_name(&title)));
            run_strategy(&strategy, &title, &units, &output_path, args.verbose)
        }
        Command::Fill {
            template,
            content,
            title,
            output,
        } => {
            let units = read_units(&content)?;
            let bytes = fs::read(&template)
                .with_context(|| format!("Failed to read template {}", template.display()))?;

            let strategy = TemplateStrategy::new(bytes, config.tags.clone());
            let output_path = output.unwrap_or_else(|| PathBuf::from(output_file_name(&title)));
            run_strategy(&strategy, &title, &units, &output_path, args.verbose)
        }
        Command::Inspect { input, output } => {
            let bytes = fs::read(&input)
                .with_context(|| format!("Failed to open {}", input.display()))?;
            let summary = PackageInspector::new()
                .inspect(&bytes)
                .with_context(|| format!("Failed to inspect {}", input.display()))?;
            let json = summary.to_json()?;

            match output {
                Some(path) => write_output(&path, json.as_bytes())?,
                None => println!("{}", json),
            }
            Ok(())
        }
        Command::FormatMath { expressions } => {
            let formatter = MathNotationFormatter::new();
            if expressions.is_empty() {
                let mut input = String::new();
                std::io::Read::read_to_string(&mut std::io::stdin(), &mut input)
                    .context("Failed to read stdin")?;
                for line in input.lines() {
                    println!("{}", formatter.format(line));
                }
            } else {
                for expression in &expressions {
                    println!("{}", formatter.format(expression));
                }
            }
            Ok(())
        }
        Command::Generate {
            workspace,
            topic,
            template,
            response,
            output,
        } => {
            let fs_workspace = FsWorkspace::new(&workspace);
            let generator = RecordedResponse::new(response);
            let orchestrator = GenerationOrchestrator::new(
                Collaborators {
                    topics: &fs_workspace,
                    content: &fs_workspace,
                    layouts: &fs_workspace,
                    templates: &fs_workspace,
                    generator: &generator,
                },
                config,
            );

            let document = orchestrator
                .generate(&GenerationRequest {
                    topic_id: topic,
                    template_name: template.clone(),
                })
                .with_context(|| format!("Failed to generate topic {} with '{}'", topic, template))?;

            let output_dir = output.unwrap_or_else(|| workspace.join("output"));
            fs::create_dir_all(&output_dir)
                .with_context(|| format!("Failed to create {}", output_dir.display()))?;
            let output_path = output_dir.join(&document.file_name);
            write_output(&output_path, document.package.as_bytes())?;

            if args.verbose {
                eprintln!("Written to: {}", output_path.display());
            }
            Ok(())
        }
    }
}

/// Read a JSON array of content units and check each one.
fn read_units(path: &Path) -> Result<Vec<ContentUnit>> {
    let data = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let units: Vec<ContentUnit> = serde_json::from_slice(&data)
        .with_context(|| format!("Invalid content units in {}", path.display()))?;

    for unit in &units {
        unit.validate()
            .with_context(|| format!("Invalid content unit in {}", path.display()))?;
    }
    Ok(units)
}

/// Format the units and run one strategy to a file.
fn run_strategy(
    strategy: &dyn GenerateDocument,
    title: &str,
    units: &[ContentUnit],
    output_path: &Path,
    verbose: bool,
) -> Result<()> {
    let formatter = MathNotationFormatter::new();
    let formatted: Vec<ContentUnit> = units.iter().map(|u| u.formatted(&formatter)).collect();

    let package = strategy
        .generate(&Topic::new(0, title), &formatted)
        .with_context(|| format!("Failed to generate '{}'", title))?;
    write_output(output_path, package.as_bytes())?;

    if verbose {
        eprintln!("Written to: {}", output_path.display());
    }
    Ok(())
}

/// Write output to a file.
fn write_output(path: &Path, data: &[u8]) -> Result<()> {
    fs::write(path, data).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
