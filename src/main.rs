//! pyacc Command Line Interface
//!
//! Usage:
//!   pyacc [OPTIONS] <input-file>
//!   pyacc --help
//!
//! Examples:
//!   pyacc square.py                        # Generate host code
//!   pyacc --emit=tree square.py            # Print the directive tree
//!   pyacc --emit=json -o tree.json kernel.py
//!   pyacc --gangs=8 --entry=run square.py  # Eight workers, entry point `run`

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{debug, info};
use pyacc::codegen::BackendKind;
use pyacc::ir::FunctionContext;
use pyacc::utils::pretty::PrettyPrint;
use pyacc::CompileConfig;
use std::fs;
use std::path::PathBuf;

/// pyacc - directive-driven source-to-source compiler
#[derive(Parser, Debug)]
#[command(name = "pyacc")]
#[command(author = "pyacc Contributors")]
#[command(version)]
#[command(about = "Compile accelerator pragmas in a function into parallel host code", long_about = None)]
struct Cli {
    /// Source file holding one annotated function
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Output file (defaults to stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// What to emit
    #[arg(long, default_value = "code")]
    emit: EmitKind,

    /// Code generation backend
    #[arg(short, long)]
    backend: Option<BackendArg>,

    /// Annotation keyword after the comment marker
    #[arg(long)]
    framework: Option<String>,

    /// Host pool size when no literal gang count is given
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    gangs: Option<u32>,

    /// Name of the generated entry point
    #[arg(long)]
    entry: Option<String>,

    /// Tab width used to measure indentation
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=16))]
    tab_width: Option<u32>,

    /// JSON configuration file; flags override its values
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress warnings)
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendArg {
    /// Thread pool on the host
    Host,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Host => BackendKind::Host,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EmitKind {
    /// Generated source code
    Code,
    /// One line per directive, in source order
    Directives,
    /// Indented directive tree
    Tree,
    /// Directive tree as JSON
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.quiet {
        log::LevelFilter::Error
    } else {
        match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    info!("pyacc v{}", pyacc::VERSION);
    debug!("Input file: {:?}", cli.input);

    let source = fs::read_to_string(&cli.input)
        .with_context(|| format!("Failed to read input file: {:?}", cli.input))?;

    let config = build_config(&cli)?;
    debug!("Compile config: {:?}", config);

    let output = match cli.emit {
        EmitKind::Code => {
            let context = FunctionContext::from_function(source)
                .with_context(|| format!("No function found in {:?}", cli.input))?;
            info!("Compiling `{}`...", context.name);
            pyacc::compile(&context, &config)?
        }
        EmitKind::Directives => {
            let tree = pyacc::parse_with(&source, &config)?;
            let mut nodes: Vec<_> = tree.iter().skip(1).map(|(_, node)| node).collect();
            nodes.sort_by_key(|node| node.line);
            nodes
                .iter()
                .map(|node| format!("{}", node))
                .collect::<Vec<_>>()
                .join("\n")
        }
        EmitKind::Tree => pyacc::parse_with(&source, &config)?.pretty(),
        EmitKind::Json => {
            let tree = pyacc::parse_with(&source, &config)?;
            serde_json::to_string_pretty(&tree.nested()).context("Failed to serialize tree")?
        }
    };

    write_output(&cli.output, &output)
}

fn build_config(cli: &Cli) -> Result<CompileConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            CompileConfig::from_json(&json)?
        }
        None => CompileConfig::default(),
    };

    // Override with CLI flags
    if let Some(framework) = &cli.framework {
        config.framework = framework.clone();
    }
    if let Some(gangs) = cli.gangs {
        config.default_gangs = gangs as usize;
    }
    if let Some(entry) = &cli.entry {
        config.entry = entry.clone();
    }
    if let Some(width) = cli.tab_width {
        config.tab_width = width as usize;
    }
    if let Some(backend) = cli.backend {
        config.backend = backend.into();
    }

    Ok(config)
}

fn write_output(path: &Option<PathBuf>, content: &str) -> Result<()> {
    match path {
        Some(p) => {
            fs::write(p, content)
                .with_context(|| format!("Failed to write output file: {:?}", p))?;
        }
        None => {
            print!("{}", content);
            if !content.ends_with('\n') {
                println!();
            }
        }
    }
    Ok(())
}
