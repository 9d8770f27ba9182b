use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use kiln_core::loader::load_units;
use kiln_core::{CodegenConfig, CompilationArtifact, compile_units};
use tracing::{Level, info};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{Layer, Registry};
use wasmi::{Engine, Linker, Module, Store};

/// Compile serialized IR units into a WebAssembly module.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// IR unit file, or a directory searched recursively for `*.json` units
    #[arg(short, long, value_name = "PATH")]
    input: PathBuf,

    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    #[arg(long, help = "Skip multifile facade generation")]
    no_facades: bool,

    #[arg(long, help = "Do not export public functions")]
    no_export: bool,

    #[arg(
        long,
        value_name = "NAME",
        help = "Name of the generated field-initialization routine"
    )]
    init_name: Option<String>,

    #[arg(long, help = "Run the entry function after compiling")]
    run: bool,

    #[arg(
        long,
        value_name = "NAME",
        default_value = "main",
        help = "Exported function called by --run (exact name or last path segment)"
    )]
    entry: String,

    #[arg(long, help = "Print the lowered module")]
    dump: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose).context("failed to install the log subscriber")?;
    execute(cli)
}

fn log_level(verbose: u8) -> Level {
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

fn init_logging(verbose: u8) -> Result<(), TryInitError> {
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .with_filter(LevelFilter::from_level(log_level(verbose)));
    Registry::default().with(layer).try_init()
}

fn execute(cli: Cli) -> Result<()> {
    let mut config = CodegenConfig {
        export_public: !cli.no_export,
        generate_facades: !cli.no_facades,
        ..CodegenConfig::default()
    };
    if let Some(name) = cli.init_name {
        config.init_function_name = name;
    }

    let units = load_units(&cli.input)
        .with_context(|| format!("failed to load IR units from {}", cli.input.display()))?;
    info!(units = units.len(), "loaded input");

    let artifact = compile_units(units, &config).context("code generation failed")?;

    if let Some(output) = &cli.output {
        write_output(output, &artifact.wasm)?;
    }
    if cli.dump {
        println!("{:#?}", artifact.module);
    }
    if cli.run {
        let result = run_wasm(&artifact, &cli.entry)?;
        println!("Program exited with {result}");
    }
    Ok(())
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {parent:?}"))?;
        }
    }
    fs::write(path, bytes)
        .with_context(|| format!("failed to write output file {}", path.display()))?;
    Ok(())
}

/// Exported name for `entry`: an exact match, else the export whose last
/// `.`-separated segment is `entry`.
fn resolve_entry(artifact: &CompilationArtifact, entry: &str) -> Result<String> {
    let exported = artifact.module.functions.iter().filter(|f| f.exported);
    let mut by_segment = None;
    for function in exported {
        if function.name == entry {
            return Ok(function.name.clone());
        }
        if by_segment.is_none() && function.name.rsplit('.').next() == Some(entry) {
            by_segment = Some(function.name.clone());
        }
    }
    by_segment.ok_or_else(|| anyhow!("no exported function named `{entry}`"))
}

fn run_wasm(artifact: &CompilationArtifact, entry: &str) -> Result<i32> {
    let export = resolve_entry(artifact, entry)?;
    let engine = Engine::default();
    let module = Module::new(&engine, &artifact.wasm).context("failed to compile wasm artifact")?;
    let linker = Linker::new(&engine);
    let mut store = Store::new(&engine, ());
    let instance = linker
        .instantiate_and_start(&mut store, &module)
        .context("failed to instantiate module")?;
    let func = instance
        .get_typed_func::<(), i32>(&store, &export)
        .with_context(|| format!("exported function `{export}` missing or has wrong type"))?;
    let result = func
        .call(&mut store, ())
        .with_context(|| format!("failed to execute `{export}`"))?;
    Ok(result)
}
