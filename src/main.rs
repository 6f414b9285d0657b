use std::path::{Path, PathBuf};
use std::{env, io::IsTerminal};

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use imcc_core::{CompileRenderOptions, SelectorConfig, compile_source_with};
use imcc_ops::{ArgDir, CatalogFile, CoreOps};
use tracing::debug;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(
    name = "imcc",
    version,
    about = "Instruction selection for register-VM intermediate code",
    long_about = None,
    override_usage = "imcc [COMMAND] [INPUT]",
    after_help = "Examples:\n  imcc path/to/unit.imc\n  imcc select path/to/unit.imc --emit json -o unit.json\n  imcc ops set\n  imcc --help"
)]
struct Cli {
    /// Optional explicit subcommand.
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input source file.
    #[arg(value_name = "INPUT")]
    input: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Select instructions for a source file and print the result.
    Select(SelectArgs),
    /// List opcode catalog entries.
    Ops(OpsArgs),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
enum Emit {
    #[default]
    Listing,
    Json,
}

#[derive(Debug, Parser)]
struct SelectArgs {
    /// Input source file (.imc or .pir).
    #[arg(value_name = "INPUT")]
    input: PathBuf,
    /// Output file path; stdout when omitted.
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    output: Option<PathBuf>,
    /// Output format.
    #[arg(long = "emit", value_enum, default_value_t = Emit::Listing)]
    emit: Emit,
    /// Selector config file in RON format.
    #[arg(long = "config", value_name = "CONFIG")]
    config: Option<PathBuf>,
    /// Catalog extension file in RON format.
    #[arg(long = "catalog", value_name = "CATALOG")]
    catalog: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct OpsArgs {
    /// Only list entries for this mnemonic.
    #[arg(value_name = "MNEMONIC")]
    mnemonic: Option<String>,
    /// List aggregate types instead of ops.
    #[arg(long = "types")]
    types: bool,
    /// Catalog extension file in RON format.
    #[arg(long = "catalog", value_name = "CATALOG")]
    catalog: Option<PathBuf>,
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Select(args)) => select_command(args),
        Some(Commands::Ops(args)) => ops_command(args),
        None => {
            let Some(input) = cli.input else {
                print_banner();
                println!();
                let mut command = Cli::command();
                command.print_help()?;
                println!();
                return Ok(());
            };
            select_command(SelectArgs {
                input,
                output: None,
                emit: Emit::default(),
                config: None,
                catalog: None,
            })
        }
    }
}

fn print_banner() {
    println!("imcc, version {}.", env!("CARGO_PKG_VERSION"));
    println!("Instruction selection and keyed-operand lowering for a register VM.");
    println!("License: 0BSD - free to use, copy, modify, and distribute.");
}

fn stderr_supports_color() -> bool {
    if env::var_os("NO_COLOR").is_some() {
        return false;
    }

    if let Some(force) = env::var_os("CLICOLOR_FORCE") {
        return force != "0";
    }

    if let Some(choice) = env::var_os("CLICOLOR")
        && choice == "0"
    {
        return false;
    }

    std::io::stderr().is_terminal()
}

fn load_catalog(path: Option<&Path>) -> anyhow::Result<CoreOps> {
    let Some(path) = path else {
        return Ok(CoreOps::new());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog '{}'", path.display()))?;
    let file = CatalogFile::from_ron(&text)
        .with_context(|| format!("failed to load catalog '{}'", path.display()))?;
    CoreOps::with_extensions(file)
        .with_context(|| format!("failed to merge catalog '{}'", path.display()))
}

fn load_config(path: Option<&Path>) -> anyhow::Result<SelectorConfig> {
    let Some(path) = path else {
        return Ok(SelectorConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config '{}'", path.display()))?;
    SelectorConfig::from_ron(&text)
        .with_context(|| format!("failed to load config '{}'", path.display()))
}

fn select_command(args: SelectArgs) -> anyhow::Result<()> {
    let is_source = args
        .input
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("imc") || ext.eq_ignore_ascii_case("pir"));
    if !is_source {
        anyhow::bail!(
            "invalid input extension for '{}': expected .imc or .pir source file",
            args.input.display()
        );
    }

    let catalog = load_catalog(args.catalog.as_deref())?;
    let config = load_config(args.config.as_deref())?;
    let source = std::fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read '{}'", args.input.display()))?;
    debug!(
        ops = catalog.len(),
        max_arity = config.max_arity,
        init_type = %config.init_type,
        "selector ready"
    );

    let output = compile_source_with(
        &args.input.display().to_string(),
        &source,
        &catalog,
        &config,
        CompileRenderOptions {
            color: stderr_supports_color(),
        },
    )
    .map_err(|error| anyhow::anyhow!(error.rendered))?;

    if !output.rendered_warnings.is_empty() {
        eprintln!("{}", output.rendered_warnings);
    }

    let text = match args.emit {
        Emit::Listing => output.listing,
        Emit::Json => {
            let mut json = serde_json::to_string_pretty(&output.unit.records())?;
            json.push('\n');
            json
        }
    };

    match args.output {
        Some(path) => std::fs::write(&path, text)
            .with_context(|| format!("failed to write '{}'", path.display()))?,
        None => print!("{text}"),
    }
    Ok(())
}

fn ops_command(args: OpsArgs) -> anyhow::Result<()> {
    let catalog = load_catalog(args.catalog.as_deref())?;

    if args.types {
        for (name, id) in catalog.aggregate_types() {
            println!("{id:>4}  {name}");
        }
        return Ok(());
    }

    let entries = match args.mnemonic.as_deref() {
        Some(mnemonic) => catalog.by_mnemonic(mnemonic).collect::<Vec<_>>(),
        None => catalog.iter().collect(),
    };
    if entries.is_empty()
        && let Some(mnemonic) = &args.mnemonic
    {
        anyhow::bail!("no catalog entries for '{mnemonic}'");
    }

    for info in entries {
        let dirs = info
            .dirs
            .iter()
            .map(|dir| match dir {
                ArgDir::In => "in",
                ArgDir::Out => "out",
                ArgDir::InOut => "inout",
            })
            .collect::<Vec<_>>()
            .join(",");
        let jump = if info.jump { " jump" } else { "" };
        println!("{:>4}  {:<24} ({dirs}){jump}", info.opcode, info.full_name);
    }
    Ok(())
}
