use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{ArgGroup, Parser, Subcommand};
use logline::{compile, parse_snapshots, AccessLogConfig, Program, Snapshot};
use tracing::debug;
use tracing_subscriber::EnvFilter;

pub type Result<T> = anyhow::Result<T>;

#[derive(Parser)]
#[command(name = "logline")]
#[command(version)]
#[command(about = "Validate and preview access-log formats", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a format and print its instructions.
    Check {
        /// The format string, e.g. '%REQ(:method)% %RESPONSE_CODE%'.
        template: String,

        /// Print the compiled program as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Render a format once per request snapshot.
    #[command(group(ArgGroup::new("source").required(true)))]
    Render {
        /// The format string.
        #[arg(short, long, group = "source")]
        template: Option<String>,

        /// A YAML or JSON access-log config file.
        #[arg(short, long, group = "source")]
        config: Option<PathBuf>,

        /// Text for missing values; overrides the config.
        #[arg(long)]
        placeholder: Option<String>,

        /// Text written after every instruction; overrides the config.
        #[arg(long)]
        delimiter: Option<String>,

        /// A line appended after the rendered format. Repeatable.
        #[arg(short, long = "append")]
        append: Vec<String>,

        /// JSON file with one snapshot or an array of them; `-` reads stdin.
        snapshot: PathBuf,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let lines = match cli.cmd {
        Commands::Check { template, json } => vec![check(&template, json)?],
        Commands::Render {
            template,
            config,
            placeholder,
            delimiter,
            append,
            snapshot,
        } => {
            let mut config = load_config(template, config.as_deref())?;
            if let Some(placeholder) = placeholder {
                config.empty_placeholder = placeholder;
            }
            if let Some(delimiter) = delimiter {
                config.delimiter = delimiter;
            }
            let snapshots = load_snapshots(&snapshot)?;
            render(&config, &append, &snapshots)?
        }
    };

    for line in lines {
        println!("{}", line);
    }
    Ok(())
}

/// Logs go to stderr so rendered lines stay alone on stdout.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn check(template: &str, json: bool) -> Result<String> {
    let program = compile(template).context("invalid format")?;
    if json {
        return Ok(serde_json::to_string_pretty(&program)?);
    }
    Ok(listing(&program))
}

/// One line per instruction: index, canonical text and length limit.
fn listing(program: &Program) -> String {
    let mut out = String::new();
    for (index, instruction) in program.instructions().iter().enumerate() {
        let kind = match instruction.op.command() {
            Some(command) => command.name(),
            None => "text",
        };
        let text = instruction.to_string();
        out.push_str(&format!("{:>3}  {:<22} {:?}", index, kind, text));
        if let Some(limit) = instruction.truncate {
            out.push_str(&format!("  max {}", limit));
        }
        out.push('\n');
    }
    out.push_str(&format!("{} instructions", program.len()));
    out
}

fn load_config(template: Option<String>, config: Option<&Path>) -> Result<AccessLogConfig> {
    match (template, config) {
        (Some(template), None) => Ok(AccessLogConfig::new(template)),
        (None, Some(path)) => AccessLogConfig::from_path(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        _ => bail!("exactly one of --template and --config is required"),
    }
}

fn load_snapshots(path: &Path) -> Result<Vec<Snapshot>> {
    let source = if path == Path::new("-") {
        std::io::read_to_string(std::io::stdin()).context("failed to read stdin")?
    } else {
        let context = || format!("failed to read {}", path.display());
        std::fs::read_to_string(path).with_context(context)?
    };
    let snapshots = parse_snapshots(&source).context("invalid snapshot JSON")?;
    debug!(count = snapshots.len(), "loaded snapshots");
    Ok(snapshots)
}

fn render(
    config: &AccessLogConfig,
    append: &[String],
    snapshots: &[Snapshot],
) -> Result<Vec<String>> {
    let log = config.build().context("invalid format")?;
    Ok(snapshots
        .iter()
        .map(|snapshot| {
            let mut record = log.record();
            for line in append {
                record.push(line.as_str());
            }
            log.render_record(&record, snapshot)
        })
        .collect())
}
