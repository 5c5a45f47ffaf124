use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ppersist::{Document, PersistConfig, Persister, Trust, Value};
use sha2::{Digest, Sha256};
use tracing::Level;

#[derive(Parser)]
#[command(author, version, about = "Inspect and produce ppersist files")]
struct Cli {
    /// TOML file with `[limits]` and `[fetch]` sections.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the variables stored in a file and its sha256.
    Inspect {
        file: PathBuf,
        /// Skip the allow-list gate. Only for files you trust.
        #[arg(long, default_value_t = false)]
        trusted: bool,
    },
    /// Check that a file loads through the allow-list gate.
    Check { file: PathBuf },
    /// Print the contents of a file as JSON.
    Dump {
        file: PathBuf,
        #[arg(long, default_value_t = false)]
        trusted: bool,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Turn a JSON object into a file, one variable per key.
    Pack {
        json: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Download a file and print it as JSON, or save it with `--output`.
    Fetch {
        url: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let persister = match &cli.config {
        Some(path) => Persister::from_config(
            &PersistConfig::load(path).with_context(|| format!("load config {}", path.display()))?,
        ),
        None => Persister::standard(),
    };
    match cli.command {
        Command::Inspect { file, trusted } => inspect(&persister, &file, trust(trusted)),
        Command::Check { file } => check(&persister, &file),
        Command::Dump {
            file,
            trusted,
            output,
        } => dump(&persister, &file, trust(trusted), output.as_deref()),
        Command::Pack { json, output } => pack(&persister, &json, &output),
        Command::Fetch { url, output } => fetch(&persister, &url, output.as_deref()),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn trust(trusted: bool) -> Trust {
    if trusted {
        Trust::Trusted
    } else {
        Trust::Gated
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("read {}", path.display()))
}

fn inspect(persister: &Persister, path: &Path, trust: Trust) -> Result<()> {
    let bytes = read_file(path)?;
    let envelope = ppersist::inspect(&bytes).context("read envelope")?;
    let document = persister
        .decode(&bytes, trust)
        .with_context(|| format!("decode {}", path.display()))?;

    println!("file:    {}", path.display());
    println!("sha256:  {:x}", Sha256::digest(&bytes));
    println!(
        "format:  v{} payload {} bytes crc32 {:08x}",
        envelope.version, envelope.payload_len, envelope.checksum
    );
    println!("entries: {}", document.len());
    for (name, value) in document.iter() {
        println!("  {name}: {}", summary(value));
    }
    Ok(())
}

fn summary(value: &Value) -> String {
    match value {
        Value::List(items) | Value::Tuple(items) | Value::Set(items) => {
            format!("{} ({} items)", value.type_name(), items.len())
        }
        Value::Dict(entries) => format!("{} ({} entries)", value.type_name(), entries.len()),
        Value::Array(array) => format!(
            "{} {} {:?}",
            value.type_name(),
            array.dtype.name(),
            array.shape
        ),
        Value::Series(series) => format!("{} ({} rows)", value.type_name(), series.len()),
        Value::DataFrame(frame) => format!(
            "{} ({} rows x {} columns)",
            value.type_name(),
            frame.rows(),
            frame.columns.len()
        ),
        other => other.type_name().to_string(),
    }
}

fn check(persister: &Persister, path: &Path) -> Result<()> {
    let bytes = read_file(path)?;
    let document = persister
        .decode(&bytes, Trust::Gated)
        .with_context(|| format!("{} does not pass the load gate", path.display()))?;
    println!("ok: {} ({} variables)", path.display(), document.len());
    Ok(())
}

fn dump(persister: &Persister, path: &Path, trust: Trust, output: Option<&Path>) -> Result<()> {
    let document = persister
        .load_dict(path, trust)
        .with_context(|| format!("load {}", path.display()))?;
    write_json(&document, output)
}

fn pack(persister: &Persister, json: &Path, output: &Path) -> Result<()> {
    let raw = fs::read_to_string(json).with_context(|| format!("read {}", json.display()))?;
    let parsed: serde_json::Value =
        serde_json::from_str(&raw).with_context(|| format!("parse {}", json.display()))?;
    let Some(object) = parsed.as_object() else {
        bail!("{} must contain a JSON object", json.display());
    };
    let mut document = Document::new();
    for (name, value) in object {
        document.insert(name.as_str(), Value::from_json(value))?;
    }
    persister
        .save(output, &document)
        .with_context(|| format!("write {}", output.display()))?;
    println!("packed {} variables into {}", document.len(), output.display());
    Ok(())
}

fn fetch(persister: &Persister, url: &str, output: Option<&Path>) -> Result<()> {
    let document = persister.fetch(url).with_context(|| format!("fetch {url}"))?;
    match output {
        Some(path) => {
            persister
                .save(path, &document)
                .with_context(|| format!("write {}", path.display()))?;
            println!("saved {} variables to {}", document.len(), path.display());
            Ok(())
        }
        None => write_json(&document, None),
    }
}

fn write_json(document: &Document, output: Option<&Path>) -> Result<()> {
    let text = serde_json::to_string_pretty(&document.to_json())?;
    match output {
        Some(path) => fs::write(path, text).with_context(|| format!("write {}", path.display())),
        None => {
            println!("{text}");
            Ok(())
        }
    }
}
