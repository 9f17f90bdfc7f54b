use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::DateTime;
use clap::{Parser, Subcommand};
use tempfile::NamedTempFile;
use tracing::Level;

use slimtar::{Archive, Builder};

/// Create, inspect and edit USTAR archives
#[derive(Debug, Parser)]
#[command(name = "slimtar", version)]
struct App {
    /// Set the logging level
    #[arg(long, value_enum, default_value = "warn")]
    log_level: LogLevel,

    /// The archive to operate on
    archive: PathBuf,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Creates a new archive from the given files
    #[command(short_flag = 'c', long_flag = "create")]
    Create { files: Vec<PathBuf> },
    /// Adds files to an existing archive
    #[command(short_flag = 'a', long_flag = "add")]
    Add { files: Vec<PathBuf> },
    /// Renames an entry
    #[command(short_flag = 'r', long_flag = "rename")]
    Rename { old: String, new: String },
    /// Deletes entries
    #[command(short_flag = 'd', long_flag = "delete")]
    Delete { names: Vec<String> },
    /// Lists every entry
    #[command(short_flag = 'l', long_flag = "list")]
    List,
    /// Extracts entries into the working directory
    #[command(short_flag = 'e', long_flag = "extract")]
    Extract { names: Vec<String> },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

fn main() -> Result<()> {
    let args = App::parse();

    tracing_subscriber::fmt()
        .with_max_level(Level::from(args.log_level))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let archive = args.archive.as_path();
    match args.cmd {
        Command::Create { files } => rewrite(archive, None, |builder| append_files(builder, &files)),
        Command::Add { files } => {
            let existing = Archive::open(archive)?;
            rewrite(archive, Some(&existing), |builder| append_files(builder, &files))
        }
        Command::Rename { old, new } => {
            let mut existing = Archive::open(archive)?;
            if !existing.rename(&old, &new) {
                println!("  * no entry named '{}'", old);
            }
            rewrite(archive, Some(&existing), |_| Ok(()))
        }
        Command::Delete { names } => {
            let mut existing = Archive::open(archive)?;
            for name in &names {
                existing.remove(name);
            }
            rewrite(archive, Some(&existing), |_| Ok(()))
        }
        Command::List => list(&Archive::open(archive)?),
        Command::Extract { names } => {
            let existing = Archive::open(archive)?;
            for name in &names {
                match existing.extract(name, name) {
                    Ok(_) => println!("  * extracting '{}'", name),
                    Err(e) => println!("  * couldn't extract '{}': {}", name, e),
                }
            }
            Ok(())
        }
    }
}

type FileBuilder = Builder<BufWriter<fs::File>>;

/// Writes a replacement for `archive` next to it, holding the entries of
/// `existing` (if any) followed by whatever `extra` appends, then moves it
/// over the original.
fn rewrite<F>(archive: &Path, existing: Option<&Archive>, extra: F) -> Result<()>
where
    F: FnOnce(&mut FileBuilder) -> Result<()>,
{
    let dir = match archive.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temporary file in `{}`", dir.display()))?;
    let mut builder = Builder::new(BufWriter::new(tmp.reopen()?));
    if let Some(existing) = existing {
        existing.export_into(&mut builder)?;
    }
    extra(&mut builder)?;
    builder.into_inner()?;
    tmp.persist(archive)
        .with_context(|| format!("replacing `{}`", archive.display()))?;
    Ok(())
}

fn append_files(builder: &mut FileBuilder, files: &[PathBuf]) -> Result<()> {
    for path in files {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                println!("  * couldn't open file '{}': {}", path.display(), e);
                continue;
            }
        };
        if let Err(e) = builder.append_data(path.as_os_str().as_encoded_bytes(), &data) {
            println!("  * couldn't add file '{}': {}", path.display(), e);
        }
    }
    Ok(())
}

fn list(archive: &Archive) -> Result<()> {
    println!("\n{}", archive.path().display());
    for entry in archive {
        let time = DateTime::from_timestamp(entry.mtime() as i64, 0)
            .map(|t| t.format("%a %b %e %H:%M:%S %Y").to_string())
            .unwrap_or_else(|| entry.mtime().to_string());
        println!("  * {} ({}, {} bytes)", entry.name(), time, entry.size());
    }
    Ok(())
}
