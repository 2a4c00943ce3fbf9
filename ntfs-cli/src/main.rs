//! Command-line inspector for a read-only NTFS volume image.
//!
//! Grounded on `cli/src/main.rs`'s `clap::Parser`/`Subcommand` shape,
//! stripped of the teacher's device enumeration and formatting
//! commands (out of scope here) and of `tokio` — the engine is
//! synchronous, so the CLI is too.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ntfs_core::{FileByteReader, NtfsError, Result};
use ntfs_engine::{FileEntry, Volume};

#[derive(Parser)]
#[command(name = "ntfs-cli")]
#[command(about = "Inspect a read-only NTFS volume image", long_about = None)]
struct Cli {
    /// Path to the raw volume image
    image: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the contents of a directory
    Ls {
        /// Path within the volume, e.g. \Windows\System32
        #[arg(default_value = "\\")]
        path: String,
    },
    /// Print file metadata: size, DOS attributes, times
    Stat {
        path: String,
    },
    /// Dump a file's default data stream to stdout
    Cat {
        path: String,
    },
}

fn open_entry<'v>(volume: &'v Volume, path: &str) -> Result<FileEntry<'v>> {
    let reference = volume
        .resolve_path(path)?
        .ok_or_else(|| NtfsError::NotFound(format!("path not found: {path}")))?;
    FileEntry::new(volume, reference)
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let reader = FileByteReader::open(&cli.image)?;
    let volume = Volume::open(Box::new(reader))?;

    match cli.command {
        Commands::Ls { path } => {
            let entry = open_entry(&volume, &path)?;
            if !entry.is_directory() {
                return Err(NtfsError::InvalidArgument(format!("{path} is not a directory")));
            }
            for child in entry.sub_entries()? {
                let marker = if child.is_directory { '/' } else { ' ' };
                println!("{:>12}  {}{}", child.data_size, child.name, marker);
            }
        }
        Commands::Stat { path } => {
            let entry = open_entry(&volume, &path)?;
            println!("path:       {path}");
            println!("directory:  {}", entry.is_directory());
            println!("size:       {}", entry.size());
            println!("attributes: 0x{:08X}", entry.file_attributes());
            if let Some(times) = entry.times() {
                println!("created:    {}", times.creation_time);
                println!("modified:   {}", times.modification_time);
                println!("accessed:   {}", times.access_time);
            }
            let ads = entry.alternate_data_streams();
            if !ads.is_empty() {
                println!("streams:");
                for stream in ads {
                    println!("  {}: {} bytes", stream.name.as_deref().unwrap_or(""), stream.size);
                }
            }
        }
        Commands::Cat { path } => {
            let mut entry = open_entry(&volume, &path)?;
            if entry.is_directory() {
                return Err(NtfsError::InvalidArgument(format!("{path} is a directory")));
            }
            let mut buf = vec![0u8; 64 * 1024];
            loop {
                let n = entry.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                use std::io::Write;
                std::io::stdout().write_all(&buf[..n])?;
            }
        }
    }

    Ok(())
}

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("ntfs-cli: {err}");
        std::process::exit(1);
    }
}
