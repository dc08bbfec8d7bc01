//! Minimal tar-style command line front end.
//!
//! `ustar -c|-a|-u -f ARCHIVE FILE...`, `ustar -t|-x -f ARCHIVE`.

use anyhow::bail;
use clap::{ArgGroup, Parser};
use std::path::PathBuf;

use ustar::{Archiver, FileList, UpdateOutcome, WriteReport};

#[derive(Parser, Debug)]
#[command(name = "ustar")]
#[command(about = "Minimal POSIX ustar archive tool")]
#[command(group = ArgGroup::new("operation").required(true).args(
    ["create", "append", "update", "list", "extract"]
))]
struct Args {
    /// Create a new archive from FILE...
    #[arg(short = 'c')]
    create: bool,

    /// Append FILE... to an existing archive
    #[arg(short = 'a')]
    append: bool,

    /// Append FILE... only if all are already archive members
    #[arg(short = 'u')]
    update: bool,

    /// List archive member names, one per line
    #[arg(short = 't')]
    list: bool,

    /// Extract all members to the current directory
    #[arg(short = 'x')]
    extract: bool,

    /// Archive file to operate on
    #[arg(short = 'f', value_name = "ARCHIVE")]
    archive: PathBuf,

    /// Files to archive
    #[arg(value_name = "FILE")]
    files: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let files: FileList = args.files.iter().cloned().collect();
    let archiver = Archiver::new();

    if args.create {
        print_skipped(&archiver.create(&args.archive, &files)?);
    } else if args.append {
        print_skipped(&archiver.append(&args.archive, &files)?);
    } else if args.update {
        match archiver.update(&args.archive, &files)? {
            UpdateOutcome::Appended(report) => print_skipped(&report),
            UpdateOutcome::MissingMembers(missing) => {
                bail!("not archive members: {}", missing.join(", "))
            }
        }
    } else if args.list {
        for name in &ustar::list(&args.archive)? {
            println!("{name}");
        }
    } else {
        ustar::extract(&args.archive)?;
    }
    Ok(())
}

fn print_skipped(report: &WriteReport) {
    for skip in &report.skipped {
        eprintln!("{}: {}", skip.name, skip.reason);
    }
}
