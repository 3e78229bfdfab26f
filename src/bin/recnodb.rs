//! recnodb command-line tool
//!
//! Creates data files and inspects or grows their tables.

use std::ops::ControlFlow;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use recnodb::{Config, Handle, OpenMode, Result};
use tracing_subscriber::{fmt, EnvFilter};

/// recnodb CLI
#[derive(Parser, Debug)]
#[command(name = "recnodb")]
#[command(about = "Inspect and grow recnodb data files")]
#[command(version)]
struct Args {
    /// Data file
    #[arg(short, long, default_value = "./data.rndb")]
    file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new data file, replacing any existing one
    Create {
        /// Chunk size in bytes
        #[arg(short, long, default_value = "4096")]
        chunk_size: u32,

        /// Record size in bytes of the table in the file head
        #[arg(short, long, default_value = "50")]
        record_size: u32,
    },

    /// Print the file header
    Info,

    /// List the blocks of a chain
    Walk {
        /// Offset of the first block
        #[arg(default_value = "0")]
        start: u64,
    },

    /// Create a new table and print its offset
    AddTable {
        /// Record size in bytes
        record_size: u32,
    },

    /// Reserve record numbers in a table
    Reserve {
        /// Offset of the table head
        #[arg(default_value = "0")]
        table: u64,

        /// How many records to reserve
        #[arg(short, long, default_value = "1")]
        count: u32,
    },
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,recnodb=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::debug!("recnodb v{}", recnodb::VERSION);

    if let Err(e) = run(args) {
        tracing::error!(code = ?e.code(), "{}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    match args.command {
        Commands::Create {
            chunk_size,
            record_size,
        } => {
            let config = Config::builder()
                .chunk_size(chunk_size)
                .record_size(record_size)
                .build();
            Handle::create(&args.file, &config)?.close()
        }

        Commands::Info => with_existing(&args.file, |handle| {
            let fhead = handle.file_header().clone();
            println!("path:        {}", handle.path().display());
            println!("chunk size:  {}", fhead.chunk_size);
            println!("record size: {}", fhead.table.record_size);
            println!("last recno:  {}", fhead.table.last_recno);
            println!("file length: {}", handle.file_len()?);
            match fhead.block().next_block {
                Some(next) => println!("next block:  {}", next),
                None => println!("next block:  none"),
            }
            Ok(())
        }),

        Commands::Walk { start } => with_existing(&args.file, |handle| {
            let end = handle.walk(start, |header, offset| {
                let block = header.block();
                println!(
                    "{:>10}  {:<8} size={:<8} first_recno={}",
                    offset,
                    format!("{:?}", block.block_type),
                    block.block_size,
                    block.first_recno
                );
                ControlFlow::Continue(())
            })?;
            println!("tail at {}", end.offset());
            Ok(())
        }),

        Commands::AddTable { record_size } => with_existing(&args.file, |handle| {
            let table = handle.create_table(record_size)?;
            println!("{}", table.offset());
            Ok(())
        }),

        Commands::Reserve { table, count } => with_existing(&args.file, |handle| {
            for _ in 0..count {
                let slot = handle.reserve_record(table)?;
                println!("{}\t{}", slot.recno, slot.offset);
            }
            Ok(())
        }),
    }
}

fn with_existing<F>(path: &std::path::Path, op: F) -> Result<()>
where
    F: FnOnce(&mut Handle) -> Result<()>,
{
    Handle::with_open(path, OpenMode::Open, &Config::default(), op)
}
