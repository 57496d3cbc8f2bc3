//! CLI entry point for mboxidx.
//!
//! Drives the library end to end: parse an archive (or reload its index),
//! optionally persist the index, then filter, sort, and print records.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;

use ahash::AHashMap;
use mboxidx::message::split_sender;
use mboxidx::{
    filter_by_sender, load_index, save_index, sort_by_date, sort_by_from, sort_by_start, Mbox,
    MessageRecord,
};

/// Parse and index mbox mail archives.
///
/// Scans the archive with parallel region readers, or reloads a previously
/// saved offset index without rescanning.
#[derive(Parser, Debug)]
#[command(name = "mboxidx")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The mbox archive to read
    mbox: PathBuf,

    /// Number of worker threads (0 = auto-detect)
    #[arg(short = 'j', long = "threads", default_value = "8")]
    threads: usize,

    /// Write the offset index to this file after parsing
    #[arg(short = 'x', long = "save-index")]
    save_index: Option<PathBuf>,

    /// Reload records from this index instead of scanning the archive
    #[arg(short = 'l', long = "load-index")]
    load_index: Option<PathBuf>,

    /// Only show messages whose sender contains this text
    #[arg(short = 's', long = "sender")]
    sender: Option<String>,

    /// Sort order: start, date, or from
    #[arg(short = 'r', long = "sort", default_value = "start")]
    sort: String,

    /// How many records to print (0 = none)
    #[arg(short = 'n', long = "limit", default_value = "5")]
    limit: usize,

    /// Print a per-sender message tally
    #[arg(long = "stats")]
    stats: bool,
}

fn print_records<'a>(records: impl Iterator<Item = &'a MessageRecord>, limit: usize) {
    for record in records.take(limit) {
        println!("{}", record);
        println!("{}", "-".repeat(68));
    }
}

fn print_stats(records: &[MessageRecord]) {
    let mut tally: AHashMap<String, usize> = AHashMap::new();
    for record in records {
        let sender = record
            .from
            .as_deref()
            .map(|from| {
                let (_, email) = split_sender(from);
                email.unwrap_or_else(|| from.to_owned())
            })
            .unwrap_or_else(|| "(no sender)".to_owned());
        *tally.entry(sender).or_default() += 1;
    }

    let mut counts: Vec<(String, usize)> = tally.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    println!("messages by sender:");
    for (sender, count) in counts.iter().take(10) {
        println!("{:>8}  {}", count, sender);
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    if !args.mbox.exists() {
        bail!("mbox file not found: {}", args.mbox.display());
    }

    let threads = if args.threads == 0 {
        num_cpus::get()
    } else {
        args.threads
    };

    let started = Instant::now();
    let mut records = match &args.load_index {
        Some(idx_path) => {
            eprintln!("Loading index: {}", idx_path.display());
            load_index(idx_path, &args.mbox, threads)
                .context("failed to load records from index")?
        }
        None => {
            eprintln!(
                "Parsing {} with {} threads",
                args.mbox.display(),
                threads
            );
            let mbox = Mbox::open_read(&args.mbox)?;
            mbox.parse(threads)
        }
    };
    eprintln!(
        "{} messages in {:.2?}",
        records.len(),
        started.elapsed()
    );

    match args.sort.as_str() {
        "start" => sort_by_start(&mut records),
        "date" => sort_by_date(&mut records),
        "from" => sort_by_from(&mut records),
        other => bail!("unknown sort key {:?}: expected start, date, or from", other),
    }

    if let Some(idx_path) = &args.save_index {
        save_index(idx_path, &mut records)
            .with_context(|| format!("failed to save index {}", idx_path.display()))?;
        eprintln!("Index written to {}", idx_path.display());
    }

    match &args.sender {
        Some(needle) => {
            let matched = filter_by_sender(&records, needle);
            eprintln!("{} messages match sender {:?}", matched.len(), needle);
            print_records(matched.into_iter(), args.limit);
        }
        None => {
            print_records(records.iter(), args.limit);
        }
    }

    if args.stats {
        print_stats(&records);
    }

    Ok(())
}
