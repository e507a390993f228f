use std::{
    io::{BufRead, IsTerminal, Write},
    path::Path,
};

use clap::Parser;
use docseek::{
    Config,
    Error,
    Extractor,
    IndexDir,
    SearchIndex,
    cli::{self, Cli, Command},
    document::{DocumentRecord, Metadata, format_timestamp, truncate_chars},
    enrich,
    error,
    ingestion::{self, IndexOptions, IndexSummary},
    search::{self, SearchParams},
    tantivy_index::IndexHit,
};
use kdam::{Bar, BarExt, tqdm};
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("DOCSEEK_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Command::Completions(args) = &cli.command {
        args.generate();
        return Ok(());
    }

    let config = Config::from_env()?;
    let index_dir = cli.index_dir.as_deref();

    match &cli.command {
        Command::Index(args) => cmd_index(index_dir, &config, args),
        Command::Search(args) => cmd_search(index_dir, &config, args),
        Command::List(args) => cmd_list(index_dir, args),
        Command::Stats(args) => cmd_stats(index_dir, args.json),
        Command::Read(args) => cmd_read(&config, args),
        Command::Clear(args) => cmd_clear(index_dir, args.force),
        Command::Completions(_) => Ok(()),
    }
}

fn color_stdout() -> bool {
    std::io::stdout().is_terminal()
}

fn cmd_index(
    index_dir: Option<&Path>,
    config: &Config,
    args: &cli::IndexArgs,
) -> error::Result<()> {
    if !args.path.exists() {
        return Err(Error::Argument(format!(
            "path does not exist: {}",
            args.path.display()
        )));
    }

    let dir = IndexDir::resolve(index_dir, true)?;
    let index = SearchIndex::open_or_create(dir.root())?;
    let extractor = Extractor::new(config.extract.clone());
    let options = IndexOptions {
        recursive: args.recursive,
        max_file_size: args.max_file_size(),
    };

    let show_progress = !args.json && std::io::stderr().is_terminal();
    let mut bar: Option<Bar> = None;
    let summary =
        ingestion::index_path(&args.path, &index, &extractor, &options, |p| {
            if !show_progress {
                return;
            }
            let pb = bar.get_or_insert_with(|| {
                tqdm!(total = p.total, desc = "Indexing", unit = " files")
            });
            let _ = pb.update(1);
        })?;
    if bar.is_some() {
        eprintln!();
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_index_summary(&summary);
    }
    Ok(())
}

fn print_index_summary(summary: &IndexSummary) {
    println!(
        "Indexed {} of {} file(s) into {}",
        summary.indexed_count,
        summary.total_files,
        summary.index_path.display()
    );
    if summary.skipped_count > 0 {
        println!("  skipped (too large): {}", summary.skipped_count);
    }
    if summary.error_count > 0 {
        println!("  failed: {}", summary.error_count);
    }
}

fn cmd_search(
    index_dir: Option<&Path>,
    config: &Config,
    args: &cli::SearchArgs,
) -> error::Result<()> {
    let dir = IndexDir::resolve(index_dir, false)?;
    let index = SearchIndex::open_existing(dir.root())?;

    let params = SearchParams {
        query: args.query.clone(),
        max_results: args.max_results,
        min_score: args.min_score,
    };
    let hits = search::execute_search(&params, &index)?;

    let extractor = enrich::preview_extractor(&config.extract, &config.snippet);
    let results =
        enrich::enrich_results(hits, &args.query, &extractor, &config.snippet);

    if args.json {
        println!(
            "{}",
            search::format_json(&results, &args.query, args.min_score)?
        );
    } else {
        print!(
            "{}",
            search::format_human(
                &results,
                &args.query,
                &config.snippet,
                color_stdout()
            )
        );
    }
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListEntry<'a> {
    document_id: &'a str,
    path: &'a str,
    file_name: &'a str,
    content_type: &'a str,
    file_size: u64,
    page_count: u64,
    last_modified: &'a str,
    indexed_at: &'a str,
    metadata: &'a Metadata,
}

impl<'a> From<&'a IndexHit> for ListEntry<'a> {
    fn from(hit: &'a IndexHit) -> Self {
        Self {
            document_id: &hit.id,
            path: &hit.path,
            file_name: &hit.file_name,
            content_type: &hit.content_type,
            file_size: hit.size,
            page_count: hit.page_count,
            last_modified: &hit.last_modified_display,
            indexed_at: &hit.indexed_at_display,
            metadata: &hit.metadata,
        }
    }
}

fn cmd_list(index_dir: Option<&Path>, args: &cli::ListArgs) -> error::Result<()> {
    let dir = IndexDir::resolve(index_dir, false)?;
    let index = SearchIndex::open_existing(dir.root())?;
    let hits = index.list_all(args.max_results)?;

    if args.json {
        let entries: Vec<ListEntry<'_>> = hits.iter().map(ListEntry::from).collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if hits.is_empty() {
        println!("No documents indexed.");
        return Ok(());
    }
    let color = color_stdout();
    for hit in &hits {
        let id = &hit.id[..hit.id.len().min(7)];
        if color {
            println!("{} {}", id.dimmed(), hit.path);
        } else {
            println!("{id} {}", hit.path);
        }
        println!(
            "        {} | {} bytes | {} page(s) | modified {}",
            hit.content_type, hit.size, hit.page_count, hit.last_modified_display
        );
    }
    println!("\n{} document(s)", hits.len());
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsReport<'a> {
    total_documents: u64,
    deleted_documents: u64,
    index_path: &'a Path,
}

fn cmd_stats(index_dir: Option<&Path>, json: bool) -> error::Result<()> {
    let dir = IndexDir::resolve(index_dir, false)?;
    let index = SearchIndex::open_existing(dir.root())?;
    let stats = index.stats()?;

    if json {
        let report = StatsReport {
            total_documents: stats.total_documents,
            deleted_documents: stats.deleted_documents,
            index_path: dir.root(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Index: {}", dir.root().display());
        println!("Documents: {}", stats.total_documents);
        println!("Deleted (pending merge): {}", stats.deleted_documents);
    }
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReadReport<'a> {
    document_id: &'a str,
    path: &'a Path,
    file_name: &'a str,
    content_type: &'a str,
    file_size: u64,
    page_count: usize,
    last_modified: String,
    metadata: &'a Metadata,
    content: &'a str,
    truncated: bool,
}

fn cmd_read(config: &Config, args: &cli::ReadArgs) -> error::Result<()> {
    let extractor = Extractor::new(config.extract.clone());
    let record: DocumentRecord = extractor.extract(&args.path)?;

    let mut content = record.content.clone();
    let truncated = args
        .limit
        .is_some_and(|limit| content.chars().count() > limit);
    if let Some(limit) = args.limit {
        truncate_chars(&mut content, limit);
    }

    if args.json {
        let report = ReadReport {
            document_id: record.id.as_str(),
            path: &record.path,
            file_name: &record.file_name,
            content_type: &record.content_type,
            file_size: record.byte_size,
            page_count: record.page_count(),
            last_modified: format_timestamp(&record.last_modified),
            metadata: &record.metadata,
            content: &content,
            truncated,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("path: {}", record.path.display());
    println!("type: {}", record.content_type);
    println!("pages: {}", record.page_count());
    for (key, value) in record.metadata.iter() {
        println!("{key}: {value}");
    }
    println!();
    println!("{content}");
    if truncated {
        println!("\n[... truncated at {} characters]", content.chars().count());
    }
    Ok(())
}

fn cmd_clear(index_dir: Option<&Path>, force: bool) -> error::Result<()> {
    let dir = IndexDir::resolve(index_dir, false)?;
    let index = SearchIndex::open_existing(dir.root())?;
    let total = index.stats()?.total_documents;

    if !force && !confirm(&format!(
        "Delete all {total} document(s) from {}?",
        dir.root().display()
    ))? {
        eprintln!("Aborted.");
        return Ok(());
    }

    let mut session = index.begin_write()?;
    session.clear()?;
    println!("Removed {total} document(s).");
    Ok(())
}

/// Ask a yes/no question on stderr. Anything but `y`/`yes` is a no.
fn confirm(question: &str) -> error::Result<bool> {
    eprint!("{question} [y/N] ");
    std::io::stderr().flush()?;

    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    let answer = answer.trim().to_ascii_lowercase();
    Ok(answer == "y" || answer == "yes")
}
