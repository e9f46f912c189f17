//! findz CLI application entry point
//!
//! # Usage
//!
//! ```bash
//! # Search the current directory, archives included
//! findz search "size > 10M and ext in ('iso', 'img')"
//!
//! # Presets and JSON filters work wherever filter text does
//! findz search images ~/Downloads
//! findz search '{"field": "archive", "op": "!=", "value": ""}' /data
//!
//! # Group the last result set by archive and keep the big ones
//! findz group archive --refine "total_size > 1G" --sort size --desc
//!
//! # Cache maintenance
//! findz cache stats
//! findz cache clear
//!
//! # Effective settings after file and environment overrides
//! findz config
//! ```
//!
//! # Configuration
//!
//! Settings are read from `~/.config/findz/config.toml` on Linux when it
//! exists, and from `FINDZ_*` environment variables. Log verbosity follows
//! `FINDZ_LOG` (default `warn`).

use findz::{
    CachedSearch, FindzError,
    cli::{CacheCommands, Cli, Commands},
    config::FindzConfig,
    filter::{self, FilterExpression, StructuredFilter, format_size, presets},
    group::{self, RefineFilter},
    record::FileInfo,
    walk::{Walk, WalkStats},
};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

type Result<T> = std::result::Result<T, FindzError>;

fn init_logging() {
    let filter = EnvFilter::try_from_env("FINDZ_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// `archive//member` for archive members, the plain path otherwise
fn location(record: &FileInfo) -> String {
    if record.in_archive() {
        format!("{}//{}", record.archive, record.path)
    } else {
        record.path.clone()
    }
}

fn write_record(out: &mut impl Write, record: &FileInfo) -> io::Result<()> {
    writeln!(
        out,
        "{}\t{}\t{} {}\t{}",
        location(record),
        format_size(record.size),
        record.date(),
        record.time(),
        record.file_type
    )
}

/// Failure count and paths on stderr
fn report_failures(stats: &WalkStats) {
    if stats.errors == 0 {
        return;
    }
    eprintln!("{} entries could not be read:", stats.errors);
    for path in &stats.failed {
        eprintln!("  {}", path.display());
    }
}

/// Print the structured form of a filter, or its text when it has none
fn explain(expression: &FilterExpression) -> Result<()> {
    match StructuredFilter::from_expr(expression.expr()) {
        Ok(structured) => {
            let json = serde_json::to_string_pretty(&structured.to_json())
                .map_err(|e| FindzError::InvalidInput(e.to_string()))?;
            println!("{json}");
        }
        Err(e) => {
            println!("{expression}");
            eprintln!("{e}");
        }
    }
    Ok(())
}

fn handle_search(config: &FindzConfig, command: &Commands, no_cache: bool) -> Result<()> {
    let Commands::Search {
        filter: text,
        roots,
        follow_symlinks,
        no_archive,
        archives_only,
        workers,
        explain: explain_only,
        ..
    } = command
    else {
        return Err(FindzError::InvalidInput("not a search command".into()));
    };

    let expression = filter::compile_input(text)?;
    if *explain_only {
        return explain(&expression);
    }

    let mut params = config.walk_params(expression);
    params.follow_symlinks |= *follow_symlinks;
    params.no_archive = *no_archive;
    params.archives_only = *archives_only;
    if let Some(workers) = workers {
        params.workers = *workers;
    }
    params.selection = command.selection();

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    let stats = if let Some(cache) = config.search_cache(no_cache) {
        params.cache = Some(Arc::clone(&cache));
        let mut search = CachedSearch::new(roots.iter().cloned(), params, &cache);
        for record in search.by_ref() {
            write_record(&mut out, &record)?;
        }
        search.finish().stats
    } else {
        let mut walk = Walk::new(roots.iter().cloned(), params);
        for record in walk.by_ref() {
            write_record(&mut out, &record)?;
        }
        walk.stats().clone()
    };
    out.flush()?;
    report_failures(&stats);
    Ok(())
}

fn handle_group(config: &FindzConfig, command: &Commands, no_cache: bool) -> Result<()> {
    let Commands::Group {
        by,
        refine,
        sort,
        descending,
    } = command
    else {
        return Err(FindzError::InvalidInput("not a group command".into()));
    };

    let cache = config
        .search_cache(no_cache)
        .ok_or_else(|| FindzError::InvalidInput("Grouping reads the cached result set, which is unavailable".into()))?;
    let records = findz::load_cached(&cache)?
        .ok_or_else(|| FindzError::InvalidInput("No cached results. Run 'findz search' first.".into()))?;

    let mut buckets = group::group(&records, (*by).into());
    if let Some(text) = refine {
        let filter = RefineFilter::compile(text)?;
        buckets = group::refine(buckets, &filter)?;
    }
    if let Some(field) = sort {
        group::sort_buckets(&mut buckets, (*field).into(), *descending);
    }

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    writeln!(out, "key\tcount\ttotal\taverage")?;
    for bucket in &buckets {
        writeln!(out, "{bucket}")?;
    }
    out.flush()?;
    Ok(())
}

fn handle_presets() {
    for name in presets::names() {
        let text = presets::get(name)
            .map(|filter| filter.to_expr().to_string())
            .unwrap_or_default();
        println!("{name}\t{text}");
    }
}

fn handle_nested(roots: &[PathBuf], config: &FindzConfig, no_cache: bool) -> Result<()> {
    let options = findz::SearchOptions {
        follow_symlinks: config.follow_symlinks,
        workers: Some(config.workers),
        cache: config.search_cache(no_cache),
        ..findz::SearchOptions::default()
    };
    for container in findz::nested_archive_containers(roots.iter().cloned(), &options)? {
        println!("{container}");
    }
    Ok(())
}

fn handle_cache_command(config: &FindzConfig, command: CacheCommands) -> Result<()> {
    let cache = config.open_cache()?;
    match command {
        CacheCommands::Clear => {
            findz::clear_cache(&cache)?;
            println!("Cache cleared: {}", config.cache_dir.display());
        }
        CacheCommands::Stats => {
            let stats = cache.stats()?;
            println!("location\t{}", config.cache_dir.display());
            println!("archives\t{}", stats.archives);
            println!("members\t{}", stats.members);
            println!("archive bytes\t{}", format_size(stats.archive_bytes));
            println!("directories\t{}", stats.directories);
            println!("saved results\t{}", if stats.has_results { "yes" } else { "no" });
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse_args();
    let config = match &cli.config {
        Some(path) => FindzConfig::load_from(path)?,
        None => FindzConfig::load()?,
    };

    match &cli.command {
        command @ Commands::Search { .. } => handle_search(&config, command, cli.no_cache),
        command @ Commands::Group { .. } => handle_group(&config, command, cli.no_cache),
        Commands::Presets => {
            handle_presets();
            Ok(())
        }
        Commands::Nested { roots } => handle_nested(roots, &config, cli.no_cache),
        Commands::Cache { command } => handle_cache_command(&config, *command),
        Commands::Config => {
            let text = toml::to_string_pretty(&config)
                .map_err(|e| FindzError::InvalidInput(format!("Failed to serialize config: {e}")))?;
            print!("{text}");
            Ok(())
        }
    }
}
