//! Command-line interface definitions and parsing
//!
//! # Commands
//!
//! - **search**: walk roots with a filter and print matches (default alias `s`)
//! - **group**: bucket the last cached result set and print aggregates
//! - **presets**: list the named filters
//! - **nested**: list archives that contain other archives
//! - **cache**: clear the cache or print its statistics
//! - **config**: print the effective configuration as TOML

use crate::archive::ArchiveSelection;
use crate::group::{GroupKey, SortField};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Field a `group` run buckets by
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    Archive,
    Ext,
    Dir,
}

impl From<GroupBy> for GroupKey {
    fn from(by: GroupBy) -> Self {
        match by {
            GroupBy::Archive => Self::Archive,
            GroupBy::Ext => Self::Ext,
            GroupBy::Dir => Self::Directory,
        }
    }
}

/// Bucket sort order
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    Name,
    Count,
    Size,
    Avg,
}

impl From<SortBy> for SortField {
    fn from(by: SortBy) -> Self {
        match by {
            SortBy::Name => Self::Name,
            SortBy::Count => Self::Count,
            SortBy::Size => Self::TotalSize,
            SortBy::Avg => Self::AvgSize,
        }
    }
}

/// How `--include`/`--exclude` extension lists apply to archives
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectMode {
    /// Filter each member by its own extension
    #[default]
    Member,
    /// Keep or skip whole archives
    Archive,
}

#[derive(Parser, Debug)]
#[command(name = "findz")]
#[command(about = "Find files with a SQL-like filter, inside archives too", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file instead of the default location
    #[arg(long = "config", value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Do not read or write the cache
    #[arg(long = "no-cache", global = true)]
    pub no_cache: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Search roots with a filter, preset name or JSON document
    #[command(visible_alias = "s")]
    Search {
        /// Filter text, e.g. "size > 10M and ext = 'zip'"
        #[arg(value_name = "FILTER")]
        filter: String,

        /// Roots to search
        #[arg(value_name = "PATH", default_value = ".")]
        roots: Vec<PathBuf>,

        #[arg(short = 'L', long = "follow")]
        follow_symlinks: bool,

        /// Do not look inside archives
        #[arg(short = 'n', long = "no-archive", conflicts_with = "archives_only")]
        no_archive: bool,

        /// Report archive files only
        #[arg(short = 'a', long = "archives-only")]
        archives_only: bool,

        /// Archive worker threads
        #[arg(short = 'j', long = "workers", value_name = "N")]
        workers: Option<usize>,

        /// Member extensions to keep
        #[arg(long = "include", value_name = "EXT", value_delimiter = ',')]
        include: Vec<String>,

        /// Member extensions to drop
        #[arg(long = "exclude", value_name = "EXT", value_delimiter = ',')]
        exclude: Vec<String>,

        #[arg(long = "select", value_enum, default_value_t = SelectMode::Member)]
        select: SelectMode,

        /// Print the compiled filter as JSON and exit
        #[arg(long = "explain")]
        explain: bool,
    },

    /// Group the last cached result set
    #[command(visible_alias = "g")]
    Group {
        #[arg(value_enum)]
        by: GroupBy,

        /// Filter over buckets, e.g. "count > 10 and avg_size > 1M"
        #[arg(short = 'r', long = "refine", value_name = "FILTER")]
        refine: Option<String>,

        #[arg(short = 's', long = "sort", value_enum)]
        sort: Option<SortBy>,

        #[arg(long = "desc", requires = "sort")]
        descending: bool,
    },

    /// List the named filters
    Presets,

    /// List archives that contain other archives
    Nested {
        #[arg(value_name = "PATH", default_value = ".")]
        roots: Vec<PathBuf>,
    },

    /// Manage the cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },

    /// Print the effective configuration
    Config,
}

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum CacheCommands {
    /// Remove every cached entry
    Clear,
    /// Show what the cache holds
    Stats,
}

impl Commands {
    /// Archive selection of a `search` command, empty for other commands
    #[must_use]
    pub fn selection(&self) -> ArchiveSelection {
        match self {
            Self::Search {
                include,
                exclude,
                select,
                ..
            } => match select {
                SelectMode::Member => ArchiveSelection::per_member(include, exclude),
                SelectMode::Archive => ArchiveSelection::whole_archive(include, exclude),
            },
            _ => ArchiveSelection::default(),
        }
    }
}

impl Cli {
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::SelectionStrategy;

    #[test]
    fn test_parse_search_defaults() {
        let cli = Cli::try_parse_from(["findz", "search", "size > 1K"]).unwrap();
        match cli.command {
            Commands::Search {
                filter,
                roots,
                no_archive,
                workers,
                ..
            } => {
                assert_eq!(filter, "size > 1K");
                assert_eq!(roots, vec![PathBuf::from(".")]);
                assert!(!no_archive);
                assert!(workers.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert!(!cli.no_cache);
    }

    #[test]
    fn test_parse_search_alias_and_flags() {
        let cli = Cli::try_parse_from(["findz", "s", "-a", "-j", "2", "images", "/a", "/b"]).unwrap();
        match cli.command {
            Commands::Search {
                roots,
                archives_only,
                workers,
                ..
            } => {
                assert_eq!(roots.len(), 2);
                assert!(archives_only);
                assert_eq!(workers, Some(2));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_no_archive_conflicts_with_archives_only() {
        assert!(Cli::try_parse_from(["findz", "search", "-n", "-a", "x"]).is_err());
    }

    #[test]
    fn test_selection_from_flags() {
        let cli = Cli::try_parse_from([
            "findz", "search", "--include", "jpg,.PNG", "--select", "archive", "x",
        ])
        .unwrap();
        let selection = cli.command.selection();
        assert_eq!(selection.strategy, SelectionStrategy::WholeArchive);
        assert_eq!(selection.include(), ["jpg", "png"]);
        assert!(selection.exclude().is_empty());
    }

    #[test]
    fn test_parse_group() {
        let cli = Cli::try_parse_from(["findz", "group", "ext", "-r", "count > 1", "-s", "size", "--desc"]).unwrap();
        match cli.command {
            Commands::Group {
                by,
                refine,
                sort,
                descending,
            } => {
                assert_eq!(GroupKey::from(by), GroupKey::Ext);
                assert_eq!(refine.as_deref(), Some("count > 1"));
                assert_eq!(sort.map(SortField::from), Some(SortField::TotalSize));
                assert!(descending);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_config_with_file() {
        let cli = Cli::try_parse_from(["findz", "config", "--config", "/tmp/f.toml"]).unwrap();
        assert!(matches!(cli.command, Commands::Config));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/f.toml")));
    }

    #[test]
    fn test_parse_cache_commands() {
        let cli = Cli::try_parse_from(["findz", "--no-cache", "cache", "stats"]).unwrap();
        assert!(cli.no_cache);
        assert!(matches!(
            cli.command,
            Commands::Cache {
                command: CacheCommands::Stats
            }
        ));
    }
}
