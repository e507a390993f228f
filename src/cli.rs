use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use crate::{config::DEFAULT_MAX_FILE_SIZE_MB, search::DEFAULT_MAX_RESULTS};

#[derive(Debug, Parser)]
#[command(
    name = "docseek",
    version,
    about = "Index local documents and search them from the terminal"
)]
pub struct Cli {
    /// Directory holding the search index
    #[arg(long, global = true)]
    pub index_dir: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract and index a file or directory
    Index(IndexArgs),
    /// Search indexed documents
    #[command(after_help = "Snippets and matched pages are built from the \
        first DOCSEEK_PREVIEW_LENGTH characters of each file (default 100000); \
        matches past that point are not listed.")]
    Search(SearchArgs),
    /// List indexed documents
    List(ListArgs),
    /// Show index statistics
    Stats(StatsArgs),
    /// Extract a single file and print its text, without indexing it
    Read(ReadArgs),
    /// Remove every document from the index
    Clear(ClearArgs),
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

#[derive(Debug, Parser)]
pub struct IndexArgs {
    /// File or directory to index
    pub path: PathBuf,

    /// Descend into subdirectories
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub recursive: bool,

    /// Skip files larger than this many megabytes (0 disables the limit)
    #[arg(long, value_name = "MB", default_value_t = DEFAULT_MAX_FILE_SIZE_MB)]
    pub max_size: u64,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IndexArgs {
    /// Size limit in bytes.
    pub fn max_file_size(&self) -> Option<u64> {
        (self.max_size > 0).then(|| self.max_size.saturating_mul(1024 * 1024))
    }
}

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// Search query
    pub query: String,

    /// Maximum number of results
    #[arg(short = 'n', long, default_value_t = DEFAULT_MAX_RESULTS)]
    pub max_results: usize,

    /// Drop results scoring below this threshold
    #[arg(long, default_value_t = 0.0)]
    pub min_score: f32,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct ListArgs {
    /// Maximum number of documents to list
    #[arg(short = 'n', long, default_value_t = 100)]
    pub max_results: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct StatsArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct ReadArgs {
    /// File to extract
    pub path: PathBuf,

    /// Print at most this many characters of content
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct ClearArgs {
    /// Do not ask for confirmation
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "docseek",
            &mut std::io::stdout(),
        );
    }
}
