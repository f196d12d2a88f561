use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "prep", about = concat!("prepdeck v", env!("CARGO_PKG_VERSION"), " - interview problems by company"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Use a different config file
    #[arg(short = 'C', long = "config", global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List companies in the problem data
    Companies,
    /// List timeframes, for one company or across all of them
    Timeframes(TimeframesArgs),
    /// List topics of a partition
    Topics(SelectionArgs),
    /// Query problems
    List(ListArgs),
    /// Show dashboard metrics for a query
    Stats(StatsArgs),
    /// Mark a problem as done
    Track(IdArgs),
    /// Mark a problem as not done
    Untrack(IdArgs),
    /// Flip a problem's done flag
    Toggle(IdArgs),
    /// List tracked problem ids
    Tracked,
    /// Forget all tracked problems
    ClearTracked,
    /// Sign in as the configured profile
    SignIn,
    /// Sign out; progress stays on this device
    SignOut,
    /// Reconcile local and remote progress
    Sync,
    /// Show the top users by tracked problems
    Leaderboard,
    /// Set the default company and timeframe
    Use(UseArgs),
}

// ---------------------------------------------------------------------------
// Selection and filters
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct SelectionArgs {
    /// Company (defaults to the configured one)
    #[arg(long)]
    pub company: Option<String>,
    /// Timeframe (defaults to the configured one, then the company's first)
    #[arg(long)]
    pub timeframe: Option<String>,
    /// Every company, with duplicates removed
    #[arg(long, conflicts_with_all = ["company", "timeframe"])]
    pub all: bool,
}

#[derive(Args)]
pub struct FilterArgs {
    /// Match titles and topics containing this text
    #[arg(long)]
    pub search: Option<String>,
    /// Keep only this difficulty (repeatable: easy, medium, hard)
    #[arg(long = "difficulty", value_name = "LEVEL")]
    pub difficulties: Vec<String>,
    /// Require this topic (repeatable; all must match)
    #[arg(long = "topic", value_name = "TOPIC")]
    pub topics: Vec<String>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum SortKey {
    Title,
    Difficulty,
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct TimeframesArgs {
    /// Company to list timeframes for
    pub company: Option<String>,
}

#[derive(Args)]
pub struct ListArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,
    #[command(flatten)]
    pub filters: FilterArgs,
    /// Sort field
    #[arg(long, value_enum, default_value = "title")]
    pub sort: SortKey,
    /// Sort descending
    #[arg(long)]
    pub desc: bool,
    /// Maximum rows to show (0 = no limit)
    #[arg(long, default_value_t = 50)]
    pub limit: usize,
}

#[derive(Args)]
pub struct StatsArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,
    #[command(flatten)]
    pub filters: FilterArgs,
}

// ---------------------------------------------------------------------------
// Write commands
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct IdArgs {
    /// Problem id, as shown by `prep list`
    pub id: String,
}

#[derive(Args)]
pub struct UseArgs {
    /// Company name
    pub company: String,
    /// Timeframe (omit to use the company's first)
    pub timeframe: Option<String>,
}
