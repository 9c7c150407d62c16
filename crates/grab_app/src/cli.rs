use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "instagrab", version, about = "Download Instagram posts, reels and stories")]
pub struct Cli {
    /// Directory holding the download history.
    #[arg(long, global = true, default_value = ".instagrab")]
    pub data_dir: PathBuf,

    /// Also write the log to this file.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Log debug output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Resolve URLs and download their media.
    Get(GetArgs),
    /// Resolve URLs and print the media they contain.
    Resolve(SourceArgs),
    /// Show or clear the download history.
    History(HistoryArgs),
}

#[derive(Debug, Args)]
pub struct SourceArgs {
    /// Post, reel or story URLs.
    pub urls: Vec<String>,

    /// Read more URLs from a file, one per line.
    #[arg(long)]
    pub from_file: Option<PathBuf>,

    /// Print JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct GetArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Where archives and files are saved.
    #[arg(short, long, default_value = ".")]
    pub out: PathBuf,

    /// Archive name; defaults to the post id.
    #[arg(long)]
    pub name: Option<String>,

    /// Save every item as its own file instead of one archive.
    #[arg(long)]
    pub individual: bool,
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Remove every entry.
    #[arg(long)]
    pub clear: bool,

    /// Print JSON instead of text.
    #[arg(long)]
    pub json: bool,
}
