use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Verbose diagnostics (debug level on stderr and in the log file).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Merge the whole book into `baked.md`.
    Bake(BakeArgs),
    /// Print the chapter files listed by `Contents.md`, in order.
    Files(FilesArgs),
    /// Print one file with its links rewritten to anchors.
    Rewrite(RewriteArgs),
}

#[derive(Debug, Args)]
pub struct BakeArgs {
    /// Book root directory (holds `title.md`, `Contents.md`, ...).
    #[arg(long, default_value = ".")]
    pub root: String,

    /// Do not ask for confirmation before starting.
    #[arg(long, short)]
    pub yes: bool,
}

#[derive(Debug, Args)]
pub struct FilesArgs {
    /// Book root directory.
    #[arg(long, default_value = ".")]
    pub root: String,
}

#[derive(Debug, Args)]
pub struct RewriteArgs {
    /// Markdown file to rewrite.
    pub file: String,

    /// Also point `#index` / `#citex` links at the index anchors.
    #[arg(long)]
    pub contents: bool,
}
