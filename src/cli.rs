use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
};

use clap::{ArgAction, Parser, Subcommand};

use folio::{
    blog::PostStatus,
    view::{ReviewFilter, SortMode},
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to ~/.config/folio/config.toml when present)
    #[arg(long, global = true, env = "FOLIO_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory holding persisted preferences, reviews and local posts
    #[arg(long, global = true, env = "FOLIO_STATE_DIR", value_name = "DIR")]
    pub state_dir: Option<PathBuf>,

    /// More logging (-v debug, -vv trace); RUST_LOG wins when set
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Browse and review publications
    #[command(subcommand)]
    Pubs(PubsCommand),
    /// Read and author blog posts
    #[command(subcommand)]
    Blog(BlogCommand),
    /// Show or switch the colour theme
    Theme {
        #[command(subcommand)]
        action: Option<ThemeAction>,
    },
}

#[derive(Subcommand, Debug)]
pub enum PubsCommand {
    /// List publications merged from the local file and PubMed
    List {
        /// Case-insensitive text to look for
        #[arg(short, long, default_value = "")]
        search: String,
        #[arg(long, value_enum, default_value_t)]
        sort: SortMode,
        #[arg(long, value_enum, default_value_t)]
        filter: ReviewFilter,
        /// Only this publication year
        #[arg(long)]
        year: Option<i32>,
        /// Skip PubMed and use the local file alone
        #[arg(long)]
        offline: bool,
    },
    /// Accept the publication with the given identity key
    Accept {
        key: String,
        #[arg(long)]
        offline: bool,
    },
    /// Reject the publication with the given identity key
    Reject {
        key: String,
        #[arg(long)]
        offline: bool,
    },
    /// Forget the decision for the given identity key
    Undo {
        key: String,
        #[arg(long)]
        offline: bool,
    },
    /// Forget every review decision
    ClearReviews {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum BlogCommand {
    /// List posts (drafts too in admin mode)
    List {
        #[arg(long)]
        admin: bool,
    },
    /// Create a post, or update one with --edit
    Save {
        /// Id of the post to update
        #[arg(long, value_name = "ID")]
        edit: Option<String>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        content: Option<String>,
        #[arg(long, value_enum)]
        status: Option<PostStatus>,
        #[arg(long)]
        admin: bool,
    },
    /// Delete a locally stored post
    Delete {
        id: String,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
        #[arg(long)]
        admin: bool,
    },
    /// Leave admin mode
    Logout,
}

#[derive(Subcommand, Debug, Clone, Copy, Default)]
pub enum ThemeAction {
    /// Print the current theme
    #[default]
    Show,
    /// Switch between light and dark
    Toggle,
}

/// Ask a yes/no question on stderr. Anything but an explicit yes (including EOF) is a no.
pub fn confirm(question: &str) -> anyhow::Result<bool> {
    eprint!("{question} [y/N] ");
    io::stderr().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
