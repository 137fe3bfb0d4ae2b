//! cli::args
//!
//! The `pk` command surface, grounded in the teacher's `cli::args::Cli`
//! (global flags via `clap::Parser`, plus a `#[command(subcommand)]`)
//! rewritten for pancake's verb set (spec §6).

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell as ClapShell;

#[derive(Parser, Debug)]
#[command(name = "pk", about = "Stack Engine for stacked pull requests", version)]
pub struct Cli {
    /// Run as if pk was started in this directory.
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Verbose span output; equivalent to PANCAKE_DEBUG=1.
    #[arg(long, global = true)]
    pub debug: bool,

    /// Suppress non-essential output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize pancake tracking in the current repository.
    Init,

    /// Branch management.
    #[command(alias = "b")]
    Branch {
        #[command(subcommand)]
        action: BranchAction,
    },

    /// Move up the stack toward its tip.
    Up {
        #[arg(default_value_t = 1)]
        n: usize,
    },
    /// Move down the stack toward trunk.
    Down {
        #[arg(default_value_t = 1)]
        n: usize,
    },
    /// Jump to the top of the current stack.
    Top,
    /// Jump to the bottom of the current stack.
    Bottom,

    /// Print the stack as a tree.
    Log {
        #[arg(long)]
        all: bool,
        #[arg(long)]
        short: bool,
    },

    /// Bring the current stack up to date with trunk and the remote.
    Sync {
        #[arg(long)]
        all: bool,
        #[arg(long = "from-main")]
        from_main: bool,
        #[arg(long)]
        r#continue: bool,
        #[arg(long)]
        abort: bool,
    },

    /// Rebase the current branch's descendants onto their parents' heads.
    Restack,

    /// Commit staged changes on the current branch.
    Commit {
        #[arg(short = 'm', long)]
        message: Option<String>,
        #[arg(long)]
        amend: bool,
        #[arg(short = 'a', long = "all")]
        all: bool,
    },

    /// Amend the current branch's tip commit.
    Amend,

    /// Re-parent a branch onto a different base.
    Move {
        #[arg(long)]
        to: String,
        #[arg(long)]
        from: Option<String>,
    },

    /// Push branches and open/update pull requests.
    Submit {
        #[arg(long)]
        all: bool,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        draft: bool,
        #[arg(long = "no-edit")]
        no_edit: bool,
    },

    /// Pull request inspection.
    Pr {
        #[command(subcommand)]
        action: PrAction,
    },

    /// Merge the current stack's pull requests.
    Land {
        #[arg(long)]
        squash: bool,
        #[arg(long)]
        merge: bool,
        #[arg(long)]
        rebase: bool,
        #[arg(long)]
        all: bool,
    },

    /// Print the full tracked stack.
    Stack,
    /// Print the stack as a graph.
    Graph,

    /// Push local branches to the remote.
    Push {
        #[arg(long)]
        all: bool,
        #[arg(long = "no-pr")]
        no_pr: bool,
    },

    /// Fetch and fast-forward trunk from the remote.
    Pull,
    /// Fetch from the remote without updating local refs.
    Fetch,

    /// Undo the most recently committed operation.
    Undo,
    /// Redo the most recently undone operation (does not survive an
    /// intervening unrelated operation).
    Redo,

    /// Generate shell completions.
    Completions { shell: Shell },
}

#[derive(Subcommand, Debug)]
pub enum BranchAction {
    /// Create a new branch on top of the current one.
    #[command(alias = "bc")]
    Create {
        name: String,
        #[arg(long)]
        base: Option<String>,
        #[arg(long = "insert-before")]
        insert_before: Option<String>,
        #[arg(long = "insert-after")]
        insert_after: Option<String>,
        #[arg(long)]
        force: bool,
    },
    /// Rename the current (or given) branch.
    #[command(alias = "br")]
    Rename { name: String, new_name: String },
    /// Delete a tracked branch, re-parenting its children.
    #[command(alias = "bd")]
    Delete {
        name: String,
        #[arg(long)]
        force: bool,
    },
    /// Check out a tracked branch by fuzzy name.
    #[command(alias = "co")]
    Checkout { query: String },
    /// Exclude a branch from automatic restack propagation.
    Freeze {
        name: Option<String>,
        #[arg(long)]
        downstack: bool,
    },
    /// Re-include a frozen branch in automatic restack propagation.
    Thaw { name: Option<String> },
}

#[derive(Subcommand, Debug)]
pub enum PrAction {
    /// Show the PR bound to the current (or given) branch.
    Status { name: Option<String> },
    /// List every tracked branch's PR.
    List,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

impl From<Shell> for ClapShell {
    fn from(shell: Shell) -> Self {
        match shell {
            Shell::Bash => ClapShell::Bash,
            Shell::Zsh => ClapShell::Zsh,
            Shell::Fish => ClapShell::Fish,
            Shell::PowerShell => ClapShell::PowerShell,
            Shell::Elvish => ClapShell::Elvish,
        }
    }
}
