//! dgit command-line client

mod output;

use anyhow::Result;
use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use dgit_core::{RepoError, Repository};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "dgit")]
#[command(author = "dgit Contributors")]
#[command(version = "0.1.0")]
#[command(about = "A small content-addressed version-control system")]
struct Cli {
    /// Working directory of the repository
    #[arg(short = 'C', long = "repo", global = true, default_value = ".")]
    repo: PathBuf,

    /// Log internal operations to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a repository in the working directory
    Init,

    /// Stage a file for the next commit
    Add { file: String },

    /// Record the staged changes
    Commit { message: String },

    /// Unstage a file, or stage its removal if tracked
    Rm { file: String },

    /// Show history of the current head
    Log,

    /// Show every commit ever made
    GlobalLog,

    /// Print ids of commits with the given message
    Find { message: String },

    /// Show branches, staged, removed, modified and untracked files
    Status,

    /// Create a branch at the current head
    Branch { name: String },

    /// Delete a branch pointer
    RmBranch { name: String },

    /// Move the current branch to a commit
    Reset { commit: String },

    /// Restore a file or switch branches:
    /// `checkout -- <file>`, `checkout <commit> -- <file>`, `checkout <branch>`
    Checkout {
        target: Option<String>,
        #[arg(last = true)]
        file: Option<String>,
    },

    /// Merge a branch into the current branch
    Merge { branch: String },

    /// Register another repository by path
    AddRemote { name: String, path: String },

    /// Forget a remote
    RmRemote { name: String },

    /// Send the current head to a remote branch
    Push { remote: String, branch: String },

    /// Copy a remote branch into `<remote>/<branch>`
    Fetch { remote: String, branch: String },

    /// Fetch, then merge `<remote>/<branch>`
    Pull { remote: String, branch: String },
}

fn main() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => match parse_error_message(&e) {
            Some(message) => {
                println!("{}", message);
                return Ok(());
            }
            None => e.exit(),
        },
    };

    init_logging(cli.verbose);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    run(cli, &mut out)
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::new("dgit=debug,dgit_core=debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// User-facing line for a rejected command line; `None` for help and version
/// output, which clap prints itself
fn parse_error_message(err: &clap::Error) -> Option<&'static str> {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => None,
        ErrorKind::InvalidSubcommand => Some("No command with that name exists."),
        _ => Some("Incorrect operands."),
    }
}

/// Run one command. Precondition failures are reported on `out` and are not
/// errors; anything else propagates.
fn run(cli: Cli, out: &mut impl Write) -> Result<()> {
    let Some(command) = cli.command else {
        writeln!(out, "Please enter a command.")?;
        return Ok(());
    };

    match execute(command, &cli.repo, out) {
        Ok(()) => Ok(()),
        Err(e) => match e.downcast_ref::<RepoError>() {
            Some(repo_err) if repo_err.is_precondition() => {
                tracing::debug!(error = ?repo_err, "command refused");
                writeln!(out, "{}", repo_err)?;
                Ok(())
            }
            _ => Err(e),
        },
    }
}

fn execute(command: Commands, root: &Path, out: &mut impl Write) -> Result<()> {
    if let Commands::Init = command {
        Repository::init(root)?;
        return Ok(());
    }

    let repo = Repository::open(root)?;
    match command {
        Commands::Init => {}

        Commands::Add { file } => repo.add(&file)?,

        Commands::Commit { message } => {
            repo.commit(&message)?;
        }

        Commands::Rm { file } => repo.rm(&file)?,

        Commands::Log => {
            for commit in repo.log()? {
                output::write_commit(out, &commit?)?;
            }
        }

        Commands::GlobalLog => {
            for commit in repo.global_log()? {
                output::write_commit(out, &commit)?;
            }
        }

        Commands::Find { message } => {
            for id in repo.find(&message)? {
                writeln!(out, "{}", id)?;
            }
        }

        Commands::Status => output::write_status(out, &repo.status()?)?,

        Commands::Branch { name } => repo.branch(&name)?,

        Commands::RmBranch { name } => repo.remove_branch(&name)?,

        Commands::Reset { commit } => {
            repo.reset(&commit)?;
        }

        Commands::Checkout { target, file } => match (target, file) {
            (None, Some(file)) => repo.checkout_file(&file)?,
            (Some(commit), Some(file)) => repo.checkout_file_from(&commit, &file)?,
            (Some(branch), None) => repo.checkout_branch(&branch)?,
            (None, None) => writeln!(out, "Incorrect operands.")?,
        },

        Commands::Merge { branch } => {
            let outcome = repo.merge(&branch)?;
            if let Some(message) = output::merge_message(&outcome) {
                writeln!(out, "{}", message)?;
            }
        }

        Commands::AddRemote { name, path } => repo.add_remote(&name, &path)?,

        Commands::RmRemote { name } => repo.remove_remote(&name)?,

        Commands::Push { remote, branch } => {
            repo.push(&remote, &branch)?;
        }

        Commands::Fetch { remote, branch } => {
            repo.fetch(&remote, &branch)?;
        }

        Commands::Pull { remote, branch } => {
            let outcome = repo.pull(&remote, &branch)?;
            if let Some(message) = output::merge_message(&outcome) {
                writeln!(out, "{}", message)?;
            }
        }
    }

    Ok(())
}
