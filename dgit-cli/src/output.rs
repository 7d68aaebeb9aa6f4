//! Text rendering for command output

use std::io::{self, Write};

use dgit_core::{Commit, MergeOutcome, Status};

/// One `log` / `global-log` entry, trailing blank line included
pub fn write_commit(out: &mut impl Write, commit: &Commit) -> io::Result<()> {
    writeln!(out, "===")?;
    writeln!(out, "commit {}", commit.id())?;
    if commit.is_merge() {
        let mut parents = commit.parents().map(|id| id.short());
        if let (Some(first), Some(second)) = (parents.next(), parents.next()) {
            writeln!(out, "Merge: {} {}", first, second)?;
        }
    }
    writeln!(out, "Date: {}", commit.timestamp())?;
    writeln!(out, "{}", commit.message())?;
    writeln!(out)
}

pub fn write_status(out: &mut impl Write, status: &Status) -> io::Result<()> {
    writeln!(out, "=== Branches ===")?;
    for branch in &status.branches {
        if *branch == status.current_branch {
            writeln!(out, "*{}", branch)?;
        } else {
            writeln!(out, "{}", branch)?;
        }
    }
    writeln!(out)?;

    write_section(out, "Staged Files", &status.tree.staged)?;
    write_section(out, "Removed Files", &status.tree.removed)?;

    writeln!(out, "=== Modifications Not Staged For Commit ===")?;
    for (name, change) in &status.tree.not_staged {
        writeln!(out, "{} ({})", name, change)?;
    }
    writeln!(out)?;

    write_section(out, "Untracked Files", &status.tree.untracked)
}

fn write_section(out: &mut impl Write, title: &str, names: &[String]) -> io::Result<()> {
    writeln!(out, "=== {} ===", title)?;
    for name in names {
        writeln!(out, "{}", name)?;
    }
    writeln!(out)
}

/// Line printed after `merge` or `pull`, if any
pub fn merge_message(outcome: &MergeOutcome) -> Option<&'static str> {
    match outcome {
        MergeOutcome::GivenBranchIsAncestor => {
            Some("Given branch is an ancestor of the current branch.")
        }
        MergeOutcome::FastForwarded => Some("Current branch fast-forwarded."),
        MergeOutcome::Merged {
            conflicted: true, ..
        } => Some("Encountered a merge conflict."),
        MergeOutcome::Merged { .. } => None,
    }
}
