//! Repository integration tests: staging, commits, history and branches

use std::fs;

use dgit_core::{Change, Commit, ObjectId, RepoError, Repository};
use tempfile::TempDir;

fn setup() -> (TempDir, Repository) {
    let temp_dir = TempDir::new().unwrap();
    let repo = Repository::init(temp_dir.path()).unwrap();
    (temp_dir, repo)
}

fn write(repo: &Repository, name: &str, data: &str) {
    fs::write(repo.root().join(name), data).unwrap();
}

fn read(repo: &Repository, name: &str) -> String {
    fs::read_to_string(repo.root().join(name)).unwrap()
}

fn commit_file(repo: &Repository, name: &str, data: &str, message: &str) -> ObjectId {
    write(repo, name, data);
    repo.add(name).unwrap();
    repo.commit(message).unwrap()
}

#[test]
fn test_branch_checkout_roundtrip() {
    let (_temp_dir, repo) = setup();
    commit_file(&repo, "a.txt", "hi", "first");
    repo.branch("feat").unwrap();
    repo.checkout_branch("feat").unwrap();
    commit_file(&repo, "a.txt", "bye", "second");

    let messages: Vec<String> = repo
        .log()
        .unwrap()
        .map(|c| c.unwrap().message().to_string())
        .collect();
    assert_eq!(messages, vec!["second", "first", "initial commit"]);

    let feat_entries = repo
        .log()
        .unwrap()
        .filter(|c| c.as_ref().unwrap().message() != "initial commit")
        .count();
    assert_eq!(feat_entries, 2);

    repo.checkout_branch("master").unwrap();
    assert_eq!(read(&repo, "a.txt"), "hi");
    repo.checkout_branch("feat").unwrap();
    assert_eq!(read(&repo, "a.txt"), "bye");
}

#[test]
fn test_snapshots_are_cumulative_and_immutable() {
    let (_temp_dir, repo) = setup();
    let first = commit_file(&repo, "a.txt", "a", "add a");
    let second = commit_file(&repo, "b.txt", "b", "add b");

    repo.rm("a.txt").unwrap();
    assert!(!repo.root().join("a.txt").exists());
    let third = repo.commit("remove a").unwrap();

    let first = repo.commits().get(first).unwrap();
    let second = repo.commits().get(second).unwrap();
    let third = repo.commits().get(third).unwrap();

    assert_eq!(first.blobs().keys().collect::<Vec<_>>(), vec!["a.txt"]);
    assert_eq!(
        second.blobs().keys().collect::<Vec<_>>(),
        vec!["a.txt", "b.txt"]
    );
    assert_eq!(third.blobs().keys().collect::<Vec<_>>(), vec!["b.txt"]);
    assert_eq!(third.parent(), Some(second.id()));
    assert_eq!(second.compute_id().unwrap(), second.id());
}

#[test]
fn test_rm_with_nothing_to_remove_leaves_index() {
    let (_temp_dir, repo) = setup();
    commit_file(&repo, "tracked.txt", "t", "track");
    write(&repo, "staged.txt", "s");
    repo.add("staged.txt").unwrap();
    write(&repo, "loose.txt", "?");

    let before = repo.index().unwrap();
    let err = repo.rm("loose.txt").unwrap_err();
    assert!(matches!(err, RepoError::NothingToRemove(_)));
    assert_eq!(err.to_string(), "No reason to remove the file.");
    assert_eq!(repo.index().unwrap(), before);
    assert_eq!(read(&repo, "loose.txt"), "?");
}

#[test]
fn test_index_survives_reopen() {
    let (temp_dir, repo) = setup();
    commit_file(&repo, "a.txt", "a", "add a");
    write(&repo, "b.txt", "b");
    repo.add("b.txt").unwrap();
    repo.rm("a.txt").unwrap();
    drop(repo);

    let repo = Repository::open(temp_dir.path()).unwrap();
    let index = repo.index().unwrap();
    assert!(index.is_staged("b.txt"));
    assert!(index.is_removed("a.txt"));
}

#[test]
fn test_global_log_and_find() {
    let (_temp_dir, repo) = setup();
    let a = commit_file(&repo, "a.txt", "1", "same message");
    repo.branch("side").unwrap();
    let b = commit_file(&repo, "a.txt", "2", "same message");
    repo.checkout_branch("side").unwrap();
    let c = commit_file(&repo, "c.txt", "3", "side work");

    let all: Vec<ObjectId> = repo.global_log().unwrap().iter().map(Commit::id).collect();
    assert_eq!(all.len(), 4);
    for id in [a, b, c, Commit::root().unwrap().id()] {
        assert!(all.contains(&id));
    }

    let mut found = repo.find("same message").unwrap();
    found.sort();
    let mut expected = vec![a, b];
    expected.sort();
    assert_eq!(found, expected);
    assert!(matches!(
        repo.find("never written"),
        Err(RepoError::NoCommitWithMessage(_))
    ));
}

#[test]
fn test_reset_guard_refuses_untracked_overwrite() {
    let (_temp_dir, repo) = setup();
    let with_file = commit_file(&repo, "a.txt", "committed", "add a");
    repo.rm("a.txt").unwrap();
    let without = repo.commit("drop a").unwrap();
    write(&repo, "a.txt", "untracked now");

    assert!(matches!(
        repo.reset(&with_file.to_hex()),
        Err(RepoError::WouldOverwriteUntracked(_))
    ));
    assert_eq!(repo.head().unwrap(), without);
    assert_eq!(read(&repo, "a.txt"), "untracked now");
}

#[test]
fn test_status_report() {
    let (_temp_dir, repo) = setup();
    commit_file(&repo, "kept.txt", "k", "base");
    commit_file(&repo, "edited.txt", "v1", "more");
    commit_file(&repo, "doomed.txt", "d", "even more");
    repo.branch("other").unwrap();

    write(&repo, "edited.txt", "v2");
    fs::remove_file(repo.root().join("kept.txt")).unwrap();
    repo.rm("doomed.txt").unwrap();
    write(&repo, "new.txt", "n");
    repo.add("new.txt").unwrap();
    write(&repo, "stray.txt", "s");

    let status = repo.status().unwrap();
    assert_eq!(status.current_branch, "master");
    assert_eq!(status.branches, vec!["master", "other"]);
    assert_eq!(status.tree.staged, vec!["new.txt"]);
    assert_eq!(status.tree.removed, vec!["doomed.txt"]);
    assert_eq!(
        status.tree.not_staged,
        vec![
            ("edited.txt".to_string(), Change::Modified),
            ("kept.txt".to_string(), Change::Deleted),
        ]
    );
    assert_eq!(status.tree.untracked, vec!["stray.txt"]);
}

#[test]
fn test_operations_before_init() {
    let temp_dir = TempDir::new().unwrap();
    let err = Repository::open(temp_dir.path()).unwrap_err();
    assert_eq!(err.to_string(), "Not in an initialized dgit directory.");
}
