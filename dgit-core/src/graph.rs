//! Commit graph
//!
//! Commits reference their parents by id only; every traversal here goes
//! back through the commit store. Searches use an explicit queue and visited
//! set so history depth never turns into stack depth.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::{RepoError, RepoResult};
use crate::object::{Commit, HEX_LEN, ObjectId};
use crate::storage::{LooseStore, ObjectStore, RecordStore, StorageError};

/// Read/write access to the commit namespace of a repository
#[derive(Debug, Clone)]
pub struct CommitGraph {
    store: LooseStore,
}

impl CommitGraph {
    pub fn new(store: LooseStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &LooseStore {
        &self.store
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.store.exists(id)
    }

    pub fn get(&self, id: ObjectId) -> RepoResult<Commit> {
        Ok(self.store.get_record(id)?)
    }

    /// Like [`get`](Self::get) but a missing commit is `None`
    pub fn try_get(&self, id: ObjectId) -> RepoResult<Option<Commit>> {
        match self.store.get_record(id) {
            Ok(commit) => Ok(Some(commit)),
            Err(StorageError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Persist a commit under its id. Writing the same commit twice is a no-op.
    pub fn write(&self, commit: &Commit) -> RepoResult<ObjectId> {
        let id = commit.id();
        self.store
            .insert(id, &commit.to_bytes().map_err(StorageError::from)?)?;
        Ok(id)
    }

    /// Resolve a full or abbreviated commit id
    pub fn resolve(&self, abbrev: &str) -> RepoResult<ObjectId> {
        let abbrev = abbrev.trim();
        if abbrev.is_empty() || !abbrev.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(RepoError::NoSuchCommit(abbrev.to_string()));
        }
        if abbrev.len() == HEX_LEN {
            let id = abbrev
                .parse()
                .map_err(|_| RepoError::NoSuchCommit(abbrev.to_string()))?;
            return if self.contains(id) {
                Ok(id)
            } else {
                Err(RepoError::NoSuchCommit(abbrev.to_string()))
            };
        }

        let mut matches = self
            .store
            .list()?
            .into_iter()
            .filter(|id| id.matches_prefix(abbrev));
        match (matches.next(), matches.next()) {
            (Some(id), None) => Ok(id),
            (None, _) => Err(RepoError::NoSuchCommit(abbrev.to_string())),
            (Some(_), Some(_)) => Err(RepoError::AmbiguousId(abbrev.to_string())),
        }
    }

    /// First-parent history starting at `start`
    pub fn log(&self, start: ObjectId) -> Log<'_> {
        Log {
            graph: self,
            next: Some(start),
        }
    }

    /// Every stored commit, in id order
    pub fn all(&self) -> RepoResult<Vec<Commit>> {
        self.store
            .list()?
            .into_iter()
            .map(|id| self.get(id))
            .collect()
    }

    /// Ids of all commits whose message is exactly `message`
    pub fn find(&self, message: &str) -> RepoResult<Vec<ObjectId>> {
        let ids: Vec<ObjectId> = self
            .all()?
            .into_iter()
            .filter(|commit| commit.message() == message)
            .map(|commit| commit.id())
            .collect();
        if ids.is_empty() {
            return Err(RepoError::NoCommitWithMessage(message.to_string()));
        }
        Ok(ids)
    }

    /// Distance (in edges) from `start` to each of its ancestors, itself
    /// included at 0. Follows both parent links; missing commits end a path.
    pub fn ancestors(&self, start: ObjectId) -> RepoResult<HashMap<ObjectId, usize>> {
        let mut depth = HashMap::from([(start, 0usize)]);
        let mut queue = VecDeque::from([start]);
        while let Some(id) = queue.pop_front() {
            let Some(commit) = self.try_get(id)? else {
                continue;
            };
            let next = depth[&id] + 1;
            for parent in commit.parents() {
                if !depth.contains_key(&parent) {
                    depth.insert(parent, next);
                    queue.push_back(parent);
                }
            }
        }
        Ok(depth)
    }

    /// Whether `ancestor` is reachable from `descendant` (or equal to it)
    pub fn is_ancestor(&self, ancestor: ObjectId, descendant: ObjectId) -> RepoResult<bool> {
        let mut visited = HashSet::from([descendant]);
        let mut queue = VecDeque::from([descendant]);
        while let Some(id) = queue.pop_front() {
            if id == ancestor {
                return Ok(true);
            }
            let Some(commit) = self.try_get(id)? else {
                continue;
            };
            for parent in commit.parents() {
                if visited.insert(parent) {
                    queue.push_back(parent);
                }
            }
        }
        Ok(false)
    }

    /// Whether `ancestor` lies on the first-parent chain of `descendant`
    /// (or is `descendant` itself). Second parents are not followed.
    pub fn in_first_parent_history(
        &self,
        ancestor: ObjectId,
        descendant: ObjectId,
    ) -> RepoResult<bool> {
        for commit in self.log(descendant) {
            if commit?.id() == ancestor {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Lowest common ancestor of two commits
    ///
    /// Phase one records every ancestor of `current`. Phase two walks
    /// breadth-first from `other` and stops each path at the first commit
    /// found in that set. Of the commits where paths stopped, the ones that
    /// are an ancestor of another are dropped; if several remain (criss-cross
    /// history) the one closest to both tips wins, ties broken by id, so the
    /// result does not depend on argument order.
    pub fn split_point(&self, current: ObjectId, other: ObjectId) -> RepoResult<Option<ObjectId>> {
        let from_current = self.ancestors(current)?;

        let mut from_other = HashMap::from([(other, 0usize)]);
        let mut queue = VecDeque::from([other]);
        let mut candidates = Vec::new();
        while let Some(id) = queue.pop_front() {
            if from_current.contains_key(&id) {
                candidates.push(id);
                continue;
            }
            let Some(commit) = self.try_get(id)? else {
                continue;
            };
            let next = from_other[&id] + 1;
            for parent in commit.parents() {
                if !from_other.contains_key(&parent) {
                    from_other.insert(parent, next);
                    queue.push_back(parent);
                }
            }
        }

        if candidates.len() > 1 {
            let mut lowest = Vec::with_capacity(candidates.len());
            for &candidate in &candidates {
                let mut dominated = false;
                for &other_candidate in &candidates {
                    if other_candidate != candidate && self.is_ancestor(candidate, other_candidate)? {
                        dominated = true;
                        break;
                    }
                }
                if !dominated {
                    lowest.push(candidate);
                }
            }
            candidates = lowest;
        }

        let split = candidates
            .into_iter()
            .min_by_key(|id| (from_current[id] + from_other[id], *id));
        tracing::debug!(%current, %other, split = ?split.map(|id| id.short()), "computed split point");
        Ok(split)
    }
}

/// Lazy walk over first parents; ends at the root or at a missing commit
pub struct Log<'a> {
    graph: &'a CommitGraph,
    next: Option<ObjectId>,
}

impl Iterator for Log<'_> {
    type Item = RepoResult<Commit>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next.take()?;
        match self.graph.try_get(id) {
            Ok(Some(commit)) => {
                self.next = commit.parent();
                Some(Ok(commit))
            }
            Ok(None) => {
                tracing::warn!(commit = %id, "log stopped at missing commit");
                None
            }
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::snapshot_of;
    use tempfile::TempDir;

    struct Fixture {
        _tmp: TempDir,
        graph: CommitGraph,
        root: ObjectId,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = TempDir::new().unwrap();
            let graph = CommitGraph::new(LooseStore::open(tmp.path().join("commits")).unwrap());
            let root = graph.write(&Commit::root().unwrap()).unwrap();
            Self {
                _tmp: tmp,
                graph,
                root,
            }
        }

        fn commit(&self, message: &str, parent: ObjectId, second: Option<ObjectId>) -> ObjectId {
            let commit = Commit::with_timestamp(
                message.into(),
                "Mon Jan 5 10:00:00 2026 +0000".into(),
                Some(parent),
                second,
                snapshot_of([(message, ObjectId::from_data(message.as_bytes()))]),
            )
            .unwrap();
            self.graph.write(&commit).unwrap()
        }
    }

    #[test]
    fn test_write_and_get() {
        let fx = Fixture::new();
        let root = fx.graph.get(fx.root).unwrap();
        assert_eq!(root.id(), fx.root);
        assert!(fx.graph.contains(fx.root));
        assert_eq!(fx.graph.write(&root).unwrap(), fx.root);
    }

    #[test]
    fn test_resolve_prefixes() {
        let fx = Fixture::new();
        let hex = fx.root.to_hex();

        assert_eq!(fx.graph.resolve(&hex).unwrap(), fx.root);
        assert_eq!(fx.graph.resolve(&hex[..8]).unwrap(), fx.root);
        assert!(matches!(fx.graph.resolve("xyz"), Err(RepoError::NoSuchCommit(_))));

        let absent = ObjectId::from_data(b"absent").to_hex();
        assert!(matches!(fx.graph.resolve(&absent), Err(RepoError::NoSuchCommit(_))));
    }

    #[test]
    fn test_resolve_ambiguous_prefix() {
        let fx = Fixture::new();
        let mut parent = fx.root;
        for i in 0..40 {
            parent = fx.commit(&format!("c{}", i), parent, None);
        }
        // 41 commits cannot all have distinct first hex digits
        let ambiguous = (0..16)
            .map(|d| format!("{:x}", d))
            .find(|digit| {
                fx.graph
                    .store()
                    .list()
                    .unwrap()
                    .iter()
                    .filter(|id| id.matches_prefix(digit))
                    .count()
                    > 1
            })
            .unwrap();
        assert!(matches!(
            fx.graph.resolve(&ambiguous),
            Err(RepoError::AmbiguousId(_))
        ));
    }

    #[test]
    fn test_log_follows_first_parent() {
        let fx = Fixture::new();
        let a = fx.commit("a", fx.root, None);
        let side = fx.commit("side", fx.root, None);
        let m = fx.commit("merge", a, Some(side));

        let messages: Vec<String> = fx
            .graph
            .log(m)
            .map(|c| c.unwrap().message().to_string())
            .collect();
        assert_eq!(messages, vec!["merge", "a", "initial commit"]);

        // restartable
        assert_eq!(fx.graph.log(m).count(), 3);
    }

    #[test]
    fn test_first_parent_history_skips_second_parents() {
        let fx = Fixture::new();
        let a = fx.commit("a", fx.root, None);
        let side = fx.commit("side", fx.root, None);
        let m = fx.commit("merge", a, Some(side));

        assert!(fx.graph.in_first_parent_history(m, m).unwrap());
        assert!(fx.graph.in_first_parent_history(a, m).unwrap());
        assert!(fx.graph.in_first_parent_history(fx.root, m).unwrap());
        assert!(!fx.graph.in_first_parent_history(side, m).unwrap());
        assert!(fx.graph.is_ancestor(side, m).unwrap());
        assert!(!fx.graph.in_first_parent_history(m, a).unwrap());
    }

    #[test]
    fn test_log_stops_at_missing_commit() {
        let fx = Fixture::new();
        let dangling = Commit::with_timestamp(
            "orphan".into(),
            "t".into(),
            Some(ObjectId::from_data(b"nowhere")),
            None,
            Default::default(),
        )
        .unwrap();
        let id = fx.graph.write(&dangling).unwrap();
        let walked: Vec<_> = fx.graph.log(id).collect::<RepoResult<_>>().unwrap();
        assert_eq!(walked.len(), 1);
    }

    #[test]
    fn test_find_and_all() {
        let fx = Fixture::new();
        let a = fx.commit("same", fx.root, None);
        fx.commit("other", a, None);

        assert_eq!(fx.graph.all().unwrap().len(), 3);
        assert_eq!(fx.graph.find("same").unwrap(), vec![a]);
        assert!(matches!(
            fx.graph.find("missing"),
            Err(RepoError::NoCommitWithMessage(_))
        ));
    }

    #[test]
    fn test_split_point_simple_fork() {
        let fx = Fixture::new();
        let base = fx.commit("base", fx.root, None);
        let left = fx.commit("left", base, None);
        let right = fx.commit("right", base, None);

        assert_eq!(fx.graph.split_point(left, right).unwrap(), Some(base));
        assert_eq!(fx.graph.split_point(right, left).unwrap(), Some(base));
        assert_eq!(fx.graph.split_point(left, base).unwrap(), Some(base));
        assert_eq!(fx.graph.split_point(base, left).unwrap(), Some(base));
    }

    #[test]
    fn test_split_point_prefers_lowest_over_nearest() {
        // other reaches `c` in one step, but `d` (a child of `c`) is also common
        let fx = Fixture::new();
        let c = fx.commit("c", fx.root, None);
        let d = fx.commit("d", c, None);
        let current = fx.commit("current", d, None);
        let x = fx.commit("x", d, None);
        let other = fx.commit("other", c, Some(x));

        assert_eq!(fx.graph.split_point(current, other).unwrap(), Some(d));
        assert_eq!(fx.graph.split_point(other, current).unwrap(), Some(d));
    }

    #[test]
    fn test_split_point_through_merge_commit() {
        let fx = Fixture::new();
        let base = fx.commit("base", fx.root, None);
        let feature = fx.commit("feature", base, None);
        let main = fx.commit("main", base, None);
        let merged = fx.commit("merged", main, Some(feature));
        let feature2 = fx.commit("feature2", feature, None);

        assert_eq!(fx.graph.split_point(merged, feature2).unwrap(), Some(feature));
        assert!(fx.graph.is_ancestor(feature, merged).unwrap());
        assert!(!fx.graph.is_ancestor(feature2, merged).unwrap());
    }

    #[test]
    fn test_split_point_criss_cross_is_symmetric() {
        let fx = Fixture::new();
        let a = fx.commit("a", fx.root, None);
        let b = fx.commit("b", fx.root, None);
        let left = fx.commit("left", a, Some(b));
        let right = fx.commit("right", b, Some(a));

        let one = fx.graph.split_point(left, right).unwrap();
        let two = fx.graph.split_point(right, left).unwrap();
        assert_eq!(one, two);
        assert!(one == Some(a) || one == Some(b));
    }
}
