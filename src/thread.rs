//! Reply forest assembly.
//!
//! Replies are stored flat with a parent pointer. A thread is rebuilt in
//! memory by walking the rows once from the newest id down: a child always
//! has a larger id than its parent, so every subtree is complete by the time
//! its parent is reached. No recursion is involved, whatever the depth.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::{Reply, TOMBSTONE_BODY};

/// A reply and the replies nested beneath it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadNode {
    /// Reply identifier.
    pub id: i32,
    /// Parent reply, `None` at the top level.
    pub parent_reply_id: Option<i32>,
    /// Author, hidden for tombstones.
    pub author_id: Option<i32>,
    /// Body, or the tombstone marker.
    pub body: String,
    /// Whether this node is a tombstone.
    pub deleted: bool,
    /// Likes on the reply.
    pub like_count: i32,
    /// Creation time.
    pub created_at: NaiveDateTime,
    /// Last edit time.
    pub updated_at: NaiveDateTime,
    /// Direct children ordered by creation time.
    pub children: Vec<ThreadNode>,
}

impl ThreadNode {
    fn leaf(reply: Reply) -> Self {
        let (author_id, body) = if reply.deleted {
            (None, TOMBSTONE_BODY.to_owned())
        } else {
            (Some(reply.author_id), reply.body)
        };
        Self {
            id: reply.id,
            parent_reply_id: reply.parent_reply_id,
            author_id,
            body,
            deleted: reply.deleted,
            like_count: reply.like_count,
            created_at: reply.created_at,
            updated_at: reply.updated_at,
            children: Vec::new(),
        }
    }
}

impl Drop for ThreadNode {
    // Flatten before dropping so deep chains do not exhaust the stack.
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.children);
        while let Some(mut node) = stack.pop() {
            stack.append(&mut node.children);
        }
    }
}

fn by_creation(nodes: &mut [ThreadNode]) {
    nodes.sort_by_key(|n| (n.created_at, n.id));
}

/// Assemble the replies of one topic into a forest.
///
/// Deleted replies with no surviving descendants are dropped; deleted
/// replies that still anchor live descendants appear as tombstones. Rows
/// whose parent is missing from `replies`, or whose parent does not precede
/// them, are promoted to the top level and logged.
#[must_use]
pub fn assemble(mut replies: Vec<Reply>) -> Vec<ThreadNode> {
    replies.sort_by_key(|r| std::cmp::Reverse(r.id));
    let ids: HashSet<i32> = replies.iter().map(|r| r.id).collect();
    let mut pending: HashMap<i32, Vec<ThreadNode>> = HashMap::new();
    let mut roots = Vec::new();

    for reply in replies {
        let mut children = pending.remove(&reply.id).unwrap_or_default();
        if reply.deleted && children.is_empty() {
            continue;
        }
        by_creation(&mut children);
        let parent = reply.parent_reply_id;
        let id = reply.id;
        let mut node = ThreadNode::leaf(reply);
        node.children = children;
        match parent {
            Some(pid) if pid < id && ids.contains(&pid) => {
                pending.entry(pid).or_default().push(node);
            }
            Some(pid) => {
                warn!(reply_id = id, parent_reply_id = pid, "orphaned reply promoted to top level");
                roots.push(node);
            }
            None => roots.push(node),
        }
    }
    by_creation(&mut roots);
    roots
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use proptest::prelude::*;
    use rstest::rstest;

    use super::*;

    fn at(secs: i64) -> NaiveDateTime {
        DateTime::from_timestamp(secs, 0)
            .expect("valid timestamp")
            .naive_utc()
    }

    fn subtree_size(root: &ThreadNode) -> usize {
        let mut total = 0;
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            total += 1;
            stack.extend(node.children.iter());
        }
        total
    }

    fn reply(id: i32, parent: Option<i32>, deleted: bool) -> Reply {
        Reply {
            id,
            organization_id: String::new(),
            topic_id: 1,
            parent_reply_id: parent,
            author_id: id * 10,
            body: if deleted {
                TOMBSTONE_BODY.to_owned()
            } else {
                format!("reply {id}")
            },
            deleted,
            like_count: 0,
            created_at: at(i64::from(id)),
            updated_at: at(i64::from(id)),
        }
    }

    #[rstest]
    fn nests_children_under_parents() {
        let forest = assemble(vec![reply(1, None, false), reply(2, Some(1), false)]);
        assert_eq!(forest.len(), 1);
        let root = forest.first().expect("root");
        assert_eq!(root.id, 1);
        assert_eq!(root.children.iter().map(|c| c.id).collect::<Vec<_>>(), [2]);
    }

    #[rstest]
    fn deleted_leaves_are_omitted() {
        let forest = assemble(vec![reply(1, None, false), reply(2, Some(1), true)]);
        assert_eq!(forest.first().map(|r| r.children.len()), Some(0));
    }

    #[rstest]
    fn tombstones_anchor_live_descendants() {
        let forest = assemble(vec![
            reply(1, None, true),
            reply(2, Some(1), true),
            reply(3, Some(2), false),
        ]);
        let root = forest.first().expect("root");
        assert!(root.deleted);
        assert_eq!(root.author_id, None);
        assert_eq!(root.body, TOMBSTONE_BODY);
        assert_eq!(subtree_size(root), 3);
    }

    #[rstest]
    fn siblings_follow_creation_order() {
        let mut late = reply(2, None, false);
        late.created_at = at(50);
        let forest = assemble(vec![late, reply(3, None, false), reply(1, None, false)]);
        assert_eq!(forest.iter().map(|n| n.id).collect::<Vec<_>>(), [1, 3, 2]);
    }

    #[rstest]
    fn orphans_are_promoted() {
        let forest = assemble(vec![reply(5, Some(4), false)]);
        assert_eq!(forest.first().map(|n| n.id), Some(5));
    }

    #[rstest]
    fn deep_chains_do_not_recurse() {
        let depth = 20_000;
        let rows = (1..=depth)
            .map(|id| reply(id, (id > 1).then(|| id - 1), false))
            .collect();
        let forest = assemble(rows);
        assert_eq!(forest.len(), 1);
        let size = forest.first().map(subtree_size);
        assert_eq!(size, Some(20_000));
    }

    fn arbitrary_replies() -> impl Strategy<Value = Vec<Reply>> {
        prop::collection::vec((any::<prop::sample::Index>(), any::<bool>(), any::<bool>()), 1..60)
            .prop_map(|shape| {
                let mut rows: Vec<Reply> = Vec::with_capacity(shape.len());
                for (slot, (pick, top, deleted)) in shape.into_iter().enumerate() {
                    let id = i32::try_from(slot).expect("small") + 1;
                    let parent = if top || rows.is_empty() {
                        None
                    } else {
                        rows.get(pick.index(rows.len())).map(|r| r.id)
                    };
                    rows.push(reply(id, parent, deleted));
                }
                rows
            })
    }

    proptest! {
        #[test]
        fn every_live_reply_appears_exactly_once(rows in arbitrary_replies()) {
            let live: HashSet<i32> = rows.iter().filter(|r| !r.deleted).map(|r| r.id).collect();
            let forest = assemble(rows);
            let mut seen = HashSet::new();
            let mut stack: Vec<&ThreadNode> = forest.iter().collect();
            while let Some(node) = stack.pop() {
                prop_assert!(seen.insert(node.id));
                if node.deleted {
                    prop_assert!(!node.children.is_empty());
                }
                for (left, right) in node.children.iter().zip(node.children.iter().skip(1)) {
                    prop_assert!((left.created_at, left.id) <= (right.created_at, right.id));
                }
                stack.extend(node.children.iter());
            }
            prop_assert!(live.is_subset(&seen));
        }
    }
}
