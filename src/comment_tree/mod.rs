//! Reply threads for a post's comments.
//!
//! Comments are stored flat, in the order they were posted, each one pointing
//! at its parent through `parent_id`. [`build_comment_tree`] turns that list
//! into a forest of [`CommentNode`]s.
//!
//! Guarantees:
//! - every input comment appears exactly once in the output;
//! - siblings keep their relative order from the input list;
//! - a comment whose parent is missing from the list, or is the comment itself,
//!   becomes a root;
//! - parent references forming a loop never produce a cycle: the loop is cut at
//!   its earliest comment, which becomes a root.

mod thread;

pub use thread::{add_comment, comment_thread};

use std::collections::HashMap;

use uuid::Uuid;

use crate::models::{Comment, CommentNode};

/// Builds the reply forest for `comments`, given in stored order.
///
/// Runs in linear time and never recurses, so thread depth is unbounded.
/// When two comments share an id, replies attach to the one listed last.
pub fn build_comment_tree(comments: Vec<Comment>) -> Vec<CommentNode> {
    let count = comments.len();

    let mut index: HashMap<Uuid, usize> = HashMap::with_capacity(count);
    for (pos, comment) in comments.iter().enumerate() {
        index.insert(comment.id, pos);
    }

    let mut parents: Vec<Option<usize>> = comments
        .iter()
        .enumerate()
        .map(|(pos, comment)| {
            let parent_id = comment.parent_id?;
            match index.get(&parent_id) {
                Some(&parent) if parent != pos => Some(parent),
                Some(_) => None,
                None => {
                    tracing::debug!(comment = %comment.id, %parent_id, "dangling parent, treating as root");
                    None
                }
            }
        })
        .collect();
    break_cycles(&mut parents);

    let mut roots = Vec::new();
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); count];
    for (pos, parent) in parents.iter().enumerate() {
        match parent {
            Some(parent) => children[*parent].push(pos),
            None => roots.push(pos),
        }
    }

    // Pre-order walk; assembling in reverse finishes every child before its parent.
    let mut order = Vec::with_capacity(count);
    let mut stack: Vec<usize> = roots.iter().rev().copied().collect();
    while let Some(pos) = stack.pop() {
        order.push(pos);
        stack.extend(children[pos].iter().rev());
    }

    let mut pending: Vec<Option<Comment>> = comments.into_iter().map(Some).collect();
    let mut built: Vec<Option<CommentNode>> = (0..count).map(|_| None).collect();
    for &pos in order.iter().rev() {
        let Some(comment) = pending[pos].take() else {
            continue;
        };
        let mut node = CommentNode::new(comment);
        node.children = children[pos]
            .iter()
            .filter_map(|&child| built[child].take())
            .collect();
        built[pos] = Some(node);
    }

    roots
        .into_iter()
        .filter_map(|root| built[root].take())
        .collect()
}

/// Total number of comments in a forest.
pub fn forest_len(forest: &[CommentNode]) -> usize {
    forest.iter().map(CommentNode::subtree_len).sum()
}

/// Cuts every loop in the parent links by turning its earliest member into a root.
fn break_cycles(parents: &mut [Option<usize>]) {
    const FRESH: u8 = 0;
    const ON_PATH: u8 = 1;
    const DONE: u8 = 2;

    let mut state = vec![FRESH; parents.len()];
    let mut path = Vec::new();

    for start in 0..parents.len() {
        let mut cursor = Some(start);
        while let Some(pos) = cursor {
            match state[pos] {
                FRESH => {
                    state[pos] = ON_PATH;
                    path.push(pos);
                    cursor = parents[pos];
                }
                ON_PATH => {
                    if let Some(at) = path.iter().position(|&p| p == pos) {
                        if let Some(&earliest) = path[at..].iter().min() {
                            tracing::warn!(position = earliest, "comment reply loop, cutting");
                            parents[earliest] = None;
                        }
                    }
                    break;
                }
                _ => break,
            }
        }
        for pos in path.drain(..) {
            state[pos] = DONE;
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use rand::{Rng, SeedableRng, rngs::StdRng};

    use super::*;

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn comment(n: u128, parent: Option<u128>) -> Comment {
        Comment {
            id: id(n),
            author_id: 1,
            body: format!("comment {n}"),
            reaction: None,
            parent_id: parent.map(id),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                + Duration::seconds(n as i64),
        }
    }

    fn ids(nodes: &[CommentNode]) -> Vec<Uuid> {
        nodes.iter().map(|node| node.comment.id).collect()
    }

    #[test]
    fn empty_input_gives_empty_forest() {
        assert!(build_comment_tree(Vec::new()).is_empty());
    }

    #[test]
    fn flat_to_nested() {
        let forest = build_comment_tree(vec![
            comment(1, None),
            comment(2, Some(1)),
            comment(3, None),
            comment(4, Some(2)),
        ]);

        assert_eq!(forest.len(), 2);
        assert_eq!(forest_len(&forest), 4);
        assert_eq!(ids(&forest), vec![id(1), id(3)]);
        assert_eq!(ids(&forest[0].children), vec![id(2)]);
        assert_eq!(ids(&forest[0].children[0].children), vec![id(4)]);
        assert!(forest[1].children.is_empty());
    }

    #[test]
    fn siblings_keep_input_order() {
        // Stored order disagrees with both id and timestamp order.
        let mut comments = vec![
            comment(1, None),
            comment(9, Some(1)),
            comment(5, None),
            comment(3, Some(1)),
            comment(7, Some(1)),
            comment(2, None),
        ];
        comments.reverse();
        comments.rotate_left(1);
        let expected_roots: Vec<Uuid> = comments
            .iter()
            .filter(|c| c.parent_id.is_none())
            .map(|c| c.id)
            .collect();
        let expected_replies: Vec<Uuid> = comments
            .iter()
            .filter(|c| c.parent_id == Some(id(1)))
            .map(|c| c.id)
            .collect();

        let forest = build_comment_tree(comments);

        assert_eq!(ids(&forest), expected_roots);
        let parent = forest.iter().find(|n| n.comment.id == id(1)).unwrap();
        assert_eq!(ids(&parent.children), expected_replies);
    }

    #[test]
    fn dangling_parent_becomes_root() {
        let forest = build_comment_tree(vec![comment(1, None), comment(2, Some(42))]);

        assert_eq!(ids(&forest), vec![id(1), id(2)]);
        assert_eq!(forest_len(&forest), 2);
    }

    #[test]
    fn self_reference_becomes_root() {
        let forest = build_comment_tree(vec![comment(1, Some(1)), comment(2, Some(1))]);

        assert_eq!(ids(&forest), vec![id(1)]);
        assert_eq!(ids(&forest[0].children), vec![id(2)]);
    }

    #[test]
    fn reply_loop_is_cut_at_earliest_comment() {
        // 1 -> 3 -> 2 -> 1
        let forest = build_comment_tree(vec![
            comment(1, Some(3)),
            comment(2, Some(1)),
            comment(3, Some(2)),
            comment(4, None),
        ]);

        assert_eq!(ids(&forest), vec![id(1), id(4)]);
        assert_eq!(ids(&forest[0].children), vec![id(2)]);
        assert_eq!(ids(&forest[0].children[0].children), vec![id(3)]);
        assert_eq!(forest_len(&forest), 4);
    }

    #[test]
    fn reply_listed_before_its_parent_still_attaches() {
        let forest = build_comment_tree(vec![comment(2, Some(1)), comment(1, None)]);

        assert_eq!(ids(&forest), vec![id(1)]);
        assert_eq!(ids(&forest[0].children), vec![id(2)]);
    }

    #[test]
    fn duplicate_ids_keep_every_record() {
        let mut second = comment(1, None);
        second.body = "again".to_string();
        let forest = build_comment_tree(vec![comment(1, None), second, comment(2, Some(1))]);

        assert_eq!(forest_len(&forest), 3);
        assert_eq!(forest.len(), 2);
        assert!(forest[0].children.is_empty());
        assert_eq!(forest[1].comment.body, "again");
        assert_eq!(ids(&forest[1].children), vec![id(2)]);
    }

    #[test]
    fn deep_chain_is_built_without_recursion() {
        let depth = 2_000;
        let comments: Vec<Comment> = (0..depth)
            .map(|n| comment(n, n.checked_sub(1)))
            .collect();

        let forest = build_comment_tree(comments);

        assert_eq!(forest.len(), 1);
        assert_eq!(forest_len(&forest), depth as usize);
    }

    #[test]
    fn every_comment_appears_exactly_once() {
        // Parents vary: valid, dangling, self and forward references.
        let mut rng = StdRng::seed_from_u64(0x2545_f491_4f6c_dd1d);

        for count in 0..60u128 {
            let comments: Vec<Comment> = (0..count)
                .map(|n| {
                    let parent = match rng.random_range(0..4) {
                        0 => None,
                        1 => Some(1_000 + n),
                        _ => Some(rng.random_range(0..count)),
                    };
                    comment(n, parent)
                })
                .collect();

            let forest = build_comment_tree(comments.clone());
            assert_eq!(forest_len(&forest), comments.len());

            let mut seen = Vec::new();
            let mut stack: Vec<&CommentNode> = forest.iter().collect();
            while let Some(node) = stack.pop() {
                seen.push(node.comment.id);
                stack.extend(node.children.iter());
            }
            seen.sort();
            let mut expected: Vec<Uuid> = comments.iter().map(|c| c.id).collect();
            expected.sort();
            assert_eq!(seen, expected);
        }
    }
}
