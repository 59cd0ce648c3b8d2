use thiserror::Error;

use arbor_types::{ChatNode, ChatPath, Message};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("Parent path {0:?} does not resolve to a node")]
    ParentNotFound(ChatPath),
}

/// One entry of a rendered thread: the message plus where it sits among
/// its siblings, so callers can offer branch switching.
#[derive(Debug, Clone, PartialEq)]
pub struct PathEntry {
    pub message: Message,
    pub index: usize,
    pub sibling_count: usize,
}

/// Walks the forest along `path`; `None` when the path runs off the tree.
pub fn node_at<'a>(nodes: &'a [ChatNode], path: &[usize]) -> Option<&'a ChatNode> {
    let (&first, rest) = path.split_first()?;
    let node = nodes.get(first)?;
    if rest.is_empty() {
        Some(node)
    } else {
        node_at(&node.children, rest)
    }
}

fn node_at_mut<'a>(nodes: &'a mut [ChatNode], path: &[usize]) -> Option<&'a mut ChatNode> {
    let (&first, rest) = path.split_first()?;
    let node = nodes.get_mut(first)?;
    if rest.is_empty() {
        Some(node)
    } else {
        node_at_mut(&mut node.children, rest)
    }
}

/// Resolves a bookmark to a full root-to-leaf path.
///
/// Descends from the root taking the bookmarked index where one is given
/// and sibling 0 otherwise, stopping at the first level the chosen index
/// does not exist (so a stale bookmark degrades to its longest valid
/// prefix rather than failing).
pub fn resolve_path(nodes: &[ChatNode], bookmark: Option<&[usize]>) -> ChatPath {
    let mut path = ChatPath::new();
    let mut level = nodes;
    let mut depth = 0;

    loop {
        let index = bookmark
            .and_then(|b| b.get(depth))
            .copied()
            .unwrap_or(0);
        match level.get(index) {
            Some(node) => {
                path.push(index);
                level = &node.children;
                depth += 1;
            }
            None => break,
        }
    }

    path
}

/// Appends `message` as a new child (last sibling) of the node at
/// `parent_path`, returning the new child's sibling index.
///
/// A parent path that resolves to nothing is a caller bug; it is reported
/// loudly and the tree is left untouched.
pub fn append_child(
    nodes: &mut Vec<ChatNode>,
    parent_path: &[usize],
    message: Message,
) -> Result<usize, TreeError> {
    if parent_path.is_empty() {
        nodes.push(ChatNode::new(message));
        return Ok(nodes.len() - 1);
    }

    let Some(parent) = node_at_mut(nodes, parent_path) else {
        tracing::error!(?parent_path, "append target does not exist, dropping node");
        return Err(TreeError::ParentNotFound(parent_path.to_vec()));
    };

    parent.children.push(ChatNode::new(message));
    Ok(parent.children.len() - 1)
}

/// The linear thread selected by `path`, with sibling counts. Stops early
/// if the path runs off the tree.
pub fn messages_along_path(nodes: &[ChatNode], path: &[usize]) -> Vec<PathEntry> {
    let mut entries = Vec::with_capacity(path.len());
    let mut level = nodes;

    for &index in path {
        match level.get(index) {
            Some(node) => {
                entries.push(PathEntry {
                    message: node.message.clone(),
                    index,
                    sibling_count: level.len(),
                });
                level = &node.children;
            }
            None => break,
        }
    }

    entries
}

/// The first `depth` steps of `path`.
pub fn truncate_to(path: &[usize], depth: usize) -> ChatPath {
    path[..depth.min(path.len())].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(text: &str) -> ChatNode {
        ChatNode::new(Message::user(text))
    }

    /// root system node with one user/assistant exchange and an
    /// alternative assistant reply: [0] -> [0,0] -> {[0,0,0], [0,0,1]}
    fn sample_tree() -> Vec<ChatNode> {
        let mut root = ChatNode::new(Message::system("sys"));
        let mut question = node("question");
        question.children.push(node("answer a"));
        question.children.push(node("answer b"));
        root.children.push(question);
        vec![root]
    }

    #[test]
    fn resolve_defaults_to_first_siblings() {
        let nodes = sample_tree();
        assert_eq!(resolve_path(&nodes, None), vec![0, 0, 0]);
    }

    #[test]
    fn resolve_follows_bookmark_then_defaults() {
        let nodes = sample_tree();
        assert_eq!(
            resolve_path(&nodes, Some(&[0, 0, 1])),
            vec![0, 0, 1]
        );
        // Bookmark shorter than the tree: defaults take over below it.
        assert_eq!(resolve_path(&nodes, Some(&[0])), vec![0, 0, 0]);
    }

    #[test]
    fn stale_bookmark_degrades_to_longest_valid_prefix() {
        let nodes = sample_tree();
        assert_eq!(resolve_path(&nodes, Some(&[0, 0, 7])), vec![0, 0]);
        assert_eq!(resolve_path(&nodes, Some(&[3])), Vec::<usize>::new());
    }

    #[test]
    fn append_returns_sibling_index() {
        let mut nodes = sample_tree();
        let index = append_child(&mut nodes, &[0, 0], Message::user("answer c")).unwrap();
        assert_eq!(index, 2);
        assert_eq!(node_at(&nodes, &[0, 0]).unwrap().children.len(), 3);
    }

    #[test]
    fn append_to_missing_parent_leaves_tree_untouched() {
        let mut nodes = sample_tree();
        let before = nodes.clone();
        let err = append_child(&mut nodes, &[0, 9], Message::user("orphan")).unwrap_err();
        assert_eq!(err, TreeError::ParentNotFound(vec![0, 9]));
        assert_eq!(nodes, before);
    }

    #[test]
    fn messages_along_path_carries_sibling_counts() {
        let nodes = sample_tree();
        let entries = messages_along_path(&nodes, &[0, 0, 1]);

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2].message.content, "answer b");
        assert_eq!(entries[2].index, 1);
        assert_eq!(entries[2].sibling_count, 2);
        assert_eq!(entries[0].sibling_count, 1);
    }

    #[test]
    fn truncate_clamps_to_path_length() {
        assert_eq!(truncate_to(&[0, 0, 1], 2), vec![0, 0]);
        assert_eq!(truncate_to(&[0], 5), vec![0]);
    }
}
