use std::collections::BTreeMap;

/// One directory level of a [`PathTree`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeNode {
    pub name: String,
    pub children: BTreeMap<String, TreeNode>,
    pub files: Vec<String>,
}

impl TreeNode {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn file_count(&self) -> usize {
        self.files.len() + self.children.values().map(TreeNode::file_count).sum::<usize>()
    }
}

/// Trie of '/'-separated relative paths, built once from a flat list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTree {
    pub root: TreeNode,
}

impl PathTree {
    pub fn from_paths<I, S>(root_name: &str, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut root = TreeNode::named(root_name);
        for path in paths {
            let segments: Vec<&str> = path
                .as_ref()
                .split('/')
                .filter(|s| !s.is_empty() && *s != ".")
                .collect();
            let Some((file, dirs)) = segments.split_last() else {
                continue;
            };
            let node = dirs.iter().fold(&mut root, |node, dir| {
                node.children
                    .entry((*dir).to_string())
                    .or_insert_with(|| TreeNode::named(dir))
            });
            node.files.push((*file).to_string());
        }
        sort_files(&mut root);
        Self { root }
    }

    /// Depth-first walk; `visit(depth, node)` sees every directory including the root.
    pub fn walk<F>(&self, mut visit: F)
    where
        F: FnMut(usize, &TreeNode),
    {
        fn go<F: FnMut(usize, &TreeNode)>(node: &TreeNode, depth: usize, visit: &mut F) {
            visit(depth, node);
            for child in node.children.values() {
                go(child, depth + 1, visit);
            }
        }
        go(&self.root, 0, &mut visit);
    }
}

fn sort_files(node: &mut TreeNode) {
    node.files.sort();
    for child in node.children.values_mut() {
        sort_files(child);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_nested_nodes_from_flat_paths() {
        let tree = PathTree::from_paths(
            "root",
            ["text/notes.txt", "images/photo.jpg", "images/raw/b.cr2", "top.md"],
        );

        assert_eq!(tree.root.files, vec!["top.md".to_string()]);
        let images = tree.root.children.get("images").unwrap();
        assert_eq!(images.files, vec!["photo.jpg".to_string()]);
        assert_eq!(images.children.get("raw").unwrap().files, vec!["b.cr2".to_string()]);
        assert_eq!(tree.root.file_count(), 4);
    }

    #[test]
    fn walk_visits_directories_depth_first() {
        let tree = PathTree::from_paths("root", ["a/b/c.txt", "d/e.txt"]);
        let mut seen = Vec::new();
        tree.walk(|depth, node| seen.push((depth, node.name.clone())));
        assert_eq!(
            seen,
            vec![
                (0, "root".to_string()),
                (1, "a".to_string()),
                (2, "b".to_string()),
                (1, "d".to_string()),
            ]
        );
    }
}
