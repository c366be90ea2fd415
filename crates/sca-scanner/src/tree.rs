//! 의존성 트리 구성
//!
//! 평면 맵(노드 ID -> 자식 ID 목록)을 루트에서 시작하는 트리로 구체화합니다.
//!
//! # 규칙
//!
//! - 깊이 우선으로 확장하며 자식은 원래 목록 순서를 유지합니다.
//! - 맵에 없는 자식 ID는 자식 없는 리프로 만들어집니다.
//! - 여러 가지(branch)에 나타나는 ID는 출현마다 독립된 노드가 됩니다.
//! - 현재 조상 체인에 이미 있는 ID는 리프로만 추가하고 다시 확장하지 않습니다 (순환 차단).
//!
//! 실패 경로는 없습니다. 잘못된 항목은 리프로 축소됩니다.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::hash::BuildHasher;

use crate::types::{DependencyEntry, GraphNode};

/// 평면 의존성 맵에서 트리를 구성합니다.
///
/// 반환값은 `(트리, 고유 의존성 ID 집합)`입니다. 고유 집합에는 트리에 도달 가능한
/// 모든 ID가 포함되며, 루트도 포함됩니다.
///
/// 생성된 노드의 `parent`는 구성 시점의 부모 ID로 설정됩니다.
pub fn build_dependency_tree<S: BuildHasher>(
    nodes: &HashMap<String, DependencyEntry, S>,
    root: &str,
) -> (GraphNode, BTreeSet<String>) {
    let mut unique = BTreeSet::new();
    let mut ancestors = HashSet::new();
    let tree = expand(root, None, nodes, &mut ancestors, &mut unique);
    (tree, unique)
}

fn expand<S: BuildHasher>(
    id: &str,
    parent: Option<&str>,
    nodes: &HashMap<String, DependencyEntry, S>,
    ancestors: &mut HashSet<String>,
    unique: &mut BTreeSet<String>,
) -> GraphNode {
    unique.insert(id.to_owned());
    let mut node = GraphNode::leaf(id);
    node.parent = parent.map(str::to_owned);

    let Some(entry) = nodes.get(id) else {
        return node;
    };
    if ancestors.contains(id) {
        tracing::trace!(id, "dependency cycle detected, emitting leaf");
        return node;
    }

    ancestors.insert(id.to_owned());
    node.nodes = entry
        .children
        .iter()
        .map(|child| expand(child, Some(id), nodes, ancestors, unique))
        .collect();
    ancestors.remove(id);
    node
}

/// 트리에서 도달 가능한 모든 ID를 수집합니다.
pub fn reachable_ids(tree: &GraphNode) -> BTreeSet<String> {
    let mut ids = BTreeSet::new();
    collect_ids(tree, &mut ids);
    ids
}

fn collect_ids(node: &GraphNode, ids: &mut BTreeSet<String>) {
    ids.insert(node.id.clone());
    for child in &node.nodes {
        collect_ids(child, ids);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, &[&str])]) -> HashMap<String, DependencyEntry> {
        entries
            .iter()
            .map(|(id, children)| ((*id).to_owned(), DependencyEntry::new(children.iter().copied())))
            .collect()
    }

    #[test]
    fn builds_nested_tree_with_unique_deps() {
        let nodes = map(&[
            ("rootDep", &["topDep1", "topDep2", "topDep3"]),
            ("topDep1", &["midDep1", "midDep2"]),
            ("topDep2", &["midDep2", "midDep3"]),
            ("midDep1", &["bottomDep1"]),
            ("midDep2", &["bottomDep2", "bottomDep3"]),
            ("bottomDep3", &["leafDep"]),
        ]);

        let (tree, unique) = build_dependency_tree(&nodes, "rootDep");

        let expected_unique: BTreeSet<String> = [
            "rootDep", "topDep1", "topDep2", "topDep3", "midDep1", "midDep2", "midDep3",
            "bottomDep1", "bottomDep2", "bottomDep3", "leafDep",
        ]
        .iter()
        .map(|s| (*s).to_owned())
        .collect();
        assert_eq!(unique, expected_unique);

        let mid_dep2 = || {
            GraphNode::with_children(
                "midDep2",
                vec![
                    GraphNode::leaf("bottomDep2"),
                    GraphNode::with_children("bottomDep3", vec![GraphNode::leaf("leafDep")]),
                ],
            )
        };
        let expected = GraphNode::with_children(
            "rootDep",
            vec![
                GraphNode::with_children(
                    "topDep1",
                    vec![
                        GraphNode::with_children("midDep1", vec![GraphNode::leaf("bottomDep1")]),
                        mid_dep2(),
                    ],
                ),
                GraphNode::with_children("topDep2", vec![mid_dep2(), GraphNode::leaf("midDep3")]),
                GraphNode::leaf("topDep3"),
            ],
        );
        assert_eq!(tree, expected);
    }

    #[test]
    fn missing_child_becomes_leaf() {
        let nodes = map(&[("root", &["known", "unknown"]), ("known", &[])]);
        let (tree, unique) = build_dependency_tree(&nodes, "root");
        assert_eq!(tree.nodes.len(), 2);
        assert!(tree.nodes[1].nodes.is_empty());
        assert!(unique.contains("unknown"));
    }

    #[test]
    fn missing_root_yields_single_leaf() {
        let nodes = map(&[("other", &["x"])]);
        let (tree, unique) = build_dependency_tree(&nodes, "root");
        assert_eq!(tree, GraphNode::leaf("root"));
        assert_eq!(unique.len(), 1);
    }

    #[test]
    fn cycle_is_cut_at_repeated_ancestor() {
        let nodes = map(&[("a", &["b"]), ("b", &["c"]), ("c", &["a"])]);
        let (tree, unique) = build_dependency_tree(&nodes, "a");
        // a -> b -> c -> a(leaf)
        let c = &tree.nodes[0].nodes[0];
        assert_eq!(c.id, "c");
        assert_eq!(c.nodes, vec![GraphNode::leaf("a")]);
        assert_eq!(unique.len(), 3);
    }

    #[test]
    fn self_reference_is_cut() {
        let nodes = map(&[("a", &["a", "b"])]);
        let (tree, _) = build_dependency_tree(&nodes, "a");
        assert_eq!(tree.nodes, vec![GraphNode::leaf("a"), GraphNode::leaf("b")]);
    }

    #[test]
    fn shared_subtree_gets_independent_instances() {
        let nodes = map(&[("A", &["B", "C"]), ("B", &["D"]), ("C", &["D"])]);
        let (tree, _) = build_dependency_tree(&nodes, "A");
        let d_under_b = &tree.nodes[0].nodes[0];
        let d_under_c = &tree.nodes[1].nodes[0];
        assert_eq!(d_under_b, d_under_c);
        assert_eq!(d_under_b.parent.as_deref(), Some("B"));
        assert_eq!(d_under_c.parent.as_deref(), Some("C"));
    }

    #[test]
    fn building_twice_is_deterministic() {
        let nodes = map(&[
            ("r", &["x", "y", "z"]),
            ("x", &["y"]),
            ("y", &["z", "w"]),
            ("z", &["w"]),
        ]);
        let (first, first_unique) = build_dependency_tree(&nodes, "r");
        let (second, second_unique) = build_dependency_tree(&nodes, "r");
        assert_eq!(first, second);
        assert_eq!(first_unique, second_unique);
        assert_eq!(reachable_ids(&first), first_unique);
    }

    #[test]
    fn parents_are_set_during_construction() {
        let nodes = map(&[("r", &["a"]), ("a", &["b"])]);
        let (tree, _) = build_dependency_tree(&nodes, "r");
        assert!(tree.parent.is_none());
        assert_eq!(tree.nodes[0].parent.as_deref(), Some("r"));
        assert_eq!(tree.nodes[0].nodes[0].parent.as_deref(), Some("a"));
    }
}
