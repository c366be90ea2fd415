//! 영향 경로 계산
//!
//! 구체화된 트리를 전위(pre-order) 깊이 우선으로 순회하며, 관심 대상 컴포넌트마다
//! 루트부터 해당 노드까지의 경로를 발견 순서대로 누적합니다.
//!
//! 경로는 순회 중 들고 다니는 접두 경로(prefix)로 만들어지며 노드의 `parent`
//! 역참조는 읽지 않습니다. 따라서 공유된 하위 트리도 출현마다 올바른 경로를 얻습니다.

use std::collections::{HashMap, HashSet};

use crate::types::{Component, GraphNode, ImpactPath, ImpactPathNode, ScanResponse};

/// 컴포넌트 ID -> 누적된 영향 경로 목록
pub type IssuePaths = HashMap<String, Vec<ImpactPath>>;

/// 관심 대상 ID마다 트리에서 발견되는 모든 경로를 `issues`에 추가합니다.
///
/// `issues`의 키가 관심 대상 집합입니다. 이미 들어 있는 경로는 유지되므로
/// 여러 트리에 대해 순서대로 호출하면 경로가 트리 순서대로 이어 붙습니다.
pub fn set_paths_for_issues(root: &GraphNode, issues: &mut IssuePaths) {
    let mut prefix = Vec::new();
    visit(root, issues, &mut prefix);
}

fn visit(node: &GraphNode, issues: &mut IssuePaths, prefix: &mut ImpactPath) {
    prefix.push(ImpactPathNode::new(node.id.as_str()));
    if let Some(paths) = issues.get_mut(&node.id) {
        paths.push(prefix.clone());
    }
    for child in &node.nodes {
        visit(child, issues, prefix);
    }
    prefix.pop();
}

/// 관심 대상 집합에 대한 영향 경로를 계산합니다.
///
/// 트리에 나타나지 않는 ID도 빈 목록으로 결과에 포함됩니다.
pub fn impact_paths(tree: &GraphNode, interesting: &HashSet<String>) -> IssuePaths {
    let mut issues: IssuePaths = interesting
        .iter()
        .map(|id| (id.clone(), Vec::new()))
        .collect();
    set_paths_for_issues(tree, &mut issues);
    issues
}

/// 스캔 응답의 모든 컴포넌트(취약점, 위반, 라이선스)에 영향 경로를 채웁니다.
///
/// 트리는 주어진 순서대로 순회되며, 한 컴포넌트가 여러 트리나 여러 가지에
/// 나타나면 출현마다 경로가 하나씩 추가됩니다.
pub fn build_impact_paths_for_scan_responses(responses: &mut [ScanResponse], trees: &[GraphNode]) {
    let mut issues: IssuePaths = HashMap::new();
    for response in responses.iter() {
        for id in component_ids(response) {
            issues.entry(id.to_owned()).or_default();
        }
    }
    if issues.is_empty() {
        return;
    }

    for tree in trees {
        set_paths_for_issues(tree, &mut issues);
    }

    for response in responses.iter_mut() {
        for vulnerability in &mut response.vulnerabilities {
            update_components_with_impact_paths(&mut vulnerability.components, &issues);
        }
        for violation in &mut response.violations {
            update_components_with_impact_paths(&mut violation.components, &issues);
        }
        for license in &mut response.licenses {
            update_components_with_impact_paths(&mut license.components, &issues);
        }
    }
}

/// 컴포넌트 맵의 각 항목에 계산된 경로를 기록합니다.
///
/// 계산 결과에 없는 컴포넌트는 그대로 둡니다.
pub fn update_components_with_impact_paths<'a, I>(components: I, issues: &IssuePaths)
where
    I: IntoIterator<Item = (&'a String, &'a mut Component)>,
{
    for (id, component) in components {
        if let Some(paths) = issues.get(id) {
            component.impact_paths = paths.clone();
        }
    }
}

fn component_ids(response: &ScanResponse) -> impl Iterator<Item = &str> {
    let vulns = response
        .vulnerabilities
        .iter()
        .flat_map(|v| v.components.keys());
    let violations = response
        .violations
        .iter()
        .flat_map(|v| v.components.keys());
    let licenses = response.licenses.iter().flat_map(|l| l.components.keys());
    vulns.chain(violations).chain(licenses).map(String::as_str)
}
