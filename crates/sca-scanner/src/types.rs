//! 도메인 타입 -- 의존성 그래프와 스캔 응답 구조
//!
//! 평면 의존성 맵([`DependencyEntry`]), 구체화된 트리([`GraphNode`]),
//! 서비스 응답([`ScanResponse`])과 영향 경로([`ImpactPathNode`])를 정의합니다.
//! 응답 타입의 직렬화 필드명은 그래프 스캔 서비스의 JSON 형식을 따릅니다.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

/// 패키지 생태계
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Ecosystem {
    /// Rust (Cargo.lock)
    Cargo,
    /// JavaScript/TypeScript (package-lock.json)
    Npm,
    /// Go (go.sum)
    Go,
    /// Python (Pipfile.lock, requirements.txt)
    Pip,
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cargo => write!(f, "cargo"),
            Self::Npm => write!(f, "npm"),
            Self::Go => write!(f, "go"),
            Self::Pip => write!(f, "pip"),
        }
    }
}

impl Ecosystem {
    /// 컴포넌트 ID 스킴을 반환합니다.
    ///
    /// 예: Cargo -> "cargo", Npm -> "npm", Pip -> "pypi"
    pub fn id_scheme(&self) -> &'static str {
        match self {
            Self::Cargo => "cargo",
            Self::Npm => "npm",
            Self::Go => "go",
            Self::Pip => "pypi",
        }
    }

    /// 문자열에서 생태계를 파싱합니다 (대소문자 구분 없음).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cargo" | "rust" | "crate" | "crates" => Some(Self::Cargo),
            "npm" | "node" | "javascript" | "js" => Some(Self::Npm),
            "go" | "golang" => Some(Self::Go),
            "pip" | "python" | "pypi" => Some(Self::Pip),
            _ => None,
        }
    }

    /// 컴포넌트 ID(`<scheme>://<name>:<version>`)를 생성합니다.
    pub fn component_id(&self, name: &str, version: &str) -> String {
        format!("{}://{}:{}", self.id_scheme(), name, version)
    }

    /// 컴포넌트 ID를 (생태계, 이름, 버전)으로 분해합니다.
    pub fn parse_component_id(id: &str) -> Option<(Self, &str, &str)> {
        let (scheme, rest) = id.split_once("://")?;
        let ecosystem = Self::from_str_loose(scheme)?;
        // 이름에 ':'가 없다는 가정 하에 마지막 ':'를 버전 구분자로 사용
        let (name, version) = rest.rsplit_once(':')?;
        Some((ecosystem, name, version))
    }
}

/// 평면 의존성 맵의 단일 항목
///
/// 노드 ID를 키로 하는 맵의 값이며, 자식 ID 목록을 원래 순서대로 보관합니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEntry {
    /// 직접 의존하는 자식 노드 ID 목록
    pub children: Vec<String>,
}

impl DependencyEntry {
    /// 자식 목록으로 항목을 생성합니다.
    pub fn new<I, S>(children: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            children: children.into_iter().map(Into::into).collect(),
        }
    }
}

/// lockfile 하나에서 추출한 평면 의존성 그래프
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyGraph {
    /// 원본 lockfile 경로
    pub source_file: String,
    /// 생태계
    pub ecosystem: Ecosystem,
    /// 루트 노드 ID
    pub root: String,
    /// 노드 ID -> 자식 목록
    pub nodes: HashMap<String, DependencyEntry>,
}

impl DependencyGraph {
    /// 그래프 내 노드 수를 반환합니다.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

impl fmt::Display for DependencyGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DependencyGraph({}, root={}, {} nodes, ecosystem={})",
            self.source_file,
            self.root,
            self.nodes.len(),
            self.ecosystem,
        )
    }
}

/// 구체화된 의존성 트리 노드
///
/// 같은 ID가 여러 가지(branch)에 나타나면 출현마다 독립된 인스턴스가 만들어집니다.
/// `parent`는 순회용 임시 역참조이며 소유 관계가 아닙니다. 직렬화되지 않고,
/// 구조 비교(`PartialEq`)에도 포함되지 않습니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphNode {
    /// 컴포넌트 ID
    #[serde(rename = "component_id")]
    pub id: String,
    /// 자식 노드
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<GraphNode>,
    /// 순회 중 설정되는 부모 ID
    #[serde(skip)]
    pub parent: Option<String>,
}

impl PartialEq for GraphNode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.nodes == other.nodes
    }
}

impl Eq for GraphNode {}

impl GraphNode {
    /// 자식이 없는 노드를 생성합니다.
    pub fn leaf(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            nodes: Vec::new(),
            parent: None,
        }
    }

    /// 자식 목록과 함께 노드를 생성합니다.
    pub fn with_children(id: impl Into<String>, nodes: Vec<GraphNode>) -> Self {
        Self {
            id: id.into(),
            nodes,
            parent: None,
        }
    }

    /// 트리 전체 노드 수 (출현 횟수 기준)
    pub fn size(&self) -> usize {
        1 + self.nodes.iter().map(GraphNode::size).sum::<usize>()
    }

    /// 트리 깊이 (루트만 있으면 1)
    pub fn depth(&self) -> usize {
        1 + self.nodes.iter().map(GraphNode::depth).max().unwrap_or(0)
    }

    /// 모든 자식의 `parent`를 현재 구조 기준으로 다시 설정합니다.
    pub fn link_parents(&mut self) {
        self.parent = None;
        link_children(self);
    }

    /// 트리 전체의 `parent`를 지웁니다.
    pub fn clear_parents(&mut self) {
        self.parent = None;
        for child in &mut self.nodes {
            child.clear_parents();
        }
    }
}

fn link_children(node: &mut GraphNode) {
    for child in &mut node.nodes {
        child.parent = Some(node.id.clone());
        link_children(child);
    }
}

/// 영향 경로의 단일 노드
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactPathNode {
    /// 컴포넌트 ID
    pub component_id: String,
}

impl ImpactPathNode {
    /// 컴포넌트 ID로 노드를 생성합니다.
    pub fn new(component_id: impl Into<String>) -> Self {
        Self {
            component_id: component_id.into(),
        }
    }
}

/// 루트에서 대상 컴포넌트까지의 경로 (양 끝 포함)
pub type ImpactPath = Vec<ImpactPathNode>;

/// 취약 컴포넌트 정보
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Component {
    /// 수정된 버전 목록
    #[serde(default)]
    pub fixed_versions: Vec<String>,
    /// 영향 경로 목록 (발견 순서 유지)
    #[serde(default)]
    pub impact_paths: Vec<ImpactPath>,
    /// CPE 식별자 목록
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cpes: Vec<String>,
}

/// CVE 정보
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cve {
    /// CVE ID
    #[serde(rename = "cve", default)]
    pub id: String,
    /// CVSS v3 점수
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cvss_v3_score: Option<String>,
}

/// 취약점 항목
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vulnerability {
    /// 이슈 ID
    #[serde(default)]
    pub issue_id: String,
    /// 요약
    #[serde(default)]
    pub summary: String,
    /// 심각도 라벨
    #[serde(default)]
    pub severity: String,
    /// 관련 CVE 목록
    #[serde(default)]
    pub cves: Vec<Cve>,
    /// 영향받는 컴포넌트 (ID -> 정보)
    #[serde(default)]
    pub components: BTreeMap<String, Component>,
    /// 기술(패키지 매니저) 이름
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub technology: String,
}

/// 정책 위반 항목
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// 이슈 ID
    #[serde(default)]
    pub issue_id: String,
    /// 요약
    #[serde(default)]
    pub summary: String,
    /// 심각도 라벨
    #[serde(default)]
    pub severity: String,
    /// 위반 종류 (security, license, operational_risk)
    #[serde(rename = "type", default)]
    pub violation_type: String,
    /// 위반을 발생시킨 워치 이름
    #[serde(default)]
    pub watch_name: String,
    /// 빌드 실패 처리 여부
    #[serde(default)]
    pub fail_build: bool,
    /// 관련 CVE 목록
    #[serde(default)]
    pub cves: Vec<Cve>,
    /// 영향받는 컴포넌트 (ID -> 정보)
    #[serde(default)]
    pub components: BTreeMap<String, Component>,
    /// 기술(패키지 매니저) 이름
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub technology: String,
}

/// 라이선스 항목
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct License {
    /// 라이선스 키 (예: MIT)
    #[serde(rename = "license_key", default)]
    pub key: String,
    /// 라이선스 이름
    #[serde(rename = "license_name", default)]
    pub name: String,
    /// 해당 라이선스를 가진 컴포넌트
    #[serde(default)]
    pub components: BTreeMap<String, Component>,
}

/// 그래프 스캔 응답
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanResponse {
    /// 스캔 ID
    #[serde(default)]
    pub scan_id: String,
    /// 취약점 목록
    #[serde(default)]
    pub vulnerabilities: Vec<Vulnerability>,
    /// 정책 위반 목록
    #[serde(default)]
    pub violations: Vec<Violation>,
    /// 라이선스 목록
    #[serde(default)]
    pub licenses: Vec<License>,
}

impl ScanResponse {
    /// 취약점과 위반의 총 개수
    pub fn issue_count(&self) -> usize {
        self.vulnerabilities.len() + self.violations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_id_roundtrip() {
        let id = Ecosystem::Npm.component_id("@scope/pkg", "1.2.3");
        assert_eq!(id, "npm://@scope/pkg:1.2.3");
        let (eco, name, version) = Ecosystem::parse_component_id(&id).unwrap();
        assert_eq!(eco, Ecosystem::Npm);
        assert_eq!(name, "@scope/pkg");
        assert_eq!(version, "1.2.3");
    }

    #[test]
    fn parse_component_id_rejects_garbage() {
        assert!(Ecosystem::parse_component_id("no-scheme").is_none());
        assert!(Ecosystem::parse_component_id("unknown://a:1").is_none());
    }

    #[test]
    fn graph_node_equality_ignores_parent() {
        let mut a = GraphNode::with_children("root", vec![GraphNode::leaf("a")]);
        let b = a.clone();
        a.link_parents();
        assert_eq!(a.nodes[0].parent.as_deref(), Some("root"));
        assert_eq!(a, b);
    }

    #[test]
    fn clear_parents_resets_every_level() {
        let mut tree = GraphNode::with_children(
            "root",
            vec![GraphNode::with_children("a", vec![GraphNode::leaf("b")])],
        );
        tree.link_parents();
        assert_eq!(tree.nodes[0].nodes[0].parent.as_deref(), Some("a"));
        tree.clear_parents();
        assert!(tree.nodes[0].parent.is_none());
        assert!(tree.nodes[0].nodes[0].parent.is_none());
    }

    #[test]
    fn size_and_depth() {
        let tree = GraphNode::with_children(
            "root",
            vec![
                GraphNode::with_children("a", vec![GraphNode::leaf("c")]),
                GraphNode::leaf("b"),
            ],
        );
        assert_eq!(tree.size(), 4);
        assert_eq!(tree.depth(), 3);
    }

    #[test]
    fn scan_response_deserializes_service_json() {
        let json = r#"{
            "scan_id": "abc",
            "vulnerabilities": [{
                "issue_id": "XRAY-1",
                "severity": "High",
                "cves": [{"cve": "CVE-2024-0001"}],
                "components": {"npm://lodash:4.17.20": {"fixed_versions": ["[4.17.21]"]}}
            }]
        }"#;
        let response: ScanResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.scan_id, "abc");
        assert_eq!(response.vulnerabilities[0].cves[0].id, "CVE-2024-0001");
        assert!(response.violations.is_empty());
        assert_eq!(response.issue_count(), 1);
    }
}
