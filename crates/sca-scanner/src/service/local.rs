//! 로컬 취약점 DB 기반 그래프 스캔
//!
//! [`LocalGraphScanService`]는 원격 서비스 없이 [`VulnMatcher`]로 트리의 모든 고유
//! 컴포넌트를 매칭합니다. 워치/프로젝트 개념이 없으므로 위반은 만들지 않고,
//! 라이선스 정보도 제공하지 않습니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::ScaScannerError;
use crate::service::{GraphScanParams, GraphScanService};
use crate::tree::reachable_ids;
use crate::types::{GraphNode, ScanResponse};
use crate::vuln::{VulnDb, VulnMatcher};

/// 로컬 서비스가 보고하는 고정 버전
pub const LOCAL_SERVICE_VERSION: &str = "3.100.0";

/// 로컬 DB 그래프 스캔 서비스
pub struct LocalGraphScanService {
    matcher: VulnMatcher,
    advanced_security: bool,
    scan_seq: AtomicU64,
}

impl LocalGraphScanService {
    /// DB로 서비스를 생성합니다. 고급 보안 엔타이틀먼트는 꺼진 상태입니다.
    pub fn new(db: Arc<VulnDb>) -> Self {
        Self {
            matcher: VulnMatcher::new(db),
            advanced_security: false,
            scan_seq: AtomicU64::new(0),
        }
    }

    /// 고급 보안 엔타이틀먼트 응답을 설정합니다.
    ///
    /// 분석기 배포 URL이 설정된 경우처럼 로컬에서 고급 스캐너를 돌릴 수 있을 때 켭니다.
    pub fn with_advanced_security(mut self, enabled: bool) -> Self {
        self.advanced_security = enabled;
        self
    }

    /// 매처 참조
    pub fn matcher(&self) -> &VulnMatcher {
        &self.matcher
    }
}

impl GraphScanService for LocalGraphScanService {
    async fn version(&self) -> Result<String, ScaScannerError> {
        Ok(LOCAL_SERVICE_VERSION.to_owned())
    }

    async fn is_entitled(&self, feature: &str) -> Result<bool, ScaScannerError> {
        tracing::debug!(feature, entitled = self.advanced_security, "local entitlement");
        Ok(self.advanced_security)
    }

    async fn scan_graph(
        &self,
        tree: &GraphNode,
        params: &GraphScanParams,
    ) -> Result<ScanResponse, ScaScannerError> {
        let ids = reachable_ids(tree);
        let vulnerabilities = self.matcher.match_components(ids.iter().map(String::as_str));
        let seq = self.scan_seq.fetch_add(1, Ordering::Relaxed);
        let scan_id = if params.multi_scan_id.is_empty() {
            format!("local-{seq}")
        } else {
            format!("{}-{seq}", params.multi_scan_id)
        };

        tracing::debug!(
            scan_id = %scan_id,
            components = ids.len(),
            vulnerabilities = vulnerabilities.len(),
            "local graph scan completed"
        );

        Ok(ScanResponse {
            scan_id,
            vulnerabilities,
            violations: Vec::new(),
            licenses: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Ecosystem;
    use crate::vuln::{VersionRange, VulnDbEntry};
    use vigil_core::types::Severity;

    fn service() -> LocalGraphScanService {
        let db = VulnDb::from_entries(vec![VulnDbEntry {
            issue_id: String::new(),
            cve_id: "CVE-2022-0001".to_owned(),
            package: "minimist".to_owned(),
            ecosystem: Ecosystem::Npm,
            affected_ranges: vec![VersionRange {
                introduced: None,
                fixed: Some("1.2.6".to_owned()),
            }],
            fixed_version: Some("1.2.6".to_owned()),
            severity: Severity::Critical,
            summary: "Prototype pollution".to_owned(),
            cvss_v3_score: Some("9.8".to_owned()),
        }]);
        LocalGraphScanService::new(Arc::new(db))
    }

    #[tokio::test]
    async fn scans_every_reachable_component() {
        let tree = GraphNode::with_children(
            "npm://app:1.0.0",
            vec![GraphNode::with_children(
                "npm://mkdirp:0.5.5",
                vec![GraphNode::leaf("npm://minimist:1.2.5")],
            )],
        );
        let response = service()
            .scan_graph(&tree, &GraphScanParams::default())
            .await
            .unwrap();
        assert_eq!(response.vulnerabilities.len(), 1);
        assert!(response.vulnerabilities[0]
            .components
            .contains_key("npm://minimist:1.2.5"));
        assert_eq!(response.vulnerabilities[0].cves[0].cvss_v3_score.as_deref(), Some("9.8"));
        assert!(response.scan_id.starts_with("local-"));
    }

    #[tokio::test]
    async fn scan_ids_carry_multi_scan_id() {
        let params = GraphScanParams {
            multi_scan_id: "msi".to_owned(),
            ..GraphScanParams::default()
        };
        let svc = service();
        let first = svc.scan_graph(&GraphNode::leaf("npm://a:1"), &params).await.unwrap();
        let second = svc.scan_graph(&GraphNode::leaf("npm://a:1"), &params).await.unwrap();
        assert_eq!(first.scan_id, "msi-0");
        assert_eq!(second.scan_id, "msi-1");
    }

    #[tokio::test]
    async fn entitlement_follows_flag() {
        assert!(!service().is_entitled("contextual_analysis").await.unwrap());
        assert!(service()
            .with_advanced_security(true)
            .is_entitled("contextual_analysis")
            .await
            .unwrap());
    }
}
