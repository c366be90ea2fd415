//! 그래프 스캔 서비스 -- 원격/로컬 취약점 분석 백엔드
//!
//! [`GraphScanService`] trait은 의존성 트리를 분석하는 백엔드를 추상화합니다.
//!
//! # 구현
//!
//! - [`XrayGraphClient`]: HTTP 원격 서비스 (`reqwest`)
//! - [`LocalGraphScanService`]: 로컬 JSON 취약점 DB
//!
//! 그래프 스캔 전에는 [`validate_minimum_version`]으로 서비스 버전이
//! [`GRAPH_SCAN_MIN_VERSION`] 이상인지 확인해야 합니다.

pub mod local;
pub mod xray;

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::ScaScannerError;
use crate::types::{GraphNode, ScanResponse};
use crate::vuln::compare_versions;

pub use local::LocalGraphScanService;
pub use xray::XrayGraphClient;

/// 그래프 스캔 최소 서비스 버전
pub const GRAPH_SCAN_MIN_VERSION: &str = "3.29.0";

/// 고급 보안 엔타이틀먼트 조회가 가능한 최소 서비스 버전
pub const ENTITLEMENTS_MIN_VERSION: &str = "3.66.0";

/// 고급 보안 기능 엔타이틀먼트 이름
pub const ADVANCED_SECURITY_FEATURE: &str = "contextual_analysis";

/// 서비스 제품명 (에러 메시지용)
pub const SERVICE_PRODUCT: &str = "Xray";

/// 그래프 스캔 요청 매개변수
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphScanParams {
    /// 프로젝트 키
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub project_key: String,
    /// 워치 목록
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub watches: Vec<String>,
    /// 모든 취약점 포함 여부
    #[serde(default)]
    pub include_vulnerabilities: bool,
    /// 라이선스 포함 여부
    #[serde(default)]
    pub include_licenses: bool,
    /// 저장소 경로
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub repo_path: String,
    /// 감사 실행 하나에 속한 스캔들을 묶는 ID
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub multi_scan_id: String,
}

impl GraphScanParams {
    /// 워치/프로젝트/저장소 컨텍스트가 주어졌는지 확인합니다.
    ///
    /// 컨텍스트가 없으면 서비스는 위반 대신 취약점만 반환합니다.
    pub fn has_context(&self) -> bool {
        !self.watches.is_empty() || !self.project_key.is_empty() || !self.repo_path.is_empty()
    }
}

/// 그래프 스캔 백엔드
///
/// 구현체는 `Send + Sync + 'static`이어야 하며 여러 태스크에서 공유됩니다.
pub trait GraphScanService: Send + Sync + 'static {
    /// 서비스 버전 문자열을 조회합니다.
    fn version(&self) -> impl Future<Output = Result<String, ScaScannerError>> + Send;

    /// 주어진 기능에 대한 엔타이틀먼트를 조회합니다.
    fn is_entitled(
        &self,
        feature: &str,
    ) -> impl Future<Output = Result<bool, ScaScannerError>> + Send;

    /// 의존성 트리를 분석하여 취약점/위반/라이선스 응답을 반환합니다.
    fn scan_graph(
        &self,
        tree: &GraphNode,
        params: &GraphScanParams,
    ) -> impl Future<Output = Result<ScanResponse, ScaScannerError>> + Send;
}

/// 현재 버전이 최소 요구 버전 이상인지 검증합니다.
pub fn validate_minimum_version(
    product: &str,
    current: &str,
    minimum: &str,
) -> Result<(), ScaScannerError> {
    if semver::Version::parse(current.trim_start_matches('v')).is_err()
        && !current.chars().next().is_some_and(|c| c.is_ascii_digit())
    {
        return Err(ScaScannerError::InvalidVersion {
            version: current.to_owned(),
            reason: "not a numeric version".to_owned(),
        });
    }
    if compare_versions(current, minimum) == Ordering::Less {
        return Err(ScaScannerError::VersionMismatch {
            product: product.to_owned(),
            current: current.to_owned(),
            minimum: minimum.to_owned(),
        });
    }
    Ok(())
}

/// 버전 확인 후 고급 보안 엔타이틀먼트를 조회합니다.
///
/// 서비스가 엔타이틀먼트 API를 지원하지 않는 버전이면 조회 없이 `false`를 반환합니다.
pub async fn is_entitled_for_advanced_security<S: GraphScanService>(
    service: &S,
    version: &str,
) -> Result<bool, ScaScannerError> {
    if compare_versions(version, ENTITLEMENTS_MIN_VERSION) == Ordering::Less {
        tracing::debug!(
            version,
            minimum = ENTITLEMENTS_MIN_VERSION,
            "service too old for entitlement check"
        );
        return Ok(false);
    }
    service.is_entitled(ADVANCED_SECURITY_FEATURE).await
}
