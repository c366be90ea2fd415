//! 감사 결과 집계
//!
//! SCA 대상별 결과, 고급 스캐너 run, 태스크 에러를 하나의 [`AuditResults`]로 모읍니다.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Serialize, Serializer};

use vigil_jas_scanner::{JasScanType, Run};
use vigil_sca_scanner::ScaScanResult;

use crate::error::AuditError;

/// 감사 하나의 모든 태스크 에러 (도착 순서 유지)
///
/// `Display`는 에러 하나당 한 줄을 출력합니다.
#[derive(Debug, Default)]
pub struct ScanErrors {
    errors: Vec<AuditError>,
}

impl ScanErrors {
    pub fn push(&mut self, err: AuditError) {
        self.errors.push(err);
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AuditError> {
        self.errors.iter()
    }
}

impl fmt::Display for ScanErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ScanErrors {}

impl Serialize for ScanErrors {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.errors.iter().map(ToString::to_string))
    }
}

/// 스캐너별 고급 스캐너 run
#[derive(Debug, Default, Serialize)]
#[serde(transparent)]
pub struct JasResults {
    runs: BTreeMap<JasScanType, Vec<Run>>,
}

impl JasResults {
    pub fn add(&mut self, scan_type: JasScanType, runs: Vec<Run>) {
        self.runs.entry(scan_type).or_default().extend(runs);
    }

    pub fn runs(&self, scan_type: JasScanType) -> &[Run] {
        self.runs.get(&scan_type).map(Vec::as_slice).unwrap_or(&[])
    }

    /// run을 하나 이상 만든 스캐너
    pub fn scan_types(&self) -> impl Iterator<Item = JasScanType> + '_ {
        self.runs.keys().copied()
    }

    pub fn finding_count(&self, scan_type: JasScanType) -> usize {
        self.runs(scan_type).iter().map(Run::location_count).sum()
    }

    pub fn total_findings(&self) -> usize {
        self.runs.keys().map(|t| self.finding_count(*t)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

/// 감사의 최종 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    PartialFailure,
}

/// 감사 하나가 만든 모든 결과
#[derive(Debug, Default, Serialize)]
pub struct AuditResults {
    pub service_version: String,
    pub multi_scan_id: String,
    pub entitled_for_advanced_security: bool,
    /// 워치, 프로젝트, 저장소 경로 중 하나라도 지정되었는지 여부
    pub has_context: bool,
    pub sca: Vec<ScaScanResult>,
    pub jas: JasResults,
    pub errors: ScanErrors,
}

impl AuditResults {
    /// 실패한 태스크가 있으면 결합된 에러를 반환합니다.
    pub fn scan_error(&self) -> Option<&ScanErrors> {
        (!self.errors.is_empty()).then_some(&self.errors)
    }

    pub fn outcome(&self) -> AuditOutcome {
        if self.errors.is_empty() {
            AuditOutcome::Success
        } else {
            AuditOutcome::PartialFailure
        }
    }

    /// 모든 SCA 대상의 취약점+위반 개수
    pub fn sca_issue_count(&self) -> usize {
        self.sca.iter().map(ScaScanResult::issue_count).sum()
    }

    /// SCA 취약점과 위반에 등장한 CVE ID (정렬, 중복 제거)
    pub fn sca_cves(&self) -> Vec<String> {
        let mut cves = BTreeSet::new();
        for response in self.sca.iter().flat_map(|r| r.responses.iter()) {
            let vulnerability_cves = response.vulnerabilities.iter().flat_map(|v| v.cves.iter());
            let violation_cves = response.violations.iter().flat_map(|v| v.cves.iter());
            for cve in vulnerability_cves.chain(violation_cves) {
                if !cve.id.is_empty() {
                    cves.insert(cve.id.clone());
                }
            }
        }
        cves.into_iter().collect()
    }

    /// 사용자가 조치해야 할 발견 사항이 있는지 여부
    pub fn is_actionable(&self) -> bool {
        self.sca_issue_count() > 0 || self.jas.total_findings() > 0
    }

    /// 발견 사항으로 빌드를 실패시켜야 하는지 여부
    ///
    /// 워치/프로젝트 컨텍스트가 있으면 `fail_build`가 설정된 위반만 계산합니다.
    /// 컨텍스트가 없으면 서비스가 위반을 반환하지 않으므로 취약점 하나로도 충분합니다.
    pub fn check_fail_build(&self) -> bool {
        let mut responses = self.sca.iter().flat_map(|r| r.responses.iter());
        if self.has_context {
            responses
                .flat_map(|r| r.violations.iter())
                .any(|v| v.fail_build)
        } else {
            responses.any(|r| !r.vulnerabilities.is_empty())
        }
    }
}
