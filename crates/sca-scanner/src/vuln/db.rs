//! 취약점 데이터베이스 -- 로컬 JSON DB 로딩 및 조회
//!
//! [`VulnDb`]는 로컬 파일시스템의 JSON 파일에서 취약점 데이터를 로드합니다.
//!
//! # DB 디렉토리 구조
//!
//! ```text
//! /var/lib/vigil/vuln-db/
//!   cargo.json     # Cargo 생태계 취약점
//!   npm.json       # NPM 생태계 취약점
//! ```
//!
//! # JSON 형식
//!
//! ```json
//! [
//!   {
//!     "issue_id": "VIGIL-2024-0001",
//!     "cve_id": "CVE-2024-1234",
//!     "package": "lodash",
//!     "ecosystem": "Npm",
//!     "affected_ranges": [{ "introduced": "4.0.0", "fixed": "4.17.21" }],
//!     "fixed_version": "4.17.21",
//!     "severity": "High",
//!     "summary": "Prototype pollution in ...",
//!     "cvss_v3_score": "7.4"
//!   }
//! ]
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use vigil_core::types::Severity;

use crate::error::ScaScannerError;
use crate::types::Ecosystem;

/// 취약점 DB 파일 최대 크기 (50 MB)
const MAX_VULN_DB_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// 전체 취약점 DB 엔트리 최대 개수
const MAX_VULN_DB_ENTRIES: usize = 1_000_000;

/// 생태계별 DB 파일명
const ECOSYSTEM_FILES: [(&str, Ecosystem); 4] = [
    ("cargo.json", Ecosystem::Cargo),
    ("npm.json", Ecosystem::Npm),
    ("go.json", Ecosystem::Go),
    ("pip.json", Ecosystem::Pip),
];

/// 취약점 DB 엔트리
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VulnDbEntry {
    /// 이슈 ID (비어 있으면 CVE ID를 사용)
    #[serde(default)]
    pub issue_id: String,
    /// CVE ID (예: CVE-2024-1234)
    #[serde(default)]
    pub cve_id: String,
    /// 영향받는 패키지명
    pub package: String,
    /// 패키지 생태계
    pub ecosystem: Ecosystem,
    /// 영향받는 버전 범위
    #[serde(default)]
    pub affected_ranges: Vec<VersionRange>,
    /// 수정된 버전
    #[serde(default)]
    pub fixed_version: Option<String>,
    /// 심각도
    #[serde(default)]
    pub severity: Severity,
    /// 요약
    #[serde(default)]
    pub summary: String,
    /// CVSS v3 점수
    #[serde(default)]
    pub cvss_v3_score: Option<String>,
}

impl VulnDbEntry {
    /// 보고에 사용할 이슈 ID
    pub fn effective_issue_id(&self) -> &str {
        if self.issue_id.is_empty() {
            &self.cve_id
        } else {
            &self.issue_id
        }
    }
}

/// 영향받는 버전 범위 (`introduced <= v < fixed`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRange {
    /// 도입 버전 (이 버전부터 영향)
    #[serde(default)]
    pub introduced: Option<String>,
    /// 수정 버전 (None이면 미수정)
    #[serde(default)]
    pub fixed: Option<String>,
}

/// 취약점 데이터베이스
///
/// `(패키지명, 생태계)` 인덱스로 조회합니다.
#[derive(Debug, Default)]
pub struct VulnDb {
    entries: Vec<VulnDbEntry>,
    index: HashMap<(String, Ecosystem), Vec<usize>>,
}

impl VulnDb {
    /// 빈 데이터베이스를 생성합니다.
    pub fn empty() -> Self {
        Self::default()
    }

    fn build_index(entries: &[VulnDbEntry]) -> HashMap<(String, Ecosystem), Vec<usize>> {
        let mut index: HashMap<_, Vec<usize>> = HashMap::new();
        for (idx, entry) in entries.iter().enumerate() {
            index
                .entry((entry.package.clone(), entry.ecosystem))
                .or_default()
                .push(idx);
        }
        index
    }

    /// 엔트리 목록으로 데이터베이스를 생성합니다.
    pub fn from_entries(entries: Vec<VulnDbEntry>) -> Self {
        let index = Self::build_index(&entries);
        Self { entries, index }
    }

    /// JSON 문자열(`VulnDbEntry` 배열)에서 데이터베이스를 파싱합니다.
    pub fn from_json(json: &str) -> Result<Self, ScaScannerError> {
        let entries: Vec<VulnDbEntry> = serde_json::from_str(json)
            .map_err(|e| ScaScannerError::VulnDbParse(format!("failed to parse vuln db JSON: {e}")))?;
        Ok(Self::from_entries(entries))
    }

    /// 디렉토리에서 모든 생태계의 취약점 DB를 로드합니다.
    ///
    /// 없는 파일은 건너뜁니다. 동기 I/O를 수행하므로 async 컨텍스트에서는
    /// `tokio::task::spawn_blocking`으로 감싸서 호출합니다.
    pub fn load_from_dir(dir_path: &Path) -> Result<Self, ScaScannerError> {
        let mut all_entries = Vec::new();

        for (filename, _) in &ECOSYSTEM_FILES {
            let file_path = dir_path.join(filename);
            let load_err = |reason: String| ScaScannerError::VulnDbLoad {
                path: file_path.display().to_string(),
                reason,
            };

            let metadata = match std::fs::metadata(&file_path) {
                Ok(m) => m,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!(path = %file_path.display(), "vuln db file not found, skipping");
                    continue;
                }
                Err(e) => return Err(load_err(e.to_string())),
            };

            if metadata.len() > MAX_VULN_DB_FILE_SIZE {
                return Err(load_err(format!(
                    "file size {} bytes exceeds maximum {MAX_VULN_DB_FILE_SIZE} bytes",
                    metadata.len()
                )));
            }

            let content = std::fs::read_to_string(&file_path).map_err(|e| load_err(e.to_string()))?;
            let entries: Vec<VulnDbEntry> = serde_json::from_str(&content).map_err(|e| {
                ScaScannerError::VulnDbParse(format!("failed to parse {}: {e}", file_path.display()))
            })?;

            if all_entries.len() + entries.len() > MAX_VULN_DB_ENTRIES {
                tracing::warn!(
                    current = all_entries.len(),
                    new = entries.len(),
                    max = MAX_VULN_DB_ENTRIES,
                    "vulnerability database entry limit reached, truncating"
                );
                let remaining = MAX_VULN_DB_ENTRIES.saturating_sub(all_entries.len());
                all_entries.extend(entries.into_iter().take(remaining));
                break;
            }

            tracing::info!(path = %file_path.display(), entries = entries.len(), "loaded vuln db file");
            all_entries.extend(entries);
        }

        Ok(Self::from_entries(all_entries))
    }

    /// 전체 엔트리 수
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// 패키지 이름과 생태계로 `(엔트리 인덱스, 엔트리)` 목록을 조회합니다.
    pub fn lookup(&self, package: &str, ecosystem: Ecosystem) -> Vec<(usize, &VulnDbEntry)> {
        self.index
            .get(&(package.to_owned(), ecosystem))
            .map(|indices| {
                indices
                    .iter()
                    .filter_map(|&idx| self.entries.get(idx).map(|e| (idx, e)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// 전체 엔트리
    pub fn entries(&self) -> &[VulnDbEntry] {
        &self.entries
    }
}
