//! 취약점 매칭 -- 로컬 DB 조회 및 컴포넌트 매칭
//!
//! [`VulnMatcher`]는 트리에 나타난 컴포넌트 ID를 [`VulnDb`]와 대조하여
//! 서비스 응답과 같은 형태의 [`Vulnerability`] 목록을 만듭니다.
//!
//! # 사용 흐름
//!
//! 1. `VulnDb::load_from_dir()` -- 로컬 JSON DB 로드
//! 2. `VulnMatcher::new(db)` -- 매처 생성
//! 3. `VulnMatcher::match_components(ids)` -- 고유 컴포넌트 ID 매칭

pub mod db;
pub mod version;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::types::{Component, Cve, Ecosystem, Vulnerability};

pub use db::{VersionRange, VulnDb, VulnDbEntry};
pub use version::{compare_versions, is_affected};

/// 취약점 매처
#[derive(Clone)]
pub struct VulnMatcher {
    db: Arc<VulnDb>,
}

impl VulnMatcher {
    /// 새 매처를 생성합니다.
    pub fn new(db: Arc<VulnDb>) -> Self {
        Self { db }
    }

    /// 데이터베이스 참조를 반환합니다.
    pub fn db(&self) -> &VulnDb {
        &self.db
    }

    /// 컴포넌트 ID 목록을 DB와 대조합니다.
    ///
    /// DB 엔트리 하나당 `Vulnerability` 하나가 만들어지며, 같은 엔트리에 걸리는
    /// 여러 컴포넌트(예: 서로 다른 버전)는 한 항목의 `components`에 모입니다.
    /// 결과는 DB 엔트리 순서를 따릅니다. 해석할 수 없는 ID는 무시합니다.
    pub fn match_components<'a, I>(&self, ids: I) -> Vec<Vulnerability>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut matched: BTreeMap<usize, Vulnerability> = BTreeMap::new();

        for id in ids {
            let Some((ecosystem, name, version)) = Ecosystem::parse_component_id(id) else {
                tracing::trace!(id, "skipping unparseable component id");
                continue;
            };

            for (idx, entry) in self.db.lookup(name, ecosystem) {
                if !is_affected(version, &entry.affected_ranges) {
                    continue;
                }
                let vulnerability = matched.entry(idx).or_insert_with(|| to_vulnerability(entry));
                vulnerability.components.insert(
                    id.to_owned(),
                    Component {
                        fixed_versions: entry.fixed_version.iter().cloned().collect(),
                        ..Component::default()
                    },
                );
            }
        }

        matched.into_values().collect()
    }
}

fn to_vulnerability(entry: &VulnDbEntry) -> Vulnerability {
    let cves = if entry.cve_id.is_empty() {
        Vec::new()
    } else {
        vec![Cve {
            id: entry.cve_id.clone(),
            cvss_v3_score: entry.cvss_v3_score.clone(),
        }]
    };
    Vulnerability {
        issue_id: entry.effective_issue_id().to_owned(),
        summary: entry.summary.clone(),
        severity: entry.severity.to_string(),
        cves,
        components: BTreeMap::new(),
        technology: entry.ecosystem.to_string(),
    }
}
