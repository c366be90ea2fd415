//! SCA 스캐너 -- 대상 탐색부터 영향 경로까지
//!
//! [`ScaScanner`]는 작업 디렉토리에서 lockfile을 찾고([`ScaScanner::discover_targets`]),
//! 대상 하나마다 트리 구성, 그래프 스캔, 영향 경로 계산을 수행합니다
//! ([`ScaScanner::scan_target`]).
//!
//! 대상별 스캔은 서로 독립적이므로 호출자는 대상마다 별도 태스크로 실행할 수 있습니다.
//!
//! # 처리 흐름
//!
//! ```text
//! working dirs --walkdir--> ScanTarget --parse--> DependencyGraph
//!     --build_dependency_tree--> GraphNode --scan_graph--> ScanResponse
//!     --build_impact_paths--> ScaScanResult
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use vigil_core::metrics as m;

use crate::config::ScaScannerConfig;
use crate::error::ScaScannerError;
use crate::exclude::ExcludeMatcher;
use crate::impact::build_impact_paths_for_scan_responses;
use crate::parser::{LockfileDetector, parser_for};
use crate::service::{GraphScanParams, GraphScanService};
use crate::tree::build_dependency_tree;
use crate::types::{Ecosystem, GraphNode, ScanResponse};

/// 스캔 대상 (lockfile 하나)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScanTarget {
    /// lockfile 경로
    pub lockfile: PathBuf,
    /// 대상을 찾은 작업 디렉토리
    pub working_dir: PathBuf,
    /// 생태계
    pub ecosystem: Ecosystem,
}

impl ScanTarget {
    /// lockfile이 있는 디렉토리
    pub fn project_dir(&self) -> &Path {
        self.lockfile.parent().unwrap_or(&self.working_dir)
    }
}

/// 대상 하나의 SCA 스캔 결과
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaScanResult {
    /// 대상 디렉토리
    pub target: String,
    /// 원본 lockfile 경로
    pub descriptor: String,
    /// 기술(생태계)
    pub technology: Ecosystem,
    /// 트리에 나타난 고유 의존성 ID
    pub unique_deps: Vec<String>,
    /// 분석에 사용한 트리
    #[serde(skip)]
    pub trees: Vec<GraphNode>,
    /// 서비스 응답 (영향 경로 포함)
    pub responses: Vec<ScanResponse>,
}

impl ScaScanResult {
    /// 모든 응답의 취약점+위반 개수
    pub fn issue_count(&self) -> usize {
        self.responses.iter().map(ScanResponse::issue_count).sum()
    }
}

/// SCA 스캐너
///
/// 그래프 스캔 백엔드 `S`를 공유하며 대상별 스캔을 수행합니다.
pub struct ScaScanner<S: GraphScanService> {
    config: ScaScannerConfig,
    service: Arc<S>,
    excludes: ExcludeMatcher,
}

impl<S: GraphScanService> ScaScanner<S> {
    /// 새 스캐너를 생성합니다.
    ///
    /// # Errors
    ///
    /// 설정 검증 또는 제외 패턴 컴파일이 실패하면 에러를 반환합니다.
    pub fn new(config: ScaScannerConfig, service: Arc<S>) -> Result<Self, ScaScannerError> {
        config.validate()?;
        let excludes = ExcludeMatcher::new(&config.exclusions)?;
        debug!(pattern = excludes.as_str(), "sca exclusion pattern");
        Ok(Self {
            config,
            service,
            excludes,
        })
    }

    /// 스캐너 설정
    pub fn config(&self) -> &ScaScannerConfig {
        &self.config
    }

    /// 그래프 스캔 백엔드
    pub fn service(&self) -> &Arc<S> {
        &self.service
    }

    /// 모든 작업 디렉토리에서 스캔 대상을 찾습니다.
    ///
    /// 결과는 경로 순으로 정렬됩니다. 존재하지 않는 작업 디렉토리는 에러입니다.
    pub async fn discover_targets(&self) -> Result<Vec<ScanTarget>, ScaScannerError> {
        let mut targets = Vec::new();
        for dir in &self.config.working_dirs {
            let dir = PathBuf::from(dir);
            let excludes = self.excludes.clone();
            let recursive = self.config.recursive;
            let found = tokio::task::spawn_blocking({
                let dir = dir.clone();
                move || discover_lockfiles(&dir, &excludes, recursive)
            })
            .await
            .map_err(|e| ScaScannerError::Io {
                path: dir.display().to_string(),
                source: std::io::Error::other(format!("spawn_blocking failed: {e}")),
            })??;
            targets.extend(found);
        }
        // 겹치는 작업 디렉토리에서 같은 lockfile이 두 번 발견될 수 있음
        targets.sort();
        targets.dedup_by(|a, b| a.lockfile == b.lockfile);
        info!(targets = targets.len(), "sca scan targets discovered");
        Ok(targets)
    }

    /// 대상 하나를 스캔합니다.
    ///
    /// lockfile 읽기, 파싱, 트리 구성, 그래프 스캔, 영향 경로 계산을 순서대로 수행합니다.
    pub async fn scan_target(
        &self,
        target: &ScanTarget,
        params: &GraphScanParams,
    ) -> Result<ScaScanResult, ScaScannerError> {
        let path_str = target.lockfile.display().to_string();
        let content = self.read_lockfile(&target.lockfile).await?;

        let parser = parser_for(target.ecosystem).ok_or_else(|| ScaScannerError::LockfileParse {
            path: path_str.clone(),
            reason: format!("no parser for ecosystem {}", target.ecosystem),
        })?;
        let graph = parser.parse(&content, &path_str)?;

        if graph.node_count() > self.config.max_nodes {
            return Err(ScaScannerError::LockfileParse {
                path: path_str,
                reason: format!(
                    "{} dependency nodes exceed maximum {}",
                    graph.node_count(),
                    self.config.max_nodes
                ),
            });
        }

        let (tree, unique) = build_dependency_tree(&graph.nodes, &graph.root);
        debug!(
            path = %path_str,
            unique = unique.len(),
            depth = tree.depth(),
            "dependency tree built"
        );

        let mut responses = vec![self.service.scan_graph(&tree, params).await?];
        let trees = vec![tree];
        build_impact_paths_for_scan_responses(&mut responses, &trees);

        let technology = target.ecosystem.to_string();
        for response in &mut responses {
            for vulnerability in &mut response.vulnerabilities {
                if vulnerability.technology.is_empty() {
                    vulnerability.technology.clone_from(&technology);
                }
            }
            for violation in &mut response.violations {
                if violation.technology.is_empty() {
                    violation.technology.clone_from(&technology);
                }
            }
        }

        let result = ScaScanResult {
            target: target.project_dir().display().to_string(),
            descriptor: path_str,
            technology: target.ecosystem,
            unique_deps: unique.into_iter().collect(),
            trees,
            responses,
        };

        metrics::counter!(m::SCA_TARGETS_SCANNED_TOTAL, m::LABEL_ECOSYSTEM => technology)
            .increment(1);
        metrics::counter!(m::SCA_FINDINGS_TOTAL).increment(result.issue_count() as u64);
        info!(
            target = %result.target,
            technology = %result.technology,
            dependencies = result.unique_deps.len(),
            issues = result.issue_count(),
            "sca scan completed"
        );

        Ok(result)
    }

    async fn read_lockfile(&self, path: &Path) -> Result<String, ScaScannerError> {
        let io_err = |source| ScaScannerError::Io {
            path: path.display().to_string(),
            source,
        };
        let metadata = tokio::fs::metadata(path).await.map_err(io_err)?;
        if usize::try_from(metadata.len()).unwrap_or(usize::MAX) > self.config.max_file_size {
            return Err(ScaScannerError::FileTooBig {
                path: path.display().to_string(),
                size: metadata.len(),
                max: self.config.max_file_size,
            });
        }
        tokio::fs::read_to_string(path).await.map_err(io_err)
    }
}

/// 디렉토리에서 lockfile을 탐색합니다 (동기 I/O).
///
/// `tokio::task::spawn_blocking` 내에서 호출되어야 합니다. 제외 패턴에 걸리는
/// 디렉토리는 하위까지 통째로 건너뜁니다.
fn discover_lockfiles(
    dir: &Path,
    excludes: &ExcludeMatcher,
    recursive: bool,
) -> Result<Vec<ScanTarget>, ScaScannerError> {
    if !dir.is_dir() {
        return Err(ScaScannerError::Io {
            path: dir.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "working directory does not exist"),
        });
    }

    let detector = LockfileDetector::new();
    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut targets = Vec::new();

    let walker = WalkDir::new(dir)
        .max_depth(max_depth)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| !excludes.is_excluded_path(dir, entry.path()));

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "failed to read directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(ecosystem) = detector.detect_ecosystem(entry.path()) {
            targets.push(ScanTarget {
                lockfile: entry.path().to_path_buf(),
                working_dir: dir.to_path_buf(),
                ecosystem,
            });
        }
    }

    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScaScannerConfigBuilder;
    use crate::service::LocalGraphScanService;
    use crate::vuln::VulnDb;

    const PACKAGE_LOCK: &str = r#"{
      "name": "web", "version": "1.0.0", "lockfileVersion": 3,
      "packages": {
        "": { "name": "web", "version": "1.0.0", "dependencies": { "a": "^1.0.0" } },
        "node_modules/a": { "version": "1.0.0", "dependencies": { "b": "^2.0.0" } },
        "node_modules/b": { "version": "2.0.0" }
      }
    }"#;

    fn scanner(dirs: Vec<String>, recursive: bool) -> ScaScanner<LocalGraphScanService> {
        let config = ScaScannerConfigBuilder::new()
            .working_dirs(dirs)
            .recursive(recursive)
            .build()
            .unwrap();
        let service = LocalGraphScanService::new(Arc::new(VulnDb::empty()));
        ScaScanner::new(config, Arc::new(service)).unwrap()
    }

    #[tokio::test]
    async fn discovers_nested_lockfiles_and_skips_excluded_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::write(root.join("Cargo.lock"), "").unwrap();
        std::fs::create_dir_all(root.join("web")).unwrap();
        std::fs::write(root.join("web/package-lock.json"), PACKAGE_LOCK).unwrap();
        std::fs::create_dir_all(root.join("web/node_modules/x")).unwrap();
        std::fs::write(root.join("web/node_modules/x/package-lock.json"), "{}").unwrap();

        let s = scanner(vec![root.display().to_string()], true);
        let targets = s.discover_targets().await.unwrap();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].ecosystem, Ecosystem::Cargo);
        assert_eq!(targets[1].ecosystem, Ecosystem::Npm);
        assert_eq!(targets[1].project_dir(), root.join("web"));
    }

    #[tokio::test]
    async fn non_recursive_discovery_stays_at_top_level() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("web")).unwrap();
        std::fs::write(dir.path().join("web/package-lock.json"), PACKAGE_LOCK).unwrap();

        let s = scanner(vec![dir.path().display().to_string()], false);
        assert!(s.discover_targets().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_working_dir_is_an_error() {
        let s = scanner(vec!["/definitely/not/here".to_owned()], true);
        assert!(matches!(
            s.discover_targets().await,
            Err(ScaScannerError::Io { .. })
        ));
    }

    #[tokio::test]
    async fn overlapping_working_dirs_yield_sorted_unique_targets() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("web")).unwrap();
        std::fs::write(root.join("web/package-lock.json"), PACKAGE_LOCK).unwrap();
        std::fs::write(root.join("Cargo.lock"), "").unwrap();

        let s = scanner(
            vec![
                root.join("web").display().to_string(),
                root.display().to_string(),
            ],
            true,
        );
        let targets = s.discover_targets().await.unwrap();
        let lockfiles: Vec<_> = targets.iter().map(|t| t.lockfile.clone()).collect();
        assert_eq!(
            lockfiles,
            vec![root.join("Cargo.lock"), root.join("web/package-lock.json")]
        );
        assert!(Ecosystem::Cargo < Ecosystem::Npm);
    }

    #[tokio::test]
    async fn scan_target_builds_tree_and_unique_deps() {
        let dir = tempfile::tempdir().unwrap();
        let lockfile = dir.path().join("package-lock.json");
        std::fs::write(&lockfile, PACKAGE_LOCK).unwrap();
        let target = ScanTarget {
            lockfile,
            working_dir: dir.path().to_path_buf(),
            ecosystem: Ecosystem::Npm,
        };

        let s = scanner(vec![dir.path().display().to_string()], true);
        let result = s
            .scan_target(&target, &GraphScanParams::default())
            .await
            .unwrap();
        assert_eq!(result.technology, Ecosystem::Npm);
        assert_eq!(
            result.unique_deps,
            vec!["npm://a:1.0.0", "npm://b:2.0.0", "npm://web:1.0.0"]
        );
        assert_eq!(result.trees[0].depth(), 3);
        assert_eq!(result.issue_count(), 0);
    }

    #[tokio::test]
    async fn oversized_lockfile_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let lockfile = dir.path().join("package-lock.json");
        std::fs::write(&lockfile, PACKAGE_LOCK).unwrap();
        let config = ScaScannerConfigBuilder::new()
            .working_dirs(vec![dir.path().display().to_string()])
            .max_file_size(16)
            .build()
            .unwrap();
        let service = LocalGraphScanService::new(Arc::new(VulnDb::empty()));
        let s = ScaScanner::new(config, Arc::new(service)).unwrap();
        let target = ScanTarget {
            lockfile,
            working_dir: dir.path().to_path_buf(),
            ecosystem: Ecosystem::Npm,
        };
        assert!(matches!(
            s.scan_target(&target, &GraphScanParams::default()).await,
            Err(ScaScannerError::FileTooBig { .. })
        ));
    }
}
