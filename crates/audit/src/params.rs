//! 감사 파라미터
//!
//! 실행 하나의 입력을 모으고 `build()`에서 검증합니다.
//!
//! ```
//! use vigil_audit::AuditParamsBuilder;
//!
//! let params = AuditParamsBuilder::new()
//!     .working_dirs(vec!["/srv/app".into()])
//!     .watches(vec!["prod".to_owned()])
//!     .threads(4)
//!     .build()
//!     .unwrap();
//! assert!(params.graph_params().has_context());
//! ```

use std::path::PathBuf;

use vigil_core::config::VigilConfig;
use vigil_jas_scanner::ApplicabilityOptions;
use vigil_sca_scanner::GraphScanParams;

use crate::error::AuditError;
use crate::runner::DEFAULT_QUEUE_CAPACITY;

const MAX_THREADS: usize = 256;

/// 감사 실행 하나의 입력
#[derive(Debug, Clone)]
pub struct AuditParams {
    /// 스캔할 디렉토리 (Init 단계에서 절대 경로로 변환)
    pub working_dirs: Vec<PathBuf>,
    /// `.vigil/apps-config.yml`이 있는 디렉토리
    pub project_dir: PathBuf,
    /// 실행 임시 루트의 상위 디렉토리
    pub temp_dir: PathBuf,
    pub threads: usize,
    pub queue_capacity: usize,
    pub watches: Vec<String>,
    pub project_key: String,
    pub repo_path: String,
    pub include_vulnerabilities: bool,
    pub include_licenses: bool,
    /// SCA 대상 탐색 제외 패턴
    pub exclusions: Vec<String>,
    pub recursive: bool,
    pub max_file_size: usize,
    pub applicability: ApplicabilityOptions,
}

impl Default for AuditParams {
    fn default() -> Self {
        Self {
            working_dirs: vec![PathBuf::from(".")],
            project_dir: PathBuf::from("."),
            temp_dir: std::env::temp_dir(),
            threads: 3,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            watches: Vec::new(),
            project_key: String::new(),
            repo_path: String::new(),
            include_vulnerabilities: false,
            include_licenses: false,
            exclusions: Vec::new(),
            recursive: true,
            max_file_size: 10 * 1024 * 1024,
            applicability: ApplicabilityOptions::default(),
        }
    }
}

impl AuditParams {
    /// multi-scan ID가 비어 있는 그래프 스캔 파라미터
    pub fn graph_params(&self) -> GraphScanParams {
        GraphScanParams {
            project_key: self.project_key.clone(),
            watches: self.watches.clone(),
            include_vulnerabilities: self.include_vulnerabilities,
            include_licenses: self.include_licenses,
            repo_path: self.repo_path.clone(),
            multi_scan_id: String::new(),
        }
    }

    pub fn validate(&self) -> Result<(), AuditError> {
        if self.working_dirs.is_empty() {
            return Err(AuditError::Config {
                field: "working_dirs".to_owned(),
                reason: "at least one working directory required".to_owned(),
            });
        }
        if self.threads == 0 || self.threads > MAX_THREADS {
            return Err(AuditError::Config {
                field: "threads".to_owned(),
                reason: format!("must be 1-{MAX_THREADS}"),
            });
        }
        if self.queue_capacity == 0 {
            return Err(AuditError::Config {
                field: "queue_capacity".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }
        Ok(())
    }
}

/// [`AuditParams`] 빌더
#[derive(Default)]
pub struct AuditParamsBuilder {
    params: AuditParams,
}

impl AuditParamsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// `[audit]`, `[sca]` 설정 섹션으로 빌더를 초기화합니다.
    pub fn from_core(core: &VigilConfig) -> Self {
        let audit = &core.audit;
        Self {
            params: AuditParams {
                threads: audit.threads,
                watches: audit.watches.clone(),
                project_key: core.effective_project().unwrap_or_default(),
                repo_path: audit.repo_path.clone(),
                include_vulnerabilities: audit.include_vulnerabilities,
                include_licenses: audit.include_licenses,
                exclusions: audit.exclusions.clone(),
                recursive: audit.recursive,
                max_file_size: core.sca.max_file_size,
                ..AuditParams::default()
            },
        }
    }

    pub fn working_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.params.working_dirs = dirs;
        self
    }

    pub fn project_dir(mut self, dir: PathBuf) -> Self {
        self.params.project_dir = dir;
        self
    }

    pub fn temp_dir(mut self, dir: PathBuf) -> Self {
        self.params.temp_dir = dir;
        self
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.params.threads = threads;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.params.queue_capacity = capacity;
        self
    }

    pub fn watches(mut self, watches: Vec<String>) -> Self {
        self.params.watches = watches;
        self
    }

    pub fn project_key(mut self, key: impl Into<String>) -> Self {
        self.params.project_key = key.into();
        self
    }

    pub fn repo_path(mut self, path: impl Into<String>) -> Self {
        self.params.repo_path = path.into();
        self
    }

    pub fn include_vulnerabilities(mut self, include: bool) -> Self {
        self.params.include_vulnerabilities = include;
        self
    }

    pub fn include_licenses(mut self, include: bool) -> Self {
        self.params.include_licenses = include;
        self
    }

    pub fn exclusions(mut self, exclusions: Vec<String>) -> Self {
        self.params.exclusions = exclusions;
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.params.recursive = recursive;
        self
    }

    pub fn applicability(mut self, options: ApplicabilityOptions) -> Self {
        self.params.applicability = options;
        self
    }

    /// 파라미터를 검증하고 반환합니다.
    ///
    /// # Errors
    ///
    /// 작업 디렉토리가 비었거나 스레드 수가 범위를 벗어나면 `AuditError::Config`.
    pub fn build(self) -> Result<AuditParams, AuditError> {
        self.params.validate()?;
        Ok(self.params)
    }
}
