//! SCA 스캐너 설정
//!
//! [`ScaScannerConfig`]는 core의 `AuditConfig`/`ScaConfig`에서 필요한 값을 모으고
//! 스캐너 고유 한도(파일 크기, 노드 수)를 추가합니다.
//!
//! # 사용 예시
//!
//! ```
//! use vigil_sca_scanner::ScaScannerConfigBuilder;
//!
//! let config = ScaScannerConfigBuilder::new()
//!     .working_dirs(vec!["/srv/app".to_owned()])
//!     .exclusions(vec!["*fixtures*".to_owned()])
//!     .recursive(false)
//!     .build()
//!     .unwrap();
//! assert!(!config.recursive);
//! ```

use serde::{Deserialize, Serialize};

use vigil_core::config::VigilConfig;

use crate::error::ScaScannerError;
use crate::exclude::ExcludeMatcher;

/// 설정 상한값 상수
const MAX_FILE_SIZE: usize = 100 * 1024 * 1024; // 100 MB
const MAX_NODES_LIMIT: usize = 500_000;

/// SCA 스캐너 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaScannerConfig {
    /// 스캔 대상 작업 디렉토리 목록
    pub working_dirs: Vec<String>,
    /// 대상 탐색 제외 패턴 (비어 있으면 기본값)
    pub exclusions: Vec<String>,
    /// 하위 디렉토리 재귀 탐색 여부
    pub recursive: bool,
    /// lockfile 최대 허용 크기 (바이트)
    pub max_file_size: usize,
    /// lockfile 하나에서 허용하는 최대 노드 수
    pub max_nodes: usize,
}

impl Default for ScaScannerConfig {
    fn default() -> Self {
        Self {
            working_dirs: vec![".".to_owned()],
            exclusions: Vec::new(),
            recursive: true,
            max_file_size: 10 * 1024 * 1024,
            max_nodes: 50_000,
        }
    }
}

impl ScaScannerConfig {
    /// core 설정에서 스캐너 설정을 생성합니다.
    ///
    /// 작업 디렉토리는 호출자가 지정합니다.
    pub fn from_core(core: &VigilConfig, working_dirs: Vec<String>) -> Self {
        Self {
            working_dirs,
            exclusions: core.audit.exclusions.clone(),
            recursive: core.audit.recursive,
            max_file_size: core.sca.max_file_size,
            ..Self::default()
        }
    }

    /// 설정 값의 유효성을 검증합니다.
    ///
    /// # 검증 규칙
    ///
    /// - `working_dirs`: 하나 이상, 빈 문자열 불가
    /// - `max_file_size`: 1-104857600 (100MB)
    /// - `max_nodes`: 1-500000
    /// - `exclusions`: 정규식으로 컴파일 가능해야 함
    pub fn validate(&self) -> Result<(), ScaScannerError> {
        if self.working_dirs.is_empty() {
            return Err(ScaScannerError::Config {
                field: "working_dirs".to_owned(),
                reason: "at least one working directory required".to_owned(),
            });
        }
        if self.working_dirs.iter().any(String::is_empty) {
            return Err(ScaScannerError::Config {
                field: "working_dirs".to_owned(),
                reason: "working directory path must not be empty".to_owned(),
            });
        }
        if self.max_file_size == 0 || self.max_file_size > MAX_FILE_SIZE {
            return Err(ScaScannerError::Config {
                field: "max_file_size".to_owned(),
                reason: format!("must be 1-{MAX_FILE_SIZE}"),
            });
        }
        if self.max_nodes == 0 || self.max_nodes > MAX_NODES_LIMIT {
            return Err(ScaScannerError::Config {
                field: "max_nodes".to_owned(),
                reason: format!("must be 1-{MAX_NODES_LIMIT}"),
            });
        }
        ExcludeMatcher::new(&self.exclusions)?;
        Ok(())
    }
}

/// [`ScaScannerConfig`] 빌더
#[derive(Default)]
pub struct ScaScannerConfigBuilder {
    config: ScaScannerConfig,
}

impl ScaScannerConfigBuilder {
    /// 기본값을 가진 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 작업 디렉토리 목록을 설정합니다.
    pub fn working_dirs(mut self, dirs: Vec<String>) -> Self {
        self.config.working_dirs = dirs;
        self
    }

    /// 제외 패턴을 설정합니다.
    pub fn exclusions(mut self, exclusions: Vec<String>) -> Self {
        self.config.exclusions = exclusions;
        self
    }

    /// 재귀 탐색 여부를 설정합니다.
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.config.recursive = recursive;
        self
    }

    /// 최대 파일 크기(바이트)를 설정합니다.
    pub fn max_file_size(mut self, size: usize) -> Self {
        self.config.max_file_size = size;
        self
    }

    /// 최대 노드 수를 설정합니다.
    pub fn max_nodes(mut self, max: usize) -> Self {
        self.config.max_nodes = max;
        self
    }

    /// 설정을 검증하고 빌드합니다.
    ///
    /// # Errors
    ///
    /// 유효성 검증 실패 시 `ScaScannerError::Config` 또는 `ExcludePattern` 반환
    pub fn build(self) -> Result<ScaScannerConfig, ScaScannerError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
