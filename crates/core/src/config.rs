//! 설정 관리: vigil.toml 파싱 및 런타임 설정
//!
//! [`VigilConfig`]는 모든 크레이트의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`VIGIL_AUDIT_THREADS=8` 형식)
//! 3. 설정 파일 (`vigil.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), vigil_core::error::VigilError> {
//! use vigil_core::config::VigilConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = VigilConfig::load("vigil.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = VigilConfig::parse("[audit]\nthreads = 8")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, VigilError};

/// 프로젝트 키가 비어 있을 때 참조하는 환경변수
pub const PROJECT_ENV_KEY: &str = "VIGIL_PROJECT";

/// 스레드 수 상한
const MAX_THREADS: usize = 256;

/// Vigil 통합 설정
///
/// `vigil.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VigilConfig {
    /// 일반 설정 (로깅)
    #[serde(default)]
    pub general: GeneralConfig,
    /// 원격 취약점 서비스 연결 정보
    #[serde(default)]
    pub server: ServerConfig,
    /// 감사(audit) 실행 설정
    #[serde(default)]
    pub audit: AuditConfig,
    /// 분석기 바이너리 설정
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    /// SCA 스캐너 설정
    #[serde(default)]
    pub sca: ScaConfig,
}

impl VigilConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, VigilError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 파일이 없으면 기본값에 환경변수 오버라이드만 적용합니다.
    ///
    /// `audit` 명령처럼 설정 파일이 선택 사항인 경우에 사용합니다.
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self, VigilError> {
        let mut config = match Self::from_file(path.as_ref()).await {
            Ok(config) => config,
            Err(VigilError::Config(ConfigError::FileNotFound { path })) => {
                tracing::debug!(path = %path, "config file not found, using defaults");
                Self::default()
            }
            Err(e) => return Err(e),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, VigilError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                VigilError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                VigilError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, VigilError> {
        toml::from_str(toml_str).map_err(|e| {
            VigilError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `VIGIL_{SECTION}_{FIELD}`
    /// 예: `VIGIL_SERVER_URL=https://example.jfrog.io/xray/`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "VIGIL_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "VIGIL_GENERAL_LOG_FORMAT");

        // Server
        override_string(&mut self.server.url, "VIGIL_SERVER_URL");
        override_string(&mut self.server.access_token, "VIGIL_SERVER_ACCESS_TOKEN");
        override_u64(&mut self.server.timeout_secs, "VIGIL_SERVER_TIMEOUT_SECS");

        // Audit
        override_usize(&mut self.audit.threads, "VIGIL_AUDIT_THREADS");
        override_csv(&mut self.audit.watches, "VIGIL_AUDIT_WATCHES");
        override_string(&mut self.audit.project, "VIGIL_AUDIT_PROJECT");
        override_string(&mut self.audit.repo_path, "VIGIL_AUDIT_REPO_PATH");
        override_bool(
            &mut self.audit.include_vulnerabilities,
            "VIGIL_AUDIT_INCLUDE_VULNERABILITIES",
        );
        override_bool(
            &mut self.audit.include_licenses,
            "VIGIL_AUDIT_INCLUDE_LICENSES",
        );
        override_bool(&mut self.audit.fail, "VIGIL_AUDIT_FAIL");
        override_csv(&mut self.audit.exclusions, "VIGIL_AUDIT_EXCLUSIONS");
        override_bool(&mut self.audit.recursive, "VIGIL_AUDIT_RECURSIVE");

        // Analyzer
        override_string(&mut self.analyzer.home_dir, "VIGIL_ANALYZER_HOME_DIR");
        override_string(&mut self.analyzer.download_url, "VIGIL_ANALYZER_DOWNLOAD_URL");
        override_string(&mut self.analyzer.version, "VIGIL_ANALYZER_VERSION");
        override_string(&mut self.analyzer.log_level, "VIGIL_ANALYZER_LOG_LEVEL");

        // SCA
        override_string(&mut self.sca.mode, "VIGIL_SCA_MODE");
        override_string(&mut self.sca.vuln_db_path, "VIGIL_SCA_VULN_DB_PATH");
        override_usize(&mut self.sca.max_file_size, "VIGIL_SCA_MAX_FILE_SIZE");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), VigilError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        if self.audit.threads == 0 || self.audit.threads > MAX_THREADS {
            return Err(ConfigError::InvalidValue {
                field: "audit.threads".to_owned(),
                reason: format!("must be 1-{MAX_THREADS}"),
            }
            .into());
        }

        if self.server.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.timeout_secs".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        let valid_modes = ["remote", "local"];
        if !valid_modes.contains(&self.sca.mode.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "sca.mode".to_owned(),
                reason: format!("must be one of: {}", valid_modes.join(", ")),
            }
            .into());
        }

        // remote 모드는 서버 URL 필수
        if self.sca.mode == "remote" && self.server.url.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "server.url".to_owned(),
                reason: "server url is required when sca.mode is 'remote'".to_owned(),
            }
            .into());
        }

        if self.sca.mode == "local" && self.sca.vuln_db_path.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "sca.vuln_db_path".to_owned(),
                reason: "vuln_db_path must not be empty when sca.mode is 'local'".to_owned(),
            }
            .into());
        }

        if self.sca.max_file_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sca.max_file_size".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        Ok(())
    }

    /// 유효한 프로젝트 키를 반환합니다.
    ///
    /// 설정값이 비어 있으면 `VIGIL_PROJECT` 환경변수를 사용합니다.
    pub fn effective_project(&self) -> Option<String> {
        if !self.audit.project.is_empty() {
            return Some(self.audit.project.clone());
        }
        std::env::var(PROJECT_ENV_KEY)
            .ok()
            .filter(|v| !v.is_empty())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 원격 서비스 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 서비스 기본 URL (예: `https://acme.jfrog.io/xray/`)
    pub url: String,
    /// 액세스 토큰
    #[serde(skip_serializing_if = "String::is_empty")]
    pub access_token: String,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            access_token: String::new(),
            timeout_secs: 60,
        }
    }
}

/// 감사 실행 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// 워커 수
    pub threads: usize,
    /// 워치 목록
    pub watches: Vec<String>,
    /// 프로젝트 키 (비어 있으면 `VIGIL_PROJECT` 사용)
    pub project: String,
    /// 대상 저장소 경로
    pub repo_path: String,
    /// 워치/프로젝트 컨텍스트와 무관하게 모든 취약점 포함
    pub include_vulnerabilities: bool,
    /// 라이선스 정보 포함
    pub include_licenses: bool,
    /// 위반 발견 시 빌드 실패 처리
    pub fail: bool,
    /// SCA 대상 탐색 제외 패턴 (와일드카드)
    pub exclusions: Vec<String>,
    /// 하위 디렉토리까지 재귀 탐색
    pub recursive: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            threads: 3,
            watches: Vec::new(),
            project: String::new(),
            repo_path: String::new(),
            include_vulnerabilities: false,
            include_licenses: false,
            fail: true,
            exclusions: Vec::new(),
            recursive: true,
        }
    }
}

/// 분석기 바이너리 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// 캐시 루트 디렉토리 (비어 있으면 `$HOME/.vigil/dependencies`)
    pub home_dir: String,
    /// 배포 zip 다운로드 URL
    pub download_url: String,
    /// 기대 버전 (캐시 유효성 판단에 사용)
    pub version: String,
    /// 분석기에 전달할 로그 레벨
    pub log_level: String,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            home_dir: String::new(),
            download_url: String::new(),
            version: "1.8.14".to_owned(),
            log_level: "info".to_owned(),
        }
    }
}

/// SCA 스캐너 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaConfig {
    /// 스캔 모드 (remote: 원격 서비스, local: 로컬 취약점 DB)
    pub mode: String,
    /// 로컬 취약점 DB 경로 (local 모드)
    pub vuln_db_path: String,
    /// lockfile 최대 크기 (바이트)
    pub max_file_size: usize,
}

impl Default for ScaConfig {
    fn default() -> Self {
        Self {
            mode: "local".to_owned(),
            vuln_db_path: "/var/lib/vigil/vuln-db".to_owned(),
            max_file_size: 10 * 1024 * 1024,
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}
