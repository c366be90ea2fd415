//! SCA 스캐너 에러 타입
//!
//! [`ScaScannerError`]는 SCA 스캐너 내에서 발생할 수 있는 모든 에러를 나타냅니다.
//! `From<ScaScannerError> for VigilError` 구현을 통해 `?` 연산자로
//! 상위 에러 타입으로 전파됩니다.
//!
//! # 에러 카테고리
//!
//! - **Lockfile 파싱**: `LockfileParse`
//! - **취약점 DB**: `VulnDbLoad`, `VulnDbParse`
//! - **원격 서비스**: `Service`, `VersionMismatch`, `InvalidVersion`
//! - **설정**: `Config`, `ExcludePattern`
//! - **파일 I/O**: `Io`, `FileTooBig`

use vigil_core::error::{ConfigError, ScanError, ServiceError, VigilError};

/// SCA 스캐너 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ScaScannerError {
    /// Lockfile 파싱 실패
    #[error("lockfile parse error: {path}: {reason}")]
    LockfileParse {
        /// 파싱 대상 파일 경로
        path: String,
        /// 파싱 실패 사유
        reason: String,
    },

    /// 취약점 DB 로딩 실패
    #[error("vulnerability db load error: {path}: {reason}")]
    VulnDbLoad {
        /// DB 파일 경로
        path: String,
        /// 로딩 실패 사유
        reason: String,
    },

    /// 취약점 DB 파싱 실패
    #[error("vulnerability db parse error: {0}")]
    VulnDbParse(String),

    /// 원격 서비스 요청 실패
    #[error("graph scan service error: {endpoint}: {reason}")]
    Service {
        /// 요청 엔드포인트
        endpoint: String,
        /// 실패 사유
        reason: String,
    },

    /// 서비스 버전이 최소 요구 버전보다 낮음
    #[error("{product} version {current} is below the minimum required version {minimum}")]
    VersionMismatch {
        /// 제품명
        product: String,
        /// 현재 버전
        current: String,
        /// 최소 요구 버전
        minimum: String,
    },

    /// 버전 문자열 파싱 실패
    #[error("version parse error: '{version}': {reason}")]
    InvalidVersion {
        /// 파싱 대상 버전 문자열
        version: String,
        /// 파싱 실패 사유
        reason: String,
    },

    /// 제외 패턴 컴파일 실패
    #[error("invalid exclusion pattern '{pattern}': {reason}")]
    ExcludePattern {
        /// 원본 패턴
        pattern: String,
        /// 실패 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 파일 I/O 에러
    #[error("io error: {path}: {source}")]
    Io {
        /// 관련 파일 경로
        path: String,
        /// 원본 I/O 에러
        source: std::io::Error,
    },

    /// 파일 크기 초과
    #[error("file too large: {path}: {size} bytes (max: {max})")]
    FileTooBig {
        /// 파일 경로
        path: String,
        /// 실제 파일 크기 (바이트)
        size: u64,
        /// 최대 허용 크기 (바이트)
        max: usize,
    },
}

impl From<ScaScannerError> for VigilError {
    fn from(err: ScaScannerError) -> Self {
        match err {
            ScaScannerError::VersionMismatch {
                product,
                current,
                minimum,
            } => VigilError::Service(ServiceError::VersionMismatch {
                product,
                current,
                minimum,
            }),
            ScaScannerError::Service { endpoint, reason } => {
                VigilError::Service(ServiceError::Request(format!("{endpoint}: {reason}")))
            }
            ScaScannerError::Config { field, reason } => {
                VigilError::Config(ConfigError::InvalidValue { field, reason })
            }
            ScaScannerError::ExcludePattern { pattern, reason } => {
                VigilError::Config(ConfigError::InvalidValue {
                    field: "audit.exclusions".to_owned(),
                    reason: format!("{pattern}: {reason}"),
                })
            }
            other => VigilError::Scan(ScanError::Sca(other.to_string())),
        }
    }
}
