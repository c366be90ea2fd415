//! 에러 타입: 도메인별 에러 정의

/// Vigil 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum VigilError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 원격 취약점 서비스 에러
    #[error("service error: {0}")]
    Service(#[from] ServiceError),

    /// 스캔 실행 에러
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 원격 서비스 에러
///
/// 버전 확인, 권한(entitlement) 확인, 그래프 스캔 요청 단계에서 발생합니다.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// 서비스에 연결할 수 없음
    #[error("service unreachable: {0}")]
    Unreachable(String),

    /// 서비스 버전이 최소 요구 버전보다 낮음
    #[error("{product} version {current} is below the minimum required version {minimum}")]
    VersionMismatch {
        product: String,
        current: String,
        minimum: String,
    },

    /// 권한 확인 실패
    #[error("entitlement check failed: {0}")]
    Entitlement(String),

    /// 요청 실패
    #[error("request failed: {0}")]
    Request(String),
}

/// 스캔 실행 에러
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// 의존성(SCA) 스캔 실패
    #[error("sca scan failed: {0}")]
    Sca(String),

    /// 고급 스캐너 실패
    #[error("advanced scan failed: {0}")]
    Advanced(String),

    /// 분석기 바이너리 관련 실패
    #[error("analyzer manager: {0}")]
    Analyzer(String),

    /// 병렬 실행기 에러
    #[error("runner error: {0}")]
    Runner(String),
}
