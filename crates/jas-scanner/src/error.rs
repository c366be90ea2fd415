//! 고급 스캐너 에러 타입
//!
//! [`JasScannerError`]는 분석기 배포, 하위 프로세스 실행, 앱 설정 로드,
//! 스캐너 입력 파일과 SARIF 출력 등 고급 스캐너 크레이트 내부의 모든 실패를 다룹니다.
//! `From<JasScannerError> for VigilError`로 `?` 전파가 가능합니다.

use std::io;

use vigil_core::error::{ConfigError, ScanError, VigilError};

/// 고급 스캐너 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum JasScannerError {
    /// 분석기 매니저 아카이브 다운로드 또는 압축 해제 실패
    #[error("failed to download analyzer manager from '{url}': {reason}")]
    AnalyzerDownload {
        /// 다운로드 URL
        url: String,
        /// 실패 사유
        reason: String,
    },

    /// 분석기 매니저가 설치되어 있지 않고 설치할 수도 없음
    #[error("analyzer manager unavailable: {0}")]
    AnalyzerUnavailable(String),

    /// 분석기 매니저 프로세스 실패
    #[error("{scan_type} scan failed: {reason}")]
    AnalyzerExec {
        /// 실행 중이던 스캐너
        scan_type: String,
        /// 실패 사유 (종료 상태, stderr 일부)
        reason: String,
    },

    /// 앱 설정 파일을 읽을 수 없거나 형식이 잘못됨
    #[error("invalid apps config '{path}': {reason}")]
    AppsConfig {
        /// 설정 파일 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 모듈 소스 루트가 존재하지 않음
    #[error("source root of module '{module}' not found: {path}")]
    MissingSourceRoot {
        /// 모듈 이름
        module: String,
        /// 해석된 소스 루트
        path: String,
    },

    /// 스캐너 입력 파일 생성 실패
    #[error("failed to create {scan_type} scanner config: {reason}")]
    ScannerConfig {
        /// 스캐너 종류
        scan_type: String,
        /// 실패 사유
        reason: String,
    },

    /// SARIF 출력을 읽을 수 없음
    #[error("failed to read SARIF results '{path}': {reason}")]
    Sarif {
        /// 결과 파일 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 임시 디렉토리 처리 실패
    #[error("scratch directory error: {0}")]
    Scratch(String),

    /// 잘못된 설정 값
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드 이름
        field: String,
        /// 실패 사유
        reason: String,
    },

    /// 파일시스템 에러
    #[error("io error at '{path}': {source}")]
    Io {
        /// 접근 중이던 경로
        path: String,
        /// 원인 에러
        source: io::Error,
    },
}

impl JasScannerError {
    /// I/O 에러를 발생 경로와 함께 감쌉니다.
    pub fn io(path: impl AsRef<std::path::Path>, source: io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

impl From<JasScannerError> for VigilError {
    fn from(err: JasScannerError) -> Self {
        match err {
            JasScannerError::AnalyzerDownload { .. }
            | JasScannerError::AnalyzerUnavailable(_)
            | JasScannerError::AnalyzerExec { .. } => {
                VigilError::Scan(ScanError::Analyzer(err.to_string()))
            }
            JasScannerError::AppsConfig { path, reason } => {
                VigilError::Config(ConfigError::ParseFailed {
                    reason: format!("{path}: {reason}"),
                })
            }
            JasScannerError::Config { field, reason } => {
                VigilError::Config(ConfigError::InvalidValue { field, reason })
            }
            JasScannerError::Io { source, .. } => VigilError::Io(source),
            JasScannerError::MissingSourceRoot { .. }
            | JasScannerError::ScannerConfig { .. }
            | JasScannerError::Sarif { .. }
            | JasScannerError::Scratch(_) => {
                VigilError::Scan(ScanError::Advanced(err.to_string()))
            }
        }
    }
}
