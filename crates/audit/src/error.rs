//! 감사 에러 타입
//!
//! [`AuditError`]는 치명적인 준비 단계 실패(서비스 검사, 설정, 데이터)와
//! 태스크 단위 실패를 구분합니다. 태스크 단위 실패는
//! [`ScanErrors`](crate::results::ScanErrors)로 모이며 다른 태스크는 계속 실행됩니다.

use vigil_core::error::{ConfigError, ScanError, ServiceError, VigilError};
use vigil_jas_scanner::{JasScanType, JasScannerError};
use vigil_sca_scanner::ScaScannerError;

use crate::runner::TaskLabel;

/// 감사 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// 잘못된 감사 파라미터
    #[error("config error: {field}: {reason}")]
    Config {
        /// 파라미터 이름
        field: String,
        /// 실패 사유
        reason: String,
    },

    /// 버전 또는 권한 검사 실패
    #[error("service check failed: {0}")]
    Service(#[source] ScaScannerError),

    /// SCA 준비 실패 (스캐너 생성, 대상 탐색)
    #[error("sca setup failed: {0}")]
    ScaSetup(#[source] ScaScannerError),

    /// SCA 대상 하나의 스캔 실패
    #[error("sca scan of '{target}' failed: {source}")]
    Sca {
        /// lockfile 경로
        target: String,
        /// 원인 에러
        source: ScaScannerError,
    },

    /// 고급 스캐너 준비 실패 (데이터 또는 분석기 다운로드)
    #[error("advanced scanner setup failed: {0}")]
    JasSetup(#[source] JasScannerError),

    /// 모듈 하나에 대한 고급 스캐너 하나의 실패
    #[error("{scan_type} scan of module '{module}' failed: {source}")]
    Jas {
        /// 스캐너
        scan_type: JasScanType,
        /// 모듈 이름
        module: String,
        /// 원인 에러
        source: JasScannerError,
    },

    /// 임시 디렉토리 정리 실패
    #[error("cleanup failed: {0}")]
    Cleanup(#[source] JasScannerError),

    /// 태스크 패닉
    #[error("{task} task panicked: {reason}")]
    TaskPanicked {
        /// 태스크 라벨
        task: TaskLabel,
        /// 패닉 내용
        reason: String,
    },

    /// 러너 오용 또는 내부 실패
    #[error("runner error: {0}")]
    Runner(String),
}

impl From<AuditError> for VigilError {
    fn from(err: AuditError) -> Self {
        match err {
            AuditError::Config { field, reason } => {
                VigilError::Config(ConfigError::InvalidValue { field, reason })
            }
            AuditError::Service(source) => match source {
                ScaScannerError::VersionMismatch {
                    product,
                    current,
                    minimum,
                } => VigilError::Service(ServiceError::VersionMismatch {
                    product,
                    current,
                    minimum,
                }),
                other => VigilError::Service(ServiceError::Entitlement(other.to_string())),
            },
            AuditError::ScaSetup(source) => source.into(),
            AuditError::JasSetup(source) => source.into(),
            AuditError::Sca { .. } => VigilError::Scan(ScanError::Sca(err.to_string())),
            AuditError::Jas { .. } | AuditError::Cleanup(_) => {
                VigilError::Scan(ScanError::Advanced(err.to_string()))
            }
            AuditError::TaskPanicked { .. } | AuditError::Runner(_) => {
                VigilError::Scan(ScanError::Runner(err.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sca_error_names_target() {
        let err = AuditError::Sca {
            target: "/repo/package-lock.json".to_owned(),
            source: ScaScannerError::LockfileParse {
                path: "/repo/package-lock.json".to_owned(),
                reason: "expected value".to_owned(),
            },
        };
        assert!(err.to_string().starts_with("sca scan of '/repo/package-lock.json' failed"));
    }

    #[test]
    fn version_mismatch_maps_to_service_error() {
        let err: VigilError = AuditError::Service(ScaScannerError::VersionMismatch {
            product: "Xray".to_owned(),
            current: "3.10.0".to_owned(),
            minimum: "3.29.0".to_owned(),
        })
        .into();
        assert!(matches!(
            err,
            VigilError::Service(ServiceError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn jas_error_display() {
        let err = AuditError::Jas {
            scan_type: JasScanType::Secrets,
            module: "api".to_owned(),
            source: JasScannerError::AnalyzerExec {
                scan_type: "secrets".to_owned(),
                reason: "exit code 2".to_owned(),
            },
        };
        assert_eq!(
            err.to_string(),
            "secrets scan of module 'api' failed: secrets scan failed: exit code 2"
        );
    }

    #[test]
    fn panics_map_to_runner_scan_error() {
        let err: VigilError = AuditError::TaskPanicked {
            task: TaskLabel::Scan(vigil_core::types::ScanCategory::Iac),
            reason: "boom".to_owned(),
        }
        .into();
        assert!(matches!(err, VigilError::Scan(ScanError::Runner(_))));
    }
}
