#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`error`]: 도메인 에러 타입 (`JasScannerError`)
//! - [`sarif`]: 최소 SARIF 모델 (`SarifLog`, `Run`, `SarifResult`)
//! - [`normalize`]: 분석기 출력 정규화 (`normalize_run`, `severity_to_score`)
//! - [`apps_config`]: 프로젝트 모듈과 스캐너별 오버라이드 (`AppsConfig`, `Module`)
//! - [`scratch`]: 실행 단위 임시 디렉토리 (`ScratchRoot`)
//! - [`env`]: 자식 프로세스 환경 오버레이 (`AnalyzerEnv`)
//! - [`manager`]: 분석기 실행 파일 생명주기 (`AnalyzerRunner` trait, `AnalyzerManager`)
//! - [`scanners`]: 스캐너 종류와 실행 (`JasScanType`, `JasScanner`)
//!
//! # 아키텍처
//!
//! ```text
//! AppsConfig.modules x JasScanType
//!            |
//!      JasScanner::run_scan
//!            |
//!   ScratchRoot.acquire --> config.yaml
//!            |
//!   AnalyzerRunner::run (AnalyzerManager, once-installed)
//!            |
//!      results.sarif --> normalize_run --> Vec<Run>
//! ```

pub mod apps_config;
pub mod env;
pub mod error;
pub mod manager;
pub mod normalize;
pub mod sarif;
pub mod scanners;
pub mod scratch;

// --- Public API Re-exports ---

// Scanners
pub use scanners::{ApplicabilityOptions, JasScanType, JasScanner, ScanConfigFile};

// Analyzer manager
pub use manager::{AnalyzerInvocation, AnalyzerManager, AnalyzerManagerConfig, AnalyzerRunner};

// Error
pub use error::JasScannerError;

// Apps config
pub use apps_config::{APPS_CONFIG_PATH, AppsConfig, DEFAULT_EXCLUDE_PATTERNS, Module};

// Environment & scratch
pub use env::AnalyzerEnv;
pub use scratch::ScratchRoot;

// SARIF
pub use normalize::{DriverDefaults, normalize_run, read_scan_runs, severity_to_score};
pub use sarif::{Run, SarifLog, SarifResult};
