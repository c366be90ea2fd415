#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`error`]: 감사 에러 타입 (`AuditError`)
//! - [`params`]: 감사 입력 (`AuditParams`, `AuditParamsBuilder`)
//! - [`runner`]: 태스크 그룹을 가진 bounded 워커 풀 (`ParallelScanRunner`)
//! - [`results`]: 결과 집계 (`AuditResults`, `ScanErrors`, `JasResults`)
//! - [`audit`]: 오케스트레이터 상태 머신 (`Audit`, `run_audit`)
//!
//! # 아키텍처
//!
//! ```text
//! Audit::run
//!   ├─ GraphScanService: version / entitlement
//!   ├─ ScaScanner::discover_targets ──► [Sca] task per lockfile
//!   └─ (entitled) [JasSetup] ensure analyzer
//!                       └─ (detached) fan-out ──► [JasScanners] task per module x scanner
//!                                     └─ wait Sca ──► [JasScanners] applicability + SCA CVEs
//!                                                        │
//!   ParallelScanRunner workers ──► errors ──► collector ─┤
//!                                                        ▼
//!   supervisor: Sca + JasSetup ─► JasScanners ─► [Cleanup] scratch release ─► done
//! ```

pub mod audit;
pub mod error;
pub mod params;
pub mod results;
pub mod runner;

// --- Public API Re-exports ---

// 오케스트레이션
pub use audit::{Audit, AuditState, run_audit};

// 에러
pub use error::AuditError;

// 파라미터
pub use params::{AuditParams, AuditParamsBuilder};

// 러너
pub use runner::{
    DEFAULT_QUEUE_CAPACITY, ParallelScanRunner, ScanGroup, ScanTask, TaskGroup, TaskLabel,
};

// 결과
pub use results::{AuditOutcome, AuditResults, JasResults, ScanErrors};
