//! 메트릭 이름 상수
//!
//! 각 크레이트는 이 상수를 사용하여 `metrics::counter!()` 매크로를 호출합니다.
//! 레코더(exporter) 설치는 바이너리의 몫이며, 설치되지 않은 경우 호출은 no-op입니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `vigil_`
//! - 모듈명: `audit_`, `sca_`, `jas_`, `analyzer_`
//! - 접미어: `_total` (counter)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 스캔 카테고리 레이블 키 (sca, secrets, iac, applicability, sast)
pub const LABEL_CATEGORY: &str = "category";

/// 에코시스템 레이블 키 (cargo, npm)
pub const LABEL_ECOSYSTEM: &str = "ecosystem";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── Audit Runner 메트릭 ──────────────────────────────────────────

/// Audit: 제출된 태스크 수 (counter, label: category)
pub const AUDIT_TASKS_SUBMITTED_TOTAL: &str = "vigil_audit_tasks_submitted_total";

/// Audit: 실패한 태스크 수 (counter)
pub const AUDIT_TASK_FAILURES_TOTAL: &str = "vigil_audit_task_failures_total";

// ─── SCA 메트릭 ──────────────────────────────────────────────────

/// SCA: 스캔한 대상(lockfile) 수 (counter, label: ecosystem)
pub const SCA_TARGETS_SCANNED_TOTAL: &str = "vigil_sca_targets_scanned_total";

/// SCA: 발견된 취약점/위반 수 (counter)
pub const SCA_FINDINGS_TOTAL: &str = "vigil_sca_findings_total";

// ─── 고급 스캐너 메트릭 ───────────────────────────────────────────

/// JAS: 정규화 후 남은 결과 수 (counter, label: category)
pub const JAS_FINDINGS_TOTAL: &str = "vigil_jas_findings_total";

/// Analyzer: 바이너리 다운로드 시도 수 (counter, label: result)
pub const ANALYZER_DOWNLOADS_TOTAL: &str = "vigil_analyzer_downloads_total";
