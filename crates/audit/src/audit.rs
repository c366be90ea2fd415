//! 감사 오케스트레이터 -- 상태 머신과 태스크 스케줄링
//!
//! [`Audit`]는 실행 하나를 다음 상태로 진행합니다:
//!
//! ```text
//! Init ─► EntitlementCheck ─► Scheduling ─► Running ─► Merging ─► Done(Success | PartialFailure)
//! ```
//!
//! - **Init**: 작업 디렉토리 확인, multi-scan ID 할당
//! - **EntitlementCheck**: 서비스 버전, 최소 버전, 고급 보안 권한
//! - **Scheduling**: 워커 시작 후 lockfile마다 SCA 태스크 하나, 권한이 있으면 분석기를
//!   설치하는 준비 태스크 하나. (모듈, 스캐너)마다의 fan-out은 워커 밖에서 실행
//! - **Running**: 슈퍼바이저가 그룹을 순서대로 비울 때까지 대기
//! - **Merging**: 공유 결과 수집
//!
//! 적용 가능성(applicability) 스캐너는 SCA가 찾은 CVE를 입력으로 받으므로 SCA 그룹이
//! 비워진 뒤에 제출됩니다. 확인할 CVE가 없으면 건너뜁니다.
//!
//! Running 이전의 실패는 `Err`로 반환됩니다. 개별 태스크의 실패는
//! [`AuditResults::errors`]에 모이고 성공한 결과는 유지됩니다.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use vigil_core::types::ScanCategory;
use vigil_jas_scanner::{
    AnalyzerEnv, AnalyzerRunner, AppsConfig, JasScanType, JasScanner, Module, ScratchRoot,
};
use vigil_sca_scanner::service::SERVICE_PRODUCT;
use vigil_sca_scanner::{
    GRAPH_SCAN_MIN_VERSION, GraphScanParams, GraphScanService, ScaScanner, ScaScannerConfig,
    ScanTarget, is_entitled_for_advanced_security, validate_minimum_version,
};

use crate::error::AuditError;
use crate::params::AuditParams;
use crate::results::{AuditOutcome, AuditResults};
use crate::runner::{ParallelScanRunner, ScanGroup, TaskLabel};

/// 오케스트레이터 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditState {
    Init,
    EntitlementCheck,
    Scheduling,
    Running,
    Merging,
    Done(AuditOutcome),
}

type SharedResults = Arc<Mutex<AuditResults>>;

/// 고급 스캐너 준비에 필요한 값
struct JasPlan<R: AnalyzerRunner> {
    scanner: Arc<JasScanner<R>>,
    apps: AppsConfig,
}

/// 감사 실행 하나
pub struct Audit<S: GraphScanService, R: AnalyzerRunner> {
    params: AuditParams,
    service: Arc<S>,
    analyzer: Arc<R>,
    state: AuditState,
}

impl<S: GraphScanService, R: AnalyzerRunner> Audit<S, R> {
    pub fn new(params: AuditParams, service: Arc<S>, analyzer: Arc<R>) -> Self {
        Self {
            params,
            service,
            analyzer,
            state: AuditState::Init,
        }
    }

    pub fn state(&self) -> AuditState {
        self.state
    }

    fn transition(&mut self, next: AuditState) {
        tracing::debug!(from = ?self.state, to = ?next, "audit state transition");
        self.state = next;
    }

    /// 감사를 끝까지 실행합니다.
    ///
    /// # Errors
    ///
    /// 준비 단계 실패: 잘못된 파라미터, 없는 작업 디렉토리, 서비스 버전/권한 검사,
    /// 읽을 수 없는 apps config, 대상 탐색 실패.
    pub async fn run(&mut self) -> Result<AuditResults, AuditError> {
        // Init
        self.params.validate()?;
        let mut working_dirs = Vec::with_capacity(self.params.working_dirs.len());
        for dir in &self.params.working_dirs {
            working_dirs.push(resolve_dir("working_dirs", dir).await?);
        }
        let multi_scan_id = uuid::Uuid::new_v4().to_string();
        let mut graph_params = self.params.graph_params();
        graph_params.multi_scan_id.clone_from(&multi_scan_id);

        // EntitlementCheck
        self.transition(AuditState::EntitlementCheck);
        let version = self.service.version().await.map_err(AuditError::Service)?;
        validate_minimum_version(SERVICE_PRODUCT, &version, GRAPH_SCAN_MIN_VERSION)
            .map_err(AuditError::Service)?;
        let entitled = is_entitled_for_advanced_security(self.service.as_ref(), &version)
            .await
            .map_err(AuditError::Service)?;
        tracing::info!(
            version = %version,
            multi_scan_id = %multi_scan_id,
            entitled,
            "service checks passed"
        );
        if !entitled {
            tracing::info!(
                "the account is not entitled for advanced security features, only dependency scanning will run"
            );
        }

        // Scheduling
        self.transition(AuditState::Scheduling);
        let results: SharedResults = Arc::new(Mutex::new(AuditResults {
            service_version: version,
            multi_scan_id: multi_scan_id.clone(),
            entitled_for_advanced_security: entitled,
            has_context: graph_params.has_context(),
            ..AuditResults::default()
        }));
        let runner = Arc::new(ParallelScanRunner::new(
            self.params.threads,
            self.params.queue_capacity,
        )?);

        let sca = Arc::new(self.sca_scanner(&working_dirs)?);
        let targets = sca.discover_targets().await.map_err(AuditError::ScaSetup)?;

        let mut jas = None;
        let mut scratch = None;
        if entitled {
            let project_dir = resolve_dir("project_dir", &self.params.project_dir).await?;
            let apps = AppsConfig::load_or_synthesize(&project_dir, &working_dirs)
                .await
                .map_err(AuditError::JasSetup)?;
            let root = Arc::new(
                ScratchRoot::create_in(&self.params.temp_dir)
                    .await
                    .map_err(AuditError::JasSetup)?,
            );
            let env = AnalyzerEnv::new().with_analytics(&multi_scan_id, &technologies(&targets));
            let scanner = Arc::new(
                JasScanner::new(Arc::clone(&self.analyzer), Arc::clone(&root), env)
                    .with_applicability(self.params.applicability.clone()),
            );
            jas = Some(JasPlan { scanner, apps });
            scratch = Some(root);
        }

        // 큐 용량보다 많은 태스크를 제출하려면 워커가 먼저 돌고 있어야 함
        let error_rx = runner
            .take_error_receiver()
            .ok_or_else(|| AuditError::Runner("error receiver already taken".to_owned()))?;
        let collector = spawn_error_collector(error_rx, Arc::clone(&results));
        let workers = tokio::spawn(Arc::clone(&runner).run());

        let scheduled = schedule(&runner, sca, targets, jas, &graph_params, &results).await;
        if let Err(e) = scheduled {
            tracing::error!(error = %e, "scheduling stopped early");
            runner.add_error(e);
        }

        // Running
        self.transition(AuditState::Running);
        let supervisor = Arc::clone(&runner).spawn_supervisor(async move {
            match scratch {
                Some(root) => root.release().await.map_err(AuditError::Cleanup),
                None => Ok(()),
            }
        });

        let mut late_errors = Vec::new();
        match workers.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => late_errors.push(e),
            Err(e) => late_errors.push(AuditError::Runner(format!("worker pool failed: {e}"))),
        }
        if let Err(e) = supervisor.await {
            late_errors.push(AuditError::Runner(format!("supervisor failed: {e}")));
        }
        if let Err(e) = collector.await {
            late_errors.push(AuditError::Runner(format!("error collector failed: {e}")));
        }

        // Merging
        self.transition(AuditState::Merging);
        let mut merged = std::mem::take(&mut *lock(&results));
        for err in late_errors {
            merged.errors.push(err);
        }
        merged.sca.sort_by(|a, b| a.descriptor.cmp(&b.descriptor));

        let outcome = merged.outcome();
        tracing::info!(
            sca_targets = merged.sca.len(),
            sca_issues = merged.sca_issue_count(),
            jas_findings = merged.jas.total_findings(),
            errors = merged.errors.len(),
            outcome = ?outcome,
            "audit finished"
        );
        self.transition(AuditState::Done(outcome));
        Ok(merged)
    }

    fn sca_scanner(&self, working_dirs: &[PathBuf]) -> Result<ScaScanner<S>, AuditError> {
        let config = ScaScannerConfig {
            working_dirs: working_dirs
                .iter()
                .map(|d| d.display().to_string())
                .collect(),
            exclusions: self.params.exclusions.clone(),
            recursive: self.params.recursive,
            max_file_size: self.params.max_file_size,
            ..ScaScannerConfig::default()
        };
        ScaScanner::new(config, Arc::clone(&self.service)).map_err(AuditError::ScaSetup)
    }
}

/// 새 상태로 감사를 실행합니다.
pub async fn run_audit<S: GraphScanService, R: AnalyzerRunner>(
    params: AuditParams,
    service: Arc<S>,
    analyzer: Arc<R>,
) -> Result<AuditResults, AuditError> {
    Audit::new(params, service, analyzer).run().await
}

/// SCA 태스크를 모두 제출한 뒤 고급 스캐너 준비 태스크를 제출합니다.
///
/// 준비 태스크가 제출될 때 SCA 카운터에는 이미 모든 대상이 반영되어 있으므로,
/// 적용 가능성 스케줄러가 SCA 그룹을 너무 일찍 빈 것으로 보는 일이 없습니다.
async fn schedule<S: GraphScanService, R: AnalyzerRunner>(
    runner: &Arc<ParallelScanRunner>,
    sca: Arc<ScaScanner<S>>,
    targets: Vec<ScanTarget>,
    jas: Option<JasPlan<R>>,
    graph_params: &GraphScanParams,
    results: &SharedResults,
) -> Result<(), AuditError> {
    for target in targets {
        let task = sca_task(
            Arc::clone(&sca),
            target,
            graph_params.clone(),
            Arc::clone(results),
        );
        runner.submit(ScanGroup::Sca, ScanCategory::Sca, task).await?;
    }

    if let Some(JasPlan { scanner, apps }) = jas {
        let setup = jas_setup_task(Arc::clone(runner), scanner, apps, Arc::clone(results));
        runner
            .submit(ScanGroup::JasSetup, TaskLabel::JasSetup, setup)
            .await?;
    }
    Ok(())
}

async fn sca_task<S: GraphScanService>(
    scanner: Arc<ScaScanner<S>>,
    target: ScanTarget,
    params: GraphScanParams,
    results: SharedResults,
) -> Result<(), AuditError> {
    let result = scanner
        .scan_target(&target, &params)
        .await
        .map_err(|source| AuditError::Sca {
            target: target.lockfile.display().to_string(),
            source,
        })?;
    lock(&results).sca.push(result);
    Ok(())
}

/// 분석기를 준비한 뒤 fan-out을 워커 밖에서 실행합니다.
///
/// 워커가 자기 큐에 제출하다 큐가 가득 차면 멈출 수 있으므로 제출은 분리된 태스크가
/// 맡습니다. 분리된 태스크도 JasSetup 그룹에 속하므로 슈퍼바이저 순서는 그대로입니다.
async fn jas_setup_task<R: AnalyzerRunner>(
    runner: Arc<ParallelScanRunner>,
    scanner: Arc<JasScanner<R>>,
    apps: AppsConfig,
    results: SharedResults,
) -> Result<(), AuditError> {
    scanner
        .runner()
        .ensure_available()
        .await
        .map_err(AuditError::JasSetup)?;

    let fan_out = fan_out_jas_scans(Arc::clone(&runner), scanner, apps, results);
    runner.spawn_detached(ScanGroup::JasSetup, TaskLabel::JasSetup, fan_out);
    Ok(())
}

async fn fan_out_jas_scans<R: AnalyzerRunner>(
    runner: Arc<ParallelScanRunner>,
    scanner: Arc<JasScanner<R>>,
    apps: AppsConfig,
    results: SharedResults,
) -> Result<(), AuditError> {
    let mut scheduled = 0usize;
    let mut applicability_modules = Vec::new();
    for module in apps.modules {
        let module = Arc::new(module);
        for scan_type in JasScanType::ALL {
            if module.should_skip_scanner(scan_type) {
                continue;
            }
            if scan_type == JasScanType::Applicability {
                applicability_modules.push(Arc::clone(&module));
                continue;
            }
            let task = jas_scan_task(
                Arc::clone(&scanner),
                scan_type,
                Arc::clone(&module),
                Arc::clone(&results),
            );
            runner
                .submit(ScanGroup::JasScanners, scan_type.category(), task)
                .await?;
            scheduled += 1;
        }
    }
    tracing::debug!(tasks = scheduled, "advanced scanner tasks scheduled");

    if applicability_modules.is_empty() {
        return Ok(());
    }
    applicability_after_sca(&runner, &scanner, applicability_modules, &results).await
}

/// SCA 그룹이 비워지면 발견된 CVE로 적용 가능성 태스크를 제출합니다.
async fn applicability_after_sca<R: AnalyzerRunner>(
    runner: &ParallelScanRunner,
    scanner: &Arc<JasScanner<R>>,
    modules: Vec<Arc<Module>>,
    results: &SharedResults,
) -> Result<(), AuditError> {
    runner.group(ScanGroup::Sca).wait().await;

    let cves = lock(results).sca_cves();
    if cves.is_empty() && scanner.applicability().cve_whitelist.is_empty() {
        tracing::info!("no CVEs found by dependency scanning, skipping applicability scan");
        return Ok(());
    }
    tracing::debug!(cves = cves.len(), modules = modules.len(), "scheduling applicability scans");

    let cves = Arc::new(cves);
    for module in modules {
        let task = applicability_task(
            Arc::clone(scanner),
            module,
            Arc::clone(&cves),
            Arc::clone(results),
        );
        runner
            .submit(ScanGroup::JasScanners, ScanCategory::Applicability, task)
            .await?;
    }
    Ok(())
}

async fn applicability_task<R: AnalyzerRunner>(
    scanner: Arc<JasScanner<R>>,
    module: Arc<Module>,
    cves: Arc<Vec<String>>,
    results: SharedResults,
) -> Result<(), AuditError> {
    let runs = scanner
        .run_applicability(&module, &cves)
        .await
        .map_err(|source| AuditError::Jas {
            scan_type: JasScanType::Applicability,
            module: module.name.clone(),
            source,
        })?;
    lock(&results).jas.add(JasScanType::Applicability, runs);
    Ok(())
}

async fn jas_scan_task<R: AnalyzerRunner>(
    scanner: Arc<JasScanner<R>>,
    scan_type: JasScanType,
    module: Arc<Module>,
    results: SharedResults,
) -> Result<(), AuditError> {
    let runs = scanner
        .run_scan(scan_type, &module)
        .await
        .map_err(|source| AuditError::Jas {
            scan_type,
            module: module.name.clone(),
            source,
        })?;
    lock(&results).jas.add(scan_type, runs);
    Ok(())
}

fn spawn_error_collector(
    mut rx: mpsc::UnboundedReceiver<AuditError>,
    results: SharedResults,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(err) = rx.recv().await {
            lock(&results).errors.push(err);
        }
    })
}

async fn resolve_dir(field: &str, dir: &Path) -> Result<PathBuf, AuditError> {
    let invalid = |reason: String| AuditError::Config {
        field: field.to_owned(),
        reason,
    };
    let abs = tokio::fs::canonicalize(dir)
        .await
        .map_err(|e| invalid(format!("{}: {e}", dir.display())))?;
    let meta = tokio::fs::metadata(&abs)
        .await
        .map_err(|e| invalid(format!("{}: {e}", abs.display())))?;
    if !meta.is_dir() {
        return Err(invalid(format!("{} is not a directory", abs.display())));
    }
    Ok(abs)
}

fn technologies(targets: &[ScanTarget]) -> Vec<String> {
    let mut techs: Vec<String> = targets.iter().map(|t| t.ecosystem.to_string()).collect();
    techs.sort();
    techs.dedup();
    techs
}

fn lock(results: &Mutex<AuditResults>) -> std::sync::MutexGuard<'_, AuditResults> {
    results.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_sca_scanner::Ecosystem;

    fn target(lockfile: &str, ecosystem: Ecosystem) -> ScanTarget {
        ScanTarget {
            lockfile: PathBuf::from(lockfile),
            working_dir: PathBuf::from("/repo"),
            ecosystem,
        }
    }

    #[test]
    fn technologies_are_unique_and_sorted() {
        let targets = vec![
            target("/repo/web/package-lock.json", Ecosystem::Npm),
            target("/repo/Cargo.lock", Ecosystem::Cargo),
            target("/repo/admin/package-lock.json", Ecosystem::Npm),
        ];
        assert_eq!(technologies(&targets), vec!["cargo", "npm"]);
        assert!(technologies(&[]).is_empty());
    }

    #[tokio::test]
    async fn resolve_dir_rejects_missing_and_files() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = resolve_dir("working_dirs", dir.path()).await.unwrap();
        assert!(resolved.is_absolute());

        let missing = resolve_dir("working_dirs", &dir.path().join("nope"))
            .await
            .unwrap_err();
        assert!(matches!(missing, AuditError::Config { ref field, .. } if field == "working_dirs"));

        let file = dir.path().join("file.txt");
        std::fs::write(&file, "x").unwrap();
        let err = resolve_dir("project_dir", &file).await.unwrap_err();
        assert!(err.to_string().contains("is not a directory"));
    }
}
