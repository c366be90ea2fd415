//! 고급 스캐너 -- 분석기 기반 스캐너 종류와 실행
//!
//! [`JasScanType`]은 분석기 바이너리를 쓰는 스캐너의 닫힌 집합입니다.
//! [`JasScanner`]는 모든 스캐너 태스크가 공유하는 것(분석기 러너, 임시 루트,
//! 분석 환경 변수)을 보관하고, 모듈 하나에 스캐너 하나를 실행합니다.
//!
//! ```text
//! scratch.acquire(type) ─► config.yaml ─► runner.run() ─► results.sarif
//!                                                              │
//!                                                   read + normalize ─► Vec<Run>
//! ```

pub mod config;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use vigil_core::metrics as m;
use vigil_core::types::ScanCategory;

use crate::apps_config::Module;
use crate::env::AnalyzerEnv;
use crate::error::JasScannerError;
use crate::manager::{AnalyzerInvocation, AnalyzerRunner};
use crate::normalize::{DriverDefaults, read_scan_runs};
use crate::sarif::Run;
use crate::scratch::ScratchRoot;

pub use config::{ApplicabilityOptions, ScanConfigFile};

const CONFIG_FILE_NAME: &str = "config.yaml";
const RESULTS_FILE_NAME: &str = "results.sarif";

/// 분석기 기반 스캐너 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JasScanType {
    Applicability,
    Secrets,
    Iac,
    Sast,
}

impl JasScanType {
    /// 스케줄링 순서
    pub const ALL: [JasScanType; 4] = [
        JasScanType::Applicability,
        JasScanType::Secrets,
        JasScanType::Iac,
        JasScanType::Sast,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Applicability => "applicability",
            Self::Secrets => "secrets",
            Self::Iac => "iac",
            Self::Sast => "sast",
        }
    }

    /// 분석기 하위 명령
    pub fn command(&self) -> &'static str {
        match self {
            Self::Applicability => "ca",
            Self::Secrets => "sec",
            Self::Iac => "iac",
            Self::Sast => "zd",
        }
    }

    /// 스캐너 입력 파일의 `type` 필드
    pub fn scanner_type(&self) -> &'static str {
        match self {
            Self::Applicability => "analyze-applicability",
            Self::Secrets => "secrets-scan",
            Self::Iac => "iac-scan-modules",
            Self::Sast => "sast",
        }
    }

    /// 기본 문서 URL 뒤에 붙는 페이지 이름
    pub fn docs_suffix(&self) -> &'static str {
        match self {
            Self::Applicability => "contextual-analysis",
            Self::Secrets => "secrets",
            Self::Iac => "infrastructure-as-code-iac",
            Self::Sast => "sast",
        }
    }

    pub fn category(&self) -> ScanCategory {
        match self {
            Self::Applicability => ScanCategory::Applicability,
            Self::Secrets => ScanCategory::Secrets,
            Self::Iac => ScanCategory::Iac,
            Self::Sast => ScanCategory::Sast,
        }
    }

    /// 고급 스캔 카테고리를 스캐너로 되돌립니다. `Sca`는 대응하는 스캐너가 없습니다.
    pub fn from_category(category: ScanCategory) -> Option<Self> {
        match category {
            ScanCategory::Sca => None,
            ScanCategory::Applicability => Some(Self::Applicability),
            ScanCategory::Secrets => Some(Self::Secrets),
            ScanCategory::Iac => Some(Self::Iac),
            ScanCategory::Sast => Some(Self::Sast),
        }
    }
}

impl fmt::Display for JasScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 고급 스캐너 태스크의 공유 컨텍스트
pub struct JasScanner<R: AnalyzerRunner> {
    runner: Arc<R>,
    scratch: Arc<ScratchRoot>,
    env: AnalyzerEnv,
    applicability: ApplicabilityOptions,
}

impl<R: AnalyzerRunner> JasScanner<R> {
    pub fn new(runner: Arc<R>, scratch: Arc<ScratchRoot>, env: AnalyzerEnv) -> Self {
        Self {
            runner,
            scratch,
            env,
            applicability: ApplicabilityOptions::default(),
        }
    }

    /// 적용 가능성 스캐너에 전달할 옵션을 설정합니다.
    pub fn with_applicability(mut self, options: ApplicabilityOptions) -> Self {
        self.applicability = options;
        self
    }

    pub fn runner(&self) -> &Arc<R> {
        &self.runner
    }

    pub fn scratch(&self) -> &Arc<ScratchRoot> {
        &self.scratch
    }

    pub fn env(&self) -> &AnalyzerEnv {
        &self.env
    }

    pub fn applicability(&self) -> &ApplicabilityOptions {
        &self.applicability
    }

    /// 모듈 하나에 스캐너 하나를 실행하고 정규화된 run을 반환합니다.
    ///
    /// # Errors
    ///
    /// 임시 디렉토리, 설정 파일, 분석기, SARIF 에러를 그대로 반환합니다.
    /// 호출자는 다른 스캐너에 영향을 주지 않고 에러 채널로 보냅니다.
    pub async fn run_scan(
        &self,
        scan_type: JasScanType,
        module: &Module,
    ) -> Result<Vec<Run>, JasScannerError> {
        self.run_with(scan_type, module, &self.applicability).await
    }

    /// SCA에서 발견된 `cves`로 적용 가능성 스캐너를 실행합니다.
    ///
    /// `cves`는 설정된 `cve_whitelist`에 합쳐집니다.
    pub async fn run_applicability(
        &self,
        module: &Module,
        cves: &[String],
    ) -> Result<Vec<Run>, JasScannerError> {
        let mut options = self.applicability.clone();
        options.cve_whitelist.extend(cves.iter().cloned());
        options.cve_whitelist.sort();
        options.cve_whitelist.dedup();
        self.run_with(JasScanType::Applicability, module, &options)
            .await
    }

    async fn run_with(
        &self,
        scan_type: JasScanType,
        module: &Module,
        applicability: &ApplicabilityOptions,
    ) -> Result<Vec<Run>, JasScannerError> {
        let dir = self.scratch.acquire(scan_type.as_str()).await?;
        let config_path = dir.join(CONFIG_FILE_NAME);
        let output_path = dir.join(RESULTS_FILE_NAME);

        ScanConfigFile::for_module(scan_type, module, &output_path, applicability)
            .write_to(&config_path, scan_type)
            .await?;

        tracing::info!(scan_type = %scan_type, module = %module.name, "running {scan_type} scan");
        self.runner
            .run(AnalyzerInvocation {
                scan_type,
                config_path: &config_path,
                output_path: &output_path,
                env: &self.env,
            })
            .await?;

        let defaults = DriverDefaults::new(scan_type.docs_suffix(), self.runner.version());
        let runs = read_scan_runs(&output_path, &module.source_root, &defaults).await?;

        let findings: usize = runs.iter().map(Run::location_count).sum();
        metrics::counter!(m::JAS_FINDINGS_TOTAL, m::LABEL_CATEGORY => scan_type.as_str())
            .increment(findings as u64);
        if findings > 0 {
            tracing::info!(scan_type = %scan_type, module = %module.name, findings, "found {findings} {scan_type} findings");
        }
        Ok(runs)
    }
}
