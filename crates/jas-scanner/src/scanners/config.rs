//! 스캐너 입력 파일
//!
//! 스캐너 실행마다 임시 디렉토리에 `config.yaml`이 생성됩니다:
//!
//! ```yaml
//! scans:
//!   - type: iac-scan-modules
//!     roots: [/repo/infra]
//!     output: /tmp/vigil-1234/iac_56780/results.sarif
//!     skipped-folders: ["**/.git/**"]
//! ```
//!
//! Applicability는 `grep-disable`과 `cve-whitelist`를 추가하고, SAST는
//! `skipped-folders` 대신 `language`, `exclude_patterns`, `excluded-rules`를 씁니다.

use std::path::Path;

use serde::Serialize;

use crate::apps_config::Module;
use crate::error::JasScannerError;
use crate::scanners::JasScanType;

#[derive(Debug, Serialize)]
pub struct ScanConfigFile {
    pub scans: Vec<ScanConfigEntry>,
}

#[derive(Debug, Default, Serialize)]
pub struct ScanConfigEntry {
    #[serde(rename = "type")]
    pub scan_type: String,
    pub roots: Vec<String>,
    pub output: String,
    #[serde(rename = "skipped-folders", skip_serializing_if = "Vec::is_empty")]
    pub skipped_folders: Vec<String>,
    #[serde(rename = "grep-disable", skip_serializing_if = "Option::is_none")]
    pub grep_disable: Option<bool>,
    #[serde(rename = "cve-whitelist", skip_serializing_if = "Option::is_none")]
    pub cve_whitelist: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_patterns: Option<Vec<String>>,
    #[serde(rename = "excluded-rules", skip_serializing_if = "Option::is_none")]
    pub excluded_rules: Option<Vec<String>>,
}

/// applicability 스캐너만 읽는 옵션
#[derive(Debug, Clone, Default)]
pub struct ApplicabilityOptions {
    pub cve_whitelist: Vec<String>,
    pub grep_disable: bool,
}

impl ScanConfigFile {
    /// 모듈 하나에 대한 스캐너 하나의 입력 파일을 만듭니다.
    pub fn for_module(
        scan_type: JasScanType,
        module: &Module,
        output: &Path,
        applicability: &ApplicabilityOptions,
    ) -> Self {
        let mut entry = ScanConfigEntry {
            scan_type: scan_type.scanner_type().to_owned(),
            roots: module.source_roots(scan_type),
            output: output.display().to_string(),
            ..ScanConfigEntry::default()
        };
        let excludes = module.exclude_patterns(scan_type);

        match scan_type {
            JasScanType::Secrets | JasScanType::Iac => entry.skipped_folders = excludes,
            JasScanType::Applicability => {
                entry.skipped_folders = excludes;
                entry.grep_disable = Some(applicability.grep_disable);
                entry.cve_whitelist = Some(applicability.cve_whitelist.clone());
            }
            JasScanType::Sast => {
                entry.language = Some(module.sast_language().to_owned());
                entry.exclude_patterns = Some(excludes);
                let rules = module.sast_excluded_rules();
                if !rules.is_empty() {
                    entry.excluded_rules = Some(rules.to_vec());
                }
            }
        }
        Self { scans: vec![entry] }
    }

    /// 파일을 직렬화해 `path`에 기록합니다.
    pub async fn write_to(&self, path: &Path, scan_type: JasScanType) -> Result<(), JasScannerError> {
        let yaml = serde_yaml::to_string(self).map_err(|e| JasScannerError::ScannerConfig {
            scan_type: scan_type.to_string(),
            reason: e.to_string(),
        })?;
        tracing::debug!(scan_type = %scan_type, "{scan_type} scanner input YAML:\n{yaml}");
        tokio::fs::write(path, yaml)
            .await
            .map_err(|e| JasScannerError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apps_config::{SastScanner, Scanner};

    fn module() -> Module {
        Module {
            name: "app".to_owned(),
            source_root: "/repo".to_owned(),
            ..Module::default()
        }
    }

    fn yaml_of(scan_type: JasScanType, module: &Module) -> serde_yaml::Value {
        let file = ScanConfigFile::for_module(
            scan_type,
            module,
            Path::new("/tmp/s/results.sarif"),
            &ApplicabilityOptions::default(),
        );
        serde_yaml::to_value(&file).unwrap()
    }

    #[test]
    fn iac_config_has_type_roots_output_and_skipped_folders() {
        let yaml = yaml_of(JasScanType::Iac, &module());
        let scan = &yaml["scans"][0];
        assert_eq!(scan["type"], "iac-scan-modules");
        assert_eq!(scan["roots"][0], "/repo");
        assert_eq!(scan["output"], "/tmp/s/results.sarif");
        assert_eq!(scan["skipped-folders"][0], "**/.git/**");
        assert!(scan.get("language").is_none());
    }

    #[test]
    fn applicability_config_adds_whitelist_and_grep_flag() {
        let yaml = yaml_of(JasScanType::Applicability, &module());
        let scan = &yaml["scans"][0];
        assert_eq!(scan["type"], "analyze-applicability");
        assert_eq!(scan["grep-disable"], false);
        assert!(scan["cve-whitelist"].as_sequence().unwrap().is_empty());
    }

    #[test]
    fn sast_config_uses_language_and_exclude_patterns() {
        let mut module = module();
        module.scanners.sast = Some(SastScanner {
            scanner: Scanner {
                working_dirs: vec!["src".to_owned()],
                exclude_patterns: vec!["**/gen/**".to_owned()],
            },
            language: "python".to_owned(),
            excluded_rules: vec!["py-eval".to_owned()],
        });
        let yaml = yaml_of(JasScanType::Sast, &module);
        let scan = &yaml["scans"][0];
        assert_eq!(scan["type"], "sast");
        assert_eq!(scan["language"], "python");
        assert_eq!(scan["roots"][0], "/repo/src");
        assert_eq!(scan["exclude_patterns"][0], "**/gen/**");
        assert_eq!(scan["excluded-rules"][0], "py-eval");
        assert!(scan.get("skipped-folders").is_none());
    }

    #[tokio::test]
    async fn writes_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        ScanConfigFile::for_module(
            JasScanType::Secrets,
            &module(),
            &dir.path().join("results.sarif"),
            &ApplicabilityOptions::default(),
        )
        .write_to(&path, JasScanType::Secrets)
        .await
        .unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("secrets-scan"));
    }
}
