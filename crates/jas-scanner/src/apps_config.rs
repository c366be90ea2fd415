//! 프로젝트 앱 설정 (`.vigil/apps-config.yml`)
//!
//! 파일은 하나 이상의 모듈을 선언하며, 각 모듈은 소스 루트와 제외 패턴,
//! 스캐너별 오버라이드를 가집니다. 파일이 없으면 작업 디렉토리마다
//! 모듈 하나를 합성합니다.
//!
//! ```yaml
//! version: "1.0"
//! modules:
//!   - name: backend
//!     source_root: services/backend
//!     exclude_patterns: ["**/generated/**"]
//!     exclude_scanners: [iac]
//!     scanners:
//!       sast:
//!         language: java
//!         working_dirs: [src/main]
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::JasScannerError;
use crate::scanners::JasScanType;

/// 프로젝트 디렉토리 기준 앱 설정 파일 위치
pub const APPS_CONFIG_PATH: &str = ".vigil/apps-config.yml";

/// 모듈과 스캐너 모두 제외 패턴을 선언하지 않았을 때의 기본값
pub const DEFAULT_EXCLUDE_PATTERNS: [&str; 5] = [
    "**/.git/**",
    "**/*test*/**",
    "**/*venv*/**",
    "**/*node_modules*/**",
    "**/target/**",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppsConfig {
    pub version: String,
    pub modules: Vec<Module>,
}

/// 프로젝트의 스캔 단위
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Module {
    pub name: String,
    pub source_root: String,
    pub exclude_patterns: Vec<String>,
    pub exclude_scanners: Vec<String>,
    pub scanners: Scanners,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scanners {
    pub secrets: Option<Scanner>,
    pub iac: Option<Scanner>,
    pub applicability: Option<Scanner>,
    pub sast: Option<SastScanner>,
}

/// 스캐너별 오버라이드
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scanner {
    pub working_dirs: Vec<String>,
    pub exclude_patterns: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SastScanner {
    #[serde(flatten)]
    pub scanner: Scanner,
    pub language: String,
    pub excluded_rules: Vec<String>,
}

impl AppsConfig {
    /// 앱 설정 문서를 파싱합니다.
    pub fn parse(yaml: &str, path: &Path) -> Result<Self, JasScannerError> {
        serde_yaml::from_str(yaml).map_err(|e| JasScannerError::AppsConfig {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// `<project_dir>/.vigil/apps-config.yml`이 있으면 로드하고, 없으면
    /// 작업 디렉토리마다 모듈 하나를 합성합니다.
    ///
    /// 상대 소스 루트는 `project_dir` 기준으로 해석하며, 모든 소스 루트가
    /// 존재해야 합니다.
    pub async fn load_or_synthesize(
        project_dir: &Path,
        working_dirs: &[PathBuf],
    ) -> Result<Self, JasScannerError> {
        let path = project_dir.join(APPS_CONFIG_PATH);
        let config = match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                let mut config = Self::parse(&content, &path)?;
                config.resolve_source_roots(project_dir);
                tracing::debug!(path = %path.display(), modules = config.modules.len(), "loaded apps config");
                config
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::synthesize(working_dirs),
            Err(e) => return Err(JasScannerError::io(&path, e)),
        };

        for module in &config.modules {
            let exists = tokio::fs::try_exists(&module.source_root)
                .await
                .map_err(|e| JasScannerError::io(&module.source_root, e))?;
            if !exists {
                return Err(JasScannerError::MissingSourceRoot {
                    module: module.name.clone(),
                    path: module.source_root.clone(),
                });
            }
        }
        Ok(config)
    }

    /// 작업 디렉토리마다 기본 설정 모듈 하나
    pub fn synthesize(working_dirs: &[PathBuf]) -> Self {
        Self {
            version: "1.0".to_owned(),
            modules: working_dirs
                .iter()
                .map(|dir| Module {
                    name: dir
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    source_root: dir.display().to_string(),
                    ..Module::default()
                })
                .collect(),
        }
    }

    fn resolve_source_roots(&mut self, project_dir: &Path) {
        for module in &mut self.modules {
            let root = Path::new(&module.source_root);
            if !root.is_absolute() {
                module.source_root = project_dir.join(root).display().to_string();
            }
        }
    }
}

impl Module {
    fn scanner(&self, scan_type: JasScanType) -> Option<&Scanner> {
        match scan_type {
            JasScanType::Secrets => self.scanners.secrets.as_ref(),
            JasScanType::Iac => self.scanners.iac.as_ref(),
            JasScanType::Applicability => self.scanners.applicability.as_ref(),
            JasScanType::Sast => self.scanners.sast.as_ref().map(|s| &s.scanner),
        }
    }

    /// 스캐너가 분석할 루트 목록
    ///
    /// 모듈 소스 루트, 또는 그 아래에 스캐너의 `working_dirs`를 붙인 경로
    pub fn source_roots(&self, scan_type: JasScanType) -> Vec<String> {
        let root = Path::new(&self.source_root);
        match self.scanner(scan_type) {
            Some(scanner) if !scanner.working_dirs.is_empty() => scanner
                .working_dirs
                .iter()
                .map(|dir| root.join(dir).display().to_string())
                .collect(),
            _ => vec![self.source_root.clone()],
        }
    }

    /// 모듈 패턴 뒤에 스캐너 패턴을 이어 붙이며, 둘 다 비어 있으면 기본값
    pub fn exclude_patterns(&self, scan_type: JasScanType) -> Vec<String> {
        let mut patterns = self.exclude_patterns.clone();
        if let Some(scanner) = self.scanner(scan_type) {
            patterns.extend(scanner.exclude_patterns.iter().cloned());
        }
        if patterns.is_empty() {
            return DEFAULT_EXCLUDE_PATTERNS.iter().map(|p| (*p).to_owned()).collect();
        }
        patterns
    }

    /// 모듈이 해당 스캐너를 제외했는지 여부
    pub fn should_skip_scanner(&self, scan_type: JasScanType) -> bool {
        let name = scan_type.as_str();
        let skip = self
            .exclude_scanners
            .iter()
            .any(|s| s.to_lowercase() == name);
        if skip {
            tracing::info!(module = %self.name, "skipping {name} scanning");
        }
        skip
    }

    /// SAST 언어 오버라이드 (미설정 시 빈 문자열)
    pub fn sast_language(&self) -> &str {
        self.scanners
            .sast
            .as_ref()
            .map(|s| s.language.as_str())
            .unwrap_or("")
    }

    /// 모듈이 제외한 SAST 규칙
    pub fn sast_excluded_rules(&self) -> &[String] {
        self.scanners
            .sast
            .as_ref()
            .map(|s| s.excluded_rules.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
version: "1.0"
modules:
  - name: backend
    source_root: services/backend
    exclude_patterns: ["**/generated/**"]
    exclude_scanners: [IaC]
    scanners:
      secrets:
        exclude_patterns: ["**/fixtures/**"]
      sast:
        language: java
        working_dirs: [src/main, src/cli]
        excluded_rules: [java-xss]
"#;

    fn sample() -> AppsConfig {
        AppsConfig::parse(SAMPLE, Path::new(APPS_CONFIG_PATH)).unwrap()
    }

    #[test]
    fn parses_modules_and_scanner_sections() {
        let config = sample();
        assert_eq!(config.modules.len(), 1);
        let module = &config.modules[0];
        assert_eq!(module.name, "backend");
        assert_eq!(module.sast_language(), "java");
        assert_eq!(module.sast_excluded_rules(), ["java-xss"]);
        assert!(module.scanners.iac.is_none());
    }

    #[test]
    fn source_roots_join_scanner_working_dirs() {
        let mut config = sample();
        config.resolve_source_roots(Path::new("/repo"));
        let module = &config.modules[0];

        assert_eq!(module.source_roots(JasScanType::Secrets), vec!["/repo/services/backend"]);
        assert_eq!(
            module.source_roots(JasScanType::Sast),
            vec!["/repo/services/backend/src/main", "/repo/services/backend/src/cli"]
        );
    }

    #[test]
    fn exclude_patterns_merge_module_and_scanner() {
        let module = &sample().modules[0];
        assert_eq!(
            module.exclude_patterns(JasScanType::Secrets),
            vec!["**/generated/**", "**/fixtures/**"]
        );
        assert_eq!(module.exclude_patterns(JasScanType::Iac), vec!["**/generated/**"]);
    }

    #[test]
    fn empty_patterns_fall_back_to_defaults() {
        let module = Module::default();
        assert_eq!(
            module.exclude_patterns(JasScanType::Secrets),
            DEFAULT_EXCLUDE_PATTERNS.to_vec()
        );
    }

    #[test]
    fn skip_list_is_case_insensitive() {
        let module = &sample().modules[0];
        assert!(module.should_skip_scanner(JasScanType::Iac));
        assert!(!module.should_skip_scanner(JasScanType::Secrets));
    }

    #[test]
    fn malformed_yaml_is_apps_config_error() {
        let err = AppsConfig::parse("modules: [name: {", Path::new("x.yml")).unwrap_err();
        assert!(matches!(err, JasScannerError::AppsConfig { .. }));
    }

    #[tokio::test]
    async fn synthesizes_modules_when_file_absent() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let dirs = vec![a.path().to_path_buf(), b.path().to_path_buf()];

        let config = AppsConfig::load_or_synthesize(a.path(), &dirs).await.unwrap();
        assert_eq!(config.modules.len(), 2);
        assert_eq!(config.modules[1].source_root, b.path().display().to_string());
    }

    #[tokio::test]
    async fn loads_file_and_resolves_relative_roots() {
        let project = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(project.path().join(".vigil")).unwrap();
        std::fs::create_dir_all(project.path().join("services/backend")).unwrap();
        std::fs::write(project.path().join(APPS_CONFIG_PATH), SAMPLE).unwrap();

        let config = AppsConfig::load_or_synthesize(project.path(), &[]).await.unwrap();
        assert_eq!(
            config.modules[0].source_root,
            project.path().join("services/backend").display().to_string()
        );
    }

    #[tokio::test]
    async fn missing_source_root_is_fatal() {
        let project = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(project.path().join(".vigil")).unwrap();
        std::fs::write(project.path().join(APPS_CONFIG_PATH), SAMPLE).unwrap();

        let err = AppsConfig::load_or_synthesize(project.path(), &[]).await.unwrap_err();
        assert!(matches!(err, JasScannerError::MissingSourceRoot { .. }));
    }
}
