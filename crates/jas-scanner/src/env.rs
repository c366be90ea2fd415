//! 분석기 매니저 프로세스 환경 변수
//!
//! 값은 [`AnalyzerEnv`] 오버레이에 모였다가 자식
//! [`Command`](tokio::process::Command)에만 적용됩니다. 부모 프로세스 환경은
//! 수정하지 않으므로 동시에 실행되는 스캐너 태스크끼리 값이 섞이지 않습니다.

use std::collections::BTreeMap;

pub const AM_URL_ENV: &str = "AM_VIGIL_URL";
pub const AM_TOKEN_ENV: &str = "AM_VIGIL_TOKEN";
pub const AM_LOG_LEVEL_ENV: &str = "AM_LOG_LEVEL";

/// 감사 하나의 모든 스캐너가 공유하는 멀티 스캔 ID
pub const MSI_ENV: &str = "JF_MSI";
pub const PACKAGE_MANAGER_ENV: &str = "JF_PACKAGE_MANAGER";
pub const LANGUAGE_ENV: &str = "JF_LANGUAGE";

/// 분석기 호출 하나의 환경 오버레이
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalyzerEnv {
    vars: BTreeMap<String, String>,
}

impl AnalyzerEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// 변수를 설정합니다. 빈 값은 건너뜁니다.
    pub fn set(mut self, key: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.is_empty() {
            self.vars.insert(key.to_owned(), value);
        }
        self
    }

    /// 분석기용 서비스 접속 정보
    pub fn with_server(self, url: &str, access_token: &str, log_level: &str) -> Self {
        self.set(AM_URL_ENV, url)
            .set(AM_TOKEN_ENV, access_token)
            .set(AM_LOG_LEVEL_ENV, log_level)
    }

    /// 분석 컨텍스트
    ///
    /// 패키지 매니저와 언어는 프로젝트가 정확히 한 가지 기술을 사용할 때만
    /// 보고합니다.
    pub fn with_analytics(self, multi_scan_id: &str, technologies: &[String]) -> Self {
        let env = self.set(MSI_ENV, multi_scan_id);
        match technologies {
            [tech] => env
                .set(PACKAGE_MANAGER_ENV, tech.as_str())
                .set(LANGUAGE_ENV, language_of(tech)),
            _ => env,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// 자식 프로세스 명령에 오버레이를 적용합니다.
    pub fn apply(&self, command: &mut tokio::process::Command) {
        command.envs(self.vars.iter());
    }
}

fn language_of(technology: &str) -> &'static str {
    match technology {
        "npm" | "yarn" | "pnpm" => "javascript",
        "cargo" => "rust",
        "go" => "go",
        "pip" | "pipenv" | "poetry" => "python",
        "maven" | "gradle" => "java",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_technology_sets_package_manager_and_language() {
        let env = AnalyzerEnv::new().with_analytics("msi-1", &["npm".to_owned()]);
        assert_eq!(env.get(MSI_ENV), Some("msi-1"));
        assert_eq!(env.get(PACKAGE_MANAGER_ENV), Some("npm"));
        assert_eq!(env.get(LANGUAGE_ENV), Some("javascript"));
    }

    #[test]
    fn multiple_technologies_only_set_msi() {
        let env = AnalyzerEnv::new()
            .with_analytics("msi-1", &["npm".to_owned(), "cargo".to_owned()]);
        assert_eq!(env.len(), 1);
        assert_eq!(env.get(PACKAGE_MANAGER_ENV), None);
    }

    #[test]
    fn empty_values_are_not_exported() {
        let env = AnalyzerEnv::new().with_server("https://acme.example", "", "debug");
        assert_eq!(env.get(AM_URL_ENV), Some("https://acme.example"));
        assert_eq!(env.get(AM_TOKEN_ENV), None);
        assert_eq!(env.get(AM_LOG_LEVEL_ENV), Some("debug"));
    }

    #[test]
    fn building_an_overlay_leaves_process_env_alone() {
        let before = std::env::var(MSI_ENV).ok();
        let _env = AnalyzerEnv::new().with_analytics("msi-untouched", &[]);
        assert_eq!(std::env::var(MSI_ENV).ok(), before);
    }
}
