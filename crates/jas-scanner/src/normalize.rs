//! 분석기 출력 SARIF 정규화
//!
//! 분석기 결과 파일에서 읽은 모든 run은 [`normalize_run`]을 거칩니다:
//!
//! 1. 첫 invocation의 작업 디렉토리를 모듈 소스 루트로 설정
//!    (분석기가 invocation을 내보내지 않았으면 새로 생성)
//! 2. 빠진 드라이버 메타데이터 채우기 (`informationUri`, 그리고 `version`이 없거나
//!    숫자로 시작하지 않으면 `version`)
//! 3. suppress된 결과 제거
//! 4. 남은 결과의 심각도를 점수로 변환해 해당 규칙의
//!    `properties["security-severity"]`에 기록

use std::path::Path;

use serde_json::Value;

use crate::error::JasScannerError;
use crate::sarif::{ArtifactLocation, Invocation, Run, SarifLog};

/// 문서 루트 (스캐너별 접미사가 붙음)
pub const BASE_DOCUMENTATION_URL: &str = "https://docs.vigil.dev/advanced-security/";

/// 점수를 담는 규칙 속성
pub const SECURITY_SEVERITY_PROPERTY: &str = "security-severity";

/// 분석기 출력의 빈 곳을 채울 드라이버 메타데이터
#[derive(Debug, Clone)]
pub struct DriverDefaults {
    pub information_uri: String,
    pub version: String,
}

impl DriverDefaults {
    /// 문서 접미사와 분석기 버전으로 기본값을 만듭니다.
    pub fn new(docs_suffix: &str, analyzer_version: &str) -> Self {
        Self {
            information_uri: format!("{BASE_DOCUMENTATION_URL}{docs_suffix}"),
            version: analyzer_version.to_owned(),
        }
    }
}

/// 심각도 레이블을 점수로 변환합니다.
///
/// 대소문자를 구분하지 않으며, 알 수 없는 레이블은 점수가 없습니다.
pub fn severity_to_score(label: &str) -> Option<&'static str> {
    match label.to_lowercase().as_str() {
        "" | "unknown" => Some("0.0"),
        "low" => Some("3.9"),
        "medium" => Some("6.9"),
        "high" => Some("8.9"),
        "critical" => Some("10"),
        _ => None,
    }
}

/// run 하나를 제자리에서 정규화합니다.
pub fn normalize_run(run: &mut Run, working_dir: &str, defaults: &DriverDefaults) {
    set_working_directory(run, working_dir);
    fill_missing_driver_information(run, defaults);
    run.results.retain(|result| result.suppressions.is_empty());
    add_scores_to_rules(run);
}

/// 분석기 결과 파일을 읽고 모든 run을 정규화합니다.
pub async fn read_scan_runs(
    path: &Path,
    working_dir: &str,
    defaults: &DriverDefaults,
) -> Result<Vec<Run>, JasScannerError> {
    let raw = tokio::fs::read(path)
        .await
        .map_err(|e| JasScannerError::io(path, e))?;
    let log: SarifLog = serde_json::from_slice(&raw).map_err(|e| JasScannerError::Sarif {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let mut runs = log.runs;
    for run in &mut runs {
        normalize_run(run, working_dir, defaults);
    }
    Ok(runs)
}

fn set_working_directory(run: &mut Run, working_dir: &str) {
    if run.invocations.is_empty() {
        run.invocations.push(Invocation {
            execution_successful: true,
            working_directory: None,
        });
    }
    run.invocations[0].working_directory = Some(ArtifactLocation {
        uri: working_dir.to_owned(),
    });
}

fn fill_missing_driver_information(run: &mut Run, defaults: &DriverDefaults) {
    let driver = &mut run.tool.driver;
    if driver.information_uri.is_none() {
        driver.information_uri = Some(defaults.information_uri.clone());
    }
    let version_ok = driver
        .version
        .as_deref()
        .and_then(|v| v.chars().next())
        .is_some_and(|c| c.is_ascii_digit());
    if !version_ok {
        driver.version = Some(defaults.version.clone());
    }
}

fn add_scores_to_rules(run: &mut Run) {
    let scored: Vec<(String, &'static str)> = run
        .results
        .iter()
        .filter_map(|r| severity_to_score(&r.severity_label()).map(|s| (r.rule_id.clone(), s)))
        .collect();

    for (rule_id, score) in scored {
        let Some(rule) = run.rule_mut(&rule_id) else {
            tracing::trace!(rule_id = %rule_id, "result references an undeclared rule");
            continue;
        };
        rule.properties
            .get_or_insert_with(Default::default)
            .insert(SECURITY_SEVERITY_PROPERTY.to_owned(), Value::from(score));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sarif::{ReportingDescriptor, SarifResult};

    fn result(rule: &str, level: &str, suppressed: bool) -> SarifResult {
        SarifResult {
            rule_id: rule.to_owned(),
            level: Some(level.to_owned()),
            suppressions: if suppressed {
                vec![serde_json::json!({ "kind": "inSource" })]
            } else {
                Vec::new()
            },
            ..SarifResult::default()
        }
    }

    fn run_with(results: Vec<SarifResult>, rules: &[&str]) -> Run {
        let mut run = Run {
            results,
            ..Run::default()
        };
        run.tool.driver.name = "scanner".to_owned();
        run.tool.driver.rules = rules
            .iter()
            .map(|id| ReportingDescriptor {
                id: (*id).to_owned(),
                ..ReportingDescriptor::default()
            })
            .collect();
        run
    }

    fn defaults() -> DriverDefaults {
        DriverDefaults::new("secrets", "1.8.14")
    }

    fn score_of(run: &Run, rule: &str) -> Option<String> {
        run.tool
            .driver
            .rules
            .iter()
            .find(|r| r.id == rule)?
            .properties
            .as_ref()?
            .get(SECURITY_SEVERITY_PROPERTY)?
            .as_str()
            .map(str::to_owned)
    }

    #[test]
    fn score_table() {
        assert_eq!(severity_to_score(""), Some("0.0"));
        assert_eq!(severity_to_score("Unknown"), Some("0.0"));
        assert_eq!(severity_to_score("low"), Some("3.9"));
        assert_eq!(severity_to_score("MEDIUM"), Some("6.9"));
        assert_eq!(severity_to_score("High"), Some("8.9"));
        assert_eq!(severity_to_score("critical"), Some("10"));
        assert_eq!(severity_to_score("informational"), None);
    }

    #[test]
    fn suppressed_results_are_removed_and_others_kept() {
        let mut run = run_with(
            vec![
                result("r1", "error", false),
                result("r2", "warning", true),
                result("r3", "note", false),
                result("r1", "error", true),
            ],
            &["r1", "r2", "r3"],
        );
        normalize_run(&mut run, "/src", &defaults());

        assert_eq!(run.results.len(), 2);
        assert!(run.results.iter().all(|r| r.suppressions.is_empty()));
        // suppressed-only rule gets no score
        assert_eq!(score_of(&run, "r2"), None);
    }

    #[test]
    fn level_derived_scores_land_on_rules() {
        let mut run = run_with(
            vec![result("r1", "error", false), result("r2", "warning", false), result("r3", "note", false)],
            &["r1", "r2", "r3"],
        );
        normalize_run(&mut run, "/src", &defaults());

        assert_eq!(score_of(&run, "r1").as_deref(), Some("8.9"));
        assert_eq!(score_of(&run, "r2").as_deref(), Some("6.9"));
        assert_eq!(score_of(&run, "r3").as_deref(), Some("3.9"));
    }

    #[test]
    fn unmapped_severity_attaches_nothing() {
        let mut odd = result("r1", "error", false);
        odd.properties = Some(
            [("severity".to_owned(), Value::from("Informational"))]
                .into_iter()
                .collect(),
        );
        let mut run = run_with(vec![odd], &["r1"]);
        normalize_run(&mut run, "/src", &defaults());
        assert_eq!(score_of(&run, "r1"), None);
        assert!(run.tool.driver.rules[0].properties.is_none());
    }

    #[test]
    fn missing_rule_is_tolerated() {
        let mut run = run_with(vec![result("ghost", "error", false)], &[]);
        normalize_run(&mut run, "/src", &defaults());
        assert_eq!(run.results.len(), 1);
    }

    #[test]
    fn existing_rule_properties_are_preserved() {
        let mut run = run_with(vec![result("r1", "error", false)], &["r1"]);
        run.tool.driver.rules[0].properties = Some(
            [("tags".to_owned(), serde_json::json!(["security"]))]
                .into_iter()
                .collect(),
        );
        normalize_run(&mut run, "/src", &defaults());
        let props = run.tool.driver.rules[0].properties.as_ref().unwrap();
        assert!(props.contains_key("tags"));
        assert_eq!(props[SECURITY_SEVERITY_PROPERTY], "8.9");
    }

    #[test]
    fn working_directory_is_set_or_created() {
        let mut bare = run_with(Vec::new(), &[]);
        normalize_run(&mut bare, "/repo/service", &defaults());
        assert_eq!(bare.invocations.len(), 1);
        assert_eq!(
            bare.invocations[0].working_directory.as_ref().unwrap().uri,
            "/repo/service"
        );

        let mut existing = run_with(Vec::new(), &[]);
        existing.invocations.push(Invocation {
            execution_successful: true,
            working_directory: Some(ArtifactLocation {
                uri: "/tmp/am".to_owned(),
            }),
        });
        normalize_run(&mut existing, "/repo", &defaults());
        assert_eq!(existing.invocations[0].working_directory.as_ref().unwrap().uri, "/repo");
    }

    #[test]
    fn driver_gaps_are_filled() {
        let mut run = run_with(Vec::new(), &[]);
        run.tool.driver.version = Some("v2".to_owned());
        normalize_run(&mut run, "/src", &defaults());
        assert_eq!(
            run.tool.driver.information_uri.as_deref(),
            Some("https://docs.vigil.dev/advanced-security/secrets")
        );
        assert_eq!(run.tool.driver.version.as_deref(), Some("1.8.14"));

        let mut versioned = run_with(Vec::new(), &[]);
        versioned.tool.driver.version = Some("2.0.1".to_owned());
        versioned.tool.driver.information_uri = Some("https://example.test".to_owned());
        normalize_run(&mut versioned, "/src", &defaults());
        assert_eq!(versioned.tool.driver.version.as_deref(), Some("2.0.1"));
        assert_eq!(
            versioned.tool.driver.information_uri.as_deref(),
            Some("https://example.test")
        );
    }

    #[tokio::test]
    async fn reads_and_normalizes_results_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.sarif");
        std::fs::write(
            &path,
            r#"{"runs":[{"tool":{"driver":{"name":"iac","rules":[{"id":"aws_s3"}]}},
                "results":[{"ruleId":"aws_s3","level":"warning","message":{"text":"open bucket"}},
                           {"ruleId":"aws_s3","level":"warning","message":{"text":"x"},"suppressions":[{"kind":"external"}]}]}]}"#,
        )
        .unwrap();

        let runs = read_scan_runs(&path, "/repo", &DriverDefaults::new("infrastructure-as-code-iac", "1.8.14"))
            .await
            .unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].results.len(), 1);
        assert_eq!(score_of(&runs[0], "aws_s3").as_deref(), Some("6.9"));
    }

    #[tokio::test]
    async fn malformed_results_file_is_sarif_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.sarif");
        std::fs::write(&path, "not json").unwrap();
        let err = read_scan_runs(&path, "/repo", &defaults()).await.unwrap_err();
        assert!(matches!(err, JasScannerError::Sarif { .. }));
    }
}
