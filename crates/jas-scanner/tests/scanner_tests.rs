//! Integration tests for the advanced scanner flow
//!
//! Apps config -> per-module scanner runs through a fake analyzer -> normalized SARIF.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use vigil_jas_scanner::{
    AnalyzerEnv, AnalyzerInvocation, AnalyzerRunner, AppsConfig, JasScanType, JasScanner,
    JasScannerError, ScratchRoot, severity_to_score,
};

/// Emits one suppressed and two live findings per run.
struct FakeAnalyzer {
    runs: AtomicUsize,
}

impl FakeAnalyzer {
    fn new() -> Self {
        Self {
            runs: AtomicUsize::new(0),
        }
    }
}

impl AnalyzerRunner for FakeAnalyzer {
    async fn ensure_available(&self) -> Result<(), JasScannerError> {
        Ok(())
    }

    fn version(&self) -> &str {
        "1.8.14"
    }

    async fn run(&self, invocation: AnalyzerInvocation<'_>) -> Result<(), JasScannerError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let sarif = serde_json::json!({
            "runs": [{
                "tool": { "driver": {
                    "name": invocation.scan_type.as_str(),
                    "version": "unversioned",
                    "rules": [{ "id": "R-HIGH" }, { "id": "R-LOW" }]
                }},
                "results": [
                    { "ruleId": "R-HIGH", "level": "error", "message": { "text": "a" }, "locations": [{}] },
                    { "ruleId": "R-LOW", "level": "note", "message": { "text": "b" }, "locations": [{}] },
                    { "ruleId": "R-HIGH", "level": "error", "message": { "text": "c" },
                      "suppressions": [{ "kind": "inSource" }] }
                ]
            }]
        });
        tokio::fs::write(invocation.output_path, sarif.to_string())
            .await
            .map_err(|e| JasScannerError::io(invocation.output_path, e))
    }
}

#[tokio::test]
async fn every_module_and_scanner_yields_normalized_runs() {
    let project = tempfile::tempdir().unwrap();
    let api = project.path().join("api");
    let web = project.path().join("web");
    std::fs::create_dir_all(&api).unwrap();
    std::fs::create_dir_all(&web).unwrap();

    let apps = AppsConfig::load_or_synthesize(project.path(), &[api.clone(), web.clone()])
        .await
        .unwrap();
    let scratch = Arc::new(ScratchRoot::create_in(project.path()).await.unwrap());
    let analyzer = Arc::new(FakeAnalyzer::new());
    let scanner = JasScanner::new(
        analyzer.clone(),
        scratch.clone(),
        AnalyzerEnv::new().with_analytics("msi-7", &["npm".to_owned()]),
    );

    let mut results: BTreeMap<JasScanType, Vec<_>> = BTreeMap::new();
    for module in &apps.modules {
        for scan_type in JasScanType::ALL {
            if module.should_skip_scanner(scan_type) {
                continue;
            }
            let runs = scanner.run_scan(scan_type, module).await.unwrap();
            results.entry(scan_type).or_default().extend(runs);
        }
    }

    assert_eq!(analyzer.runs.load(Ordering::SeqCst), 8);
    assert_eq!(results.len(), 4);
    for runs in results.values() {
        assert_eq!(runs.len(), 2);
        for run in runs {
            assert_eq!(run.results.len(), 2, "suppressed finding removed");
            assert_eq!(run.tool.driver.version.as_deref(), Some("1.8.14"));
            let scores: Vec<_> = run
                .tool
                .driver
                .rules
                .iter()
                .map(|r| r.properties.as_ref().unwrap()["security-severity"].clone())
                .collect();
            assert_eq!(scores, vec!["8.9", "3.9"]);
        }
    }

    scratch.release().await.unwrap();
    assert!(!scratch.path().exists());
}

#[tokio::test]
async fn skipped_scanner_is_not_run() {
    let project = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(project.path().join(".vigil")).unwrap();
    std::fs::write(
        project.path().join(".vigil/apps-config.yml"),
        "version: \"1.0\"\nmodules:\n  - name: root\n    source_root: .\n    exclude_scanners: [secrets, sast]\n",
    )
    .unwrap();

    let apps = AppsConfig::load_or_synthesize(project.path(), &[]).await.unwrap();
    let module = &apps.modules[0];
    let scheduled: Vec<JasScanType> = JasScanType::ALL
        .into_iter()
        .filter(|t| !module.should_skip_scanner(*t))
        .collect();
    assert_eq!(scheduled, vec![JasScanType::Applicability, JasScanType::Iac]);
}

#[test]
fn score_table_is_case_insensitive_and_partial() {
    for (label, score) in [
        ("", Some("0.0")),
        ("UNKNOWN", Some("0.0")),
        ("Low", Some("3.9")),
        ("medium", Some("6.9")),
        ("HIGH", Some("8.9")),
        ("Critical", Some("10")),
        ("severe", None),
    ] {
        assert_eq!(severity_to_score(label), score, "{label}");
    }
}
