//! vigil.toml 통합 설정 테스트
//!
//! - vigil.toml.example 파싱 테스트
//! - 파일 로딩 + 환경변수 우선순위 테스트

use std::io::Write;

use serial_test::serial;
use vigil_core::config::VigilConfig;
use vigil_core::error::{ConfigError, VigilError};

#[test]
fn example_config_parses_and_validates() {
    let content = include_str!("../../../vigil.toml.example");
    let config = VigilConfig::parse(content).expect("example config should parse");
    config.validate().expect("example config should validate");

    assert_eq!(config.general.log_format, "pretty");
    assert_eq!(config.audit.threads, 3);
    assert!(config.audit.fail);
    assert_eq!(config.analyzer.version, "1.8.14");
    assert_eq!(config.sca.max_file_size, 10 * 1024 * 1024);
}

#[tokio::test]
#[serial]
async fn env_var_overrides_file_value() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[audit]\nthreads = 4\nwatches = [\"a\"]").unwrap();

    // SAFETY: serial 테스트로 환경변수 동시 접근이 없습니다.
    unsafe { std::env::set_var("VIGIL_AUDIT_WATCHES", "w1,w2") };
    let config = VigilConfig::load(file.path()).await.unwrap();
    unsafe { std::env::remove_var("VIGIL_AUDIT_WATCHES") };

    assert_eq!(config.audit.threads, 4);
    assert_eq!(config.audit.watches, vec!["w1", "w2"]);
}

#[tokio::test]
#[serial]
async fn load_rejects_invalid_values_after_overrides() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[audit]\nthreads = 4").unwrap();

    // SAFETY: serial 테스트로 환경변수 동시 접근이 없습니다.
    unsafe { std::env::set_var("VIGIL_AUDIT_THREADS", "0") };
    let result = VigilConfig::load(file.path()).await;
    unsafe { std::env::remove_var("VIGIL_AUDIT_THREADS") };

    assert!(matches!(
        result,
        Err(VigilError::Config(ConfigError::InvalidValue { .. }))
    ));
}

#[tokio::test]
async fn load_reports_missing_file() {
    let result = VigilConfig::load("/nonexistent/vigil.toml").await;
    assert!(matches!(
        result,
        Err(VigilError::Config(ConfigError::FileNotFound { .. }))
    ));
}
