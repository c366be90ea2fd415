//! 분석기 매니저 생명주기
//!
//! [`AnalyzerRunner`] trait은 외부 정적 분석 실행 파일을 추상화합니다.
//! 운영 환경에서는 [`AnalyzerManager`]가, 테스트에서는 가짜 러너가 스캐너를 구동합니다.
//!
//! # 설치
//!
//! ```text
//! ensure_available() ──► OnceCell ──(first call)──► install()
//!                                                      │
//!                       <home>/analyzerManager/.version == configured version?
//!                           │ yes                      │ no
//!                           ▼                          ▼
//!                        reuse              GET <url>/<version>/<os>-<arch>/analyzerManager.zip
//!                                                      │
//!                                           extract (enclosed names only) + stamp
//! ```
//!
//! `ensure_available()`을 동시에 호출해도 같은 셀을 기다리므로 아카이브는
//! 실행당 최대 한 번만 내려받습니다.

use std::future::Future;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::OnceCell;

use vigil_core::config::VigilConfig;
use vigil_core::metrics as m;

use crate::env::AnalyzerEnv;
use crate::error::JasScannerError;
use crate::scanners::JasScanType;

/// 분석기 홈 아래 설치 디렉토리 이름
pub const INSTALL_DIR_NAME: &str = "analyzerManager";

#[cfg(windows)]
pub const BINARY_NAME: &str = "analyzerManager.exe";
#[cfg(not(windows))]
pub const BINARY_NAME: &str = "analyzerManager";

const VERSION_STAMP: &str = ".version";
const ARCHIVE_NAME: &str = "analyzerManager.zip";
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// 엔트리별 압축 해제 크기 상한
const MAX_ENTRY_SIZE: u64 = 512 * 1024 * 1024;

/// 에러 메시지에 포함할 분석기 stderr 길이
const STDERR_EXCERPT: usize = 512;

/// 스캐너 실행 요청 하나
#[derive(Debug, Clone, Copy)]
pub struct AnalyzerInvocation<'a> {
    pub scan_type: JasScanType,
    /// 스캐너 입력 YAML
    pub config_path: &'a Path,
    /// 분석기가 기록해야 하는 SARIF 파일
    pub output_path: &'a Path,
    pub env: &'a AnalyzerEnv,
}

/// 분석기 매니저 실행 파일 추상화
pub trait AnalyzerRunner: Send + Sync + 'static {
    /// 실행 파일을 준비합니다. 처음 사용할 때 설치합니다.
    ///
    /// # Errors
    ///
    /// 설치할 수 없으면 `AnalyzerDownload` 또는 `AnalyzerUnavailable`
    fn ensure_available(&self) -> impl Future<Output = Result<(), JasScannerError>> + Send;

    /// 정규화된 SARIF 드라이버에 기록할 버전
    fn version(&self) -> &str;

    /// 스캐너 하나를 실행하고 종료를 기다립니다.
    ///
    /// # Errors
    ///
    /// 프로세스를 시작할 수 없거나 실패로 종료하면 `AnalyzerExec`
    fn run(
        &self,
        invocation: AnalyzerInvocation<'_>,
    ) -> impl Future<Output = Result<(), JasScannerError>> + Send;
}

/// 분석기 매니저 설정
#[derive(Debug, Clone)]
pub struct AnalyzerManagerConfig {
    /// 캐시 루트 (실행 파일은 `<home_dir>/analyzerManager/`에 위치)
    pub home_dir: PathBuf,
    pub download_url: String,
    pub version: String,
    pub log_level: String,
    pub server_url: String,
    pub access_token: String,
}

impl AnalyzerManagerConfig {
    /// 코어 설정으로부터 생성합니다.
    ///
    /// `analyzer.home_dir`이 비어 있으면 `$HOME/.vigil/dependencies`를 사용합니다.
    pub fn from_core(core: &VigilConfig) -> Result<Self, JasScannerError> {
        let home_dir = if core.analyzer.home_dir.is_empty() {
            let home = std::env::var_os("HOME").ok_or_else(|| JasScannerError::Config {
                field: "analyzer.home_dir".to_owned(),
                reason: "not set and HOME is undefined".to_owned(),
            })?;
            PathBuf::from(home).join(".vigil").join("dependencies")
        } else {
            PathBuf::from(&core.analyzer.home_dir)
        };
        Ok(Self {
            home_dir,
            download_url: core.analyzer.download_url.clone(),
            version: core.analyzer.version.clone(),
            log_level: core.analyzer.log_level.clone(),
            server_url: core.server.url.clone(),
            access_token: core.server.access_token.clone(),
        })
    }
}

/// 운영용 분석기 러너
pub struct AnalyzerManager {
    config: AnalyzerManagerConfig,
    client: reqwest::Client,
    binary: OnceCell<PathBuf>,
}

impl AnalyzerManager {
    pub fn new(config: AnalyzerManagerConfig) -> Result<Self, JasScannerError> {
        if config.version.is_empty() {
            return Err(JasScannerError::Config {
                field: "analyzer.version".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }
        let client = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .map_err(|e| JasScannerError::Config {
                field: "analyzer.download_url".to_owned(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            config,
            client,
            binary: OnceCell::new(),
        })
    }

    pub fn config(&self) -> &AnalyzerManagerConfig {
        &self.config
    }

    pub fn install_dir(&self) -> PathBuf {
        self.config.home_dir.join(INSTALL_DIR_NAME)
    }

    pub fn binary_path(&self) -> PathBuf {
        self.install_dir().join(BINARY_NAME)
    }

    /// 설정된 버전과 호스트 플랫폼에 맞는 아카이브 URL
    pub fn archive_url(&self) -> String {
        format!(
            "{}/{}/{}-{}/{ARCHIVE_NAME}",
            self.config.download_url.trim_end_matches('/'),
            self.config.version,
            std::env::consts::OS,
            std::env::consts::ARCH,
        )
    }

    async fn installed_version(&self) -> Option<String> {
        if !tokio::fs::try_exists(self.binary_path()).await.unwrap_or(false) {
            return None;
        }
        tokio::fs::read_to_string(self.install_dir().join(VERSION_STAMP))
            .await
            .ok()
            .map(|v| v.trim().to_owned())
    }

    async fn install(&self) -> Result<PathBuf, JasScannerError> {
        let binary = self.binary_path();
        if self.installed_version().await.as_deref() == Some(self.config.version.as_str()) {
            tracing::debug!(path = %binary.display(), version = %self.config.version, "analyzer manager is up to date");
            return Ok(binary);
        }
        if self.config.download_url.is_empty() {
            return Err(JasScannerError::AnalyzerUnavailable(format!(
                "{} is missing or outdated and analyzer.download_url is not set",
                binary.display()
            )));
        }

        let url = self.archive_url();
        tracing::info!(url = %url, version = %self.config.version, "downloading analyzer manager");
        let archive = match self.download(&url).await {
            Ok(bytes) => {
                metrics::counter!(m::ANALYZER_DOWNLOADS_TOTAL, m::LABEL_RESULT => "success").increment(1);
                bytes
            }
            Err(e) => {
                metrics::counter!(m::ANALYZER_DOWNLOADS_TOTAL, m::LABEL_RESULT => "failure").increment(1);
                return Err(e);
            }
        };

        let install_dir = self.install_dir();
        let dest = install_dir.clone();
        tokio::task::spawn_blocking(move || replace_install(&archive, &dest))
            .await
            .map_err(|e| JasScannerError::AnalyzerDownload {
                url: url.clone(),
                reason: format!("extraction task failed: {e}"),
            })?
            .map_err(|reason| JasScannerError::AnalyzerDownload {
                url: url.clone(),
                reason,
            })?;

        tokio::fs::write(install_dir.join(VERSION_STAMP), &self.config.version)
            .await
            .map_err(|e| JasScannerError::io(install_dir.join(VERSION_STAMP), e))?;

        if !tokio::fs::try_exists(&binary).await.unwrap_or(false) {
            return Err(JasScannerError::AnalyzerDownload {
                url,
                reason: format!("archive does not contain {BINARY_NAME}"),
            });
        }
        tracing::info!(path = %binary.display(), "analyzer manager installed");
        Ok(binary)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, JasScannerError> {
        let download_err = |reason: String| JasScannerError::AnalyzerDownload {
            url: url.to_owned(),
            reason,
        };
        let mut request = self.client.get(url);
        if !self.config.access_token.is_empty() {
            request = request.bearer_auth(&self.config.access_token);
        }
        let bytes = request
            .send()
            .await
            .map_err(|e| download_err(e.to_string()))?
            .error_for_status()
            .map_err(|e| download_err(e.to_string()))?
            .bytes()
            .await
            .map_err(|e| download_err(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn installed_binary(&self) -> Result<&PathBuf, JasScannerError> {
        self.binary.get_or_try_init(|| self.install()).await
    }
}

impl AnalyzerRunner for AnalyzerManager {
    async fn ensure_available(&self) -> Result<(), JasScannerError> {
        self.installed_binary().await.map(|_| ())
    }

    fn version(&self) -> &str {
        &self.config.version
    }

    async fn run(&self, invocation: AnalyzerInvocation<'_>) -> Result<(), JasScannerError> {
        let binary = self.installed_binary().await?;
        let scan_type = invocation.scan_type;
        let exec_err = |reason: String| JasScannerError::AnalyzerExec {
            scan_type: scan_type.to_string(),
            reason,
        };

        let mut command = tokio::process::Command::new(binary);
        command
            .arg(scan_type.command())
            .arg(invocation.config_path)
            .current_dir(binary.parent().unwrap_or(Path::new(".")))
            .kill_on_drop(true);
        AnalyzerEnv::new()
            .with_server(
                &self.config.server_url,
                &self.config.access_token,
                &self.config.log_level,
            )
            .apply(&mut command);
        invocation.env.apply(&mut command);

        tracing::debug!(
            scan_type = %scan_type,
            command = scan_type.command(),
            config = %invocation.config_path.display(),
            "running analyzer manager"
        );
        let output = command
            .output()
            .await
            .map_err(|e| exec_err(format!("failed to start analyzer manager: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let excerpt: String = stderr.trim().chars().take(STDERR_EXCERPT).collect();
            return Err(exec_err(match output.status.code() {
                Some(code) => format!("analyzer manager exited with code {code}: {excerpt}"),
                None => format!("analyzer manager terminated by signal: {excerpt}"),
            }));
        }
        Ok(())
    }
}

/// 설치 디렉토리를 아카이브 내용으로 교체합니다.
fn replace_install(archive: &[u8], dest: &Path) -> Result<(), String> {
    if dest.exists() {
        std::fs::remove_dir_all(dest)
            .map_err(|e| format!("failed to clear {}: {e}", dest.display()))?;
    }
    std::fs::create_dir_all(dest).map_err(|e| format!("failed to create {}: {e}", dest.display()))?;
    extract_archive(archive, dest)
}

/// zip 아카이브를 `dest`에 풉니다.
///
/// 이름이 `dest` 밖을 가리키는 엔트리와 엔트리별 상한보다 큰 엔트리는
/// 건너뜁니다.
pub(crate) fn extract_archive(archive: &[u8], dest: &Path) -> Result<(), String> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive)).map_err(|e| e.to_string())?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(|e| e.to_string())?;
        let Some(relative) = entry.enclosed_name() else {
            tracing::warn!(entry = entry.name(), "skipping archive entry outside install dir");
            continue;
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(|e| e.to_string())?;
            continue;
        }
        if entry.size() > MAX_ENTRY_SIZE {
            tracing::warn!(entry = entry.name(), size = entry.size(), "skipping oversized archive entry");
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        let mut out = std::fs::File::create(&out_path).map_err(|e| e.to_string())?;
        std::io::copy(&mut (&mut entry).take(MAX_ENTRY_SIZE), &mut out)
            .map_err(|e| e.to_string())?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let is_binary = out_path.file_name().is_some_and(|n| n == BINARY_NAME);
            let mode = match entry.unix_mode() {
                Some(mode) if is_binary => mode | 0o755,
                Some(mode) => mode,
                None if is_binary => 0o755,
                None => 0o644,
            };
            std::fs::set_permissions(&out_path, std::fs::Permissions::from_mode(mode))
                .map_err(|e| e.to_string())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn config(home: &Path, url: &str) -> AnalyzerManagerConfig {
        AnalyzerManagerConfig {
            home_dir: home.to_path_buf(),
            download_url: url.to_owned(),
            version: "1.8.14".to_owned(),
            log_level: "info".to_owned(),
            server_url: String::new(),
            access_token: String::new(),
        }
    }

    fn zip_of(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        for (name, content) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn archive_url_includes_version_and_platform() {
        let manager = AnalyzerManager::new(config(Path::new("/cache"), "https://dl.example/am/")).unwrap();
        let url = manager.archive_url();
        assert!(url.starts_with("https://dl.example/am/1.8.14/"));
        assert!(url.ends_with("/analyzerManager.zip"));
        assert!(url.contains(std::env::consts::OS));
    }

    #[test]
    fn empty_version_is_rejected() {
        let mut cfg = config(Path::new("/cache"), "");
        cfg.version.clear();
        assert!(matches!(
            AnalyzerManager::new(cfg),
            Err(JasScannerError::Config { .. })
        ));
    }

    #[test]
    fn from_core_uses_configured_home() {
        let mut core = VigilConfig::default();
        core.analyzer.home_dir = "/opt/vigil".to_owned();
        core.server.url = "https://acme.example".to_owned();
        let cfg = AnalyzerManagerConfig::from_core(&core).unwrap();
        assert_eq!(cfg.home_dir, PathBuf::from("/opt/vigil"));
        assert_eq!(cfg.server_url, "https://acme.example");
    }

    #[test]
    fn extract_skips_entries_escaping_destination() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("am");
        std::fs::create_dir_all(&dest).unwrap();
        let archive = zip_of(&[
            (BINARY_NAME, b"#!/bin/sh\n"),
            ("lib/rules.json", b"{}"),
            ("../escaped", b"nope"),
        ]);

        extract_archive(&archive, &dest).unwrap();

        assert!(dest.join(BINARY_NAME).is_file());
        assert!(dest.join("lib/rules.json").is_file());
        assert!(!dir.path().join("escaped").exists());
    }

    #[cfg(unix)]
    #[test]
    fn extracted_binary_is_executable() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        extract_archive(&zip_of(&[(BINARY_NAME, b"bin")]), dir.path()).unwrap();
        let mode = std::fs::metadata(dir.path().join(BINARY_NAME))
            .unwrap()
            .permissions()
            .mode();
        assert_ne!(mode & 0o111, 0);
    }

    #[test]
    fn garbage_archive_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(extract_archive(b"not a zip", dir.path()).is_err());
    }

    #[tokio::test]
    async fn cached_binary_with_matching_stamp_is_reused() {
        let home = tempfile::tempdir().unwrap();
        let install = home.path().join(INSTALL_DIR_NAME);
        std::fs::create_dir_all(&install).unwrap();
        std::fs::write(install.join(BINARY_NAME), b"bin").unwrap();
        std::fs::write(install.join(VERSION_STAMP), "1.8.14\n").unwrap();

        // no download URL: succeeding proves nothing was fetched
        let manager = AnalyzerManager::new(config(home.path(), "")).unwrap();
        manager.ensure_available().await.unwrap();
        manager.ensure_available().await.unwrap();
        assert_eq!(manager.binary.get(), Some(&manager.binary_path()));
    }

    #[tokio::test]
    async fn stale_binary_without_download_url_is_unavailable() {
        let home = tempfile::tempdir().unwrap();
        let install = home.path().join(INSTALL_DIR_NAME);
        std::fs::create_dir_all(&install).unwrap();
        std::fs::write(install.join(BINARY_NAME), b"bin").unwrap();
        std::fs::write(install.join(VERSION_STAMP), "1.0.0").unwrap();

        let manager = AnalyzerManager::new(config(home.path(), "")).unwrap();
        let err = manager.ensure_available().await.unwrap_err();
        assert!(matches!(err, JasScannerError::AnalyzerUnavailable(_)));
    }

    #[tokio::test]
    async fn unreachable_download_is_download_error() {
        let home = tempfile::tempdir().unwrap();
        let manager = AnalyzerManager::new(config(home.path(), "http://127.0.0.1:9")).unwrap();
        let err = manager.ensure_available().await.unwrap_err();
        assert!(matches!(err, JasScannerError::AnalyzerDownload { .. }));
    }
}
