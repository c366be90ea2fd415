//! 실행 단위 임시 디렉토리
//!
//! [`ScratchRoot`]는 감사 실행 하나당 임시 디렉토리 하나를 소유합니다.
//! 스캐너 태스크마다 `<root>/<category>_<digits>` 하위 디렉토리를 받아
//! 설정 파일과 결과 파일을 기록하며, 모든 태스크 그룹이 끝난 뒤
//! 슈퍼바이저가 루트 전체를 해제합니다.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use rand::Rng;

use crate::error::JasScannerError;

/// 루트 디렉토리 이름 접두사
const ROOT_PREFIX: &str = "vigil-";

/// 실행 단위 임시 디렉토리
#[derive(Debug)]
pub struct ScratchRoot {
    root: PathBuf,
    seq: AtomicU64,
    released: AtomicBool,
}

impl ScratchRoot {
    /// `parent` 아래에 새 `vigil-XXXXXX` 디렉토리를 만듭니다.
    ///
    /// 디렉토리는 원자적으로 생성되며, 이미 존재하는 이름과 겹치면 다른 이름으로
    /// 다시 시도합니다. 다른 실행의 루트를 공유하는 일은 없습니다.
    ///
    /// # 에러
    ///
    /// `parent`가 비어 있거나 디렉토리를 만들 수 없으면 에러를 반환합니다.
    pub async fn create_in(parent: &Path) -> Result<Self, JasScannerError> {
        if parent.as_os_str().is_empty() {
            return Err(JasScannerError::Scratch(
                "temp directory path must not be empty".to_owned(),
            ));
        }
        let dir = tempfile::Builder::new()
            .prefix(ROOT_PREFIX)
            .tempdir_in(parent)
            .map_err(|e| JasScannerError::io(parent, e))?;
        // 해제는 release()가 담당
        let root = dir.keep();
        tracing::debug!(root = %root.display(), "created scratch root");
        Ok(Self::at(root))
    }

    /// 기존 디렉토리를 감쌉니다.
    pub fn at(root: PathBuf) -> Self {
        Self {
            root,
            seq: AtomicU64::new(0),
            released: AtomicBool::new(false),
        }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// 스캐너 태스크 하나를 위한 고유 하위 디렉토리를 만듭니다.
    ///
    /// 임의 숫자 4자리 뒤에 루트별 일련번호가 붙으므로 같은 카테고리의
    /// 태스크끼리도 디렉토리를 공유하지 않습니다.
    pub async fn acquire(&self, category: &str) -> Result<PathBuf, JasScannerError> {
        if self.is_released() {
            return Err(JasScannerError::Scratch(format!(
                "scratch root {} already released",
                self.root.display()
            )));
        }
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let dir = self
            .root
            .join(format!("{category}_{}{seq}", random_digits(4)));
        tokio::fs::create_dir(&dir)
            .await
            .map_err(|e| JasScannerError::io(&dir, e))?;
        Ok(dir)
    }

    /// 루트와 그 안의 모든 파일을 삭제합니다.
    ///
    /// 첫 호출만 동작하며, 디스크에 생성되지 않은 루트는 에러가 아닙니다.
    pub async fn release(&self) -> Result<(), JasScannerError> {
        if self.released.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => {
                tracing::debug!(root = %self.root.display(), "released scratch root");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(JasScannerError::io(&self.root, e)),
        }
    }
}

fn random_digits(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}
