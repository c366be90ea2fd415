//! 의존성 파일 파서 -- Cargo.lock, package-lock.json
//!
//! [`LockfileParser`] trait은 각 lockfile 형식의 파서가 구현해야 하는 인터페이스입니다.
//! 파서는 루트 ID와 평면 의존성 맵을 담은 [`DependencyGraph`]를 생성하며,
//! 트리 구성은 [`crate::tree`]가 담당합니다.
//!
//! # 지원 형식
//!
//! - `Cargo.lock` (TOML) -- [`CargoLockParser`]
//! - `package-lock.json` v2/v3 (JSON) -- [`NpmLockParser`]
//!
//! # 확장
//!
//! 새로운 형식을 지원하려면 `LockfileParser` trait을 구현하고
//! [`LockfileDetector`]와 [`parser_for`]에 등록합니다.

pub mod cargo;
pub mod npm;

use std::path::Path;

pub use cargo::CargoLockParser;
pub use npm::NpmLockParser;

use crate::error::ScaScannerError;
use crate::types::{DependencyGraph, Ecosystem};

/// Lockfile 파서 trait
pub trait LockfileParser: Send + Sync {
    /// 이 파서가 담당하는 생태계를 반환합니다.
    fn ecosystem(&self) -> Ecosystem;

    /// 주어진 경로의 파일을 이 파서가 처리할 수 있는지 확인합니다.
    fn can_parse(&self, path: &Path) -> bool;

    /// lockfile 내용을 파싱하여 평면 의존성 그래프를 반환합니다.
    ///
    /// # Arguments
    ///
    /// - `content`: lockfile 파일 내용 (UTF-8 문자열)
    /// - `source_path`: 원본 파일 경로 (에러 메시지용)
    fn parse(&self, content: &str, source_path: &str) -> Result<DependencyGraph, ScaScannerError>;
}

/// 생태계에 맞는 파서를 반환합니다.
///
/// 지원하지 않는 생태계면 `None`을 반환합니다.
pub fn parser_for(ecosystem: Ecosystem) -> Option<&'static dyn LockfileParser> {
    match ecosystem {
        Ecosystem::Cargo => Some(&CargoLockParser),
        Ecosystem::Npm => Some(&NpmLockParser),
        Ecosystem::Go | Ecosystem::Pip => None,
    }
}

/// Lockfile 탐지기
///
/// 파일 이름으로 지원되는 lockfile인지 판별합니다.
pub struct LockfileDetector {
    known_filenames: Vec<(&'static str, Ecosystem)>,
}

impl LockfileDetector {
    /// 기본 lockfile 패턴으로 탐지기를 생성합니다.
    pub fn new() -> Self {
        Self {
            known_filenames: vec![
                ("Cargo.lock", Ecosystem::Cargo),
                ("package-lock.json", Ecosystem::Npm),
            ],
        }
    }

    /// 알려진 lockfile 파일명 목록을 반환합니다.
    pub fn known_filenames(&self) -> &[(&'static str, Ecosystem)] {
        &self.known_filenames
    }

    /// 주어진 경로가 알려진 lockfile인지 확인합니다.
    pub fn is_lockfile(&self, path: &Path) -> bool {
        self.detect_ecosystem(path).is_some()
    }

    /// lockfile의 생태계를 반환합니다.
    pub fn detect_ecosystem(&self, path: &Path) -> Option<Ecosystem> {
        let file_name = path.file_name().and_then(|n| n.to_str())?;

        self.known_filenames
            .iter()
            .find(|(known, _)| *known == file_name)
            .map(|(_, eco)| *eco)
    }
}

impl Default for LockfileDetector {
    fn default() -> Self {
        Self::new()
    }
}
