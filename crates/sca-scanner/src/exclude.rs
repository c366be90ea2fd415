//! SCA 대상 탐색 제외 패턴
//!
//! 와일드카드 패턴 목록을 하나의 정규식으로 변환합니다.
//! 각 패턴은 `(^<regex>$)` 형태로 감싸지고 `|`로 연결됩니다.
//!
//! # 변환 규칙
//!
//! - `*` -> `.*`
//! - `?` -> `.`
//! - 그 외 문자는 정규식 이스케이프
//!
//! 패턴은 작업 디렉토리 기준 상대 경로에 대해 매칭됩니다.

use std::path::Path;

use regex::Regex;

use crate::error::ScaScannerError;

/// 제외 패턴이 지정되지 않았을 때 사용하는 기본값
pub const DEFAULT_SCA_EXCLUSIONS: [&str; 5] =
    ["*.git*", "*node_modules*", "*target*", "*venv*", "*test*"];

/// 제외 패턴 목록을 정규식 문자열로 변환합니다.
///
/// 목록이 비어 있으면 [`DEFAULT_SCA_EXCLUSIONS`]를 사용합니다.
pub fn exclude_pattern<S: AsRef<str>>(exclusions: &[S]) -> String {
    if exclusions.is_empty() {
        return join_patterns(DEFAULT_SCA_EXCLUSIONS.iter().copied());
    }
    join_patterns(exclusions.iter().map(AsRef::as_ref))
}

fn join_patterns<'a>(patterns: impl Iterator<Item = &'a str>) -> String {
    patterns
        .map(|p| format!("(^{}$)", wildcard_to_regex(p)))
        .collect::<Vec<_>>()
        .join("|")
}

fn wildcard_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() * 2);
    for ch in pattern.chars() {
        match ch {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            other => {
                let mut buf = [0u8; 4];
                out.push_str(&regex::escape(other.encode_utf8(&mut buf)));
            }
        }
    }
    out
}

/// 컴파일된 제외 매처
#[derive(Debug, Clone)]
pub struct ExcludeMatcher {
    regex: Regex,
}

impl ExcludeMatcher {
    /// 제외 패턴 목록으로 매처를 생성합니다.
    pub fn new<S: AsRef<str>>(exclusions: &[S]) -> Result<Self, ScaScannerError> {
        let pattern = exclude_pattern(exclusions);
        let regex = Regex::new(&pattern).map_err(|e| ScaScannerError::ExcludePattern {
            pattern: pattern.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self { regex })
    }

    /// 정규식 원문을 반환합니다.
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// 상대 경로 문자열이 제외 대상인지 확인합니다.
    pub fn is_excluded(&self, relative: &str) -> bool {
        !relative.is_empty() && self.regex.is_match(relative)
    }

    /// `base` 기준 상대 경로로 변환한 뒤 제외 여부를 확인합니다.
    ///
    /// `path`가 `base` 밖에 있으면 전체 경로로 매칭합니다.
    pub fn is_excluded_path(&self, base: &Path, path: &Path) -> bool {
        let relative = path.strip_prefix(base).unwrap_or(path);
        self.is_excluded(&relative.to_string_lossy())
    }
}
