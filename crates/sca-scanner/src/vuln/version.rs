//! 시맨틱 버전 범위 매칭
//!
//! `semver` 크레이트로 버전을 비교하며, SemVer가 아닌 문자열은 사전식 비교로 대체합니다.
//! `1.2`처럼 구성 요소가 모자란 버전은 `1.2.0`으로 보정한 뒤 비교합니다.

use std::cmp::Ordering;

use super::db::VersionRange;

impl VersionRange {
    /// 버전이 `introduced <= version < fixed` 범위에 포함되는지 확인합니다.
    ///
    /// 경계가 `None`이면 해당 방향으로 제한이 없습니다.
    pub fn contains(&self, version: &str) -> bool {
        let after_start = self
            .introduced
            .as_deref()
            .is_none_or(|intro| compare_versions(version, intro) != Ordering::Less);
        let before_end = self
            .fixed
            .as_deref()
            .is_none_or(|fixed| compare_versions(version, fixed) == Ordering::Less);
        after_start && before_end
    }
}

/// 여러 범위 중 하나라도 버전을 포함하면 `true`입니다. 범위가 없으면 `false`입니다.
pub fn is_affected(version: &str, ranges: &[VersionRange]) -> bool {
    ranges.iter().any(|range| range.contains(version))
}

/// 두 버전 문자열을 비교합니다.
///
/// 양쪽 모두 SemVer로 해석되면 SemVer 순서를, 아니면 문자열 순서를 사용합니다.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (parse_lenient(a), parse_lenient(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

fn parse_lenient(raw: &str) -> Option<semver::Version> {
    let trimmed = raw.trim().trim_start_matches('v');
    if let Ok(version) = semver::Version::parse(trimmed) {
        return Some(version);
    }
    // "1" / "1.2" -> "1.0.0" / "1.2.0"
    let dots = trimmed.chars().filter(|c| *c == '.').count();
    let padded = match dots {
        0 => format!("{trimmed}.0.0"),
        1 => format!("{trimmed}.0"),
        _ => return None,
    };
    semver::Version::parse(&padded).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(introduced: Option<&str>, fixed: Option<&str>) -> VersionRange {
        VersionRange {
            introduced: introduced.map(str::to_owned),
            fixed: fixed.map(str::to_owned),
        }
    }

    #[test]
    fn half_open_interval() {
        let r = range(Some("1.0.0"), Some("1.0.5"));
        assert!(r.contains("1.0.0"));
        assert!(r.contains("1.0.4"));
        assert!(!r.contains("1.0.5"));
        assert!(!r.contains("0.9.9"));
    }

    #[test]
    fn open_bounds() {
        assert!(range(None, Some("2.0.0")).contains("0.0.1"));
        assert!(range(Some("2.0.0"), None).contains("99.0.0"));
        assert!(range(None, None).contains("anything"));
    }

    #[test]
    fn prerelease_sorts_before_release() {
        let r = range(Some("1.0.0"), Some("1.0.5"));
        assert!(r.contains("1.0.3-alpha"));
        assert!(!r.contains("1.0.0-rc.1"));
    }

    #[test]
    fn short_and_prefixed_versions_are_padded() {
        assert_eq!(compare_versions("1.2", "1.2.0"), Ordering::Equal);
        assert_eq!(compare_versions("v2", "1.9.9"), Ordering::Greater);
        assert!(range(Some("1"), Some("2")).contains("1.5"));
    }

    #[test]
    fn non_semver_falls_back_to_string_order() {
        let r = range(Some("abc"), Some("def"));
        assert!(r.contains("bcd"));
        assert!(!r.contains("xyz"));
    }

    #[test]
    fn any_range_matches() {
        let ranges = [range(Some("1.0.0"), Some("1.0.5")), range(Some("2.0.0"), Some("2.0.3"))];
        assert!(is_affected("2.0.1", &ranges));
        assert!(!is_affected("1.5.0", &ranges));
        assert!(!is_affected("1.0.0", &[]));
    }
}
