//! 도메인 타입: 워크스페이스 전역에서 사용되는 공통 타입

use std::fmt;

use serde::{Deserialize, Serialize};

/// 심각도 레벨
///
/// `Ord` 구현으로 심각도 비교가 가능합니다 (`Unknown < Low < Medium < High < Critical`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Severity {
    /// 알 수 없음 / 미지정
    #[default]
    Unknown,
    /// 낮은 심각도
    Low,
    /// 중간 심각도
    Medium,
    /// 높은 심각도
    High,
    /// 치명적
    Critical,
}

impl Severity {
    /// 문자열에서 심각도를 파싱합니다.
    ///
    /// 대소문자를 구분하지 않습니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "" | "unknown" | "info" | "informational" => Some(Self::Unknown),
            "low" => Some(Self::Low),
            "medium" | "med" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" | "crit" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "Unknown"),
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
            Self::Critical => write!(f, "Critical"),
        }
    }
}

/// 스캔 카테고리
///
/// 문자열 태그 대신 닫힌 열거형으로 스캔 종류를 표현합니다.
/// 새 카테고리를 추가하면 태스크를 구성하는 모든 `match`가 컴파일 단계에서 갱신을 요구합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanCategory {
    /// 의존성 취약점 스캔
    Sca,
    /// 시크릿 탐지
    Secrets,
    /// Infrastructure-as-Code 스캔
    Iac,
    /// 취약점 적용 가능성(applicability) 분석
    Applicability,
    /// 정적 애플리케이션 보안 테스트
    Sast,
}

impl ScanCategory {
    /// 분석기 바이너리를 사용하는 고급 스캐너 카테고리 목록
    pub const ADVANCED: [ScanCategory; 4] = [
        ScanCategory::Applicability,
        ScanCategory::Secrets,
        ScanCategory::Iac,
        ScanCategory::Sast,
    ];

    /// 설정 파일 및 로그에서 사용하는 소문자 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sca => "sca",
            Self::Secrets => "secrets",
            Self::Iac => "iac",
            Self::Applicability => "applicability",
            Self::Sast => "sast",
        }
    }

    /// 고급 스캐너(분석기 바이너리 필요) 여부
    pub fn is_advanced(&self) -> bool {
        !matches!(self, Self::Sca)
    }

    /// 문자열에서 카테고리를 파싱합니다 (대소문자 구분 없음).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sca" => Some(Self::Sca),
            "secrets" | "secret" => Some(Self::Secrets),
            "iac" => Some(Self::Iac),
            "applicability" | "contextual_analysis" => Some(Self::Applicability),
            "sast" => Some(Self::Sast),
            _ => None,
        }
    }
}

impl fmt::Display for ScanCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering() {
        assert!(Severity::Unknown < Severity::Low);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn severity_from_str_loose_is_case_insensitive() {
        assert_eq!(Severity::from_str_loose("HIGH"), Some(Severity::High));
        assert_eq!(Severity::from_str_loose(""), Some(Severity::Unknown));
        assert_eq!(Severity::from_str_loose("bogus"), None);
    }

    #[test]
    fn advanced_categories_exclude_sca() {
        assert!(ScanCategory::ADVANCED.iter().all(ScanCategory::is_advanced));
        assert!(!ScanCategory::Sca.is_advanced());
    }

    #[test]
    fn category_roundtrips_through_str() {
        for cat in ScanCategory::ADVANCED {
            assert_eq!(ScanCategory::from_str_loose(cat.as_str()), Some(cat));
        }
    }

    #[test]
    fn category_serializes_lowercase() {
        let json = serde_json::to_string(&ScanCategory::Iac).unwrap();
        assert_eq!(json, "\"iac\"");
    }
}
