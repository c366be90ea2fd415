//! 최소 SARIF 2.1.0 모델
//!
//! 정규화기와 결과 요약이 다루는 필드만 타입으로 정의합니다.
//! 분석기가 내보내는 나머지 필드는 `extra` 맵에 보존되므로
//! 읽고 정규화하고 다시 쓰는 과정에서 데이터가 사라지지 않습니다.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// SARIF 로그 파일 루트
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SarifLog {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default)]
    pub runs: Vec<Run>,
}

/// 분석 run 하나
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub tool: Tool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub invocations: Vec<Invocation>,
    #[serde(default)]
    pub results: Vec<SarifResult>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Run {
    /// 드라이버의 규칙을 ID로 찾습니다.
    pub fn rule_mut(&mut self, rule_id: &str) -> Option<&mut ReportingDescriptor> {
        self.tool.driver.rules.iter_mut().find(|r| r.id == rule_id)
    }

    /// 모든 결과의 위치 수 합계
    pub fn location_count(&self) -> usize {
        self.results.iter().map(|r| r.locations.len().max(1)).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub driver: ToolComponent,
}

/// `tool.driver`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolComponent {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub information_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<ReportingDescriptor>,
}

/// 드라이버가 선언한 규칙
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportingDescriptor {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, Value>>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invocation {
    #[serde(default)]
    pub execution_successful: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<ArtifactLocation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactLocation {
    #[serde(default)]
    pub uri: String,
}

/// 발견 항목 하나
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SarifResult {
    #[serde(default)]
    pub rule_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default)]
    pub message: Message,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suppressions: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, Value>>,
}

impl SarifResult {
    /// 발견 항목의 심각도 레이블
    ///
    /// `properties.severity`가 우선이며, 없으면 `level`에서 유도합니다.
    pub fn severity_label(&self) -> String {
        if let Some(severity) = self
            .properties
            .as_ref()
            .and_then(|p| p.get("severity"))
            .and_then(Value::as_str)
        {
            return severity.to_owned();
        }
        match self.level.as_deref().unwrap_or("") {
            "error" => "high",
            "warning" => "medium",
            "note" => "low",
            _ => "unknown",
        }
        .to_owned()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_analyzer_output_and_keeps_unknown_fields() {
        let raw = r#"{
          "version": "2.1.0",
          "runs": [{
            "tool": { "driver": { "name": "secrets", "rules": [{ "id": "REQ.SECRET.KEYS", "shortDescription": { "text": "keys" } }] } },
            "results": [{ "ruleId": "REQ.SECRET.KEYS", "level": "error", "message": { "text": "Secret" } }],
            "columnKind": "utf16CodeUnits"
          }]
        }"#;
        let log: SarifLog = serde_json::from_str(raw).unwrap();
        let run = &log.runs[0];
        assert_eq!(run.tool.driver.name, "secrets");
        assert!(run.extra.contains_key("columnKind"));
        assert!(run.tool.driver.rules[0].extra.contains_key("shortDescription"));
        assert_eq!(run.results[0].severity_label(), "high");
    }

    #[test]
    fn severity_property_overrides_level() {
        let result = SarifResult {
            level: Some("note".to_owned()),
            properties: Some(
                [("severity".to_owned(), Value::from("Critical"))]
                    .into_iter()
                    .collect(),
            ),
            ..SarifResult::default()
        };
        assert_eq!(result.severity_label(), "Critical");
    }

    #[test]
    fn missing_level_is_unknown() {
        assert_eq!(SarifResult::default().severity_label(), "unknown");
        let none = SarifResult {
            level: Some("none".to_owned()),
            ..SarifResult::default()
        };
        assert_eq!(none.severity_label(), "unknown");
    }
}
