//! HTTP 그래프 스캔 클라이언트
//!
//! [`XrayGraphClient`]는 원격 취약점 서비스의 REST API를 호출합니다.
//!
//! # 엔드포인트
//!
//! | 메서드 | 경로 | 용도 |
//! |---|---|---|
//! | GET | `api/v1/system/version` | 서비스 버전 |
//! | GET | `api/v1/entitlements/feature/{feature}` | 엔타이틀먼트 |
//! | POST | `api/v1/scan/graph` | 그래프 제출, `scan_id` 반환 |
//! | GET | `api/v1/scan/graph/{scan_id}` | 결과 폴링 (202 동안 대기) |

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};

use crate::error::ScaScannerError;
use crate::service::{GraphScanParams, GraphScanService};
use crate::types::{GraphNode, ScanResponse};

const VERSION_ENDPOINT: &str = "api/v1/system/version";
const ENTITLEMENT_ENDPOINT: &str = "api/v1/entitlements/feature";
const SCAN_GRAPH_ENDPOINT: &str = "api/v1/scan/graph";

/// 결과 폴링 기본 간격
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// 결과 폴링 최대 대기 시간
const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// 원격 그래프 스캔 클라이언트
pub struct XrayGraphClient {
    client: reqwest::Client,
    base_url: String,
    poll_interval: Duration,
    poll_timeout: Duration,
}

#[derive(Deserialize)]
struct VersionResponse {
    xray_version: String,
}

#[derive(Deserialize)]
struct EntitlementResponse {
    #[serde(default)]
    entitled: bool,
}

#[derive(Deserialize)]
struct ScanSubmitResponse {
    scan_id: String,
}

#[derive(Serialize)]
struct ScanGraphRequest<'a> {
    #[serde(flatten)]
    graph: &'a GraphNode,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    watches: &'a [String],
    #[serde(rename = "project", skip_serializing_if = "str::is_empty")]
    project_key: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    repo_path: &'a str,
}

impl XrayGraphClient {
    /// 새 클라이언트를 생성합니다.
    ///
    /// `base_url`은 끝의 `/` 유무와 관계없이 받습니다.
    pub fn new(base_url: &str, access_token: &str, timeout: Duration) -> Result<Self, ScaScannerError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("vigil/", env!("CARGO_PKG_VERSION"))),
        );
        if !access_token.is_empty() {
            let value = HeaderValue::from_str(&format!("Bearer {access_token}")).map_err(|e| {
                ScaScannerError::Config {
                    field: "server.access_token".to_owned(),
                    reason: e.to_string(),
                }
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ScaScannerError::Service {
                endpoint: base_url.to_owned(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        let mut base_url = base_url.to_owned();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(Self {
            client,
            base_url,
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        })
    }

    /// 결과 폴링 간격과 최대 대기 시간을 설정합니다.
    pub fn with_polling(mut self, interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = interval;
        self.poll_timeout = timeout;
        self
    }

    /// 서비스 기본 URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, endpoint: &str) -> Result<T, ScaScannerError> {
        let service_err = |reason: String| ScaScannerError::Service {
            endpoint: endpoint.to_owned(),
            reason,
        };
        self.client
            .get(self.url(endpoint))
            .send()
            .await
            .map_err(|e| service_err(e.to_string()))?
            .error_for_status()
            .map_err(|e| service_err(e.to_string()))?
            .json()
            .await
            .map_err(|e| service_err(format!("invalid response body: {e}")))
    }

    async fn submit(&self, tree: &GraphNode, params: &GraphScanParams) -> Result<String, ScaScannerError> {
        let service_err = |reason: String| ScaScannerError::Service {
            endpoint: SCAN_GRAPH_ENDPOINT.to_owned(),
            reason,
        };
        let body = ScanGraphRequest {
            graph: tree,
            watches: &params.watches,
            project_key: &params.project_key,
            repo_path: &params.repo_path,
        };

        let mut request = self.client.post(self.url(SCAN_GRAPH_ENDPOINT)).json(&body);
        if !params.multi_scan_id.is_empty() {
            request = request.query(&[("multi_scan_id", params.multi_scan_id.as_str())]);
        }

        let submitted: ScanSubmitResponse = request
            .send()
            .await
            .map_err(|e| service_err(e.to_string()))?
            .error_for_status()
            .map_err(|e| service_err(e.to_string()))?
            .json()
            .await
            .map_err(|e| service_err(format!("invalid response body: {e}")))?;
        Ok(submitted.scan_id)
    }

    async fn poll_results(&self, scan_id: &str, params: &GraphScanParams) -> Result<ScanResponse, ScaScannerError> {
        let endpoint = format!("{SCAN_GRAPH_ENDPOINT}/{scan_id}");
        let service_err = |reason: String| ScaScannerError::Service {
            endpoint: endpoint.clone(),
            reason,
        };
        let query = [
            ("include_vulnerabilities", params.include_vulnerabilities.to_string()),
            ("include_licenses", params.include_licenses.to_string()),
        ];
        let deadline = tokio::time::Instant::now() + self.poll_timeout;

        loop {
            let response = self
                .client
                .get(self.url(&endpoint))
                .query(&query)
                .send()
                .await
                .map_err(|e| service_err(e.to_string()))?;

            if response.status() != StatusCode::ACCEPTED {
                let response = response
                    .error_for_status()
                    .map_err(|e| service_err(e.to_string()))?;
                let mut result: ScanResponse = response
                    .json()
                    .await
                    .map_err(|e| service_err(format!("invalid response body: {e}")))?;
                if result.scan_id.is_empty() {
                    result.scan_id = scan_id.to_owned();
                }
                return Ok(result);
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(service_err(format!(
                    "scan results not ready after {}s",
                    self.poll_timeout.as_secs()
                )));
            }
            tracing::trace!(scan_id, "scan in progress, polling again");
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

impl GraphScanService for XrayGraphClient {
    async fn version(&self) -> Result<String, ScaScannerError> {
        let response: VersionResponse = self.get_json(VERSION_ENDPOINT).await?;
        tracing::debug!(version = %response.xray_version, "service version");
        Ok(response.xray_version)
    }

    async fn is_entitled(&self, feature: &str) -> Result<bool, ScaScannerError> {
        let endpoint = format!("{ENTITLEMENT_ENDPOINT}/{feature}");
        let response: EntitlementResponse = self.get_json(&endpoint).await?;
        Ok(response.entitled)
    }

    async fn scan_graph(
        &self,
        tree: &GraphNode,
        params: &GraphScanParams,
    ) -> Result<ScanResponse, ScaScannerError> {
        let scan_id = self.submit(tree, params).await?;
        tracing::debug!(scan_id = %scan_id, root = %tree.id, "graph submitted");
        self.poll_results(&scan_id, params).await
    }
}
