//! package-lock.json 파서
//!
//! [`NpmLockParser`]는 NPM의 package-lock.json (v2/v3) 파일을 파싱하여
//! 평면 의존성 맵을 생성합니다.
//!
//! # 의존성 해석
//!
//! `node_modules/a/node_modules/b` 위치의 패키지가 `c`에 의존하면 다음 순서로 찾습니다.
//!
//! 1. `node_modules/a/node_modules/b/node_modules/c`
//! 2. `node_modules/a/node_modules/c`
//! 3. `node_modules/c`
//!
//! 찾지 못한 의존성은 `npm://<name>:<range>` 리프가 됩니다.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Deserialize;

use crate::error::ScaScannerError;
use crate::parser::LockfileParser;
use crate::types::{DependencyEntry, DependencyGraph, Ecosystem};

const NODE_MODULES: &str = "node_modules/";
const NESTED_NODE_MODULES: &str = "/node_modules/";

/// package-lock.json 파서
pub struct NpmLockParser;

#[derive(Deserialize)]
struct NpmLockFile {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    packages: BTreeMap<String, NpmPackageEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NpmPackageEntry {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
    #[serde(default)]
    dev_dependencies: BTreeMap<String, String>,
    #[serde(default)]
    optional_dependencies: BTreeMap<String, String>,
}

impl NpmPackageEntry {
    fn all_dependencies(&self) -> impl Iterator<Item = (&String, &String)> {
        self.dependencies
            .iter()
            .chain(&self.dev_dependencies)
            .chain(&self.optional_dependencies)
    }
}

impl LockfileParser for NpmLockParser {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Npm
    }

    fn can_parse(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name == "package-lock.json")
    }

    fn parse(&self, content: &str, source_path: &str) -> Result<DependencyGraph, ScaScannerError> {
        let lock_file: NpmLockFile =
            serde_json::from_str(content).map_err(|e| ScaScannerError::LockfileParse {
                path: source_path.to_owned(),
                reason: e.to_string(),
            })?;

        let root_entry = lock_file.packages.get("");
        let root_name = root_entry
            .and_then(|e| e.name.clone())
            .or_else(|| lock_file.name.clone())
            .unwrap_or_else(|| "root".to_owned());
        let root_version = root_entry
            .and_then(|e| e.version.clone())
            .or_else(|| lock_file.version.clone())
            .unwrap_or_else(|| "0.0.0".to_owned());
        let root = Ecosystem::Npm.component_id(&root_name, &root_version);

        let mut nodes: HashMap<String, DependencyEntry> = HashMap::new();

        for (key, entry) in &lock_file.packages {
            let id = if key.is_empty() {
                root.clone()
            } else {
                let Some(version) = &entry.version else {
                    // 링크 항목 등 버전 없는 항목은 건너뜀
                    continue;
                };
                Ecosystem::Npm.component_id(&extract_package_name(key), version)
            };

            if nodes.contains_key(&id) {
                continue;
            }

            let children = entry
                .all_dependencies()
                .map(|(dep, range)| resolve(&lock_file.packages, key, dep, range))
                .collect::<Vec<_>>();
            nodes.insert(id, DependencyEntry { children });
        }

        tracing::debug!(
            path = source_path,
            nodes = nodes.len(),
            "parsed package-lock.json"
        );

        Ok(DependencyGraph {
            source_file: source_path.to_owned(),
            ecosystem: Ecosystem::Npm,
            root,
            nodes,
        })
    }
}

/// `from` 위치에서 의존성 `dep`을 해석하여 컴포넌트 ID를 반환합니다.
fn resolve(
    packages: &BTreeMap<String, NpmPackageEntry>,
    from: &str,
    dep: &str,
    range: &str,
) -> String {
    let mut location = from;
    loop {
        let candidate = if location.is_empty() {
            format!("{NODE_MODULES}{dep}")
        } else {
            format!("{location}/{NODE_MODULES}{dep}")
        };
        if let Some(version) = packages.get(&candidate).and_then(|e| e.version.as_deref()) {
            return Ecosystem::Npm.component_id(dep, version);
        }
        if location.is_empty() {
            break;
        }
        location = parent_location(location);
    }
    Ecosystem::Npm.component_id(dep, range)
}

/// 중첩된 `node_modules` 키의 상위 위치를 반환합니다.
///
/// `node_modules/a/node_modules/b` -> `node_modules/a`, `node_modules/a` -> ``
fn parent_location(key: &str) -> &str {
    match key.rfind(NESTED_NODE_MODULES) {
        Some(pos) => &key[..pos],
        None => "",
    }
}

/// "node_modules/@scope/name" 또는 "node_modules/name" 에서 패키지명 추출
fn extract_package_name(key: &str) -> String {
    match key.rfind(NODE_MODULES) {
        Some(pos) => key[pos + NODE_MODULES.len()..].to_owned(),
        None => key.to_owned(),
    }
}
