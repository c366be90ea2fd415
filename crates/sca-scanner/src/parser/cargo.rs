//! Cargo.lock 파서
//!
//! [`CargoLockParser`]는 Cargo.lock (v3/v4) 파일을 파싱하여 평면 의존성 맵을 생성합니다.
//!
//! # 루트 결정
//!
//! - `source`가 없는 로컬 패키지가 하나면 그 패키지가 루트입니다.
//! - 로컬 패키지가 여럿이면(워크스페이스) 합성 루트 `cargo://workspace:0.0.0`을 만들고
//!   로컬 패키지를 자식으로 둡니다.
//! - 로컬 패키지가 없으면 아무도 의존하지 않는 패키지들이 합성 루트의 자식이 됩니다.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;

use crate::error::ScaScannerError;
use crate::parser::LockfileParser;
use crate::types::{DependencyEntry, DependencyGraph, Ecosystem};

const WORKSPACE_ROOT_NAME: &str = "workspace";
const WORKSPACE_ROOT_VERSION: &str = "0.0.0";

/// Cargo.lock 파서
pub struct CargoLockParser;

#[derive(Deserialize)]
struct CargoLockFile {
    #[serde(default, rename = "package")]
    packages: Vec<CargoPackage>,
}

#[derive(Deserialize)]
struct CargoPackage {
    name: String,
    version: String,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    dependencies: Vec<String>,
}

impl LockfileParser for CargoLockParser {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Cargo
    }

    fn can_parse(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name == "Cargo.lock")
    }

    fn parse(&self, content: &str, source_path: &str) -> Result<DependencyGraph, ScaScannerError> {
        let lock_file: CargoLockFile =
            toml::from_str(content).map_err(|e| ScaScannerError::LockfileParse {
                path: source_path.to_owned(),
                reason: e.to_string(),
            })?;

        let mut versions_by_name: HashMap<&str, Vec<&str>> = HashMap::new();
        for pkg in &lock_file.packages {
            versions_by_name
                .entry(pkg.name.as_str())
                .or_default()
                .push(pkg.version.as_str());
        }

        let mut nodes = HashMap::new();
        let mut depended_on = HashSet::new();
        for pkg in &lock_file.packages {
            let id = Ecosystem::Cargo.component_id(&pkg.name, &pkg.version);
            let children = pkg
                .dependencies
                .iter()
                .map(|spec| resolve_dependency(spec, &versions_by_name))
                .collect::<Vec<_>>();
            depended_on.extend(children.iter().cloned());
            nodes.insert(id, DependencyEntry { children });
        }

        let local: Vec<String> = lock_file
            .packages
            .iter()
            .filter(|p| p.source.is_none())
            .map(|p| Ecosystem::Cargo.component_id(&p.name, &p.version))
            .collect();

        let root = match local.as_slice() {
            [single] => single.clone(),
            _ => {
                let top_level: BTreeSet<String> = if local.is_empty() {
                    nodes
                        .keys()
                        .filter(|id| !depended_on.contains(*id))
                        .cloned()
                        .collect()
                } else {
                    local.into_iter().collect()
                };
                let root = Ecosystem::Cargo.component_id(WORKSPACE_ROOT_NAME, WORKSPACE_ROOT_VERSION);
                nodes.insert(root.clone(), DependencyEntry::new(top_level));
                root
            }
        };

        tracing::debug!(
            path = source_path,
            nodes = nodes.len(),
            root = %root,
            "parsed Cargo.lock"
        );

        Ok(DependencyGraph {
            source_file: source_path.to_owned(),
            ecosystem: Ecosystem::Cargo,
            root,
            nodes,
        })
    }
}

/// `dependencies` 항목("name", "name version", "name version (source)")을 ID로 해석합니다.
///
/// 버전이 생략되면 lockfile에 해당 이름의 패키지가 하나뿐이라는 Cargo 규칙을 따릅니다.
fn resolve_dependency(spec: &str, versions_by_name: &HashMap<&str, Vec<&str>>) -> String {
    let mut parts = spec.split_whitespace();
    let name = parts.next().unwrap_or(spec);
    let version = match parts.next() {
        Some(version) => version,
        None => versions_by_name
            .get(name)
            .and_then(|versions| versions.first().copied())
            .unwrap_or("*"),
    };
    Ecosystem::Cargo.component_id(name, version)
}
