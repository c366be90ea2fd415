#![doc = include_str!("../README.md")]
//!
//! # Module Structure
//!
//! - [`error`]: Domain error types (`ScaScannerError`)
//! - [`config`]: Scanner configuration (`ScaScannerConfig`, builder)
//! - [`types`]: Domain types (`GraphNode`, `DependencyEntry`, `ScanResponse`, `Ecosystem`)
//! - [`tree`]: Flat dependency map to rooted tree (`build_dependency_tree`)
//! - [`impact`]: Root-to-component impact paths (`build_impact_paths_for_scan_responses`)
//! - [`exclude`]: Target discovery exclusion regex (`ExcludeMatcher`)
//! - [`parser`]: Lockfile parsers (`LockfileParser` trait, `CargoLockParser`, `NpmLockParser`)
//! - [`vuln`]: Local vulnerability DB and matching (`VulnDb`, `VulnMatcher`)
//! - [`service`]: Graph scan backends (`GraphScanService` trait, `XrayGraphClient`, `LocalGraphScanService`)
//! - [`scanner`]: Per-target scan flow (`ScaScanner`, `ScanTarget`, `ScaScanResult`)
//!
//! # Architecture
//!
//! ```text
//! working dirs --> ExcludeMatcher/LockfileDetector --> ScanTarget
//!                                                         |
//!                                                  LockfileParser
//!                                                         |
//!                                                  DependencyGraph
//!                                                         |
//!                                               build_dependency_tree
//!                                                         |
//!                                       GraphNode --> GraphScanService::scan_graph
//!                                                         |
//!                                          build_impact_paths_for_scan_responses
//!                                                         |
//!                                                   ScaScanResult
//! ```

pub mod config;
pub mod error;
pub mod exclude;
pub mod impact;
pub mod parser;
pub mod scanner;
pub mod service;
pub mod tree;
pub mod types;
pub mod vuln;

// --- Public API Re-exports ---

// Scanner
pub use scanner::{ScaScanResult, ScaScanner, ScanTarget};

// Configuration
pub use config::{ScaScannerConfig, ScaScannerConfigBuilder};

// Error
pub use error::ScaScannerError;

// Types
pub use types::{
    Component, Cve, DependencyEntry, DependencyGraph, Ecosystem, GraphNode, ImpactPath,
    ImpactPathNode, License, ScanResponse, Violation, Vulnerability,
};

// Tree & impact paths
pub use impact::{build_impact_paths_for_scan_responses, impact_paths, set_paths_for_issues};
pub use tree::{build_dependency_tree, reachable_ids};

// Exclusions
pub use exclude::{DEFAULT_SCA_EXCLUSIONS, ExcludeMatcher, exclude_pattern};

// Parser
pub use parser::{CargoLockParser, LockfileDetector, LockfileParser, NpmLockParser};

// Vulnerability
pub use vuln::{VersionRange, VulnDb, VulnDbEntry, VulnMatcher};

// Service
pub use service::{
    GRAPH_SCAN_MIN_VERSION, GraphScanParams, GraphScanService, LocalGraphScanService,
    XrayGraphClient, is_entitled_for_advanced_security, validate_minimum_version,
};
