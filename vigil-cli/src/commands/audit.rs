//! `vigil audit` command handler

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use tracing::info;

use vigil_audit::{AuditParams, AuditParamsBuilder, AuditResults, run_audit};
use vigil_core::config::VigilConfig;
use vigil_jas_scanner::{AnalyzerManager, AnalyzerManagerConfig, JasScanType};
use vigil_sca_scanner::{
    Component, GraphScanService, LocalGraphScanService, ScaScanResult, VulnDb, XrayGraphClient,
};

use crate::cli::AuditArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `audit` command.
///
/// A missing config file is not an error here: defaults plus env overrides apply.
pub async fn execute(
    args: AuditArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let mut config = VigilConfig::load_or_default(config_path).await?;
    apply_args(&mut config, &args);
    let fail = config.audit.fail || args.fail;
    let params = build_params(&config, &args)?;

    let analyzer_config = AnalyzerManagerConfig::from_core(&config)
        .map_err(|e| CliError::Config(e.to_string()))?;
    let analyzer =
        Arc::new(AnalyzerManager::new(analyzer_config).map_err(|e| CliError::Config(e.to_string()))?);

    let local_db = args
        .local_db
        .clone()
        .or_else(|| (config.sca.mode == "local").then(|| PathBuf::from(&config.sca.vuln_db_path)));

    let results = match local_db {
        Some(dir) => {
            let db = load_vuln_db(&dir).await?;
            // advanced scanners need a place to download the analyzer from
            let service = LocalGraphScanService::new(Arc::new(db))
                .with_advanced_security(!config.analyzer.download_url.is_empty());
            audit_with(params, Arc::new(service), analyzer).await?
        }
        None => {
            let service = XrayGraphClient::new(
                &config.server.url,
                &config.server.access_token,
                Duration::from_secs(config.server.timeout_secs),
            )
            .map_err(|e| CliError::Setup(e.to_string()))?;
            audit_with(params, Arc::new(service), analyzer).await?
        }
    };

    writer.render(&results)?;
    verdict(&results, fail, config.audit.include_vulnerabilities)
}

async fn audit_with<S: GraphScanService>(
    params: AuditParams,
    service: Arc<S>,
    analyzer: Arc<AnalyzerManager>,
) -> Result<AuditResults, CliError> {
    info!(
        working_dirs = params.working_dirs.len(),
        threads = params.threads,
        "starting audit"
    );
    Ok(run_audit(params, service, analyzer).await?)
}

/// Command-line flags override the `[audit]` section.
fn apply_args(config: &mut VigilConfig, args: &AuditArgs) {
    let audit = &mut config.audit;
    if let Some(threads) = args.threads {
        audit.threads = threads;
    }
    if !args.watches.is_empty() {
        audit.watches.clone_from(&args.watches);
    }
    if let Some(project) = &args.project {
        audit.project.clone_from(project);
    }
    if let Some(repo_path) = &args.repo_path {
        audit.repo_path.clone_from(repo_path);
    }
    if !args.exclusions.is_empty() {
        audit.exclusions.clone_from(&args.exclusions);
    }
    audit.include_vulnerabilities |= args.vuln;
    audit.include_licenses |= args.licenses;
}

fn build_params(config: &VigilConfig, args: &AuditArgs) -> Result<AuditParams, CliError> {
    let mut builder = AuditParamsBuilder::from_core(config);
    if !args.working_dirs.is_empty() {
        builder = builder.working_dirs(args.working_dirs.clone());
    }
    builder.build().map_err(|e| CliError::Config(e.to_string()))
}

async fn load_vuln_db(dir: &Path) -> Result<VulnDb, CliError> {
    let dir = dir.to_path_buf();
    let db = tokio::task::spawn_blocking(move || VulnDb::load_from_dir(&dir))
        .await
        .map_err(|e| CliError::Command(format!("vuln db loader failed: {e}")))?
        .map_err(|e| CliError::Setup(e.to_string()))?;
    info!(entries = db.entry_count(), "vulnerability database loaded");
    Ok(db)
}

/// Maps finished results to the exit status.
///
/// Task failures win over fail-build. Fail-build is skipped when all vulnerabilities
/// were requested explicitly.
pub fn verdict(
    results: &AuditResults,
    fail: bool,
    include_vulnerabilities: bool,
) -> Result<(), CliError> {
    if let Some(errors) = results.scan_error() {
        return Err(CliError::PartialFailure(errors.to_string()));
    }
    if fail && !include_vulnerabilities && results.check_fail_build() {
        return Err(CliError::FailBuild(format!(
            "{} issue(s) found that fail the build",
            results.sca_issue_count()
        )));
    }
    Ok(())
}

fn colored_severity(severity: &str) -> colored::ColoredString {
    let label = format!("[{}]", severity.to_lowercase());
    match severity.to_lowercase().as_str() {
        "critical" => label.red().bold(),
        "high" => label.red(),
        "medium" => label.yellow(),
        "low" => label.blue(),
        _ => label.normal(),
    }
}

fn first_path(components: &std::collections::BTreeMap<String, Component>) -> Option<String> {
    components.values().find_map(|c| {
        c.impact_paths.first().map(|path| {
            path.iter()
                .map(|n| n.component_id.as_str())
                .collect::<Vec<_>>()
                .join(" > ")
        })
    })
}

fn render_target(target: &ScaScanResult, w: &mut dyn Write) -> std::io::Result<()> {
    let issues = target.issue_count();
    let count = if issues == 0 {
        "no issues".green()
    } else {
        format!("{issues} issue(s)").red()
    };
    writeln!(
        w,
        "  {} ({}): {}",
        target.descriptor.bold(),
        target.technology,
        count
    )?;

    for response in &target.responses {
        for v in &response.violations {
            writeln!(
                w,
                "    {} {} {} (watch: {}){}",
                colored_severity(&v.severity),
                v.issue_id,
                v.summary,
                v.watch_name,
                if v.fail_build { " [fail-build]" } else { "" }
            )?;
            if let Some(path) = first_path(&v.components) {
                writeln!(w, "      {}", path.dimmed())?;
            }
        }
        for v in &response.vulnerabilities {
            writeln!(
                w,
                "    {} {} {}",
                colored_severity(&v.severity),
                v.issue_id,
                v.summary
            )?;
            if let Some(path) = first_path(&v.components) {
                writeln!(w, "      {}", path.dimmed())?;
            }
        }
        for l in &response.licenses {
            writeln!(w, "    license {} ({} component(s))", l.key, l.components.len())?;
        }
    }
    Ok(())
}

impl Render for AuditResults {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(
            w,
            "{} (service {}, scan {})",
            "Audit".bold(),
            self.service_version,
            self.multi_scan_id
        )?;

        writeln!(w, "\n{}", "Dependencies".bold().underline())?;
        if self.sca.is_empty() {
            writeln!(w, "  no lockfiles scanned")?;
        }
        for target in &self.sca {
            render_target(target, w)?;
        }

        if self.entitled_for_advanced_security {
            writeln!(w, "\n{}", "Advanced scanners".bold().underline())?;
            for scan_type in JasScanType::ALL {
                let findings = self.jas.finding_count(scan_type);
                let label = format!("{findings} finding(s)");
                let label = if findings == 0 { label.green() } else { label.yellow() };
                writeln!(w, "  {:<14} {}", scan_type.as_str(), label)?;
            }
        } else {
            writeln!(
                w,
                "\n{} advanced security scanners (secrets, iac, applicability, sast) are not enabled for this account",
                "notice:".cyan()
            )?;
        }

        if !self.errors.is_empty() {
            writeln!(w, "\n{}", "Errors".red().bold())?;
            for err in self.errors.iter() {
                writeln!(w, "  {err}")?;
            }
        }
        Ok(())
    }
}
