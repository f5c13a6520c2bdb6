use anyhow::{Context, Result, anyhow, bail};
use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use sitegraph_core::analysis::{Analyzer, SiteAnalysis};
use sitegraph_core::config::AnalysisConfig;
use sitegraph_core::crawl::CrawlData;
use sitegraph_core::diff::diff_snapshots;
use sitegraph_core::export::{ExportConfig, ExportFilter, ExportFormat, export};
use sitegraph_core::model::Severity;
use sitegraph_core::report::{
    ReportFormat, format_issue_kind, generate_diff_json, generate_diff_report, generate_json_report,
    generate_text_report, save_report,
};
use sitegraph_core::snapshot::Snapshot;
use sitegraph_core::store::{SnapshotListing, SnapshotStore};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

pub const DATABASE_FILE: &str = "sitegraph.db";

// Helper functions shared by the handlers

/// Database file inside a data directory, with `~` expanded
pub fn resolve_db_path(data_dir: &str) -> PathBuf {
    let expanded = shellexpand::tilde(data_dir);
    Path::new(expanded.as_ref()).join(DATABASE_FILE)
}

pub fn open_store(data_dir: &str) -> Result<SnapshotStore> {
    let db_path = resolve_db_path(data_dir);
    if !SnapshotStore::exists(&db_path) {
        bail!(
            "No database at {}. Run `sitegraph init` first.",
            db_path.display()
        );
    }
    SnapshotStore::new(&db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))
}

pub fn load_crawl_data(path: &Path) -> Result<CrawlData> {
    CrawlData::load(path)
        .with_context(|| format!("Failed to load crawl data from {}", path.display()))
}

/// Explicit configuration file, or defaults
pub fn load_analysis_config(path: Option<&PathBuf>) -> Result<AnalysisConfig> {
    let config = match path {
        Some(path) => AnalysisConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => AnalysisConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

pub fn load_export_config(format: ExportFormat, options: Option<&PathBuf>) -> Result<ExportConfig> {
    match options {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("Failed to read export options {}", path.display()))?;
            Ok(ExportConfig::from_json(format, &json)?)
        }
        None => Ok(ExportConfig::default_for(format)),
    }
}

/// Cache key covering everything that changes the rendered output
pub fn export_cache_key(config: &ExportConfig, filter: &ExportFilter) -> Result<String> {
    Ok(format!(
        "{}|{}|{}",
        config.format().as_str(),
        serde_json::to_string(config)?,
        serde_json::to_string(filter)?
    ))
}

pub fn parse_snapshot_id(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value.trim()).with_context(|| format!("'{}' is not a snapshot id", value))
}

/// Base and target for a diff. Missing ids default to the two most recent
/// snapshots of the project.
pub fn select_diff_pair(
    listings: &[SnapshotListing],
    base: Option<Uuid>,
    target: Option<Uuid>,
) -> Result<(Uuid, Uuid)> {
    match (base, target) {
        (Some(base), Some(target)) => Ok((base, target)),
        (base, target) => {
            let newest = listings.last().map(|l| l.id);
            let target = match target.or(newest) {
                Some(id) => id,
                None => bail!("The project has no snapshots"),
            };
            let base = match base {
                Some(id) => id,
                None => listings
                    .iter()
                    .rev()
                    .map(|l| l.id)
                    .find(|id| *id != target)
                    .ok_or_else(|| anyhow!("At least two snapshots are needed for a diff"))?,
            };
            Ok((base, target))
        }
    }
}

/// Analyse crawl data for a project. With a store, previous resolutions
/// are carried forward, a snapshot is stored and cached exports of the
/// project are invalidated.
pub fn run_analysis(
    store: Option<&SnapshotStore>,
    project: &str,
    data: &CrawlData,
    config: AnalysisConfig,
) -> Result<(SiteAnalysis, Option<Snapshot>)> {
    let analyzer = Analyzer::new(config)?;

    let Some(store) = store else {
        return Ok((analyzer.analyze(data)?, None));
    };

    let previous = store.latest_snapshot(project)?;
    let previous_issues = match &previous {
        Some(snapshot) => store.get_issues(snapshot.id())?,
        None => Vec::new(),
    };

    // Stored issues come back with recorded resolutions applied
    let analysis = analyzer.reanalyze(data, &previous_issues)?;

    let snapshot = Snapshot::capture(project, &analysis.graph, previous.as_ref());
    store.insert_snapshot(&snapshot, &analysis.issues)?;
    let invalidated = store.invalidate_exports(project)?;
    info!(
        "Stored snapshot {} for project {} ({} cached exports invalidated)",
        snapshot.id(),
        project,
        invalidated
    );

    Ok((analysis, Some(snapshot)))
}

/// Render a snapshot export, using the project's export cache unless
/// `use_cache` is false
pub fn render_export(
    store: &SnapshotStore,
    project: &str,
    snapshot: &Snapshot,
    config: &ExportConfig,
    filter: &ExportFilter,
    use_cache: bool,
) -> Result<String> {
    let cache_key = export_cache_key(config, filter)?;
    if use_cache
        && let Some(content) = store.cached_export(project, &cache_key, snapshot.id())?
    {
        debug!("Export cache hit for {}", config.format().as_str());
        return Ok(content);
    }

    let graph = snapshot.to_graph()?;
    let issues = store.get_issues(snapshot.id())?;
    let rendered = export(&graph, &issues, filter, config)?;
    store.cache_export(project, &cache_key, snapshot.id(), &rendered.content)?;
    Ok(rendered.content)
}

/// Mark an issue fingerprint resolved for a project and drop the project's
/// cached exports when the resolution is new
pub fn resolve_issue(store: &SnapshotStore, project: &str, fingerprint: &str) -> Result<bool> {
    if !store.resolve_issue(project, fingerprint)? {
        return Ok(false);
    }
    let invalidated = store.invalidate_exports(project)?;
    debug!(
        "Resolved {} for {} ({} cached exports invalidated)",
        fingerprint, project, invalidated
    );
    Ok(true)
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_prompt(msg: &str) -> Result<String> {
    print!("{} ", msg.bright_cyan().bold());
    io::stdout().flush()?;
    let mut response = String::new();
    io::stdin().read_line(&mut response)?;
    Ok(response.trim().to_lowercase())
}

fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(message.to_string());
    spinner
}

fn write_output(content: &str, output: Option<&PathBuf>) -> Result<()> {
    match output {
        Some(path) => {
            save_report(content, path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!(
                "{} Written to {}",
                "✓".green().bold(),
                path.display().to_string().bright_white()
            );
        }
        None => print!("{}", content),
    }
    Ok(())
}

fn arg_str<'a>(args: &'a ArgMatches, name: &str) -> Result<&'a str> {
    args.get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("missing argument --{}", name))
}

pub fn handle_init(args: &ArgMatches) -> Result<()> {
    let quiet = args.get_flag("quiet");
    if !quiet {
        print_divider();
        println!("{}", "  SITEGRAPH INITIALIZATION".bright_white().bold());
        print_divider();
        println!();
    }

    let data_dir = arg_str(args, "PATH")?;
    let force = args.get_flag("force");
    let db_path = resolve_db_path(data_dir);
    let config_dir = db_path
        .parent()
        .ok_or_else(|| anyhow!("Invalid database path {}", db_path.display()))?;

    if SnapshotStore::exists(&db_path) {
        if !force {
            println!("{}", "⚠ WARNING".yellow().bold());
            println!(
                "A database already exists at {}",
                db_path.display().to_string().bright_white()
            );
            println!("{}", "Continuing will delete every stored snapshot.".yellow());

            let response = print_prompt("Do you want to continue? [y/N]:")?;
            println!();
            if response != "y" && response != "yes" {
                println!("{} Initialization cancelled.", "✗".red().bold());
                return Ok(());
            }
        }
        SnapshotStore::drop(&db_path)
            .with_context(|| format!("Failed to remove {}", db_path.display()))?;
        println!("{} Removed existing database", "✓".green().bold());
    }

    fs::create_dir_all(config_dir)
        .with_context(|| format!("Failed to create {}", config_dir.display()))?;
    SnapshotStore::new(&db_path)
        .with_context(|| format!("Failed to create database {}", db_path.display()))?;

    println!("{} Config directory: {}", "✓".green().bold(), config_dir.display());
    println!("{} Database: {}", "✓".green().bold(), db_path.display());
    Ok(())
}

pub fn handle_analyze(args: &ArgMatches) -> Result<()> {
    let input = args
        .get_one::<PathBuf>("input")
        .ok_or_else(|| anyhow!("missing argument --input"))?;
    let project = arg_str(args, "project")?;
    let no_snapshot = args.get_flag("no-snapshot");
    let quiet = args.get_flag("quiet");
    let format = ReportFormat::from_str(arg_str(args, "format")?).unwrap_or(ReportFormat::Text);

    let config = load_analysis_config(args.get_one::<PathBuf>("config"))?;
    let data = load_crawl_data(input)?;
    let store = if no_snapshot {
        None
    } else {
        Some(open_store(arg_str(args, "data-dir")?)?)
    };

    let progress = (!quiet).then(|| spinner("Analysing site graph..."));
    let result = run_analysis(store.as_ref(), project, &data, config);
    if let Some(progress) = &progress {
        progress.finish_and_clear();
    }
    let (analysis, snapshot) = result?;

    if !quiet {
        println!(
            "{} Analysed {} pages and {} links",
            "✓".green().bold(),
            analysis.summary.totals.node_count,
            analysis.summary.totals.link_count
        );
        if let Some(snapshot) = &snapshot {
            println!(
                "{} Snapshot {} stored for project {}",
                "✓".green().bold(),
                snapshot.id().to_string().bright_white(),
                project.bright_white()
            );
            if let Some(summary) = snapshot.diff_summary() {
                for highlight in &summary.highlights {
                    println!("  {} {}", "•".yellow(), highlight);
                }
            }
        }
        println!();
    }

    let report = match format {
        ReportFormat::Text => generate_text_report(&analysis, args.get_flag("include-sitemap")),
        ReportFormat::Json => generate_json_report(&analysis)?,
    };
    write_output(&report, args.get_one::<PathBuf>("output"))
}

pub fn handle_export(args: &ArgMatches) -> Result<()> {
    let project = arg_str(args, "project")?;
    let format = ExportFormat::from_str(arg_str(args, "format")?)?;
    let config = load_export_config(format, args.get_one::<PathBuf>("options"))?;
    let filter = ExportFilter {
        exclude_errors: args.get_flag("exclude-errors"),
        exclude_external: args.get_flag("exclude-external"),
    };
    let store = open_store(arg_str(args, "data-dir")?)?;

    let snapshot = match args.get_one::<String>("snapshot") {
        Some(id) => {
            let id = parse_snapshot_id(id)?;
            store
                .get_snapshot(id)?
                .ok_or_else(|| anyhow!("Snapshot {} not found", id))?
        }
        None => store.latest_snapshot(project)?.ok_or_else(|| {
            anyhow!(
                "Project '{}' has no snapshots. Run `sitegraph analyze` first.",
                project
            )
        })?,
    };

    let content = render_export(
        &store,
        snapshot.project(),
        &snapshot,
        &config,
        &filter,
        !args.get_flag("no-cache"),
    )?;

    let output = args.get_one::<PathBuf>("output");
    write_output(&content, output)
}

pub fn handle_snapshot_list(args: &ArgMatches) -> Result<()> {
    let project = arg_str(args, "project")?;
    let store = open_store(arg_str(args, "data-dir")?)?;
    let listings = store.list_snapshots(project)?;

    if listings.is_empty() {
        println!("No snapshots for project {}", project.bright_white());
        return Ok(());
    }

    print_divider();
    println!("  {} {}", "SNAPSHOTS".bright_white().bold(), project.bright_white());
    print_divider();
    for listing in &listings {
        let changes = listing
            .diff_summary
            .as_ref()
            .map(|d| {
                format!(
                    "pages +{} -{} ~{}",
                    d.nodes_added, d.nodes_removed, d.nodes_changed
                )
            })
            .unwrap_or_else(|| "first snapshot".to_string());
        println!(
            "{}  {}  {:>5} pages  {:>4} issues  {}",
            listing.id.to_string().bright_white(),
            listing.created_at.format("%Y-%m-%d %H:%M:%S"),
            listing.metadata.node_count,
            listing.metadata.issue_count,
            changes.bright_black()
        );
    }
    Ok(())
}

pub fn handle_snapshot_show(args: &ArgMatches) -> Result<()> {
    let id = parse_snapshot_id(arg_str(args, "ID")?)?;
    let store = open_store(arg_str(args, "data-dir")?)?;
    let snapshot = store
        .get_snapshot(id)?
        .ok_or_else(|| anyhow!("Snapshot {} not found", id))?;

    print_divider();
    println!("  {} {}", "SNAPSHOT".bright_white().bold(), snapshot.id());
    print_divider();
    println!("Project:      {}", snapshot.project());
    println!("Created:      {}", snapshot.created_at().to_rfc3339());
    for (metric, value) in snapshot.metadata().metrics() {
        println!("{:<22}{}", format!("{}:", metric), value);
    }
    if let Some(summary) = snapshot.diff_summary() {
        println!("Previous:     {}", summary.base_snapshot_id);
        for highlight in &summary.highlights {
            println!("  {} {}", "•".yellow(), highlight);
        }
    }
    Ok(())
}

pub fn handle_diff(args: &ArgMatches) -> Result<()> {
    let project = arg_str(args, "project")?;
    let store = open_store(arg_str(args, "data-dir")?)?;
    let base = args.get_one::<String>("base").map(|s| parse_snapshot_id(s)).transpose()?;
    let target = args.get_one::<String>("target").map(|s| parse_snapshot_id(s)).transpose()?;

    let listings = store.list_snapshots(project)?;
    let (base_id, target_id) = select_diff_pair(&listings, base, target)?;
    let base = store
        .get_snapshot(base_id)?
        .ok_or_else(|| anyhow!("Snapshot {} not found", base_id))?;
    let target = store
        .get_snapshot(target_id)?
        .ok_or_else(|| anyhow!("Snapshot {} not found", target_id))?;

    let diff = diff_snapshots(&base, &target);
    let report = match ReportFormat::from_str(arg_str(args, "format")?) {
        Some(ReportFormat::Json) => generate_diff_json(&diff)?,
        _ => generate_diff_report(&diff),
    };
    write_output(&report, args.get_one::<PathBuf>("output"))
}

pub fn handle_issues_list(args: &ArgMatches) -> Result<()> {
    let project = arg_str(args, "project")?;
    let show_all = args.get_flag("all");
    let store = open_store(arg_str(args, "data-dir")?)?;
    let snapshot = store
        .latest_snapshot(project)?
        .ok_or_else(|| anyhow!("Project '{}' has no snapshots", project))?;

    let issues = store.get_issues(snapshot.id())?;
    let shown: Vec<_> = issues.iter().filter(|i| show_all || !i.resolved).collect();
    if shown.is_empty() {
        println!("{} No open issues", "✓".green().bold());
        return Ok(());
    }

    for issue in shown {
        let label = issue.severity.as_str().to_uppercase();
        let severity = match issue.severity {
            Severity::Critical => label.red().bold(),
            Severity::Serious => label.yellow().bold(),
            Severity::Moderate | Severity::Minor => label.normal(),
        };
        let url = snapshot
            .node(issue.node_id)
            .map(|n| n.url.as_str())
            .unwrap_or("unknown");
        println!(
            "[{}] {}{}  {}",
            severity,
            format_issue_kind(issue.kind.as_str()),
            if issue.resolved { " (resolved)" } else { "" },
            url
        );
        println!("    {}", issue.fingerprint.bright_black());
    }
    Ok(())
}

pub fn handle_issues_resolve(args: &ArgMatches) -> Result<()> {
    let project = arg_str(args, "project")?;
    let fingerprint = arg_str(args, "FINGERPRINT")?;
    let store = open_store(arg_str(args, "data-dir")?)?;

    if resolve_issue(&store, project, fingerprint)? {
        println!("{} Resolved {}", "✓".green().bold(), fingerprint);
    } else {
        println!("{} {} was already resolved", "→".blue(), fingerprint);
    }
    Ok(())
}
