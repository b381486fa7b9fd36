use anchorscope_core::analysis::AnalysisResult;
use anchorscope_core::config::{AnalyzerConfig, AnchorGrouping};
use anchorscope_core::crawl::{Analyzer, Outcome, extract_url_path};
use anchorscope_core::data::Database;
use anchorscope_core::layout::{WordCloudLayout, WordCloudLayoutEngine};
use anchorscope_core::protocol::{
    AnalysisRequest, AnalysisResponse, InputOption, OPTION_MANUAL_SITEMAP, OPTION_MANUAL_URLS,
    OPTION_RETRY_SITEMAP, UserInputRequest,
};
use anchorscope_core::quota::{MemoryQuotaStore, QuotaGate, QuotaStore, UsageQuota};
use anchorscope_core::report::{ReportFormat, generate_report, save_report};
use anchorscope_core::table::AnchorFilter;
use anchorscope_scanner::{EmptyAnchorPolicy, HttpFetcher};
use anyhow::{Context, Result, anyhow, bail};
use chrono::Utc;
use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{Value, json};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_CONFIG_DIR: &str = "~/.config/anchorscope/";
pub const DATABASE_FILE: &str = "anchorscope.db";
pub const DEFAULT_CALLER: &str = "cli";

// Helper functions

/// Expand `~` in a config directory argument.
pub fn resolve_config_dir(dir: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(dir).as_ref())
}

pub fn database_path(config_dir: &Path) -> PathBuf {
    config_dir.join(DATABASE_FILE)
}

/// Open the database if `init` has been run; `None` otherwise.
pub fn open_database(config_dir: &Path) -> Result<Option<Database>> {
    let db_path = database_path(config_dir);
    if !Database::exists(&db_path) {
        return Ok(None);
    }
    let db = Database::new(&db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    Ok(Some(db))
}

fn require_database(config_dir: &Path) -> Result<Database> {
    open_database(config_dir)?.ok_or_else(|| {
        anyhow!(
            "No database at {}. Run `anchorscope init` first.",
            database_path(config_dir).display()
        )
    })
}

/// Split free-form URL input into entries.
pub fn split_url_input(input: &str) -> Vec<String> {
    input
        .split(|c: char| c.is_whitespace() || c == ',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Read a newline-delimited URL list. Blank lines and `#` comments are skipped.
pub fn load_urls_from_file(path: &Path) -> Result<Vec<String>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read URL file {}: {}", path.display(), e))?;

    let urls: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect();

    if urls.is_empty() {
        return Err(format!("No URLs found in {}", path.display()));
    }

    Ok(urls)
}

/// Match a reply against the offered options, by number or by id.
pub fn parse_choice<'a>(reply: &str, options: &'a [InputOption]) -> Option<&'a InputOption> {
    let reply = reply.trim();
    if let Ok(n) = reply.parse::<usize>() {
        return n.checked_sub(1).and_then(|i| options.get(i));
    }
    options.iter().find(|o| o.id.eq_ignore_ascii_case(reply))
}

/// Build the follow-up request for the option the user picked.
pub fn next_request(site: &str, option_id: &str, payload: &str) -> Option<AnalysisRequest> {
    match option_id {
        OPTION_MANUAL_SITEMAP | OPTION_RETRY_SITEMAP => {
            Some(AnalysisRequest::manual_sitemap(site, payload.trim()))
        }
        OPTION_MANUAL_URLS => Some(AnalysisRequest::manual_urls(site, split_url_input(payload))),
        _ => None,
    }
}

/// Process exit code for a protocol status.
pub fn exit_code(status: u16) -> i32 {
    match status {
        200 => 0,
        400 => 2,
        429 => 3,
        504 => 4,
        _ => 1,
    }
}

/// Load an analysis from a JSON file (raw result, JSON report or success
/// response) or, failing that, from the database by id prefix.
pub fn load_analysis(source: &str, config_dir: &Path) -> Result<AnalysisResult> {
    let path = Path::new(source);
    if path.is_file() {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        return parse_analysis_json(&content)
            .with_context(|| format!("{} does not contain an analysis", path.display()));
    }

    let db = require_database(config_dir)?;
    let id = db
        .find_analysis_id(source)?
        .ok_or_else(|| anyhow!("No analysis matching '{}'", source))?;
    db.load_analysis(&id)?
        .ok_or_else(|| anyhow!("Analysis {} disappeared", id))
}

/// Delete a saved analysis by id prefix and return its full id.
pub fn delete_saved_analysis(prefix: &str, config_dir: &Path) -> Result<String> {
    let db = require_database(config_dir)?;
    let id = db
        .find_analysis_id(prefix)?
        .ok_or_else(|| anyhow!("No analysis matching '{}'", prefix))?;
    if !db.delete_analysis(&id)? {
        bail!("Analysis {} disappeared", id);
    }
    Ok(id)
}

pub fn parse_analysis_json(content: &str) -> Result<AnalysisResult> {
    let value: Value = serde_json::from_str(content)?;
    let analysis = value
        .pointer("/report/analysis")
        .or_else(|| value.get("data"))
        .unwrap_or(&value);
    Ok(serde_json::from_value(analysis.clone())?)
}

/// Layout as JSON for consumers that render the cloud themselves.
pub fn layout_json(layout: &WordCloudLayout) -> Value {
    let items: Vec<Value> = layout
        .items
        .iter()
        .map(|item| {
            json!({
                "text": item.record.text,
                "count": item.record.count,
                "x": item.x,
                "y": item.y,
                "width": item.width,
                "height": item.height,
                "fontSizePx": item.font_size_px,
                "color": item.color.hex(),
            })
        })
        .collect();
    let dropped: Vec<&str> = layout.dropped.iter().map(|r| r.text.as_str()).collect();

    json!({
        "width": layout.width,
        "height": layout.height,
        "items": items,
        "dropped": dropped,
    })
}

pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_prompt(msg: &str) -> io::Result<String> {
    print!("{} ", msg.bright_cyan().bold());
    io::stdout().flush()?;
    let mut response = String::new();
    io::stdin().read_line(&mut response)?;
    Ok(response.trim().to_string())
}

/// Read lines until an empty one.
fn read_block(msg: &str) -> io::Result<String> {
    println!("{}", msg.bright_cyan().bold());
    let mut block = String::new();
    for line in io::stdin().lines() {
        let line = line?;
        if line.trim().is_empty() {
            break;
        }
        block.push_str(&line);
        block.push('\n');
    }
    Ok(block)
}

fn spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner
}

fn print_quota(quota: &UsageQuota) {
    println!(
        "{} {} analyses left, resets {}",
        "ℹ".blue(),
        quota.remaining_requests.to_string().cyan(),
        quota.reset_time().bright_white()
    );
}

fn write_output(content: &str, output: Option<&PathBuf>) -> Result<()> {
    match output {
        Some(path) => {
            save_report(content, path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!(
                "{} Report saved: {}",
                "✓".green().bold(),
                path.display().to_string().bright_white()
            );
        }
        None => print!("{}", content),
    }
    Ok(())
}

fn report_format(args: &ArgMatches) -> ReportFormat {
    args.get_one::<String>("format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Text)
}

pub fn handle_init(args: &ArgMatches) -> Result<()> {
    print_divider();
    println!("{}", "  ANCHORSCOPE INITIALIZATION".bright_white().bold());
    print_divider();
    println!();

    let dir = args
        .get_one::<String>("PATH")
        .map(String::as_str)
        .unwrap_or(DEFAULT_CONFIG_DIR);
    let force = args.get_flag("force");
    let config_dir = resolve_config_dir(dir);
    let db_path = database_path(&config_dir);

    println!(
        "{} Target: {}",
        "→".blue(),
        config_dir.display().to_string().bright_white()
    );
    println!();

    if Database::exists(&db_path) {
        let overwrite = if force {
            true
        } else {
            println!("{}", "⚠ WARNING".yellow().bold());
            println!("Database already exists at:");
            println!(
                "  {} {}",
                "•".yellow(),
                db_path.display().to_string().bright_white()
            );
            println!("{}", "Overwriting deletes saved analyses and quota usage.".yellow());
            println!();
            let response = print_prompt("Would you like to overwrite it? [y/N]:")?.to_lowercase();
            println!();
            response == "y" || response == "yes"
        };

        if !overwrite {
            println!("{} Keeping existing database", "→".blue());
            return Ok(());
        }
        Database::drop(&db_path)
            .with_context(|| format!("Failed to delete {}", db_path.display()))?;
        println!("{} Existing database removed", "✓".green().bold());
    }

    fs::create_dir_all(&config_dir)
        .with_context(|| format!("Failed to create {}", config_dir.display()))?;
    Database::new(&db_path)
        .with_context(|| format!("Failed to create database {}", db_path.display()))?;

    println!();
    print_divider();
    println!("{}", "  INITIALIZATION COMPLETE".green().bold());
    print_divider();
    println!(
        "{} Database: {}",
        "✓".green().bold(),
        db_path.display().to_string().bright_white()
    );
    println!();
    Ok(())
}

/// Build the analyzer configuration from `analyze`/`request` flags.
pub fn analyzer_config(args: &ArgMatches) -> AnalyzerConfig {
    let mut config = AnalyzerConfig::default();
    if let Some(&workers) = args.try_get_one::<usize>("threads").ok().flatten() {
        config.workers = workers.max(1);
    }
    if let Some(&secs) = args.try_get_one::<u64>("timeout").ok().flatten() {
        config.page_timeout = Duration::from_secs(secs);
    }
    if args.try_get_one::<bool>("fold-case").ok().flatten() == Some(&true) {
        config.grouping = AnchorGrouping::CaseInsensitive;
    }
    if args.try_get_one::<bool>("keep-empty").ok().flatten() == Some(&true) {
        config.empty_anchor_policy = EmptyAnchorPolicy::UseHref;
    }
    config
}

fn caller(args: &ArgMatches) -> String {
    args.get_one::<String>("caller")
        .cloned()
        .unwrap_or_else(|| DEFAULT_CALLER.to_string())
}

pub async fn handle_analyze(args: &ArgMatches, config_dir: &Path) -> Result<()> {
    let url = args
        .get_one::<String>("url")
        .ok_or_else(|| anyhow!("--url is required"))?;
    let caller = caller(args);
    let config = analyzer_config(args);

    let request = if let Some(sitemap) = args.get_one::<String>("sitemap") {
        AnalysisRequest::manual_sitemap(url.as_str(), sitemap.as_str())
    } else if let Some(file) = args.get_one::<PathBuf>("urls-file") {
        let urls = load_urls_from_file(file).map_err(|e| anyhow!(e))?;
        AnalysisRequest::manual_urls(url.as_str(), urls)
    } else {
        AnalysisRequest::discover(url.as_str())
    };

    println!(
        "\n{} Analyzing {}",
        "→".blue().bold(),
        url.bright_white().bold()
    );
    println!("Workers: {}", config.workers);
    println!("Page limit: {}", config.max_urls);
    println!();

    let db = open_database(config_dir)?;
    let result = match db {
        Some(ref db) => negotiate_interactively(db, config, &caller, request, args).await?,
        None => {
            tracing::warn!("No database found; quota usage will not be remembered");
            negotiate_interactively(MemoryQuotaStore::new(), config, &caller, request, args)
                .await?
        }
    };

    let format = report_format(args);
    let report = generate_report(&result, format)?;
    write_output(&report, args.get_one::<PathBuf>("output"))?;

    if let Some(ref db) = db {
        if !args.get_flag("no-save") {
            let id = db.save_analysis(&result)?;
            println!(
                "\n{} Saved as {} (view with `anchorscope cloud {}`)",
                "✓".green().bold(),
                id.bright_white(),
                short_id(&id)
            );
        }
    }
    Ok(())
}

async fn negotiate_interactively<S: QuotaStore>(
    store: S,
    config: AnalyzerConfig,
    caller: &str,
    mut request: AnalysisRequest,
    args: &ArgMatches,
) -> Result<AnalysisResult> {
    let no_prompt = args.get_flag("no-prompt");
    let progress = spinner();
    let progress_clone = progress.clone();
    let analyzer = Analyzer::<HttpFetcher, S>::with_http(store, config)?.with_progress_callback(
        Arc::new(move |done: usize, url: String| {
            progress_clone.set_message(format!("[{}] {}", done, extract_url_path(&url)));
        }),
    );

    loop {
        progress.reset();
        progress.enable_steady_tick(Duration::from_millis(100));
        progress.set_message(match request.sitemap_url {
            Some(ref sitemap) => format!("Reading sitemap {}", sitemap),
            None if request.manual_urls.is_some() => "Crawling listed pages".to_string(),
            None => "Looking for a sitemap".to_string(),
        });

        let outcome = analyzer.resume(caller, &request).await;
        progress.finish_and_clear();

        match outcome? {
            Outcome::Completed { result, quota } => {
                println!(
                    "{} Crawled {} pages, {} unique anchors",
                    "✓".green().bold(),
                    result.total_pages(),
                    result.insights.total_unique_anchors
                );
                print_quota(&quota);
                println!();
                return Ok(*result);
            }
            Outcome::NeedsInput(prompt) => {
                if no_prompt {
                    bail!("{}", prompt.message);
                }
                request = ask_user(&request.url, &prompt)?;
            }
        }
    }
}

fn ask_user(site: &str, prompt: &UserInputRequest) -> Result<AnalysisRequest> {
    println!("{} {}", "⚠".yellow().bold(), prompt.message.yellow());
    for (i, option) in prompt.options.iter().enumerate() {
        println!("  {} {}", format!("[{}]", i + 1).cyan(), option.label);
    }

    loop {
        let reply = print_prompt("Choose an option (or q to quit):")?;
        if reply.eq_ignore_ascii_case("q") || reply.is_empty() {
            bail!("Analysis cancelled");
        }
        let Some(option) = parse_choice(&reply, &prompt.options) else {
            println!("{} Not an option: {}", "✗".red(), reply);
            continue;
        };

        let payload = if option.id == OPTION_MANUAL_URLS {
            read_block("Enter page URLs, one per line (blank line to finish):")?
        } else {
            print_prompt("Sitemap URL:")?
        };
        if let Some(request) = next_request(site, &option.id, &payload) {
            println!();
            return Ok(request);
        }
    }
}

/// One protocol round-trip; returns the process exit code.
pub async fn handle_request(args: &ArgMatches, config_dir: &Path) -> Result<i32> {
    let input = match args.get_one::<String>("FILE").map(String::as_str) {
        None | Some("-") => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?
        }
    };
    let caller = caller(args);
    let config = analyzer_config(args);

    let response = match serde_json::from_str::<AnalysisRequest>(&input) {
        Ok(request) => match open_database(config_dir)? {
            Some(db) => {
                let response = Analyzer::<HttpFetcher, _>::with_http(&db, config)?
                    .handle(&caller, &request)
                    .await;
                if let AnalysisResponse::Success(ref success) = response {
                    db.save_analysis(&success.data)?;
                }
                response
            }
            None => {
                Analyzer::<HttpFetcher, _>::with_http(MemoryQuotaStore::new(), config)?
                    .handle(&caller, &request)
                    .await
            }
        },
        Err(e) => AnalysisResponse::error(
            &anchorscope_core::AnalysisError::InvalidInput(format!("Malformed request: {}", e)),
            None,
        ),
    };

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(exit_code(response.status_code()))
}

pub fn handle_cloud(args: &ArgMatches, config_dir: &Path) -> Result<()> {
    let source = args
        .get_one::<String>("SOURCE")
        .ok_or_else(|| anyhow!("an analysis id or file is required"))?;
    let result = load_analysis(source, config_dir)?;
    let filter = AnchorFilter::new(
        args.get_one::<usize>("min-count").copied().unwrap_or(1),
        args.get_one::<String>("filter").cloned().unwrap_or_default(),
    );

    if args.get_flag("print") {
        let width = args.get_one::<f64>("width").copied().unwrap_or(800.0);
        let engine = WordCloudLayoutEngine::default();
        let layout = engine.layout(&result.anchors, &filter, width);
        println!("{}", serde_json::to_string_pretty(&layout_json(&layout))?);
        return Ok(());
    }

    anchorscope_tui::run(&result, filter)
}

pub fn handle_history(config_dir: &Path) -> Result<()> {
    let db = require_database(config_dir)?;
    let analyses = db.list_analyses()?;

    if analyses.is_empty() {
        println!("No saved analyses yet.");
        return Ok(());
    }

    println!(
        "{:<10} {:<20} {:>6} {:>8}  {}",
        "ID".bold(),
        "DATE".bold(),
        "PAGES".bold(),
        "ANCHORS".bold(),
        "SITE".bold()
    );
    for summary in analyses {
        println!(
            "{:<10} {:<20} {:>6} {:>8}  {}",
            short_id(&summary.id).cyan(),
            summary.created_at.format("%Y-%m-%d %H:%M"),
            summary.pages,
            summary.anchors,
            summary.base_url.bright_white()
        );
    }
    Ok(())
}

pub fn handle_show(args: &ArgMatches, config_dir: &Path) -> Result<()> {
    let id = args
        .get_one::<String>("ID")
        .ok_or_else(|| anyhow!("an analysis id is required"))?;
    let result = load_analysis(id, config_dir)?;
    let report = generate_report(&result, report_format(args))?;
    write_output(&report, args.get_one::<PathBuf>("output"))
}

pub fn handle_delete(args: &ArgMatches, config_dir: &Path) -> Result<()> {
    let prefix = args
        .get_one::<String>("ID")
        .ok_or_else(|| anyhow!("an analysis id is required"))?;
    let id = delete_saved_analysis(prefix, config_dir)?;
    println!("{} Deleted analysis {}", "✓".green().bold(), short_id(&id).cyan());
    Ok(())
}

pub fn handle_quota(args: &ArgMatches, config_dir: &Path) -> Result<()> {
    let caller = caller(args);
    let config = AnalyzerConfig::default();
    let quota = match open_database(config_dir)? {
        Some(db) => QuotaGate::new(&db, config.daily_quota, config.quota_window)
            .current(&caller, Utc::now())?,
        None => UsageQuota::fresh(config.daily_quota, Utc::now(), config.quota_window),
    };

    println!("Caller: {}", caller.bright_white());
    print_quota(&quota);
    Ok(())
}
