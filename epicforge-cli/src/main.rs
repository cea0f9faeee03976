//! epicforge-cli: terminal client for the Epicforge HTTP API
//!
//! # Subcommands
//! - `generate <description> [--json]`   turn a feature description into an epic
//! - `ideas [--focus <text>] [--json]`    suggest feature ideas
//! - `list [--json]`                      show stored feature requests, newest first
//! - `export <hash> [--output <file>]`    stored epic as Markdown
//! - `status`                             show server health

use clap::{Parser, Subcommand};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8000";

/// Generation waits on the model; the server's own upstream timeout is 120s.
const GENERATE_TIMEOUT_SECS: u64 = 180;
const QUICK_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "epicforge-cli",
    version,
    about = "Epicforge: generate agile epics from feature descriptions"
)]
struct Cli {
    /// Epicforge HTTP server URL (overrides EPICFORGE_HTTP_URL env var)
    #[arg(long, env = "EPICFORGE_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Generate and store an epic for a feature description
    Generate {
        /// Free-text feature description
        description: String,

        /// Print the model output as-is instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Ask for new feature ideas
    Ideas {
        /// Area to focus the ideas on
        #[arg(long)]
        focus: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// List stored feature requests
    List {
        #[arg(long)]
        json: bool,
    },

    /// Export a stored epic as Markdown
    Export {
        /// Content hash shown by `list`
        hash: String,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Show Epicforge server status
    Status,
}

// ============================================================================
// API Response Types
// ============================================================================

/// Body of `/api/generate` and `/api/generate-ideas`.
#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    pub result: String,
}

#[derive(Debug, Deserialize)]
pub struct FeatureRequestRow {
    pub submission_time: String,
    pub epic_title: String,
    pub response_md5: String,
}

#[derive(Debug, Deserialize)]
pub struct Idea {
    #[serde(default)]
    pub short_title: String,
    #[serde(default)]
    pub long_description: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EpicSummary {
    pub epic_title: String,
    pub description: String,
    pub stories: Vec<StorySummary>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StorySummary {
    pub story_title: String,
    pub agile_story: String,
}

// ============================================================================
// Formatting
// ============================================================================

/// Human-readable summary of generated text; falls back to the raw text when
/// it is not an epic-shaped object.
pub fn format_epic(raw: &str) -> String {
    let epic: EpicSummary = match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(v) if v.is_object() => serde_json::from_value(v).unwrap_or_default(),
        _ => return raw.to_string(),
    };

    let mut out = String::new();
    out.push_str(&format!("Epic:  {}\n", epic.epic_title));
    if !epic.description.is_empty() {
        out.push_str(&format!("\n{}\n", epic.description));
    }
    if !epic.stories.is_empty() {
        out.push_str(&format!("\nStories ({}):\n", epic.stories.len()));
        for (i, story) in epic.stories.iter().enumerate() {
            out.push_str(&format!("  {}. {}\n", i + 1, story.story_title));
            if !story.agile_story.is_empty() {
                out.push_str(&format!("     {}\n", story.agile_story));
            }
        }
    }
    out
}

/// Decode the ideas array the model returns. Non-array output yields nothing.
pub fn parse_ideas(raw: &str) -> Vec<Idea> {
    serde_json::from_str(raw).unwrap_or_default()
}

pub fn format_row(row: &FeatureRequestRow) -> String {
    let when: String = row.submission_time.replace('T', " ").chars().take(19).collect();
    let title = if row.epic_title.is_empty() {
        "(untitled)"
    } else {
        row.epic_title.as_str()
    };
    format!("{}  {}  {}", when, row.response_md5, title)
}

/// Re-indent JSON text when it parses; otherwise return it unchanged.
pub fn pretty_or_raw(raw: &str) -> String {
    serde_json::from_str::<serde_json::Value>(raw)
        .ok()
        .and_then(|v| serde_json::to_string_pretty(&v).ok())
        .unwrap_or_else(|| raw.to_string())
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn client(timeout_secs: u64) -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()?)
}

/// Send a request and exit with the server's message on failure.
fn send(url: &str, req: reqwest::blocking::RequestBuilder) -> reqwest::blocking::Response {
    let resp = match req.send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("epicforge-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v["error"].as_str().map(str::to_string))
            .unwrap_or(body);
        eprintln!("epicforge-cli: server returned {}: {}", status, message);
        std::process::exit(1);
    }

    resp
}

fn do_generate(server: &str, description: &str, json_output: bool) -> anyhow::Result<()> {
    let client = client(GENERATE_TIMEOUT_SECS)?;
    let url = format!("{}/api/generate", server);
    let body = serde_json::json!({ "description": description });

    let resp: GenerateResponse = send(&url, client.post(&url).json(&body)).json()?;

    if json_output {
        println!("{}", pretty_or_raw(&resp.result));
    } else {
        print!("{}", format_epic(&resp.result));
    }
    Ok(())
}

fn do_ideas(server: &str, focus: Option<&str>, json_output: bool) -> anyhow::Result<()> {
    let client = client(GENERATE_TIMEOUT_SECS)?;
    let url = format!("{}/api/generate-ideas", server);
    let mut req = client.get(&url);
    if let Some(focus) = focus {
        req = req.query(&[("focus", focus)]);
    }

    let resp: GenerateResponse = send(&url, req).json()?;

    if json_output {
        println!("{}", pretty_or_raw(&resp.result));
        return Ok(());
    }

    let ideas = parse_ideas(&resp.result);
    if ideas.is_empty() {
        eprintln!("No ideas returned");
        return Ok(());
    }
    for idea in &ideas {
        println!("* {}", idea.short_title);
        println!("  {}\n", idea.long_description);
    }
    Ok(())
}

fn do_list(server: &str, json_output: bool) -> anyhow::Result<()> {
    let client = client(QUICK_TIMEOUT_SECS)?;
    let url = format!("{}/api/feature-requests", server);

    let rows: Vec<FeatureRequestRow> = send(&url, client.get(&url)).json()?;

    if json_output {
        let values: Vec<serde_json::Value> = rows
            .iter()
            .map(|r| {
                serde_json::json!({
                    "submission_time": r.submission_time,
                    "epic_title": r.epic_title,
                    "response_md5": r.response_md5,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&values)?);
        return Ok(());
    }

    if rows.is_empty() {
        eprintln!("No feature requests stored yet");
        return Ok(());
    }
    for row in &rows {
        println!("{}", format_row(row));
    }
    Ok(())
}

/// `/api/feature-requests/{hash}/markdown` under `server`, with `hash`
/// encoded as a single path segment.
pub fn markdown_url(server: &str, hash: &str) -> anyhow::Result<reqwest::Url> {
    let mut url = reqwest::Url::parse(server)?;
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("server URL cannot be a base: {}", server))?
        .pop_if_empty()
        .extend(["api", "feature-requests", hash, "markdown"]);
    Ok(url)
}

fn do_export(server: &str, hash: &str, output: Option<&str>) -> anyhow::Result<()> {
    let client = client(QUICK_TIMEOUT_SECS)?;
    let url = markdown_url(server, hash)?;

    let markdown = send(url.as_str(), client.get(url.clone())).text()?;

    match output {
        Some(path) => {
            std::fs::write(path, &markdown)?;
            eprintln!("Wrote {}", path);
        }
        None => print!("{}", markdown),
    }
    Ok(())
}

/// Show the server status by calling GET /api/health.
fn do_status(server: &str) -> anyhow::Result<()> {
    let client = client(QUICK_TIMEOUT_SECS)?;
    let url = format!("{}/api/health", server);

    match client.get(&url).send() {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("Epicforge server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("URL:              {}", server);
        }
        Ok(r) => {
            eprintln!("epicforge-cli: server unhealthy (HTTP {})", r.status());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("epicforge-cli: cannot reach {}: {}", url, e);
            std::process::exit(1);
        }
    }

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Generate { description, json } => do_generate(&server, &description, json),
        Commands::Ideas { focus, json } => do_ideas(&server, focus.as_deref(), json),
        Commands::List { json } => do_list(&server, json),
        Commands::Export { hash, output } => do_export(&server, &hash, output.as_deref()),
        Commands::Status => do_status(&server),
    };

    if let Err(e) = result {
        eprintln!("epicforge-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
