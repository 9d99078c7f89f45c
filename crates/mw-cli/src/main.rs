//! Mod Warden CLI
//!
//! Offline tooling for moderation rule files: validation, pattern testing,
//! dry runs, full pipeline simulation, database import and decay sweeps.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use mw_actions::{AutomodReport, StepOutcome};
use mw_core::{InboundEvent, MatchMode, Member, PatternDef, ReactionEmoji};
use mw_observability::{init_logging_with_config, LoggingConfig};
use mw_policy::{test_pattern_defs, validate_pattern, RuleEngine};
use std::path::{Path, PathBuf};

mod commands;
mod validator;

use commands::{
    import_rule_file, load_events, run_simulation, sweep_community, SimulationOutcome,
};
use validator::RuleFileValidator;

#[derive(Parser)]
#[command(name = "mod-warden")]
#[command(author = "Mod Warden Team")]
#[command(version)]
#[command(about = "Automated moderation for chat communities", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid output format: {}", s)),
        }
    }
}

/// Which part of an event the dry-run text stands in for.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum SampleKind {
    Message,
    Username,
    Nickname,
    Reaction,
}

impl std::str::FromStr for SampleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "message" => Ok(SampleKind::Message),
            "username" => Ok(SampleKind::Username),
            "nickname" => Ok(SampleKind::Nickname),
            "reaction" => Ok(SampleKind::Reaction),
            _ => Err(format!("Invalid sample kind: {}", s)),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a rule file
    Validate {
        /// Rule file to validate
        rules: PathBuf,
    },

    /// Test patterns against a piece of text
    TestPattern {
        /// Text to test
        text: String,

        /// Pattern to test (repeatable)
        #[arg(short, long = "pattern", required = true)]
        patterns: Vec<String>,

        /// Flags applied to every pattern (e.g. "i")
        #[arg(long)]
        flags: Option<String>,

        /// How patterns combine (any, all)
        #[arg(long, default_value = "any")]
        mode: String,
    },

    /// Show which rule of a file would match a piece of content
    DryRun {
        /// Rule file
        rules: PathBuf,

        /// Content to evaluate
        #[arg(short, long)]
        text: String,

        /// What the text represents (message, username, nickname, reaction)
        #[arg(long, default_value = "message")]
        kind: SampleKind,
    },

    /// Run events through the full automod pipeline with in-memory connectors
    Simulate {
        /// Rule file
        rules: PathBuf,

        /// JSON file with one event or an array of events
        events: PathBuf,

        /// Role position of the simulated bot
        #[arg(long, default_value = "1000")]
        bot_position: i32,

        /// Points each actor already holds before the first event
        #[arg(long, default_value = "0")]
        prior_points: i64,
    },

    /// Store a rule file's settings and rules in the database
    Import {
        /// Rule file
        rules: PathBuf,

        /// Database URL
        #[arg(short, long, default_value = "sqlite://mod-warden.db?mode=rwc")]
        database: String,

        /// Delete stored rules the file does not mention
        #[arg(long)]
        prune: bool,
    },

    /// Deactivate infractions that fell out of a community's decay window
    Sweep {
        /// Community to sweep
        #[arg(short, long)]
        community: u64,

        /// Database URL
        #[arg(short, long, default_value = "sqlite://mod-warden.db?mode=rwc")]
        database: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };

    init_logging_with_config(
        LoggingConfig {
            level: log_level,
            json_format: cli.format == OutputFormat::Json,
            ..Default::default()
        }
        .with_stderr(),
    );

    match cli.command {
        Commands::Validate { rules } => cmd_validate(&rules, cli.format),
        Commands::TestPattern {
            text,
            patterns,
            flags,
            mode,
        } => cmd_test_pattern(&text, &patterns, flags.as_deref(), &mode, cli.format),
        Commands::DryRun { rules, text, kind } => cmd_dry_run(&rules, &text, kind, cli.format),
        Commands::Simulate {
            rules,
            events,
            bot_position,
            prior_points,
        } => cmd_simulate(&rules, &events, bot_position, prior_points, cli.format).await,
        Commands::Import {
            rules,
            database,
            prune,
        } => cmd_import(&rules, &database, prune, cli.format).await,
        Commands::Sweep {
            community,
            database,
        } => cmd_sweep(community, &database, cli.format).await,
    }
}

fn cmd_validate(path: &Path, format: OutputFormat) -> Result<()> {
    let (file, result) = RuleFileValidator::validate_path(path);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result.to_json())?),
        OutputFormat::Text => {
            println!("{} {}", "Validating".cyan(), path.display());
            if let Some(file) = &file {
                println!(
                    "  Community {}: {} rules, {} tiers",
                    file.community_id,
                    file.rules.len(),
                    file.tiers.len()
                );
            }
            result.print();
        }
    }

    if result.has_errors() {
        std::process::exit(1);
    }
    Ok(())
}

fn parse_mode(mode: &str) -> Result<MatchMode> {
    match mode.to_lowercase().as_str() {
        "any" => Ok(MatchMode::Any),
        "all" => Ok(MatchMode::All),
        other => bail!("Invalid match mode: {} (expected any or all)", other),
    }
}

fn cmd_test_pattern(
    text: &str,
    patterns: &[String],
    flags: Option<&str>,
    mode: &str,
    format: OutputFormat,
) -> Result<()> {
    let mode = parse_mode(mode)?;
    let defs: Vec<PatternDef> = patterns
        .iter()
        .map(|p| match flags {
            Some(f) => PatternDef::new(p).with_flags(f),
            None => PatternDef::new(p),
        })
        .collect();

    let mut invalid = Vec::new();
    for def in &defs {
        if let Err(e) = validate_pattern(def) {
            invalid.push(e.to_string());
        }
    }
    if !invalid.is_empty() {
        for e in &invalid {
            eprintln!("{} {}", "✗".red(), e);
        }
        std::process::exit(1);
    }

    let matched = test_pattern_defs(&defs, text, mode);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&matched)?),
        OutputFormat::Text => match matched {
            Some(m) => println!(
                "{} pattern #{} ({}) matched \"{}\"",
                "MATCH".green().bold(),
                m.index + 1,
                m.pattern.display(),
                m.matched_text
            ),
            None => println!("{}", "NO MATCH".yellow().bold()),
        },
    }
    Ok(())
}

/// Builds an event carrying `text` in the place `kind` names.
fn sample_event(community_id: u64, text: &str, kind: SampleKind) -> InboundEvent {
    let member = Member::new(0, "dry-run");
    match kind {
        SampleKind::Message => InboundEvent::message(community_id, 0, 0, member, text),
        SampleKind::Username => InboundEvent::MemberUpdated {
            community_id,
            member: Member::new(0, text),
            old_username: None,
            old_nickname: None,
        },
        SampleKind::Nickname => InboundEvent::MemberUpdated {
            community_id,
            member: member.with_nickname(text),
            old_username: None,
            old_nickname: None,
        },
        SampleKind::Reaction => InboundEvent::ReactionAdded {
            community_id,
            channel_id: 0,
            message_id: 0,
            member,
            emoji: ReactionEmoji::Unicode {
                name: text.to_string(),
            },
        },
    }
}

fn cmd_dry_run(path: &Path, text: &str, kind: SampleKind, format: OutputFormat) -> Result<()> {
    let file = mw_policy::load_rule_file(path)?;
    let event = sample_event(file.community_id, text, kind);
    let engine = RuleEngine::new(file.to_rules());
    let matched = engine.evaluate(&event);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&matched)?),
        OutputFormat::Text => {
            println!(
                "{} {} enabled rules against {:?} content",
                "Evaluating".cyan(),
                engine.rules().filter(|r| r.enabled).count(),
                kind
            );
            match matched {
                Some(m) => {
                    println!("{} rule '{}'", "MATCH".green().bold(), m.rule.name);
                    println!("  Target:  {}", m.target);
                    println!("  Pattern: {}", m.pattern.display());
                    println!("  Matched: {}", m.matched_text);
                    println!("  Points:  {}", m.rule.points);
                }
                None => println!("{}", "NO MATCH".yellow().bold()),
            }
        }
    }
    Ok(())
}

async fn cmd_simulate(
    rules: &Path,
    events: &Path,
    bot_position: i32,
    prior_points: i64,
    format: OutputFormat,
) -> Result<()> {
    let file = mw_policy::load_rule_file(rules)?;
    let events = load_events(events)?;
    let outcome = run_simulation(&file, &events, bot_position, prior_points).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome.to_json())?),
        OutputFormat::Text => print_simulation(&outcome),
    }
    Ok(())
}

fn print_simulation(outcome: &SimulationOutcome) {
    println!("{}", "Events:".bold());
    for (i, report) in outcome.reports.iter().enumerate() {
        print_report(i + 1, report);
    }

    println!();
    println!("{}", "Platform calls:".bold());
    if outcome.calls.is_empty() {
        println!("  (none)");
    }
    for call in &outcome.calls {
        let status = if call.success {
            "ok".green()
        } else {
            "failed".red()
        };
        println!(
            "  {:?} -> {} [{}] {}",
            call.operation, call.target, status, call.detail
        );
    }

    let m = &outcome.metrics;
    println!();
    println!(
        "{} {} evaluated, {} matched, {} infractions, {} escalations",
        "Totals:".bold(),
        m.events_evaluated,
        m.rule_matches,
        m.infractions_recorded,
        m.escalations_triggered
    );
}

fn print_report(n: usize, report: &AutomodReport) {
    let head = format!("  #{} member {}:", n, report.member_id);
    if let Some(reason) = report.skipped {
        println!("{} {} ({:?})", head, "skipped".dimmed(), reason);
        return;
    }

    let rule = report.rule.as_deref().unwrap_or_default();
    println!("{} {} '{}'", head, "matched".red().bold(), rule);
    if let Some(text) = &report.matched_text {
        println!("      matched text:  {}", text);
    }
    println!("      removal:       {}", step(&report.removal));
    println!("      infraction:    {}", step(&report.infraction));
    if let Some(points) = report.active_points {
        println!("      active points: {}", points);
    }
    if let Some(esc) = report.escalation.as_ref().filter(|e| e.triggered) {
        println!(
            "      escalation:    {} ({})",
            esc.tier_name.as_deref().unwrap_or_default(),
            esc.action.map(|a| a.to_string()).unwrap_or_default()
        );
    }
    println!("      notified:      {}", report.notified);
    println!("      logged:        {}", report.logged);
}

fn step(outcome: &StepOutcome) -> String {
    match outcome {
        StepOutcome::NotRequested => "-".to_string(),
        StepOutcome::Done => "done".green().to_string(),
        StepOutcome::Failed(e) => format!("{} ({})", "failed".red(), e),
    }
}

async fn cmd_import(path: &Path, database: &str, prune: bool, format: OutputFormat) -> Result<()> {
    let file = mw_policy::load_rule_file(path)?;
    let summary = import_rule_file(&file, database, prune).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary.to_json())?),
        OutputFormat::Text => println!(
            "{} community {}: {} created, {} replaced, {} removed",
            "Imported".green().bold(),
            file.community_id,
            summary.created,
            summary.replaced,
            summary.removed
        ),
    }
    Ok(())
}

async fn cmd_sweep(community_id: u64, database: &str, format: OutputFormat) -> Result<()> {
    let summary = sweep_community(database, community_id).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary.to_json())?),
        OutputFormat::Text if !summary.decay_enabled => println!(
            "{} community {} has decay disabled; nothing to sweep",
            "Skipped".yellow().bold(),
            community_id
        ),
        OutputFormat::Text => println!(
            "{} community {}: {} infractions deactivated",
            "Swept".green().bold(),
            community_id,
            summary.swept
        ),
    }
    Ok(())
}
