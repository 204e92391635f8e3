//! Command-line front end: group and member administration, explicit
//! attendance actions, member cards and kiosk scanning over still-frame
//! tracks.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::{
    attendance::{commands, AttendanceToggle, Operator, ToggleOutcome},
    audio::CuePlayer,
    capture::StillFrameSource,
    cards::save_member_card,
    db::models::{ActivityRecord, MemberRole},
    scanner::{
        ChannelFeedback, ChimeFeedback, DetectorConfig, FanoutFeedback, LogFeedback, QrDecoder,
        ScanEvent, ScannerController,
    },
    settings::DetectionPolicy,
    AppState,
};

/// Rollcall - QR-code attendance for groups
#[derive(Parser, Debug)]
#[command(name = "rollcall")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Group to act on (defaults to the group selected with `group use`)
    #[arg(short, long, global = true)]
    pub group: Option<String>,

    /// Output in JSON format for scripting
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage groups
    Group {
        #[command(subcommand)]
        action: GroupAction,
    },
    /// Manage members of the current group
    Member {
        #[command(subcommand)]
        action: MemberAction,
    },
    /// Write a member's QR card as an image
    Card {
        member: String,
        /// Output image path (format follows the extension)
        output: PathBuf,
    },
    /// Clock a member in
    Start {
        member: String,
        #[command(flatten)]
        operator: OperatorArgs,
    },
    /// Clock a member out
    End {
        member: String,
        /// Note stored on the finished session
        #[arg(short, long)]
        memo: Option<String>,
        #[command(flatten)]
        operator: OperatorArgs,
    },
    /// Clock a member in or out, whichever applies
    Toggle {
        member: String,
        #[command(flatten)]
        operator: OperatorArgs,
    },
    /// Replace the memo of a session
    Memo { activity: String, text: String },
    /// Show a member's recent sessions
    History {
        member: String,
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
    /// List everyone currently clocked in
    Running,
    /// Scan member cards from image-directory tracks until Ctrl-C
    Scan {
        /// One directory of frames per track
        #[arg(required = true)]
        tracks: Vec<PathBuf>,
        /// Track to start on
        #[arg(short, long, default_value_t = 0)]
        track: usize,
        /// Frame rate reported for the tracks
        #[arg(long)]
        fps: Option<f64>,
        /// Halt after each detection until Enter is pressed
        #[arg(long)]
        hand_off: bool,
        /// Disable audio cues
        #[arg(long)]
        no_sound: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum GroupAction {
    /// Create a group
    Create {
        name: String,
        /// Make it the current group
        #[arg(long = "use")]
        select: bool,
    },
    /// List groups
    List,
    /// Select the current group
    Use { id: String },
}

#[derive(Subcommand, Debug)]
pub enum MemberAction {
    /// Add a member
    Add {
        name: String,
        /// Member id printed on the card (generated when omitted)
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        admin: bool,
    },
    /// List members
    List,
    /// Rename a member
    Rename { id: String, name: String },
    /// Remove a member and their sessions
    Remove { id: String },
}

#[derive(Parser, Debug, Clone, Default)]
pub struct OperatorArgs {
    /// Member id of the operator (defaults to the kiosk console)
    #[arg(long = "as", value_name = "MEMBER")]
    pub operator: Option<String>,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn format_time(value: &DateTime<Utc>) -> String {
    value.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

fn describe_activity(record: &ActivityRecord) -> String {
    let start = format_time(&record.content.start_time);
    let mut line = match record.content.end_time {
        Some(end) => {
            let minutes = (end - record.content.start_time).num_minutes();
            format!(
                "{start} -> {}  ({}h{:02}m)",
                format_time(&end),
                minutes / 60,
                minutes % 60
            )
        }
        None => format!("{start} -> (running)"),
    };
    if !record.content.memo.is_empty() {
        line.push_str(&format!("  {}", record.content.memo));
    }
    line
}

fn group_id(cli_group: &Option<String>, state: &AppState) -> Result<String> {
    cli_group
        .clone()
        .or_else(|| state.settings.scanner().group_id)
        .ok_or_else(|| anyhow!("no group selected; pass --group or run `rollcall group use <id>`"))
}

async fn resolve_operator(
    state: &AppState,
    group_id: &str,
    args: &OperatorArgs,
) -> Result<Operator> {
    match &args.operator {
        None => Ok(Operator::kiosk()),
        Some(id) => {
            let member = state
                .db
                .get_member(group_id, id)
                .await?
                .ok_or_else(|| anyhow!("operator {id} is not a member of this group"))?;
            Ok(Operator::from_member(&member))
        }
    }
}

pub async fn dispatch(cli: Cli, state: &AppState) -> Result<()> {
    let json = cli.json;
    match cli.command {
        Commands::Group { action } => group_command(action, state, json).await,
        Commands::Member { action } => {
            let group_id = group_id(&cli.group, state)?;
            member_command(action, state, &group_id, json).await
        }
        Commands::Card { member, output } => {
            let group_id = group_id(&cli.group, state)?;
            let identity = state
                .db
                .get_member(&group_id, &member)
                .await?
                .ok_or_else(|| anyhow!("member {member} not found"))?;
            save_member_card(&identity, &output)?;
            println!("Wrote card for {} to {}", identity.data.name, output.display());
            Ok(())
        }
        Commands::Start { member, operator } => {
            let group_id = group_id(&cli.group, state)?;
            let operator = resolve_operator(state, &group_id, &operator).await?;
            let record =
                commands::start_work(&state.toggle(), &operator, &group_id, &member).await?;
            report_outcome(&ToggleOutcome::Started(record), json)
        }
        Commands::End {
            member,
            memo,
            operator,
        } => {
            let group_id = group_id(&cli.group, state)?;
            let operator = resolve_operator(state, &group_id, &operator).await?;
            let record =
                commands::end_work(&state.toggle(), &operator, &group_id, &member, memo).await?;
            report_outcome(&ToggleOutcome::Finished(record), json)
        }
        Commands::Toggle { member, operator } => {
            let group_id = group_id(&cli.group, state)?;
            let operator = resolve_operator(state, &group_id, &operator).await?;
            let outcome =
                commands::toggle_work(&state.toggle(), &operator, &group_id, &member).await?;
            report_outcome(&outcome, json)
        }
        Commands::Memo { activity, text } => {
            let group_id = group_id(&cli.group, state)?;
            let record = state
                .db
                .update_activity_memo(&group_id, &activity, text)
                .await?;
            if json {
                print_json(&record)
            } else {
                println!("{}", describe_activity(&record));
                Ok(())
            }
        }
        Commands::History { member, limit } => {
            let group_id = group_id(&cli.group, state)?;
            let records = state
                .db
                .list_activities_for_member(&group_id, &member, limit)
                .await?;
            if json {
                return print_json(&records);
            }
            if records.is_empty() {
                println!("No sessions recorded for {member}");
            }
            for record in &records {
                println!("{}  {}", record.id, describe_activity(record));
            }
            Ok(())
        }
        Commands::Running => {
            let group_id = group_id(&cli.group, state)?;
            let records = state.db.list_running_activities(&group_id).await?;
            if json {
                return print_json(&records);
            }
            if records.is_empty() {
                println!("Nobody is clocked in");
            }
            for record in &records {
                println!(
                    "{}  since {}",
                    record.member_id,
                    format_time(&record.content.start_time)
                );
            }
            Ok(())
        }
        Commands::Scan {
            tracks,
            track,
            fps,
            hand_off,
            no_sound,
        } => {
            let group_id = group_id(&cli.group, state)?;
            scan(state, group_id, tracks, track, fps, hand_off, no_sound, json).await
        }
    }
}

fn report_outcome(outcome: &ToggleOutcome, json: bool) -> Result<()> {
    if json {
        return print_json(outcome);
    }
    let record = outcome.record();
    let verb = if outcome.is_started() {
        "clocked in"
    } else {
        "clocked out"
    };
    println!("{} {verb}: {}", record.member_id, describe_activity(record));
    Ok(())
}

async fn group_command(action: GroupAction, state: &AppState, json: bool) -> Result<()> {
    match action {
        GroupAction::Create { name, select } => {
            let group = state.db.create_group(name).await?;
            if select {
                let id = group.id.clone();
                state.settings.update(|s| s.group_id = Some(id))?;
            }
            if json {
                print_json(&group)
            } else {
                println!("Created group {} ({})", group.name, group.id);
                Ok(())
            }
        }
        GroupAction::List => {
            let groups = state.db.list_groups().await?;
            if json {
                return print_json(&groups);
            }
            let current = state.settings.scanner().group_id;
            for group in &groups {
                let marker = if current.as_deref() == Some(group.id.as_str()) {
                    "*"
                } else {
                    " "
                };
                println!("{marker} {}  {}", group.id, group.name);
            }
            Ok(())
        }
        GroupAction::Use { id } => {
            let group = state
                .db
                .get_group(&id)
                .await?
                .ok_or_else(|| anyhow!("group {id} not found"))?;
            state.settings.update(|s| s.group_id = Some(group.id.clone()))?;
            println!("Now using group {} ({})", group.name, group.id);
            Ok(())
        }
    }
}

async fn member_command(
    action: MemberAction,
    state: &AppState,
    group_id: &str,
    json: bool,
) -> Result<()> {
    match action {
        MemberAction::Add { name, id, admin } => {
            let role = if admin {
                MemberRole::Admin
            } else {
                MemberRole::Member
            };
            let member = state.db.add_member(group_id, id, name, role).await?;
            if json {
                print_json(&member)
            } else {
                println!("Added {} ({})", member.data.name, member.id);
                Ok(())
            }
        }
        MemberAction::List => {
            let members = state.db.list_members(group_id).await?;
            if json {
                return print_json(&members);
            }
            for member in &members {
                println!(
                    "{}  {}  [{}]",
                    member.id,
                    member.data.name,
                    member.data.role.as_str()
                );
            }
            Ok(())
        }
        MemberAction::Rename { id, name } => {
            let member = state.db.rename_member(group_id, &id, name).await?;
            println!("Renamed {} to {}", member.id, member.data.name);
            Ok(())
        }
        MemberAction::Remove { id } => {
            state.db.remove_member(group_id, &id).await?;
            println!("Removed {id}");
            Ok(())
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn scan(
    state: &AppState,
    group_id: String,
    track_dirs: Vec<PathBuf>,
    track: usize,
    fps: Option<f64>,
    hand_off: bool,
    no_sound: bool,
    json: bool,
) -> Result<()> {
    if state.db.get_group(&group_id).await?.is_none() {
        bail!("group {group_id} not found");
    }

    let settings = state.settings.scanner();
    let source = StillFrameSource::from_dirs(&track_dirs, fps)?;

    let (channel, mut events) = ChannelFeedback::new(32);
    let mut feedback = FanoutFeedback::new().with(LogFeedback).with(channel);
    if settings.feedback.sound_enabled && !no_sound {
        feedback = feedback.with(ChimeFeedback::new(CuePlayer::new(settings.feedback.volume)));
    }

    let policy = if hand_off {
        DetectionPolicy::HandOff
    } else {
        settings.detection_policy
    };
    let config = DetectorConfig {
        group_id,
        policy,
        known_bad: settings.known_bad_cadence,
        rearm_delay: settings.rearm_delay(),
    };

    let mut scanner = ScannerController::new(
        Arc::new(source),
        state.toggle(),
        Arc::new(QrDecoder),
        Arc::new(feedback),
        settings.track_defaults(),
        config,
    );
    scanner.start(track)?;

    for (index, settings) in scanner.tracks().iter().enumerate() {
        let marker = if index == track { "*" } else { " " };
        println!("{marker} track {index}: {}", settings.label);
    }
    println!("Scanning; type `track <n>` to switch, Enter to resume after a detection, Ctrl-C to stop");

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            Some(event) = events.recv() => print_event(&event, policy, json)?,
            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(line)) => handle_console_line(&mut scanner, line.trim()),
                Ok(None) | Err(_) => stdin_open = false,
            },
        }
    }

    let stats = scanner
        .stop()
        .await
        .context("scanner did not shut down cleanly")?
        .unwrap_or_default();
    if json {
        print_json(&stats)?;
    } else {
        println!(
            "Stopped after {} ticks: {} toggles, {} unknown codes, {} failures",
            stats.ticks,
            stats.toggles,
            stats.unknown,
            stats.lookup_failures + stats.toggle_failures
        );
    }
    Ok(())
}

fn handle_console_line<S>(scanner: &mut ScannerController<S>, line: &str)
where
    S: crate::storage::AttendanceStore + Clone,
{
    if let Some(index) = line.strip_prefix("track ") {
        match index.trim().parse::<usize>() {
            Ok(index) => {
                if let Err(err) = scanner.switch_track(index) {
                    eprintln!("{err}");
                }
            }
            Err(_) => eprintln!("usage: track <n>"),
        }
    } else if !scanner.resume() && !line.is_empty() {
        eprintln!("unknown command {line:?}");
    }
}

fn print_event(event: &ScanEvent, policy: DetectionPolicy, json: bool) -> Result<()> {
    if json {
        return print_json(event);
    }
    match event {
        ScanEvent::Detected { member, outcome } => {
            let verb = if outcome.is_started() {
                "clocked in"
            } else {
                "clocked out"
            };
            println!("{} {verb}", member.data.name);
            if policy == DetectionPolicy::HandOff {
                println!("Press Enter to scan the next card");
            }
        }
        ScanEvent::Failed { error } => println!("! {error}"),
    }
    Ok(())
}
