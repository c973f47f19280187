//! Line-based terminal host for the voice wizard and the member directory.
//!
//! Rendering goes to stdout; logs go to stderr so the two do not interleave
//! when stderr is redirected.

use anyhow::Result;
use profile_wizard_core::directory::{self, Member};
use profile_wizard_core::form::ProfileForm;
use profile_wizard_core::sequencer::{Phase, WizardSnapshot};
use profile_wizard_core::session::{UserAction, VoiceWizard, WizardOpen};
use profile_wizard_core::{Command, Notice};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

pub const HELP: &str = "Commands: [l]isten, [s]top, [k] skip, [r]epeat, [q]uit";
pub const TEXT_ONLY: &str = "Speech output is unavailable; questions are shown as text only.";

/// Maps a line typed by the user to a wizard action.
pub fn parse_action(line: &str) -> Option<UserAction> {
    match line.trim().to_ascii_lowercase().as_str() {
        "l" | "listen" | "" => Some(UserAction::StartListening),
        "s" | "stop" => Some(UserAction::StopListening),
        "k" | "skip" => Some(UserAction::Skip),
        "r" | "repeat" => Some(UserAction::Repeat),
        "q" | "quit" | "close" => Some(UserAction::Close),
        _ => None,
    }
}

fn status(snapshot: &WizardSnapshot) -> &'static str {
    match snapshot.phase {
        Phase::Processing => "Processing your response...",
        Phase::Completed => "Profile complete.",
        Phase::Closed => "Closed.",
        Phase::AwaitingInput if snapshot.is_listening => "Listening...",
        Phase::AwaitingInput if snapshot.is_speaking => "Speaking...",
        Phase::AwaitingInput => "Press enter to answer.",
    }
}

/// The parts of a snapshot worth redrawing for. Transcript changes while
/// listening are not.
fn render_key(snapshot: &WizardSnapshot) -> (Phase, usize, bool, bool) {
    (
        snapshot.phase,
        snapshot.current_index,
        snapshot.is_listening,
        snapshot.is_speaking,
    )
}

pub fn render_snapshot(snapshot: &WizardSnapshot) -> String {
    let mut out = format!(
        "{}\n{}\n{}",
        snapshot.progress, snapshot.step.question, status(snapshot)
    );
    if !snapshot.transcript.is_empty() {
        out.push_str(&format!("\nYou said: \"{}\"", snapshot.transcript));
    }
    if let Some(recorded) = &snapshot.recorded {
        out.push_str(&format!("\nRecorded: {}", recorded));
    }
    out
}

pub fn render_notice(notice: &Notice) -> String {
    format!("** {} **\n{}", notice.title, notice.description)
}

/// The values `members --industry` and `members --role` accept.
pub fn render_filters(members: &[Member]) -> String {
    let industries: Vec<String> = directory::unique_industries(members)
        .into_iter()
        .map(str::to_lowercase)
        .collect();
    format!(
        "Industries: {}\nRoles: {}",
        industries.join(", "),
        directory::unique_roles(members).join(", ")
    )
}

pub fn render_member(member: &Member) -> String {
    let mut out = format!(
        "[{}] {} - {} ({}, {})\n    {} | {} | {}",
        member.id,
        member.name,
        member.profession,
        member.industry,
        member.experience,
        member.location,
        directory::role_label(member.role),
        member.interests.join(", ")
    );
    if let Some(score) = member.match_score {
        out.push_str(&format!("\n    {}% AI match", score));
    }
    out
}

/// Runs one wizard session against stdin/stdout, applying accepted answers
/// to `form`.
pub async fn run_voice_wizard(wizard: &VoiceWizard, form: &mut ProfileForm) -> Result<()> {
    let (command_tx, mut command_rx) = mpsc::channel::<Command>(32);
    let handle = match wizard.open(command_tx) {
        WizardOpen::Ready(handle) => handle,
        WizardOpen::Unsupported(notice) => {
            println!("{}", render_notice(&notice));
            return Ok(());
        }
    };

    if !wizard.synthesis_supported() {
        println!("{}", TEXT_ONLY);
    }

    let mut snapshots = handle.subscribe();
    let mut last_key = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    println!("{}", HELP);

    loop {
        tokio::select! {
            command = command_rx.recv() => match command {
                Some(Command::Close) | None => break,
                Some(Command::Notify(notice)) => println!("{}", render_notice(&notice)),
                Some(command) => {
                    form.apply(&command);
                }
            },
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                let key = render_key(&snapshot);
                if last_key != Some(key) {
                    last_key = Some(key);
                    println!("\n{}", render_snapshot(&snapshot));
                }
            },
            line = lines.next_line(), if stdin_open => match line? {
                Some(line) => match parse_action(&line) {
                    Some(action) => {
                        if handle.send(action).await.is_err() {
                            break;
                        }
                    }
                    None => println!("{}", HELP),
                },
                None => {
                    stdin_open = false;
                    let _ = handle.send(UserAction::Close).await;
                }
            },
        }
    }

    // Updates sent just before the close are still queued.
    while let Ok(command) = command_rx.try_recv() {
        form.apply(&command);
    }
    let responses = handle.finished().await?;
    tracing::info!("Wizard session ended with {} answers.", responses.len());
    Ok(())
}
