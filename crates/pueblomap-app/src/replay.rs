//! Drives a [`MapEditor`] through a recorded session.

use pueblomap_core::{
    CommitOutcome, EditorEvent, ElementSource, ElementUpdate, Frame, InputEvent, MapEditor,
    PersistenceGateway, build_frame,
};
use serde::Serialize;
use std::sync::Arc;

use crate::AppError;
use crate::session::{Command, Session, Step};

/// What happened during a replay.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    pub steps: usize,
    pub events: Vec<EditorEvent>,
    pub commits: Vec<CommitOutcome>,
    /// Updates refused before reaching the gateway.
    pub rejected: Vec<String>,
    pub frame: Frame,
}

/// Replay `session` on `editor`. Finished drags are persisted as soon as
/// the pointer is released; anything left over is flushed at the end.
pub async fn run_session<G>(
    editor: &mut MapEditor<G>,
    session: &Session,
) -> Result<ReplayReport, AppError>
where
    G: PersistenceGateway + ElementSource,
{
    let mut events = Vec::new();
    let mut commits = Vec::new();
    let mut rejected = Vec::new();

    events.extend(editor.handle_event(session.surface.resize_event()));
    for (index, step) in session.steps.iter().enumerate() {
        log::debug!("Step {}: {:?}", index, step);
        match step {
            Step::Input(event) => {
                let released = matches!(event, InputEvent::PointerUp { .. });
                events.extend(editor.handle_event(event.clone()));
                if released && editor.has_pending_commits() {
                    commits.extend(flush(editor).await);
                }
            }
            Step::Command(command) => {
                run_command(editor, command, &mut events, &mut commits, &mut rejected).await?
            }
        }
    }

    if editor.has_pending_commits() {
        commits.extend(flush(editor).await);
    }

    Ok(ReplayReport {
        steps: session.steps.len(),
        events,
        commits,
        rejected,
        frame: build_frame(editor),
    })
}

async fn flush<G: PersistenceGateway>(editor: &mut MapEditor<G>) -> Vec<CommitOutcome> {
    let outcomes = editor.flush_commits().await;
    for outcome in &outcomes {
        if outcome.saved {
            log::info!("Saved position of {}", outcome.id);
        } else {
            log::warn!(
                "Could not save {}: {}",
                outcome.id,
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
    outcomes
}

async fn run_command<G>(
    editor: &mut MapEditor<G>,
    command: &Command,
    events: &mut Vec<EditorEvent>,
    commits: &mut Vec<CommitOutcome>,
    rejected: &mut Vec<String>,
) -> Result<(), AppError>
where
    G: PersistenceGateway + ElementSource,
{
    match command {
        Command::ToggleLayer { layer } => events.extend(editor.toggle_layer(*layer)),
        Command::ToggleLock { layer } => events.extend(editor.toggle_lock(*layer)),
        Command::ChangeOpacity { layer, opacity } => {
            events.extend(editor.change_opacity(*layer, *opacity))
        }
        Command::ActivatePreset { preset } => events.extend(editor.activate_preset(preset)?),
        Command::StartEditing { kind, id } => events.extend(editor.start_editing(*kind, id)),
        Command::Rename { kind, id, name } => {
            editor.save_element_name(*kind, id, name).await;
        }
        Command::Update { kind, id, fields } => {
            match ElementUpdate::from_json(*kind, fields.clone()) {
                Ok(update) => {
                    editor.save(id, update).await;
                }
                Err(e) => {
                    log::warn!("Rejected update for {} {}: {}", kind, id, e);
                    rejected.push(e.to_string());
                }
            }
        }
        Command::Flush => commits.extend(flush(editor).await),
        Command::Refresh => {
            let source = Arc::clone(editor.orchestrator().gateway());
            events.extend(editor.refresh(source.as_ref()).await?);
        }
        Command::FitToContent => events.extend(editor.fit_to_content()),
    }
    Ok(())
}
