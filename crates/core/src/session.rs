use crate::error::WizardError;
use crate::sequencer::{PacedAction, ResponseMap, StepSequencer, WizardSnapshot};
use crate::speech::{RecognitionEvent, SpeechRecognizer, SpeechSynthesizer};
use crate::steps::StepList;
use crate::{Command, Notice};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

/// How often adapter flags are re-read for the snapshot while idle.
const SNAPSHOT_REFRESH: Duration = Duration::from_millis(250);

/// Things the user can do while the wizard is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    StartListening,
    StopListening,
    Skip,
    Repeat,
    Close,
}

/// The result of opening the wizard.
pub enum WizardOpen {
    Ready(WizardHandle),
    /// Speech input is not available. The host should explain that the form
    /// must be filled in manually and offer only a close action.
    Unsupported(Notice),
}

/// Owns the speech adapters and opens wizard sessions.
///
/// Both adapters are probed once, here. Every `open` starts a fresh session
/// at the first step with no answers.
pub struct VoiceWizard {
    recognizer: Arc<dyn SpeechRecognizer>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    steps: StepList,
    recognition_supported: bool,
    synthesis_supported: bool,
}

impl VoiceWizard {
    pub fn new(
        recognizer: Arc<dyn SpeechRecognizer>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
    ) -> Self {
        let recognition_supported = recognizer.is_supported();
        let synthesis_supported = synthesizer.is_supported();
        tracing::info!(
            "Speech input supported: {}, speech output supported: {}",
            recognition_supported,
            synthesis_supported
        );
        Self {
            recognizer,
            synthesizer,
            steps: StepList::default(),
            recognition_supported,
            synthesis_supported,
        }
    }

    pub fn with_steps(mut self, steps: StepList) -> Self {
        self.steps = steps;
        self
    }

    pub fn recognition_supported(&self) -> bool {
        self.recognition_supported
    }

    pub fn synthesis_supported(&self) -> bool {
        self.synthesis_supported
    }

    /// Opens a new session. Field updates, notices and the final close are
    /// delivered on `command_tx`.
    pub fn open(&self, command_tx: mpsc::Sender<Command>) -> WizardOpen {
        if !self.recognition_supported {
            return WizardOpen::Unsupported(Notice::new(
                "Speech Recognition Not Supported",
                "Speech input is not available on this device. Please fill out the form manually.",
            ));
        }

        // Words held from an earlier session must not show on the first step.
        self.recognizer.reset_transcript();

        let (action_tx, action_rx) = mpsc::channel(32);
        let (paced_tx, paced_rx) = mpsc::channel(16);
        let recognition_rx = self.recognizer.subscribe();

        let sequencer = StepSequencer::new(
            self.steps.clone(),
            self.recognizer.clone(),
            self.synthesizer.clone(),
            paced_tx,
            command_tx,
        );
        let (snapshot_tx, snapshot_rx) = watch::channel(sequencer.snapshot());
        let task = tokio::spawn(run_session(
            sequencer,
            action_rx,
            paced_rx,
            recognition_rx,
            snapshot_tx,
        ));

        WizardOpen::Ready(WizardHandle {
            actions: action_tx,
            snapshot: snapshot_rx,
            task,
        })
    }
}

/// The host's side of an open session.
pub struct WizardHandle {
    actions: mpsc::Sender<UserAction>,
    snapshot: watch::Receiver<WizardSnapshot>,
    task: JoinHandle<ResponseMap>,
}

impl WizardHandle {
    pub async fn start_listening(&self) -> Result<(), WizardError> {
        self.send(UserAction::StartListening).await
    }

    pub async fn stop_listening(&self) -> Result<(), WizardError> {
        self.send(UserAction::StopListening).await
    }

    pub async fn skip(&self) -> Result<(), WizardError> {
        self.send(UserAction::Skip).await
    }

    pub async fn repeat(&self) -> Result<(), WizardError> {
        self.send(UserAction::Repeat).await
    }

    pub async fn send(&self, action: UserAction) -> Result<(), WizardError> {
        self.actions
            .send(action)
            .await
            .map_err(|_| WizardError::SessionEnded)
    }

    /// The latest published state.
    pub fn snapshot(&self) -> WizardSnapshot {
        self.snapshot.borrow().clone()
    }

    /// A receiver that is notified whenever the state changes.
    pub fn subscribe(&self) -> watch::Receiver<WizardSnapshot> {
        self.snapshot.clone()
    }

    /// Closes the session and returns the answers it collected.
    pub async fn close(self) -> Result<ResponseMap, WizardError> {
        // A send error means the session already ended on its own.
        let _ = self.actions.send(UserAction::Close).await;
        self.finished().await
    }

    /// Waits for the session to end (completion or close) and returns the
    /// answers it collected.
    pub async fn finished(self) -> Result<ResponseMap, WizardError> {
        let WizardHandle { actions, task, .. } = self;
        let responses = task.await?;
        drop(actions);
        Ok(responses)
    }
}

async fn run_session(
    mut sequencer: StepSequencer,
    mut actions: mpsc::Receiver<UserAction>,
    mut paced: mpsc::Receiver<PacedAction>,
    mut recognition: broadcast::Receiver<RecognitionEvent>,
    snapshot_tx: watch::Sender<WizardSnapshot>,
) -> ResponseMap {
    sequencer.open();
    let mut recognition_open = true;
    let mut refresh = tokio::time::interval(SNAPSHOT_REFRESH);

    loop {
        tokio::select! {
            biased;

            action = actions.recv() => match action {
                Some(action) => on_action(&mut sequencer, action).await,
                None => {
                    tracing::debug!("All wizard handles dropped, closing session.");
                    sequencer.close().await;
                }
            },
            event = recognition.recv(), if recognition_open => match event {
                Ok(event) => sequencer.on_recognition(event).await,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Missed {} recognition event(s).", skipped);
                }
                Err(RecvError::Closed) => {
                    tracing::warn!("Recognizer event channel closed.");
                    recognition_open = false;
                }
            },
            Some(action) = paced.recv() => sequencer.on_paced(action).await,
            _ = refresh.tick() => {}
        }

        let snapshot = sequencer.snapshot();
        snapshot_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });

        if sequencer.is_closed() {
            break;
        }
    }

    sequencer.into_responses()
}

async fn on_action(sequencer: &mut StepSequencer, action: UserAction) {
    tracing::debug!("User action: {:?}", action);
    match action {
        UserAction::StartListening => sequencer.start_listening().await,
        UserAction::StopListening => sequencer.stop_listening().await,
        UserAction::Skip => sequencer.skip().await,
        UserAction::Repeat => sequencer.repeat().await,
        UserAction::Close => sequencer.close().await,
    }
}
