use crate::speech::{CaptureId, RecognitionEvent, SpeechRecognizer, SpeechSynthesizer};
use crate::steps::{FormField, Progress, QuestionStep, StepList};
use crate::timers::PacingTimers;
use crate::{Command, Notice};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub const WELCOME_MESSAGE: &str = "Welcome to the AI Community profile wizard. I'll help you create your profile by asking a few questions. Let's get started!";
pub const ACKNOWLEDGEMENT: &str = "Got it, thank you!";
pub const COMPLETION_MESSAGE: &str =
    "Perfect! Your profile has been completed. You can review and submit it now.";

pub const WELCOME_DELAY: Duration = Duration::from_millis(500);
pub const ADVANCE_DELAY: Duration = Duration::from_millis(1500);
pub const NEXT_PROMPT_DELAY: Duration = Duration::from_millis(1000);
pub const SKIP_PROMPT_DELAY: Duration = Duration::from_millis(500);
pub const AUTO_CLOSE_DELAY: Duration = Duration::from_millis(2000);

/// Answers recorded so far, keyed by the field they populate.
pub type ResponseMap = BTreeMap<FormField, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingInput,
    Processing,
    /// The last answer was accepted; the session closes itself shortly.
    Completed,
    Closed,
}

/// Delayed work the sequencer schedules for itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacedAction {
    Welcome,
    Advance,
    /// Speak the prompt of the step at this index, if it is still current.
    SpeakPrompt(usize),
    AutoClose,
}

/// Everything a host needs to draw the wizard.
#[derive(Debug, Clone, PartialEq)]
pub struct WizardSnapshot {
    pub phase: Phase,
    pub current_index: usize,
    pub step: QuestionStep,
    pub progress: Progress,
    pub transcript: String,
    /// The answer already recorded for the current step, if any.
    pub recorded: Option<String>,
    pub is_listening: bool,
    pub is_speaking: bool,
}

impl WizardSnapshot {
    pub fn is_processing(&self) -> bool {
        self.phase == Phase::Processing
    }
}

/// Drives the fixed list of questions.
///
/// The sequencer is owned by exactly one session task, which feeds it user
/// actions, recognition events and its own paced actions one at a time.
pub struct StepSequencer {
    steps: StepList,
    current_index: usize,
    responses: ResponseMap,
    phase: Phase,
    /// The capture whose result would answer the current step.
    pending_capture: Option<CaptureId>,
    speech_output: bool,
    recognizer: Arc<dyn SpeechRecognizer>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    timers: PacingTimers<PacedAction>,
    command_tx: mpsc::Sender<Command>,
}

impl StepSequencer {
    pub fn new(
        steps: StepList,
        recognizer: Arc<dyn SpeechRecognizer>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        paced_tx: mpsc::Sender<PacedAction>,
        command_tx: mpsc::Sender<Command>,
    ) -> Self {
        let speech_output = synthesizer.is_supported();
        Self {
            steps,
            current_index: 0,
            responses: ResponseMap::new(),
            phase: Phase::AwaitingInput,
            pending_capture: None,
            speech_output,
            recognizer,
            synthesizer,
            timers: PacingTimers::new(paced_tx),
            command_tx,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_step(&self) -> &QuestionStep {
        &self.steps[self.current_index]
    }

    pub fn responses(&self) -> &ResponseMap {
        &self.responses
    }

    pub fn into_responses(self) -> ResponseMap {
        self.responses
    }

    pub fn is_processing(&self) -> bool {
        self.phase == Phase::Processing
    }

    pub fn is_closed(&self) -> bool {
        self.phase == Phase::Closed
    }

    pub fn progress(&self) -> Progress {
        Progress::new(self.current_index, self.steps.len())
    }

    pub fn snapshot(&self) -> WizardSnapshot {
        let step = self.current_step().clone();
        WizardSnapshot {
            phase: self.phase,
            current_index: self.current_index,
            recorded: self.responses.get(&step.field).cloned(),
            step,
            progress: self.progress(),
            transcript: self.recognizer.transcript(),
            is_listening: self.recognizer.is_listening(),
            is_speaking: self.synthesizer.is_speaking(),
        }
    }

    /// Called once when the session opens.
    pub fn open(&mut self) {
        tracing::info!(
            "Voice wizard opened with {} steps (speech output: {}).",
            self.steps.len(),
            self.speech_output
        );
        if self.speech_output {
            self.timers.schedule(WELCOME_DELAY, PacedAction::Welcome);
        }
    }

    pub async fn start_listening(&mut self) {
        if self.phase != Phase::AwaitingInput {
            tracing::debug!("Ignoring start listening in phase {:?}.", self.phase);
            return;
        }
        if self.recognizer.is_listening() {
            tracing::debug!("Already listening.");
            return;
        }
        if self.synthesizer.is_speaking() {
            self.synthesizer.stop().await;
        }
        self.recognizer.reset_transcript();
        match self.recognizer.start_listening().await {
            Ok(capture) => {
                tracing::debug!(
                    "Listening for {} (capture {}).",
                    self.current_step().field,
                    capture
                );
                self.pending_capture = Some(capture);
            }
            Err(e) => {
                tracing::warn!("Could not start listening: {}", e);
                self.pending_capture = None;
            }
        }
    }

    pub async fn stop_listening(&mut self) {
        if self.recognizer.is_listening() {
            self.recognizer.stop_listening().await;
        }
    }

    pub async fn on_recognition(&mut self, event: RecognitionEvent) {
        match event {
            RecognitionEvent::Started { capture } => {
                tracing::debug!("Recognizer started capture {}.", capture)
            }
            RecognitionEvent::Ended {
                capture,
                transcript,
            } => self.on_listening_ended(capture, transcript).await,
            RecognitionEvent::Error { capture, message } => {
                tracing::warn!("Recognizer error on capture {}: {}", capture, message);
                if self.pending_capture == Some(capture) {
                    self.pending_capture = None;
                }
            }
        }
    }

    /// The recognizer finished an utterance. This is the only way an answer
    /// enters the sequencer, and only the capture started for the current
    /// step can supply it.
    pub async fn on_listening_ended(&mut self, capture: CaptureId, transcript: String) {
        if self.pending_capture != Some(capture) {
            tracing::debug!("Ignoring transcript from capture {}.", capture);
            return;
        }
        if self.phase != Phase::AwaitingInput {
            tracing::debug!("Ignoring transcript in phase {:?}.", self.phase);
            return;
        }
        self.pending_capture = None;

        if transcript.trim().is_empty() {
            tracing::debug!("Empty transcript, staying on step {}.", self.current_index + 1);
            return;
        }
        self.accept(transcript).await;
    }

    async fn accept(&mut self, answer: String) {
        self.phase = Phase::Processing;
        let field = self.current_step().field;
        tracing::info!("Answer recorded for {}: \"{}\"", field, answer);

        self.responses.insert(field, answer.clone());
        self.emit(Command::UpdateField {
            field,
            value: answer,
        })
        .await;
        self.say(ACKNOWLEDGEMENT).await;
        self.timers.schedule(ADVANCE_DELAY, PacedAction::Advance);
    }

    pub async fn skip(&mut self) {
        if self.phase != Phase::AwaitingInput {
            tracing::debug!("Ignoring skip in phase {:?}.", self.phase);
            return;
        }
        self.abandon_capture().await;

        tracing::info!("Skipping {}.", self.current_step().field);
        if self.current_index < self.steps.last_index() {
            self.current_index += 1;
            self.recognizer.reset_transcript();
            self.timers
                .schedule(SKIP_PROMPT_DELAY, PacedAction::SpeakPrompt(self.current_index));
        } else {
            self.close().await;
        }
    }

    pub async fn repeat(&mut self) {
        if self.phase != Phase::AwaitingInput || self.recognizer.is_listening() {
            tracing::debug!("Ignoring repeat while busy.");
            return;
        }
        let prompt = self.current_step().prompt;
        self.say(prompt).await;
    }

    pub async fn on_paced(&mut self, action: PacedAction) {
        if self.phase == Phase::Closed {
            return;
        }
        match action {
            PacedAction::Welcome => self.say(WELCOME_MESSAGE).await,
            PacedAction::Advance => self.advance().await,
            PacedAction::SpeakPrompt(index) => {
                if index == self.current_index && self.phase == Phase::AwaitingInput {
                    let prompt = self.current_step().prompt;
                    self.say(prompt).await;
                }
            }
            PacedAction::AutoClose => self.close().await,
        }
    }

    async fn advance(&mut self) {
        if self.phase != Phase::Processing {
            return;
        }
        if self.current_index < self.steps.last_index() {
            self.current_index += 1;
            self.recognizer.reset_transcript();
            self.phase = Phase::AwaitingInput;
            self.timers
                .schedule(NEXT_PROMPT_DELAY, PacedAction::SpeakPrompt(self.current_index));
        } else {
            self.complete().await;
        }
    }

    async fn complete(&mut self) {
        tracing::info!(
            "Voice wizard complete with {} of {} answers.",
            self.responses.len(),
            self.steps.len()
        );
        self.phase = Phase::Completed;
        self.say(COMPLETION_MESSAGE).await;
        self.emit(Command::Notify(Notice::new(
            "Voice Wizard Complete!",
            "Your profile has been filled out successfully.",
        )))
        .await;
        self.timers.schedule(AUTO_CLOSE_DELAY, PacedAction::AutoClose);
    }

    /// Ends the session. Safe to call more than once.
    pub async fn close(&mut self) {
        if self.phase == Phase::Closed {
            return;
        }
        self.timers.cancel_all();
        self.phase = Phase::Closed;
        self.abandon_capture().await;
        if self.speech_output {
            self.synthesizer.stop().await;
        }
        tracing::info!("Voice wizard closed.");
        self.emit(Command::Close).await;
    }

    /// Drops the capture in flight, if any, so nothing it heard reaches the
    /// form or the transcript.
    async fn abandon_capture(&mut self) {
        self.pending_capture = None;
        if self.recognizer.is_listening() {
            self.recognizer.cancel_listening().await;
        }
    }

    /// Speaks `text` when speech output exists and the user is not talking.
    async fn say(&self, text: &str) {
        if !self.speech_output {
            return;
        }
        if self.recognizer.is_listening() {
            tracing::debug!("User is speaking, dropping: \"{}\"", text);
            return;
        }
        if let Err(e) = self.synthesizer.speak(text).await {
            tracing::warn!("Speech output failed: {}", e);
        }
    }

    async fn emit(&self, command: Command) {
        if let Err(e) = self.command_tx.send(command).await {
            tracing::warn!("Host stopped receiving wizard commands: {:?}", e.0);
        }
    }
}
