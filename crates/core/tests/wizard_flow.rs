use profile_wizard_core::Command;
use profile_wizard_core::sequencer::{
    ACKNOWLEDGEMENT, COMPLETION_MESSAGE, Phase, WELCOME_MESSAGE, WizardSnapshot,
};
use profile_wizard_core::session::{VoiceWizard, WizardHandle, WizardOpen};
use profile_wizard_core::speech::fake::{RecordingSynthesizer, ScriptedRecognizer};
use profile_wizard_core::speech::{SpeechRecognizer, SpeechSynthesizer};
use profile_wizard_core::steps::{FormField, StepList, WIZARD_STEPS};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// A wizard wired to the scripted adapters. Kept around so a test can open
/// more than one session against the same engines.
struct Rig {
    wizard: VoiceWizard,
    recognizer: Arc<ScriptedRecognizer>,
    synthesizer: Arc<RecordingSynthesizer>,
}

impl Rig {
    fn new(steps: StepList) -> Self {
        let recognizer = Arc::new(ScriptedRecognizer::new());
        let synthesizer = Arc::new(RecordingSynthesizer::new());
        let wizard = VoiceWizard::new(recognizer.clone(), synthesizer.clone()).with_steps(steps);
        Self {
            wizard,
            recognizer,
            synthesizer,
        }
    }

    fn open(&self) -> Session {
        let (command_tx, commands) = mpsc::channel(64);
        match self.wizard.open(command_tx) {
            WizardOpen::Ready(handle) => Session {
                handle,
                recognizer: self.recognizer.clone(),
                synthesizer: self.synthesizer.clone(),
                commands,
            },
            WizardOpen::Unsupported(notice) => panic!("unexpected: {}", notice.title),
        }
    }
}

struct Session {
    handle: WizardHandle,
    recognizer: Arc<ScriptedRecognizer>,
    synthesizer: Arc<RecordingSynthesizer>,
    commands: mpsc::Receiver<Command>,
}

fn open(steps: StepList) -> Session {
    Rig::new(steps).open()
}

impl Session {
    async fn wait_until(&self, check: impl FnMut(&WizardSnapshot) -> bool) {
        let mut rx = self.handle.subscribe();
        let _ = rx.wait_for(check).await.unwrap();
    }

    /// Waits for the recognizer itself to be live on its `starts`-th capture.
    /// The published snapshot can lag a capture that just ended, so it is
    /// not enough on its own when captures follow each other closely.
    async fn wait_for_capture(&self, starts: usize) {
        while !(self.recognizer.start_count() == starts && self.recognizer.is_listening()) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Speaks `text` into the current step and waits for it to be accepted.
    async fn answer(&mut self, text: &str) -> Command {
        self.handle.start_listening().await.unwrap();
        self.wait_until(|s| s.is_listening).await;
        self.recognizer.finish_with(text);
        self.commands.recv().await.unwrap()
    }
}

fn three_steps() -> StepList {
    StepList::new(vec![
        WIZARD_STEPS[0].clone(),
        WIZARD_STEPS[1].clone(),
        WIZARD_STEPS[5].clone(),
    ])
    .unwrap()
}

#[tokio::test(start_paused = true)]
async fn answer_skip_answer_fills_two_fields() {
    let mut session = open(three_steps());
    session.wait_until(|s| s.is_speaking).await;
    assert_eq!(session.synthesizer.spoken(), vec![WELCOME_MESSAGE.to_string()]);

    let update = session.answer("Sam").await;
    assert_eq!(
        update,
        Command::UpdateField {
            field: FormField::Name,
            value: "Sam".to_string()
        }
    );
    assert_eq!(session.synthesizer.last_spoken().as_deref(), Some(ACKNOWLEDGEMENT));

    session
        .wait_until(|s| s.current_index == 1 && s.phase == Phase::AwaitingInput)
        .await;
    session.handle.skip().await.unwrap();
    session.wait_until(|s| s.current_index == 2).await;

    let update = session.answer("founder").await;
    assert_eq!(
        update,
        Command::UpdateField {
            field: FormField::Role,
            value: "founder".to_string()
        }
    );

    match session.commands.recv().await.unwrap() {
        Command::Notify(notice) => assert_eq!(notice.title, "Voice Wizard Complete!"),
        other => panic!("expected completion notice, got {:?}", other),
    }
    assert_eq!(session.commands.recv().await.unwrap(), Command::Close);
    assert!(
        session
            .synthesizer
            .spoken()
            .contains(&COMPLETION_MESSAGE.to_string())
    );

    let responses = session.handle.finished().await.unwrap();
    assert_eq!(responses.len(), 2);
    assert_eq!(responses.get(&FormField::Name).unwrap(), "Sam");
    assert!(!responses.contains_key(&FormField::Location));
    assert_eq!(responses.get(&FormField::Role).unwrap(), "founder");
}

#[tokio::test(start_paused = true)]
async fn close_while_prompt_pending_stays_silent() {
    let mut session = open(StepList::default());
    session.answer("Sam").await;
    session
        .wait_until(|s| s.current_index == 1 && s.phase == Phase::AwaitingInput)
        .await;

    let synthesizer = session.synthesizer.clone();
    let Session {
        handle,
        mut commands,
        ..
    } = session;
    let responses = handle.close().await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(responses.len(), 1);
    assert!(!synthesizer.spoken().contains(&WIZARD_STEPS[1].prompt.to_string()));
    assert!(!synthesizer.is_speaking());
    assert_eq!(commands.recv().await.unwrap(), Command::Close);
    assert!(commands.recv().await.is_none());
}

#[tokio::test]
async fn unsupported_recognizer_refuses_to_open() {
    let (command_tx, mut commands) = mpsc::channel(4);
    let wizard = VoiceWizard::new(
        Arc::new(ScriptedRecognizer::unsupported()),
        Arc::new(RecordingSynthesizer::new()),
    );
    assert!(!wizard.recognition_supported());

    match wizard.open(command_tx) {
        WizardOpen::Unsupported(notice) => {
            assert_eq!(notice.title, "Speech Recognition Not Supported");
        }
        WizardOpen::Ready(_) => panic!("session opened without speech input"),
    }
    assert!(commands.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn full_interview_never_talks_over_the_user() {
    let mut session = open(StepList::default());

    // Watch every published state until the session ends.
    let mut rx = session.handle.subscribe();
    let watcher = tokio::spawn(async move {
        let mut last_index = 0;
        let mut violations = Vec::new();
        while rx.changed().await.is_ok() {
            let snapshot = rx.borrow_and_update().clone();
            if snapshot.is_listening && snapshot.is_speaking {
                violations.push(format!("listening and speaking at step {}", snapshot.current_index));
            }
            if snapshot.current_index < last_index {
                violations.push(format!("index went back to {}", snapshot.current_index));
            }
            last_index = snapshot.current_index;
        }
        violations
    });

    let answers = [
        "Sam Rivera",
        "Lisbon, Portugal",
        "technology",
        "ML Engineer",
        "5 years",
        "founder",
        "computer vision",
        "climate tech co-founders",
    ];
    for (index, text) in answers.iter().enumerate() {
        session
            .wait_until(|s| s.current_index == index && s.phase == Phase::AwaitingInput)
            .await;
        let update = session.answer(text).await;
        assert_eq!(
            update,
            Command::UpdateField {
                field: WIZARD_STEPS[index].field,
                value: text.to_string()
            }
        );
    }

    assert!(matches!(
        session.commands.recv().await.unwrap(),
        Command::Notify(_)
    ));
    assert_eq!(session.commands.recv().await.unwrap(), Command::Close);

    let responses = session.handle.finished().await.unwrap();
    assert_eq!(responses.len(), 8);
    assert_eq!(responses.get(&FormField::LookingFor).unwrap(), "climate tech co-founders");

    let violations = watcher.await.unwrap();
    assert!(violations.is_empty(), "{:?}", violations);
}

#[tokio::test(start_paused = true)]
async fn silent_utterance_keeps_the_step() {
    let mut session = open(three_steps());
    session.handle.start_listening().await.unwrap();
    session.wait_until(|s| s.is_listening).await;
    session.recognizer.finish_with("");
    session.wait_until(|s| !s.is_listening).await;

    let snapshot = session.handle.snapshot();
    assert_eq!(snapshot.current_index, 0);
    assert_eq!(snapshot.phase, Phase::AwaitingInput);
    assert!(session.commands.try_recv().is_err());

    let update = session.answer("Sam").await;
    assert!(matches!(update, Command::UpdateField { field: FormField::Name, .. }));
    session.handle.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn listening_again_before_a_silent_result_keeps_the_new_answer() {
    // --- 1. Arrange ---
    // First capture hears nothing. The user presses listen again right away,
    // so the new action is queued alongside the first capture's result.
    let mut session = open(three_steps());
    session.handle.start_listening().await.unwrap();
    session.wait_for_capture(1).await;
    session.recognizer.finish_with("");
    session.handle.start_listening().await.unwrap();

    // --- 2. Act ---
    // Once the second capture is live, the user gives the real answer.
    session.wait_for_capture(2).await;
    session.recognizer.finish_with("Sam");

    // --- 3. Assert ---
    // The answer from the second capture reaches the form and the step moves.
    assert_eq!(
        session.commands.recv().await.unwrap(),
        Command::UpdateField {
            field: FormField::Name,
            value: "Sam".to_string()
        }
    );
    session.wait_until(|s| s.current_index == 1).await;

    let responses = session.handle.close().await.unwrap();
    assert_eq!(responses.get(&FormField::Name).unwrap(), "Sam");
}

#[tokio::test(start_paused = true)]
async fn reopening_starts_over_with_nothing_held() {
    // --- 1. Arrange ---
    // Answer the first step and close while the answer is still being
    // processed, leaving "Sam" in the recognizer's transcript.
    let rig = Rig::new(StepList::default());
    let mut first = rig.open();
    first.answer("Sam").await;
    first.wait_until(|s| s.is_processing()).await;
    let responses = first.handle.close().await.unwrap();
    assert_eq!(responses.len(), 1);
    assert_eq!(rig.recognizer.transcript(), "Sam");

    // --- 2. Act ---
    let second = rig.open();

    // --- 3. Assert ---
    // The new session is back on step one with no answers and no old words.
    let snapshot = second.handle.snapshot();
    assert_eq!(snapshot.current_index, 0);
    assert_eq!(snapshot.phase, Phase::AwaitingInput);
    assert_eq!(snapshot.recorded, None);
    assert_eq!(snapshot.transcript, "");

    let responses = second.handle.close().await.unwrap();
    assert!(responses.is_empty());
}

#[tokio::test(start_paused = true)]
async fn recognition_error_then_retry_records_the_answer() {
    let mut session = open(three_steps());
    session.handle.start_listening().await.unwrap();
    session.wait_for_capture(1).await;

    // The engine gives up mid-utterance (network drop, device unplugged).
    session.recognizer.fail("network down");
    session.wait_until(|s| !s.is_listening).await;

    // Nothing was recorded and the user is still on the same question.
    let snapshot = session.handle.snapshot();
    assert_eq!(snapshot.current_index, 0);
    assert_eq!(snapshot.phase, Phase::AwaitingInput);
    assert!(session.commands.try_recv().is_err());

    // A second try works as usual.
    let update = session.answer("Sam").await;
    assert_eq!(
        update,
        Command::UpdateField {
            field: FormField::Name,
            value: "Sam".to_string()
        }
    );
    session.handle.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn recognition_error_then_skip_moves_on() {
    let session = open(three_steps());
    session.handle.start_listening().await.unwrap();
    session.wait_for_capture(1).await;
    session.recognizer.fail("microphone unplugged");
    session.wait_until(|s| !s.is_listening).await;

    session.handle.skip().await.unwrap();
    session.wait_until(|s| s.current_index == 1).await;

    let responses = session.handle.close().await.unwrap();
    assert!(responses.is_empty());
}

#[tokio::test(start_paused = true)]
async fn finished_speech_lets_the_flow_continue() {
    // --- 1. Arrange ---
    // Let the welcome play out completely.
    let mut session = open(three_steps());
    session.wait_until(|s| s.is_speaking).await;
    session.synthesizer.finish();
    session.wait_until(|s| !s.is_speaking).await;

    // --- 2. Act ---
    // Ask for the question again, let it finish, then answer.
    session.handle.repeat().await.unwrap();
    session.wait_until(|s| s.is_speaking).await;
    assert_eq!(
        session.synthesizer.last_spoken().as_deref(),
        Some(WIZARD_STEPS[0].prompt)
    );
    session.synthesizer.finish();

    session.answer("Sam").await;
    assert_eq!(session.synthesizer.last_spoken().as_deref(), Some(ACKNOWLEDGEMENT));
    session.synthesizer.finish();

    // --- 3. Assert ---
    // The next prompt is spoken on its own once the step advances.
    session
        .wait_until(|s| s.current_index == 1 && s.is_speaking)
        .await;
    assert_eq!(
        session.synthesizer.last_spoken().as_deref(),
        Some(WIZARD_STEPS[1].prompt)
    );
    // Only start-listening and close ever cut speech short.
    assert_eq!(session.synthesizer.stop_count(), 0);

    session.handle.close().await.unwrap();
}
