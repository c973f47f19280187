use crate::steps::FormField;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WizardError {
    #[error("the wizard needs at least one step")]
    EmptySteps,

    #[error("field `{0}` appears in more than one step")]
    DuplicateField(FormField),

    #[error("unknown form field: {0}")]
    UnknownField(String),

    #[error("the wizard session has already ended")]
    SessionEnded,

    #[error("wizard session task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("speech engine is not available: {0}")]
    Unsupported(String),

    #[error("audio capture failed: {0}")]
    Capture(String),

    #[error("transcription failed: {0}")]
    Transcription(String),

    #[error("speech synthesis failed: {0}")]
    Synthesis(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FormError {
    #[error("required field is empty: {0}")]
    MissingField(FormField),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("no member with id {0}")]
    UnknownMember(String),
}
