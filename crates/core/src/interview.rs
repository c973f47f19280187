use crate::Notice;
use crate::form::{ProfileForm, ProfileSubmission};
use anyhow::{Context, Result};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

/// What the interview backend returns for an accepted profile.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InterviewBooking {
    pub id: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Hands a submitted profile to whoever conducts the follow-up interview.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait InterviewScheduler: Send + Sync {
    async fn schedule(&self, submission: &ProfileSubmission) -> Result<InterviewBooking>;
}

pub struct HttpInterviewScheduler {
    client: Client,
    endpoint: String,
    token: Option<SecretString>,
}

impl HttpInterviewScheduler {
    pub fn new(endpoint: String, token: Option<SecretString>) -> Self {
        Self {
            client: Client::new(),
            endpoint,
            token,
        }
    }
}

#[async_trait]
impl InterviewScheduler for HttpInterviewScheduler {
    async fn schedule(&self, submission: &ProfileSubmission) -> Result<InterviewBooking> {
        let mut request = self.client.post(&self.endpoint).json(submission);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("posting profile to {}", self.endpoint))?
            .error_for_status()?;
        let booking = response
            .json::<InterviewBooking>()
            .await
            .context("decoding interview booking")?;
        tracing::info!("Interview booked with id {}.", booking.id);
        Ok(booking)
    }
}

/// Validates the form, then books the interview if a scheduler is configured.
///
/// Without a scheduler the local success notice is the whole outcome.
pub async fn submit_profile(
    form: &ProfileForm,
    scheduler: Option<&dyn InterviewScheduler>,
) -> Result<(Notice, Option<InterviewBooking>)> {
    let submission = form.submit()?;
    let booking = match scheduler {
        Some(scheduler) => Some(scheduler.schedule(&submission).await?),
        None => None,
    };
    Ok((submission.notice(), booking))
}
