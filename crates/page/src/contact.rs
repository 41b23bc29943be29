//! Contact form submission.
//!
//! Failures never escape [`ContactForm::submit`]: every outcome is folded into
//! a [`FormStatus`] carrying the message shown next to the form.

use reqwest::blocking::{multipart, Client};
use serde::Deserialize;
use tracing::{debug, info, warn};

pub const SENDING_MESSAGE: &str = "Sending…";
pub const SUCCESS_MESSAGE: &str = "Thanks! We will reply shortly.";

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected response: {0}")]
    InvalidResponse(#[from] serde_json::Error),
}

/// JSON body returned by the form endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContactResponse {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Sends form fields to an endpoint.
pub trait FormTransport {
    fn post(
        &self,
        action: &str,
        fields: &[(String, String)],
    ) -> Result<ContactResponse, TransportError>;
}

/// Multipart POST over a blocking `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let http = Client::builder().build()?;
        Ok(Self { http })
    }
}

impl FormTransport for ReqwestTransport {
    fn post(
        &self,
        action: &str,
        fields: &[(String, String)],
    ) -> Result<ContactResponse, TransportError> {
        let form = fields
            .iter()
            .fold(multipart::Form::new(), |form, (name, value)| {
                form.text(name.clone(), value.clone())
            });
        debug!(%action, fields = fields.len(), "posting contact form");
        let response = self.http.post(action).multipart(form).send()?;
        let status = response.status();
        let body = response.text()?;
        serde_json::from_str(&body).map_err(|err| {
            let snippet = body.chars().take(200).collect::<String>();
            warn!(%status, %snippet, "contact endpoint returned a non-JSON body");
            TransportError::from(err)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormState {
    Idle,
    Sending,
    Sent,
    /// The endpoint answered with `ok: false`.
    Rejected,
    /// The request never produced a usable answer.
    NetworkError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormStatus {
    pub state: FormState,
    pub message: String,
}

impl FormStatus {
    fn new(state: FormState, message: impl Into<String>) -> Self {
        Self {
            state,
            message: message.into(),
        }
    }

    pub fn idle() -> Self {
        Self::new(FormState::Idle, "")
    }
}

#[derive(Debug, Clone)]
pub struct ContactForm {
    action: String,
    fallback_email: String,
    fields: Vec<(String, String)>,
    status: FormStatus,
}

impl ContactForm {
    pub fn new(action: impl Into<String>, fallback_email: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            fallback_email: fallback_email.into(),
            fields: Vec::new(),
            status: FormStatus::idle(),
        }
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    /// Appends a field. Repeated names are all posted, in insertion order,
    /// the way a form with several same-named controls is encoded.
    pub fn add_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    /// First value posted under `name`.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn status(&self) -> &FormStatus {
        &self.status
    }

    pub fn reset(&mut self) {
        self.fields.clear();
    }

    pub fn submit(&mut self, transport: &impl FormTransport) -> FormStatus {
        self.submit_with(transport, |_| {})
    }

    /// Submits the form, reporting the pending status before the request is
    /// sent and the final status once it settles.
    pub fn submit_with<T, F>(&mut self, transport: &T, mut on_status: F) -> FormStatus
    where
        T: FormTransport,
        F: FnMut(&FormStatus),
    {
        self.status = FormStatus::new(FormState::Sending, SENDING_MESSAGE);
        on_status(&self.status);

        let status = match transport.post(&self.action, &self.fields) {
            Ok(response) if response.ok => {
                info!(action = %self.action, "contact form sent");
                self.reset();
                FormStatus::new(FormState::Sent, SUCCESS_MESSAGE)
            }
            Ok(response) => {
                let message = response
                    .error
                    .filter(|error| !error.is_empty())
                    .unwrap_or_else(|| {
                        format!(
                            "Something went wrong. Please email {}",
                            self.fallback_email
                        )
                    });
                warn!(action = %self.action, %message, "contact form rejected");
                FormStatus::new(FormState::Rejected, message)
            }
            Err(err) => {
                warn!(action = %self.action, error = %err, "contact form transport failed");
                FormStatus::new(
                    FormState::NetworkError,
                    format!("Network error — please email {}", self.fallback_email),
                )
            }
        };

        self.status = status.clone();
        on_status(&self.status);
        status
    }
}
