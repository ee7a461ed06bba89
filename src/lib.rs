pub mod api;
pub mod config;
pub mod error;
pub mod input;
pub mod page;
pub mod server;

pub use api::{GenerateQrRequest, GenerateQrResponse, HealthResponse, HttpQrApi, QrApi};
pub use config::FrontendConfig;
pub use error::{ApiError, QrFormError};
pub use input::TargetUrl;

use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Represents the current phase of the form.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QrFormPhase {
    /// No generation request is outstanding.
    Idle,
    /// At least one generation request is waiting for the backend.
    Submitting,
}

impl QrFormPhase {
    /// Returns the phase as a string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            QrFormPhase::Idle => "idle",
            QrFormPhase::Submitting => "submitting",
        }
    }
}

/// Point-in-time copy of the form state, used for rendering.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct QrFormSnapshot {
    /// Current text of the URL input.
    pub input: String,
    /// Image reference from the last successful generation, if any.
    pub qr_image: Option<String>,
    /// True while a generation request is outstanding.
    pub busy: bool,
}

#[derive(Default)]
struct FormState {
    input: String,
    qr_image: Option<String>,
    outstanding: usize,
    next_id: u64,
}

/// Controller behind the QR form.
///
/// The controller owns the input text, the generated-image reference and the
/// busy flag, and mediates one request/response cycle with the backend per
/// submission. It decouples the page from the backend implementation through
/// the [`QrApi`] trait.
///
/// Overlapping submissions are not serialized. Each one issues its own
/// request and the one that settles last decides the image reference. The
/// busy flag stays raised until every outstanding request has settled.
pub struct QrFormController<A: QrApi> {
    api: A,
    state: Mutex<FormState>,
}

impl<A: QrApi> QrFormController<A> {
    /// Creates an idle controller with empty input and no image.
    pub fn new(api: A) -> Self {
        Self {
            api,
            state: Mutex::new(FormState::default()),
        }
    }

    /// Returns the backend this controller submits to.
    pub fn api(&self) -> &A {
        &self.api
    }

    fn lock(&self) -> MutexGuard<'_, FormState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the input text. Called on every keystroke or form post.
    pub fn set_input(&self, text: impl Into<String>) {
        self.lock().input = text.into();
    }

    /// Returns the current phase of the form.
    pub fn phase(&self) -> QrFormPhase {
        if self.lock().outstanding > 0 {
            QrFormPhase::Submitting
        } else {
            QrFormPhase::Idle
        }
    }

    /// Returns the number of generation requests still in flight.
    pub fn outstanding(&self) -> usize {
        self.lock().outstanding
    }

    /// Returns a copy of the state the page renders from.
    pub fn snapshot(&self) -> QrFormSnapshot {
        let state = self.lock();
        QrFormSnapshot {
            input: state.input.clone(),
            qr_image: state.qr_image.clone(),
            busy: state.outstanding > 0,
        }
    }

    /// Validates the current input and submits it.
    ///
    /// An empty or non-URL input is rejected before any request is made.
    pub async fn submit_input(&self) -> Result<Option<String>, QrFormError> {
        let input = self.lock().input.clone();
        let url = TargetUrl::parse(&input)?;
        self.submit(url).await
    }

    /// Submits `url` to the backend.
    ///
    /// Raises the busy flag, issues exactly one generation request and stores
    /// the returned image reference on success. Any failure, whether a non-2xx
    /// status, a transport error or a malformed body, is reported as
    /// [`QrFormError::GenerationFailed`] and leaves the image reference as it
    /// was. The busy flag is released in every case.
    ///
    /// # Returns
    /// The image reference stored by this submission, which is `None` when the
    /// backend answered without a `qr_code_url`.
    pub async fn submit(&self, url: TargetUrl) -> Result<Option<String>, QrFormError> {
        let busy = BusyGuard::raise(&self.state);
        log::debug!("Submission #{} started for {}", busy.id, url);

        let result = self.api.generate(url.as_str()).await;

        let outcome = match result {
            Ok(response) => {
                log::debug!("Submission #{} succeeded", busy.id);
                let qr_image = response.qr_code_url;
                self.lock().qr_image = qr_image.clone();
                Ok(qr_image)
            }
            Err(e) => {
                log::warn!("Submission #{} failed: {}", busy.id, e);
                Err(QrFormError::GenerationFailed)
            }
        };

        drop(busy);
        outcome
    }
}

/// Keeps one unit of the busy count raised until dropped, so the flag is
/// released even if the submitting future is cancelled.
struct BusyGuard<'a> {
    state: &'a Mutex<FormState>,
    id: u64,
}

impl<'a> BusyGuard<'a> {
    fn raise(state: &'a Mutex<FormState>) -> Self {
        let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
        guard.outstanding += 1;
        let id = guard.next_id;
        guard.next_id = guard.next_id.wrapping_add(1);
        Self { state, id }
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        guard.outstanding = guard.outstanding.saturating_sub(1);
    }
}
