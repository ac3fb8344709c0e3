//! Error aliases and the classification used at the transport boundary.

use serde::{Deserialize, Serialize};

pub type Error = anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// The broad class of a failure. The HTTP adapter and the CLI use this to decide how a failure
/// is reported; the core logic itself never produces errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// The submission could not be parsed or was rejected by strict validation.
    Request,
    /// The grid store could not be read or written.
    Sheet,
    /// The configuration or home directory is missing or broken.
    Config,
    /// OAuth credentials are missing, invalid or could not be refreshed.
    Auth,
    /// The HTTP service could not be started or failed while running.
    Service,
}

serde_plain::derive_display_from_serialize!(ErrorType);
serde_plain::derive_fromstr_from_deserialize!(ErrorType);

/// The `ErrorType` attached to an error as context, so it can be recovered later with
/// `downcast_ref` while the error text stays readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classified(pub ErrorType);

impl std::fmt::Display for Classified {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} error", self.0)
    }
}

/// Attaches an `ErrorType` to the error in a `Result`.
pub(crate) trait IntoResult<T> {
    fn pub_result(self, error_type: ErrorType) -> Result<T>;
}

impl<T, E> IntoResult<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn pub_result(self, error_type: ErrorType) -> Result<T> {
        self.map_err(|e| Into::<Error>::into(e).context(Classified(error_type)))
    }
}

/// Finds the outermost `ErrorType` attached to `e`, if any.
pub fn error_type(e: &Error) -> Option<ErrorType> {
    e.downcast_ref::<Classified>().map(|c| c.0)
}

/// The text reported to callers. The classification context is skipped so callers see the
/// underlying failure first.
pub fn public_message(e: &Error) -> String {
    let label = error_type(e).map(|t| Classified(t).to_string());
    let parts: Vec<String> = e
        .chain()
        .map(|cause| cause.to_string())
        .filter(|text| Some(text) != label.as_ref())
        .collect();
    parts.join(": ")
}
