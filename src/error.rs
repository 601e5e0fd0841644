//! Error types for the navigation pipeline.

use thiserror::Error;
use url::Url;

use crate::dom::Region;

/// Result type alias using the pageturn error type.
pub type Result<T> = std::result::Result<T, NavError>;

/// Main error type for AJAX navigation.
///
/// Every variant is terminal for the navigation that produced it: the
/// orchestrator abandons the AJAX path and performs a hard navigation to the
/// target URL. Ineligible navigations are not errors, see
/// [`IgnoreReason`](crate::gate::IgnoreReason).
#[derive(Error, Debug)]
pub enum NavError {
    /// The server answered from a different URL than the one requested
    #[error("Response for {requested} was redirected to {landed}")]
    Redirected { requested: Url, landed: Url },

    /// Non-2xx response
    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    /// Body was empty or whitespace only
    #[error("Response body is empty")]
    EmptyBody,

    /// Body could not be read as an HTML document
    #[error("Response could not be parsed as a document")]
    Unparsable,

    /// An expected region is absent from the incoming or the live document
    #[error("Document is missing the {0} region")]
    MissingRegion(Region),

    /// HTTP transport error
    #[error("HTTP request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// A URL could not be resolved
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// General error from anyhow (host capabilities, setup)
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl NavError {
    /// Errors raised while obtaining the page.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            NavError::Redirected { .. }
                | NavError::Status(_)
                | NavError::EmptyBody
                | NavError::Unparsable
                | NavError::Network(_)
        )
    }

    /// Errors raised while applying a fetched page to the live document.
    pub fn is_patch_failure(&self) -> bool {
        matches!(self, NavError::MissingRegion(_))
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            NavError::Redirected { .. } => "redirected",
            NavError::Status(_) => "status",
            NavError::EmptyBody => "empty_body",
            NavError::Unparsable => "unparsable",
            NavError::MissingRegion(_) => "missing_region",
            NavError::Network(_) => "network",
            NavError::InvalidUrl(_) => "invalid_url",
            NavError::Other(_) => "other",
        }
    }
}
