// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use super::rpc::{Code, Status};
use std::error::Error as StdError;
use std::sync::Arc;

type BoxError = Box<dyn StdError + Send + Sync>;
type SharedError = Arc<dyn StdError + Send + Sync>;

/// The core error returned by all client libraries.
///
/// The client libraries report errors from multiple sources. For example, the
/// service may return an error, the transport may be unable to create the
/// necessary connection to make a request, the credentials may be invalid,
/// a polling loop may be cancelled, or the retry policy may give up.
///
/// Errors are cheap to clone: the underlying source, if any, is shared. This
/// allows a single failed bulk request to report the same error to every
/// caller waiting on it.
///
/// # Example
/// ```
/// use google_cloud_gax::error::Error;
/// use google_cloud_gax::error::rpc::{Code, Status};
/// let error = Error::service(Status::default().set_code(Code::NotFound));
/// assert_eq!(error.code(), Code::NotFound);
/// ```
#[derive(Clone, Debug)]
pub struct Error {
    kind: ErrorKind,
    source: Option<SharedError>,
}

#[derive(Clone, Debug)]
enum ErrorKind {
    Service(Box<Status>),
    Io,
    Timeout,
    Authentication { transient: bool },
    Exhausted,
    Cancelled,
    Other,
}

impl Error {
    /// Creates an error with the information returned by Google Cloud services.
    ///
    /// # Example
    /// ```
    /// use google_cloud_gax::error::Error;
    /// use google_cloud_gax::error::rpc::{Code, Status};
    /// let status = Status::default().set_code(Code::NotFound).set_message("NOT FOUND");
    /// let error = Error::service(status.clone());
    /// assert_eq!(error.status(), Some(&status));
    /// ```
    pub fn service(status: Status) -> Self {
        Self {
            kind: ErrorKind::Service(Box::new(status)),
            source: None,
        }
    }

    /// Creates an error representing an I/O problem in the transport.
    ///
    /// The request may or may not have reached the service.
    pub fn io<T: Into<BoxError>>(source: T) -> Self {
        Self::with_source(ErrorKind::Io, source)
    }

    /// The request failed because of an I/O problem in the transport.
    pub fn is_io(&self) -> bool {
        matches!(self.kind, ErrorKind::Io)
    }

    /// Creates an error representing a timeout.
    ///
    /// # Example
    /// ```
    /// use std::error::Error as _;
    /// use google_cloud_gax::error::Error;
    /// let error = Error::timeout("simulated timeout");
    /// assert!(error.is_timeout());
    /// assert!(error.source().is_some());
    /// ```
    pub fn timeout<T: Into<BoxError>>(source: T) -> Self {
        Self::with_source(ErrorKind::Timeout, source)
    }

    /// The request could not be completed before its deadline.
    ///
    /// This is always a client-side generated error. Note that the request may
    /// or may not have started, and it may or may not complete in the service.
    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::Timeout)
    }

    /// Creates an error representing a problem configuring the credentials.
    ///
    /// Set `transient` to `true` when the problem may go away if the request
    /// is attempted again, for example, when the token endpoint is
    /// temporarily unavailable.
    pub fn authentication<T: Into<BoxError>>(transient: bool, source: T) -> Self {
        Self::with_source(ErrorKind::Authentication { transient }, source)
    }

    /// The credentials could not be applied to the request.
    ///
    /// The request never left the client.
    pub fn is_authentication(&self) -> bool {
        matches!(self.kind, ErrorKind::Authentication { .. })
    }

    /// Creates an error representing an exhausted policy.
    ///
    /// # Example
    /// ```
    /// use std::error::Error as _;
    /// use google_cloud_gax::error::Error;
    /// let error = Error::exhausted("too many retry attempts");
    /// assert!(error.is_exhausted());
    /// assert!(error.source().is_some());
    /// ```
    pub fn exhausted<T: Into<BoxError>>(source: T) -> Self {
        Self::with_source(ErrorKind::Exhausted, source)
    }

    /// The request could not complete before the retry or polling policy
    /// expired.
    ///
    /// This is always a client-side generated error, but it may be the result
    /// of multiple errors received from the service. The last such error, if
    /// any, is available via [source()][std::error::Error::source].
    ///
    /// # Troubleshooting
    ///
    /// The most common cause of this problem is a transient problem that lasts
    /// longer than your retry policy, or a long-running operation that takes
    /// longer than your polling policy allows.
    pub fn is_exhausted(&self) -> bool {
        matches!(self.kind, ErrorKind::Exhausted)
    }

    /// Creates an error representing a cancelled operation.
    pub fn cancelled<T: Into<BoxError>>(source: T) -> Self {
        Self::with_source(ErrorKind::Cancelled, source)
    }

    /// The operation was cancelled by the application.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled)
    }

    /// Creates an error for problems that fit none of the other categories.
    pub fn other<T: Into<BoxError>>(source: T) -> Self {
        Self::with_source(ErrorKind::Other, source)
    }

    /// The [Status] payload associated with this error.
    ///
    /// Only errors reported by the service (or synthesized to look like them,
    /// such as validation errors) have a status.
    pub fn status(&self) -> Option<&Status> {
        match &self.kind {
            ErrorKind::Service(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    /// The canonical [Code] for this error.
    ///
    /// Errors created by the client library map to the closest code. Notably,
    /// an exhausted policy maps to [Code::DeadlineExceeded], and cancellation
    /// maps to [Code::Cancelled].
    ///
    /// # Example
    /// ```
    /// use google_cloud_gax::error::Error;
    /// use google_cloud_gax::error::rpc::Code;
    /// assert_eq!(Error::exhausted("gave up").code(), Code::DeadlineExceeded);
    /// assert_eq!(Error::cancelled("stop").code(), Code::Cancelled);
    /// ```
    pub fn code(&self) -> Code {
        match &self.kind {
            ErrorKind::Service(s) => s.code,
            ErrorKind::Io => Code::Unavailable,
            ErrorKind::Timeout | ErrorKind::Exhausted => Code::DeadlineExceeded,
            ErrorKind::Authentication { .. } => Code::InvalidArgument,
            ErrorKind::Cancelled => Code::Cancelled,
            ErrorKind::Other => Code::Unknown,
        }
    }

    /// Returns true if the request never left the client and may succeed if
    /// attempted again.
    ///
    /// Such errors are safe to retry even for non-idempotent requests.
    pub fn is_transient_and_before_rpc(&self) -> bool {
        matches!(self.kind, ErrorKind::Authentication { transient: true })
    }

    fn with_source<T: Into<BoxError>>(kind: ErrorKind, source: T) -> Self {
        Self {
            kind,
            source: Some(Arc::from(source.into())),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.kind, &self.source) {
            (ErrorKind::Service(s), _) => write!(
                f,
                "the service reports an error with code {} described as: {}",
                s.code, s.message
            ),
            (ErrorKind::Io, Some(e)) => write!(f, "cannot send the request {e}"),
            (ErrorKind::Timeout, Some(e)) => {
                write!(f, "the request exceeded the request deadline {e}")
            }
            (ErrorKind::Authentication { .. }, Some(e)) => {
                write!(f, "cannot configure the request credentials {e}")
            }
            (ErrorKind::Exhausted, Some(e)) => {
                write!(f, "the loop was terminated by its policy: {e}")
            }
            (ErrorKind::Cancelled, Some(e)) => write!(f, "the operation was cancelled: {e}"),
            (ErrorKind::Other, Some(e)) => {
                write!(f, "an unclassified problem making a request: {e}")
            }
            (_, None) => write!(f, "an error with code {}", self.code()),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}
