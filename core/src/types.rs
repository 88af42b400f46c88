//! Call-level data: the arguments of one call and its resolved request.
//!
//! # Design
//! A call is an ordered list of path segments plus one trailing set of
//! overrides. `CallArgs` converts from arrays and vectors so the common case
//! reads as `client.get(["user"])` or `client.get(segments!["user", 1])`.

use crate::config::{CallOptions, RequestOptions};
use crate::http::HttpMethod;
use crate::url::Segment;

/// Build a `Vec<Segment>` from mixed text and integer tokens.
///
/// ```
/// use resty_core::{segments, Segment};
///
/// let path = segments!["user", 1, "file"];
/// assert_eq!(path[1], Segment::Number(1));
/// ```
#[macro_export]
macro_rules! segments {
    () => {
        ::std::vec::Vec::<$crate::Segment>::new()
    };
    ($($segment:expr),+ $(,)?) => {
        ::std::vec![$($crate::Segment::from($segment)),+]
    };
}

/// Positional arguments of a single call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    pub segments: Vec<Segment>,
    pub options: CallOptions,
}

impl CallArgs {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self {
            segments,
            options: CallOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CallOptions) -> Self {
        self.options = options;
        self
    }
}

impl From<Vec<Segment>> for CallArgs {
    fn from(segments: Vec<Segment>) -> Self {
        CallArgs::new(segments)
    }
}

impl<S: Into<Segment>, const N: usize> From<[S; N]> for CallArgs {
    fn from(segments: [S; N]) -> Self {
        CallArgs::new(segments.into_iter().map(Into::into).collect())
    }
}

impl From<&str> for CallArgs {
    fn from(segment: &str) -> Self {
        CallArgs::new(vec![Segment::from(segment)])
    }
}

impl From<(Vec<Segment>, CallOptions)> for CallArgs {
    fn from((segments, options): (Vec<Segment>, CallOptions)) -> Self {
        CallArgs { segments, options }
    }
}

/// A call after URL building and option merging, before any I/O.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRequest {
    pub method: HttpMethod,
    /// The REST path built from the segments, e.g. `/users/1`.
    pub path: String,
    /// `path` joined to the effective base URL.
    pub url: String,
    pub options: RequestOptions,
}
