//! REST path building from positional segments.
//!
//! `["user", 1, "file"]` becomes `/users/1/files`: segments pair up as
//! (resource, identifier), resources are pluralized, identifiers are kept
//! verbatim. A segment containing `/` is spliced in as a literal fragment and
//! restarts the pairing.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One positional path token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Segment {
    Number(i64),
    Text(String),
}

impl Segment {
    /// Literal fragments contain a path separator.
    pub fn is_fragment(&self) -> bool {
        matches!(self, Segment::Text(s) if s.contains('/'))
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Number(n) => write!(f, "{n}"),
            Segment::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Segment {
    fn from(s: &str) -> Self {
        Segment::Text(s.to_string())
    }
}

impl From<String> for Segment {
    fn from(s: String) -> Self {
        Segment::Text(s)
    }
}

impl From<&String> for Segment {
    fn from(s: &String) -> Self {
        Segment::Text(s.clone())
    }
}

macro_rules! segment_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Segment {
            fn from(n: $t) -> Self {
                Segment::Number(n as i64)
            }
        })*
    };
}

segment_from_int!(i8, i16, i32, i64, u8, u16, u32);

macro_rules! segment_from_wide_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Segment {
            /// Values beyond `i64::MAX` keep their digits as text.
            fn from(n: $t) -> Self {
                i64::try_from(n)
                    .map(Segment::Number)
                    .unwrap_or_else(|_| Segment::Text(n.to_string()))
            }
        })*
    };
}

segment_from_wide_int!(u64, usize);

/// Build the REST path for `segments`. Always starts with `/`.
pub fn build_path(segments: &[Segment]) -> String {
    let mut parts: Vec<String> = vec!["/".to_string()];
    let mut index = 0usize;

    for segment in segments {
        if segment.is_fragment() {
            parts.push(segment.to_string());
            index = 0;
            continue;
        }

        let part = match segment {
            Segment::Text(name) if index % 2 == 0 => pluralize(name),
            other => other.to_string(),
        };
        parts.push(part);
        index += 1;
    }

    join(&parts)
}

/// Join URL parts with single slashes.
///
/// The scheme separator (`http://`) survives, runs of slashes elsewhere
/// collapse, a trailing slash on the last part is kept and `/?` / `/#`
/// collapse to `?` / `#`.
pub fn join<S: AsRef<str>>(parts: &[S]) -> String {
    let parts: Vec<&str> = parts.iter().map(AsRef::as_ref).filter(|p| !p.is_empty()).collect();
    let Some(last) = parts.last() else {
        return String::new();
    };

    let (scheme, first_rest) = split_scheme(parts[0]);
    let leading = scheme.is_none() && first_rest.starts_with('/');
    let trailing = last.ends_with('/') && (parts.len() > 1 || last.len() > 1);

    let pieces: Vec<&str> = std::iter::once(first_rest)
        .chain(parts[1..].iter().copied())
        .flat_map(|p| p.split('/'))
        .filter(|p| !p.is_empty())
        .collect();

    let mut out = String::new();
    if let Some(scheme) = scheme {
        out.push_str(scheme);
        out.push_str("://");
    } else if leading {
        out.push('/');
    }
    out.push_str(&pieces.join("/"));
    if trailing && !pieces.is_empty() {
        out.push('/');
    }

    out.replace("/?", "?").replace("/#", "#")
}

fn split_scheme(part: &str) -> (Option<&str>, &str) {
    match part.find("://") {
        Some(pos) if pos > 0 && part[..pos].chars().all(|c| c.is_ascii_alphanumeric() || "+-.".contains(c)) => {
            (Some(&part[..pos]), &part[pos + 3..])
        }
        _ => (None, part),
    }
}

/// Whether `url` parses on its own and should not be joined to a base.
pub fn is_absolute(url: &str) -> bool {
    ::url::Url::parse(url).is_ok()
}

/// Append `query` to `url` as form-encoded pairs. Existing query strings
/// are extended with `&`.
pub fn with_query(url: &str, query: &BTreeMap<String, String>) -> String {
    if query.is_empty() {
        return url.to_string();
    }
    let encoded = ::url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(query)
        .finish();
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{encoded}")
}

const UNCOUNTABLE: &[&str] = &[
    "equipment",
    "information",
    "rice",
    "money",
    "species",
    "series",
    "fish",
    "sheep",
    "deer",
    "news",
    "media",
    "data",
    "metadata",
];

const IRREGULAR: &[(&str, &str)] = &[
    ("person", "people"),
    ("man", "men"),
    ("woman", "women"),
    ("child", "children"),
    ("tooth", "teeth"),
    ("foot", "feet"),
    ("mouse", "mice"),
    ("goose", "geese"),
    ("ox", "oxen"),
];

/// Best-effort English pluralization.
///
/// Irregular nouns outside the small built-in table come out wrong; callers
/// who care spell the plural themselves inside a `/` fragment.
pub fn pluralize(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }
    let lower = word.to_ascii_lowercase();

    if UNCOUNTABLE.contains(&lower.as_str()) {
        return word.to_string();
    }

    if let Some((_, plural)) = IRREGULAR.iter().find(|(singular, _)| *singular == lower) {
        return match_initial_case(word, plural);
    }

    let stem = |n: usize| &word[..word.len() - n];

    if lower.ends_with('y') && !ends_with_vowel_before(&lower, 1) {
        return format!("{}ies", stem(1));
    }
    if lower.ends_with("fe") && !lower.ends_with("ffe") {
        return format!("{}ves", stem(2));
    }
    if (lower.ends_with("lf") || lower.ends_with("rf") || lower.ends_with("af")) && lower.len() > 2 {
        return format!("{}ves", stem(1));
    }
    if lower.ends_with("ss")
        || lower.ends_with('x')
        || lower.ends_with('z')
        || lower.ends_with("ch")
        || lower.ends_with("sh")
    {
        return format!("{word}es");
    }
    if lower.ends_with('s') {
        return word.to_string();
    }

    format!("{word}s")
}

fn ends_with_vowel_before(lower: &str, suffix_len: usize) -> bool {
    lower
        .chars()
        .rev()
        .nth(suffix_len)
        .map(|c| "aeiou".contains(c))
        .unwrap_or(false)
}

fn match_initial_case(original: &str, plural: &str) -> String {
    match original.chars().next() {
        Some(c) if c.is_uppercase() => {
            let mut chars = plural.chars();
            chars
                .next()
                .map(|first| first.to_uppercase().chain(chars).collect::<String>())
                .unwrap_or_default()
        }
        _ => plural.to_string(),
    }
}
