//! HTTP verb as a typed enum.
//!
//! The common RFC 9110 verbs are named variants; anything else a deployment
//! defines travels as [`Verb::Extension`]. A verb selects a controller action
//! by its lowercase name (`GET` → `get`).

use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub enum Verb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    /// Custom verb, stored in uppercase wire form.
    Extension(String),
}

impl Verb {
    /// Parses a method token. Input case is ignored; the result is normalized
    /// to uppercase. Tokens outside the RFC 9110 `tchar` set are rejected.
    pub fn parse(s: &str) -> Result<Self, AppError> {
        let s = s.trim();
        if s.is_empty() || !s.bytes().all(is_tchar) {
            return Err(AppError::BadRequest(format!("invalid method: '{}'", s)));
        }
        let upper = s.to_ascii_uppercase();
        Ok(match upper.as_str() {
            "GET" => Verb::Get,
            "POST" => Verb::Post,
            "PUT" => Verb::Put,
            "PATCH" => Verb::Patch,
            "DELETE" => Verb::Delete,
            "HEAD" => Verb::Head,
            "OPTIONS" => Verb::Options,
            _ => Verb::Extension(upper),
        })
    }

    /// Returns the uppercase wire representation (e.g. `"GET"`).
    pub fn as_str(&self) -> &str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Patch => "PATCH",
            Verb::Delete => "DELETE",
            Verb::Head => "HEAD",
            Verb::Options => "OPTIONS",
            Verb::Extension(s) => s.as_str(),
        }
    }

    /// Lowercase action name the verb dispatches to.
    pub fn action_name(&self) -> String {
        self.as_str().to_ascii_lowercase()
    }
}

fn is_tchar(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

impl FromStr for Verb {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Verb::parse(s)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&axum::http::Method> for Verb {
    fn from(m: &axum::http::Method) -> Self {
        // http::Method is already a valid token
        Verb::parse(m.as_str()).unwrap_or_else(|_| Verb::Extension(m.as_str().to_ascii_uppercase()))
    }
}
