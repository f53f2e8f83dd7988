//! Execution engine: guest languages, access policy, values and errors.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

pub mod python;

pub use python::{Context, ContextBuilder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Python,
}

impl Language {
    pub fn id(self) -> &'static str {
        match self {
            Language::Python => "python",
        }
    }
}

impl FromStr for Language {
    type Err = GuestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "python" => Ok(Language::Python),
            _ => Err(GuestError::UnsupportedLanguage(s.to_string())),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// What the guest may reach on the host side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessPolicy {
    /// Interpreter core modules only, isolated from the host environment.
    #[default]
    Minimal,
    /// Native standard library plus the host environment.
    Unrestricted,
}

impl AccessPolicy {
    pub fn from_allow_all(allow_all: bool) -> Self {
        if allow_all {
            AccessPolicy::Unrestricted
        } else {
            AccessPolicy::Minimal
        }
    }

    pub fn allows_host_access(self) -> bool {
        matches!(self, AccessPolicy::Unrestricted)
    }
}

#[derive(Debug, Error)]
pub enum GuestError {
    #[error("unsupported guest language: {0:?}")]
    UnsupportedLanguage(String),
    #[error("guest source failed to compile: {message}")]
    Compile { message: String },
    #[error("guest evaluation failed:\n{message}")]
    Evaluation { message: String },
    #[error("cannot convert guest value: {message}")]
    Conversion { message: String },
    #[error("guest context has already been released")]
    Released,
}

/// Host-side copy of a guest value.
#[derive(Debug, Clone, PartialEq)]
pub enum GuestValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Other { type_name: String, repr: String },
}

impl fmt::Display for GuestValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuestValue::None => f.write_str("None"),
            GuestValue::Bool(true) => f.write_str("True"),
            GuestValue::Bool(false) => f.write_str("False"),
            GuestValue::Int(i) => write!(f, "{i}"),
            GuestValue::Float(x) if x.is_finite() && x.fract() == 0.0 => write!(f, "{x:.1}"),
            GuestValue::Float(x) => write!(f, "{x}"),
            GuestValue::Str(s) => f.write_str(s),
            GuestValue::Other { repr, .. } => f.write_str(repr),
        }
    }
}
