//! Runtime-error severities and the masks used to filter them.

use crate::error::FaultgateError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};
use thiserror::Error;

/// Severity of a non-panic runtime error raised through the runtime-error channel.
///
/// Bit values follow the classic runtime-error levels so masks written as
/// integers keep their usual meaning.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum Severity {
    Error = 1,
    Warning = 2,
    Notice = 8,
    UserError = 256,
    UserWarning = 512,
    UserNotice = 1024,
    RecoverableError = 4096,
    Deprecated = 8192,
    UserDeprecated = 16384,
}

impl Severity {
    pub const fn bits(self) -> u32 {
        self as u32
    }

    /// Whether this severity stops the current operation when left unhandled.
    pub const fn is_fatal(self) -> bool {
        matches!(self, Severity::Error | Severity::UserError | Severity::RecoverableError)
    }
}

/// A set of severities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SeverityMask(u32);

impl SeverityMask {
    const ALL_BITS: u32 = 1 | 2 | 8 | 256 | 512 | 1024 | 4096 | 8192 | 16384;

    pub const fn all() -> Self {
        Self(Self::ALL_BITS)
    }

    pub const fn empty() -> Self {
        Self(0)
    }

    /// Builds a mask from raw bits, dropping bits that name no known severity.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits & Self::ALL_BITS)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, severity: Severity) -> bool {
        self.0 & severity.bits() != 0
    }

    pub const fn with(self, severity: Severity) -> Self {
        Self(self.0 | severity.bits())
    }

    pub const fn without(self, severity: Severity) -> Self {
        Self(self.0 & !severity.bits())
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Severity> {
        Severity::iter().filter(move |severity| self.contains(*severity))
    }
}

impl Default for SeverityMask {
    fn default() -> Self {
        Self::all()
    }
}

impl From<Severity> for SeverityMask {
    fn from(severity: Severity) -> Self {
        Self(severity.bits())
    }
}

impl BitOr for SeverityMask {
    type Output = SeverityMask;

    fn bitor(self, rhs: SeverityMask) -> SeverityMask {
        Self(self.0 | rhs.0)
    }
}

impl BitOr<Severity> for SeverityMask {
    type Output = SeverityMask;

    fn bitor(self, rhs: Severity) -> SeverityMask {
        self.with(rhs)
    }
}

impl BitOr for Severity {
    type Output = SeverityMask;

    fn bitor(self, rhs: Severity) -> SeverityMask {
        SeverityMask::from(self).with(rhs)
    }
}

impl BitOrAssign<Severity> for SeverityMask {
    fn bitor_assign(&mut self, rhs: Severity) {
        *self = self.with(rhs);
    }
}

impl fmt::Display for SeverityMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::all() {
            return f.write_str("all");
        }
        if self.is_empty() {
            return f.write_str("none");
        }
        let names: Vec<&'static str> = self.iter().map(|severity| <&'static str>::from(severity)).collect();
        f.write_str(&names.join(","))
    }
}

/// Parses `all`, `none`, severity names, or raw integer bits, separated by `,` or `|`.
///
/// A leading `-` or `~` removes a severity. When the first term is a removal the
/// mask starts from `all`, so `-deprecated` means "everything but deprecations".
impl FromStr for SeverityMask {
    type Err = FaultgateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let terms: Vec<&str> = s
            .split([',', '|'])
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .collect();

        let mut mask = match terms.first() {
            Some(first) if first.starts_with(['-', '~']) => Self::all(),
            _ => Self::empty(),
        };

        for term in terms {
            let (remove, name) = match term.strip_prefix(['-', '~']) {
                Some(rest) => (true, rest.trim()),
                None => (false, term),
            };
            let parsed = match name.to_ascii_lowercase().as_str() {
                "all" => Self::all(),
                "none" => Self::empty(),
                other => match other.parse::<u32>() {
                    Ok(bits) => Self::from_bits(bits),
                    Err(_) => Severity::from_str(other)
                        .map(Self::from)
                        .map_err(|_| FaultgateError::UnknownSeverity(name.to_string()))?,
                },
            };
            mask = if remove {
                Self(mask.0 & !parsed.0)
            } else {
                mask | parsed
            };
        }

        Ok(mask)
    }
}

impl TryFrom<String> for SeverityMask {
    type Error = FaultgateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SeverityMask> for String {
    fn from(mask: SeverityMask) -> Self {
        mask.to_string()
    }
}

/// A runtime error escalated into an error value.
///
/// Produced when a runtime error's severity is enabled in the reporting mask.
/// Its `Display` is the original message, so a response rendered from it
/// shows the message verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ErrorException {
    severity: Severity,
    message: String,
    file: String,
    line: u32,
}

impl ErrorException {
    pub fn new(severity: Severity, message: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        Self {
            severity,
            message: message.into(),
            file: file.into(),
            line,
        }
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Source file, empty when the origin is unknown.
    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn line(&self) -> u32 {
        self.line
    }
}
