//! ID parse errors.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    /// Not of the form `{prefix}_{ulid}`.
    #[error("malformed ID {0:?}: expected {{prefix}}_{{ulid}}")]
    Malformed(String),

    #[error("ID {id:?} belongs to another resource: expected prefix {expected:?}")]
    WrongPrefix { id: String, expected: &'static str },

    #[error("invalid ULID in ID {id:?}: {reason}")]
    InvalidUlid { id: String, reason: String },
}

/// Splits `{prefix}_{ulid}` and checks the prefix.
pub fn parse_prefixed(s: &str, expected: &'static str) -> Result<ulid::Ulid, IdError> {
    let (prefix, raw) = s
        .split_once('_')
        .filter(|(p, u)| !p.is_empty() && !u.is_empty())
        .ok_or_else(|| IdError::Malformed(s.to_string()))?;

    if prefix != expected {
        return Err(IdError::WrongPrefix {
            id: s.to_string(),
            expected,
        });
    }

    raw.parse().map_err(|e: ulid::DecodeError| IdError::InvalidUlid {
        id: s.to_string(),
        reason: e.to_string(),
    })
}
