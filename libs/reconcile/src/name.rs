//! Allocation naming.
//!
//! Every allocation is named `{job}.{group}[{index}]`. The index is unique
//! among the live allocations of a task group and is what gives an instance
//! its stable identity across reconciliation passes.

use thiserror::Error;

/// Errors from parsing an allocation name.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AllocNameError {
    #[error("allocation name missing '[index]' suffix: {0}")]
    MissingIndex(String),

    #[error("allocation name missing '.' between job and task group: {0}")]
    MissingGroup(String),

    #[error("invalid allocation index '{index}' in {name}")]
    InvalidIndex { name: String, index: String },
}

/// Formats an allocation name.
pub fn alloc_name(job_id: &str, task_group: &str, index: u32) -> String {
    format!("{job_id}.{task_group}[{index}]")
}

/// A parsed allocation name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocName<'a> {
    /// `{job}.{group}`. Job IDs may themselves contain dots, so the two
    /// halves are only separable against a known job or group.
    pub prefix: &'a str,
    pub index: u32,
}

impl<'a> AllocName<'a> {
    /// Parses `{job}.{group}[{index}]`.
    pub fn parse(name: &'a str) -> Result<Self, AllocNameError> {
        let missing = || AllocNameError::MissingIndex(name.to_string());

        let body = name.strip_suffix(']').ok_or_else(missing)?;
        let (prefix, index) = body.rsplit_once('[').ok_or_else(missing)?;

        if !prefix.contains('.') {
            return Err(AllocNameError::MissingGroup(name.to_string()));
        }

        let index = index
            .parse::<u32>()
            .map_err(|_| AllocNameError::InvalidIndex {
                name: name.to_string(),
                index: index.to_string(),
            })?;

        Ok(Self { prefix, index })
    }

    /// Returns true if the name belongs to the given job and task group.
    pub fn belongs_to(&self, job_id: &str, task_group: &str) -> bool {
        self.prefix
            .strip_prefix(job_id)
            .and_then(|rest| rest.strip_prefix('.'))
            .is_some_and(|group| group == task_group)
    }
}

/// Extracts the index from a name, treating anything malformed or foreign
/// as having no index.
pub(crate) fn index_of(job_id: &str, task_group: &str, name: &str) -> Option<u32> {
    AllocName::parse(name)
        .ok()
        .filter(|parsed| parsed.belongs_to(job_id, task_group))
        .map(|parsed| parsed.index)
}
