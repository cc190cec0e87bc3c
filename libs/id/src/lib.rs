//! # convoy-id
//!
//! Typed identifiers for the convoy scheduler.
//!
//! ## Design Principles
//!
//! - IDs are stable and system-generated; job and task group names are
//!   user-controlled labels and stay plain strings
//! - All IDs have a canonical string representation with strict parsing
//! - IDs are typed so an allocation ID can never be passed where a node ID
//!   is expected
//!
//! ## ID Format
//!
//! All resource IDs use a prefixed format: `{prefix}_{ulid}`
//!
//! Examples:
//! - `alloc_01HV4Z2WQXKJNM8GPQY6VBKC3D`
//! - `node_01HV4Z3MXNKPQR9HSTZ7WCLD4E`
//! - `eval_01HV4Z4NYPLTRS0JTUA8XDME5F`
//!
//! ULIDs are time-ordered, so IDs generated later sort later. The
//! reconciler relies on that as its last-resort tie-break.

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;

pub use ulid::Ulid;

#[doc(hidden)]
pub use error::parse_prefixed as __parse_prefixed;
