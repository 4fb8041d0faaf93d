/*!
 * Descriptor Attachment Types
 */

use crate::core::types::Fid;
use serde::{Deserialize, Serialize};

/// How one child stdio slot is attached.
///
/// A directive list is indexed by slot: entry 0 is the child's stdin,
/// 1 its stdout, 2 its stderr, and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "fid")]
pub enum FileAttr {
    /// Share the caller's open descriptor `fid`
    Inherit(Fid),
    /// Present but unattached: writes are discarded, reads see EOF
    Ignore,
    /// A fresh pipe; the caller keeps the opposite end
    Pipe,
    /// Share the caller's descriptor named by an explicit number
    Numeric(Fid),
}

impl FileAttr {
    /// Caller descriptor this directive attaches, if any
    pub fn source_fid(&self) -> Option<Fid> {
        match *self {
            FileAttr::Inherit(fid) | FileAttr::Numeric(fid) => Some(fid),
            FileAttr::Ignore | FileAttr::Pipe => None,
        }
    }
}
