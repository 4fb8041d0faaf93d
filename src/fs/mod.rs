/*!
 * Virtual Filesystem Layer
 * Descriptor tables, open file descriptions, advisory locks and in-memory nodes
 */

pub mod descriptors;
pub mod lock;
pub mod node;
pub mod open_file;
pub mod types;

pub use descriptors::FileDescriptors;
pub use lock::{AdvisoryLock, LockAction, LockError, LockMode};
pub use node::{Node, NodeTable};
pub use open_file::{OpenFile, RawReader, RawWriter, Stream};
pub use types::FileAttr;
