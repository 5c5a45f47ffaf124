//! Format versioning constants for persisted files.
//!
//! The envelope carries an explicit version so readers can refuse layouts
//! they do not understand instead of misreading them.

/// Current binary format version for persisted documents.
/// Increment when the envelope or the value wire tags change.
pub const FORMAT_VERSION: u16 = 1;

/// Magic bytes at the start of every persisted file.
pub const FILE_MAGIC: [u8; 4] = *b"PPST";

/// Envelope header: magic, version, checksum, payload length.
pub(crate) const HEADER_LEN: usize = 4 + 2 + 4 + 4;
