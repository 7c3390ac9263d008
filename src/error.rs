//! Error taxonomy produced or propagated by the recovery journal.

use core::fmt;

/// Everything that can go wrong inside the recovery journal.
///
/// Once any variant other than [`JournalError::InvalidAdminState`] is
/// observed, the journal transitions to read-only (see
/// [`crate::admin`]) and every subsequent operation fails with
/// [`JournalError::ReadOnly`] until the process restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalError {
    /// The journal has degraded; nothing further will be accepted.
    ReadOnly,
    /// A sequence number would exceed `1 << 48`.
    JournalOverflow,
    /// No room remains to record a decrement; accounting cannot be
    /// preserved, so the journal is fatally full.
    JournalFull,
    /// The operation was attempted while the journal was not in
    /// `normal_operation` (e.g. during a drain).
    InvalidAdminState,
    /// The boot scanner or entry validator rejected on-disk content.
    CorruptJournal,
    /// An entry named an operation the journal does not recognize.
    NotImplemented,
    /// The underlying device reported an I/O failure.
    Io(IoErrorKind),
}

/// Coarse classification of a lower-layer I/O failure.
///
/// The journal itself never inspects the cause beyond recording it and
/// promoting to read-only; this enum exists so callers inspecting a
/// surfaced [`JournalError::Io`] get more than an opaque unit variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoErrorKind {
    /// The device rejected the write outright.
    WriteFailed,
    /// The device rejected the flush.
    FlushFailed,
    /// The device or partition went away.
    DeviceGone,
}

impl fmt::Display for JournalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JournalError::ReadOnly => write!(f, "recovery journal is read-only"),
            JournalError::JournalOverflow => {
                write!(f, "sequence number would exceed the 48-bit limit")
            }
            JournalError::JournalFull => {
                write!(f, "recovery journal is full and cannot record a decrement")
            }
            JournalError::InvalidAdminState => {
                write!(f, "operation attempted while journal is not in normal operation")
            }
            JournalError::CorruptJournal => write!(f, "on-disk journal content is corrupt"),
            JournalError::NotImplemented => write!(f, "unrecognized journal entry operation"),
            JournalError::Io(kind) => write!(f, "journal device I/O error: {kind:?}"),
        }
    }
}

impl core::error::Error for JournalError {}

/// Convenience alias used throughout the crate.
pub type JournalResult<T> = Result<T, JournalError>;

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;

    #[test]
    fn display_is_stable_and_non_empty() {
        for err in [
            JournalError::ReadOnly,
            JournalError::JournalOverflow,
            JournalError::JournalFull,
            JournalError::InvalidAdminState,
            JournalError::CorruptJournal,
            JournalError::NotImplemented,
            JournalError::Io(IoErrorKind::WriteFailed),
        ] {
            assert!(!format!("{err}").is_empty());
        }
    }
}
