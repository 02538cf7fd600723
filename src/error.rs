use thiserror::Error;

/// Raw error code reported by the platform's mapping facility
/// (`errno` on unix, `GetLastError` on windows).
pub type RawOsError = i32;

/// Errors reported by the allocator.
///
/// Every fallible operation communicates failure through its return
/// value. Nothing in this crate panics on an OS failure: mapping and
/// unmapping errors carry the raw platform code so callers can inspect
/// the underlying cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
    /// A zero-sized allocation was requested. The OS is never asked
    /// for memory in this case.
    #[error("allocation size must be greater than zero")]
    InvalidSize,

    /// The OS reported memory exhaustion and the free list had nothing
    /// left to evict, so the request cannot make progress.
    #[error("out of memory")]
    OutOfMemory,

    /// Mapping fresh memory failed for a reason other than exhaustion.
    #[error("memory mapping failed (os error {0})")]
    Map(RawOsError),

    /// Returning memory to the OS failed. The free list may be left
    /// partially modified: the entry is unlinked before the unmap call,
    /// and there is no rollback.
    #[error("memory unmapping failed (os error {0})")]
    Unmap(RawOsError),
}
