//! An mmap-backed memory allocator with free-list recycling and
//! reference-counted blocks.
//!
//! Every allocation is a dedicated anonymous mapping, prefixed by a
//! small header recording its size and reference count:
//!
//! ```text
//! +----------+----------------------+
//! |  Header  |  Actual memory block |
//! +----------+----------------------+
//!            ^ pointer returned to the caller
//! ```
//!
//! Freeing a block does not return it to the OS. Instead it is parked
//! in a size-sorted free list and handed out again to the next request
//! it fits (best-fit), so workloads that cycle through similar sizes
//! stop paying for a syscall on every allocation. Parked blocks are
//! only unmapped when the OS reports exhaustion and the allocator
//! evicts entries to make room.
//!
//! ```
//! use mapalloc::MemMap;
//!
//! let mut alloc = MemMap::new();
//!
//! let addr = alloc.allocate(64).unwrap();
//! unsafe {
//!     addr.as_ptr().write(7);
//!     assert_eq!(addr.as_ptr().read(), 7);
//!
//!     alloc.free(addr.as_ptr()).unwrap();
//! }
//! ```
//!
//! The allocator is strictly single-threaded: every operation takes
//! `&mut self` and runs to completion, and there is no internal locking.
//! Sharing a [`MemMap`] across threads is the caller's problem to
//! synchronize.

mod block;
mod error;
mod freelist;
mod list;
mod source;

pub use error::{AllocError, RawOsError};
pub use source::{MemorySource, OsSource};

use std::ptr::{self, NonNull};

use block::{HEADER_SIZE, Header};
use freelist::FreeList;

/// An allocator instance: a free list of recycled blocks plus the
/// memory source that backs fresh mappings.
///
/// Instances are independent; blocks must go back to the instance that
/// handed them out. The free list lives as long as the instance and is
/// never torn down: whatever it still parks when the instance goes away
/// stays mapped until the process exits.
pub struct MemMap<S: MemorySource = OsSource> {
    /// Blocks parked between free and reuse, ordered by size.
    free_list: FreeList,
    source: S,
}

impl MemMap<OsSource> {
    /// Creates an allocator backed by the platform's mapping facility.
    pub const fn new() -> Self {
        Self::with_source(OsSource)
    }
}

impl Default for MemMap<OsSource> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: MemorySource> MemMap<S> {
    /// Creates an allocator backed by an arbitrary [`MemorySource`].
    pub const fn with_source(source: S) -> Self {
        Self {
            free_list: FreeList::new(),
            source,
        }
    }

    /// Allocates `size` usable bytes and returns the address of the
    /// block's content. The block starts with a reference count of 1.
    ///
    /// The request is served from the free list when a parked block
    /// fits (best-fit; the block keeps its original, possibly larger,
    /// size). Otherwise a fresh mapping of `size` plus the header
    /// overhead is requested from the source. If the source reports
    /// exhaustion, free-list entries are evicted one at a time and the
    /// allocation retried until it succeeds or nothing is left to
    /// evict, in which case [`AllocError::OutOfMemory`] is returned.
    ///
    /// `size == 0` fails with [`AllocError::InvalidSize`] without
    /// touching the source. A `size` so large that adding the header
    /// overhead would overflow fails with [`AllocError::OutOfMemory`],
    /// also without touching the source.
    pub fn allocate(&mut self, size: usize) -> Result<NonNull<u8>, AllocError> {
        if size == 0 {
            return Err(AllocError::InvalidSize);
        }

        // A request this large cannot be backed by any mapping (the
        // header would not fit in the address space), and no parked
        // block can ever be big enough either.
        let Some(total) = size.checked_add(HEADER_SIZE) else {
            return Err(AllocError::OutOfMemory);
        };

        loop {
            if let Some(mut header) = unsafe { self.free_list.take_fit(&self.source, size)? } {
                unsafe {
                    // The stored size stays as-is: a recycled block may
                    // be larger than the request.
                    header.as_mut().ref_count = 1;

                    return Ok(Header::user_ptr(header));
                }
            }

            match unsafe { self.source.request(total) } {
                Ok(addr) => {
                    let header = addr.cast::<Header>();

                    unsafe {
                        header.as_ptr().write(Header { size, ref_count: 1 });

                        return Ok(Header::user_ptr(header));
                    }
                }
                Err(code) if self.source.is_exhausted(code) => {
                    // Evict one parked block and retry from the
                    // free-list query, as long as eviction makes
                    // progress.
                    if !unsafe { self.free_list.evict_one(&self.source)? } {
                        return Err(AllocError::OutOfMemory);
                    }
                }
                Err(code) => return Err(AllocError::Map(code)),
            }
        }
    }

    /// Like [`MemMap::allocate`], with all `size` bytes of the returned
    /// region set to zero. Recycled blocks carry whatever the previous
    /// holder wrote, so the region is always zeroed explicitly.
    pub fn allocate_zeroed(&mut self, size: usize) -> Result<NonNull<u8>, AllocError> {
        let addr = self.allocate(size)?;

        unsafe {
            ptr::write_bytes(addr.as_ptr(), 0, size);
        }

        Ok(addr)
    }

    /// Parks the block at `ptr` in the free list for reuse. No-op on a
    /// null pointer.
    ///
    /// The block's memory is not returned to the OS; it is retained for
    /// later requests and only unmapped if eviction ever reclaims it.
    /// Mapping the free-list node itself can fail, in which case the
    /// error is returned and the block is abandoned mid-free (neither
    /// reachable by the caller nor parked) with no rollback.
    ///
    /// **SAFETY**: `ptr` must be null or a pointer obtained from this
    /// instance's `allocate`/`allocate_zeroed` that has not been freed
    /// since.
    pub unsafe fn free(&mut self, ptr: *mut u8) -> Result<(), AllocError> {
        let Some(user) = NonNull::new(ptr) else {
            return Ok(());
        };

        unsafe {
            let header = Header::from_user(user);

            self.free_list.insert(&self.source, header)
        }
    }

    /// Registers one more holder of the block at `ptr` and returns the
    /// same pointer. No-op on a null pointer. No upper bound is
    /// enforced on the count.
    ///
    /// **SAFETY**: `ptr` must be null or point to a live block of this
    /// instance.
    pub unsafe fn retain(&mut self, ptr: *mut u8) -> *mut u8 {
        let Some(user) = NonNull::new(ptr) else {
            return ptr;
        };

        unsafe {
            let mut header = Header::from_user(user);
            header.as_mut().ref_count += 1;
        }

        ptr
    }

    /// Drops one holder of the block at `ptr`; when the last holder is
    /// gone the block is freed via [`MemMap::free`]. No-op on a null
    /// pointer.
    ///
    /// **SAFETY**: as in [`MemMap::retain`]; additionally the count
    /// must not already be zero.
    pub unsafe fn release(&mut self, ptr: *mut u8) -> Result<(), AllocError> {
        let Some(user) = NonNull::new(ptr) else {
            return Ok(());
        };

        unsafe {
            let mut header = Header::from_user(user);
            header.as_mut().ref_count -= 1;

            if header.as_ref().ref_count == 0 {
                return self.free(ptr);
            }
        }

        Ok(())
    }
}
