use std::{mem, ptr::NonNull};

use crate::{
    block::Header,
    error::AllocError,
    list::{List, Node},
    source::MemorySource,
};

/// Size of the mapping that backs one free-list node.
const NODE_SIZE: usize = mem::size_of::<Node<NonNull<Header>>>();

/// List of blocks that have been freed and are available for reuse.
///
/// Entries are kept ordered by **descending** block size (head =
/// largest), which makes best-fit a single linear scan: the match is the
/// last entry that is still large enough. Each entry holds a non-owning
/// back-reference to the block's [`Header`]; the list decides when a
/// block's mapping is finally returned to the OS (eviction) but does not
/// otherwise own the block's lifetime.
///
/// ```text
///        head                                  tail
///     +--------+      +--------+      +--------+
///     | size 50| <--> | size 30| <--> | size 10|
///     +---|----+      +---|----+      +---|----+
///         |               |               |
///         v               v               v
///      [Header]        [Header]        [Header]     (parked blocks)
/// ```
///
/// Node storage cannot come from the global allocator (we *are* the
/// allocator), so every node lives in its own small mapping requested
/// from the [`MemorySource`] and released when the entry goes away.
///
/// Freed blocks are retained indefinitely: nothing here returns a
/// block's memory to the OS on insert. Release only happens through
/// [`FreeList::evict_one`] when the allocator is under memory pressure.
/// That retention is the point of the free list, not a leak.
pub(crate) struct FreeList {
    /// Entries, each pointing at a parked block's header.
    items: List<NonNull<Header>>,
}

impl FreeList {
    pub const fn new() -> Self {
        Self { items: List::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Inserts a freed `block` keeping the descending-size order: linear
    /// scan from the head to the first entry not larger than the block,
    /// splice in front of it, or append at the tail.
    ///
    /// The node's mapping is requested from `source`; if that fails the
    /// insert is abandoned and the error propagated. The block is then
    /// unreachable (neither held by a caller nor parked here), which is
    /// the accepted outcome of a failed free.
    ///
    /// **SAFETY**: `block` must point to a live block header not already
    /// present in the list.
    pub unsafe fn insert<S: MemorySource>(
        &mut self,
        source: &S,
        block: NonNull<Header>,
    ) -> Result<(), AllocError> {
        let size = unsafe { block.as_ref().size };

        let mut position = None;
        let mut current = self.items.first();
        while let Some(node) = current {
            unsafe {
                if node.as_ref().data.as_ref().size <= size {
                    position = Some(node);
                    break;
                }

                current = node.as_ref().next;
            }
        }

        let addr = unsafe { source.request(NODE_SIZE) }.map_err(AllocError::Map)?;

        unsafe {
            match position {
                Some(before) => self.items.insert_before(before, block, addr),
                None => self.items.append(block, addr),
            };
        }

        Ok(())
    }

    /// Best-fit search: removes and returns the smallest parked block
    /// whose size is at least `size`, or `None` if no entry qualifies.
    ///
    /// Scanning the descending list, the candidate is the last entry
    /// still large enough; an exact match ends the scan early. On a hit
    /// the entry is spliced out and its node mapping released. If that
    /// release fails the block is already unlinked and gets lost; the
    /// error is surfaced and no rollback is attempted.
    ///
    /// **SAFETY**: `source` must be the source the node mappings were
    /// requested from.
    pub unsafe fn take_fit<S: MemorySource>(
        &mut self,
        source: &S,
        size: usize,
    ) -> Result<Option<NonNull<Header>>, AllocError> {
        let mut best = None;
        let mut current = self.items.first();
        while let Some(node) = current {
            unsafe {
                let entry_size = node.as_ref().data.as_ref().size;
                if entry_size < size {
                    break;
                }

                best = Some(node);
                if entry_size == size {
                    break;
                }

                current = node.as_ref().next;
            }
        }

        let Some(node) = best else {
            return Ok(None);
        };

        unsafe {
            let block = node.as_ref().data;
            self.items.remove(node);
            source
                .release(node.cast::<u8>(), NODE_SIZE)
                .map_err(AllocError::Unmap)?;

            Ok(Some(block))
        }
    }

    /// Evicts the head entry under memory pressure: unmaps the parked
    /// block's full mapping (header included) and the node's own
    /// mapping. Returns whether an entry was evicted, so the caller
    /// knows if retrying an allocation can make progress.
    ///
    /// The head is the largest parked block, the one whose release
    /// relieves the most pressure in a single step.
    ///
    /// **SAFETY**: as in [`FreeList::take_fit`].
    pub unsafe fn evict_one<S: MemorySource>(&mut self, source: &S) -> Result<bool, AllocError> {
        let Some(node) = self.items.first() else {
            return Ok(false);
        };

        unsafe {
            let block = node.as_ref().data;
            let block_len = block.as_ref().mapped_len();

            self.items.remove(node);
            source
                .release(block.cast::<u8>(), block_len)
                .map_err(AllocError::Unmap)?;
            source
                .release(node.cast::<u8>(), NODE_SIZE)
                .map_err(AllocError::Unmap)?;
        }

        Ok(true)
    }

    /// Sizes of the parked blocks in head-to-tail order.
    #[cfg(test)]
    pub fn sizes(&self) -> Vec<usize> {
        self.items
            .iter()
            .map(|block| unsafe { block.as_ref().size })
            .collect()
    }
}
