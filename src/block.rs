use std::{mem, ptr::NonNull};

/// Size in bytes of the metadata that precedes every allocation.
pub(crate) const HEADER_SIZE: usize = mem::size_of::<Header>();

/// Per-block metadata. Every allocation handed to the caller is preceded
/// by one of these, so the memory actually mapped for a request of `size`
/// bytes looks like this:
///
/// ```text
/// +---------------------+ <------+
/// |        size         |        |
/// +---------------------+        | -> Header
/// |      ref_count      |        |
/// +---------------------+ <------+ <--- pointer returned to the caller
/// |       Content       |        |
/// |         ...         |        | -> size addressable bytes
/// |         ...         |        |
/// +---------------------+ <------+
/// ```
///
/// The caller only ever sees the content address. Recovering the header
/// from it is a fixed subtraction and is unchecked: handing a pointer
/// that did not come out of this allocator to [`Header::from_user`] is
/// undefined behavior.
pub(crate) struct Header {
    /// Usable bytes requested by the caller. Excludes the header itself.
    /// When a block is recycled from the free list this may exceed the
    /// new request.
    pub size: usize,
    /// Number of active holders of the block. Starts at 1 on allocation;
    /// the block is freed when it drops back to zero. Only meaningful
    /// while the block is held by a caller.
    pub ref_count: usize,
}

impl Header {
    /// Recovers the header from the address handed to the caller.
    ///
    /// **SAFETY**: `user` must be a pointer previously returned by this
    /// allocator and not yet freed.
    pub unsafe fn from_user(user: NonNull<u8>) -> NonNull<Header> {
        unsafe { NonNull::new_unchecked(user.cast::<Header>().as_ptr().sub(1)) }
    }

    /// Address of the content that follows `header`, the one the caller
    /// receives.
    ///
    /// **SAFETY**: `header` must point to a live block header.
    pub unsafe fn user_ptr(header: NonNull<Header>) -> NonNull<u8> {
        unsafe { NonNull::new_unchecked(header.as_ptr().add(1)).cast() }
    }

    /// Full length of the mapping that backs this block, header included.
    /// This is the length handed back to the OS when the block is evicted.
    pub fn mapped_len(&self) -> usize {
        self.size + HEADER_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_pointer_round_trip() {
        // usize storage so the header's alignment is respected.
        let mut backing = [0usize; 8];
        let header = NonNull::new(backing.as_mut_ptr().cast::<Header>()).unwrap();

        unsafe {
            header.as_ptr().write(Header { size: 24, ref_count: 1 });

            let user = Header::user_ptr(header);
            assert_eq!(
                user.as_ptr(),
                backing.as_mut_ptr().cast::<u8>().add(HEADER_SIZE)
            );
            assert_eq!(Header::from_user(user), header);
        }
    }

    #[test]
    fn mapped_len_includes_header() {
        let header = Header { size: 100, ref_count: 1 };
        assert_eq!(header.mapped_len(), 100 + HEADER_SIZE);
    }
}
