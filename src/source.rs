use std::ptr::NonNull;

use crate::error::RawOsError;

/// Provider of page-granular memory regions.
///
/// The allocator has nothing to do with the concrete APIs offered by
/// each platform, so all it sees is this trait: regions can be requested
/// and released independently, and failures come back as the platform's
/// raw error code. [`OsSource`] is the real implementation; tests swap
/// in a double to observe calls and inject failures.
pub trait MemorySource {
    /// Requests a fresh region of `len` bytes, readable and writable.
    ///
    /// **SAFETY**: `len` must be greater than zero.
    unsafe fn request(&self, len: usize) -> Result<NonNull<u8>, RawOsError>;

    /// Returns the region of `len` bytes starting at `addr` to the OS.
    ///
    /// **SAFETY**: `addr`/`len` must describe a region previously
    /// obtained from [`MemorySource::request`] and not yet released.
    unsafe fn release(&self, addr: NonNull<u8>, len: usize) -> Result<(), RawOsError>;

    /// Tells whether `code` means the OS ran out of memory, the one
    /// failure the allocator can try to recover from by evicting free
    /// blocks.
    fn is_exhausted(&self, code: RawOsError) -> bool;
}

/// The platform's anonymous-memory-mapping facility.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsSource;

#[cfg(unix)]
mod unix {
    use std::{
        os::raw::{c_int, c_void},
        ptr::NonNull,
    };

    use libc::{mmap, munmap, off_t, size_t};

    use super::{MemorySource, OsSource};
    use crate::error::RawOsError;

    fn last_os_error() -> RawOsError {
        std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
    }

    impl MemorySource for OsSource {
        unsafe fn request(&self, len: usize) -> Result<NonNull<u8>, RawOsError> {
            // mmap parameters.
            const ADDR: *mut c_void = std::ptr::null_mut::<c_void>();
            // Read-Write only memory.
            const PROT: c_int = libc::PROT_READ | libc::PROT_WRITE;
            const FLAGS: c_int = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS;
            const FD: c_int = -1;
            const OFFSET: off_t = 0;

            unsafe {
                match mmap(ADDR, len as size_t, PROT, FLAGS, FD, OFFSET) {
                    libc::MAP_FAILED => Err(last_os_error()),
                    addr => Ok(NonNull::new_unchecked(addr).cast::<u8>()),
                }
            }
        }

        unsafe fn release(&self, addr: NonNull<u8>, len: usize) -> Result<(), RawOsError> {
            unsafe {
                if munmap(addr.as_ptr().cast::<c_void>(), len as size_t) == -1 {
                    return Err(last_os_error());
                }
            }

            Ok(())
        }

        fn is_exhausted(&self, code: RawOsError) -> bool {
            code == libc::ENOMEM
        }
    }
}

#[cfg(windows)]
mod windows {
    use std::ptr::NonNull;

    use windows::Win32::{Foundation, System::Memory};

    use super::{MemorySource, OsSource};
    use crate::error::RawOsError;

    fn last_os_error() -> RawOsError {
        unsafe { Foundation::GetLastError().0 as RawOsError }
    }

    impl MemorySource for OsSource {
        unsafe fn request(&self, len: usize) -> Result<NonNull<u8>, RawOsError> {
            // Read-Write only.
            let protection = Memory::PAGE_READWRITE;
            let flags = Memory::MEM_RESERVE | Memory::MEM_COMMIT;

            unsafe {
                let addr = Memory::VirtualAlloc(None, len, flags, protection);

                NonNull::new(addr.cast::<u8>()).ok_or_else(last_os_error)
            }
        }

        unsafe fn release(&self, addr: NonNull<u8>, _len: usize) -> Result<(), RawOsError> {
            unsafe {
                if Memory::VirtualFree(addr.as_ptr().cast(), 0, Memory::MEM_RELEASE).is_err() {
                    return Err(last_os_error());
                }
            }

            Ok(())
        }

        fn is_exhausted(&self, code: RawOsError) -> bool {
            let code = code as u32;

            code == Foundation::ERROR_NOT_ENOUGH_MEMORY.0
                || code == Foundation::ERROR_OUTOFMEMORY.0
                || code == Foundation::ERROR_COMMITMENT_LIMIT.0
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_release_round_trip() {
        let source = OsSource;

        unsafe {
            let addr = source.request(128).expect("fresh mapping");

            // The region must be usable.
            addr.as_ptr().write(0xAB);
            assert_eq!(addr.as_ptr().read(), 0xAB);

            source.release(addr, 128).expect("unmapping");
        }
    }

    #[cfg(unix)]
    #[test]
    fn exhaustion_is_enomem_only() {
        let source = OsSource;

        assert!(source.is_exhausted(libc::ENOMEM));
        assert!(!source.is_exhausted(libc::EINVAL));
        assert!(!source.is_exhausted(0));
    }
}
