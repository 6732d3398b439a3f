//! Page cache and allocation hints
//!
//! On Linux these wrap `fadvise`, `madvise` and `fallocate` through `rustix`.
//! Elsewhere they do nothing (or fall back to a plain mapping). All hints are
//! best effort and their failures are ignored.

use memmap2::Mmap;
use std::fs::File;
use std::io;
#[cfg(target_os = "linux")]
use std::num::NonZeroU64;

/// Tell the kernel an archive file is about to be read front to back
#[cfg(target_os = "linux")]
pub fn advise_sequential_read(file: &File, len: u64) {
    use rustix::fs::{Advice, fadvise};

    let _ = fadvise(file, 0, NonZeroU64::new(len), Advice::Sequential);
    let _ = fadvise(file, 0, NonZeroU64::new(len), Advice::WillNeed);
}

#[cfg(not(target_os = "linux"))]
pub fn advise_sequential_read(_file: &File, _len: u64) {}

/// Memory-map a whole archive for reading, with read-ahead advice
pub fn map_archive(file: &File) -> io::Result<Mmap> {
    // SAFETY: the mapping is read-only; an archive truncated by another
    // process while mapped is outside what the tool guards against
    let mmap = unsafe { Mmap::map(file) }?;

    #[cfg(target_os = "linux")]
    {
        use rustix::mm::{Advice, madvise};

        // SAFETY: pointer and length describe the mapping created above
        unsafe {
            let ptr = mmap.as_ptr() as *mut std::ffi::c_void;
            let _ = madvise(ptr, mmap.len(), Advice::Sequential);
            let _ = madvise(ptr, mmap.len(), Advice::WillNeed);
        }
    }

    Ok(mmap)
}

/// Reserve `size` bytes for an output file whose final length is known
#[cfg(target_os = "linux")]
pub fn reserve_space(file: &File, size: u64) {
    use rustix::fs::{FallocateFlags, fallocate};

    if size > 0 {
        let _ = fallocate(file, FallocateFlags::KEEP_SIZE, 0, size);
    }
}

#[cfg(not(target_os = "linux"))]
pub fn reserve_space(_file: &File, _size: u64) {}

/// Drop the written range of an output file from the page cache
#[cfg(target_os = "linux")]
pub fn release_cache(file: &File, len: u64) {
    use rustix::fs::{Advice, fadvise};

    let _ = fadvise(file, 0, NonZeroU64::new(len), Advice::DontNeed);
}

#[cfg(not(target_os = "linux"))]
pub fn release_cache(_file: &File, _len: u64) {}
