#![deny(missing_docs)]

//! # Overview
//!
//! Copies a single file's bytes from source to destination. On Linux this
//! tries `copy_file_range` first (zero-copy, stays in kernel space) and falls
//! back to a buffered read/write loop when the syscall is unavailable (cross
//! filesystem, unsupported filesystem, or any other `EXDEV`/`ENOSYS`-class
//! failure).

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use errors::{MigrationError, COPY_001};

const BUFFER_SIZE: usize = 256 * 1024;

/// Copies `source` to `dest`, creating or truncating `dest`. Parent
/// directories must already exist; the engine creates them via
/// [`std::fs::create_dir_all`] before calling this function.
pub fn copy_file(source: &Path, dest: &Path) -> Result<u64, MigrationError> {
    let src_file = File::open(source).map_err(|e| {
        MigrationError::new(COPY_001, format!("failed to open source {}", source.display())).with_cause(&e)
    })?;
    let dest_file = File::create(dest).map_err(|e| {
        MigrationError::new(COPY_001, format!("failed to create destination {}", dest.display()))
            .with_cause(&e)
    })?;

    #[cfg(target_os = "linux")]
    {
        if let Some(copied) = try_copy_file_range(&src_file, &dest_file) {
            return copied.map_err(|e| {
                MigrationError::new(COPY_001, format!("copy_file_range failed for {}", source.display()))
                    .with_cause(&e)
            });
        }
    }

    buffered_copy(src_file, dest_file)
        .map_err(|e| MigrationError::new(COPY_001, format!("failed to copy {}", source.display())).with_cause(&e))
}

fn buffered_copy(src_file: File, dest_file: File) -> io::Result<u64> {
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, src_file);
    let mut writer = BufWriter::with_capacity(BUFFER_SIZE, dest_file);
    let mut buf = vec![0u8; BUFFER_SIZE];
    let mut total = 0u64;

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n])?;
        total += n as u64;
    }
    writer.flush()?;
    Ok(total)
}

#[cfg(target_os = "linux")]
fn try_copy_file_range(src_file: &File, dest_file: &File) -> Option<io::Result<u64>> {
    use std::os::unix::io::AsRawFd;

    let len = src_file.metadata().ok()?.len();
    if len == 0 {
        return Some(Ok(0));
    }

    let mut remaining = len;
    let mut total = 0u64;
    loop {
        if remaining == 0 {
            break;
        }
        // SAFETY: both file descriptors are valid for the duration of this call and
        // the offsets are passed as null, letting the kernel track each file's position.
        let result = unsafe {
            libc::copy_file_range(
                src_file.as_raw_fd(),
                std::ptr::null_mut(),
                dest_file.as_raw_fd(),
                std::ptr::null_mut(),
                remaining as usize,
                0,
            )
        };
        if result < 0 {
            let err = io::Error::last_os_error();
            if total == 0 {
                // Nothing copied yet: fall back to the buffered path entirely.
                return None;
            }
            return Some(Err(err));
        }
        if result == 0 {
            break;
        }
        total += result as u64;
        remaining -= result as u64;
    }
    Some(Ok(total))
}
