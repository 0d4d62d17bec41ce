//! Tiny libc FFI surface for POSIX named pipes. Kept to two small `unsafe`
//! helpers so the rest of the store never touches raw syscalls directly.

use std::ffi::CString;
use std::io;
use std::path::Path;

/// Creates a named pipe at `path` with mode `0o600`. Fails with
/// `AlreadyExists` if something is already there.
pub fn mkfifo(path: &Path) -> io::Result<()> {
    let c_path = path_to_cstring(path)?;

    // SAFETY: `c_path` is a valid NUL-terminated C string for the duration
    // of the call; `mkfifo(2)` does not retain the pointer afterwards.
    let rc = unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// True if `path` names a FIFO (vs. a regular file or nothing).
pub fn is_fifo(path: &Path) -> bool {
    use std::os::unix::fs::FileTypeExt;
    std::fs::symlink_metadata(path)
        .map(|m| m.file_type().is_fifo())
        .unwrap_or(false)
}

fn path_to_cstring(path: &Path) -> io::Result<CString> {
    use std::os::unix::ffi::OsStrExt;
    CString::new(path.as_os_str().as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains a NUL byte"))
}
