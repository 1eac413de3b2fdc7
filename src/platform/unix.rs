//! Unix implementations of platform helpers.
//!
//! `ParentDir` keeps an open descriptor on the directory that contains the
//! target path. Creation, rename and unlink all go through `*at` syscalls on
//! that descriptor, so a rename of an intermediate directory between steps
//! cannot redirect them, and the same descriptor is fsync-ed to make the
//! rename durable.

use std::ffi::{CString, OsStr};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, IntoRawFd};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

fn to_cstring(name: &OsStr) -> io::Result<CString> {
    CString::new(name.as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "name contains a NUL byte"))
}

fn cvt(ret: libc::c_int) -> io::Result<libc::c_int> {
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret)
    }
}

/// Close a file, surfacing the `close(2)` result that `Drop` would swallow.
///
/// The descriptor is released even when an error is returned.
pub fn close_file(file: File) -> io::Result<()> {
    let fd = file.into_raw_fd();
    cvt(unsafe { libc::close(fd) }).map(drop)
}

#[derive(Debug)]
pub struct ParentDir {
    dir: File,
    path: PathBuf,
}

impl ParentDir {
    pub fn open(path: &Path) -> io::Result<Self> {
        let dir = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_DIRECTORY | libc::O_CLOEXEC)
            .open(path)?;
        Ok(Self {
            dir,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create `name` with `O_CREAT | O_EXCL`; fails with `AlreadyExists` if taken.
    pub fn create_new_file(&self, name: &OsStr, mode: u32) -> io::Result<File> {
        let c_name = to_cstring(name)?;
        let flags = libc::O_RDWR | libc::O_CREAT | libc::O_EXCL | libc::O_CLOEXEC;
        let fd = cvt(unsafe {
            libc::openat(
                self.dir.as_raw_fd(),
                c_name.as_ptr(),
                flags,
                mode as libc::c_uint,
            )
        })?;
        Ok(unsafe { File::from_raw_fd(fd) })
    }

    pub fn rename(&self, from: &OsStr, to: &OsStr) -> io::Result<()> {
        let c_from = to_cstring(from)?;
        let c_to = to_cstring(to)?;
        let fd = self.dir.as_raw_fd();
        cvt(unsafe { libc::renameat(fd, c_from.as_ptr(), fd, c_to.as_ptr()) }).map(drop)
    }

    pub fn remove_file(&self, name: &OsStr) -> io::Result<()> {
        let c_name = to_cstring(name)?;
        cvt(unsafe { libc::unlinkat(self.dir.as_raw_fd(), c_name.as_ptr(), 0) }).map(drop)
    }

    /// fsync the directory itself, persisting entries created or renamed in it.
    pub fn sync(&self) -> io::Result<()> {
        self.dir.sync_all()
    }

    pub fn close(self) -> io::Result<()> {
        close_file(self.dir)
    }
}

/// Rename `from` to `to`, failing with `AlreadyExists` instead of replacing
/// an existing entry at `to`.
#[cfg(all(target_os = "linux", target_env = "gnu"))]
pub fn rename_noreplace(from: &Path, to: &Path) -> io::Result<()> {
    let c_from = to_cstring(from.as_os_str())?;
    let c_to = to_cstring(to.as_os_str())?;
    let ret = unsafe {
        libc::renameat2(
            libc::AT_FDCWD,
            c_from.as_ptr(),
            libc::AT_FDCWD,
            c_to.as_ptr(),
            libc::RENAME_NOREPLACE,
        )
    };
    match cvt(ret) {
        Ok(_) => Ok(()),
        // Filesystem without RENAME_NOREPLACE support.
        Err(e) if e.raw_os_error() == Some(libc::EINVAL) => rename_checked(from, to),
        Err(e) => Err(e),
    }
}

#[cfg(not(all(target_os = "linux", target_env = "gnu")))]
pub fn rename_noreplace(from: &Path, to: &Path) -> io::Result<()> {
    rename_checked(from, to)
}

/// Best-effort no-replace rename: racy between the check and the rename.
fn rename_checked(from: &Path, to: &Path) -> io::Result<()> {
    if fs::symlink_metadata(to).is_ok() {
        return Err(io::Error::from(io::ErrorKind::AlreadyExists));
    }
    fs::rename(from, to)
}

/// Open log file for appending; set 0600 only when creating a new file.
/// If the file already exists, its permissions are left alone.
pub fn open_log_file_secure_append(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let existed = path.exists();
    let f = OpenOptions::new()
        .create(true)
        .append(true)
        .mode(0o600)
        .open(path)?;
    if !existed {
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
    }
    Ok(f)
}

/// Add `bits` to the permission bits of `path` (never follows symlinks).
///
/// Returns whether a change was made.
pub fn ensure_mode_bits(path: &Path, bits: u32) -> io::Result<bool> {
    let meta = fs::symlink_metadata(path)?;
    if meta.file_type().is_symlink() {
        return Ok(false);
    }
    let mode = meta.permissions().mode() & 0o7777;
    if mode & bits == bits {
        return Ok(false);
    }
    fs::set_permissions(path, fs::Permissions::from_mode(mode | bits))?;
    Ok(true)
}
