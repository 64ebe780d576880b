use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};
use std::convert::Infallible;
use std::ffi::{CStr, CString};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

/// Whether `path` is a regular file the current user may execute.
///
/// Uses `access(X_OK)` so ACLs and the effective uid are honoured, which a
/// plain mode-bit check would miss when running as root.
pub fn is_executable(path: &Path) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => {}
        _ => return false,
    }
    let Ok(c_path) = CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    // SAFETY: c_path is a valid NUL-terminated string for the duration of the call.
    unsafe { libc::access(c_path.as_ptr(), libc::X_OK) == 0 }
}

/// Close every descriptor above stderr so nothing the bootstrapper opened
/// leaks into the service.
///
/// Linux tries `close_range(3, ~0)` first (5.9+). The BSDs use `closefrom(3)`.
/// Everything else walks `/dev/fd`, or brute-forces up to `_SC_OPEN_MAX`.
pub fn close_fds_above_stderr() {
    #[cfg(any(target_os = "freebsd", target_os = "openbsd", target_os = "netbsd"))]
    {
        // SAFETY: closefrom has no failure mode that affects memory safety.
        unsafe { libc::closefrom(3) };
    }

    #[cfg(not(any(target_os = "freebsd", target_os = "openbsd", target_os = "netbsd")))]
    {
        #[cfg(target_os = "linux")]
        {
            // SAFETY: raw syscall with plain integer arguments.
            let ret = unsafe { libc::syscall(libc::SYS_close_range, 3u32, u32::MAX, 0u32) };
            if ret == 0 {
                return;
            }
        }

        let fd_dir = if cfg!(target_os = "linux") { "/proc/self/fd" } else { "/dev/fd" };
        let listed: Option<Vec<i32>> = std::fs::read_dir(fd_dir).ok().map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter_map(|e| e.file_name().to_str().and_then(|s| s.parse::<i32>().ok()))
                .filter(|&fd| fd > 2)
                .collect()
        });

        match listed {
            Some(fds) => {
                for fd in fds {
                    // SAFETY: closing an fd we do not own afterwards; EBADF is harmless.
                    unsafe { libc::close(fd) };
                }
            }
            None => {
                // SAFETY: sysconf is always safe to call.
                let max_fd = unsafe { libc::sysconf(libc::_SC_OPEN_MAX) } as i32;
                let max_fd = if max_fd > 0 { max_fd } else { 1024 };
                for fd in 3..max_fd {
                    // SAFETY: see above.
                    unsafe { libc::close(fd) };
                }
            }
        }
    }
}

/// Put `signals` back to their default disposition.
///
/// Once a handler has been reset, a signal that arrives before the exec
/// terminates the process instead of being queued for a runtime that will
/// never read it again.
pub fn restore_default_signals(signals: &[Signal]) -> Result<(), nix::Error> {
    let default = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
    for &signal in signals {
        // SAFETY: SIG_DFL installs no Rust code as a handler
        unsafe { sigaction(signal, &default) }?;
    }
    Ok(())
}

/// Replace the current process image with `program`.
///
/// Only returns on failure. `argv` must already contain argv[0].
pub fn replace_process(
    program: &CStr,
    argv: &[CString],
    envp: &[CString],
) -> Result<Infallible, nix::Error> {
    nix::unistd::execve(program, argv, envp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn write_with_mode(dir: &Path, name: &str, mode: u32) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    #[test]
    fn executable_file_is_detected() {
        let temp = TempDir::new().unwrap();
        let path = write_with_mode(temp.path(), "run", 0o755);
        assert!(is_executable(&path));
    }

    #[test]
    fn default_disposition_is_restored() {
        // SIGURG is ignored by default, so nothing dies if this races
        let ignore = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());
        unsafe { sigaction(Signal::SIGURG, &ignore) }.unwrap();

        restore_default_signals(&[Signal::SIGURG]).unwrap();

        let previous = unsafe { sigaction(Signal::SIGURG, &ignore) }.unwrap();
        assert_eq!(previous.handler(), SigHandler::SigDfl);
        restore_default_signals(&[Signal::SIGURG]).unwrap();
    }

    #[test]
    fn directory_is_not_executable() {
        let temp = TempDir::new().unwrap();
        assert!(!is_executable(temp.path()));
    }

    #[test]
    fn missing_file_is_not_executable() {
        let temp = TempDir::new().unwrap();
        assert!(!is_executable(&temp.path().join("nope")));
    }

    #[test]
    fn plain_file_is_not_executable_for_unprivileged_users() {
        // root passes access(X_OK) only when some x bit is set, so 0o644 fails for everyone
        let temp = TempDir::new().unwrap();
        let path = write_with_mode(temp.path(), "data", 0o644);
        assert!(!is_executable(&path));
    }
}
