use crate::error::{LaunchError, SessionError};
use crate::event;
use crate::writer::reliable_write;
use nix::fcntl::{self, FcntlArg, OFlag};
use nix::pty::{PtyMaster, grantpt, posix_openpt, unlockpt};
use nix::sys::signal::{self, Signal};
use nix::sys::stat::Mode;
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::{self, ForkResult, Pid};
use std::ffi::{CStr, CString};
use std::fs::{File, OpenOptions};
use std::os::fd::{AsRawFd, FromRawFd, IntoRawFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use tracing::{debug, error, warn};

/// Exit status of a child that could not be set up or exec'd.
const CHILD_SETUP_FAILED: i32 = 3;

/// A freshly allocated pty master, granted and unlocked.
pub struct OpenedMaster {
    pub master: File,
    pub slave_path: String,
}

/// Allocates pseudo-terminals.
///
/// [`NativePtySystem`] is the real thing; anything else is a test double.
pub trait PtySystem {
    fn open_master(&self) -> Result<OpenedMaster, LaunchError>;
}

/// `posix_openpt` + `grantpt` + `unlockpt`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativePtySystem;

impl PtySystem for NativePtySystem {
    fn open_master(&self) -> Result<OpenedMaster, LaunchError> {
        let master =
            posix_openpt(OFlag::O_RDWR | OFlag::O_NOCTTY).map_err(LaunchError::OpenMaster)?;
        set_nonblocking(master.as_raw_fd()).map_err(LaunchError::Configure)?;
        grantpt(&master).map_err(LaunchError::Grant)?;
        unlockpt(&master).map_err(LaunchError::Unlock)?;
        let slave_path = slave_name(&master).map_err(LaunchError::SlaveName)?;

        // SAFETY: into_raw_fd hands over sole ownership of the descriptor.
        let master = unsafe { File::from_raw_fd(master.into_raw_fd()) };
        Ok(OpenedMaster { master, slave_path })
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn slave_name(master: &PtyMaster) -> nix::Result<String> {
    nix::pty::ptsname_r(master)
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn slave_name(master: &PtyMaster) -> nix::Result<String> {
    // SAFETY: single-threaded at this point; the static buffer is copied out
    // before anything else can call ptsname.
    unsafe { nix::pty::ptsname(master) }
}

fn set_nonblocking(fd: RawFd) -> nix::Result<()> {
    let flags = OFlag::from_bits_truncate(fcntl::fcntl(fd, FcntlArg::F_GETFL)?);
    fcntl::fcntl(fd, FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK))?;
    Ok(())
}

pub(crate) fn window_size(fd: RawFd) -> Option<libc::winsize> {
    let mut size = libc::winsize {
        ws_row: 0,
        ws_col: 0,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };
    // SAFETY: TIOCGWINSZ writes one winsize into the pointed-to struct.
    let rc = unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &mut size as *mut libc::winsize) };
    (rc == 0).then_some(size)
}

pub(crate) fn set_window_size(fd: RawFd, size: &libc::winsize) {
    // SAFETY: TIOCSWINSZ only reads the pointed-to struct.
    let rc = unsafe { libc::ioctl(fd, libc::TIOCSWINSZ, size as *const libc::winsize) };
    if rc != 0 {
        debug!(
            "failed to set terminal size: {}",
            std::io::Error::last_os_error()
        );
    }
}

/// How the child ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildStatus {
    Exited(i32),
    Signaled(Signal),
}

impl ChildStatus {
    fn from_wait(status: WaitStatus) -> Option<Self> {
        match status {
            WaitStatus::Exited(_, code) => Some(ChildStatus::Exited(code)),
            WaitStatus::Signaled(_, signal, _) => Some(ChildStatus::Signaled(signal)),
            _ => None,
        }
    }
}

/// A command running with a pseudo-terminal as its controlling tty.
///
/// The parent keeps its own slave descriptor open for as long as the master
/// is open. Linux treats a master without any open slave as broken and
/// `select` then reports it ready forever, which happens whenever the target
/// closes descriptors it does not recognise (as OpenSSH does).
pub struct PtySession {
    child: Pid,
    master: Option<File>,
    slave: Option<File>,
    /// The caller's own terminal, used to mirror window size changes.
    tty: Option<File>,
}

impl PtySession {
    /// Run `command` with `args` on a new native pseudo-terminal.
    pub fn launch(command: &str, args: &[String]) -> Result<Self, LaunchError> {
        Self::launch_with(&NativePtySystem, command, args)
    }

    /// Run `command` with `args` on a terminal allocated by `system`.
    ///
    /// Allocation failures are returned before anything is forked. Failures
    /// inside the child (including a command that cannot be executed) make it
    /// exit with status 3, which the caller sees when reaping it.
    pub fn launch_with(
        system: &dyn PtySystem,
        command: &str,
        args: &[String],
    ) -> Result<Self, LaunchError> {
        if command.is_empty() {
            return Err(LaunchError::EmptyCommand);
        }
        let program = CString::new(command)?;
        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push(program.clone());
        for arg in args {
            argv.push(CString::new(arg.as_str())?);
        }

        let OpenedMaster { master, slave_path } = system.open_master()?;
        let slave_cpath = CString::new(slave_path.as_str())?;

        let tty = OpenOptions::new().read(true).open("/dev/tty").ok();
        let tty = tty.and_then(|tty| {
            let size = window_size(tty.as_raw_fd())?;
            set_window_size(master.as_raw_fd(), &size);
            Some(tty)
        });

        // SAFETY: the controller is single-threaded, so the child may run
        // arbitrary code before exec.
        match unsafe { unistd::fork() }.map_err(LaunchError::Fork)? {
            ForkResult::Child => {
                let inherited = [Some(master.as_raw_fd()), tty.as_ref().map(|t| t.as_raw_fd())];
                exec_child(&slave_cpath, &program, &argv, &inherited)
            }
            ForkResult::Parent { child } => {
                debug!("started {command} as pid {child} on {slave_path}");
                let slave = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .custom_flags(libc::O_NOCTTY)
                    .open(&slave_path)
                    .map_err(|err| warn!("Failed to open terminal slave {slave_path}: {err}"))
                    .ok();
                Ok(PtySession {
                    child,
                    master: Some(master),
                    slave,
                    tty,
                })
            }
        }
    }

    /// A session around descriptors the caller already has, with no slave.
    #[cfg(test)]
    pub(crate) fn from_parts(child: Pid, master: File, tty: Option<File>) -> Self {
        PtySession {
            child,
            master: Some(master),
            slave: None,
            tty,
        }
    }

    pub fn pid(&self) -> Pid {
        self.child
    }

    pub fn master(&mut self) -> Option<&mut File> {
        self.master.as_mut()
    }

    pub fn master_fd(&self) -> Option<RawFd> {
        self.master.as_ref().map(|m| m.as_raw_fd())
    }

    /// Type bytes into the terminal. Does nothing once the terminal is closed.
    pub fn write_master(&mut self, data: &[u8]) {
        if let Some(master) = self.master.as_mut() {
            reliable_write(master, data);
        }
    }

    /// Copy the caller's current window size onto the pty.
    pub fn resize_from_tty(&self) {
        let (Some(tty), Some(master)) = (&self.tty, &self.master) else {
            return;
        };
        if let Some(size) = window_size(tty.as_raw_fd()) {
            debug!("resizing terminal to {}x{}", size.ws_col, size.ws_row);
            set_window_size(master.as_raw_fd(), &size);
        }
    }

    /// Close master and slave together, which hangs up the child's
    /// controlling terminal.
    pub fn close_terminal(&mut self) {
        self.master.take();
        self.slave.take();
    }

    pub fn kill(&self, signal: Signal) {
        if let Err(err) = signal::kill(self.child, signal) {
            warn!("failed to send {signal} to pid {}: {err}", self.child);
        }
    }

    /// Collect the child's status if it has already ended.
    pub fn try_wait(&self) -> Result<Option<ChildStatus>, SessionError> {
        loop {
            match waitpid(self.child, Some(WaitPidFlag::WNOHANG)) {
                Ok(status) => return Ok(ChildStatus::from_wait(status)),
                Err(nix::Error::EINTR) => continue,
                Err(err) => return Err(SessionError::Wait(err)),
            }
        }
    }

    /// Block until the child ends.
    pub fn wait(&self) -> Result<ChildStatus, SessionError> {
        loop {
            match waitpid(self.child, None) {
                Ok(status) => {
                    if let Some(status) = ChildStatus::from_wait(status) {
                        return Ok(status);
                    }
                }
                Err(nix::Error::EINTR) => continue,
                Err(err) => return Err(SessionError::Wait(err)),
            }
        }
    }
}

/// Runs in the forked child: take the slave as controlling terminal and
/// exec the command. Never returns.
fn exec_child(slave_path: &CStr, program: &CStr, argv: &[CString], inherited: &[Option<RawFd>]) -> ! {
    if let Err(err) = event::reset_for_child() {
        debug!("failed to reset signal state in child: {err}");
    }

    if let Err(err) = unistd::setsid() {
        child_fail(format_args!("Failed to start a new session: {err}"));
    }

    let slave = match fcntl::open(slave_path, OFlag::O_RDWR, Mode::empty()) {
        Ok(fd) => fd,
        Err(err) => child_fail(format_args!("Failed to open terminal slave: {err}")),
    };

    // Opening the slave is not enough to acquire it on every platform.
    // SAFETY: TIOCSCTTY takes an integer argument and touches no memory.
    if unsafe { libc::ioctl(slave, libc::TIOCSCTTY as _, 0) } == -1 {
        child_fail(format_args!(
            "Failed to set controlling terminal in child (TIOCSCTTY): {}",
            std::io::Error::last_os_error()
        ));
    }

    let _ = unistd::close(slave);
    for fd in inherited.iter().flatten() {
        let _ = unistd::close(*fd);
    }

    let err = match unistd::execvp(program, argv) {
        Err(err) => err,
        Ok(never) => match never {},
    };
    child_fail(format_args!(
        "Failed to run command {}: {err}",
        program.to_string_lossy()
    ))
}

fn child_fail(message: std::fmt::Arguments<'_>) -> ! {
    error!("{message}");
    // SAFETY: _exit skips destructors and atexit handlers, which belong to
    // the parent's copy of the process state.
    unsafe { libc::_exit(CHILD_SETUP_FAILED) }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoPty;

    impl PtySystem for NoPty {
        fn open_master(&self) -> Result<OpenedMaster, LaunchError> {
            Err(LaunchError::OpenMaster(nix::Error::ENOENT))
        }
    }

    struct Unlockless;

    impl PtySystem for Unlockless {
        fn open_master(&self) -> Result<OpenedMaster, LaunchError> {
            Err(LaunchError::Unlock(nix::Error::EINVAL))
        }
    }

    #[test]
    fn test_allocation_failure_is_reported_before_fork() {
        let err = PtySession::launch_with(&NoPty, "true", &[])
            .err()
            .expect("launch should fail");
        assert!(matches!(err, LaunchError::OpenMaster(_)));
        assert_eq!(crate::Outcome::from(&err).exit_code(), 3);
    }

    #[test]
    fn test_unlock_failure_is_reported() {
        let err = PtySession::launch_with(&Unlockless, "true", &[])
            .err()
            .expect("launch should fail");
        assert!(err.to_string().contains("unlock"));
    }

    #[test]
    fn test_interior_nul_rejected_before_allocation() {
        let err = PtySession::launch_with(&NoPty, "tr\0ue", &[])
            .err()
            .expect("launch should fail");
        assert!(matches!(err, LaunchError::InvalidArgument(_)));
    }

    #[test]
    fn test_empty_command_rejected() {
        let err = PtySession::launch_with(&NoPty, "", &[])
            .err()
            .expect("launch should fail");
        assert!(matches!(err, LaunchError::EmptyCommand));
    }

    #[test]
    fn test_native_master_is_usable() {
        let opened = match NativePtySystem.open_master() {
            Ok(opened) => opened,
            // Sandboxes without /dev/ptmx cannot run this test.
            Err(_) => return,
        };
        assert!(opened.slave_path.starts_with("/dev/"));
        let flags = fcntl::fcntl(opened.master.as_raw_fd(), FcntlArg::F_GETFL).unwrap();
        assert!(OFlag::from_bits_truncate(flags).contains(OFlag::O_NONBLOCK));
    }

    #[test]
    fn test_child_status_from_wait() {
        let pid = Pid::from_raw(1);
        assert_eq!(
            ChildStatus::from_wait(WaitStatus::Exited(pid, 4)),
            Some(ChildStatus::Exited(4))
        );
        assert_eq!(
            ChildStatus::from_wait(WaitStatus::Signaled(pid, Signal::SIGKILL, false)),
            Some(ChildStatus::Signaled(Signal::SIGKILL))
        );
        assert_eq!(ChildStatus::from_wait(WaitStatus::StillAlive), None);
    }
}
