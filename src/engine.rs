use crate::config::Config;
use crate::error::SessionError;
use crate::event::{self, Event};
use crate::outcome::Outcome;
use crate::pty::{ChildStatus, PtySession};
use crate::pty_reader::{ReadOutcome, read_chunk};
use crate::source::ByteSource;
use crate::watcher::PromptWatcher;
use nix::errno::Errno;
use nix::sys::select::{FdSet, pselect};
use nix::sys::signal::SigSet;
use std::os::fd::BorrowedFd;
use tracing::{debug, info, trace};

/// Bytes read from the terminal per wakeup.
const READ_BUFFER_SIZE: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Watching terminal output for prompts.
    Running,
    /// The handshake is over; waiting for the child to exit.
    Terminating,
    Done(ChildStatus),
}

/// Drives one authentication handshake to completion.
///
/// The engine owns the pty session, the prompt watcher and the password
/// source. It sleeps only inside `pselect`, with the controller's signals
/// unblocked for exactly that long.
pub struct Engine {
    session: PtySession,
    watcher: PromptWatcher,
    source: ByteSource,
    wait_mask: SigSet,
    state: State,
    outcome: Option<Outcome>,
}

/// Install the signal handling, launch `command` on a new pty and run the
/// handshake until the command exits.
pub fn run(config: Config, command: &str, args: &[String]) -> Result<Outcome, SessionError> {
    let wait_mask = event::install()?;
    let session = PtySession::launch(command, args)?;
    Engine::new(session, config, wait_mask).run()
}

impl Engine {
    /// Create an engine for an already launched session.
    ///
    /// `wait_mask` is the signal mask in effect while waiting for output, as
    /// returned by [`event::install`].
    pub fn new(session: PtySession, config: Config, wait_mask: SigSet) -> Self {
        let watcher = PromptWatcher::new(config.prompt);
        debug!(
            "searching for password prompt using match \"{}\"",
            String::from_utf8_lossy(watcher.prompt())
        );
        Engine {
            session,
            watcher,
            source: config.source,
            wait_mask,
            state: State::Running,
            outcome: None,
        }
    }

    /// Run until the child has been reaped and return how the run ended.
    pub fn run(mut self) -> Result<Outcome, SessionError> {
        loop {
            self.handle_events();
            match self.state {
                State::Running => {
                    self.wait_for_output()?;
                    if let Some(status) = self.session.try_wait()? {
                        self.state = State::Done(status);
                    }
                }
                State::Terminating => {
                    let status = self.session.wait()?;
                    self.state = State::Done(status);
                }
                State::Done(status) => return Ok(self.finish(status)),
            }
        }
    }

    /// Act on every signal that arrived since the last iteration.
    fn handle_events(&mut self) {
        for event in event::take_pending() {
            self.handle_event(event);
        }
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Resize => self.session.resize_from_tty(),
            Event::ChildExited => {}
            Event::Hangup | Event::Terminate => {
                info!("forwarding {} to pid {}", event.signal(), self.session.pid());
                self.session.kill(event.signal());
                self.terminate();
            }
            Event::Interrupt | Event::Suspend => {
                if let Some(byte) = event.control_byte() {
                    info!("passing {} to the terminal", event.signal());
                    self.session.write_master(&[byte]);
                }
                self.terminate();
            }
        }
    }

    fn terminate(&mut self) {
        if self.state == State::Running {
            self.state = State::Terminating;
        }
    }

    /// Sleep until the terminal has output or a signal arrives, then handle
    /// the output.
    fn wait_for_output(&mut self) -> Result<(), SessionError> {
        let Some(fd) = self.session.master_fd() else {
            self.terminate();
            return Ok(());
        };

        let ready = {
            // SAFETY: the session keeps the master open for this whole block.
            let master = unsafe { BorrowedFd::borrow_raw(fd) };
            let mut readable = FdSet::new();
            readable.insert(master);
            match pselect(None, &mut readable, None, None, None, &self.wait_mask) {
                Ok(n) => n > 0 && readable.contains(master),
                Err(Errno::EINTR) => false,
                Err(err) => return Err(SessionError::Select(err)),
            }
        };

        if ready {
            self.handle_output();
        }
        Ok(())
    }

    /// Read one chunk from the terminal and feed it to the prompt watcher.
    fn handle_output(&mut self) {
        let mut buffer = [0u8; READ_BUFFER_SIZE];
        let Some(master) = self.session.master() else {
            return;
        };

        let n = match read_chunk(master, &mut buffer) {
            ReadOutcome::Data(n) => n,
            ReadOutcome::WouldBlock => return,
            ReadOutcome::Closed => {
                debug!("terminal closed by the command");
                self.terminate();
                return;
            }
        };
        let chunk = &buffer[..n];
        trace!("read: {}", String::from_utf8_lossy(chunk));

        let verdict = self.watcher.scan(chunk);
        if verdict.reply {
            if let Some(master) = self.session.master() {
                self.source.provide(master);
            }
        }
        if let Some(outcome) = verdict.outcome {
            self.outcome = Some(outcome);
            // Hang up the command's controlling terminal so it gives up.
            self.session.close_terminal();
            self.terminate();
        }
    }

    fn finish(&self, status: ChildStatus) -> Outcome {
        debug!("command finished: {status:?}");
        exit_outcome(self.outcome, status)
    }
}

/// Combine the watcher's verdict with the child's exit status.
///
/// A protocol failure wins over whatever the child did afterwards.
pub fn exit_outcome(outcome: Option<Outcome>, status: ChildStatus) -> Outcome {
    match (outcome, status) {
        (Some(outcome), _) => outcome,
        (None, ChildStatus::Exited(code)) => Outcome::ChildExitStatus(code),
        (None, ChildStatus::Signaled(_)) => Outcome::ChildSignaled,
    }
}
