//! Best-effort writes into the terminal.

use std::io::{ErrorKind, Write};
use tracing::warn;

/// Write `data` to `dest` with a single write call.
///
/// A short write or a write error is reported and otherwise ignored: the
/// handshake carries on and lets the target fail on its own terms. Returns
/// the number of bytes actually written.
pub fn reliable_write<W: Write + ?Sized>(dest: &mut W, data: &[u8]) -> usize {
    let result = loop {
        match dest.write(data) {
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            other => break other,
        }
    };

    match result {
        Ok(written) if written == data.len() => written,
        Ok(written) => {
            warn!(
                "Short write. Tried to write {}, only wrote {}",
                data.len(),
                written
            );
            written
        }
        Err(err) => {
            warn!("write failed: {err}");
            0
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io;

    /// Accepts at most `limit` bytes per call.
    pub(crate) struct Trickle {
        pub(crate) limit: usize,
        pub(crate) data: Vec<u8>,
    }

    impl Write for Trickle {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let n = buf.len().min(self.limit);
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::from_raw_os_error(libc::EIO))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct InterruptedOnce {
        interrupted: bool,
        data: Vec<u8>,
    }

    impl Write for InterruptedOnce {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(io::Error::from(ErrorKind::Interrupted));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_full_write() {
        let mut out = Vec::new();
        assert_eq!(reliable_write(&mut out, b"secret\n"), 7);
        assert_eq!(out, b"secret\n");
    }

    #[test]
    fn test_short_write_is_reported_not_retried() {
        let mut out = Trickle {
            limit: 3,
            data: Vec::new(),
        };
        assert_eq!(reliable_write(&mut out, b"secret"), 3);
        assert_eq!(out.data, b"sec");
    }

    #[test]
    fn test_write_error_is_not_fatal() {
        assert_eq!(reliable_write(&mut Broken, b"x"), 0);
    }

    #[test]
    fn test_interrupted_write_is_retried() {
        let mut out = InterruptedOnce {
            interrupted: false,
            data: Vec::new(),
        };
        assert_eq!(reliable_write(&mut out, b"\x03"), 1);
        assert_eq!(out.data, b"\x03");
    }
}
