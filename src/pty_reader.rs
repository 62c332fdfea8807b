use std::io::{ErrorKind, Read};
use tracing::{debug, warn};

/// Result of one non-blocking read from the pty master.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// This many bytes were read into the buffer.
    Data(usize),
    /// Nothing to read right now.
    WouldBlock,
    /// Every slave descriptor is gone; no more output will arrive.
    Closed,
}

/// Read whatever the terminal has ready, retrying on `EINTR`.
///
/// Linux reports a master whose slaves are all closed as `EIO` rather than
/// end of file; both mean the same thing here.
pub fn read_chunk<R: Read + ?Sized>(reader: &mut R, buffer: &mut [u8]) -> ReadOutcome {
    loop {
        return match reader.read(buffer) {
            Ok(0) => ReadOutcome::Closed,
            Ok(n) => ReadOutcome::Data(n),
            Err(err) => match err.kind() {
                ErrorKind::Interrupted => continue,
                ErrorKind::WouldBlock => ReadOutcome::WouldBlock,
                _ if err.raw_os_error() == Some(libc::EIO) => {
                    debug!("terminal slave closed");
                    ReadOutcome::Closed
                }
                _ => {
                    warn!("read from terminal failed: {err}");
                    ReadOutcome::Closed
                }
            },
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};

    struct Failing(ErrorKind);

    impl Read for Failing {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::from(self.0))
        }
    }

    struct FailingOs(i32);

    impl Read for FailingOs {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::from_raw_os_error(self.0))
        }
    }

    #[test]
    fn test_data_then_eof() {
        let mut reader = Cursor::new(b"Password: ".to_vec());
        let mut buffer = [0u8; 4];
        assert_eq!(read_chunk(&mut reader, &mut buffer), ReadOutcome::Data(4));
        assert_eq!(&buffer, b"Pass");
        assert_eq!(read_chunk(&mut reader, &mut buffer), ReadOutcome::Data(4));
        assert_eq!(read_chunk(&mut reader, &mut buffer), ReadOutcome::Data(2));
        assert_eq!(read_chunk(&mut reader, &mut buffer), ReadOutcome::Closed);
    }

    #[test]
    fn test_would_block() {
        let mut reader = Failing(ErrorKind::WouldBlock);
        assert_eq!(read_chunk(&mut reader, &mut [0u8; 8]), ReadOutcome::WouldBlock);
    }

    #[test]
    fn test_eio_means_closed() {
        let mut reader = FailingOs(libc::EIO);
        assert_eq!(read_chunk(&mut reader, &mut [0u8; 8]), ReadOutcome::Closed);
    }
}
