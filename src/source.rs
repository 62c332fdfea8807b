//! Where the password comes from.
//!
//! A [`ByteSource`] is consulted every time a password prompt is answered.
//! Descriptor-backed sources are re-read from their current position; a file
//! source is re-opened from the start.

use crate::writer::reliable_write;
use secrecy::{ExposeSecret, SecretString};
use std::fs::File;
use std::io::{self, ErrorKind, Read, Write};
use std::os::fd::RawFd;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Size of each read from a descriptor-backed source.
const CHUNK_SIZE: usize = 40;

/// The single active password source for a run.
///
/// Not `Clone`: the literal password exists exactly once in memory and is
/// zeroed when the source is dropped.
#[derive(Debug, Default)]
pub enum ByteSource {
    #[default]
    Stdin,
    /// An already-open descriptor inherited from the caller.
    Descriptor(RawFd),
    /// The first line of this file.
    File(PathBuf),
    Literal(SecretString),
}

impl ByteSource {
    /// Write the password, newline terminated, to `dest`.
    ///
    /// Failing to open a password file is reported and nothing is written;
    /// the run carries on and will most likely see the prompt again.
    pub fn provide<W: Write + ?Sized>(&self, dest: &mut W) {
        match self {
            ByteSource::Stdin => copy_line(&mut FdReader(libc::STDIN_FILENO), dest),
            ByteSource::Descriptor(fd) => copy_line(&mut FdReader(*fd), dest),
            ByteSource::File(path) => match File::open(path) {
                Ok(mut file) => copy_line(&mut file, dest),
                Err(err) => {
                    warn!(
                        "Failed to open password file \"{}\": {}",
                        path.display(),
                        err
                    );
                }
            },
            ByteSource::Literal(secret) => {
                reliable_write(dest, secret.expose_secret().as_bytes());
                reliable_write(dest, b"\n");
            }
        }
    }
}

/// Reads a descriptor owned by someone else without ever closing it.
///
/// A descriptor that is not open (or not readable) just makes the read fail
/// with `EBADF`.
struct FdReader(RawFd);

impl Read for FdReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        nix::unistd::read(self.0, buf).map_err(io::Error::from)
    }
}

/// Copy bytes from `src` to `dest` up to the first newline or end of input,
/// then write exactly one newline.
///
/// Bytes are written one at a time so nothing past the newline is sent, even
/// though a whole chunk may have been read.
pub fn copy_line<R: Read + ?Sized, W: Write + ?Sized>(src: &mut R, dest: &mut W) {
    let mut buffer = [0u8; CHUNK_SIZE];
    'copy: loop {
        let n = match src.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                debug!("password source read ended: {err}");
                break;
            }
        };
        for byte in &buffer[..n] {
            if *byte == b'\n' {
                break 'copy;
            }
            reliable_write(dest, std::slice::from_ref(byte));
        }
    }
    reliable_write(dest, b"\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Seek, SeekFrom};
    use std::os::fd::AsRawFd;

    #[test]
    fn test_copy_line_stops_at_newline() {
        let mut out = Vec::new();
        copy_line(&mut Cursor::new(b"secret123\nsecond line\n".to_vec()), &mut out);
        assert_eq!(out, b"secret123\n");
    }

    #[test]
    fn test_copy_line_appends_missing_newline() {
        let mut out = Vec::new();
        copy_line(&mut Cursor::new(b"secret123".to_vec()), &mut out);
        assert_eq!(out, b"secret123\n");
    }

    #[test]
    fn test_copy_line_longer_than_chunk() {
        let long = "x".repeat(CHUNK_SIZE * 3 + 7);
        let mut input = long.clone().into_bytes();
        input.extend_from_slice(b"\ntrailing");
        let mut out = Vec::new();
        copy_line(&mut Cursor::new(input), &mut out);
        assert_eq!(out, format!("{long}\n").into_bytes());
    }

    #[test]
    fn test_copy_line_empty_source() {
        let mut out = Vec::new();
        copy_line(&mut Cursor::new(Vec::new()), &mut out);
        assert_eq!(out, b"\n");
    }

    #[test]
    fn test_literal_source() {
        let source = ByteSource::Literal(SecretString::from("secret123"));
        let mut out = Vec::new();
        source.provide(&mut out);
        assert_eq!(out, b"secret123\n");
    }

    #[test]
    fn test_file_source_reads_first_line_each_time() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hunter2\nnot this\n").unwrap();
        let source = ByteSource::File(file.path().to_path_buf());

        let mut out = Vec::new();
        source.provide(&mut out);
        source.provide(&mut out);
        assert_eq!(out, b"hunter2\nhunter2\n");
    }

    #[test]
    fn test_missing_file_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let source = ByteSource::File(dir.path().join("missing"));
        let mut out = Vec::new();
        source.provide(&mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_descriptor_source_is_not_closed() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(b"fdpass\n").unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();

        let source = ByteSource::Descriptor(file.as_raw_fd());
        let mut out = Vec::new();
        source.provide(&mut out);
        assert_eq!(out, b"fdpass\n");

        // The descriptor must still be usable by its owner.
        file.seek(SeekFrom::Start(0)).unwrap();
        let mut again = String::new();
        file.read_to_string(&mut again).unwrap();
        assert_eq!(again, "fdpass\n");
    }

    #[test]
    fn test_short_destination_still_gets_newline() {
        let mut out = crate::writer::tests::Trickle {
            limit: 1,
            data: Vec::new(),
        };
        copy_line(&mut Cursor::new(b"abc".to_vec()), &mut out);
        assert_eq!(out.data, b"abc\n");
    }

    #[test]
    fn test_invalid_descriptor_sends_only_newline() {
        for fd in [-1, -7, i32::MAX] {
            let mut out = Vec::new();
            ByteSource::Descriptor(fd).provide(&mut out);
            assert_eq!(out, b"\n", "descriptor {fd}");
        }
    }

    #[test]
    fn test_literal_debug_is_redacted() {
        let source = ByteSource::Literal(SecretString::from("hunter2"));
        let shown = format!("{source:?}");
        assert!(!shown.contains("hunter2"));
    }
}
