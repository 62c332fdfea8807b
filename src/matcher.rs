//! Streaming phrase matcher.
//!
//! A [`Matcher`] tracks how much of one phrase has been seen at the tail of a
//! byte stream that arrives in arbitrary chunks. It does not keep a failure
//! table: on a mismatch it restarts and re-tests only the offending byte.
//! That is enough for the fixed phrases this crate looks for, none of which
//! has a proper prefix that is also a suffix of a longer partial match.

/// Feed `chunk` into a matcher that has matched `state` bytes of `phrase`,
/// returning the new state.
///
/// Bytes after the point where the phrase completes are not examined.
pub fn advance(phrase: &[u8], mut state: usize, chunk: &[u8]) -> usize {
    for &byte in chunk {
        if state >= phrase.len() {
            break;
        }
        if phrase[state] == byte {
            state += 1;
        } else {
            state = 0;
            if phrase[0] == byte {
                state = 1;
            }
        }
    }
    state
}

/// Progress of one phrase against the terminal output seen so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matcher {
    phrase: Vec<u8>,
    state: usize,
}

impl Matcher {
    pub fn new(phrase: impl Into<Vec<u8>>) -> Self {
        Self {
            phrase: phrase.into(),
            state: 0,
        }
    }

    /// Feed the next chunk of output. Returns `true` once the phrase is
    /// complete.
    pub fn feed(&mut self, chunk: &[u8]) -> bool {
        self.state = advance(&self.phrase, self.state, chunk);
        self.is_complete()
    }

    pub fn is_complete(&self) -> bool {
        self.state == self.phrase.len()
    }

    pub fn reset(&mut self) {
        self.state = 0;
    }

    pub fn state(&self) -> usize {
        self.state
    }

    pub fn phrase(&self) -> &[u8] {
        &self.phrase
    }
}
