//! Key password captured from piped standard input.
//!
//! The password is read once at startup. An interactive terminal yields an
//! empty secret instead of prompting, so the profiler can run unattended
//! against unencrypted keys. The password is kept as raw bytes and passed
//! to the client unchanged, so it need not be UTF-8.

use secrecy::{ExposeSecret, SecretSlice};
use std::fmt;
use std::io::{BufRead, IsTerminal};

use crate::profiler::error::ProfilerError;

/// A secret that never shows up in `Debug` or `Display` output.
#[derive(Clone)]
pub struct SecretValue {
    inner: SecretSlice<u8>,
}

impl SecretValue {
    pub fn new(value: impl Into<Vec<u8>>) -> Self {
        Self {
            inner: SecretSlice::from(value.into()),
        }
    }

    /// An empty secret.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Expose the secret bytes for use.
    ///
    /// Never log the exposed value.
    pub fn expose(&self) -> &[u8] {
        self.inner.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.expose_secret().is_empty()
    }

    /// Bytes written to the child's stdin: the secret plus a newline, or a
    /// lone newline when empty so the child never blocks on an open stdin.
    pub fn stdin_payload(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(self.expose().len() + 1);
        payload.extend_from_slice(self.expose());
        payload.push(b'\n');
        payload
    }
}

impl Default for SecretValue {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl fmt::Display for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

/// Read the first line of `reader` as the secret, without its line ending.
pub fn read_secret_line<R: BufRead>(mut reader: R) -> Result<SecretValue, ProfilerError> {
    let mut line = Vec::new();
    reader
        .read_until(b'\n', &mut line)
        .map_err(|source| ProfilerError::SecretIo { source })?;
    while matches!(line.last(), Some(b'\n' | b'\r')) {
        line.pop();
    }
    Ok(SecretValue::new(line))
}

/// Capture the secret from stdin if stdin is piped; empty otherwise.
pub fn capture_stdin_secret() -> Result<SecretValue, ProfilerError> {
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Ok(SecretValue::empty());
    }
    read_secret_line(stdin.lock())
}
