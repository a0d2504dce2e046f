//! Growable byte buffer used for both incoming commands and outgoing packets.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, PAD};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use std::fmt;
use std::fmt::Write as _;

const INITIAL_CAPACITY: usize = 2048;

/// Standard alphabet, padding optional on decode.
const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    PAD.with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    #[error("out of memory")]
    OutOfMemory,
}

/// Byte buffer that grows geometrically and never shrinks.
///
/// Once a reservation fails the buffer is marked as failed and every following
/// write is rejected until [`WireBuffer::clear`]. An optional limit caps the
/// total size, exceeding it counts as an allocation failure.
#[derive(Debug, Default)]
pub struct WireBuffer {
    data: Vec<u8>,
    limit: Option<usize>,
    failed: bool,
}

impl WireBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: Option<usize>) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    fn reserve(&mut self, additional: usize) -> Result<(), BufferError> {
        if self.failed {
            return Err(BufferError::OutOfMemory);
        }
        let needed = self.data.len() + additional;
        if self.limit.is_some_and(|limit| needed > limit) {
            self.failed = true;
            return Err(BufferError::OutOfMemory);
        }
        if needed <= self.data.capacity() {
            return Ok(());
        }

        let mut capacity = self.data.capacity().max(INITIAL_CAPACITY);
        while capacity < needed {
            capacity = capacity.saturating_mul(2);
        }
        if let Some(limit) = self.limit {
            capacity = capacity.min(limit);
        }
        if self.data.try_reserve_exact(capacity - self.data.len()).is_err() {
            self.failed = true;
            return Err(BufferError::OutOfMemory);
        }
        Ok(())
    }

    pub fn write(&mut self, bytes: &[u8]) -> Result<(), BufferError> {
        self.reserve(bytes.len())?;
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    /// Formatted write, makes `write!(buf, ...)` return a [`BufferError`].
    /// Use [`Escaped`] for text that goes into XML attributes or content.
    pub fn write_fmt(&mut self, args: fmt::Arguments<'_>) -> Result<(), BufferError> {
        struct Adapter<'a>(&'a mut WireBuffer);

        impl fmt::Write for Adapter<'_> {
            fn write_str(&mut self, s: &str) -> fmt::Result {
                self.0.write(s.as_bytes()).map_err(|_| fmt::Error)
            }
        }

        if self.failed {
            return Err(BufferError::OutOfMemory);
        }
        Adapter(self)
            .write_fmt(args)
            .map_err(|_| BufferError::OutOfMemory)
    }

    pub fn write_base64(&mut self, bytes: &[u8]) -> Result<(), BufferError> {
        let encoded_len = base64::encoded_len(bytes.len(), true).ok_or(BufferError::OutOfMemory)?;
        self.reserve(encoded_len)?;
        let start = self.data.len();
        self.data.resize(start + encoded_len, 0);
        let written = BASE64
            .encode_slice(bytes, &mut self.data[start..])
            .map_err(|_| BufferError::OutOfMemory)?;
        self.data.truncate(start + written);
        Ok(())
    }

    /// Write `path` as a `file://` URI.
    pub fn write_file_uri(&mut self, path: &str) -> Result<(), BufferError> {
        let uri = file_uri(path);
        self.write(uri.as_bytes())
    }

    /// Drop all content and reset the failed flag, capacity is kept.
    pub fn clear(&mut self) {
        self.data.clear();
        self.failed = false;
    }

    /// Remove first `n` bytes (or everything if `n` exceeds length).
    pub fn remove_prefix(&mut self, n: usize) {
        let n = n.min(self.data.len());
        self.data.drain(..n);
    }
}

/// Display wrapper that escapes XML special characters.
pub struct Escaped<'a>(pub &'a str);

impl fmt::Display for Escaped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rest = self.0;
        while let Some(pos) = rest.find(['&', '<', '>', '"', '\'']) {
            f.write_str(&rest[..pos])?;
            let entity = match rest.as_bytes()[pos] {
                b'&' => "&amp;",
                b'<' => "&lt;",
                b'>' => "&gt;",
                b'"' => "&quot;",
                _ => "&apos;",
            };
            f.write_str(entity)?;
            rest = &rest[pos + 1..];
        }
        f.write_str(rest)
    }
}

pub fn encode_base64(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

/// Decode base64 text, surrounding whitespace and missing padding are tolerated.
pub fn decode_base64(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
    BASE64.decode(text.trim())
}

fn is_uri_safe(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"-_.!~*()/".contains(&b)
}

/// Encode a file system path as a `file://` URI. Backslashes become forward
/// slashes, every byte outside the unreserved set is percent-encoded.
pub fn file_uri(path: &str) -> String {
    let mut uri = String::with_capacity(path.len() + 8);
    uri.push_str(if path.starts_with(['/', '\\']) {
        "file://"
    } else {
        "file:///"
    });
    for b in path.bytes() {
        match b {
            b'\\' => uri.push('/'),
            b if is_uri_safe(b) => uri.push(b as char),
            b => {
                let _ = write!(uri, "%{b:02X}");
            }
        }
    }
    uri
}

/// Turn a `file://` URI back into a path. Anything that is not a URI is only
/// percent-decoded.
pub fn decode_file_uri(uri: &str) -> String {
    let rest = strip_prefix_ignore_case(uri, "file://").unwrap_or(uri);
    let bytes = rest.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .and_then(|h| u8::from_str_radix(h, 16).ok());
            if let Some(b) = hex {
                decoded.push(b);
                i += 3;
                continue;
            }
        }
        decoded.push(bytes[i]);
        i += 1;
    }
    let path = String::from_utf8_lossy(&decoded).into_owned();

    // "file:///C:/dir" carries a drive letter after the third slash
    let drive = path.as_bytes();
    if drive.len() >= 3 && drive[0] == b'/' && drive[1].is_ascii_alphabetic() && drive[2] == b':' {
        return path[1..].to_string();
    }
    path
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}
