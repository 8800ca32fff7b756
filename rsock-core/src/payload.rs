//! Payload: the data + metadata pair carried by every request and response.
//!
//! Both halves are refcounted `Bytes`, so handing a payload to the driver or
//! to a completion never copies the underlying buffers.

use crate::error::{Error, Result};
use bytes::Bytes;
use std::fmt;

/// A request or response body.
///
/// Lengths are fixed once built. Metadata is optional; an absent metadata
/// block reports a length of zero.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Payload {
    data: Bytes,
    metadata: Option<Bytes>,
}

impl Payload {
    /// Create a payload carrying only data.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            metadata: None,
        }
    }

    /// Create a payload carrying data and metadata.
    pub fn with_metadata(data: impl Into<Bytes>, metadata: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            metadata: Some(metadata.into()),
        }
    }

    /// Start building a payload piece by piece.
    #[must_use]
    pub fn builder() -> PayloadBuilder {
        PayloadBuilder::default()
    }

    /// Copy caller-owned slices into a new payload.
    ///
    /// Allocation is fallible: a buffer that cannot be reserved yields
    /// [`Error::OutOfMemory`] instead of aborting the process.
    pub fn try_copy_from(data: &[u8], metadata: Option<&[u8]>) -> Result<Self> {
        let data = try_copy(data)?;
        let metadata = metadata.map(try_copy).transpose()?;
        Ok(Self { data, metadata })
    }

    #[inline]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    #[inline]
    pub fn metadata(&self) -> Option<&Bytes> {
        self.metadata.as_ref()
    }

    #[inline]
    pub fn data_len(&self) -> usize {
        self.data.len()
    }

    /// Metadata length, zero when no metadata is attached.
    #[inline]
    pub fn metadata_len(&self) -> usize {
        self.metadata.as_ref().map_or(0, Bytes::len)
    }

    #[inline]
    pub fn has_metadata(&self) -> bool {
        self.metadata.is_some()
    }

    /// Data as UTF-8, if it is valid UTF-8.
    pub fn data_utf8(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }

    /// Metadata as UTF-8, if present and valid UTF-8.
    pub fn metadata_utf8(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| std::str::from_utf8(m).ok())
    }

    /// Copy data into `out`, returning the number of bytes written.
    ///
    /// Writes exactly `min(data_len, out.len())` bytes and never touches
    /// anything past that prefix.
    pub fn copy_data(&self, out: &mut [u8]) -> usize {
        copy_prefix(&self.data, out)
    }

    /// Copy metadata into `out`, returning the number of bytes written.
    pub fn copy_metadata(&self, out: &mut [u8]) -> usize {
        self.metadata.as_ref().map_or(0, |m| copy_prefix(m, out))
    }

    /// Split into the underlying buffers.
    pub fn into_parts(self) -> (Bytes, Option<Bytes>) {
        (self.data, self.metadata)
    }
}

fn copy_prefix(src: &[u8], out: &mut [u8]) -> usize {
    let n = src.len().min(out.len());
    out[..n].copy_from_slice(&src[..n]);
    n
}

fn try_copy(src: &[u8]) -> Result<Bytes> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(src.len())
        .map_err(|_| Error::OutOfMemory(src.len()))?;
    buf.extend_from_slice(src);
    Ok(Bytes::from(buf))
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload")
            .field("data_len", &self.data_len())
            .field("metadata_len", &self.metadata_len())
            .finish()
    }
}

impl From<Bytes> for Payload {
    fn from(data: Bytes) -> Self {
        Self::new(data)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<&'static str> for Payload {
    fn from(data: &'static str) -> Self {
        Self::new(data)
    }
}

impl From<String> for Payload {
    fn from(data: String) -> Self {
        Self::new(data)
    }
}

/// Incremental payload construction.
///
/// ```
/// use rsock_core::payload::Payload;
///
/// let payload = Payload::builder()
///     .set_data_utf8("Hello, RSocket!")
///     .set_metadata_utf8("demo")
///     .build();
/// assert_eq!(payload.data_len(), 15);
/// assert_eq!(payload.metadata_len(), 4);
/// ```
#[derive(Debug, Default)]
pub struct PayloadBuilder {
    data: Option<Bytes>,
    metadata: Option<Bytes>,
}

impl PayloadBuilder {
    #[must_use]
    pub fn set_data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = Some(data.into());
        self
    }

    #[must_use]
    pub fn set_data_utf8(self, data: &str) -> Self {
        self.set_data(Bytes::copy_from_slice(data.as_bytes()))
    }

    #[must_use]
    pub fn set_metadata(mut self, metadata: impl Into<Bytes>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }

    #[must_use]
    pub fn set_metadata_utf8(self, metadata: &str) -> Self {
        self.set_metadata(Bytes::copy_from_slice(metadata.as_bytes()))
    }

    /// Finish the payload. Missing data becomes an empty buffer.
    #[must_use]
    pub fn build(self) -> Payload {
        Payload {
            data: self.data.unwrap_or_default(),
            metadata: self.metadata,
        }
    }
}
