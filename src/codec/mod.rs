//! The optional payload transform: raw bytes or a raw-deflate stream.
//!
//! The duality is carried as a two-variant enum next to the bytes rather than
//! duplicated raw/compressed code paths at every call site. Encoding keeps
//! the compressed form only when it is strictly smaller, so a container is
//! never larger than storing everything verbatim.

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::{Read, Write};

use crate::error::{ChestError, Result};

/// An element payload as it sits on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Raw(Vec<u8>),
    Deflate(Vec<u8>),
}

impl Payload {
    /// Compress `bytes`; keep the deflate stream only if it is smaller.
    pub fn encode(bytes: &[u8]) -> Payload {
        if bytes.is_empty() {
            return Payload::Raw(Vec::new());
        }
        match deflate(bytes) {
            Ok(compressed) if compressed.len() < bytes.len() => Payload::Deflate(compressed),
            _ => Payload::Raw(bytes.to_vec()),
        }
    }

    /// Rehydrate from a data chain plus the catalog entry's compressed flag.
    pub fn from_parts(raw: Vec<u8>, compressed: bool) -> Payload {
        if compressed {
            Payload::Deflate(raw)
        } else {
            Payload::Raw(raw)
        }
    }

    /// The on-disk bytes and the flag value to record.
    pub fn into_parts(self) -> (Vec<u8>, bool) {
        match self {
            Payload::Raw(bytes) => (bytes, false),
            Payload::Deflate(bytes) => (bytes, true),
        }
    }

    /// Decoding is total on empty input: an empty payload decodes to empty
    /// bytes regardless of the flag.
    pub fn decode(self) -> Result<Vec<u8>> {
        match self {
            Payload::Raw(bytes) => Ok(bytes),
            Payload::Deflate(bytes) if bytes.is_empty() => Ok(bytes),
            Payload::Deflate(bytes) => inflate(&bytes),
        }
    }
}

fn deflate(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(bytes)
        .map_err(|e| ChestError::Codec(format!("deflate failed: {e}")))?;
    encoder
        .finish()
        .map_err(|e| ChestError::Codec(format!("deflate failed: {e}")))
}

fn inflate(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    DeflateDecoder::new(bytes)
        .read_to_end(&mut out)
        .map_err(|e| ChestError::Codec(format!("inflate failed: {e}")))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compressible_payload_is_deflated() {
        let data = vec![7u8; 4096];
        let payload = Payload::encode(&data);
        assert!(matches!(payload, Payload::Deflate(_)));
        assert_eq!(payload.decode().unwrap(), data);
    }

    #[test]
    fn empty_payload_decodes_to_empty_either_way() {
        assert_eq!(Payload::from_parts(Vec::new(), true).decode().unwrap(), b"");
        assert_eq!(Payload::from_parts(Vec::new(), false).decode().unwrap(), b"");
    }

    #[test]
    fn garbage_deflate_stream_is_a_codec_error() {
        let result = Payload::from_parts(vec![0xDE, 0xAD, 0xBE, 0xEF], true).decode();
        assert!(matches!(result, Err(ChestError::Codec(_))));
    }
}
