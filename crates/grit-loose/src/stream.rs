use std::fs;
use std::io::Read;

use flate2::read::ZlibDecoder;
use grit_hash::ObjectId;
use grit_object::{header, ObjectType};

use crate::{read::inflate_header, LooseError, LooseStore};

/// Streaming reader for a loose object payload.
///
/// The header is parsed up front; [`Read`] calls then inflate content bytes
/// on demand, so large blobs never have to be fully buffered.
pub struct LooseStream {
    kind: ObjectType,
    size: usize,
    decoder: ZlibDecoder<fs::File>,
    bytes_read: usize,
}

impl LooseStream {
    /// The object kind.
    pub fn kind(&self) -> ObjectType {
        self.kind
    }

    /// The declared content size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// How many content bytes remain to be read.
    pub fn bytes_remaining(&self) -> usize {
        self.size.saturating_sub(self.bytes_read)
    }
}

impl Read for LooseStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let remaining = self.bytes_remaining();
        if remaining == 0 {
            return Ok(0);
        }
        let max_read = remaining.min(buf.len());
        let n = self.decoder.read(&mut buf[..max_read])?;
        self.bytes_read += n;
        Ok(n)
    }
}

impl LooseStore {
    /// Open a streaming reader for a loose object.
    ///
    /// Returns `Ok(None)` if the object does not exist. The header is
    /// consumed immediately; content bytes are inflated on demand.
    pub fn stream(&self, oid: &ObjectId) -> Result<Option<LooseStream>, LooseError> {
        let path = self.object_path(oid);
        let file = match fs::File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LooseError::Io(e)),
        };

        let hdr = inflate_header(file, oid)?;
        let (kind, content_size, header_len) = header::parse_header(&hdr)?;

        // Re-open and inflate past the header so subsequent reads yield
        // only content bytes.
        let file = fs::File::open(&path)?;
        let mut decoder = ZlibDecoder::new(file);
        let mut skip = vec![0u8; header_len];
        decoder
            .read_exact(&mut skip)
            .map_err(|e| LooseError::Decompress {
                oid: oid.to_hex(),
                source: e,
            })?;

        Ok(Some(LooseStream {
            kind,
            size: content_size,
            decoder,
            bytes_read: 0,
        }))
    }
}
