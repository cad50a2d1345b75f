//! Scan request envelope.
//!
//! Layout, all integers little-endian:
//!
//! ```text
//! 0   magic "SKRQ"
//! 4   version (u16)
//! 6   section count (u16)
//! 8   total length (u32)
//! 12  size hint (i64)
//! 20  (offset u32, length u32) for predicate, partition predicate, dataset
//!     schema, projection schema
//! 52  section payloads
//! ```
use std::ops::Range;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use datafusion::arrow::datatypes::SchemaRef;

use super::table::{decode_schema, encode_schema};
use crate::errors::{Result, SkyhookError};
use crate::predicate::Predicate;

pub const MAGIC: [u8; 4] = *b"SKRQ";
pub const VERSION: u16 = 1;
pub const NUM_SECTIONS: usize = 4;
pub const HEADER_LEN: usize = 20 + NUM_SECTIONS * 8;

/// Everything a storage node needs to scan one object.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRequest {
    pub predicate: Predicate,
    pub partition_predicate: Predicate,
    pub projection_schema: SchemaRef,
    pub dataset_schema: SchemaRef,
    /// Size of the backing file, `0` when unknown.
    pub size_hint: i64,
}

impl ScanRequest {
    pub fn encode(&self) -> Result<Bytes> {
        let sections = [
            self.predicate.to_bytes()?,
            self.partition_predicate.to_bytes()?,
            encode_schema(&self.dataset_schema)?,
            encode_schema(&self.projection_schema)?,
        ];

        let total = HEADER_LEN + sections.iter().map(|s| s.len()).sum::<usize>();
        let total_u32 = u32::try_from(total).map_err(|_| {
            SkyhookError::MalformedRequest(format!("request of {total} bytes too large"))
        })?;

        let mut buf = BytesMut::with_capacity(total);
        buf.put_slice(&MAGIC);
        buf.put_u16_le(VERSION);
        buf.put_u16_le(NUM_SECTIONS as u16);
        buf.put_u32_le(total_u32);
        buf.put_i64_le(self.size_hint);

        let mut offset = HEADER_LEN as u32;
        for section in &sections {
            let len = section.len() as u32;
            buf.put_u32_le(offset);
            buf.put_u32_le(len);
            offset += len;
        }
        for section in &sections {
            buf.put_slice(section);
        }

        Ok(buf.freeze())
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_LEN {
            return Err(malformed(format!(
                "buffer of {} bytes shorter than header ({HEADER_LEN} bytes)",
                buf.len()
            )));
        }

        let mut header = &buf[..HEADER_LEN];
        let mut magic = [0; 4];
        header.copy_to_slice(&mut magic);
        if magic != MAGIC {
            return Err(malformed(format!("unexpected magic {magic:?}")));
        }

        let version = header.get_u16_le();
        if version != VERSION {
            return Err(malformed(format!("unsupported version {version}")));
        }

        let count = header.get_u16_le() as usize;
        if count != NUM_SECTIONS {
            return Err(malformed(format!(
                "expected {NUM_SECTIONS} sections, got {count}"
            )));
        }

        let total = header.get_u32_le() as usize;
        if total != buf.len() {
            return Err(malformed(format!(
                "declared length {total} does not match buffer length {}",
                buf.len()
            )));
        }

        let size_hint = header.get_i64_le();

        let mut ranges: Vec<Range<usize>> = Vec::with_capacity(NUM_SECTIONS);
        for idx in 0..NUM_SECTIONS {
            let offset = header.get_u32_le() as usize;
            let len = header.get_u32_le() as usize;
            let end = offset
                .checked_add(len)
                .ok_or_else(|| malformed(format!("section {idx} length overflows")))?;

            if offset < HEADER_LEN || end > buf.len() {
                return Err(malformed(format!(
                    "section {idx} at {offset}..{end} outside of payload {HEADER_LEN}..{}",
                    buf.len()
                )));
            }
            if let Some(other) = ranges
                .iter()
                .position(|r| r.start < end && offset < r.end)
            {
                return Err(malformed(format!(
                    "section {idx} overlaps section {other}"
                )));
            }

            ranges.push(offset..end);
        }

        let sections: Vec<&[u8]> = ranges.into_iter().map(|r| &buf[r]).collect();

        let predicate = Predicate::from_bytes(sections[0])
            .map_err(|e| malformed(format!("predicate: {e}")))?;
        let partition_predicate = Predicate::from_bytes(sections[1])
            .map_err(|e| malformed(format!("partition predicate: {e}")))?;
        let dataset_schema =
            decode_schema(sections[2]).map_err(|e| malformed(format!("dataset schema: {e}")))?;
        let projection_schema = decode_schema(sections[3])
            .map_err(|e| malformed(format!("projection schema: {e}")))?;

        Ok(ScanRequest {
            predicate,
            partition_predicate,
            projection_schema,
            dataset_schema,
            size_hint,
        })
    }
}

fn malformed(msg: String) -> SkyhookError {
    SkyhookError::MalformedRequest(msg)
}

pub fn encode_scan_request(req: &ScanRequest) -> Result<Bytes> {
    req.encode()
}

pub fn decode_scan_request(buf: &[u8]) -> Result<ScanRequest> {
    ScanRequest::decode(buf)
}
