//! Full structural verification of a snapshot buffer.
//!
//! Model construction runs this before trusting any offset when verification
//! is enabled. The typed views stay memory-safe without it; verification is
//! what turns a corrupt buffer into a construction error instead of
//! silently-wrong values.

use crate::format::{
    read_u32, FormatError, RootView, HDR_SLOTS, MAX_RECORDS, NO_STRING, NUM_SLOTS, RECORD_SIZE,
    REC_ATTRIBUTES, REC_BLOBS, REC_COMMENTS, REC_HEADER_NONREPEATABLE, REC_HEADER_REPEATABLE,
    REC_HIDDENAREAS, REC_PROTOTYPE, REC_REGISTERVIEWS, REC_SIGNATURES, REC_USERNAME,
    REC_VALUEVIEWS, REC_XREFS, SLOT_SIZE,
};

struct Verifier<'a> {
    bytes: &'a [u8],
    num_strings: u32,
}

/// Verify every table, record, vector, string and blob in `bytes`.
pub fn verify(bytes: &[u8]) -> Result<(), FormatError> {
    let root = RootView::new(bytes)?;
    let num_strings = verify_strings(bytes, root.strings_offset())?;
    let verifier = Verifier { bytes, num_strings };

    let mut total = 0usize;
    for slot in 0..NUM_SLOTS {
        let pos = HDR_SLOTS + slot * SLOT_SIZE;
        let start = read_u32(bytes, pos) as usize;
        let count = read_u32(bytes, pos + 4) as usize;
        if count == 0 {
            continue;
        }
        total += count;
        if total > MAX_RECORDS {
            return Err(FormatError::TooManyRecords { found: total, limit: MAX_RECORDS });
        }
        verifier.range("record array", start, count * 4)?;
        for i in 0..count {
            let record = read_u32(bytes, start + i * 4) as usize;
            verifier.record(record)?;
        }
    }
    Ok(())
}

fn verify_strings(bytes: &[u8], table: usize) -> Result<u32, FormatError> {
    let truncated = FormatError::Truncated { what: "string table", offset: table };
    if table.checked_add(4).map_or(true, |end| end > bytes.len()) {
        return Err(truncated);
    }
    let count = read_u32(bytes, table);
    let entries_end = (count as usize).checked_mul(8).and_then(|n| n.checked_add(table + 4));
    if entries_end.map_or(true, |end| end > bytes.len()) {
        return Err(truncated);
    }
    for index in 0..count {
        let entry = table + 4 + index as usize * 8;
        let offset = read_u32(bytes, entry) as usize;
        let len = read_u32(bytes, entry + 4) as usize;
        let value = offset
            .checked_add(len)
            .and_then(|end| bytes.get(offset..end))
            .ok_or(FormatError::Truncated { what: "string", offset })?;
        std::str::from_utf8(value).map_err(|_| FormatError::InvalidUtf8 { index })?;
    }
    Ok(count)
}

impl Verifier<'_> {
    fn range(&self, what: &'static str, offset: usize, len: usize) -> Result<(), FormatError> {
        match offset.checked_add(len) {
            Some(end) if end <= self.bytes.len() => Ok(()),
            _ => Err(FormatError::Truncated { what, offset }),
        }
    }

    fn string(&self, index: u32) -> Result<(), FormatError> {
        if index == NO_STRING || index < self.num_strings {
            Ok(())
        } else {
            Err(FormatError::BadString { index, count: self.num_strings })
        }
    }

    fn string_at(&self, pos: usize) -> Result<(), FormatError> {
        self.string(read_u32(self.bytes, pos))
    }

    /// Check a vector header and its entries; returns the entry positions.
    fn vector(
        &self,
        what: &'static str,
        offset: u32,
        entry_size: usize,
    ) -> Result<impl Iterator<Item = usize>, FormatError> {
        let (start, count) = if offset == 0 {
            (0, 0)
        } else {
            let offset = offset as usize;
            self.range(what, offset, 4)?;
            let count = read_u32(self.bytes, offset) as usize;
            let len =
                count.checked_mul(entry_size).ok_or(FormatError::Truncated { what, offset })?;
            self.range(what, offset + 4, len)?;
            (offset + 4, count)
        };
        Ok((0..count).map(move |i| start + i * entry_size))
    }

    fn attributes(&self, offset: u32) -> Result<(), FormatError> {
        for pos in self.vector("attributes", offset, 8)? {
            self.string_at(pos)?;
            self.string_at(pos + 4)?;
        }
        Ok(())
    }

    fn record(&self, pos: usize) -> Result<(), FormatError> {
        self.range("record", pos, RECORD_SIZE)?;
        let field = |offset: usize| read_u32(self.bytes, pos + offset);

        for offset in [
            REC_USERNAME,
            REC_PROTOTYPE,
            REC_HEADER_REPEATABLE,
            REC_HEADER_NONREPEATABLE,
        ] {
            self.string(field(offset))?;
        }

        for entry in self.vector("signatures", field(REC_SIGNATURES), 8)? {
            self.string_at(entry + 4)?;
        }
        for entry in self.vector("xrefs", field(REC_XREFS), 24)? {
            self.attributes(read_u32(self.bytes, entry + 20))?;
        }
        for entry in self.vector("comments", field(REC_COMMENTS), 16)? {
            self.string_at(entry + 12)?;
        }
        for entry in self.vector("value views", field(REC_VALUEVIEWS), 16)? {
            self.string_at(entry + 12)?;
        }
        for entry in self.vector("register views", field(REC_REGISTERVIEWS), 24)? {
            self.string_at(entry + 16)?;
            self.string_at(entry + 20)?;
        }
        for entry in self.vector("hidden areas", field(REC_HIDDENAREAS), 24)? {
            self.string_at(entry + 16)?;
        }
        self.attributes(field(REC_ATTRIBUTES))?;
        for entry in self.vector("blobs", field(REC_BLOBS), 16)? {
            let data = read_u32(self.bytes, entry + 8) as usize;
            let len = read_u32(self.bytes, entry + 12) as usize;
            self.range("blob data", data, len)?;
        }
        Ok(())
    }
}
