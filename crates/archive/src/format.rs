//! Binary layout of a save file.
//!
//! ```text
//! [4B "YOKI"][4B schema_version][4B slot_id][8B created_at][8B last_saved_at]
//! [4B name_len][name_len B UTF-8 name][payload]
//! ```
//!
//! The payload is the module table, optionally encrypted as a whole:
//!
//! ```text
//! [4B count]{[4B key][4B len][len B data]}*count
//! ```
//!
//! Integers are little-endian. Decoders never panic and never allocate more than the input
//! can back, since a wrong decryption key hands them arbitrary bytes.

use crate::error::ArchiveError;
use crate::module::ModuleKey;
use serde::{Deserialize, Serialize};

/// File magic. The only validity signal readable without decrypting.
pub const MAGIC: [u8; 4] = *b"YOKI";

/// Bytes before the display name: magic, version, slot, two timestamps, name length.
pub const FIXED_HEADER_LEN: usize = 4 + 4 + 4 + 8 + 8 + 4;

/// Upper bound on the encoded display name.
pub const MAX_NAME_LEN: usize = 4 * 1024;

/// Metadata stored in front of every save file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArchiveHeader {
    pub schema_version: i32,
    pub slot_id: i32,
    /// Unix seconds of the first save into this slot.
    pub created_at: i64,
    /// Unix seconds of the most recent save.
    pub last_saved_at: i64,
    pub display_name: String,
}

impl ArchiveHeader {
    /// A header for a slot that has never been saved.
    #[must_use]
    pub fn new(slot_id: i32, schema_version: i32, now: i64, display_name: impl Into<String>) -> Self {
        Self {
            schema_version,
            slot_id,
            created_at: now,
            last_saved_at: now,
            display_name: display_name.into(),
        }
    }

    /// Length of this header once encoded.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        FIXED_HEADER_LEN + self.display_name.len()
    }
}

/// One `{key, bytes}` row of the module table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableEntry {
    pub key: ModuleKey,
    pub data: Vec<u8>,
}

/// Encodes a header.
///
/// # Errors
///
/// Returns [`ArchiveError::InvalidFormat`] when the display name exceeds [`MAX_NAME_LEN`].
pub fn encode_header(header: &ArchiveHeader) -> Result<Vec<u8>, ArchiveError> {
    let name = header.display_name.as_bytes();
    if name.len() > MAX_NAME_LEN {
        return Err(ArchiveError::InvalidFormat {
            message: format!("Display name is {} bytes, limit is {MAX_NAME_LEN}", name.len())
                .into(),
            context: Some("Encoding header".into()),
        });
    }

    let mut buf = Vec::with_capacity(header.encoded_len());
    buf.extend_from_slice(&MAGIC);
    buf.extend_from_slice(&header.schema_version.to_le_bytes());
    buf.extend_from_slice(&header.slot_id.to_le_bytes());
    buf.extend_from_slice(&header.created_at.to_le_bytes());
    buf.extend_from_slice(&header.last_saved_at.to_le_bytes());
    buf.extend_from_slice(&(name.len() as u32).to_le_bytes());
    buf.extend_from_slice(name);
    Ok(buf)
}

/// `true` when `bytes` starts with [`MAGIC`].
#[must_use]
pub fn has_magic(bytes: &[u8]) -> bool {
    bytes.starts_with(&MAGIC)
}

/// Total header length declared by the fixed prefix of a file.
///
/// Lets a caller read the first [`FIXED_HEADER_LEN`] bytes, then exactly the rest of the
/// header, without touching the payload.
///
/// # Errors
///
/// Returns [`ArchiveError::InvalidFormat`] on a bad magic, a short prefix, or a declared
/// name longer than [`MAX_NAME_LEN`].
pub fn declared_header_len(prefix: &[u8]) -> Result<usize, ArchiveError> {
    let mut cursor = Cursor::new(prefix);
    check_magic(&mut cursor)?;
    cursor.skip(FIXED_HEADER_LEN - 4 - 4, "header fields")?;
    let name_len = cursor.u32("name length")? as usize;
    if name_len > MAX_NAME_LEN {
        return Err(ArchiveError::invalid(format!(
            "Declared name length {name_len} exceeds {MAX_NAME_LEN}"
        )));
    }
    Ok(FIXED_HEADER_LEN + name_len)
}

/// Decodes a header from the start of `bytes`.
///
/// Returns the header and the number of bytes it occupied; the payload starts there.
///
/// # Errors
///
/// Returns [`ArchiveError::InvalidFormat`] on a bad magic, truncation, an oversize name, or
/// a name that is not UTF-8. The magic is checked before anything else.
pub fn decode_header(bytes: &[u8]) -> Result<(ArchiveHeader, usize), ArchiveError> {
    let mut cursor = Cursor::new(bytes);
    check_magic(&mut cursor)?;

    let schema_version = cursor.i32("schema version")?;
    let slot_id = cursor.i32("slot id")?;
    let created_at = cursor.i64("created at")?;
    let last_saved_at = cursor.i64("last saved at")?;
    let name_len = cursor.u32("name length")? as usize;
    if name_len > MAX_NAME_LEN {
        return Err(ArchiveError::invalid(format!(
            "Declared name length {name_len} exceeds {MAX_NAME_LEN}"
        )));
    }
    let name = cursor.take(name_len, "display name")?;
    let display_name = std::str::from_utf8(name)
        .map_err(|_| ArchiveError::invalid("Display name is not valid UTF-8"))?
        .to_owned();

    let header = ArchiveHeader { schema_version, slot_id, created_at, last_saved_at, display_name };
    Ok((header, cursor.position()))
}

/// Encodes the module table.
///
/// # Errors
///
/// Returns [`ArchiveError::InvalidFormat`] when a count or a length does not fit in `i32`.
pub fn encode_table(entries: &[TableEntry]) -> Result<Vec<u8>, ArchiveError> {
    let count = i32::try_from(entries.len())
        .map_err(|_| ArchiveError::invalid(format!("{} modules do not fit", entries.len())))?;

    let capacity = 4 + entries.iter().map(|e| 8 + e.data.len()).sum::<usize>();
    let mut buf = Vec::with_capacity(capacity);
    buf.extend_from_slice(&count.to_le_bytes());

    for entry in entries {
        let len = i32::try_from(entry.data.len()).map_err(|_| ArchiveError::InvalidFormat {
            message: format!("Module is {} bytes", entry.data.len()).into(),
            context: Some(format!("Module {}", entry.key).into()),
        })?;
        buf.extend_from_slice(&entry.key.get().to_le_bytes());
        buf.extend_from_slice(&len.to_le_bytes());
        buf.extend_from_slice(&entry.data);
    }

    Ok(buf)
}

/// Decodes the module table.
///
/// # Errors
///
/// Returns [`ArchiveError::InvalidFormat`] on a negative count or length, an entry running
/// past the buffer, a duplicate key, or trailing bytes.
pub fn decode_table(bytes: &[u8]) -> Result<Vec<TableEntry>, ArchiveError> {
    let mut cursor = Cursor::new(bytes);
    let count = cursor.i32("module count")?;
    let count = usize::try_from(count)
        .map_err(|_| ArchiveError::invalid(format!("Negative module count {count}")))?;

    // Every entry needs at least its key and length.
    if count > cursor.remaining() / 8 {
        return Err(ArchiveError::invalid(format!(
            "Module count {count} cannot fit in {} bytes",
            cursor.remaining()
        )));
    }

    let mut entries: Vec<TableEntry> = Vec::with_capacity(count);
    for _ in 0..count {
        let key = ModuleKey::from_raw(cursor.i32("module key")?);
        let len = cursor.i32("module length")?;
        let len = usize::try_from(len).map_err(|_| ArchiveError::InvalidFormat {
            message: format!("Negative module length {len}").into(),
            context: Some(format!("Module {key}").into()),
        })?;
        let data = cursor.take(len, "module data")?.to_vec();

        if entries.iter().any(|e| e.key == key) {
            return Err(ArchiveError::InvalidFormat {
                message: "Duplicate module key".into(),
                context: Some(format!("Module {key}").into()),
            });
        }
        entries.push(TableEntry { key, data });
    }

    if cursor.remaining() != 0 {
        return Err(ArchiveError::invalid(format!(
            "{} trailing bytes after module table",
            cursor.remaining()
        )));
    }

    Ok(entries)
}

fn check_magic(cursor: &mut Cursor<'_>) -> Result<(), ArchiveError> {
    let magic = cursor.take(MAGIC.len(), "magic")?;
    if magic == MAGIC {
        Ok(())
    } else {
        Err(ArchiveError::InvalidFormat {
            message: format!("Bad magic {magic:02x?}").into(),
            context: Some("Not a save file".into()),
        })
    }
}

/// Forward-only reader over a byte slice.
struct Cursor<'a> {
    rest: &'a [u8],
    consumed: usize,
}

impl<'a> Cursor<'a> {
    const fn new(bytes: &'a [u8]) -> Self {
        Self { rest: bytes, consumed: 0 }
    }

    const fn position(&self) -> usize {
        self.consumed
    }

    const fn remaining(&self) -> usize {
        self.rest.len()
    }

    fn take(&mut self, len: usize, what: &'static str) -> Result<&'a [u8], ArchiveError> {
        if len > self.rest.len() {
            return Err(ArchiveError::InvalidFormat {
                message: format!("Need {len} bytes, {} left", self.rest.len()).into(),
                context: Some(format!("Truncated {what}").into()),
            });
        }
        let (head, tail) = self.rest.split_at(len);
        self.rest = tail;
        self.consumed += len;
        Ok(head)
    }

    fn skip(&mut self, len: usize, what: &'static str) -> Result<(), ArchiveError> {
        self.take(len, what).map(|_| ())
    }

    fn array<const N: usize>(&mut self, what: &'static str) -> Result<[u8; N], ArchiveError> {
        let Some((head, tail)) = self.rest.split_first_chunk::<N>() else {
            return Err(ArchiveError::InvalidFormat {
                message: format!("Need {N} bytes, {} left", self.rest.len()).into(),
                context: Some(format!("Truncated {what}").into()),
            });
        };
        self.rest = tail;
        self.consumed += N;
        Ok(*head)
    }

    fn i32(&mut self, what: &'static str) -> Result<i32, ArchiveError> {
        self.array(what).map(i32::from_le_bytes)
    }

    fn u32(&mut self, what: &'static str) -> Result<u32, ArchiveError> {
        self.array(what).map(u32::from_le_bytes)
    }

    fn i64(&mut self, what: &'static str) -> Result<i64, ArchiveError> {
        self.array(what).map(i64::from_le_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(name: &str) -> ArchiveHeader {
        ArchiveHeader {
            schema_version: 3,
            slot_id: 7,
            created_at: 1_700_000_000,
            last_saved_at: 1_700_000_123,
            display_name: name.to_owned(),
        }
    }

    #[test]
    fn header_layout_is_little_endian() {
        let bytes = encode_header(&header("Ab")).unwrap();

        assert_eq!(&bytes[..4], b"YOKI");
        assert_eq!(&bytes[4..8], &[3, 0, 0, 0]);
        assert_eq!(&bytes[8..12], &[7, 0, 0, 0]);
        assert_eq!(&bytes[28..32], &[2, 0, 0, 0]);
        assert_eq!(&bytes[32..], b"Ab");
        assert_eq!(bytes.len(), header("Ab").encoded_len());
    }

    #[test]
    fn header_decodes_with_trailing_payload() {
        let original = header("Forêt 98%");
        let mut bytes = encode_header(&original).unwrap();
        let header_len = bytes.len();
        bytes.extend_from_slice(b"payload");

        let (decoded, consumed) = decode_header(&bytes).unwrap();
        assert_eq!(decoded, original);
        assert_eq!(consumed, header_len);
        assert_eq!(declared_header_len(&bytes[..FIXED_HEADER_LEN]).unwrap(), header_len);
    }

    #[test]
    fn magic_is_checked_first() {
        let err = decode_header(b"NOPE").unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidFormat { context: Some(ref c), .. } if c == "Not a save file"));
        assert!(!has_magic(b"YOK"));
    }

    #[test]
    fn truncated_and_oversize_headers_are_rejected() {
        let bytes = encode_header(&header("slot")).unwrap();
        for cut in 0..bytes.len() {
            assert!(decode_header(&bytes[..cut]).is_err(), "cut at {cut}");
        }

        let mut oversize = bytes[..FIXED_HEADER_LEN].to_vec();
        oversize[28..32].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(declared_header_len(&oversize).is_err());
        assert!(decode_header(&oversize).is_err());

        assert!(encode_header(&header(&"x".repeat(MAX_NAME_LEN + 1))).is_err());
    }

    #[test]
    fn non_utf8_name_is_rejected() {
        let mut bytes = encode_header(&header("ab")).unwrap();
        bytes[32] = 0xFF;
        assert!(decode_header(&bytes).is_err());
    }

    #[test]
    fn table_roundtrip_preserves_order_and_bytes() {
        let entries = vec![
            TableEntry { key: ModuleKey::from_raw(-5), data: vec![] },
            TableEntry { key: ModuleKey::from_raw(9), data: vec![1, 2, 3] },
        ];
        let bytes = encode_table(&entries).unwrap();
        assert_eq!(bytes.len(), 4 + 8 + 8 + 3);
        assert_eq!(decode_table(&bytes).unwrap(), entries);
        assert_eq!(decode_table(&encode_table(&[]).unwrap()).unwrap(), vec![]);
    }

    #[test]
    fn table_rejects_malformed_input() {
        let valid = encode_table(&[TableEntry { key: ModuleKey::from_raw(1), data: vec![7; 4] }])
            .unwrap();

        let mut negative_count = valid.clone();
        negative_count[..4].copy_from_slice(&(-1i32).to_le_bytes());

        let mut huge_count = valid.clone();
        huge_count[..4].copy_from_slice(&i32::MAX.to_le_bytes());

        let mut negative_len = valid.clone();
        negative_len[8..12].copy_from_slice(&(-4i32).to_le_bytes());

        let mut overrun = valid.clone();
        overrun[8..12].copy_from_slice(&5i32.to_le_bytes());

        let mut trailing = valid.clone();
        trailing.push(0);

        let duplicate = encode_table(&[
            TableEntry { key: ModuleKey::from_raw(1), data: vec![] },
            TableEntry { key: ModuleKey::from_raw(1), data: vec![] },
        ])
        .unwrap();

        for (name, bytes) in [
            ("negative count", negative_count),
            ("huge count", huge_count),
            ("negative length", negative_len),
            ("overrun", overrun),
            ("trailing", trailing),
            ("duplicate", duplicate),
            ("empty", Vec::new()),
        ] {
            assert!(
                matches!(decode_table(&bytes), Err(ArchiveError::InvalidFormat { .. })),
                "{name} must be rejected"
            );
        }
    }
}
