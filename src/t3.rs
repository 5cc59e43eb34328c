//! T3 ternary file format.
//!
//! Layout: a 6-byte tag `"T3FMT\0"`, a 1-byte format version, a 4-byte
//! little-endian value count, then one record per value. A record is a
//! length byte L in 1..=63 followed by L balanced ternary digit
//! characters, most significant first. The count is patched into the
//! header when a writer finishes.

use crate::ternary::text::{decode_value, DigitError};
use crate::ternary::encode_value;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;
use thiserror::Error;

/// File extension for ternary data files.
pub const T3_EXTENSION: &str = ".t3";
/// Header tag, trailing NUL included.
pub const T3_TAG: &[u8; 6] = b"T3FMT\0";
/// Format version this build reads and writes.
pub const T3_VERSION: u8 = 1;
/// Longest digit string a value record may carry.
pub const T3_MAX_DIGITS: usize = 63;

/// Byte offset of the count field inside the header.
const COUNT_OFFSET: u64 = 7;

/// Errors that can occur reading or writing T3 files.
#[derive(Debug, Clone, Error)]
pub enum T3Error {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("not a T3 file (bad tag)")]
    BadTag,

    #[error("unsupported T3 version {0}")]
    BadVersion(u8),

    #[error("value record length {0} outside 1..=63")]
    BadLength(u8),

    #[error("corrupt value record: {0}")]
    BadDigits(#[from] DigitError),

    #[error("unexpected end of file inside a record")]
    Truncated,
}

impl From<std::io::Error> for T3Error {
    fn from(e: std::io::Error) -> Self {
        T3Error::Io(e.to_string())
    }
}

/// Streaming T3 writer. Values append as records; [`T3Writer::finish`]
/// seeks back to fix up the header count.
pub struct T3Writer<W: Write + Seek> {
    out: W,
    count: u32,
}

impl T3Writer<BufWriter<File>> {
    /// Create (or truncate) a T3 file on disk and write its header.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, T3Error> {
        let file = File::create(path.as_ref())?;
        Self::new(BufWriter::new(file))
    }
}

impl<W: Write + Seek> T3Writer<W> {
    /// Write the header (count 0 for now) and position at the first record.
    pub fn new(mut out: W) -> Result<Self, T3Error> {
        out.write_all(T3_TAG)?;
        out.write_all(&[T3_VERSION])?;
        out.write_all(&0u32.to_le_bytes())?;
        Ok(Self { out, count: 0 })
    }

    /// Append one value record.
    pub fn write_value(&mut self, value: i32) -> Result<(), T3Error> {
        let digits = encode_value(value);
        // Any i32 fits in 21 digits, far under the record limit
        debug_assert!(digits.len() <= T3_MAX_DIGITS);
        self.out.write_all(&[digits.len() as u8])?;
        self.out.write_all(digits.as_bytes())?;
        self.count += 1;
        Ok(())
    }

    /// Number of values written so far.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Patch the header count, flush, and hand back the stream.
    pub fn finish(mut self) -> Result<W, T3Error> {
        self.out.seek(SeekFrom::Start(COUNT_OFFSET))?;
        self.out.write_all(&self.count.to_le_bytes())?;
        self.out.seek(SeekFrom::End(0))?;
        self.out.flush()?;
        Ok(self.out)
    }
}

/// Streaming T3 reader. The header is validated up front; a tag or
/// version mismatch rejects the whole file.
pub struct T3Reader<R: Read> {
    input: R,
    declared: u32,
}

impl T3Reader<BufReader<File>> {
    /// Open a T3 file from disk and validate its header.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, T3Error> {
        let file = File::open(path.as_ref())?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read> T3Reader<R> {
    /// Validate the header of an open stream.
    pub fn new(mut input: R) -> Result<Self, T3Error> {
        let mut tag = [0u8; 6];
        input.read_exact(&mut tag).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => T3Error::BadTag,
            _ => T3Error::Io(e.to_string()),
        })?;
        if &tag != T3_TAG {
            return Err(T3Error::BadTag);
        }

        let mut rest = [0u8; 5];
        input.read_exact(&mut rest).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => T3Error::Truncated,
            _ => T3Error::Io(e.to_string()),
        })?;
        if rest[0] != T3_VERSION {
            return Err(T3Error::BadVersion(rest[0]));
        }
        let declared = u32::from_le_bytes([rest[1], rest[2], rest[3], rest[4]]);

        Ok(Self { input, declared })
    }

    /// Value count recorded in the header (advisory; records are read to
    /// end of file regardless).
    pub fn declared_count(&self) -> u32 {
        self.declared
    }

    /// Read the next record's raw digit string; `None` at a clean end of
    /// file. Digit validity is checked on decode, not here.
    pub fn read_digits(&mut self) -> Result<Option<String>, T3Error> {
        let mut len = [0u8; 1];
        if let Err(e) = self.input.read_exact(&mut len) {
            return match e.kind() {
                std::io::ErrorKind::UnexpectedEof => Ok(None),
                _ => Err(T3Error::Io(e.to_string())),
            };
        }
        let len = len[0];
        if len == 0 || len as usize > T3_MAX_DIGITS {
            return Err(T3Error::BadLength(len));
        }

        let mut digits = vec![0u8; len as usize];
        self.input.read_exact(&mut digits).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => T3Error::Truncated,
            _ => T3Error::Io(e.to_string()),
        })?;

        // Records are ASCII; anything else fails the digit check on decode
        Ok(Some(String::from_utf8_lossy(&digits).into_owned()))
    }

    /// Read and decode the next value; `None` at a clean end of file.
    pub fn read_value(&mut self) -> Result<Option<i32>, T3Error> {
        match self.read_digits()? {
            Some(digits) => Ok(Some(decode_value(&digits)?)),
            None => Ok(None),
        }
    }

    /// Collect all remaining values.
    pub fn read_all(&mut self) -> Result<Vec<i32>, T3Error> {
        let mut values = Vec::new();
        while let Some(v) = self.read_value()? {
            values.push(v);
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn write_t3(values: &[i32]) -> Vec<u8> {
        let mut w = T3Writer::new(Cursor::new(Vec::new())).unwrap();
        for &v in values {
            w.write_value(v).unwrap();
        }
        w.finish().unwrap().into_inner()
    }

    #[test]
    fn test_round_trip_in_memory() {
        let bytes = write_t3(&[5, -4, 0, i32::MIN, i32::MAX]);
        assert_eq!(&bytes[0..6], T3_TAG);
        assert_eq!(bytes[6], T3_VERSION);

        let mut r = T3Reader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(r.declared_count(), 5);
        assert_eq!(r.read_all().unwrap(), vec![5, -4, 0, i32::MIN, i32::MAX]);
    }

    #[test]
    fn test_finish_patches_count() {
        let bytes = write_t3(&[1, 2, 3]);
        assert_eq!(&bytes[7..11], &3u32.to_le_bytes());
    }

    #[test]
    fn test_rejects_bad_tag() {
        let err = T3Reader::new(Cursor::new(b"NOTT3\0\x01\0\0\0\0".to_vec()))
            .err()
            .unwrap();
        assert!(matches!(err, T3Error::BadTag));

        // Too short to even hold a tag
        let err = T3Reader::new(Cursor::new(b"T3".to_vec())).err().unwrap();
        assert!(matches!(err, T3Error::BadTag));
    }

    #[test]
    fn test_rejects_bad_version() {
        let mut bytes = write_t3(&[1]);
        bytes[6] = 2;
        let err = T3Reader::new(Cursor::new(bytes)).err().unwrap();
        assert!(matches!(err, T3Error::BadVersion(2)));
    }

    #[test]
    fn test_zero_length_record() {
        let mut bytes = write_t3(&[]);
        bytes.push(0);
        let mut r = T3Reader::new(Cursor::new(bytes)).unwrap();
        assert!(matches!(r.read_value(), Err(T3Error::BadLength(0))));
    }

    #[test]
    fn test_truncated_record() {
        let mut bytes = write_t3(&[]);
        bytes.extend_from_slice(&[5, b'1']);
        let mut r = T3Reader::new(Cursor::new(bytes)).unwrap();
        assert!(matches!(r.read_value(), Err(T3Error::Truncated)));
    }

    #[test]
    fn test_invalid_digit_record() {
        let mut bytes = write_t3(&[]);
        bytes.extend_from_slice(&[3, b'1', b'2', b'0']);
        let mut r = T3Reader::new(Cursor::new(bytes)).unwrap();
        assert!(matches!(
            r.read_value(),
            Err(T3Error::BadDigits(DigitError::InvalidDigit('2')))
        ));
    }

    #[test]
    fn test_digit_aliases_accepted() {
        // Hand-built record using the permissive digit alphabet
        let mut bytes = write_t3(&[]);
        bytes.extend_from_slice(&[2, b't', b'+']);
        let mut r = T3Reader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(r.read_value().unwrap(), Some(-2));
    }
}
