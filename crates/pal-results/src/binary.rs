//! Unformatted sequential binary files.
//!
//! Every record is framed by a 4-byte length marker at both ends. A keyword is
//! a 16-byte header record (8-char name, element count, 4-char type) followed
//! by data records holding at most 1000 numeric or 105 string elements each.
//! Byte order is detected from the first marker, which always frames a header.

use std::path::Path;

use crate::{DecodeError, DecodeResult};

const HEADER_LEN: usize = 16;
const NUMERIC_BLOCK: usize = 1000;
const CHAR_BLOCK: usize = 105;
const CHAR_WIDTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Big,
    Little,
}

impl Endian {
    fn i32(self, bytes: [u8; 4]) -> i32 {
        match self {
            Self::Big => i32::from_be_bytes(bytes),
            Self::Little => i32::from_le_bytes(bytes),
        }
    }

    fn f32(self, bytes: [u8; 4]) -> f32 {
        match self {
            Self::Big => f32::from_be_bytes(bytes),
            Self::Little => f32::from_le_bytes(bytes),
        }
    }

    fn f64(self, bytes: [u8; 8]) -> f64 {
        match self {
            Self::Big => f64::from_be_bytes(bytes),
            Self::Little => f64::from_le_bytes(bytes),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BinData {
    Inte(Vec<i32>),
    Real(Vec<f32>),
    Doub(Vec<f64>),
    Logi(Vec<bool>),
    Char(Vec<String>),
    Mess,
}

impl BinData {
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::Inte(_) => "INTE",
            Self::Real(_) => "REAL",
            Self::Doub(_) => "DOUB",
            Self::Logi(_) => "LOGI",
            Self::Char(_) => "CHAR",
            Self::Mess => "MESS",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Inte(v) => v.len(),
            Self::Real(v) => v.len(),
            Self::Doub(v) => v.len(),
            Self::Logi(v) => v.len(),
            Self::Char(v) => v.len(),
            Self::Mess => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_ints(&self) -> Option<&[i32]> {
        match self {
            Self::Inte(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_strings(&self) -> Option<&[String]> {
        match self {
            Self::Char(v) => Some(v),
            _ => None,
        }
    }

    /// Numeric payload widened to f64.
    pub fn to_f64(&self) -> Option<Vec<f64>> {
        match self {
            Self::Real(v) => Some(v.iter().map(|x| f64::from(*x)).collect()),
            Self::Doub(v) => Some(v.clone()),
            Self::Inte(v) => Some(v.iter().map(|x| f64::from(*x)).collect()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinKeyword {
    pub name: String,
    /// Byte offset of the header record.
    pub offset: u64,
    pub data: BinData,
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
    endian: Endian,
    source: &'a str,
}

impl<'a> Cursor<'a> {
    fn record_error(&self, offset: usize, expected: usize, found: usize, message: impl Into<String>) -> DecodeError {
        DecodeError::Record {
            source_name: self.source.to_string(),
            offset: offset as u64,
            expected,
            found,
            message: message.into(),
        }
    }

    fn marker(&self, at: usize) -> DecodeResult<i32> {
        let slice = self
            .bytes
            .get(at..at + 4)
            .ok_or_else(|| self.record_error(at, 4, self.bytes.len().saturating_sub(at), "truncated record marker"))?;
        Ok(self.endian.i32([slice[0], slice[1], slice[2], slice[3]]))
    }

    /// Next record payload; checks that head and tail markers agree.
    fn record(&mut self) -> DecodeResult<&'a [u8]> {
        let start = self.pos;
        let head = self.marker(start)?;
        let len = usize::try_from(head)
            .map_err(|_| self.record_error(start, 0, 0, format!("negative record length {head}")))?;
        let body = start + 4;
        let available = self.bytes.len().saturating_sub(body);
        if len + 4 > available {
            return Err(self.record_error(start, len, available, "truncated record"));
        }
        let tail = self.marker(body + len)?;
        if tail != head {
            return Err(self.record_error(
                start,
                len,
                usize::try_from(tail).unwrap_or(0),
                "record head and tail markers disagree",
            ));
        }
        self.pos = body + len + 4;
        Ok(&self.bytes[body..body + len])
    }
}

fn ascii(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim_end().to_string()
}

fn detect_endian(bytes: &[u8], source: &str) -> DecodeResult<Endian> {
    let Some(first) = bytes.get(0..4) else {
        return Err(DecodeError::Record {
            source_name: source.to_string(),
            offset: 0,
            expected: 4,
            found: bytes.len(),
            message: "file too short for a record marker".to_string(),
        });
    };
    let raw = [first[0], first[1], first[2], first[3]];
    if i32::from_be_bytes(raw) == HEADER_LEN as i32 {
        Ok(Endian::Big)
    } else if i32::from_le_bytes(raw) == HEADER_LEN as i32 {
        Ok(Endian::Little)
    } else {
        Err(DecodeError::Record {
            source_name: source.to_string(),
            offset: 0,
            expected: HEADER_LEN,
            found: i32::from_be_bytes(raw).max(0) as usize,
            message: "first record is not a keyword header".to_string(),
        })
    }
}

/// Decode every keyword in `bytes`. `source` names the stream in errors.
pub fn decode(bytes: &[u8], source: &str) -> DecodeResult<Vec<BinKeyword>> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    let endian = detect_endian(bytes, source)?;
    let mut cur = Cursor {
        bytes,
        pos: 0,
        endian,
        source,
    };
    let mut keywords = Vec::new();

    while cur.pos < bytes.len() {
        let offset = cur.pos;
        let header = cur.record()?;
        if header.len() != HEADER_LEN {
            return Err(cur.record_error(offset, HEADER_LEN, header.len(), "keyword header has wrong length"));
        }
        let name = ascii(&header[0..8]);
        let count = endian.i32([header[8], header[9], header[10], header[11]]);
        let count = usize::try_from(count).map_err(|_| {
            cur.record_error(offset, 0, 0, format!("keyword {name} has negative element count {count}"))
        })?;
        let tag = ascii(&header[12..16]);

        let (width, block) = match tag.as_str() {
            "INTE" | "REAL" | "LOGI" => (4, NUMERIC_BLOCK),
            "DOUB" => (8, NUMERIC_BLOCK),
            "CHAR" => (CHAR_WIDTH, CHAR_BLOCK),
            "MESS" => (0, 0),
            other => {
                return Err(DecodeError::Content {
                    source_name: source.to_string(),
                    offset: Some(offset as u64),
                    message: format!("keyword {name} has unknown type '{other}'"),
                });
            }
        };

        let mut payload: Vec<u8> = Vec::with_capacity((count * width).min(bytes.len()));
        let mut remaining = count;
        while width > 0 && remaining > 0 {
            let at = cur.pos;
            let data = cur.record()?;
            let expected = remaining.min(block) * width;
            if data.len() != expected {
                return Err(cur.record_error(
                    at,
                    expected,
                    data.len(),
                    format!("data record of {name} has wrong length"),
                ));
            }
            payload.extend_from_slice(data);
            remaining -= expected / width;
        }

        let words4 = || payload.chunks_exact(4).map(|c| [c[0], c[1], c[2], c[3]]);
        let data = match tag.as_str() {
            "INTE" => BinData::Inte(words4().map(|w| endian.i32(w)).collect()),
            "REAL" => BinData::Real(words4().map(|w| endian.f32(w)).collect()),
            "LOGI" => BinData::Logi(words4().map(|w| endian.i32(w) != 0).collect()),
            "DOUB" => BinData::Doub(
                payload
                    .chunks_exact(8)
                    .map(|c| endian.f64([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                    .collect(),
            ),
            "CHAR" => BinData::Char(payload.chunks_exact(CHAR_WIDTH).map(ascii).collect()),
            _ => BinData::Mess,
        };

        keywords.push(BinKeyword {
            name,
            offset: offset as u64,
            data,
        });
    }

    Ok(keywords)
}

pub fn read_file(path: &Path) -> DecodeResult<Vec<BinKeyword>> {
    let bytes = std::fs::read(path).map_err(|source| DecodeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let name = path.display().to_string();
    decode(&bytes, &name)
}

/// Encoder for the same format, used for fixtures and recorded runs.
#[derive(Debug, Clone)]
pub struct BinaryWriter {
    buf: Vec<u8>,
    endian: Endian,
}

impl BinaryWriter {
    pub fn new(endian: Endian) -> Self {
        Self {
            buf: Vec::new(),
            endian,
        }
    }

    fn i32_bytes(&self, v: i32) -> [u8; 4] {
        match self.endian {
            Endian::Big => v.to_be_bytes(),
            Endian::Little => v.to_le_bytes(),
        }
    }

    fn record(&mut self, payload: &[u8]) {
        let marker = self.i32_bytes(payload.len() as i32);
        self.buf.extend_from_slice(&marker);
        self.buf.extend_from_slice(payload);
        self.buf.extend_from_slice(&marker);
    }

    fn padded(text: &str, width: usize) -> Vec<u8> {
        let mut bytes: Vec<u8> = text.bytes().take(width).collect();
        bytes.resize(width, b' ');
        bytes
    }

    /// Append one keyword. Names longer than 8 characters are truncated.
    pub fn keyword(&mut self, name: &str, data: &BinData) -> &mut Self {
        let mut header = Self::padded(name, 8);
        header.extend_from_slice(&self.i32_bytes(data.len() as i32));
        header.extend_from_slice(&Self::padded(data.type_tag(), 4));
        self.record(&header);

        let endian = self.endian;
        let (elements, block): (Vec<Vec<u8>>, usize) = match data {
            BinData::Inte(v) => (v.iter().map(|x| self.i32_bytes(*x).to_vec()).collect(), NUMERIC_BLOCK),
            BinData::Logi(v) => (
                v.iter().map(|x| self.i32_bytes(if *x { -1 } else { 0 }).to_vec()).collect(),
                NUMERIC_BLOCK,
            ),
            BinData::Real(v) => (
                v.iter()
                    .map(|x| match endian {
                        Endian::Big => x.to_be_bytes().to_vec(),
                        Endian::Little => x.to_le_bytes().to_vec(),
                    })
                    .collect(),
                NUMERIC_BLOCK,
            ),
            BinData::Doub(v) => (
                v.iter()
                    .map(|x| match endian {
                        Endian::Big => x.to_be_bytes().to_vec(),
                        Endian::Little => x.to_le_bytes().to_vec(),
                    })
                    .collect(),
                NUMERIC_BLOCK,
            ),
            BinData::Char(v) => (v.iter().map(|s| Self::padded(s, CHAR_WIDTH)).collect(), CHAR_BLOCK),
            BinData::Mess => (Vec::new(), 1),
        };
        for chunk in elements.chunks(block) {
            let payload: Vec<u8> = chunk.concat();
            self.record(&payload);
        }
        self
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_to(&self, path: &Path) -> DecodeResult<()> {
        std::fs::write(path, &self.buf).map_err(|source| DecodeError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
