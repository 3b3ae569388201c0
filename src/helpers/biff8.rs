//! Record reader for the BIFF8 workbook stream of legacy .xls files.
//!
//! A logical record is its header record plus any CONTINUE records that
//! follow it. Reads walk across those segments transparently, which matters
//! for shared strings that are split mid-way by the 8224 byte record limit.

use crate::error::DecodeError;
use crate::helpers::string::to_f64;
use crate::helpers::string::to_u16;
use crate::helpers::string::to_u32;
use crate::helpers::string::to_u64;
use crate::helpers::string::to_usize;
use encoding_rs::Encoding;
use encoding_rs::UTF_16LE;
use encoding_rs::WINDOWS_1252;
use thiserror::Error;

const CONTINUE: u16 = 0x003C;
const HEADER_SIZE: usize = 4;

#[derive(Error, Debug)]
pub enum Biff8Error {
    #[error("record truncated, {needed} more bytes expected")]
    Truncated { needed: usize },
}

/// Byte range of one physical record body inside the stream.
#[derive(Clone, Copy, Debug)]
struct Segment {
    start: usize,
    end: usize,
}

impl Segment {
    fn len(&self) -> usize {
        self.end - self.start
    }
}

pub(crate) struct Biff8Reader {
    /// Code page for 8-bit strings; replaced once the CODEPAGE record is seen.
    pub(crate) encoding: &'static Encoding,
    stream: Vec<u8>,
    next_header: usize,
    segments: Vec<Segment>,
    segment: usize,
    cursor: usize,
}

impl Biff8Reader {
    pub(crate) fn new(stream: Vec<u8>) -> Biff8Reader {
        Biff8Reader {
            encoding: WINDOWS_1252,
            stream,
            next_header: 0,
            segments: Vec::new(),
            segment: 0,
            cursor: 0,
        }
    }

    /// Advances to the next logical record and returns its type, or `None`
    /// at the end of the stream.
    pub(crate) fn next(&mut self) -> Result<Option<u16>, DecodeError> {
        let Some((kind, first)) = self.header_at(self.next_header)? else {
            return Ok(None);
        };

        self.segments.clear();
        self.segments.push(first);
        self.next_header = first.end;
        while let Some((CONTINUE, segment)) = self.header_at(self.next_header)? {
            self.segments.push(segment);
            self.next_header = segment.end;
        }

        self.segment = 0;
        self.cursor = 0;
        Ok(Some(kind))
    }

    /// Moves the record pointer to an absolute stream offset, such as a
    /// sheet's BOF taken from its BOUNDSHEET record.
    pub(crate) fn goto(&mut self, offset: usize) {
        self.next_header = offset;
    }

    fn header_at(&self, offset: usize) -> Result<Option<(u16, Segment)>, DecodeError> {
        if offset + HEADER_SIZE > self.stream.len() {
            return Ok(None);
        }
        let kind = self.get_u16_at(offset)?;
        let size = self.get_u16_at(offset + 2)? as usize;
        let start = offset + HEADER_SIZE;
        let end = self.stream.len().min(start + size);
        Ok(Some((kind, Segment { start, end })))
    }

    /// Takes at most `length` bytes, never crossing into the next segment.
    fn take(&mut self, length: usize) -> &[u8] {
        let Some(segment) = self.segments.get(self.segment).copied() else {
            return &[];
        };
        let from = segment.end.min(segment.start + self.cursor);
        let to = segment.end.min(from + length);
        if to == segment.end {
            self.segment += 1;
            self.cursor = 0;
        } else {
            self.cursor += to - from;
        }
        &self.stream[from..to]
    }

    fn take_exact(&mut self, length: usize) -> Result<&[u8], DecodeError> {
        let bytes = self.take(length);
        if bytes.len() < length {
            return Err(Biff8Error::Truncated { needed: length - bytes.len() }.into());
        }
        Ok(bytes)
    }

    pub(crate) fn skip(&mut self, length: usize) -> Result<(), DecodeError> {
        self.take_exact(length).map(|_| ())
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take_exact(1)?[0])
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16, DecodeError> {
        self.take_exact(2).map(to_u16)
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, DecodeError> {
        self.take_exact(4).map(to_u32)
    }

    pub(crate) fn read_usize(&mut self) -> Result<usize, DecodeError> {
        self.take_exact(4).map(to_usize)
    }

    pub(crate) fn read_u64(&mut self) -> Result<u64, DecodeError> {
        self.take_exact(8).map(to_u64)
    }

    pub(crate) fn read_f64(&mut self) -> Result<f64, DecodeError> {
        self.take_exact(8).map(to_f64)
    }

    /// Reads the `u16` ending `distance` bytes before the end of the current
    /// logical record. MULRK stores its last column there.
    pub(crate) fn get_u16_back(&self, distance: usize) -> Result<u16, DecodeError> {
        let mut remaining = distance;
        for segment in self.segments.iter().rev() {
            if remaining <= segment.len() {
                return self.get_u16_at(segment.end - remaining);
            }
            remaining -= segment.len();
        }
        Err(Biff8Error::Truncated { needed: remaining }.into())
    }

    pub(crate) fn get_u16_at(&self, offset: usize) -> Result<u16, DecodeError> {
        self.stream
            .get(offset..offset + 2)
            .map(to_u16)
            .ok_or_else(|| Biff8Error::Truncated { needed: 2 }.into())
    }

    /// Reads an RK value, the 30-bit packed number used by RK and MULRK.
    ///
    /// Bit 0 divides the value by 100, bit 1 marks a signed integer. Otherwise
    /// the upper 30 bits are the high bits of an IEEE double.
    pub(crate) fn read_rk_number(&mut self) -> Result<String, DecodeError> {
        let raw = self.read_u32()?;
        let scaled = raw & 0x01 != 0;

        if raw & 0x02 != 0 {
            let integer = (raw as i32) >> 2;
            return Ok(if scaled {
                (integer as f64 / 100.0).to_string()
            } else {
                integer.to_string()
            });
        }

        let value = f64::from_bits(u64::from(raw & !0x03) << 32);
        Ok(if scaled { value / 100.0 } else { value }.to_string())
    }

    /// ShortXLUnicodeString: 8-bit character count.
    pub(crate) fn read_short_xl_unicode_string(&mut self) -> Result<String, DecodeError> {
        let chars = usize::from(self.read_u8()?);
        let mut text = String::with_capacity(chars);
        self.read_characters(chars, false, &mut text)?;
        Ok(text)
    }

    /// XLUnicodeString: 16-bit character count.
    pub(crate) fn read_xl_unicode_string(&mut self) -> Result<String, DecodeError> {
        let chars = usize::from(self.read_u16()?);
        let mut text = String::with_capacity(chars);
        self.read_characters(chars, false, &mut text)?;
        Ok(text)
    }

    /// XLUnicodeRichExtendedString, as found in the shared string table.
    ///
    /// When the characters run past a segment boundary the remainder starts
    /// with a fresh option byte, so the encoding may switch half-way.
    pub(crate) fn read_xl_unicode_rich_extended_string(&mut self) -> Result<String, DecodeError> {
        let mut remaining = usize::from(self.read_u16()?);
        let mut text = String::with_capacity(remaining);
        let mut extended = true;
        while remaining > 0 {
            remaining -= self.read_characters(remaining, extended, &mut text)?;
            extended = false;
        }
        if extended {
            // Empty strings still carry their option byte.
            self.read_characters(0, true, &mut text)?;
        }
        Ok(text)
    }

    /// Decodes up to `chars` characters from the current segment and returns
    /// how many were actually available.
    fn read_characters(&mut self, chars: usize, extended: bool, text: &mut String) -> Result<usize, DecodeError> {
        let options = self.read_u8()?;
        let wide = options & 0x01 != 0;
        let runs = if extended && options & 0x08 != 0 {
            usize::from(self.read_u16()?)
        } else {
            0
        };
        let phonetic_size = if extended && options & 0x04 != 0 {
            self.read_usize()?
        } else {
            0
        };

        let width = if wide { 2 } else { 1 };
        let encoding = if wide { UTF_16LE } else { self.encoding };
        let bytes = self.take(chars * width);
        let read = bytes.len() / width;
        let (decoded, _, _) = encoding.decode(bytes);
        text.push_str(&decoded);

        // Formatting runs are four bytes each, then the phonetic block.
        self.skip(4 * runs + phonetic_size)?;
        Ok(read)
    }
}

#[macro_export]
macro_rules! match_biff8_record {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(kind) = $reader.next()? {
            match kind {
                $($arms)*
                _ => (),
            }
        }
    };
}
