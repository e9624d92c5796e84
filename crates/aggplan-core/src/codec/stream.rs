use crate::codec::CodecError;

// A u32 vint never needs more than five 7-bit groups.
const MAX_VINT_BYTES: usize = 5;

///
/// StreamOutput
///
/// Append-only byte sink for the descriptor format.
///

#[derive(Clone, Debug, Default)]
pub struct StreamOutput {
    bytes: Vec<u8>,
}

impl StreamOutput {
    #[must_use]
    pub const fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    /// Variable-length int: low seven bits first, high bit set on every
    /// byte but the last.
    pub fn write_vint(&mut self, mut value: u32) {
        while value >= 0x80 {
            #[allow(clippy::cast_possible_truncation)]
            self.bytes.push((value as u8 & 0x7f) | 0x80);
            value >>= 7;
        }
        #[allow(clippy::cast_possible_truncation)]
        self.bytes.push(value as u8);
    }

    /// Write a length as a vint; lengths past `u32::MAX` are rejected.
    pub fn write_len(&mut self, len: usize) -> Result<(), CodecError> {
        let len = u32::try_from(len).map_err(|_| CodecError::LengthOverflow { len })?;
        self.write_vint(len);

        Ok(())
    }

    pub fn write_bool(&mut self, value: bool) {
        self.bytes.push(u8::from(value));
    }

    /// Byte-length-prefixed UTF-8.
    pub fn write_string(&mut self, value: &str) -> Result<(), CodecError> {
        self.write_len(value.len())?;
        self.bytes.extend_from_slice(value.as_bytes());

        Ok(())
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

///
/// StreamInput
///
/// Cursor over an untrusted descriptor payload. Every read is bounds
/// checked and reports the offset it failed at.
///

#[derive(Clone, Debug)]
pub struct StreamInput<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> StreamInput<'a> {
    #[must_use]
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        let byte = *self
            .bytes
            .get(self.offset)
            .ok_or(CodecError::UnexpectedEnd {
                offset: self.offset,
            })?;
        self.offset += 1;

        Ok(byte)
    }

    pub fn read_vint(&mut self) -> Result<u32, CodecError> {
        let start = self.offset;
        let mut value = 0u32;

        for group in 0..MAX_VINT_BYTES {
            let byte = self.read_u8()?;
            let bits = u32::from(byte & 0x7f);

            // the fifth group may only carry the top four bits
            if group == MAX_VINT_BYTES - 1 && bits > 0x0f {
                return Err(CodecError::VIntTooLong { offset: start });
            }
            value |= bits << (7 * group);

            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }

        Err(CodecError::VIntTooLong { offset: start })
    }

    /// Read a vint length and check it against what is left in the input.
    pub fn read_len(&mut self) -> Result<usize, CodecError> {
        let offset = self.offset;
        let len = self.read_vint()? as usize;
        if len > self.remaining() {
            return Err(CodecError::LengthOutOfBounds {
                offset,
                len,
                remaining: self.remaining(),
            });
        }

        Ok(len)
    }

    pub fn read_bool(&mut self) -> Result<bool, CodecError> {
        let offset = self.offset;
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            byte => Err(CodecError::InvalidBool { offset, byte }),
        }
    }

    pub fn read_string(&mut self) -> Result<&'a str, CodecError> {
        let len = self.read_len()?;
        let start = self.offset;
        let bytes = &self.bytes[start..start + len];
        self.offset += len;

        std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8 { offset: start })
    }
}
