use crate::error::ParseError;

/// Bounds-checked reader over a window of a DNS message.
///
/// Every read is checked against the end of the window before any byte is
/// touched, so malformed length fields can never move the cursor past the
/// caller's bound. The full message stays reachable through [`message`] for
/// following compression pointers.
///
/// [`message`]: WireCursor::message
#[derive(Debug, Clone)]
pub struct WireCursor<'a> {
    buf: &'a [u8],
    pos: usize,
    end: usize,
}

impl<'a> WireCursor<'a> {
    /// Cursor over the whole buffer
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            end: buf.len(),
        }
    }

    /// Cursor over `len` bytes starting at `start`, with `buf` available as
    /// compression context
    pub fn with_window(buf: &'a [u8], start: usize, len: usize) -> Result<Self, ParseError> {
        let end = start
            .checked_add(len)
            .ok_or(ParseError::BufferTooSmall {
                need: usize::MAX,
                have: buf.len(),
            })?;
        if end > buf.len() {
            return Err(ParseError::BufferTooSmall {
                need: end,
                have: buf.len(),
            });
        }
        Ok(Self {
            buf,
            pos: start,
            end,
        })
    }

    /// Absolute offset of the next byte in the message
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.end - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos == self.end
    }

    /// The complete message this cursor reads from
    pub fn message(&self) -> &'a [u8] {
        self.buf
    }

    fn ensure(&self, n: usize) -> Result<(), ParseError> {
        if n > self.remaining() {
            return Err(ParseError::BufferTooSmall {
                need: n,
                have: self.remaining(),
            });
        }
        Ok(())
    }

    pub fn peek_u8(&self) -> Result<u8, ParseError> {
        self.ensure(1)?;
        Ok(self.buf[self.pos])
    }

    pub fn read_u8(&mut self) -> Result<u8, ParseError> {
        let value = self.peek_u8()?;
        self.pos += 1;
        Ok(value)
    }

    pub fn read_u16(&mut self) -> Result<u16, ParseError> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, ParseError> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], ParseError> {
        self.ensure(n)?;
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    /// Read a field prefixed by a one-byte length
    pub fn read_length_prefixed(&mut self) -> Result<&'a [u8], ParseError> {
        let len = self.peek_u8()? as usize;
        self.ensure(1 + len)?;
        self.pos += 1;
        self.read_bytes(len)
    }

    /// Consume everything left in the window
    pub fn read_rest(&mut self) -> &'a [u8] {
        let bytes = &self.buf[self.pos..self.end];
        self.pos = self.end;
        bytes
    }

    pub fn skip(&mut self, n: usize) -> Result<(), ParseError> {
        self.ensure(n)?;
        self.pos += n;
        Ok(())
    }
}
