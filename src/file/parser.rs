//! Cursor-based byte parser used for mangled type names.
//!
//! Mangled names are short byte strings that mix printable grammar characters with embedded
//! binary symbolic references. [`crate::file::parser::Parser`] walks such a string with
//! bounds-checked reads.
//!
//! # Usage Examples
//!
//! ```rust
//! use swiftscope::Parser;
//!
//! let data = [b'q', b'0', b'_'];
//! let mut parser = Parser::new(&data);
//!
//! assert_eq!(parser.read_le::<u8>()?, b'q');
//! assert_eq!(parser.read_natural()?, Some(0));
//! assert_eq!(parser.read_le::<u8>()?, b'_');
//! assert!(!parser.has_more_data());
//! # Ok::<(), swiftscope::Error>(())
//! ```

use crate::{
    file::io::{read_le_at, ByteIO},
    Result,
};

/// A generic binary data parser over a borrowed byte slice.
///
/// The parser maintains an internal position cursor and provides bounds checking
/// to prevent buffer overruns when reading malformed or truncated data.
pub struct Parser<'a> {
    /// The binary data being parsed
    data: &'a [u8],
    /// Current position within the data buffer
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new [`crate::file::parser::Parser`] from a byte slice.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use swiftscope::Parser;
    /// let data = [0x01, 0x02, 0x03, 0x04];
    /// let parser = Parser::new(&data);
    /// assert_eq!(parser.len(), 4);
    /// ```
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Returns the length of the underlying data buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the parser has no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` if there is more data available to parse.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Move forward by `step` bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if this would move past the end of the data.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        match self.position.checked_add(step) {
            Some(end) if end <= self.data.len() => {
                self.position = end;
                Ok(())
            }
            _ => Err(malformed_error!(
                "Cannot advance {} bytes from position {} of {}",
                step,
                self.position,
                self.data.len()
            )),
        }
    }

    /// Get the current position of the parser
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Access the complete underlying data
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.data
    }

    /// Peek at the current byte without advancing.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] at the end of the data.
    pub fn peek_byte(&self) -> Result<u8> {
        self.data
            .get(self.position)
            .copied()
            .ok_or_else(|| malformed_error!("Unexpected end of data at {}", self.position))
    }

    /// Read a little-endian value and advance past it.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if not enough data remains.
    pub fn read_le<T: ByteIO>(&mut self) -> Result<T> {
        read_le_at::<T>(self.data, &mut self.position)
    }

    /// Read an optional decimal number, as used by the mangling grammar's indices.
    ///
    /// Returns `Ok(None)` without advancing when the current byte is not a digit.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the number does not fit into a `u64`.
    pub fn read_natural(&mut self) -> Result<Option<u64>> {
        let mut value: Option<u64> = None;

        while let Some(&byte) = self.data.get(self.position) {
            if !byte.is_ascii_digit() {
                break;
            }

            let digit = u64::from(byte - b'0');
            let next = value
                .unwrap_or(0)
                .checked_mul(10)
                .and_then(|v| v.checked_add(digit))
                .ok_or_else(|| malformed_error!("Mangled index overflow at {}", self.position))?;

            value = Some(next);
            self.position += 1;
        }

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_values() {
        let data = [0x01, 0x04, 0x00, 0x00, 0x00];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.read_le::<u8>().unwrap(), 0x01);
        assert_eq!(parser.read_le::<i32>().unwrap(), 4);
        assert!(!parser.has_more_data());
        assert!(parser.read_le::<u8>().is_err());
    }

    #[test]
    fn peek_and_advance() {
        let data = [b'x', b'y'];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.peek_byte().unwrap(), b'x');
        assert_eq!(parser.pos(), 0);
        parser.advance_by(1).unwrap();
        assert_eq!(parser.peek_byte().unwrap(), b'y');
        assert!(parser.advance_by(2).is_err());
        parser.advance_by(1).unwrap();
        assert!(parser.peek_byte().is_err());
    }

    #[test]
    fn natural_numbers() {
        let mut parser = Parser::new(b"123_");
        assert_eq!(parser.read_natural().unwrap(), Some(123));
        assert_eq!(parser.peek_byte().unwrap(), b'_');

        let mut parser = Parser::new(b"_");
        assert_eq!(parser.read_natural().unwrap(), None);
        assert_eq!(parser.pos(), 0);

        let mut parser = Parser::new(b"99999999999999999999999");
        assert!(parser.read_natural().is_err());
    }

    #[test]
    fn empty_parser() {
        let parser = Parser::new(&[]);
        assert!(parser.is_empty());
        assert_eq!(parser.len(), 0);
        assert!(!parser.has_more_data());
    }
}
