use super::cursor::WireCursor;
use crate::error::ParseError;
use smallvec::SmallVec;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Maximum length of an uncompressed name in wire format (RFC 1035 §3.1)
pub const MAX_NAME_LEN: usize = 255;

/// Maximum length of a single label
pub const MAX_LABEL_LEN: usize = 63;

/// Upper bound on compression pointers followed for a single name
pub const MAX_POINTER_HOPS: usize = 64;

/// An owned, uncompressed domain name in wire format.
///
/// The original case of every label is preserved; equality, hashing and
/// suffix tests are ASCII case-insensitive as DNS requires.
#[derive(Clone)]
pub struct Name {
    wire: Vec<u8>,
}

impl Name {
    pub fn root() -> Self {
        Self { wire: vec![0] }
    }

    /// Decode a possibly compressed name at the cursor.
    ///
    /// Compression pointers must point strictly backwards in the message,
    /// so every hop makes progress; the hop count and the expanded length
    /// are bounded as well.
    pub fn from_wire(cursor: &mut WireCursor<'_>) -> Result<Self, ParseError> {
        let start = cursor.position();
        let mut wire = Vec::with_capacity(32);

        loop {
            let len = cursor.read_u8()?;
            match len & 0xC0 {
                0x00 => {
                    if len == 0 {
                        wire.push(0);
                        return Ok(Self { wire });
                    }
                    let label = cursor.read_bytes(len as usize)?;
                    push_label(&mut wire, label)?;
                }
                0xC0 => {
                    let low = cursor.read_u8()?;
                    let pointer = (((len & 0x3F) as usize) << 8) | low as usize;
                    follow_pointers(cursor.message(), pointer, start, &mut wire)?;
                    return Ok(Self { wire });
                }
                _ => return Err(ParseError::InvalidLabelLength(len)),
            }
        }
    }

    /// Build a name from an uncompressed wire encoding occupying all of `bytes`
    pub fn from_uncompressed(bytes: &[u8]) -> Result<Self, ParseError> {
        let mut cursor = WireCursor::new(bytes);
        let mut wire = Vec::with_capacity(bytes.len());
        loop {
            let len = cursor.read_u8()?;
            if len == 0 {
                break;
            }
            if len as usize > MAX_LABEL_LEN {
                return Err(ParseError::InvalidLabelLength(len));
            }
            let label = cursor.read_bytes(len as usize)?;
            push_label(&mut wire, label)?;
        }
        if !cursor.is_empty() {
            return Err(ParseError::InvalidName(
                "trailing bytes after root label".to_string(),
            ));
        }
        wire.push(0);
        Ok(Self { wire })
    }

    fn from_labels<'b>(labels: impl Iterator<Item = &'b [u8]>) -> Result<Self, ParseError> {
        let mut wire = Vec::with_capacity(32);
        for label in labels {
            push_label(&mut wire, label)?;
        }
        wire.push(0);
        Ok(Self { wire })
    }

    pub fn as_wire(&self) -> &[u8] {
        &self.wire
    }

    pub fn wire_len(&self) -> usize {
        self.wire.len()
    }

    pub fn is_root(&self) -> bool {
        self.wire.len() == 1
    }

    fn label_offsets(&self) -> SmallVec<[usize; 16]> {
        let mut offsets = SmallVec::new();
        let mut pos = 0;
        while self.wire[pos] != 0 {
            offsets.push(pos);
            pos += self.wire[pos] as usize + 1;
        }
        offsets
    }

    /// Labels from leftmost to rightmost, excluding the root label
    pub fn labels(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.label_offsets().into_iter().map(move |offset| {
            let len = self.wire[offset] as usize;
            &self.wire[offset + 1..offset + 1 + len]
        })
    }

    /// Number of labels, excluding the root label
    pub fn num_labels(&self) -> usize {
        self.label_offsets().len()
    }

    /// Label count as carried in the RRSIG labels field (RFC 4034 §3.1.3):
    /// the root and a leading wildcard label are not counted.
    pub fn label_count(&self) -> usize {
        let count = self.num_labels();
        if self.is_wildcard() { count - 1 } else { count }
    }

    pub fn is_wildcard(&self) -> bool {
        self.wire.len() > 2 && self.wire[0] == 1 && self.wire[1] == b'*'
    }

    pub fn to_lowercase(&self) -> Self {
        Self {
            wire: self.canonical_wire(),
        }
    }

    /// Wire form with every label lower-cased (RFC 4034 §6.2)
    pub fn canonical_wire(&self) -> Vec<u8> {
        let mut out = self.wire.clone();
        let mut pos = 0;
        while out[pos] != 0 {
            let len = out[pos] as usize;
            out[pos + 1..pos + 1 + len].make_ascii_lowercase();
            pos += len + 1;
        }
        out
    }

    /// Name made of the rightmost `count` labels
    pub fn suffix(&self, count: usize) -> Self {
        let offsets = self.label_offsets();
        if count == 0 {
            return Self::root();
        }
        if count >= offsets.len() {
            return self.clone();
        }
        let start = offsets[offsets.len() - count];
        Self {
            wire: self.wire[start..].to_vec(),
        }
    }

    /// `*` followed by the rightmost `count` labels
    pub fn wildcard(&self, count: usize) -> Self {
        let suffix = self.suffix(count);
        let mut wire = Vec::with_capacity(suffix.wire.len() + 2);
        wire.extend_from_slice(&[1, b'*']);
        wire.extend_from_slice(&suffix.wire);
        Self { wire }
    }

    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        let skip = self.wire[0] as usize + 1;
        Some(Self {
            wire: self.wire[skip..].to_vec(),
        })
    }

    /// True if `self` equals `zone` or lies below it
    pub fn is_subdomain_of(&self, zone: &Name) -> bool {
        if zone.is_root() {
            return true;
        }
        if zone.wire.len() > self.wire.len() {
            return false;
        }
        let tail = &self.wire[self.wire.len() - zone.wire.len()..];
        if !tail.eq_ignore_ascii_case(&zone.wire) {
            return false;
        }
        // The matching tail must start on a label boundary
        let boundary = self.wire.len() - zone.wire.len();
        boundary == 0 || self.label_offsets().contains(&boundary)
    }
}

fn push_label(wire: &mut Vec<u8>, label: &[u8]) -> Result<(), ParseError> {
    if label.is_empty() || label.len() > MAX_LABEL_LEN {
        return Err(ParseError::InvalidLabelLength(label.len().min(255) as u8));
    }
    // Room for this label plus the terminating root
    if wire.len() + label.len() + 2 > MAX_NAME_LEN {
        return Err(ParseError::NameTooLong);
    }
    wire.push(label.len() as u8);
    wire.extend_from_slice(label);
    Ok(())
}

fn follow_pointers(
    message: &[u8],
    mut pointer: usize,
    mut limit: usize,
    wire: &mut Vec<u8>,
) -> Result<(), ParseError> {
    for _ in 0..MAX_POINTER_HOPS {
        if pointer >= limit {
            return Err(ParseError::BadPointer(pointer));
        }
        limit = pointer;
        let mut pos = pointer;
        loop {
            let len = *message.get(pos).ok_or(ParseError::BadPointer(pos))?;
            match len & 0xC0 {
                0x00 => {
                    if len == 0 {
                        wire.push(0);
                        return Ok(());
                    }
                    let end = pos + 1 + len as usize;
                    let label = message.get(pos + 1..end).ok_or(ParseError::BufferTooSmall {
                        need: end,
                        have: message.len(),
                    })?;
                    push_label(wire, label)?;
                    pos = end;
                }
                0xC0 => {
                    let low = *message.get(pos + 1).ok_or(ParseError::BufferTooSmall {
                        need: pos + 2,
                        have: message.len(),
                    })?;
                    pointer = (((len & 0x3F) as usize) << 8) | low as usize;
                    break;
                }
                _ => return Err(ParseError::InvalidLabelLength(len)),
            }
        }
    }
    Err(ParseError::PointerLoop)
}

impl FromStr for Name {
    type Err = ParseError;

    /// Parse a presentation-format name; the trailing dot is optional.
    /// Supports `\.` and `\DDD` escapes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "." || s.is_empty() {
            return Ok(Self::root());
        }

        let mut labels: Vec<Vec<u8>> = Vec::new();
        let mut current = Vec::new();
        let bytes = s.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'.' => {
                    if current.is_empty() {
                        return Err(ParseError::InvalidName(format!("empty label in '{}'", s)));
                    }
                    labels.push(std::mem::take(&mut current));
                }
                b'\\' => {
                    let rest = &bytes[i + 1..];
                    if rest.len() >= 3 && rest[..3].iter().all(u8::is_ascii_digit) {
                        let value = (rest[0] - b'0') as u16 * 100
                            + (rest[1] - b'0') as u16 * 10
                            + (rest[2] - b'0') as u16;
                        let byte = u8::try_from(value).map_err(|_| {
                            ParseError::InvalidName(format!("bad escape in '{}'", s))
                        })?;
                        current.push(byte);
                        i += 3;
                    } else if let Some(&next) = rest.first() {
                        current.push(next);
                        i += 1;
                    } else {
                        return Err(ParseError::InvalidName(format!("dangling escape in '{}'", s)));
                    }
                }
                b => current.push(b),
            }
            i += 1;
        }
        if !current.is_empty() {
            labels.push(current);
        }

        Self::from_labels(labels.iter().map(Vec::as_slice))
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return write!(f, ".");
        }
        for label in self.labels() {
            for &byte in label {
                match byte {
                    b'.' | b'\\' => write!(f, "\\{}", byte as char)?,
                    0x21..=0x7E => write!(f, "{}", byte as char)?,
                    _ => write!(f, "\\{:03}", byte)?,
                }
            }
            write!(f, ".")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", self)
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.wire.eq_ignore_ascii_case(&other.wire)
    }
}

impl Eq for Name {}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for byte in &self.wire {
            state.write_u8(byte.to_ascii_lowercase());
        }
    }
}
