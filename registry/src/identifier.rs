use std::{borrow::Borrow, fmt, iter::FusedIterator, str::FromStr, sync::Arc};

use thiserror::Error;

const LETTER_RADIX: u64 = 26;
const DIGIT_RADIX: u64 = 10;

/// Largest universe an `IdentifierShape` may describe. Pools materialize the
/// whole universe up front, so anything above this is refused at construction.
pub const MAX_UNIVERSE_SIZE: u64 = 1 << 32;

/// Errors that can occur while building or parsing identifiers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    /// The string is not a run of uppercase ASCII letters followed by a run of ASCII digits
    #[error("Malformed identifier {value:?}: expected uppercase letters followed by digits")]
    Malformed { value: String },

    /// The string is well-formed but does not have the letter/digit counts of the shape
    #[error("Identifier {value:?} does not match shape {letter_count} letters + {digit_count} digits")]
    ShapeMismatch {
        value: String,
        letter_count: u32,
        digit_count: u32,
    },

    /// A shape with no letters and no digits has nothing to enumerate
    #[error("Identifier shape must contain at least one letter or digit")]
    EmptyShape,

    /// The closed-form universe size overflows or exceeds `MAX_UNIVERSE_SIZE`
    #[error("Identifier universe for {letter_count} letters + {digit_count} digits is too large to materialize")]
    UniverseTooLarge { letter_count: u32, digit_count: u32 },
}

// Identifier

/// An immutable `[A-Z]*[0-9]*` name. Ordering is plain byte order, which for
/// identifiers of one shape is the letters-major, digits-minor order of the universe.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identifier(Arc<str>);

impl Identifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn is_well_formed(value: &str) -> bool {
        if value.is_empty() {
            return false;
        }
        let split = value
            .find(|c: char| !c.is_ascii_uppercase())
            .unwrap_or(value.len());
        value[split..].bytes().all(|b| b.is_ascii_digit())
    }
}

impl FromStr for Identifier {
    type Err = IdentifierError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if !Self::is_well_formed(value) {
            return Err(IdentifierError::Malformed {
                value: value.to_string(),
            });
        }
        Ok(Identifier(Arc::from(value)))
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Identifier {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({})", self.0)
    }
}

// IdentifierShape

/// Letter and digit counts of every identifier in a universe.
///
/// The universe is the cartesian product of every `letter_count`-long string
/// over `A..=Z` with every `digit_count`-long string over `0..=9`, so its size
/// is `26^letter_count * 10^digit_count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdentifierShape {
    letter_count: u32,
    digit_count: u32,
    universe_size: u64,
}

impl IdentifierShape {
    pub fn new(letter_count: u32, digit_count: u32) -> Result<Self, IdentifierError> {
        if letter_count == 0 && digit_count == 0 {
            return Err(IdentifierError::EmptyShape);
        }
        let too_large = IdentifierError::UniverseTooLarge {
            letter_count,
            digit_count,
        };
        let universe_size = LETTER_RADIX
            .checked_pow(letter_count)
            .zip(DIGIT_RADIX.checked_pow(digit_count))
            .and_then(|(letters, digits)| letters.checked_mul(digits))
            .ok_or_else(|| too_large.clone())?;
        if universe_size > MAX_UNIVERSE_SIZE {
            return Err(too_large);
        }

        Ok(Self {
            letter_count,
            digit_count,
            universe_size,
        })
    }

    pub fn letter_count(&self) -> u32 {
        self.letter_count
    }

    pub fn digit_count(&self) -> u32 {
        self.digit_count
    }

    /// Closed-form universe size; nothing is enumerated.
    pub fn universe_size(&self) -> u64 {
        self.universe_size
    }

    /// Lazily enumerates the universe in ascending order.
    pub fn sequences(&self) -> Sequences {
        Sequences {
            shape: *self,
            next: 0,
            end: self.universe_size,
        }
    }

    pub fn matches(&self, identifier: &Identifier) -> bool {
        let bytes = identifier.as_str().as_bytes();
        let letters = self.letter_count as usize;
        bytes.len() == letters + self.digit_count as usize
            && bytes[..letters].iter().all(u8::is_ascii_uppercase)
            && bytes[letters..].iter().all(u8::is_ascii_digit)
    }

    /// Parses `value` and checks it against this shape.
    pub fn parse(&self, value: &str) -> Result<Identifier, IdentifierError> {
        let identifier: Identifier = value.parse()?;
        if !self.matches(&identifier) {
            return Err(IdentifierError::ShapeMismatch {
                value: value.to_string(),
                letter_count: self.letter_count,
                digit_count: self.digit_count,
            });
        }
        Ok(identifier)
    }

    // index must be < universe_size
    fn identifier_at(&self, index: u64) -> Identifier {
        let digit_span = DIGIT_RADIX.pow(self.digit_count);
        let mut letters_index = index / digit_span;
        let mut digits_index = index % digit_span;

        let letters = self.letter_count as usize;
        let mut buffer = vec![0u8; letters + self.digit_count as usize];
        for slot in buffer[..letters].iter_mut().rev() {
            *slot = b'A' + (letters_index % LETTER_RADIX) as u8;
            letters_index /= LETTER_RADIX;
        }
        for slot in buffer[letters..].iter_mut().rev() {
            *slot = b'0' + (digits_index % DIGIT_RADIX) as u8;
            digits_index /= DIGIT_RADIX;
        }

        let value: String = buffer.into_iter().map(char::from).collect();
        Identifier(Arc::from(value))
    }
}

impl Default for IdentifierShape {
    /// Two uppercase letters followed by three digits: 676,000 identifiers.
    fn default() -> Self {
        Self {
            letter_count: 2,
            digit_count: 3,
            universe_size: 676_000,
        }
    }
}

// Sequences

/// Iterator over an identifier universe. Its length is known without enumerating.
#[derive(Debug, Clone)]
pub struct Sequences {
    shape: IdentifierShape,
    next: u64,
    end: u64,
}

impl Iterator for Sequences {
    type Item = Identifier;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let identifier = self.shape.identifier_at(self.next);
        self.next += 1;
        Some(identifier)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.end - self.next) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Sequences {}

impl FusedIterator for Sequences {}
