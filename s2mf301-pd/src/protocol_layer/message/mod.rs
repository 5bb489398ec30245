//! Definitions of message content.
//!
//! A message is a two byte header, followed by up to seven 32 bit data objects.
pub mod extended;
#[allow(missing_docs)]
pub mod header;
pub mod vendor_defined;

use byteorder::{ByteOrder, LittleEndian};
use header::{HEADER_SIZE, Header, MessageKind};

/// The maximum number of data objects in a message.
pub const MAX_OBJECTS: usize = 7;

/// Size of a single data object.
pub const OBJECT_SIZE: usize = 4;

/// The maximum size of a message without chunking.
pub const MAX_MESSAGE_SIZE: usize = HEADER_SIZE + MAX_OBJECTS * OBJECT_SIZE;

/// Data objects of a message.
pub type Objects = heapless::Vec<u32, MAX_OBJECTS>;

/// Errors that can occur during message/header parsing.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// More data objects than fit a message.
    #[error("invalid data object count `{0}`")]
    InvalidObjectCount(usize),
    /// The input buffer is too short.
    /// * `expected` - The expected length.
    /// * `found` - The actual length found.
    #[error("buffer too short (expected {expected:?}, found {found:?})")]
    BufferTooShort {
        /// The expected length.
        expected: usize,
        /// The actual length found.
        found: usize,
    },
    /// The specification revision field is not supported.
    #[error("unsupported specification revision `{0}`")]
    UnsupportedSpecificationRevision(u8),
}

/// A USB PD message.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Message {
    /// The message header.
    pub header: Header,
    /// The data objects. Their number matches the header's object count.
    pub objects: Objects,
}

impl Message {
    /// Create a new message, setting the header's object count from the objects.
    pub fn new(header: Header, objects: &[u32]) -> Result<Self, ParseError> {
        let objects = Objects::from_slice(objects).map_err(|_| ParseError::InvalidObjectCount(objects.len()))?;
        let header = header.with_num_objects(objects.len() as u8);

        Ok(Self { header, objects })
    }

    /// The message class.
    pub fn kind(&self) -> MessageKind {
        self.header.kind()
    }

    /// Serialized length of the message.
    pub fn len(&self) -> usize {
        HEADER_SIZE + OBJECT_SIZE * self.objects.len()
    }

    /// Whether the message carries no data objects.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Serialize a message to a slice, returning the number of written bytes.
    pub fn to_bytes(&self, buffer: &mut [u8]) -> Result<usize, ParseError> {
        encode(self.header, &self.objects, buffer)
    }

    /// Parse a message from a slice of bytes.
    pub fn from_bytes(buffer: &[u8]) -> Result<Self, ParseError> {
        decode(buffer)
    }
}

/// Serialize a header and its data objects, returning the number of written bytes.
///
/// The header is written as given. Its object count is not adjusted.
pub fn encode(header: Header, objects: &[u32], buffer: &mut [u8]) -> Result<usize, ParseError> {
    if objects.len() > MAX_OBJECTS {
        return Err(ParseError::InvalidObjectCount(objects.len()));
    }

    let size = HEADER_SIZE + OBJECT_SIZE * objects.len();
    if buffer.len() < size {
        return Err(ParseError::BufferTooShort {
            expected: size,
            found: buffer.len(),
        });
    }

    header.to_bytes(buffer);
    for (object, chunk) in objects.iter().zip(buffer[HEADER_SIZE..size].chunks_exact_mut(OBJECT_SIZE)) {
        LittleEndian::write_u32(chunk, *object);
    }

    Ok(size)
}

/// Parse a message, taking the object count from its header.
pub fn decode(buffer: &[u8]) -> Result<Message, ParseError> {
    let header = Header::from_bytes(buffer)?;

    let size = HEADER_SIZE + OBJECT_SIZE * header.num_objects();
    if buffer.len() < size {
        return Err(ParseError::BufferTooShort {
            expected: size,
            found: buffer.len(),
        });
    }

    let mut objects = Objects::new();
    for chunk in buffer[HEADER_SIZE..size].chunks_exact(OBJECT_SIZE) {
        objects
            .push(LittleEndian::read_u32(chunk))
            .map_err(|_| ParseError::InvalidObjectCount(header.num_objects()))?;
    }

    Ok(Message { header, objects })
}
