//! Extended message header, carried in the low half of the first data object.
use proc_bitfield::bitfield;

/// The largest chunked data size that the transceiver delivers intact.
pub const MAX_UNCHUNKED_DATA_SIZE: u16 = 24;

bitfield! {
    /// The extended message header.
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct ExtendedHeader(pub u16): Debug, FromStorage, IntoStorage {
        /// Set if the message is chunked.
        pub chunked: bool @ 15,
        /// The number of this chunk.
        pub chunk_number: u8 @ 11..=14,
        /// Set if this is a chunk request.
        pub request_chunk: bool @ 10,
        /// Total size of the extended message data, in bytes.
        pub data_size: u16 @ 0..=8,
    }
}

impl ExtendedHeader {
    /// Extract the extended header from the first data object.
    pub fn from_object(object: u32) -> Self {
        Self(object as u16)
    }

    /// Whether a chunked message claims more data than one chunk carries.
    pub fn is_oversized(&self) -> bool {
        self.chunked() && self.data_size() > MAX_UNCHUNKED_DATA_SIZE
    }
}
