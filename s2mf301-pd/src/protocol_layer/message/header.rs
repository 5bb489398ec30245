//! Definitions for a USB PD message header.
//!
//! See [6.2.1.1].
use core::convert::TryFrom;

use byteorder::{ByteOrder, LittleEndian};
use proc_bitfield::bitfield;

use crate::counters::Counter;
use crate::protocol_layer::message::ParseError;
use crate::{DataRole, PowerRole};

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    /// First two bytes of every message the transceiver moves.
    pub struct Header(pub u16): Debug, FromStorage, IntoStorage {
        /// Set for extended messages. Only honored when data objects follow.
        pub extended: bool @ 15,
        /// Count of 32 bit objects after the header.
        pub num_objects: u8 [get usize] @ 12..=14,
        /// Rolling 3 bit ID of the sender.
        pub message_id: u8 @ 9..=11,
        /// Sender's power role.
        pub port_power_role: bool [get PowerRole, set PowerRole] @ 8,
        /// Revision the sender speaks. The value `0b11` is reserved and fails to decode.
        pub spec_revision: u8 [try_get SpecificationRevision, set SpecificationRevision] @ 6..=7,
        /// Sender's data role.
        pub port_data_role: bool [get DataRole, set DataRole] @ 5,
        /// Message code, interpreted according to [`Header::kind`].
        pub message_type_raw: u8 @ 0..=4,
    }
}

/// Size of a serialized header.
pub const HEADER_SIZE: usize = 2;

impl Header {
    /// Create a header template with the given attributes.
    pub fn new_template(
        port_data_role: DataRole,
        port_power_role: PowerRole,
        spec_revision: SpecificationRevision,
    ) -> Self {
        Self(0)
            .with_port_data_role(port_data_role)
            .with_port_power_role(port_power_role)
            .with_spec_revision(spec_revision)
    }

    /// Create a new header that follows a template.
    pub fn new(template: Self, message_id: Counter, message_type: MessageType, num_objects: u8) -> Self {
        let (raw, extended) = match message_type {
            MessageType::Control(x) => (u8::from(x), false),
            MessageType::Data(x) => (u8::from(x), false),
            MessageType::Extended(x) => (u8::from(x), true),
        };

        template
            .with_message_id(message_id.value())
            .with_message_type_raw(raw)
            .with_num_objects(num_objects)
            .with_extended(extended)
    }

    /// Create a new control message header.
    pub fn new_control(template: Self, message_id: Counter, message_type: ControlMessageType) -> Self {
        Self::new(template, message_id, MessageType::Control(message_type), 0)
    }

    /// Create a new data message header.
    pub fn new_data(template: Self, message_id: Counter, message_type: DataMessageType, num_objects: u8) -> Self {
        Self::new(template, message_id, MessageType::Data(message_type), num_objects)
    }

    /// Parse a header from its binary representation.
    ///
    /// The revision field is not validated, so that messages from partners with a reserved
    /// revision can still be classified.
    pub fn from_bytes(buf: &[u8]) -> Result<Self, ParseError> {
        if buf.len() < HEADER_SIZE {
            return Err(ParseError::BufferTooShort {
                expected: HEADER_SIZE,
                found: buf.len(),
            });
        }

        Ok(Header(LittleEndian::read_u16(buf)))
    }

    /// Serialize the header to its binary representation.
    pub fn to_bytes(self, buf: &mut [u8]) -> usize {
        LittleEndian::write_u16(buf, self.0);
        HEADER_SIZE
    }

    /// The message class, as the transceiver reports it.
    ///
    /// A message without data objects is always a control message, even if the extended
    /// flag is set.
    pub fn kind(&self) -> MessageKind {
        if self.num_objects() == 0 {
            MessageKind::Control
        } else if self.extended() {
            MessageKind::Extended
        } else {
            MessageKind::Data
        }
    }

    /// Extract the message type that the header encodes.
    pub fn message_type(&self) -> MessageType {
        let raw = self.message_type_raw();
        match self.kind() {
            MessageKind::Control => MessageType::Control(raw.into()),
            MessageKind::Data => MessageType::Data(raw.into()),
            MessageKind::Extended => MessageType::Extended(raw.into()),
        }
    }

    /// Whether the header claims revision 2.0 or older.
    ///
    /// Headers with the reserved revision are not considered legacy.
    pub fn is_legacy_revision(&self) -> bool {
        matches!(
            self.spec_revision(),
            Ok(SpecificationRevision::R1_0 | SpecificationRevision::R2_0)
        )
    }
}

/// The class of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MessageKind {
    /// No data objects.
    Control,
    /// Data objects, without the extended flag.
    Data,
    /// Data objects, with the extended flag.
    Extended,
}

/// Specification revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(non_camel_case_types)]
pub enum SpecificationRevision {
    /// Version 1.0.
    R1_0,
    /// Version 2.0.
    R2_0,
    /// Version 3.x.
    R3_X,
}

impl TryFrom<u8> for SpecificationRevision {
    type Error = ParseError;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0b00 => Ok(Self::R1_0),
            0b01 => Ok(Self::R2_0),
            0b10 => Ok(Self::R3_X),
            _ => Err(ParseError::UnsupportedSpecificationRevision(value)),
        }
    }
}

impl From<SpecificationRevision> for u8 {
    fn from(value: SpecificationRevision) -> Self {
        match value {
            SpecificationRevision::R1_0 => 0b00,
            SpecificationRevision::R2_0 => 0b01,
            SpecificationRevision::R3_X => 0b10,
        }
    }
}

/// The type of message that a header encodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MessageType {
    /// A control message, as defined in [6.3].
    Control(ControlMessageType),
    /// A data message, as defined in [6.4].
    Data(DataMessageType),
    /// An extended message, as defined in [6.5].
    Extended(ExtendedMessageType),
}

macro_rules! message_types {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $code:literal,)* }) => {
        $(#[$meta])*
        #[allow(missing_docs)]
        #[derive(Clone, Copy, Debug, PartialEq, Eq)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        pub enum $name {
            $($variant,)*
            /// Any code without a defined meaning.
            Reserved(u8),
        }

        impl From<u8> for $name {
            fn from(value: u8) -> Self {
                match value {
                    $($code => Self::$variant,)*
                    x => Self::Reserved(x),
                }
            }
        }

        impl From<$name> for u8 {
            fn from(value: $name) -> Self {
                match value {
                    $($name::$variant => $code,)*
                    $name::Reserved(x) => x,
                }
            }
        }
    };
}

message_types! {
    /// Types of control messages.
    ControlMessageType {
        GoodCRC = 0b0_0001,
        GotoMin = 0b0_0010,
        Accept = 0b0_0011,
        Reject = 0b0_0100,
        Ping = 0b0_0101,
        PsRdy = 0b0_0110,
        GetSourceCap = 0b0_0111,
        GetSinkCap = 0b0_1000,
        DrSwap = 0b0_1001,
        PrSwap = 0b0_1010,
        VconnSwap = 0b0_1011,
        Wait = 0b0_1100,
        SoftReset = 0b0_1101,
        DataReset = 0b0_1110,
        DataResetComplete = 0b0_1111,
        NotSupported = 0b1_0000,
        GetSourceCapExtended = 0b1_0001,
        GetStatus = 0b1_0010,
        FrSwap = 0b1_0011,
        GetPpsStatus = 0b1_0100,
        GetCountryCodes = 0b1_0101,
        GetSinkCapExtended = 0b1_0110,
        GetSourceInfo = 0b1_0111,
        GetRevision = 0b1_1000,
    }
}

message_types! {
    /// Types of data messages.
    DataMessageType {
        SourceCapabilities = 0b0_0001,
        Request = 0b0_0010,
        Bist = 0b0_0011,
        SinkCapabilities = 0b0_0100,
        BatteryStatus = 0b0_0101,
        Alert = 0b0_0110,
        GetCountryInfo = 0b0_0111,
        EnterUsb = 0b0_1000,
        EprRequest = 0b0_1001,
        EprMode = 0b0_1010,
        SourceInfo = 0b0_1011,
        Revision = 0b0_1100,
        VendorDefined = 0b0_1111,
    }
}

message_types! {
    /// Types of extended messages.
    ExtendedMessageType {
        SourceCapabilitiesExtended = 0b0_0001,
        Status = 0b0_0010,
        GetBatteryCap = 0b0_0011,
        GetBatteryStatus = 0b0_0100,
        BatteryCapabilities = 0b0_0101,
        GetManufacturerInfo = 0b0_0110,
        ManufacturerInfo = 0b0_0111,
        SecurityRequest = 0b0_1000,
        SecurityResponse = 0b0_1001,
        FirmwareUpdateRequest = 0b0_1010,
        FirmwareUpdateResponse = 0b0_1011,
        PpsStatus = 0b0_1100,
        CountryInfo = 0b0_1101,
        CountryCodes = 0b0_1110,
        SinkCapabilitiesExtended = 0b0_1111,
        ExtendedControl = 0b1_0000,
        EprSourceCapabilities = 0b1_0001,
        EprSinkCapabilities = 0b1_0010,
        VendorDefinedExtended = 0b1_1110,
    }
}
