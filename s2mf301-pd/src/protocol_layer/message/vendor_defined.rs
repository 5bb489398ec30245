//! Vendor defined message headers.
//!
//! Only the first data object of a VDM is decoded, which is enough to classify it.
use proc_bitfield::bitfield;

/// The USB-IF standard ID, used for discovery.
pub const PD_SID: u16 = 0xff00;

/// The DisplayPort standard ID.
pub const DP_SID: u16 = 0xff01;

/// The platform vendor ID.
pub const SAMSUNG_VID: u16 = 0x04e8;

/// Vendor and standard IDs whose structured VDMs are handled.
///
/// Besides the two standard IDs, these are test equipment vendors, which send discovery
/// commands under their own IDs during compliance runs.
pub const KNOWN_SVIDS: [u16; 5] = [
    DP_SID,
    SAMSUNG_VID,
    0xeeee, // Ellisys
    0x1748, // MQP
    0x1500, // Ellisys
];

/// The type of a VDM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VdmType {
    /// Vendor specific content.
    Unstructured,
    /// Standardized commands.
    Structured,
}

impl From<VdmType> for bool {
    fn from(value: VdmType) -> Self {
        value == VdmType::Structured
    }
}

impl From<bool> for VdmType {
    fn from(structured: bool) -> Self {
        if structured { Self::Structured } else { Self::Unstructured }
    }
}

/// Structured VDM commands.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VdmCommand {
    DiscoverIdentity,
    DiscoverSvids,
    DiscoverModes,
    EnterMode,
    ExitMode,
    Attention,
    DisplayPortStatus,
    DisplayPortConfig,
    /// Any other command code.
    Unknown(u8),
}

const VDM_COMMAND_CODES: [(VdmCommand, u8); 8] = [
    (VdmCommand::DiscoverIdentity, 0x01),
    (VdmCommand::DiscoverSvids, 0x02),
    (VdmCommand::DiscoverModes, 0x03),
    (VdmCommand::EnterMode, 0x04),
    (VdmCommand::ExitMode, 0x05),
    (VdmCommand::Attention, 0x06),
    (VdmCommand::DisplayPortStatus, 0x10),
    (VdmCommand::DisplayPortConfig, 0x11),
];

impl From<VdmCommand> for u8 {
    fn from(value: VdmCommand) -> Self {
        if let VdmCommand::Unknown(code) = value {
            return code;
        }
        VDM_COMMAND_CODES
            .iter()
            .find(|(command, _)| *command == value)
            .map_or(0, |&(_, code)| code)
    }
}

impl From<u8> for VdmCommand {
    fn from(code: u8) -> Self {
        VDM_COMMAND_CODES
            .iter()
            .find(|&&(_, c)| c == code)
            .map_or(Self::Unknown(code), |&(command, _)| command)
    }
}

bitfield! {
    /// The first data object of any VDM.
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct VdmHeader(pub u32): Debug, FromStorage, IntoStorage {
        /// SVID the message is addressed to.
        pub standard_or_vid: u16 @ 16..=31,
        /// Set for structured messages.
        pub vdm_type: bool [VdmType] @ 15,
        /// Major version, structured only.
        pub vdm_version_major: u8 @ 13..=14,
        /// Minor version, structured only.
        pub vdm_version_minor: u8 @ 11..=12,
        /// Mode index for enter and exit.
        pub object_position: u8 @ 8..=10,
        /// Initiator request or responder ACK/NAK/BUSY.
        pub command_type: u8 @ 6..=7,
        /// Only meaningful for structured messages.
        pub command: u8 [VdmCommand] @ 0..=4,
    }
}

impl VdmHeader {
    /// Whether a structured VDM is addressed to an ID that is handled.
    pub fn is_recognized(&self) -> bool {
        let svid = self.standard_or_vid();
        svid == PD_SID || KNOWN_SVIDS.contains(&svid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_commands_do_not_panic() {
        let header = VdmHeader(0).with_command(VdmCommand::Unknown(0x1f));
        assert_eq!(header.command(), VdmCommand::Unknown(0x1f));
    }

    #[test]
    fn display_port_codes() {
        assert_eq!(VdmCommand::from(0x10), VdmCommand::DisplayPortStatus);
        assert_eq!(u8::from(VdmCommand::DisplayPortConfig), 0x11);
    }

    #[test]
    fn recognized_ids() {
        let header = VdmHeader(0).with_vdm_type(VdmType::Structured);
        assert!(header.with_standard_or_vid(PD_SID).is_recognized());
        assert!(header.with_standard_or_vid(0x1500).is_recognized());
        assert!(!header.with_standard_or_vid(0x1234).is_recognized());
    }
}
