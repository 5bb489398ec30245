//! Classification of received messages into mailbox events.
use super::message::Message;
use super::message::extended::ExtendedHeader;
use super::message::header::{
    ControlMessageType, DataMessageType, ExtendedMessageType, MessageType, SpecificationRevision,
};
use super::message::vendor_defined::{SAMSUNG_VID, VdmCommand, VdmHeader, VdmType};
use crate::status::EventKind;

/// Map a received message to the event that it raises, if any.
///
/// Messages that the transceiver already reports through its interrupt status raise no
/// event here. Types that only exist in revision 3 are reported as reserved, unless
/// `revision` is 3.
pub fn classify(message: &Message, revision: SpecificationRevision) -> Option<EventKind> {
    match message.header.message_type() {
        MessageType::Control(message_type) => classify_control(message_type, revision),
        MessageType::Data(message_type) => classify_data(message, message_type),
        MessageType::Extended(message_type) => classify_extended(message, message_type),
    }
}

fn classify_control(message_type: ControlMessageType, revision: SpecificationRevision) -> Option<EventKind> {
    let pd3 = |kind| {
        if revision == SpecificationRevision::R3_X {
            Some(kind)
        } else {
            Some(EventKind::Reserved)
        }
    };

    match message_type {
        ControlMessageType::Reserved(0)
        | ControlMessageType::GoodCRC
        | ControlMessageType::GotoMin
        | ControlMessageType::Accept
        | ControlMessageType::Reject
        | ControlMessageType::Ping
        | ControlMessageType::PsRdy
        | ControlMessageType::GetSourceCap
        | ControlMessageType::GetSinkCap
        | ControlMessageType::DrSwap
        | ControlMessageType::PrSwap
        | ControlMessageType::VconnSwap
        | ControlMessageType::Wait => None,
        ControlMessageType::SoftReset => Some(EventKind::SoftReset),
        ControlMessageType::NotSupported => pd3(EventKind::NotSupported),
        ControlMessageType::GetSourceCapExtended => pd3(EventKind::GetSourceCapExtended),
        ControlMessageType::GetStatus => pd3(EventKind::GetStatus),
        ControlMessageType::FrSwap => pd3(EventKind::FrSwap),
        ControlMessageType::GetPpsStatus => pd3(EventKind::GetPpsStatus),
        ControlMessageType::GetCountryCodes => pd3(EventKind::GetCountryCodes),
        ControlMessageType::GetSinkCapExtended => pd3(EventKind::GetSinkCapExtended),
        ControlMessageType::GetSourceInfo => pd3(EventKind::GetSourceInfo),
        ControlMessageType::GetRevision => pd3(EventKind::GetRevision),
        ControlMessageType::DataReset | ControlMessageType::DataResetComplete | ControlMessageType::Reserved(_) => {
            Some(EventKind::Reserved)
        }
    }
}

fn classify_data(message: &Message, message_type: DataMessageType) -> Option<EventKind> {
    match message_type {
        DataMessageType::SourceCapabilities => Some(EventKind::SourceCap),
        DataMessageType::Request => Some(EventKind::Request),
        DataMessageType::Bist => Some(EventKind::Bist),
        DataMessageType::SinkCapabilities => Some(EventKind::SinkCap),
        DataMessageType::BatteryStatus => Some(EventKind::BatteryStatus),
        DataMessageType::Alert => Some(EventKind::Alert),
        DataMessageType::GetCountryInfo => Some(EventKind::GetCountryInfo),
        DataMessageType::VendorDefined => classify_vdm(VdmHeader(message.objects.first().copied().unwrap_or(0))),
        DataMessageType::EnterUsb
        | DataMessageType::EprRequest
        | DataMessageType::EprMode
        | DataMessageType::SourceInfo
        | DataMessageType::Revision => Some(EventKind::Reserved),
        DataMessageType::Reserved(x) if x <= 0xe => Some(EventKind::Reserved),
        DataMessageType::Reserved(x) => {
            debug!("Ignoring data message type {}", x);
            None
        }
    }
}

fn classify_vdm(header: VdmHeader) -> Option<EventKind> {
    if header.vdm_type() == VdmType::Unstructured {
        return if header.standard_or_vid() == SAMSUNG_VID {
            Some(EventKind::Uvdm)
        } else {
            info!("Unstructured VDM from foreign vendor {:#x}", header.standard_or_vid());
            Some(EventKind::UvdmForeign)
        };
    }

    if !header.is_recognized() {
        warn!("Unrecognized VDM SVID {:#x}", header.standard_or_vid());
        return Some(EventKind::VdmUnrecognized);
    }

    match header.command() {
        VdmCommand::DisplayPortStatus => Some(EventKind::VdmDpStatusUpdate),
        VdmCommand::DisplayPortConfig => Some(EventKind::VdmDpConfigure),
        VdmCommand::Attention => Some(EventKind::VdmAttention),
        VdmCommand::ExitMode => Some(EventKind::VdmExitMode),
        VdmCommand::EnterMode => Some(EventKind::VdmEnterMode),
        VdmCommand::DiscoverModes => Some(EventKind::VdmDiscoverModes),
        VdmCommand::DiscoverSvids => Some(EventKind::VdmDiscoverSvids),
        VdmCommand::DiscoverIdentity => Some(EventKind::VdmDiscoverIdentity),
        VdmCommand::Unknown(x) => {
            debug!("Ignoring VDM command {:#x}", x);
            None
        }
    }
}

fn classify_extended(message: &Message, message_type: ExtendedMessageType) -> Option<EventKind> {
    let extended_header = ExtendedHeader::from_object(message.objects.first().copied().unwrap_or(0));
    if extended_header.is_oversized() {
        warn!("Chunked extended message too large: {}", extended_header.data_size());
        return Some(EventKind::Reserved);
    }

    Some(match message_type {
        ExtendedMessageType::SourceCapabilitiesExtended => EventKind::SourceCapExtended,
        ExtendedMessageType::Status => EventKind::Status,
        ExtendedMessageType::GetBatteryCap => EventKind::GetBatteryCap,
        ExtendedMessageType::GetBatteryStatus => EventKind::GetBatteryStatus,
        ExtendedMessageType::BatteryCapabilities => EventKind::BatteryCapabilities,
        ExtendedMessageType::GetManufacturerInfo => EventKind::GetManufacturerInfo,
        ExtendedMessageType::ManufacturerInfo => EventKind::ManufacturerInfo,
        ExtendedMessageType::SecurityRequest => EventKind::SecurityRequest,
        ExtendedMessageType::SecurityResponse => EventKind::SecurityResponse,
        ExtendedMessageType::FirmwareUpdateRequest => EventKind::FirmwareUpdateRequest,
        ExtendedMessageType::FirmwareUpdateResponse => EventKind::FirmwareUpdateResponse,
        ExtendedMessageType::PpsStatus => EventKind::PpsStatus,
        ExtendedMessageType::CountryInfo => EventKind::CountryInfo,
        ExtendedMessageType::CountryCodes => EventKind::CountryCodes,
        ExtendedMessageType::SinkCapabilitiesExtended => EventKind::SinkCapExtended,
        _ => EventKind::Reserved,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol_layer::message::header::Header;
    use crate::protocol_layer::message::vendor_defined::PD_SID;

    fn message(raw_type: u8, extended: bool, objects: &[u32]) -> Message {
        let header = Header(0).with_message_type_raw(raw_type).with_extended(extended);
        Message::new(header, objects).unwrap()
    }

    fn structured(svid: u16, command: VdmCommand) -> u32 {
        VdmHeader(0)
            .with_vdm_type(VdmType::Structured)
            .with_standard_or_vid(svid)
            .with_command(command)
            .0
    }

    #[test]
    fn revision_three_control_messages_are_gated() {
        let get_status = message(0x12, false, &[]);
        assert_eq!(
            classify(&get_status, SpecificationRevision::R3_X),
            Some(EventKind::GetStatus)
        );
        assert_eq!(
            classify(&get_status, SpecificationRevision::R2_0),
            Some(EventKind::Reserved)
        );
    }

    #[test]
    fn acknowledgements_raise_no_event() {
        for raw in [0, 1, 3, 6, 0x0c] {
            assert_eq!(classify(&message(raw, false, &[]), SpecificationRevision::R3_X), None);
        }
        assert_eq!(
            classify(&message(0x0d, false, &[]), SpecificationRevision::R2_0),
            Some(EventKind::SoftReset)
        );
    }

    #[test]
    fn data_messages() {
        assert_eq!(
            classify(&message(1, false, &[0]), SpecificationRevision::R3_X),
            Some(EventKind::SourceCap)
        );
        assert_eq!(
            classify(&message(0x0e, false, &[0]), SpecificationRevision::R3_X),
            Some(EventKind::Reserved)
        );
        assert_eq!(classify(&message(0x10, false, &[0]), SpecificationRevision::R3_X), None);
    }

    #[test]
    fn vendor_defined_messages() {
        let rev = SpecificationRevision::R3_X;
        let uvdm = |vid: u16| message(0x0f, false, &[(vid as u32) << 16]);

        assert_eq!(classify(&uvdm(SAMSUNG_VID), rev), Some(EventKind::Uvdm));
        assert_eq!(classify(&uvdm(0x1234), rev), Some(EventKind::UvdmForeign));
        assert_eq!(
            classify(&message(0x0f, false, &[structured(PD_SID, VdmCommand::DiscoverIdentity)]), rev),
            Some(EventKind::VdmDiscoverIdentity)
        );
        assert_eq!(
            classify(&message(0x0f, false, &[structured(0xff01, VdmCommand::DisplayPortConfig)]), rev),
            Some(EventKind::VdmDpConfigure)
        );
        assert_eq!(
            classify(&message(0x0f, false, &[structured(0xabcd, VdmCommand::EnterMode)]), rev),
            Some(EventKind::VdmUnrecognized)
        );
        assert_eq!(
            classify(&message(0x0f, false, &[structured(PD_SID, VdmCommand::Unknown(0x1e))]), rev),
            None
        );
    }

    #[test]
    fn extended_messages() {
        let rev = SpecificationRevision::R2_0;
        assert_eq!(
            classify(&message(0x0c, true, &[4]), rev),
            Some(EventKind::PpsStatus)
        );
        assert_eq!(
            classify(&message(0x0c, true, &[0x8000 | 25]), rev),
            Some(EventKind::Reserved)
        );
        assert_eq!(classify(&message(0x10, true, &[0]), rev), Some(EventKind::Reserved));
    }
}
