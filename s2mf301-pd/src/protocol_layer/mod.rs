//! The protocol layer moves messages between the port and the transceiver's message buffers.
//!
//! Handles
//! - framing of outbound messages into the TX buffer,
//! - reading inbound messages from the RX buffer, including the PD2.0 header race,
//! - classification of received messages into mailbox events.
//!
//! Retries are left to the transceiver's retransmission counter, see
//! [`crate::registers::Retransmission`].
pub mod classify;
pub mod message;

use core::marker::PhantomData;

use message::header::Header;
use message::{MAX_MESSAGE_SIZE, Message, OBJECT_SIZE, Objects, ParseError};
use s2mf301_traits::{RegisterTransport, TransportError};

use crate::bus::Bus;
use crate::registers::{MsgSendCon, Register};
use crate::timers::{Timer, TimerType};

/// Errors that can occur in the protocol layer.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Register access failed.
    #[error("transport: {0}")]
    Transport(#[from] TransportError),
    /// The message could not be framed or parsed.
    #[error("parse: {0}")]
    Parse(#[from] ParseError),
}

/// The protocol layer, borrowing the register bus for one transfer.
pub struct ProtocolLayer<'a, BUS: RegisterTransport, TIMER: Timer> {
    bus: &'a mut Bus<BUS>,
    _timer: PhantomData<TIMER>,
}

impl<'a, BUS: RegisterTransport, TIMER: Timer> ProtocolLayer<'a, BUS, TIMER> {
    /// Create a new protocol layer on a bus.
    pub fn new(bus: &'a mut Bus<BUS>) -> Self {
        Self {
            bus,
            _timer: PhantomData,
        }
    }

    /// Write a message into the TX buffer and start sending it.
    ///
    /// The header is sent as given, so its object count must match `objects`.
    pub async fn transmit(&mut self, header: Header, objects: &[u32]) -> Result<(), Error> {
        if header.num_objects() != objects.len() {
            return Err(ParseError::InvalidObjectCount(objects.len()).into());
        }

        let mut buffer = [0u8; MAX_MESSAGE_SIZE];
        let size = message::encode(header, objects, &mut buffer)?;

        self.bus.bulk_write(Register::MsgTxHeader, &buffer[..size]).await?;
        self.send().await?;

        debug!(
            "Transmitted {:?}, header {:#x}, first object {:#x}",
            header.message_type(),
            header.0,
            objects.first().copied().unwrap_or(0)
        );
        Ok(())
    }

    /// Start sending the message in the TX buffer.
    ///
    /// Hard-reset handling is re-armed first, so that a previous message error does not block
    /// the send.
    pub async fn send(&mut self) -> Result<(), Error> {
        self.bus.store(MsgSendCon::OP_MODE_HARD_EN).await?;
        self.bus.store(MsgSendCon::OP_MODE_HARD_EN.with_send_msg_en(true)).await?;
        Ok(())
    }

    async fn read_header(&mut self) -> Result<Header, Error> {
        let mut bytes = [0u8; message::header::HEADER_SIZE];
        self.bus.bulk_read(Register::MsgRxHeader, &mut bytes).await?;
        Ok(Header::from_bytes(&bytes)?)
    }

    /// Read the message in the RX buffer.
    ///
    /// Transceivers in a PD2.0 session may update the header register while it is read, when
    /// a source capabilities message arrives. Such a header is read a second time after a short
    /// delay. Objects are read one at a time.
    pub async fn receive(&mut self) -> Result<Message, Error> {
        let mut header = self.read_header().await?;

        if needs_reread(header) {
            trace!("Re-reading PD2.0 header {:#x}", header.0);
            TimerType::new::<TIMER>(TimerType::HeaderReread).await;
            header = self.read_header().await?;
        }

        let mut objects = Objects::new();
        for index in 0..header.num_objects() {
            let mut bytes = [0u8; OBJECT_SIZE];
            self.bus
                .bulk_read_from(Register::MsgRxObject0, (index * OBJECT_SIZE) as u8, &mut bytes)
                .await?;
            objects
                .push(u32::from_le_bytes(bytes))
                .map_err(|_| ParseError::InvalidObjectCount(header.num_objects()))?;
        }

        debug!("Received {:?}, header {:#x}", header.message_type(), header.0);
        Ok(Message { header, objects })
    }
}

/// Raw type code of headers that can be caught mid-update.
const RACY_MESSAGE_TYPE: u8 = 6;

/// Whether a freshly read header may be stale.
fn needs_reread(header: Header) -> bool {
    header.is_legacy_revision() && header.num_objects() > 0 && header.message_type_raw() == RACY_MESSAGE_TYPE
}

#[cfg(test)]
mod tests {
    use super::message::header::SpecificationRevision;
    use super::*;
    use crate::dummy::{DummyTimer, MockTransport};

    type Layer<'a> = ProtocolLayer<'a, MockTransport, DummyTimer>;

    fn rx_header(revision: SpecificationRevision, raw_type: u8, count: u8) -> Header {
        Header(0)
            .with_spec_revision(revision)
            .with_message_type_raw(raw_type)
            .with_num_objects(count)
    }

    #[tokio::test]
    async fn transmit_writes_buffer_then_sends() {
        let mut bus = Bus::new(MockTransport::new());
        let header = Header(0).with_message_type_raw(2).with_num_objects(2);

        Layer::new(&mut bus).transmit(header, &[1, 2]).await.unwrap();

        let transport = bus.transport();
        assert_eq!(transport.bulk_written(Register::MsgTxHeader), Some(std::vec![
            header.0 as u8,
            (header.0 >> 8) as u8,
            1,
            0,
            0,
            0,
            2,
            0,
            0,
            0
        ]));
        assert_eq!(transport.writes(Register::MsgSendCon), std::vec![0x82, 0x83]);
    }

    #[tokio::test]
    async fn transmit_rejects_mismatched_count() {
        let mut bus = Bus::new(MockTransport::new());
        let header = Header(0).with_num_objects(3);

        assert_eq!(
            Layer::new(&mut bus).transmit(header, &[1]).await,
            Err(Error::Parse(ParseError::InvalidObjectCount(1)))
        );
        assert!(bus.transport().writes(Register::MsgSendCon).is_empty());
    }

    #[tokio::test]
    async fn pd2_source_capabilities_header_is_read_twice() {
        let mut bus = Bus::new(MockTransport::new());
        let stale = rx_header(SpecificationRevision::R2_0, 6, 1);
        let settled = rx_header(SpecificationRevision::R2_0, 1, 2);
        bus.transport().queue_rx_header(stale.0);
        bus.transport().queue_rx_header(settled.0);
        bus.transport().queue_rx_header(stale.0);

        let message = Layer::new(&mut bus).receive().await.unwrap();

        assert_eq!(bus.transport().bulk_reads(Register::MsgRxHeader), 2);
        assert_eq!(message.header, settled);
        assert_eq!(message.objects.len(), 2);
    }

    #[tokio::test]
    async fn reread_happens_at_most_once() {
        let mut bus = Bus::new(MockTransport::new());
        let stale = rx_header(SpecificationRevision::R1_0, 6, 1);
        bus.transport().queue_rx_header(stale.0);
        bus.transport().queue_rx_header(stale.0);
        bus.transport().queue_rx_header(stale.0);

        Layer::new(&mut bus).receive().await.unwrap();

        assert_eq!(bus.transport().bulk_reads(Register::MsgRxHeader), 2);
    }

    #[tokio::test]
    async fn other_headers_are_read_once() {
        for header in [
            rx_header(SpecificationRevision::R3_X, 6, 1),
            rx_header(SpecificationRevision::R2_0, 6, 0),
            rx_header(SpecificationRevision::R2_0, 1, 1),
        ] {
            let mut bus = Bus::new(MockTransport::new());
            bus.transport().queue_rx_header(header.0);

            Layer::new(&mut bus).receive().await.unwrap();

            assert_eq!(bus.transport().bulk_reads(Register::MsgRxHeader), 1);
        }
    }

    #[tokio::test]
    async fn objects_are_read_from_consecutive_slots() {
        let mut bus = Bus::new(MockTransport::new());
        bus.transport().queue_rx_header(rx_header(SpecificationRevision::R3_X, 1, 2).0);
        bus.transport().set_raw(0x62, &0x1122_3344u32.to_le_bytes());
        bus.transport().set_raw(0x66, &0x5566_7788u32.to_le_bytes());

        let message = Layer::new(&mut bus).receive().await.unwrap();

        assert_eq!(message.objects.as_slice(), &[0x1122_3344, 0x5566_7788]);
    }
}
