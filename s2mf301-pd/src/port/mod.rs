//! The port core owns the transceiver and all state of one Type-C port.
//!
//! Three locks split the work, always taken in this order:
//! - the coarse port lock, held for every dispatcher pass and every operation that touches
//!   CC, role or attach state,
//! - the low-power lock, which serializes low-power entry and exit against dispatch,
//! - the mailbox lock, which only guards the sticky event set and is never held across
//!   an await point.
//!
//! Interrupts, delayed re-polls and the narrow timers are serviced by [`Port::run`].
mod aggregator;
mod attach;
mod cc;
mod lpm;
mod reset;

#[cfg(test)]
mod tests;

use core::cell::Cell;
use core::marker::PhantomData;

use embassy_futures::join::join5;
use embassy_futures::select::{Either, select};
use embassy_sync::blocking_mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;
use proc_bitfield::bitfield;
use s2mf301_traits::{RegisterTransport, TransportError};
use uom::si::u32::ElectricCurrent;

use crate::bus::Bus;
use crate::config::Config;
use crate::counters::{Counter, CounterType};
use crate::device_policy_manager::{DevicePolicyManager, RpCurrent, UsbRole};
use crate::protocol_layer::message::header::{Header, SpecificationRevision};
use crate::protocol_layer::message::{Message, ParseError};
use crate::protocol_layer::{self, ProtocolLayer};
use crate::registers::{CcLevel, RpLevel};
use crate::status::{EventKind, StatusMailbox};
use crate::timers::{Timer, TimerType};
use crate::water::{NoWaterInterlock, WaterInterlock, WaterStatus};
use crate::{DataRole, PortRole};

/// Errors of port operations.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Register access failed.
    #[error("transport: {0}")]
    Transport(#[from] TransportError),
    /// A message could not be framed or parsed.
    #[error("parse: {0}")]
    Parse(#[from] ParseError),
    /// The board cannot source VCONN.
    #[error("VCONN is not supported")]
    VconnUnsupported,
    /// The plug monitor reported neither source nor sink.
    #[error("unknown plug state {0:#x}")]
    UnknownPlugState(u8),
    /// A non-PD accessory is attached.
    #[error("{0:?} accessory attached")]
    Accessory(Accessory),
    /// A source attach did not survive the elevated threshold.
    #[error("abnormal attach")]
    AbnormalAttach,
    /// Attach was refused, because the port is wet.
    #[error("water detected")]
    Water,
    /// A CC threshold outside of the slice table.
    #[error("invalid threshold {0}")]
    InvalidThreshold(u8),
}

impl From<protocol_layer::Error> for Error {
    fn from(error: protocol_layer::Error) -> Self {
        match error {
            protocol_layer::Error::Transport(e) => Self::Transport(e),
            protocol_layer::Error::Parse(e) => Self::Parse(e),
        }
    }
}

/// Accessory ID resistor, as classified by the transceiver's ADC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Rid {
    /// No classification yet.
    Undefined,
    /// 255 kOhm.
    R255k,
    /// 301 kOhm.
    R301k,
    /// 523 kOhm, the factory jig.
    R523k,
    /// 619 kOhm.
    R619k,
    /// No ID resistor.
    Open,
    /// No special RID is latched.
    #[default]
    Max,
}

impl Rid {
    /// Decode the ADC field. Out of range codes yield `None`.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Undefined),
            3 => Some(Self::R255k),
            4 => Some(Self::R301k),
            5 => Some(Self::R523k),
            6 => Some(Self::R619k),
            7 => Some(Self::Open),
            _ => None,
        }
    }

    /// Whether a jig resistor is latched, which locks CC and reset handling.
    pub fn is_latched(&self) -> bool {
        !matches!(self, Self::Undefined | Self::Max)
    }

    /// Whether this is one of the "no resistor" values.
    pub fn is_open_or_none(&self) -> bool {
        matches!(self, Self::Open | Self::Max)
    }
}

/// Manual override of the CC state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CcState {
    /// Initial value, never requested.
    #[default]
    Default,
    /// Both lines open.
    Open,
    /// Rd forced on both lines.
    Rd,
    /// Hardware toggling.
    Drp,
}

bitfield! {
    /// Reasons that hold the CC lines open.
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct CcOpenReasons(pub u8): Debug, FromStorage, IntoStorage {
        /// Hiccup lockout after a VBUS fault on a wet port.
        pub hiccup: bool @ 0,
        /// Thermal lockout.
        pub overheat: bool @ 1,
    }
}

impl CcOpenReasons {
    /// Whether any lockout is active.
    pub fn is_any(&self) -> bool {
        self.0 != 0
    }

    fn with_reason(self, reason: CcOpenReason, on: bool) -> Self {
        match reason {
            CcOpenReason::Hiccup => self.with_hiccup(on),
            CcOpenReason::Overheat => self.with_overheat(on),
        }
    }
}

/// A single CC lockout reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CcOpenReason {
    /// Hiccup lockout.
    Hiccup,
    /// Thermal lockout.
    Overheat,
}

/// Which CC comparator threshold to program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ThresholdKind {
    /// Threshold for detecting a sink's Rd.
    Rd,
    /// Threshold for detecting a source's Rp.
    Rp,
}

/// A forced port mode, requested by the Type-C manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RprdMode {
    /// Force host/source.
    Dfp,
    /// Force device/sink.
    Ufp,
    /// Back to toggling.
    Drp,
}

/// Stages of a power role swap, as driven by the policy engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PrSwapStage {
    /// The sink stopped drawing power.
    SinkOff,
    /// This port started sourcing.
    SourceOn,
    /// This port stopped sourcing.
    SourceOff,
}

/// Non-PD accessories, detected from the CC pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Accessory {
    /// Rd on both lines.
    Debug,
    /// Ra on both lines.
    Audio,
}

/// Events from the external MUIC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MuicEvent {
    /// A Type-C to Type-A/B cable with a legacy device.
    Type3Attach,
    /// An OTG device that draws current abnormally.
    AbnormalOtgAttach,
    /// An OTG device.
    OtgAttach,
    /// A detach with an undefined ID range.
    UndefinedRangeDetach,
    /// Any other detach.
    Detach,
}

/// Accept/PS_RDY counters, for the PPS interrupt timing check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PpsIrqCounters {
    /// Counted from the interrupt status.
    pub messages: u32,
    /// Counted from received message headers.
    pub passes: u32,
}

/// All state of one port.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PortState {
    /// Last sampled CC1 level.
    pub cc1: CcLevel,
    /// Last sampled CC2 level.
    pub cc2: CcLevel,
    /// Power role, or toggling while detached.
    pub power_role: PortRole,
    /// Data role.
    pub data_role: DataRole,
    /// Manual CC override state.
    pub cc_state: CcState,
    /// Advertised Rp current.
    pub rp_level: RpLevel,
    /// Programmed Rd threshold, as slice index.
    pub rd_threshold: u8,
    /// Programmed Rp threshold, as slice index.
    pub rp_threshold: u8,
    /// No partner is attached.
    pub detach_valid: bool,
    /// Set on the first successful attach, never cleared.
    pub first_attach: bool,
    /// Latched accessory ID.
    pub rid: Rid,
    /// Negotiated specification revision.
    pub revision: SpecificationRevision,
    /// Software owns message retries.
    pub manual_retry: bool,
    /// The partner talks PD.
    pub pd_support: bool,
    /// PPS is enabled.
    pub pps_enabled: bool,
    /// Accept/PS_RDY are being counted.
    pub check_pps_irq: bool,
    /// PPS interrupt timing counters.
    pub pps_irq: PpsIrqCounters,
    /// Number of sink capability exchanges in this session.
    pub give_sink_cap: u8,
    /// The first GoodCRC since reset was seen.
    pub first_goodcrc: bool,
    /// Source capabilities were received in this session.
    pub source_cap_received: bool,
    /// The port is wet.
    pub water_detected: bool,
    /// Active CC lockouts.
    pub manual_cc_open: CcOpenReasons,
    /// A power role swap is in progress.
    pub pr_swap: bool,
    /// This port sources VCONN.
    pub vconn_source: bool,
    /// The VBUS short check ran in this session.
    pub vbus_short_checked: bool,
    /// The VBUS short check ran again after PD negotiation.
    pub pd_vbus_short_checked: bool,
    /// VBUS was found shorted onto CC.
    pub vbus_short: bool,
    /// An abnormal OTG device was reported, VBUS stays off.
    pub killer: bool,
    /// CC detection replaces VBUS detection.
    pub cc_instead_of_vbus: bool,
    /// The factory jig is attached.
    pub factory_mode: bool,
    /// Role of the USB data stack.
    pub usb: UsbRole,
    /// Transmit message ID.
    pub message_id: Counter,
}

impl Default for PortState {
    fn default() -> Self {
        Self {
            cc1: CcLevel::Open,
            cc2: CcLevel::Open,
            power_role: PortRole::Drp,
            data_role: DataRole::Ufp,
            cc_state: CcState::Default,
            rp_level: RpLevel::Rp80,
            rd_threshold: 0,
            rp_threshold: 0,
            detach_valid: true,
            first_attach: false,
            rid: Rid::Max,
            revision: SpecificationRevision::R3_X,
            manual_retry: false,
            pd_support: false,
            pps_enabled: false,
            check_pps_irq: false,
            pps_irq: PpsIrqCounters::default(),
            give_sink_cap: 0,
            first_goodcrc: false,
            source_cap_received: false,
            water_detected: false,
            manual_cc_open: CcOpenReasons::default(),
            pr_swap: false,
            vconn_source: false,
            vbus_short_checked: false,
            pd_vbus_short_checked: false,
            vbus_short: false,
            killer: false,
            cc_instead_of_vbus: false,
            factory_mode: false,
            usb: UsbRole::Detached,
            message_id: Counter::new(CounterType::MessageId),
        }
    }
}

struct Inner<BUS: RegisterTransport, DPM: DevicePolicyManager, WATER: WaterInterlock> {
    bus: Bus<BUS>,
    dpm: DPM,
    water: WATER,
    state: PortState,
    received: Option<Message>,
}

struct Shared<M: RawMutex> {
    mailbox: StatusMailbox<M>,
    low_power: Mutex<M, bool>,
    irq: Signal<M, ()>,
    plug_work: Signal<M, ()>,
    low_power_retry: Signal<M, ()>,
    hiccup: Signal<M, bool>,
    hardreset_arm: Signal<M, ()>,
    hardreset_flag: blocking_mutex::Mutex<M, Cell<bool>>,
}

impl<M: RawMutex> Shared<M> {
    const fn new() -> Self {
        Self {
            mailbox: StatusMailbox::new(),
            low_power: Mutex::new(false),
            irq: Signal::new(),
            plug_work: Signal::new(),
            low_power_retry: Signal::new(),
            hiccup: Signal::new(),
            hardreset_arm: Signal::new(),
            hardreset_flag: blocking_mutex::Mutex::new(Cell::new(false)),
        }
    }

    /// Post a synthetic attach and re-run the dispatcher.
    fn schedule_attach(&self) {
        self.mailbox.post(EventKind::Attach);
        self.plug_work.signal(());
    }
}

/// A view of the port with the coarse lock held.
struct Locked<'a, M: RawMutex, BUS: RegisterTransport, TIMER: Timer, DPM: DevicePolicyManager, WATER: WaterInterlock> {
    bus: &'a mut Bus<BUS>,
    dpm: &'a mut DPM,
    water: &'a mut WATER,
    state: &'a mut PortState,
    received: &'a mut Option<Message>,
    shared: &'a Shared<M>,
    config: Config,
    _timer: PhantomData<fn() -> TIMER>,
}

impl<M: RawMutex, BUS: RegisterTransport, TIMER: Timer, DPM: DevicePolicyManager, WATER: WaterInterlock>
    Locked<'_, M, BUS, TIMER, DPM, WATER>
{
    async fn delay(&self, timer_type: TimerType) {
        TimerType::new::<TIMER>(timer_type).await
    }

    fn protocol_layer(&mut self) -> ProtocolLayer<'_, BUS, TIMER> {
        ProtocolLayer::new(self.bus)
    }
}

/// One S2MF301 port.
pub struct Port<
    M: RawMutex,
    BUS: RegisterTransport,
    TIMER: Timer,
    DPM: DevicePolicyManager,
    WATER: WaterInterlock = NoWaterInterlock,
> {
    inner: Mutex<M, Inner<BUS, DPM, WATER>>,
    shared: Shared<M>,
    config: Config,
    _timer: PhantomData<fn() -> TIMER>,
}

impl<M: RawMutex, BUS: RegisterTransport, TIMER: Timer, DPM: DevicePolicyManager>
    Port<M, BUS, TIMER, DPM, NoWaterInterlock>
{
    /// Create a port without moisture detection.
    pub fn new(transport: BUS, dpm: DPM, config: Config) -> Self {
        Self::with_water_interlock(transport, dpm, NoWaterInterlock, config)
    }
}

impl<M: RawMutex, BUS: RegisterTransport, TIMER: Timer, DPM: DevicePolicyManager, WATER: WaterInterlock>
    Port<M, BUS, TIMER, DPM, WATER>
{
    /// Create a port with a moisture detection subsystem.
    ///
    /// The transceiver is left untouched until [`Self::init`].
    pub fn with_water_interlock(transport: BUS, dpm: DPM, water: WATER, config: Config) -> Self {
        Self {
            inner: Mutex::new(Inner {
                bus: Bus::new(transport),
                dpm,
                water,
                state: PortState::default(),
                received: None,
            }),
            shared: Shared::new(),
            config,
            _timer: PhantomData,
        }
    }

    fn context<'a>(&'a self, inner: &'a mut Inner<BUS, DPM, WATER>) -> Locked<'a, M, BUS, TIMER, DPM, WATER> {
        let Inner {
            bus,
            dpm,
            water,
            state,
            received,
        } = inner;

        Locked {
            bus,
            dpm,
            water,
            state,
            received,
            shared: &self.shared,
            config: self.config,
            _timer: PhantomData,
        }
    }

    /// Program the transceiver and pick up a plug that is already present.
    pub async fn init(&self) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        self.context(&mut inner).init().await
    }

    /// Wake the service loop. Call from the interrupt handler.
    pub fn on_interrupt(&self) {
        self.shared.irq.signal(());
    }

    /// Service interrupts, delayed re-polls and timers. Never returns.
    pub async fn run(&self) {
        join5(
            self.interrupt_loop(),
            self.plug_work_loop(),
            self.low_power_retry_loop(),
            self.hiccup_loop(),
            self.hardreset_loop(),
        )
        .await;
    }

    async fn service(&self) {
        let mut inner = self.inner.lock().await;
        if let Err(e) = self.context(&mut inner).dispatch().await {
            error!("Dispatch failed: {}", e);
        }
    }

    async fn interrupt_loop(&self) {
        loop {
            self.shared.irq.wait().await;
            self.service().await;
        }
    }

    async fn plug_work_loop(&self) {
        loop {
            self.shared.plug_work.wait().await;
            self.service().await;
        }
    }

    async fn low_power_retry_loop(&self) {
        loop {
            self.shared.low_power_retry.wait().await;
            TimerType::new::<TIMER>(TimerType::LowPowerRetry).await;

            {
                let inner = self.inner.lock().await;
                let low_power = self.shared.low_power.lock().await;
                if !*low_power && !inner.state.water_detected {
                    self.shared.mailbox.post(EventKind::Attach);
                }
            }

            self.service().await;
        }
    }

    async fn hiccup_loop(&self) {
        let hold = TimerType::HiccupHold(self.config.cc_hiccup_delay_s);

        loop {
            let mut armed = self.shared.hiccup.wait().await;

            while armed {
                match select(self.shared.hiccup.wait(), TimerType::new::<TIMER>(hold)).await {
                    Either::First(next) => armed = next,
                    Either::Second(()) => {
                        let mut inner = self.inner.lock().await;
                        if let Err(e) = self.context(&mut inner).hiccup_expired().await {
                            error!("CC hiccup failed: {}", e);
                        }
                        armed = false;
                    }
                }
            }
        }
    }

    async fn hardreset_loop(&self) {
        loop {
            self.shared.hardreset_arm.wait().await;
            TimerType::new::<TIMER>(TimerType::HardResetFlag).await;
            self.shared.hardreset_flag.lock(|flag| flag.set(false));
            self.shared.hardreset_arm.reset();
        }
    }

    /// A copy of the port state.
    pub async fn snapshot(&self) -> PortState {
        self.inner.lock().await.state
    }

    /// Number of failed register accesses.
    pub async fn hardware_errors(&self) -> u32 {
        self.inner.lock().await.bus.errors()
    }

    /// Take a single pending event, returning whether it was pending.
    pub fn get_status(&self, kind: EventKind) -> bool {
        self.shared.mailbox.take(kind)
    }

    /// Run one aggregation pass, without dispatching.
    pub async fn poll_status(&self) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        self.context(&mut inner).poll_status().await
    }

    /// Change the power role, for a role swap.
    pub async fn set_power_role(&self, role: PortRole) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        self.context(&mut inner).set_power_role(role).await
    }

    /// The current power role.
    pub async fn power_role(&self) -> PortRole {
        self.inner.lock().await.state.power_role
    }

    /// Change the data role, for a role swap.
    pub async fn set_data_role(&self, role: DataRole) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        self.context(&mut inner).set_data_role(role).await
    }

    /// The current data role.
    pub async fn data_role(&self) -> DataRole {
        self.inner.lock().await.state.data_role
    }

    /// Transmit a message. Ignored while detached.
    pub async fn tx_msg(&self, header: Header, objects: &[u32]) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        self.context(&mut inner).tx_msg(header, objects).await
    }

    /// Take the last received message.
    pub async fn rx_msg(&self) -> Option<Message> {
        self.inner.lock().await.received.take()
    }

    /// Re-send the message in the TX buffer.
    pub async fn send_msg(&self) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        Ok(self.context(&mut inner).protocol_layer().send().await?)
    }

    /// Signal a hard reset towards the partner.
    pub async fn hard_reset(&self) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        self.context(&mut inner).hard_reset().await
    }

    /// Reset the protocol layer of the transceiver.
    pub async fn soft_reset(&self) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        self.context(&mut inner).soft_reset().await
    }

    /// Drop all pending events and the received message.
    pub async fn driver_reset(&self) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        self.context(&mut inner).driver_reset().await
    }

    /// Switch VCONN sourcing.
    pub async fn set_vconn_source(&self, on: bool) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        self.context(&mut inner).set_vconn_source(on).await
    }

    /// Whether this port sources VCONN.
    pub async fn vconn_source(&self) -> bool {
        self.inner.lock().await.state.vconn_source
    }

    /// Switch the OTG VBUS supply.
    pub async fn set_otg_control(&self, on: bool) {
        let mut inner = self.inner.lock().await;
        self.context(&mut inner).set_otg_control(on).await
    }

    /// Report a stage of a power role swap.
    pub async fn pr_swap(&self, stage: PrSwapStage) {
        let mut inner = self.inner.lock().await;
        self.context(&mut inner).pr_swap(stage).await
    }

    /// Change the advertised Rp current.
    pub async fn set_rp_control(&self, level: RpLevel) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        self.context(&mut inner).set_rp_level(level).await
    }

    /// Use CC instead of VBUS for attach detection.
    pub async fn pd_instead_of_vbus(&self, enable: bool) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        self.context(&mut inner).pd_instead_of_vbus(enable).await
    }

    /// Force a port mode, with a full detach and re-attach.
    pub async fn rprd_mode_change(&self, mode: RprdMode) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        self.context(&mut inner).rprd_mode_change(mode).await
    }

    /// Arm the hard reset flag, which clears itself after [`TimerType::HardResetFlag`].
    ///
    /// Arming it again while it is set does not extend it.
    pub fn check_hardreset(&self) {
        let was_set = self.shared.hardreset_flag.lock(|flag| flag.replace(true));
        if !was_set {
            self.shared.hardreset_arm.signal(());
        }
    }

    /// Whether the hard reset flag is set.
    pub fn is_hardreset_pending(&self) -> bool {
        self.shared.hardreset_flag.lock(|flag| flag.get())
    }

    /// Mask or unmask the interrupt line.
    pub async fn irq_control(&self, enable: bool) {
        self.inner.lock().await.bus.transport().set_interrupt_enabled(enable);
    }

    /// Factory toggle of the VBUS mux and UFP attach option bits.
    pub async fn energy_now(&self, vbus_mux: bool, ufp_attach_opt: bool) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        self.context(&mut inner).energy_now(vbus_mux, ufp_attach_opt).await
    }

    /// Hand message retries to software (`true`) or the transceiver.
    pub async fn set_manual_retry(&self, on: bool) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        self.context(&mut inner).set_manual_retry(on).await
    }

    /// Set the negotiated revision, which selects the retransmission count.
    pub async fn set_revision(&self, revision: SpecificationRevision) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        self.context(&mut inner).set_revision(revision).await
    }

    /// Set or clear the operating mode bit of the send control.
    pub async fn op_mode(&self, enable: bool) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        self.context(&mut inner).op_mode(enable).await
    }

    /// Switch the eco source capabilities hold. Ignored while detached.
    pub async fn set_pd_control(&self, on: bool) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        self.context(&mut inner).set_pd_control(on).await
    }

    /// Count a sink capability exchange.
    pub async fn give_sink_cap(&self) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        self.context(&mut inner).give_sink_cap().await
    }

    /// The Rp current of an attached source.
    pub async fn get_rp_level(&self) -> Result<Option<RpCurrent>, Error> {
        let mut inner = self.inner.lock().await;
        self.context(&mut inner).get_rp_level().await
    }

    /// Program a CC comparator threshold, as slice index.
    pub async fn set_threshold(&self, kind: ThresholdKind, level: u8) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        self.context(&mut inner).set_threshold(kind, level).await
    }

    /// Enter low-power mode, tearing down any attach.
    pub async fn enter_low_power(&self) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        let mut low_power = self.shared.low_power.lock().await;
        self.context(&mut inner).set_lpm_mode(&mut low_power).await
    }

    /// Leave low-power mode.
    pub async fn exit_low_power(&self) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        let mut low_power = self.shared.low_power.lock().await;
        self.context(&mut inner).set_normal_mode(&mut low_power).await
    }

    /// Whether the port is in low-power mode.
    pub async fn is_low_power(&self) -> bool {
        *self.shared.low_power.lock().await
    }

    /// Apply the result of the moisture detection subsystem.
    pub async fn set_water_status(&self, status: WaterStatus) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        self.context(&mut inner).set_water_status(status).await
    }

    /// Set or clear a CC lockout.
    pub async fn cc_open_request(&self, reason: CcOpenReason, on: bool) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        self.context(&mut inner).cc_open_request(reason, on).await
    }

    /// Start (`true`) or cancel the hiccup hold, after which the CC lines are opened.
    pub fn cc_hiccup(&self, enable: bool) {
        info!("CC hiccup {}", if enable { "armed" } else { "cancelled" });
        self.shared.hiccup.signal(enable);
    }

    /// Turn on host mode for an OTG device.
    pub async fn otg_attach(&self) {
        let mut inner = self.inner.lock().await;
        self.context(&mut inner).otg_attach().await
    }

    /// Apply an event from the MUIC.
    pub async fn muic_notification(&self, event: MuicEvent) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        let mut low_power = self.shared.low_power.lock().await;
        self.context(&mut inner).muic_notification(event, &mut low_power).await
    }

    /// Count Accept/PS_RDY (`true`) for the PPS timing check, resetting the counters.
    pub async fn check_pps_irq(&self, enable: bool) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        self.context(&mut inner).check_pps_irq(enable).await
    }

    /// Enable PPS with a maximum current, or disable it with `None`.
    pub async fn pps_enable(&self, max_current: Option<ElectricCurrent>) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        self.context(&mut inner).pps_enable(max_current).await
    }

    /// The PPS interrupt timing counters.
    pub async fn pps_irq_counters(&self) -> PpsIrqCounters {
        self.inner.lock().await.state.pps_irq
    }

    /// Check once per session whether VBUS is shorted onto CC.
    pub async fn vbus_short_check(&self) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        self.context(&mut inner).vbus_short_check().await
    }

    /// Repeat the VBUS short check once, after PD negotiation.
    pub async fn pd_vbus_short_check(&self) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        self.context(&mut inner).pd_vbus_short_check().await
    }

    /// Force a re-detect of a partner that did not answer PD.
    pub async fn probe_reset(&self) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        self.context(&mut inner).probe_reset().await
    }

    /// Reset and re-initialize the transceiver, then re-detect the plug.
    pub async fn usbpd_reset(&self) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        self.context(&mut inner).usbpd_reset().await
    }

    /// Record whether the partner talks PD.
    pub async fn set_pd_support(&self, on: bool) {
        self.inner.lock().await.state.pd_support = on;
    }

    /// The transmit message ID.
    pub async fn message_id(&self) -> Counter {
        self.inner.lock().await.state.message_id
    }

    /// Advance the transmit message ID, after a GoodCRC.
    pub async fn increment_message_id(&self) {
        // The ID wraps, which is not an error here.
        let _ = self.inner.lock().await.state.message_id.increment();
    }
}
