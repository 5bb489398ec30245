//! Register map of the S2MF301 PD block.
//!
//! Every logical register is a small bitfield type that implements [`RegisterValue`], so
//! that read-modify-write sequences only touch named fields.
use proc_bitfield::bitfield;

use crate::{DataRole, PowerRole};

/// Register addresses.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Register {
    PhyCtrl00 = 0x00,
    PhyCtrl01 = 0x01,
    PhyCtrlIfg = 0x02,
    BmcCtrl = 0x03,
    PhyCtrl08 = 0x08,
    MsgSendCon = 0x10,
    Retransmission = 0x11,
    PpsCtrl = 0x12,
    PpsMinCurrent = 0x13,
    PpsMaxCurrent = 0x14,
    PlugCtrlMsg = 0x18,
    PlugCtrlVbusMux = 0x1b,
    DebounceLow = 0x20,
    DebounceHigh = 0x21,
    TimerSelect = 0x24,
    TimerValue = 0x25,
    PlugCtrlPort = 0x26,
    PlugCtrlRpRd = 0x27,
    PlugCtrlPd12 = 0x28,
    PlugCtrlSetRd = 0x29,
    PlugCtrlSetRp = 0x2a,
    PlugCtrlSetRd2 = 0x2b,
    PlugCtrlSetRp2 = 0x2c,
    PlugCtrlSetMon = 0x2d,
    PlugCtrl = 0x2e,
    PlugCtrlPdHold = 0x2f,
    PdCtrl = 0x30,
    PdCtrl2 = 0x31,
    Etc = 0x32,
    MsgTxHeader = 0x40,
    MsgRxHeader = 0x60,
    MsgRxObject0 = 0x62,
    AdcStatus = 0xb2,
    PlugMon1 = 0xb3,
    PlugMon2 = 0xb4,
    PlugFsmMon = 0xb5,
    IntStatus0 = 0xe0,
    IntMask0 = 0xf0,
}

impl From<Register> for u8 {
    fn from(register: Register) -> Self {
        register as u8
    }
}

/// Number of interrupt status (and mask) registers.
pub const NUM_INT_STATUS: usize = 10;

/// A typed register value that lives at a fixed address.
pub trait RegisterValue: Copy + From<u8> + Into<u8> {
    /// The register address.
    const ADDRESS: Register;
}

macro_rules! register_value {
    ($($ty:ty => $address:ident),* $(,)?) => {
        $(
            impl RegisterValue for $ty {
                const ADDRESS: Register = Register::$address;
            }
        )*
    };
}

register_value! {
    MsgSendCon => MsgSendCon,
    Retransmission => Retransmission,
    PlugCtrlPort => PlugCtrlPort,
    PlugCtrlRpRd => PlugCtrlRpRd,
    PlugCtrlPd12 => PlugCtrlPd12,
    PlugCtrlMsg => PlugCtrlMsg,
    PlugCtrl => PlugCtrl,
    PlugCtrlVbusMux => PlugCtrlVbusMux,
    PlugCtrlSetMon => PlugCtrlSetMon,
    PlugCtrlPdHold => PlugCtrlPdHold,
    PlugMon2 => PlugMon2,
    AdcStatus => AdcStatus,
    PdCtrl => PdCtrl,
    PdCtrl2 => PdCtrl2,
    PpsCtrl => PpsCtrl,
    Etc => Etc,
    PhyCtrlIfg => PhyCtrlIfg,
    BmcCtrl => BmcCtrl,
}

bitfield! {
    /// Message send control.
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct MsgSendCon(pub u8): Debug, FromStorage, IntoStorage {
        /// Start sending the message in the TX buffer. Auto-clears when configured.
        pub send_msg_en: bool @ 0,
        /// Operating mode. Set while a PD contract is being serviced.
        pub op_mode: bool @ 1,
        /// Start-of-packet type to send.
        pub sop: u8 [SopType] @ 2..=4,
        /// Hard-reset handling enable.
        pub hard_en: bool @ 7,
    }
}

impl MsgSendCon {
    /// Send control value that leaves only hard-reset handling enabled.
    pub const HARD_EN: Self = Self(0x80);
    /// Op-mode together with hard-reset handling.
    pub const OP_MODE_HARD_EN: Self = Self(0x82);
}

/// Start-of-packet types.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SopType {
    Sop,
    SopPrime,
    SopDoublePrime,
    HardReset,
    CableReset,
    Reserved(u8),
}

impl From<u8> for SopType {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Sop,
            1 => Self::SopPrime,
            2 => Self::SopDoublePrime,
            5 => Self::HardReset,
            6 => Self::CableReset,
            x => Self::Reserved(x),
        }
    }
}

impl From<SopType> for u8 {
    fn from(value: SopType) -> Self {
        match value {
            SopType::Sop => 0,
            SopType::SopPrime => 1,
            SopType::SopDoublePrime => 2,
            SopType::HardReset => 5,
            SopType::CableReset => 6,
            SopType::Reserved(x) => x,
        }
    }
}

bitfield! {
    /// Hardware retransmission control.
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Retransmission(pub u8): Debug, FromStorage, IntoStorage {
        /// Number of automatic retransmissions when no GoodCRC is received.
        pub count: u8 @ 4..=5,
    }
}

bitfield! {
    /// Port mode and advertised Rp current.
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct PlugCtrlPort(pub u8): Debug, FromStorage, IntoStorage {
        pub mode: u8 [PortMode] @ 0..=1,
        pub rp_sel: u8 [RpLevel] @ 4..=5,
    }
}

/// Type-C port modes of the connection FSM.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PortMode {
    Ufp,
    Dfp,
    Drp,
    Reserved,
}

impl From<u8> for PortMode {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Ufp,
            1 => Self::Dfp,
            2 => Self::Drp,
            _ => Self::Reserved,
        }
    }
}

impl From<PortMode> for u8 {
    fn from(value: PortMode) -> Self {
        match value {
            PortMode::Ufp => 0,
            PortMode::Dfp => 1,
            PortMode::Drp => 2,
            PortMode::Reserved => 3,
        }
    }
}

/// Advertised Rp current tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RpLevel {
    /// Rp disabled.
    Rp0,
    /// Default USB power, 80 µA.
    Rp80,
    /// 1.5 A, 180 µA.
    Rp180,
    /// 3.0 A, 330 µA.
    Rp330,
}

impl From<u8> for RpLevel {
    fn from(value: u8) -> Self {
        match value & 0b11 {
            0 => Self::Rp0,
            1 => Self::Rp80,
            2 => Self::Rp180,
            _ => Self::Rp330,
        }
    }
}

impl From<RpLevel> for u8 {
    fn from(value: RpLevel) -> Self {
        match value {
            RpLevel::Rp0 => 0,
            RpLevel::Rp80 => 1,
            RpLevel::Rp180 => 2,
            RpLevel::Rp330 => 3,
        }
    }
}

bitfield! {
    /// Manual control of the CC pull resistors and VCONN switches.
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct PlugCtrlRpRd(pub u8): Debug, FromStorage, IntoStorage {
        /// The CC pin that VCONN is sourced on.
        pub vconn_pin: u8 [VconnPin] @ 0..=1,
        /// VCONN switches follow `vconn_pin` rather than the FSM.
        pub vconn_manual_en: bool @ 3,
        /// Manual pull override.
        pub manual: u8 [PullOverride] @ 4..=5,
        /// The connection FSM follows the manual input in `PlugCtrlPd12`.
        pub fsm_manual_en: bool @ 7,
    }
}

/// CC pin that carries VCONN.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VconnPin {
    None,
    Pd1,
    Pd2,
    Reserved,
}

impl From<u8> for VconnPin {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::None,
            1 => Self::Pd1,
            2 => Self::Pd2,
            _ => Self::Reserved,
        }
    }
}

impl From<VconnPin> for u8 {
    fn from(value: VconnPin) -> Self {
        match value {
            VconnPin::None => 0,
            VconnPin::Pd1 => 1,
            VconnPin::Pd2 => 2,
            VconnPin::Reserved => 3,
        }
    }
}

/// Manual pull override of both CC pins.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PullOverride {
    Off,
    RdSink,
    RpSource,
    Reserved,
}

impl From<u8> for PullOverride {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Off,
            1 => Self::RdSink,
            2 => Self::RpSource,
            _ => Self::Reserved,
        }
    }
}

impl From<PullOverride> for u8 {
    fn from(value: PullOverride) -> Self {
        match value {
            PullOverride::Off => 0,
            PullOverride::RdSink => 1,
            PullOverride::RpSource => 2,
            PullOverride::Reserved => 3,
        }
    }
}

bitfield! {
    /// Manual FSM input and per-pin manual switches.
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct PlugCtrlPd12(pub u8): Debug, FromStorage, IntoStorage {
        pub fsm_input: u8 [FsmInput] @ 0..=2,
        pub pd1_manual_on: bool @ 4,
        pub pd2_manual_on: bool @ 5,
    }
}

/// States that the connection FSM can be forced into.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FsmInput {
    None,
    UnattachedSnk,
    UnattachedSrc,
    AttachedSnk,
    AttachedSrc,
    Reserved(u8),
}

impl From<u8> for FsmInput {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::None,
            1 => Self::UnattachedSnk,
            2 => Self::UnattachedSrc,
            3 => Self::AttachedSnk,
            4 => Self::AttachedSrc,
            x => Self::Reserved(x),
        }
    }
}

impl From<FsmInput> for u8 {
    fn from(value: FsmInput) -> Self {
        match value {
            FsmInput::None => 0,
            FsmInput::UnattachedSnk => 1,
            FsmInput::UnattachedSrc => 2,
            FsmInput::AttachedSnk => 3,
            FsmInput::AttachedSrc => 4,
            FsmInput::Reserved(x) => x,
        }
    }
}

bitfield! {
    /// Roles stamped into transmitted headers by the hardware.
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct PlugCtrlMsg(pub u8): Debug, FromStorage, IntoStorage {
        pub data_role: bool [DataRole] @ 2,
        pub power_role: bool [PowerRole] @ 3,
    }
}

bitfield! {
    /// Plug control.
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct PlugCtrl(pub u8): Debug, FromStorage, IntoStorage {
        /// Source capabilities are ready, i.e. PD control is on.
        pub eco_src_cap_rdy: bool @ 0,
        /// Attach as UFP on CC detection alone.
        pub ufp_attach_opt_en: bool @ 1,
        pub vdm_disable: bool @ 4,
        pub ssm_disable: bool @ 5,
    }
}

bitfield! {
    /// VBUS detection multiplexer.
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct PlugCtrlVbusMux(pub u8): Debug, FromStorage, IntoStorage {
        /// Use Rd detection in place of VBUS.
        pub rd_or_vbus_mux_sel: bool @ 4,
        /// Auto-clear `send_msg_en` on message sent or GoodCRC.
        pub send_en_clear_sel: bool @ 5,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct PlugCtrlSetMon(pub u8): Debug, FromStorage, IntoStorage {
        /// Report Rd monitor status while attached as sink.
        pub rd: bool @ 1,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct PlugCtrlPdHold(pub u8): Debug, FromStorage, IntoStorage {
        /// Support audio and debug accessories.
        pub support_accessory: bool @ 7,
    }
}

bitfield! {
    /// Comparator threshold for CC level detection.
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct SliceThreshold(pub u8): Debug, FromStorage, IntoStorage {
        /// Index into [`SLICE_MILLIVOLTS`].
        pub level: u8 @ 0..=5,
        /// Enable bit, required for Rd thresholds.
        pub enable: bool @ 6,
    }
}

/// Millivolts for each comparator threshold level.
pub const SLICE_MILLIVOLTS: [u16; 64] = [
    0, 43, 85, 128, 171, 214, 257, 300, 342, 385, 428, 471, 514, 556, 599, 642, 685, 728, 770, 813, 856, 899, 942,
    984, 1027, 1070, 1113, 1156, 1198, 1241, 1284, 1327, 1370, 1412, 1455, 1498, 1541, 1584, 1626, 1669, 1712,
    1755, 1797, 1840, 1883, 1926, 1969, 2011, 2054, 2097, 2140, 2183, 2225, 2268, 2311, 2354, 2397, 2439, 2482,
    2525, 2568, 2611, 2653, 2696,
];

/// Named comparator threshold levels.
#[allow(missing_docs)]
pub mod threshold {
    pub const MV_214: u8 = 5;
    pub const MV_257: u8 = 6;
    pub const MV_428: u8 = 10;
    pub const MV_599: u8 = 14;
    pub const MV_813: u8 = 19;
    pub const MV_1198: u8 = 28;
    pub const MV_1626: u8 = 38;
    pub const MAX: u8 = 63;
}

bitfield! {
    /// CC levels of both pins.
    ///
    /// Layout of both [`Register::PlugMon1`], the sampled levels, and
    /// [`Register::PlugFsmMon`], the Rp current that a sink sees.
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct CcMonitor(pub u8): Debug, FromStorage, IntoStorage {
        pub cc1: u8 [CcLevel] @ 0..=2,
        pub cc2: u8 [CcLevel] @ 4..=6,
    }
}

/// Classified voltage level of a CC pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CcLevel {
    /// Nothing connected.
    #[default]
    Open,
    /// Powered cable or audio accessory.
    Ra,
    /// Sink pull-down.
    Rd,
    /// Source pull-up, current unspecified.
    Rp,
    /// Default USB power pull-up.
    Rp56k,
    /// 1.5 A pull-up.
    Rp22k,
    /// 3.0 A pull-up.
    Rp10k,
    /// Reserved encoding.
    Reserved,
}

impl From<u8> for CcLevel {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Open,
            1 => Self::Ra,
            2 => Self::Rd,
            3 => Self::Rp,
            4 => Self::Rp56k,
            5 => Self::Rp22k,
            6 => Self::Rp10k,
            _ => Self::Reserved,
        }
    }
}

impl From<CcLevel> for u8 {
    fn from(value: CcLevel) -> Self {
        match value {
            CcLevel::Open => 0,
            CcLevel::Ra => 1,
            CcLevel::Rd => 2,
            CcLevel::Rp => 3,
            CcLevel::Rp56k => 4,
            CcLevel::Rp22k => 5,
            CcLevel::Rp10k => 6,
            CcLevel::Reserved => 7,
        }
    }
}

bitfield! {
    /// Plug monitor, attach classification.
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct PlugMon2(pub u8): Debug, FromStorage, IntoStorage {
        pub plug_state: u8 [PlugState] @ 0..=2,
    }
}

/// Attach classification reported by the connection FSM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlugState {
    /// The partner presents Rp, so the port is a sink.
    Sink,
    /// The partner presents Rd, so the port is a source.
    Source,
    /// Any other pattern.
    Unknown(u8),
}

impl From<u8> for PlugState {
    fn from(value: u8) -> Self {
        match value {
            0b001 => Self::Sink,
            0b010 => Self::Source,
            x => Self::Unknown(x),
        }
    }
}

impl From<PlugState> for u8 {
    fn from(value: PlugState) -> Self {
        match value {
            PlugState::Sink => 0b001,
            PlugState::Source => 0b010,
            PlugState::Unknown(x) => x,
        }
    }
}

bitfield! {
    /// ADC status, carrying the resistor ID.
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct AdcStatus(pub u8): Debug, FromStorage, IntoStorage {
        /// Raw resistor ID code, see [`crate::port::Rid`].
        pub rid: u8 @ 0..=3,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct PdCtrl(pub u8): Debug, FromStorage, IntoStorage {
        /// Low power mode.
        pub lpm_en: bool @ 1,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct PdCtrl2(pub u8): Debug, FromStorage, IntoStorage {
        /// Over-current protection level.
        pub ocp: u8 @ 4..=6,
    }
}

/// OCP code for 575 mV.
pub const OCP_575MV: u8 = 0b011;

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct PpsCtrl(pub u8): Debug, FromStorage, IntoStorage {
        /// Message type interrupts fire with message-pass, rather than after the RX header.
        pub msg_irq_sel: bool @ 0,
        pub pps_enable: bool @ 2,
        pub pps_timer: u8 @ 4..=5,
    }
}

/// PPS timer code for an 8 s request period.
pub const PPS_TIMER_8S: u8 = 0b10;

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Etc(pub u8): Debug, FromStorage, IntoStorage {
        /// Protocol block soft reset.
        pub soft_reset: bool @ 2,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct PhyCtrlIfg(pub u8): Debug, FromStorage, IntoStorage {
        /// Inter-frame gap.
        pub ifg: u8 @ 4..=7,
    }
}

/// Inter-frame gap code for 35 µs.
pub const IFG_35US: u8 = 0x3;

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct BmcCtrl(pub u8): Debug, FromStorage, IntoStorage {
        pub bmc_rx_enable: bool @ 2,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Int0(pub u8): Debug, FromStorage, IntoStorage {
        pub accept: bool @ 1,
        pub goodcrc: bool @ 2,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Int1(pub u8): Debug, FromStorage, IntoStorage {
        pub ping: bool @ 0,
        pub get_src_cap: bool @ 1,
        pub get_snk_cap: bool @ 2,
        pub dr_swap: bool @ 3,
        pub pr_swap: bool @ 4,
        pub psrdy: bool @ 6,
        pub reject: bool @ 7,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Int2(pub u8): Debug, FromStorage, IntoStorage {
        pub wait: bool @ 0,
        pub soft_reset: bool @ 1,
        /// A request message accompanies the current event batch.
        pub msg_request: bool @ 2,
        pub vconn_swap: bool @ 3,
        pub wakeup: bool @ 7,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Int3(pub u8): Debug, FromStorage, IntoStorage {
        /// Unsolicited command data, reported with an RID change.
        pub uns_cmd_data: bool @ 0,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Int4(pub u8): Debug, FromStorage, IntoStorage {
        pub msg_error: bool @ 0,
        /// A message was received completely.
        pub msg_pass: bool @ 1,
        pub plug_irq: bool @ 3,
        pub usb_detach: bool @ 4,
        pub pd12_det_irq: bool @ 5,
    }
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Int5(pub u8): Debug, FromStorage, IntoStorage {
        pub hard_reset: bool @ 0,
    }
}

/// A snapshot of all interrupt status registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InterruptStatus(pub [u8; NUM_INT_STATUS]);

#[allow(missing_docs)]
impl InterruptStatus {
    pub fn int0(&self) -> Int0 {
        Int0(self.0[0])
    }

    pub fn int1(&self) -> Int1 {
        Int1(self.0[1])
    }

    pub fn int2(&self) -> Int2 {
        Int2(self.0[2])
    }

    pub fn int3(&self) -> Int3 {
        Int3(self.0[3])
    }

    pub fn int4(&self) -> Int4 {
        Int4(self.0[4])
    }

    pub fn int5(&self) -> Int5 {
        Int5(self.0[5])
    }

    pub fn set_int4(&mut self, value: Int4) {
        self.0[4] = value.0;
    }

    /// No protocol-relevant status is pending.
    ///
    /// Only the first six registers carry events that the port acts on.
    pub fn is_idle(&self) -> bool {
        self.0[..6].iter().all(|&byte| byte == 0)
    }
}

/// Interrupt masks, where a set bit masks the interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InterruptMask(pub [u8; NUM_INT_STATUS]);

impl InterruptMask {
    /// Mask everything.
    pub const NONE: Self = Self([0xff; NUM_INT_STATUS]);

    /// Unmask the given enable bits for the six event registers.
    pub const fn from_enabled(enabled: [u8; 6]) -> Self {
        let mut mask = [0xff; NUM_INT_STATUS];
        let mut i = 0;
        while i < 6 {
            mask[i] = !enabled[i];
            i += 1;
        }
        Self(mask)
    }

    /// The regular set of handled interrupts.
    pub const ENABLED: Self = Self::from_enabled([0x06, 0xdf, 0x8f, 0x01, 0x3b, 0x01]);

    /// Interrupts handled while PPS is active.
    pub const PPS: Self = Self::from_enabled([0x00, 0x40, 0x00, 0x00, 0x03, 0x01]);

    /// Interrupts handled while the CC lines are held open.
    pub const CC_OPEN: Self = Self::from_enabled([0x00, 0x00, 0x00, 0x01, 0x10, 0x00]);
}
