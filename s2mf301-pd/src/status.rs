//! Sticky protocol events, and the mailbox that holds them until consumed.
//!
//! An event, once posted, stays pending until it is taken. Posting an event that is already
//! pending has no effect, so events of one kind that arrive before consumption coalesce.
use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;

macro_rules! event_kinds {
    ($($(#[$meta:meta])* $name:ident,)*) => {
        /// Kinds of pending protocol events.
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[repr(u8)]
        pub enum EventKind {
            $($(#[$meta])* $name,)*
        }

        impl EventKind {
            /// All event kinds, in discriminant order.
            pub const ALL: &'static [EventKind] = &[$(EventKind::$name,)*];
        }
    };
}

event_kinds! {
    /// A plug was attached.
    Attach,
    /// The plug was removed.
    Detach,
    /// The resistor ID changed.
    Rid,
    GoodCrc,
    Accept,
    PsRdy,
    Reject,
    Wait,
    Ping,
    /// Transmission failed.
    MessageError,
    HardReset,
    SoftReset,
    PrSwap,
    DrSwap,
    VconnSwap,
    GetSinkCap,
    GetSourceCap,
    /// A message was received and handed to the classifier.
    MessagePass,
    SourceCap,
    Request,
    Bist,
    SinkCap,
    BatteryStatus,
    Alert,
    GetCountryInfo,
    /// A reserved message type, or one not valid for the negotiated revision.
    Reserved,
    NotSupported,
    GetSourceCapExtended,
    GetStatus,
    FrSwap,
    GetPpsStatus,
    GetCountryCodes,
    GetSinkCapExtended,
    GetSourceInfo,
    GetRevision,
    /// Unstructured VDM from the platform vendor.
    Uvdm,
    /// Unstructured VDM from any other vendor.
    UvdmForeign,
    VdmDpStatusUpdate,
    VdmDpConfigure,
    VdmAttention,
    VdmExitMode,
    VdmEnterMode,
    VdmDiscoverModes,
    VdmDiscoverSvids,
    VdmDiscoverIdentity,
    /// Structured VDM with an SVID and vendor that are not handled.
    VdmUnrecognized,
    SourceCapExtended,
    Status,
    GetBatteryCap,
    GetBatteryStatus,
    BatteryCapabilities,
    GetManufacturerInfo,
    ManufacturerInfo,
    SecurityRequest,
    SecurityResponse,
    FirmwareUpdateRequest,
    FirmwareUpdateResponse,
    PpsStatus,
    CountryInfo,
    CountryCodes,
    SinkCapExtended,
}

impl EventKind {
    const fn bit(self) -> u128 {
        1 << (self as u8)
    }
}

/// A set of pending events.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatusSet(u128);

impl StatusSet {
    /// The empty set.
    pub const fn new() -> Self {
        Self(0)
    }

    /// Add an event.
    pub fn insert(&mut self, kind: EventKind) {
        self.0 |= kind.bit();
    }

    /// Builder variant of [`Self::insert`].
    pub fn with(mut self, kind: EventKind) -> Self {
        self.insert(kind);
        self
    }

    /// Whether an event is pending.
    pub fn contains(&self, kind: EventKind) -> bool {
        self.0 & kind.bit() != 0
    }

    /// Remove an event, returning whether it was pending.
    pub fn remove(&mut self, kind: EventKind) -> bool {
        let pending = self.contains(kind);
        self.0 &= !kind.bit();
        pending
    }

    /// Add all events of another set.
    pub fn extend(&mut self, other: StatusSet) {
        self.0 |= other.0;
    }

    /// Keep only the events that are also in `other`.
    pub fn retain(&mut self, other: StatusSet) {
        self.0 &= other.0;
    }

    /// Whether no event is pending.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Iterate the pending events.
    pub fn iter(&self) -> impl Iterator<Item = EventKind> + '_ {
        EventKind::ALL.iter().copied().filter(|kind| self.contains(*kind))
    }
}

impl core::fmt::Debug for StatusSet {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl FromIterator<EventKind> for StatusSet {
    fn from_iter<I: IntoIterator<Item = EventKind>>(iter: I) -> Self {
        let mut set = Self::new();
        for kind in iter {
            set.insert(kind);
        }
        set
    }
}

/// The sticky event mailbox.
///
/// Guarded by its own lock, so that posting and taking events never waits for the port lock.
pub struct StatusMailbox<M: RawMutex> {
    events: Mutex<M, RefCell<StatusSet>>,
}

impl<M: RawMutex> Default for StatusMailbox<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: RawMutex> StatusMailbox<M> {
    /// An empty mailbox.
    pub const fn new() -> Self {
        Self {
            events: Mutex::new(RefCell::new(StatusSet::new())),
        }
    }

    /// Post all events of a set. Never clears anything.
    pub fn merge(&self, events: StatusSet) {
        self.events.lock(|pending| pending.borrow_mut().extend(events));
    }

    /// Post a single event.
    pub fn post(&self, kind: EventKind) {
        self.merge(StatusSet::new().with(kind));
    }

    /// Take a single event, returning whether it was pending.
    ///
    /// Other pending events are left untouched.
    pub fn take(&self, kind: EventKind) -> bool {
        self.events.lock(|pending| pending.borrow_mut().remove(kind))
    }

    /// Drop all pending events.
    pub fn clear(&self) {
        self.events.lock(|pending| *pending.borrow_mut() = StatusSet::new());
    }

    /// Drop all pending events, except those in `keep`.
    pub fn retain(&self, keep: StatusSet) {
        self.events.lock(|pending| pending.borrow_mut().retain(keep));
    }

    /// A copy of the pending events.
    pub fn snapshot(&self) -> StatusSet {
        self.events.lock(|pending| *pending.borrow())
    }
}
