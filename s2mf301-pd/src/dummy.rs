//! Implements a mock transport, timer and device policy manager for testing.
use std::collections::{HashMap, VecDeque};
use std::vec::Vec;

use s2mf301_traits::{RegisterTransport, TransportError};
use uom::si::electric_potential::millivolt;
use uom::si::u32::ElectricPotential;

use crate::device_policy_manager::{DevicePolicyManager, Notification, PolicyCommand};
use crate::registers::{NUM_INT_STATUS, Register};
use crate::timers::Timer;

/// A timer that expires immediately.
pub struct DummyTimer {}

impl Timer for DummyTimer {
    async fn after_millis(_milliseconds: u64) {}
}

/// A register map that records all traffic.
pub struct MockTransport {
    registers: [u8; 256],
    fail_all: bool,
    failing_register: Option<u8>,
    failing_bulk_reads: usize,
    bulk_reads: HashMap<u8, usize>,
    bulk_written: HashMap<u8, Vec<u8>>,
    writes: Vec<(u8, u8)>,
    read_queues: HashMap<u8, VecDeque<u8>>,
    rx_headers: VecDeque<u16>,
    interrupts: VecDeque<[u8; NUM_INT_STATUS]>,
    irq_enabled: bool,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Create a mock with all registers cleared.
    pub fn new() -> Self {
        Self {
            registers: [0; 256],
            fail_all: false,
            failing_register: None,
            failing_bulk_reads: 0,
            bulk_reads: HashMap::new(),
            bulk_written: HashMap::new(),
            writes: Vec::new(),
            read_queues: HashMap::new(),
            rx_headers: VecDeque::new(),
            interrupts: VecDeque::new(),
            irq_enabled: true,
        }
    }

    /// Fail every access from now on.
    pub fn fail_all(&mut self, fail: bool) {
        self.fail_all = fail;
    }

    /// Fail every access that starts at one register.
    pub fn fail_register(&mut self, register: Register) {
        self.failing_register = Some(register.into());
    }

    fn fails(&self, register: u8) -> bool {
        self.fail_all || self.failing_register == Some(register)
    }

    /// Fail the next `count` bulk reads.
    pub fn fail_next_bulk_reads(&mut self, count: usize) {
        self.failing_bulk_reads = count;
    }

    /// Set a register value, without recording a write.
    pub fn set(&mut self, register: Register, value: u8) {
        self.registers[u8::from(register) as usize] = value;
    }

    /// Set consecutive raw registers, without recording writes.
    pub fn set_raw(&mut self, address: u8, data: &[u8]) {
        let start = address as usize;
        self.registers[start..start + data.len()].copy_from_slice(data);
    }

    /// The current value of a register.
    pub fn get(&self, register: Register) -> u8 {
        self.registers[u8::from(register) as usize]
    }

    /// Script values that single reads of a register return, before falling back to the map.
    pub fn queue_reads(&mut self, register: Register, values: &[u8]) {
        self.read_queues
            .entry(register.into())
            .or_default()
            .extend(values.iter().copied());
    }

    /// Script a header for the next RX header read.
    pub fn queue_rx_header(&mut self, header: u16) {
        self.rx_headers.push_back(header);
    }

    /// Script the interrupt status for the next status read. Unscripted reads return zeros.
    pub fn queue_interrupts(&mut self, status: [u8; NUM_INT_STATUS]) {
        self.interrupts.push_back(status);
    }

    /// Number of bulk reads that started at a register.
    pub fn bulk_reads(&self, register: Register) -> usize {
        self.bulk_reads.get(&register.into()).copied().unwrap_or(0)
    }

    /// The data of the last bulk write that started at a register.
    pub fn bulk_written(&self, register: Register) -> Option<Vec<u8>> {
        self.bulk_written.get(&register.into()).cloned()
    }

    /// All single writes to a register, in order.
    pub fn writes(&self, register: Register) -> Vec<u8> {
        let address = u8::from(register);
        self.writes
            .iter()
            .filter(|(a, _)| *a == address)
            .map(|(_, v)| *v)
            .collect()
    }

    /// Number of single and bulk writes, in total.
    pub fn write_count(&self) -> usize {
        self.writes.len() + self.bulk_written.values().count()
    }

    /// Forget all recorded traffic.
    pub fn clear_log(&mut self) {
        self.writes.clear();
        self.bulk_written.clear();
        self.bulk_reads.clear();
    }

    /// Whether the interrupt line is unmasked.
    pub fn irq_enabled(&self) -> bool {
        self.irq_enabled
    }
}

impl RegisterTransport for MockTransport {
    async fn read(&mut self, register: u8) -> Result<u8, TransportError> {
        if self.fails(register) {
            return Err(TransportError::Nack);
        }

        if let Some(value) = self.read_queues.get_mut(&register).and_then(|queue| queue.pop_front()) {
            return Ok(value);
        }

        Ok(self.registers[register as usize])
    }

    async fn write(&mut self, register: u8, value: u8) -> Result<(), TransportError> {
        if self.fails(register) {
            return Err(TransportError::Nack);
        }

        self.registers[register as usize] = value;
        self.writes.push((register, value));
        Ok(())
    }

    async fn bulk_read(&mut self, register: u8, buffer: &mut [u8]) -> Result<(), TransportError> {
        *self.bulk_reads.entry(register).or_default() += 1;

        if self.fails(register) {
            return Err(TransportError::Nack);
        }

        if self.failing_bulk_reads > 0 {
            self.failing_bulk_reads -= 1;
            return Err(TransportError::Bus);
        }

        if register == u8::from(Register::MsgRxHeader) {
            if let Some(header) = self.rx_headers.pop_front() {
                buffer.copy_from_slice(&header.to_le_bytes()[..buffer.len()]);
                return Ok(());
            }
        }

        if register == u8::from(Register::IntStatus0) {
            let status = self.interrupts.pop_front().unwrap_or([0; NUM_INT_STATUS]);
            buffer.copy_from_slice(&status[..buffer.len()]);
            return Ok(());
        }

        let start = register as usize;
        buffer.copy_from_slice(&self.registers[start..start + buffer.len()]);
        Ok(())
    }

    async fn bulk_write(&mut self, register: u8, data: &[u8]) -> Result<(), TransportError> {
        if self.fails(register) {
            return Err(TransportError::Nack);
        }

        let start = register as usize;
        self.registers[start..start + data.len()].copy_from_slice(data);
        self.bulk_written.insert(register, data.to_vec());
        Ok(())
    }

    fn set_interrupt_enabled(&mut self, enabled: bool) {
        self.irq_enabled = enabled;
    }
}

/// Calls made into a [`RecordingDpm`].
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DpmCall {
    Notify(Notification),
    Policy(PolicyCommand),
    Vbus(bool),
    VconnRegulator(bool),
    VbusDischarge(bool),
    OtgVctrl(bool),
}

/// A device policy manager that records every call.
#[derive(Default)]
pub struct RecordingDpm {
    /// All calls, in order.
    pub calls: Vec<DpmCall>,
    /// The VBUS voltage to report, in millivolts.
    pub vbus_millivolts: Option<u32>,
}

impl RecordingDpm {
    /// All notifications, in order.
    pub fn notifications(&self) -> Vec<Notification> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                DpmCall::Notify(n) => Some(*n),
                _ => None,
            })
            .collect()
    }

    /// All policy commands, in order.
    pub fn commands(&self) -> Vec<PolicyCommand> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                DpmCall::Policy(c) => Some(*c),
                _ => None,
            })
            .collect()
    }
}

impl DevicePolicyManager for RecordingDpm {
    async fn notify(&mut self, notification: Notification) {
        self.calls.push(DpmCall::Notify(notification));
    }

    async fn policy(&mut self, command: PolicyCommand) {
        self.calls.push(DpmCall::Policy(command));
    }

    async fn set_vbus(&mut self, on: bool) {
        self.calls.push(DpmCall::Vbus(on));
    }

    async fn vbus_voltage(&mut self) -> Option<ElectricPotential> {
        self.vbus_millivolts.map(ElectricPotential::new::<millivolt>)
    }

    fn set_vconn_regulator(&mut self, on: bool) {
        self.calls.push(DpmCall::VconnRegulator(on));
    }

    fn set_vbus_discharge(&mut self, on: bool) {
        self.calls.push(DpmCall::VbusDischarge(on));
    }

    fn set_otg_vctrl(&mut self, on: bool) {
        self.calls.push(DpmCall::OtgVctrl(on));
    }
}
