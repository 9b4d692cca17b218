//! Mock HAL implementation for testing
//!
//! `MockHal` simulates an SX127x behind the register bus: a register file
//! with separate FSK and LoRa pages, the 256-byte LoRa data buffer addressed
//! through `RegFifoAddrPtr`, the FSK FIFO, write-one-to-clear LoRa IRQ flags
//! and a GPIO bank with edge interrupt handlers. Entering TX captures the
//! frame the driver staged and raises the matching completion flags, so the
//! whole send/receive path can be exercised without hardware.
//!
//! Clones share the same simulated chip, which lets a test keep a handle for
//! inspection after moving the HAL into the driver.

use super::{EdgeType, Hal, HalError, IrqHandler, PinDirection, Pull};
use crate::constants::{EXPECTED_VERSION, LORA_FIFO_SIZE};
use crate::radio::registers::*;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

/// Register addresses shared by both pages
fn is_common(addr: u8) -> bool {
    addr < REG_LORA_FIFO_ADDR_PTR || addr >= REG_DIO_MAPPING_1
}

/// One bus transaction, as recorded in order by [`MockHal::events`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    Read(u8, u8),
    Write(u8, u8),
    BurstRead(u8, usize),
    BurstWrite(u8, Vec<u8>),
}

/// Simulated state of one GPIO line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinState {
    pub level: bool,
    pub direction: PinDirection,
    pub pull: Pull,
}

impl Default for PinState {
    fn default() -> Self {
        Self {
            level: false,
            direction: PinDirection::Input,
            pull: Pull::None,
        }
    }
}

struct MockChip {
    /// Common registers and the FSK page
    fsk: [u8; 128],
    /// LoRa page (only 0x0D..0x3F are used)
    lora: [u8; 128],
    lora_buffer: [u8; LORA_FIFO_SIZE],
    fsk_fifo: VecDeque<u8>,
    transmitted: Vec<Vec<u8>>,
    writes: Vec<(u8, u8)>,
    burst_writes: Vec<(u8, Vec<u8>)>,
    burst_reads: Vec<(u8, usize)>,
    events: Vec<BusEvent>,
    transactions: usize,
    /// FSK ModeReady polls answered "not ready" after each mode change
    mode_ready_delay: usize,
    mode_ready_pending: usize,
    pins: HashMap<u8, PinState>,
    pin_writes: Vec<(u8, bool)>,
    handlers: HashMap<u8, (EdgeType, IrqHandler)>,
    auto_irq_pin: Option<u8>,
    fail_bus: bool,
}

impl MockChip {
    fn new() -> Self {
        let mut fsk = [0u8; 128];
        fsk[REG_OP_MODE as usize] = MODE_LOW_FREQUENCY | MODE_STANDBY;
        fsk[REG_VERSION as usize] = EXPECTED_VERSION;
        // RF carrier 434 MHz after power-on reset
        fsk[REG_FRF_MSB as usize] = 0x6C;
        fsk[REG_FRF_MID as usize] = 0x80;
        fsk[REG_FRF_LSB as usize] = 0x00;
        fsk[REG_PA_CONFIG as usize] = 0x4F;
        fsk[REG_LNA as usize] = 0x20;
        fsk[REG_PA_DAC as usize] = PA_DAC_DEFAULT;

        let mut lora = [0u8; 128];
        lora[REG_LORA_MODEM_CONFIG_1 as usize] = 0x72;
        lora[REG_LORA_MODEM_CONFIG_2 as usize] = 0x70;
        lora[REG_LORA_PREAMBLE_LSB as usize] = 0x08;
        lora[REG_LORA_PAYLOAD_LENGTH as usize] = 0x01;
        lora[REG_LORA_DETECTION_OPTIMIZE as usize] = 0xC3;
        lora[REG_LORA_DETECTION_BW500_OPTIMIZE_1 as usize] = 0x03;
        lora[REG_LORA_DETECTION_THRESHOLD as usize] = 0x0A;
        lora[REG_LORA_SYNC_WORD as usize] = 0x12;

        Self {
            fsk,
            lora,
            lora_buffer: [0; LORA_FIFO_SIZE],
            fsk_fifo: VecDeque::new(),
            transmitted: Vec::new(),
            writes: Vec::new(),
            burst_writes: Vec::new(),
            burst_reads: Vec::new(),
            events: Vec::new(),
            transactions: 0,
            mode_ready_delay: 0,
            mode_ready_pending: 0,
            pins: HashMap::new(),
            pin_writes: Vec::new(),
            handlers: HashMap::new(),
            auto_irq_pin: None,
            fail_bus: false,
        }
    }

    fn lora_mode(&self) -> bool {
        self.fsk[REG_OP_MODE as usize] & MODE_LONG_RANGE != 0
    }

    fn page(&self, addr: u8) -> &[u8; 128] {
        if !is_common(addr) && self.lora_mode() {
            &self.lora
        } else {
            &self.fsk
        }
    }

    fn page_mut(&mut self, addr: u8) -> &mut [u8; 128] {
        if !is_common(addr) && self.lora_mode() {
            &mut self.lora
        } else {
            &mut self.fsk
        }
    }

    fn bus(&mut self) -> Result<(), HalError> {
        if self.fail_bus {
            return Err(HalError::Spi);
        }
        self.transactions += 1;
        Ok(())
    }

    fn read(&mut self, addr: u8) -> u8 {
        let addr = addr & 0x7F;
        if addr == REG_FIFO {
            if self.lora_mode() {
                let ptr = self.lora[REG_LORA_FIFO_ADDR_PTR as usize];
                self.lora[REG_LORA_FIFO_ADDR_PTR as usize] = ptr.wrapping_add(1);
                return self.lora_buffer[ptr as usize];
            }
            return self.fsk_fifo.pop_front().unwrap_or(0);
        }
        if addr == REG_FSK_IRQ_FLAGS_1 && !self.lora_mode() {
            let flags = self.fsk[addr as usize] & !FskIrq1::MODE_READY.bits();
            if self.mode_ready_pending > 0 {
                self.mode_ready_pending -= 1;
                return flags;
            }
            return flags | FskIrq1::MODE_READY.bits();
        }
        self.page(addr)[addr as usize]
    }

    /// Returns the pin to signal when the write raised a completion event
    fn write(&mut self, addr: u8, value: u8) -> Option<u8> {
        let addr = addr & 0x7F;
        if addr == REG_FIFO {
            if self.lora_mode() {
                let ptr = self.lora[REG_LORA_FIFO_ADDR_PTR as usize];
                self.lora_buffer[ptr as usize] = value;
                self.lora[REG_LORA_FIFO_ADDR_PTR as usize] = ptr.wrapping_add(1);
            } else {
                self.fsk_fifo.push_back(value);
            }
            return None;
        }
        if addr == REG_LORA_IRQ_FLAGS && self.lora_mode() {
            self.lora[addr as usize] &= !value;
            return None;
        }
        if addr == REG_OP_MODE {
            self.fsk[addr as usize] = value;
            self.mode_ready_pending = self.mode_ready_delay;
            if value & MODE_MASK == MODE_TX {
                return self.transmit();
            }
            return None;
        }
        self.page_mut(addr)[addr as usize] = value;
        None
    }

    fn transmit(&mut self) -> Option<u8> {
        let frame = if self.lora_mode() {
            let base = self.lora[REG_LORA_FIFO_TX_BASE_ADDR as usize] as usize;
            let len = self.lora[REG_LORA_PAYLOAD_LENGTH as usize] as usize;
            self.lora[REG_LORA_IRQ_FLAGS as usize] |= LoRaIrq::TX_DONE.bits();
            (0..len)
                .map(|i| self.lora_buffer[(base + i) % LORA_FIFO_SIZE])
                .collect()
        } else {
            self.fsk[REG_FSK_IRQ_FLAGS_2 as usize] |= FskIrq2::PACKET_SENT.bits();
            self.fsk_fifo.drain(..).collect()
        };
        self.transmitted.push(frame);

        // The chip falls back to standby once the packet is out
        let op = self.fsk[REG_OP_MODE as usize];
        self.fsk[REG_OP_MODE as usize] = (op & !MODE_MASK) | MODE_STANDBY;
        self.auto_irq_pin
    }

    fn receive(&mut self, frame: &[u8], crc_error: bool) -> Option<u8> {
        if self.lora_mode() {
            let base = self.lora[REG_LORA_FIFO_RX_BASE_ADDR as usize] as usize;
            for (i, byte) in frame.iter().enumerate() {
                self.lora_buffer[(base + i) % LORA_FIFO_SIZE] = *byte;
            }
            self.lora[REG_LORA_FIFO_RX_CURRENT_ADDR as usize] = base as u8;
            self.lora[REG_LORA_RX_NB_BYTES as usize] = frame.len() as u8;
            let mut flags = LoRaIrq::RX_DONE | LoRaIrq::VALID_HEADER;
            if crc_error {
                flags |= LoRaIrq::PAYLOAD_CRC_ERROR;
            }
            self.lora[REG_LORA_IRQ_FLAGS as usize] |= flags.bits();
        } else {
            self.fsk_fifo.extend(frame.iter().copied());
            self.fsk[REG_FSK_IRQ_FLAGS_2 as usize] |= FskIrq2::PAYLOAD_READY.bits();
        }
        self.auto_irq_pin
    }

    fn handler(&self, pin: u8) -> Option<IrqHandler> {
        self.handlers.get(&pin).map(|(_, handler)| Arc::clone(handler))
    }
}

/// Simulated SX127x behind the `Hal` trait
#[derive(Clone)]
pub struct MockHal {
    chip: Arc<Mutex<MockChip>>,
}

impl Default for MockHal {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockHal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockHal").finish_non_exhaustive()
    }
}

impl MockHal {
    pub fn new() -> Self {
        Self {
            chip: Arc::new(Mutex::new(MockChip::new())),
        }
    }

    fn chip(&self) -> MutexGuard<'_, MockChip> {
        // A panicking test thread must not hide the chip state from the others
        match self.chip.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Deliver an edge on `pin` to its registered handler, if any
    pub fn fire_interrupt(&self, pin: u8) -> bool {
        let handler = self.chip().handler(pin);
        match handler {
            Some(handler) => {
                handler();
                true
            }
            None => false,
        }
    }

    fn signal(&self, pin: Option<u8>) {
        if let Some(pin) = pin {
            self.fire_interrupt(pin);
        }
    }

    /// Fire `pin` automatically whenever a packet is sent or received
    pub fn set_auto_interrupt(&self, pin: Option<u8>) {
        self.chip().auto_irq_pin = pin;
    }

    /// Report FSK ModeReady only after `polls` "not ready" reads, counted
    /// from now and again after every `RegOpMode` write. Zero (the default)
    /// makes mode changes instant.
    pub fn set_mode_ready_delay(&self, polls: usize) {
        let mut chip = self.chip();
        chip.mode_ready_delay = polls;
        chip.mode_ready_pending = polls;
    }

    /// Make every subsequent bus transaction fail with `HalError::Spi`
    pub fn set_bus_failure(&self, fail: bool) {
        self.chip().fail_bus = fail;
    }

    /// Place a received frame into the active PHY's buffer and raise RX done
    pub fn inject_rx(&self, frame: &[u8]) {
        let pin = self.chip().receive(frame, false);
        self.signal(pin);
    }

    /// Like `inject_rx` but with the LoRa payload CRC error flag raised
    pub fn inject_rx_with_crc_error(&self, frame: &[u8]) {
        let pin = self.chip().receive(frame, true);
        self.signal(pin);
    }

    /// Frames captured on entry into TX, oldest first
    pub fn take_transmitted(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.chip().transmitted)
    }

    /// Register value as the chip would currently return it
    pub fn register(&self, addr: u8) -> u8 {
        let chip = self.chip();
        chip.page(addr)[(addr & 0x7F) as usize]
    }

    pub fn fsk_register(&self, addr: u8) -> u8 {
        self.chip().fsk[(addr & 0x7F) as usize]
    }

    pub fn lora_register(&self, addr: u8) -> u8 {
        let chip = self.chip();
        if is_common(addr) {
            chip.fsk[(addr & 0x7F) as usize]
        } else {
            chip.lora[(addr & 0x7F) as usize]
        }
    }

    pub fn set_fsk_register(&self, addr: u8, value: u8) {
        self.chip().fsk[(addr & 0x7F) as usize] = value;
    }

    pub fn set_lora_register(&self, addr: u8, value: u8) {
        let mut chip = self.chip();
        if is_common(addr) {
            chip.fsk[(addr & 0x7F) as usize] = value;
        } else {
            chip.lora[(addr & 0x7F) as usize] = value;
        }
    }

    /// All single-register writes as `(addr, value)`, in order
    pub fn writes(&self) -> Vec<(u8, u8)> {
        self.chip().writes.clone()
    }

    /// Values written to `addr` through single-register writes
    pub fn writes_to(&self, addr: u8) -> Vec<u8> {
        self.chip()
            .writes
            .iter()
            .filter(|(a, _)| *a == addr)
            .map(|(_, v)| *v)
            .collect()
    }

    pub fn burst_writes(&self) -> Vec<(u8, Vec<u8>)> {
        self.chip().burst_writes.clone()
    }

    pub fn burst_reads(&self) -> Vec<(u8, usize)> {
        self.chip().burst_reads.clone()
    }

    /// Every register transaction since the last `clear_log`, in order
    pub fn events(&self) -> Vec<BusEvent> {
        self.chip().events.clone()
    }

    /// Number of bus transactions issued so far
    pub fn transactions(&self) -> usize {
        self.chip().transactions
    }

    /// Forget logged writes, reads and pin activity
    pub fn clear_log(&self) {
        let mut chip = self.chip();
        chip.writes.clear();
        chip.burst_writes.clear();
        chip.burst_reads.clear();
        chip.events.clear();
        chip.pin_writes.clear();
        chip.transactions = 0;
    }

    pub fn pin(&self, pin: u8) -> PinState {
        self.chip().pins.get(&pin).copied().unwrap_or_default()
    }

    /// Levels driven onto output pins, in order
    pub fn pin_writes(&self) -> Vec<(u8, bool)> {
        self.chip().pin_writes.clone()
    }

    pub fn has_interrupt(&self, pin: u8) -> bool {
        self.chip().handlers.contains_key(&pin)
    }

    pub fn interrupt_edge(&self, pin: u8) -> Option<EdgeType> {
        self.chip().handlers.get(&pin).map(|(edge, _)| *edge)
    }
}

impl Hal for MockHal {
    fn read_register(&mut self, addr: u8) -> Result<u8, HalError> {
        let mut chip = self.chip();
        chip.bus()?;
        let value = chip.read(addr);
        chip.events.push(BusEvent::Read(addr & 0x7F, value));
        Ok(value)
    }

    fn write_register(&mut self, addr: u8, value: u8) -> Result<(), HalError> {
        let pin = {
            let mut chip = self.chip();
            chip.bus()?;
            chip.writes.push((addr & 0x7F, value));
            chip.events.push(BusEvent::Write(addr & 0x7F, value));
            chip.write(addr, value)
        };
        self.signal(pin);
        Ok(())
    }

    fn read_burst(&mut self, addr: u8, buf: &mut [u8]) -> Result<(), HalError> {
        let mut chip = self.chip();
        chip.bus()?;
        chip.burst_reads.push((addr & 0x7F, buf.len()));
        chip.events.push(BusEvent::BurstRead(addr & 0x7F, buf.len()));
        for (i, byte) in buf.iter_mut().enumerate() {
            let target = if is_fifo(addr) {
                REG_FIFO
            } else {
                addr.wrapping_add(i as u8)
            };
            *byte = chip.read(target);
        }
        Ok(())
    }

    fn write_burst(&mut self, addr: u8, data: &[u8]) -> Result<(), HalError> {
        let mut chip = self.chip();
        chip.bus()?;
        chip.burst_writes.push((addr & 0x7F, data.to_vec()));
        chip.events.push(BusEvent::BurstWrite(addr & 0x7F, data.to_vec()));
        for (i, byte) in data.iter().enumerate() {
            let target = if is_fifo(addr) {
                REG_FIFO
            } else {
                addr.wrapping_add(i as u8)
            };
            chip.write(target, *byte);
        }
        Ok(())
    }

    fn gpio_read(&mut self, pin: u8) -> Result<bool, HalError> {
        Ok(self.chip().pins.get(&pin).map(|p| p.level).unwrap_or(false))
    }

    fn gpio_write(&mut self, pin: u8, value: bool) -> Result<(), HalError> {
        let mut chip = self.chip();
        chip.pins.entry(pin).or_default().level = value;
        chip.pin_writes.push((pin, value));
        Ok(())
    }

    fn gpio_set_direction(&mut self, pin: u8, direction: PinDirection) -> Result<(), HalError> {
        self.chip().pins.entry(pin).or_default().direction = direction;
        Ok(())
    }

    fn gpio_set_pull(&mut self, pin: u8, pull: Pull) -> Result<(), HalError> {
        self.chip().pins.entry(pin).or_default().pull = pull;
        Ok(())
    }

    fn gpio_set_interrupt(
        &mut self,
        pin: u8,
        edge: EdgeType,
        handler: IrqHandler,
    ) -> Result<(), HalError> {
        self.chip().handlers.insert(pin, (edge, handler));
        Ok(())
    }

    fn gpio_clear_interrupt(&mut self, pin: u8) -> Result<(), HalError> {
        self.chip().handlers.remove(&pin);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_power_on_state() {
        let mut hal = MockHal::new();
        assert_eq!(hal.read_register(REG_VERSION).unwrap(), EXPECTED_VERSION);
        assert_eq!(hal.read_register(REG_OP_MODE).unwrap(), 0x09);
        let flags = hal.read_register(REG_FSK_IRQ_FLAGS_1).unwrap();
        assert!(FskIrq1::from_bits_truncate(flags).contains(FskIrq1::MODE_READY));
    }

    #[test]
    fn test_pages_are_selected_by_long_range_bit() {
        let mut hal = MockHal::new();
        hal.write_register(REG_LORA_SYNC_WORD, 0x55).unwrap();
        assert_eq!(hal.fsk_register(REG_LORA_SYNC_WORD), 0x55);

        hal.write_register(REG_OP_MODE, MODE_LONG_RANGE).unwrap();
        assert_eq!(hal.read_register(REG_LORA_SYNC_WORD).unwrap(), 0x12);
        // Common registers are visible from both pages
        assert_eq!(hal.read_register(REG_VERSION).unwrap(), EXPECTED_VERSION);
    }

    #[test]
    fn test_lora_buffer_auto_increment_and_irq_clear() {
        let mut hal = MockHal::new();
        hal.write_register(REG_OP_MODE, MODE_LONG_RANGE | MODE_STANDBY)
            .unwrap();
        hal.write_register(REG_LORA_FIFO_ADDR_PTR, 0x10).unwrap();
        hal.write_burst(REG_FIFO, &[1, 2, 3]).unwrap();
        assert_eq!(hal.register(REG_LORA_FIFO_ADDR_PTR), 0x13);

        hal.write_register(REG_LORA_FIFO_ADDR_PTR, 0x10).unwrap();
        let mut buf = [0u8; 3];
        hal.read_burst(REG_FIFO, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3]);

        hal.set_lora_register(REG_LORA_IRQ_FLAGS, 0x68);
        hal.write_register(REG_LORA_IRQ_FLAGS, LoRaIrq::TX_DONE.bits())
            .unwrap();
        assert_eq!(hal.register(REG_LORA_IRQ_FLAGS), 0x60);
    }

    #[test]
    fn test_tx_captures_frame_and_fires_auto_interrupt() {
        let mut hal = MockHal::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        hal.gpio_set_interrupt(
            24,
            EdgeType::Rising,
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();
        hal.set_auto_interrupt(Some(24));

        hal.write_burst(REG_FIFO, &[0xAB, 0xCD]).unwrap();
        hal.write_register(REG_OP_MODE, MODE_TX).unwrap();

        assert_eq!(hal.take_transmitted(), vec![vec![0xAB, 0xCD]]);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(hal.register(REG_OP_MODE) & MODE_MASK, MODE_STANDBY);
    }

    #[test]
    fn test_mode_ready_delay_restarts_on_mode_change() {
        let mut hal = MockHal::new();
        hal.set_mode_ready_delay(2);
        let ready = |hal: &mut MockHal| {
            let flags = hal.read_register(REG_FSK_IRQ_FLAGS_1).unwrap();
            FskIrq1::from_bits_truncate(flags).contains(FskIrq1::MODE_READY)
        };
        assert!(!ready(&mut hal));
        assert!(!ready(&mut hal));
        assert!(ready(&mut hal));

        hal.write_register(REG_OP_MODE, MODE_SLEEP).unwrap();
        assert!(!ready(&mut hal));
        assert!(!ready(&mut hal));
        assert!(ready(&mut hal));
        assert!(ready(&mut hal));
    }

    #[test]
    fn test_bus_failure() {
        let mut hal = MockHal::new();
        hal.set_bus_failure(true);
        assert!(matches!(hal.read_register(REG_VERSION), Err(HalError::Spi)));
        assert_eq!(hal.transactions(), 0);
    }
}
