//! Transmit-only nRF24L01+ driver.
//!
//! The node never receives, so the driver only knows enough of the chip to
//! configure one writing pipe and push a fixed-size payload with the
//! transceiver's auto-acknowledge and auto-retransmit. Between frames the
//! chip is powered down.

use embedded_hal::digital::OutputPin;
use embedded_hal::spi::{Error as _, ErrorKind};
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::spi::SpiDevice;
use log::{debug, info};
use thiserror_no_std::Error;

use crate::message::Frame;
use crate::node::{DataRate, PowerLevel, RadioSettings, Transmitter};

#[allow(dead_code)]
mod command {
    pub const R_REGISTER: u8 = 0x00;
    pub const W_REGISTER: u8 = 0x20;
    pub const W_TX_PAYLOAD: u8 = 0xA0;
    pub const FLUSH_TX: u8 = 0xE1;
    pub const FLUSH_RX: u8 = 0xE2;
    pub const NOP: u8 = 0xFF;
}

#[allow(dead_code)]
pub mod register {
    pub const CONFIG: u8 = 0x00;
    pub const EN_AA: u8 = 0x01;
    pub const EN_RXADDR: u8 = 0x02;
    pub const SETUP_AW: u8 = 0x03;
    pub const SETUP_RETR: u8 = 0x04;
    pub const RF_CH: u8 = 0x05;
    pub const RF_SETUP: u8 = 0x06;
    pub const STATUS: u8 = 0x07;
    pub const OBSERVE_TX: u8 = 0x08;
    pub const RX_ADDR_P0: u8 = 0x0A;
    pub const TX_ADDR: u8 = 0x10;
    pub const RX_PW_P0: u8 = 0x11;
    pub const FIFO_STATUS: u8 = 0x17;
    pub const DYNPD: u8 = 0x1C;
    pub const FEATURE: u8 = 0x1D;
}

pub mod config_bits {
    pub const PRIM_RX: u8 = 1 << 0;
    pub const PWR_UP: u8 = 1 << 1;
    pub const CRCO: u8 = 1 << 2;
    pub const EN_CRC: u8 = 1 << 3;
}

pub mod status_bits {
    pub const MAX_RT: u8 = 1 << 4;
    pub const TX_DS: u8 = 1 << 5;
    pub const RX_DR: u8 = 1 << 6;
    pub const ALL_IRQ: u8 = MAX_RT | TX_DS | RX_DR;
}

const MAX_PAYLOAD: usize = 32;

/// Five-byte addresses.
const ADDRESS_WIDTH_5: u8 = 0b11;

const RF_DR_LOW: u8 = 1 << 5;
const RF_DR_HIGH: u8 = 1 << 3;

/// Power-down to standby settling time.
const POWER_UP_US: u32 = 2_000;
/// Minimum CE pulse to start a transmission.
const CE_PULSE_US: u32 = 15;
const STATUS_POLL_US: u32 = 100;
/// Upper bound on waiting for TX_DS or MAX_RT.
const TX_TIMEOUT_US: u32 = 95_000;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioError {
    #[error("SPI transfer failed: {0:?}")]
    Spi(ErrorKind),
    #[error("failed to drive CE")]
    ChipEnable,
    #[error("transceiver not responding")]
    NotPresent,
    #[error("no acknowledgement after all retries")]
    NoAck,
    #[error("transmission did not complete")]
    Timeout,
}

/// CONFIG value for the transmitter role: 16-bit CRC, PRIM_RX clear.
const fn tx_config(powered: bool) -> u8 {
    let base = config_bits::EN_CRC | config_bits::CRCO;
    if powered { base | config_bits::PWR_UP } else { base }
}

const fn rf_setup(data_rate: DataRate, power: PowerLevel) -> u8 {
    let rate = match data_rate {
        DataRate::Kbps250 => RF_DR_LOW,
        DataRate::Mbps1 => 0,
        DataRate::Mbps2 => RF_DR_HIGH,
    };
    let power = match power {
        PowerLevel::Min => 0b00,
        PowerLevel::Low => 0b01,
        PowerLevel::High => 0b10,
        PowerLevel::Max => 0b11,
    };
    rate | (power << 1)
}

const fn setup_retr(delay: u8, count: u8) -> u8 {
    ((delay & 0x0F) << 4) | (count & 0x0F)
}

pub struct Nrf24<SPI, CE, D> {
    spi: SPI,
    ce: CE,
    delay: D,
    payload_size: usize,
}

impl<SPI, CE, D> Nrf24<SPI, CE, D>
where
    SPI: SpiDevice,
    CE: OutputPin,
    D: DelayNs,
{
    pub fn new(spi: SPI, ce: CE, delay: D) -> Self {
        Self {
            spi,
            ce,
            delay,
            payload_size: 0,
        }
    }

    /// Program channel, pipe address, payload size, retries, data rate and
    /// PA level, then power down until the first frame.
    pub async fn configure(&mut self, settings: &RadioSettings) -> Result<(), RadioError> {
        self.ce.set_low().map_err(|_| RadioError::ChipEnable)?;
        self.write_register(register::CONFIG, tx_config(false)).await?;

        self.write_register(register::SETUP_AW, ADDRESS_WIDTH_5).await?;
        if self.read_register(register::SETUP_AW).await? != ADDRESS_WIDTH_5 {
            return Err(RadioError::NotPresent);
        }

        let address = settings.pipe_address_bytes();
        let retr = setup_retr(settings.retry_delay, settings.retry_count);
        self.write_register(register::SETUP_RETR, retr).await?;
        self.write_register(register::RF_CH, settings.channel).await?;
        self.write_register(
            register::RF_SETUP,
            rf_setup(settings.data_rate, settings.power_level),
        )
        .await?;
        // Pipe 0 receives the acknowledgements, so it shares the TX address.
        self.write_address(register::TX_ADDR, &address).await?;
        self.write_address(register::RX_ADDR_P0, &address).await?;
        self.write_register(register::RX_PW_P0, settings.payload_size).await?;
        self.write_register(register::EN_AA, 0x01).await?;
        self.write_register(register::EN_RXADDR, 0x01).await?;
        self.write_register(register::DYNPD, 0x00).await?;
        self.write_register(register::FEATURE, 0x00).await?;

        self.command(command::FLUSH_TX).await?;
        self.command(command::FLUSH_RX).await?;
        self.write_register(register::STATUS, status_bits::ALL_IRQ).await?;

        self.payload_size = (settings.payload_size as usize).min(MAX_PAYLOAD);
        info!(
            "nRF24L01+ configured: channel {}, pipe {:010x}",
            settings.channel, settings.pipe_address
        );
        Ok(())
    }

    /// Send one payload and wait for the acknowledgement or the retry limit.
    pub async fn send(&mut self, payload: &[u8]) -> Result<(), RadioError> {
        self.write_register(register::CONFIG, tx_config(true)).await?;
        self.delay.delay_us(POWER_UP_US).await;

        let outcome = self.fire(payload).await;
        let released = self.ce.set_low().map_err(|_| RadioError::ChipEnable);
        // Always leave the chip powered down with its IRQ flags clear.
        let settled = self.power_down(outcome.is_err() || released.is_err()).await;

        outcome.and(released).and(settled)
    }

    /// Load the payload, pulse CE and wait for the outcome.
    async fn fire(&mut self, payload: &[u8]) -> Result<(), RadioError> {
        let len = payload.len().min(self.payload_size);

        self.command(command::FLUSH_TX).await?;
        self.write_register(register::STATUS, status_bits::ALL_IRQ).await?;

        let mut buf = [0u8; MAX_PAYLOAD + 1];
        buf[0] = command::W_TX_PAYLOAD;
        buf[1..=len].copy_from_slice(&payload[..len]);
        self.spi
            .write(&buf[..=self.payload_size])
            .await
            .map_err(|e| RadioError::Spi(e.kind()))?;

        self.ce.set_high().map_err(|_| RadioError::ChipEnable)?;
        self.delay.delay_us(CE_PULSE_US).await;
        self.wait_for_completion().await
    }

    async fn power_down(&mut self, flush: bool) -> Result<(), RadioError> {
        let flushed = if flush {
            self.command(command::FLUSH_TX).await
        } else {
            Ok(())
        };
        self.write_register(register::STATUS, status_bits::ALL_IRQ).await?;
        self.write_register(register::CONFIG, tx_config(false)).await?;
        flushed
    }

    async fn wait_for_completion(&mut self) -> Result<(), RadioError> {
        let mut waited = 0;
        while waited < TX_TIMEOUT_US {
            let status = self.status().await?;
            if status & status_bits::TX_DS != 0 {
                return Ok(());
            }
            if status & status_bits::MAX_RT != 0 {
                let observe = self.read_register(register::OBSERVE_TX).await?;
                debug!("nRF24L01+ gave up after {} retries", observe & 0x0F);
                return Err(RadioError::NoAck);
            }
            self.delay.delay_us(STATUS_POLL_US).await;
            waited += STATUS_POLL_US;
        }
        Err(RadioError::Timeout)
    }

    async fn status(&mut self) -> Result<u8, RadioError> {
        let mut buf = [command::NOP];
        self.spi
            .transfer_in_place(&mut buf)
            .await
            .map_err(|e| RadioError::Spi(e.kind()))?;
        Ok(buf[0])
    }

    async fn command(&mut self, command: u8) -> Result<(), RadioError> {
        self.spi
            .write(&[command])
            .await
            .map_err(|e| RadioError::Spi(e.kind()))
    }

    async fn read_register(&mut self, register: u8) -> Result<u8, RadioError> {
        let mut buf = [command::R_REGISTER | register, 0];
        self.spi
            .transfer_in_place(&mut buf)
            .await
            .map_err(|e| RadioError::Spi(e.kind()))?;
        Ok(buf[1])
    }

    async fn write_register(&mut self, register: u8, value: u8) -> Result<(), RadioError> {
        self.spi
            .write(&[command::W_REGISTER | register, value])
            .await
            .map_err(|e| RadioError::Spi(e.kind()))
    }

    async fn write_address(&mut self, register: u8, address: &[u8; 5]) -> Result<(), RadioError> {
        let mut buf = [0u8; 6];
        buf[0] = command::W_REGISTER | register;
        buf[1..].copy_from_slice(address);
        self.spi
            .write(&buf)
            .await
            .map_err(|e| RadioError::Spi(e.kind()))
    }
}

impl<SPI, CE, D> Transmitter for Nrf24<SPI, CE, D>
where
    SPI: SpiDevice,
    CE: OutputPin,
    D: DelayNs,
{
    type Error = RadioError;

    async fn transmit(&mut self, frame: &Frame) -> Result<(), RadioError> {
        self.send(frame).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodeConfig;
    use crate::identity::NodeIdentity;
    use embassy_futures::block_on;
    use embedded_hal_async::spi::{ErrorType, Operation};

    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Link {
        Acked,
        Lost,
        Silent,
    }

    /// Register-level model of the transceiver.
    struct FakeNrf24 {
        registers: [u8; 0x1E],
        tx_addr: [u8; 5],
        rx_addr_p0: [u8; 5],
        payload: [u8; 32],
        payload_len: usize,
        link: Link,
        present: bool,
        flushes: usize,
    }

    impl FakeNrf24 {
        fn new(link: Link) -> Self {
            Self {
                registers: [0; 0x1E],
                tx_addr: [0; 5],
                rx_addr_p0: [0; 5],
                payload: [0; 32],
                payload_len: 0,
                link,
                present: true,
                flushes: 0,
            }
        }

        fn exchange(&mut self, bytes: &mut [u8]) {
            let status = self.registers[register::STATUS as usize];
            let cmd = bytes[0];
            match cmd {
                command::NOP => {}
                command::FLUSH_TX => self.flushes += 1,
                command::FLUSH_RX => {}
                command::W_TX_PAYLOAD => {
                    self.payload_len = bytes.len() - 1;
                    self.payload[..self.payload_len].copy_from_slice(&bytes[1..]);
                    self.registers[register::STATUS as usize] |= match self.link {
                        Link::Acked => status_bits::TX_DS,
                        Link::Lost => status_bits::MAX_RT,
                        Link::Silent => 0,
                    };
                }
                _ if cmd & 0xE0 == command::W_REGISTER => {
                    let reg = cmd & 0x1F;
                    match reg {
                        register::TX_ADDR => self.tx_addr.copy_from_slice(&bytes[1..6]),
                        register::RX_ADDR_P0 => self.rx_addr_p0.copy_from_slice(&bytes[1..6]),
                        // Write-one-to-clear interrupt flags.
                        register::STATUS => self.registers[reg as usize] &= !bytes[1],
                        _ if self.present => self.registers[reg as usize] = bytes[1],
                        _ => {}
                    }
                }
                _ => {
                    let reg = (cmd & 0x1F) as usize;
                    if bytes.len() > 1 {
                        bytes[1] = self.registers[reg];
                    }
                }
            }
            bytes[0] = status;
        }
    }

    impl ErrorType for FakeNrf24 {
        type Error = ErrorKind;
    }

    impl SpiDevice for FakeNrf24 {
        async fn transaction(
            &mut self,
            operations: &mut [Operation<'_, u8>],
        ) -> Result<(), Self::Error> {
            for op in operations {
                match op {
                    Operation::Write(bytes) => {
                        let mut copy = [0u8; 33];
                        copy[..bytes.len()].copy_from_slice(bytes);
                        self.exchange(&mut copy[..bytes.len()]);
                    }
                    Operation::TransferInPlace(bytes) => self.exchange(bytes),
                    _ => return Err(ErrorKind::Other),
                }
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct CePin {
        high: bool,
        pulses: usize,
        stuck_high: bool,
    }

    impl embedded_hal::digital::ErrorType for CePin {
        type Error = embedded_hal::digital::ErrorKind;
    }

    impl OutputPin for CePin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            if self.stuck_high && self.high {
                return Err(embedded_hal::digital::ErrorKind::Other);
            }
            self.high = false;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            if !self.high {
                self.pulses += 1;
            }
            self.high = true;
            Ok(())
        }
    }

    #[derive(Default)]
    struct ElapsedDelay {
        us: u64,
    }

    impl DelayNs for ElapsedDelay {
        async fn delay_ns(&mut self, ns: u32) {
            self.us += (ns / 1_000) as u64;
        }
    }

    fn settings() -> RadioSettings {
        let identity = NodeIdentity::new(2, 60, true).unwrap();
        RadioSettings::for_identity(&identity, &NodeConfig::default())
    }

    fn radio(link: Link) -> Nrf24<FakeNrf24, CePin, ElapsedDelay> {
        let mut radio = Nrf24::new(FakeNrf24::new(link), CePin::default(), ElapsedDelay::default());
        block_on(radio.configure(&settings())).unwrap();
        radio
    }

    #[test]
    fn test_configure_registers() {
        let radio = radio(Link::Acked);
        let chip = &radio.spi;

        assert_eq!(chip.registers[register::RF_CH as usize], 60);
        assert_eq!(chip.registers[register::SETUP_RETR as usize], 0x64);
        assert_eq!(chip.registers[register::RF_SETUP as usize], 0x26, "250 kbps, max PA");
        assert_eq!(chip.registers[register::RX_PW_P0 as usize], 17);
        assert_eq!(chip.registers[register::EN_AA as usize], 0x01);
        assert_eq!(chip.registers[register::CONFIG as usize], 0x0C, "powered down");
        assert_eq!(chip.tx_addr, [0x02, 0x38, 0xFD, 0xFC, 0xFC]);
        assert_eq!(chip.rx_addr_p0, chip.tx_addr);
    }

    #[test]
    fn test_configured_rate_and_power() {
        let identity = NodeIdentity::new(2, 60, true).unwrap();
        let config = NodeConfig {
            radio_data_rate: DataRate::Mbps2,
            radio_power_level: PowerLevel::Low,
            ..NodeConfig::default()
        };
        let mut radio = Nrf24::new(
            FakeNrf24::new(Link::Acked),
            CePin::default(),
            ElapsedDelay::default(),
        );
        block_on(radio.configure(&RadioSettings::for_identity(&identity, &config))).unwrap();

        assert_eq!(radio.spi.registers[register::RF_SETUP as usize], 0x0A, "2 Mbps, -12 dBm");
    }

    #[test]
    fn test_missing_chip_detected() {
        let mut fake = FakeNrf24::new(Link::Acked);
        fake.present = false;
        let mut radio = Nrf24::new(fake, CePin::default(), ElapsedDelay::default());
        assert_eq!(block_on(radio.configure(&settings())), Err(RadioError::NotPresent));
    }

    #[test]
    fn test_acked_transmission() {
        let mut radio = radio(Link::Acked);
        let frame: Frame = core::array::from_fn(|i| i as u8);

        assert_eq!(block_on(radio.transmit(&frame)), Ok(()));
        assert_eq!(radio.spi.payload_len, 17);
        assert_eq!(radio.spi.payload[..17], frame);
        assert_eq!(radio.ce.pulses, 1);
        assert!(!radio.ce.high);
        assert_eq!(radio.spi.registers[register::CONFIG as usize], 0x0C, "powered down again");
        assert_eq!(radio.spi.registers[register::STATUS as usize] & status_bits::ALL_IRQ, 0);
    }

    #[test]
    fn test_lost_transmission() {
        let mut radio = radio(Link::Lost);
        let flushes = radio.spi.flushes;

        assert_eq!(block_on(radio.transmit(&[0; 17])), Err(RadioError::NoAck));
        // One flush before loading, one to drop the unacknowledged payload.
        assert_eq!(radio.spi.flushes, flushes + 2);
        assert!(!radio.ce.high);
    }

    #[test]
    fn test_chip_enable_failure_still_powers_down() {
        let mut radio = radio(Link::Acked);
        let flushes = radio.spi.flushes;
        radio.ce.stuck_high = true;

        assert_eq!(block_on(radio.transmit(&[0; 17])), Err(RadioError::ChipEnable));
        assert_eq!(radio.spi.flushes, flushes + 2);
        assert_eq!(radio.spi.registers[register::CONFIG as usize], 0x0C, "powered down");
        assert_eq!(radio.spi.registers[register::STATUS as usize] & status_bits::ALL_IRQ, 0);
    }

    #[test]
    fn test_transmission_timeout() {
        let mut radio = radio(Link::Silent);
        assert_eq!(block_on(radio.transmit(&[0; 17])), Err(RadioError::Timeout));
        assert!(radio.delay.us >= TX_TIMEOUT_US as u64);
    }
}
