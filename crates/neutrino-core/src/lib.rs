//! Hardware-independent core library for the neutrino sensor node
//!
//! This crate contains everything about a node that does not touch a
//! register: boot-time identity derivation, key provisioning, the 17-byte
//! wire format, message signing and encryption, sensor fallback policy, the
//! proximity debouncer, the transmit cycle itself, and the drivers for the
//! parts of the board that sit behind a bus (nRF24L01+ radio, status LEDs,
//! shared I2C).
//!
//! Hardware is reached only through traits (`embedded-hal`,
//! `embedded-storage`, and the collaborator traits in [`node`]), so the crate
//! is `#![no_std]` and compiles for the ESP32-S3 firmware as well as for
//! desktop hosts (the simulator and tests).

#![no_std]

pub mod battery;
pub mod config;
pub mod crypto;
pub mod debounce;
pub mod i2c_bus;
pub mod identity;
pub mod indicator;
pub mod keys;
pub mod message;
pub mod node;
pub mod nrf24;
pub mod sensors;

pub use config::NodeConfig;
pub use debounce::EdgeDebouncer;
pub use identity::{Mode, NodeIdentity, PinStates};
pub use keys::{KeyStore, SymmetricKeyPair};
pub use message::{Frame, Message, MessageType, NodeContext};
pub use node::{CycleReport, RadioSettings, SensorNode};
