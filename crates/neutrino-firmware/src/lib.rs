//! ESP32-S3 firmware-specific modules for the neutrino sensor node
//!
//! This crate contains hardware-specific code that cannot compile on desktop
//! targets: peripheral bring-up, the ADC battery monitor and noise source,
//! key storage in flash, jumper sampling and the proximity edge task.

#![no_std]

pub mod analog;
pub mod config_pins;
pub mod hardware;
pub mod key_flash;
pub mod proximity;
