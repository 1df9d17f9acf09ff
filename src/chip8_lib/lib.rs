//! CHIP-8 interpreter core and the glue needed to embed it.
//!
//! [`cpu::Cpu`] owns the whole machine and executes exactly one instruction per
//! [`cpu::Cpu::step`]. Pacing is left to the caller; [`chip8::Chip8`] is one such
//! caller, stepping at a configured rate and talking to a frontend over channels.
pub mod chip8;
pub mod config;
pub mod cpu;
pub mod display;
pub mod input;
pub mod opcode;

pub use crate::chip8::Chip8;
pub use crate::config::{Cfg, ConfigError};
pub use crate::cpu::{Cpu, CpuError};
