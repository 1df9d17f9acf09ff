use crate::cpu::{Cpu, CpuError};
use crate::config::{Cfg, ConfigError};
use crate::display::PIXEL_COUNT;
use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use std::thread;
use std::time::Instant;
use log::{debug, info, warn};

/// Drives a [`Cpu`] at the configured rate on behalf of a frontend.
///
/// The frontend talks to it over channels: key state comes in as a bitmask,
/// frames go out whenever the interpreter asks for a redraw.
#[derive(Default)]
pub struct Chip8 {
    cpu: Cpu,
    config: Cfg,
    // Receiver which updates input controller from main thread
    input_receiver: Option<Receiver<u16>>,
    // Receiver which receives message to quit from main thread
    quit_receiver: Option<Receiver<bool>>,
    // Transmitter which sends frame buffer state
    display_transmitter: Option<Sender<[u8; PIXEL_COUNT]>>,
}

impl Chip8 {
    pub fn new() -> Self {
        Self {
            cpu: Cpu::new(),
            config: Cfg::default(),
            input_receiver: None,
            quit_receiver: None,
            display_transmitter: None,
        }
    }

    pub fn with_config(config: Cfg) -> Self {
        Self {
            config,
            ..Self::new()
        }
    }

    pub fn load_config(&mut self, filename: &str) -> Result<&mut Self, ConfigError> {
        self.config.load_config(filename)?;
        Ok(self)
    }

    pub fn load_rom(&mut self, rom: &[u8]) -> Result<&mut Self, CpuError> {
        self.cpu.load_program(rom)?;
        Ok(self)
    }

    pub fn connect(
        &mut self,
        input_rx: Receiver<u16>,
        quit_rx: Receiver<bool>,
        display_tx: Sender<[u8; PIXEL_COUNT]>,
    ) -> &mut Self {
        self.input_receiver = Some(input_rx);
        self.quit_receiver = Some(quit_rx);
        self.display_transmitter = Some(display_tx);
        self
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    pub fn config(&self) -> &Cfg {
        &self.config
    }

    /// Run `count` cycles back to back, without pacing or channel traffic.
    pub fn run_cycles(&mut self, count: usize) -> Result<(), CpuError> {
        for _ in 0..count {
            self.cpu.step()?;
        }
        Ok(())
    }

    /// Step the interpreter at `cycles_per_second` until the frontend quits or hangs up.
    pub fn main_loop(&mut self) -> Result<(), CpuError> {
        if self.input_receiver.is_none() || self.display_transmitter.is_none() {
            warn!("Interpreter has not been connected with main thread; running headless.");
        }
        let cycle_time = self.config.cycle_time();
        info!(
            "Starting main loop at {} cycles per second",
            self.config.cycles_per_second()
        );

        'main: loop {
            let start = Instant::now();

            // Only the latest keyboard state matters
            if let Some(rx) = &self.input_receiver {
                if let Some(val) = rx.try_iter().last() {
                    self.cpu.keys_mut().update_keys(val)
                }
            }

            // Check for quit message from main thread
            if let Some(rx) = &self.quit_receiver {
                match rx.try_recv() {
                    Ok(_) | Err(TryRecvError::Disconnected) => break 'main,
                    Err(TryRecvError::Empty) => {}
                }
            }

            self.cpu.step()?;

            if self.cpu.take_redraw() {
                if let Some(tx) = &self.display_transmitter {
                    if tx.send(*self.cpu.frame_buffer()).is_err() {
                        debug!("Display receiver hung up");
                        break 'main;
                    }
                }
            }

            let elapsed = start.elapsed();
            if elapsed < cycle_time {
                thread::sleep(cycle_time - elapsed);
            }
        }
        info!("Main loop stopped");
        Ok(())
    }
}
