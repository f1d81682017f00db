use log::debug;
use thiserror::Error;

pub mod conversions;
pub mod devices;
pub mod fields;
pub mod ihex;
mod instructions;
pub mod memory;
pub mod names;
mod parser;
pub mod processor;
pub mod teensy;
pub mod trace;

use memory::Bus;
use processor::CPU;
use trace::Trace;

#[derive(Debug, Error)]
pub enum EmulationError {
    #[error(transparent)]
    Hex(#[from] ihex::HexError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("unknown opcode at {pc:08X}: {}", raw_halfwords(.hw1, .hw2))]
    UnknownOpcode { pc: u32, hw1: u16, hw2: Option<u16> },
    #[error("UNPREDICTABLE encoding at {pc:08X}: {}", raw_halfwords(.hw1, .hw2))]
    Unpredictable { pc: u32, hw1: u16, hw2: Option<u16> },
    #[error("unmapped memory access at {address:08X}")]
    UnmappedAccess { address: u32 },
    #[error("write to flash at {address:08X}")]
    WriteToFlash { address: u32 },
    #[error("illegal state: {0}")]
    IllegalState(String),
}

pub type EmResult<T> = Result<T, EmulationError>;

fn raw_halfwords(hw1: &u16, hw2: &Option<u16>) -> String {
    match hw2 {
        Some(hw2) => format!("{:04X} {:04X}", hw1, hw2),
        None => format!("{:04X}", hw1),
    }
}

pub struct Configuration {
    pub bus: Bus,
    pub step_limit: usize,
    pub trace: Trace,
}

pub struct Emulator {
    pub cpu: CPU,
    step_limit: usize,
}

impl Emulator {
    pub fn new(config: Configuration) -> Emulator {
        Emulator { cpu: CPU::new(config.bus, config.trace), step_limit: config.step_limit }
    }
    // Boot from the vector table, then run the bounded step loop. The first
    // fatal condition aborts the run; an exhausted budget is a normal exit.
    pub fn run(&mut self) -> EmResult<()> {
        self.cpu.reset()?;
        for _ in 0..self.step_limit {
            self.cpu.step()?;
        }
        debug!("step budget of {} exhausted", self.step_limit);
        Ok(())
    }
}
