// Everything that sits behind the bus: the flash and RAM arrays, the
// write-discarding peripheral windows, and the handful of scripted registers
// whose read values keep the firmware's polling loops moving.

use crate::memory::MemoryRange;
use crate::{EmResult, EmulationError};

pub trait Device {
    fn memconfig(&self) -> MemoryRange;
    fn read(&mut self, address: u32) -> EmResult<u8>;
    fn write(&mut self, address: u32, value: u8) -> EmResult<()>;
}

// Program flash. The MK20DX256 decodes a much larger window than it backs;
// reads inside the backed 256 KiB return the loaded image (zero past the
// image end), reads past the backing fault, and every write faults.
pub struct Flash {
    mem: Vec<u8>,
}

pub const FLASH_SIZE: usize = 0x40000;

impl Flash {
    pub fn new(image: &[u8]) -> Box<Self> {
        let mut mem = vec![0; FLASH_SIZE];
        mem[..image.len()].copy_from_slice(image);
        Box::new(Self { mem })
    }
}

impl Device for Flash {
    fn memconfig(&self) -> MemoryRange {
        vec![(0x0000_0000, 0x07FF_FFFF)]
    }
    fn read(&mut self, address: u32) -> EmResult<u8> {
        match self.mem.get(address as usize) {
            Some(&b) => Ok(b),
            None => Err(EmulationError::UnmappedAccess { address }),
        }
    }
    fn write(&mut self, address: u32, _value: u8) -> EmResult<()> {
        Err(EmulationError::WriteToFlash { address })
    }
}

pub struct Ram {
    base: u32,
    mem: Vec<u8>,
}

impl Ram {
    pub fn new(base: u32, size: usize) -> Box<Self> {
        Box::new(Self { base, mem: vec![0; size] })
    }
}

impl Device for Ram {
    fn memconfig(&self) -> MemoryRange {
        vec![(self.base, self.base + self.mem.len() as u32 - 1)]
    }
    fn read(&mut self, address: u32) -> EmResult<u8> {
        Ok(self.mem[(address - self.base) as usize])
    }
    fn write(&mut self, address: u32, value: u8) -> EmResult<()> {
        self.mem[(address - self.base) as usize] = value;
        Ok(())
    }
}

// Peripheral bridges 0/1 plus GPIO. Writes are acknowledged and dropped;
// reads come back zero unless a scripted register intercepts them first.
pub struct PeripheralBridge;

impl PeripheralBridge {
    pub fn new() -> Box<Self> {
        Box::new(Self)
    }
}

impl Device for PeripheralBridge {
    fn memconfig(&self) -> MemoryRange {
        vec![(0x4000_0000, 0x400F_FFFF)]
    }
    fn read(&mut self, _address: u32) -> EmResult<u8> {
        Ok(0)
    }
    fn write(&mut self, _address: u32, _value: u8) -> EmResult<()> {
        Ok(())
    }
}

pub struct BitBandAlias;

impl BitBandAlias {
    pub fn new() -> Box<Self> {
        Box::new(Self)
    }
}

impl Device for BitBandAlias {
    fn memconfig(&self) -> MemoryRange {
        vec![(0x4200_0000, 0x43FF_FFFF)]
    }
    fn read(&mut self, _address: u32) -> EmResult<u8> {
        Ok(0)
    }
    fn write(&mut self, _address: u32, _value: u8) -> EmResult<()> {
        Ok(())
    }
}

pub struct PrivatePeripheralBus;

impl PrivatePeripheralBus {
    pub fn new() -> Box<Self> {
        Box::new(Self)
    }
}

impl Device for PrivatePeripheralBus {
    fn memconfig(&self) -> MemoryRange {
        vec![(0xE000_0000, 0xE00F_FFFF)]
    }
    fn read(&mut self, _address: u32) -> EmResult<u8> {
        Ok(0)
    }
    fn write(&mut self, _address: u32, _value: u8) -> EmResult<()> {
        Ok(())
    }
}

// A scripted register is a tiny stateful object that produces the next byte
// of its canned sequence on every read. Counters never reset within a run.
pub trait ScriptedRegister {
    fn read(&mut self) -> u8;
}

// FTFL_FSTAT: flash controller always reports "command complete".
pub struct FtflStatus;

impl ScriptedRegister for FtflStatus {
    fn read(&mut self) -> u8 {
        0x80
    }
}

// MCG_S: walks the clock-generator status sequence the startup code polls
// for (oscillator init, reference switch, PLL select/lock), then stays at
// the final 0x0C "PLL selected and locked" value.
pub struct McgStatus {
    reads: usize,
}

impl McgStatus {
    pub fn new() -> Self {
        McgStatus { reads: 0 }
    }
}

impl ScriptedRegister for McgStatus {
    fn read(&mut self) -> u8 {
        const SEQUENCE: [u8; 6] = [0x02, 0x00, 0x08, 0x20, 0x40, 0x0C];
        let value = if self.reads < SEQUENCE.len() {
            SEQUENCE[self.reads]
        } else {
            0x0C
        };
        self.reads += 1;
        value
    }
}

// The low byte of systick_millis_count in SRAM: 0 on the first read, then a
// few reads worth of 4 so delay loops see time passing, then monotonically
// counting up.
pub struct SystickMillis {
    reads: usize,
}

impl SystickMillis {
    pub fn new() -> Self {
        SystickMillis { reads: 0 }
    }
}

impl ScriptedRegister for SystickMillis {
    fn read(&mut self) -> u8 {
        let value = match self.reads {
            0 => 0,
            1..=4 => 4,
            n => n as u8,
        };
        self.reads += 1;
        value
    }
}

// The scripted-read capability the bus consults before dispatching a byte
// read to the owning region. Exact byte-address match only: a word read of a
// scripted location bumps the counter once, when its low byte is fetched.
pub struct PeripheralModel {
    regs: Vec<(u32, Box<dyn ScriptedRegister>)>,
}

impl PeripheralModel {
    pub fn new() -> Self {
        PeripheralModel { regs: Vec::new() }
    }
    pub fn attach(&mut self, address: u32, register: Box<dyn ScriptedRegister>) {
        self.regs.push((address, register));
    }
    pub fn read(&mut self, address: u32) -> Option<u8> {
        for (scripted, register) in &mut self.regs {
            if *scripted == address {
                return Some(register.read());
            }
        }
        None
    }
}
