// The bus decodes byte accesses across the attached devices and composes the
// halfword and word accesses out of byte accesses, little-endian. The
// composition matters: scripted registers observe each byte fetch, so a
// counter-driven address advances exactly once per sized access that touches
// its byte. An access no device claims is fatal.

use crate::devices::{Device, PeripheralModel, ScriptedRegister};
use crate::fields::{OpResult, Size};
use crate::{EmResult, EmulationError};

// Inclusive address ranges claimed by one device.
pub type MemoryRange = Vec<(u32, u32)>;

pub struct Bus {
    devices: Vec<(MemoryRange, Box<dyn Device>)>,
    scripted: PeripheralModel,
}

impl Bus {
    pub fn new() -> Self {
        Bus { devices: Vec::new(), scripted: PeripheralModel::new() }
    }
    pub fn attach(&mut self, device: Box<dyn Device>) {
        let ranges = device.memconfig();
        self.devices.push((ranges, device));
    }
    pub fn script(&mut self, address: u32, register: Box<dyn ScriptedRegister>) {
        self.scripted.attach(address, register);
    }
    pub fn read_byte(&mut self, address: u32) -> EmResult<u8> {
        if let Some(value) = self.scripted.read(address) {
            return Ok(value);
        }
        for (ranges, device) in &mut self.devices {
            for (from, to) in ranges.iter() {
                if *from <= address && address <= *to {
                    return device.read(address);
                }
            }
        }
        Err(EmulationError::UnmappedAccess { address })
    }
    pub fn write_byte(&mut self, address: u32, value: u8) -> EmResult<()> {
        for (ranges, device) in &mut self.devices {
            for (from, to) in ranges.iter() {
                if *from <= address && address <= *to {
                    return device.write(address, value);
                }
            }
        }
        Err(EmulationError::UnmappedAccess { address })
    }
    pub fn read(&mut self, address: u32, size: Size) -> EmResult<OpResult> {
        let mut bytes = [0u8; 4];
        for j in 0..size as usize {
            bytes[j] = self.read_byte(address.wrapping_add(j as u32))?;
        }
        Ok(size.from_le_bytes(&bytes))
    }
    pub fn write(&mut self, address: u32, value: OpResult) -> EmResult<()> {
        for (j, byte) in value.to_le_bytes().iter().enumerate() {
            self.write_byte(address.wrapping_add(j as u32), *byte)?;
        }
        Ok(())
    }
}
