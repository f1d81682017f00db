// Machine description for the Teensy 3.2, a Freescale MK20DX256VLH7
// (Cortex-M4, 72 MHz) on a small carrier board.
//
// Memory map, as decoded here:
//
//   $00000000-$07FFFFFF   Program flash window (256 KiB populated)
//   $14000000-$140007FF   FlexRAM / EEPROM (2 KiB)
//   $1FFF8000-$1FFFFFFF   SRAM_L (lower 32 KiB bank)
//   $20000000-$20007FFF   SRAM_U (upper 32 KiB bank, contiguous with SRAM_L)
//   $40000000-$4007FFFF   Peripheral bridge 0 (AIPS0)
//   $40080000-$400FEFFF   Peripheral bridge 1 (AIPS1)
//   $400FF000-$400FFFFF   GPIO
//   $42000000-$43FFFFFF   Bit-band alias of the peripheral space
//   $E0000000-$E00FFFFF   Private Peripheral Bus (SysTick, NVIC, SCB, ...)
//
// A few registers answer with scripted values so that the firmware's
// start-up polling loops terminate:
//
//   FTFL_FSTAT   flash command complete, always
//   MCG_S        clock generator status walking to "PLL selected and locked"
//   $1FFF8AE8    low byte of systick_millis_count, advancing on read

use crate::devices::{
    BitBandAlias, Flash, FtflStatus, McgStatus, PeripheralBridge, PrivatePeripheralBus, Ram,
    SystickMillis,
};
use crate::memory::Bus;
use crate::trace::Trace;
use crate::Configuration;

const SRAM_BASE: u32 = 0x1FFF_8000;
const SRAM_SIZE: usize = 0x1_0000;
const EEPROM_BASE: u32 = 0x1400_0000;
const EEPROM_SIZE: usize = 0x800;

const FTFL_FSTAT: u32 = 0x4002_0000;
const MCG_S: u32 = 0x4006_4006;
const SYSTICK_MILLIS_COUNT: u32 = 0x1FFF_8AE8;

pub const STEP_LIMIT: usize = 10_000;

pub fn teensy_3_2(image: Vec<u8>) -> Configuration {
    let mut bus = Bus::new();
    bus.attach(Flash::new(&image));
    bus.attach(Ram::new(SRAM_BASE, SRAM_SIZE));
    bus.attach(Ram::new(EEPROM_BASE, EEPROM_SIZE));
    bus.attach(PeripheralBridge::new());
    bus.attach(BitBandAlias::new());
    bus.attach(PrivatePeripheralBus::new());

    bus.script(FTFL_FSTAT, Box::new(FtflStatus));
    bus.script(MCG_S, Box::new(McgStatus::new()));
    bus.script(SYSTICK_MILLIS_COUNT, Box::new(SystickMillis::new()));

    Configuration { bus, step_limit: STEP_LIMIT, trace: Trace::stdout() }
}
