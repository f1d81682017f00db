use emk20::devices::Ram;
use emk20::fields::{add_with_carry, shift_c, thumb_expand_imm_c, OpResult, SRType, Size};
use emk20::memory::Bus;
use emk20::trace::Trace;
use emk20::{ihex, teensy, EmResult, Emulator, EmulationError};
use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

// Code is placed where the reset vector of the reference firmware points.
const CODE_BASE: usize = 0x1BC;
const INITIAL_SP: u32 = 0x2000_8000;

#[derive(Clone)]
struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// A minimal flash image: vector table with SP/PC, code at the reset target.
fn assemble(halfwords: &[u16]) -> Vec<u8> {
    let mut image = vec![0u8; 0x400];
    image[0..4].copy_from_slice(&INITIAL_SP.to_le_bytes());
    image[4..8].copy_from_slice(&((CODE_BASE as u32) | 1).to_le_bytes());
    let mut offset = CODE_BASE;
    for hw in halfwords {
        image[offset..offset + 2].copy_from_slice(&hw.to_le_bytes());
        offset += 2;
    }
    image
}

fn run_image(halfwords: &[u16], steps: usize) -> (Emulator, String, EmResult<()>) {
    let buffer = Rc::new(RefCell::new(Vec::new()));
    let mut config = teensy::teensy_3_2(assemble(halfwords));
    config.step_limit = steps;
    config.trace = Trace::new(Box::new(SharedBuffer(Rc::clone(&buffer))));
    let mut emulator = Emulator::new(config);
    let result = emulator.run();
    let trace = String::from_utf8(buffer.borrow().clone()).unwrap();
    (emulator, trace, result)
}

fn movw(rd: u16, imm16: u16) -> [u16; 2] {
    wide_mov(0xF240, rd, imm16)
}

fn movt(rd: u16, imm16: u16) -> [u16; 2] {
    wide_mov(0xF2C0, rd, imm16)
}

fn wide_mov(base: u16, rd: u16, imm16: u16) -> [u16; 2] {
    let i = (imm16 >> 11) & 1;
    let imm4 = imm16 >> 12;
    let imm3 = (imm16 >> 8) & 7;
    let imm8 = imm16 & 0xFF;
    [base | (i << 10) | imm4, (imm3 << 12) | (rd << 8) | imm8]
}

#[test]
fn add_with_carry_inverse() {
    for &x in &[0u32, 1, 0x7FFF_FFFF, 0x8000_0000, 0xDEAD_BEEF, 0xFFFF_FFFF] {
        let (result, carry, _) = add_with_carry(x, !x, true);
        assert_eq!(result, 0);
        assert!(carry);
    }
}

#[test]
fn add_with_carry_boundaries() {
    assert_eq!(add_with_carry(0xFFFF_FFFF, 1, false), (0, true, false));
    assert_eq!(add_with_carry(0x7FFF_FFFF, 1, false), (0x8000_0000, false, true));
    assert_eq!(add_with_carry(2, !1, true), (1, true, false));
}

#[test]
fn shift_carries() {
    assert_eq!(shift_c(0xDEAD_BEEF, SRType::LSR, 32, false).unwrap(), (0, true));
    assert_eq!(shift_c(0x7EAD_BEEF, SRType::LSR, 32, true).unwrap(), (0, false));
    assert_eq!(shift_c(0x8000_0000, SRType::ASR, 1, false).unwrap(), (0xC000_0000, false));
    assert_eq!(shift_c(0x0000_0001, SRType::ROR, 1, false).unwrap(), (0x8000_0000, true));
    assert_eq!(shift_c(0x8000_0001, SRType::LSL, 1, false).unwrap(), (2, true));
    // Zero amount is the identity and keeps the carry.
    assert_eq!(shift_c(0x1234_5678, SRType::LSR, 0, true).unwrap(), (0x1234_5678, true));
    assert_eq!(shift_c(3, SRType::RRX, 1, false).unwrap(), (1, true));
}

#[test]
fn thumb_immediate_expansion() {
    assert_eq!(thumb_expand_imm_c(0x0AB, false).unwrap(), (0xAB, false));
    assert_eq!(thumb_expand_imm_c(0x0AB, true).unwrap(), (0xAB, true));
    assert_eq!(thumb_expand_imm_c(0x1AB, false).unwrap(), (0x00AB_00AB, false));
    assert_eq!(thumb_expand_imm_c(0x2AB, false).unwrap(), (0xAB00_AB00, false));
    assert_eq!(thumb_expand_imm_c(0x3AB, false).unwrap(), (0xABAB_ABAB, false));
    assert_eq!(thumb_expand_imm_c(0x4FF, false).unwrap(), (0x7F80_0000, false));
    // Replicated zero byte: the decoder turns this into an UNPREDICTABLE
    // encoding fault.
    assert!(thumb_expand_imm_c(0x100, false).is_none());
    assert!(thumb_expand_imm_c(0x200, false).is_none());
    assert!(thumb_expand_imm_c(0x300, false).is_none());
}

#[test]
fn replicated_zero_immediate_is_unpredictable() {
    let code = [0xF04F, 0x1000]; // MOV.W R0, #<imm12=0x100>
    let (_, _, result) = run_image(&code, 1);
    match result {
        Err(EmulationError::Unpredictable { pc: 0x1BC, hw1: 0xF04F, hw2: Some(0x1000) }) => {}
        other => panic!("expected UNPREDICTABLE encoding, got {:?}", other.err()),
    }
}

#[test]
fn sram_readback_identity() {
    let mut bus = Bus::new();
    bus.attach(Ram::new(0x1FFF_8000, 0x1_0000));
    bus.write(0x2000_0100, OpResult::Word(0xCAFE_F00D)).unwrap();
    assert_eq!(bus.read(0x2000_0100, Size::Word).unwrap().inner(), 0xCAFE_F00D);
    bus.write(0x1FFF_8000, OpResult::Byte(0x5A)).unwrap();
    assert_eq!(bus.read(0x1FFF_8000, Size::Byte).unwrap().inner(), 0x5A);
}

#[test]
fn reset_sequence() {
    let (emulator, trace, result) = run_image(&[], 0);
    result.unwrap();
    assert_eq!(emulator.cpu.r[13], 0x2000_8000);
    assert_eq!(emulator.cpu.r[15], 0x0000_01BC);
    assert_eq!(emulator.cpu.epsr, 0x0100_0000);
    assert!(trace.contains("Initial Stack Pointer:   20008000"));
    assert!(trace.contains("Initial Program Counter: 000001BD"));
}

#[test]
fn ldr_literal() {
    // LDR R0, [PC, #4] fetches the word planted at the aligned PC offset.
    let code = [0x4801, 0xBF00, 0x0000, 0x0000, 0xBEEF, 0xDEAD];
    let (emulator, trace, result) = run_image(&code, 1);
    result.unwrap();
    assert_eq!(emulator.cpu.r[0], 0xDEAD_BEEF);
    assert!(trace.contains("READ MemU[000001C4,4] = DEADBEEF"));
}

#[test]
fn watchdog_unlock_sequence() {
    let [m1a, m1b] = movw(0, 0x200E);
    let [m2a, m2b] = movt(0, 0x4005);
    let [m3a, m3b] = movw(1, 0xC520);
    let [m4a, m4b] = movw(2, 0xD928);
    let code = [
        m1a, m1b, // MOVW R0, #0x200E
        m2a, m2b, // MOVT R0, #0x4005
        m3a, m3b, // MOVW R1, #0xC520
        m4a, m4b, // MOVW R2, #0xD928
        0x8001, // STRH R1, [R0]
        0x8002, // STRH R2, [R0]
    ];
    let (emulator, trace, result) = run_image(&code, 6);
    result.unwrap();
    assert_eq!(emulator.cpu.r[0], 0x4005_200E);
    let first = trace
        .find("> WRITE (WDOG_UNLOCK) MemU[4005200E,2] = C520")
        .expect("first unlock write missing");
    let second = trace
        .find("> WRITE (WDOG_UNLOCK) MemU[4005200E,2] = D928")
        .expect("second unlock write missing");
    assert!(first < second);
}

#[test]
fn it_block_skips_failed_condition() {
    let code = [
        0x2000, // MOVS R0, #0       (Z := 1)
        0xBF18, // IT NE
        0x2001, // MOV R0, #1        (NE fails, must not write)
        0xBF00, // NOP
    ];
    let (emulator, trace, result) = run_image(&code, 3);
    result.unwrap();
    assert_eq!(emulator.cpu.r[0], 0);
    assert_eq!(emulator.cpu.itstate, 0);
    assert!(trace.contains("MOVNE R0, #0x1"));
}

#[test]
fn it_block_executes_passed_conditions() {
    let code = [
        0x2000, // MOVS R0, #0       (Z := 1)
        0xBF04, // ITT EQ
        0x2001, // MOVEQ R0, #1
        0x2102, // MOVEQ R1, #2
        0xBF00, // NOP
    ];
    let (emulator, _, result) = run_image(&code, 4);
    result.unwrap();
    assert_eq!(emulator.cpu.r[0], 1);
    assert_eq!(emulator.cpu.r[1], 2);
    assert_eq!(emulator.cpu.itstate, 0);
}

#[test]
fn push_pop_symmetry() {
    let [m1a, m1b] = movw(0, (CODE_BASE as u16) + 0x12 + 1); // landing pad, Thumb bit set
    let code = [
        m1a, m1b, // MOVW R0, #ret
        0x4686, // MOV LR, R0
        0x2411, // MOVS R4, #17
        0x2522, // MOVS R5, #34
        0xB530, // PUSH {R4, R5, LR}
        0x2400, // MOVS R4, #0
        0x2500, // MOVS R5, #0
        0xBD30, // POP {R4, R5, PC}
        0xBF00, // NOP (landing pad)
    ];
    let (emulator, trace, result) = run_image(&code, 8);
    result.unwrap();
    assert_eq!(emulator.cpu.r[4], 17);
    assert_eq!(emulator.cpu.r[5], 34);
    // The popped PC has its Thumb bit cleared.
    assert_eq!(emulator.cpu.r[15], (CODE_BASE as u32) + 0x12);
    assert_eq!(emulator.cpu.r[13], INITIAL_SP);
    // Three registers pushed: SP dropped by 12.
    assert!(trace.contains("> R13 = 20007FF4"));
}

#[test]
fn pop_to_pc_without_thumb_bit_is_fatal() {
    let [m1a, m1b] = movw(0, (CODE_BASE as u16) + 0x12); // bit 0 clear
    let code = [
        m1a, m1b, 0x4686, 0x2411, 0x2522, 0xB530, 0x2400, 0x2500, 0xBD30, 0xBF00,
    ];
    let (_, _, result) = run_image(&code, 8);
    match result {
        Err(EmulationError::IllegalState(_)) => {}
        other => panic!("expected interworking fault, got {:?}", other.err()),
    }
}

#[test]
fn mcg_polling_terminates_on_sixth_read() {
    let [m1a, m1b] = movw(0, 0x4006);
    let [m2a, m2b] = movt(0, 0x4006);
    let code = [
        m1a, m1b, // MOVW R0, #0x4006
        m2a, m2b, // MOVT R0, #0x4006  (R0 = 0x40064006, MCG_S)
        0x7801, // LDRB R1, [R0]
        0x290C, // CMP R1, #0x0C
        0xD1FC, // BNE back to the LDRB
        0xBF00, // NOP
    ];
    let (emulator, trace, result) = run_image(&code, 20);
    result.unwrap();
    assert_eq!(emulator.cpu.r[1], 0x0C);
    assert_eq!(emulator.cpu.r[15], (CODE_BASE as u32) + 0x0E);
    assert_eq!(trace.matches("(MCG_S)").count(), 6);
}

#[test]
fn systick_millis_advances() {
    let [m1a, m1b] = movw(0, 0x8AE8);
    let [m2a, m2b] = movt(0, 0x1FFF);
    let code = [
        m1a, m1b, // MOVW R0, #0x8AE8
        m2a, m2b, // MOVT R0, #0x1FFF  (R0 = systick_millis_count)
        0x6801, // LDR R1, [R0]
        0x6802, // LDR R2, [R0]
        0x6803, // LDR R3, [R0]
    ];
    let (emulator, _, result) = run_image(&code, 5);
    result.unwrap();
    assert_eq!(emulator.cpu.r[1], 0);
    assert_eq!(emulator.cpu.r[2], 4);
    assert_eq!(emulator.cpu.r[3], 4);
}

#[test]
fn divide_and_multiply_accumulate() {
    let code = [
        0x2064, // MOVS R0, #100
        0x2107, // MOVS R1, #7
        0xFBB0, 0xF2F1, // UDIV R2, R0, R1
        0xFB01, 0x0302, // MLA R3, R1, R2, R0
        0xFB01, 0x0412, // MLS R4, R1, R2, R0
    ];
    let (emulator, _, result) = run_image(&code, 5);
    result.unwrap();
    assert_eq!(emulator.cpu.r[2], 14);
    assert_eq!(emulator.cpu.r[3], 198);
    assert_eq!(emulator.cpu.r[4], 2);
}

#[test]
fn divide_by_zero_is_fatal() {
    let code = [
        0x2064, // MOVS R0, #100
        0x2100, // MOVS R1, #0
        0xFBB0, 0xF2F1, // UDIV R2, R0, R1
    ];
    let (_, _, result) = run_image(&code, 3);
    match result {
        Err(EmulationError::IllegalState(message)) => assert!(message.contains("UDIV")),
        other => panic!("expected divide fault, got {:?}", other.err()),
    }
}

#[test]
fn write_to_flash_is_fatal() {
    let code = [
        0x2000, // MOVS R0, #0
        0x6001, // STR R1, [R0]
    ];
    let (_, _, result) = run_image(&code, 2);
    match result {
        Err(EmulationError::WriteToFlash { address: 0 }) => {}
        other => panic!("expected flash write fault, got {:?}", other.err()),
    }
}

#[test]
fn unmapped_access_is_fatal() {
    let [m1a, m1b] = movw(0, 0x0000);
    let [m2a, m2b] = movt(0, 0x1000);
    let code = [m1a, m1b, m2a, m2b, 0x6801]; // LDR R1, [R0] @ 0x10000000
    let (_, _, result) = run_image(&code, 3);
    match result {
        Err(EmulationError::UnmappedAccess { address: 0x1000_0000 }) => {}
        other => panic!("expected unmapped fault, got {:?}", other.err()),
    }
}

#[test]
fn undefined_encoding_is_fatal() {
    let code = [0xDE00]; // permanently UNDEFINED
    let (_, _, result) = run_image(&code, 1);
    match result {
        Err(EmulationError::UnknownOpcode { pc: 0x1BC, hw1: 0xDE00, hw2: None }) => {}
        other => panic!("expected unknown opcode, got {:?}", other.err()),
    }
}

#[test]
fn ubfx_extracts_field() {
    let [m1a, m1b] = movw(0, 0x3456);
    let [m2a, m2b] = movt(0, 0x0012);
    let code = [
        m1a, m1b, // R0 = 0x00123456
        m2a, m2b,
        0xF3C0, 0x1103, // UBFX R1, R0, #4, #4
    ];
    let (emulator, _, result) = run_image(&code, 3);
    result.unwrap();
    assert_eq!(emulator.cpu.r[1], 5);
}

#[test]
fn ubfx_field_past_bit31_is_unpredictable() {
    let code = [0xF3C0, 0x7107]; // UBFX R1, R0, #28, #8
    let (_, _, result) = run_image(&code, 1);
    match result {
        Err(EmulationError::Unpredictable { pc: 0x1BC, hw1: 0xF3C0, hw2: Some(0x7107) }) => {}
        other => panic!("expected UNPREDICTABLE encoding, got {:?}", other.err()),
    }
}

#[test]
fn conditional_branch_flags() {
    let code = [
        0x2003, // MOVS R0, #3
        0x2803, // CMP R0, #3
        0xD000, // BEQ over the next instruction
        0x2063, // MOVS R0, #99 (skipped)
        0x2001, // MOVS R0, #1
    ];
    let (emulator, _, result) = run_image(&code, 4);
    result.unwrap();
    assert_eq!(emulator.cpu.r[0], 1);
}

#[test]
fn i8hex_roundtrip() {
    let line = ":1000000000800020BD01000081130000811300001C";
    let image = ihex::parse(line).unwrap();
    assert_eq!(image.len(), 16);
    assert_eq!(&image[..4], &[0x00, 0x80, 0x00, 0x20]);
    let mut out = Vec::new();
    ihex::write_i8hex(&image, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert_eq!(text.lines().next().unwrap(), line);
}

#[test]
fn i8hex_rejects_bad_checksum() {
    let line = ":1000000000800020BD01000081130000811300001D";
    match ihex::parse(line) {
        Err(ihex::HexError::BadChecksum { line: 1, expected: 0x1C, found: 0x1D }) => {}
        other => panic!("expected checksum error, got {:?}", other.err()),
    }
}

#[test]
fn i8hex_rejects_gaps() {
    let line = concat!(":10001000", "00800020", "000000000000000000000000", "40");
    match ihex::parse(line) {
        Err(ihex::HexError::NonContiguous { line: 1, expected: 0, found: 0x10 }) => {}
        other => panic!("expected contiguity error, got {:?}", other.err()),
    }
}

#[test]
fn i8hex_rejects_lowercase_and_garbage() {
    assert!(ihex::parse(":10000000008000q0bd01000081130000811300001C").is_err());
    assert!(ihex::parse("10000000").is_err());
}
