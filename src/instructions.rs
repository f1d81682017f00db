// One variant per mnemonic; the parser flattens every encoding of a
// mnemonic into the same variant, so execution is written once against the
// architected behaviour instead of once per encoding. All of the arithmetic
// bottoms out in add_with_carry and shift_c from the fields module.

use crate::fields::{
    add_with_carry, reg_name, shift_c, Condition, OpResult, Operand, RegisterList, SRType, Size,
};
use crate::processor::{ApsrFlags, CPU, LR, PC, SP};
use crate::{EmResult, EmulationError};

pub enum Signal {
    Ok,
    Branch,
}

#[derive(Debug, Copy, Clone)]
pub enum Instruction {
    NOP,
    ADC { rd: usize, rn: usize, op2: Operand, setflags: bool },
    ADD { rd: usize, rn: usize, op2: Operand, setflags: bool },
    AND { rd: usize, rn: usize, op2: Operand, setflags: bool },
    BIC { rd: usize, rn: usize, op2: Operand, setflags: bool },
    EOR { rd: usize, rn: usize, op2: Operand, setflags: bool },
    ORR { rd: usize, rn: usize, op2: Operand, setflags: bool },
    RSB { rd: usize, rn: usize, op2: Operand, setflags: bool },
    SBC { rd: usize, rn: usize, op2: Operand, setflags: bool },
    SUB { rd: usize, rn: usize, op2: Operand, setflags: bool },
    ADR { rd: usize, imm32: u32, add: bool },
    ASR { rd: usize, rm: usize, amount: Operand, setflags: bool },
    LSL { rd: usize, rm: usize, amount: Operand, setflags: bool },
    LSR { rd: usize, rm: usize, amount: Operand, setflags: bool },
    ROR { rd: usize, rm: usize, amount: Operand, setflags: bool },
    B { condition: Condition, imm32: i32 },
    BL { imm32: i32 },
    BLX { rm: usize },
    BX { rm: usize },
    CBZ { rn: usize, imm32: u32, nonzero: bool },
    CMN { rn: usize, op2: Operand },
    CMP { rn: usize, op2: Operand },
    TST { rn: usize, op2: Operand },
    CPS { im: bool, affect_primask: bool, affect_faultmask: bool },
    IT { firstcond: usize, mask: u8 },
    LDR { rt: usize, rn: usize, offset: Operand, index: bool, add: bool, wback: bool, size: Size },
    STR { rt: usize, rn: usize, offset: Operand, index: bool, add: bool, wback: bool, size: Size },
    MLA { rd: usize, rn: usize, rm: usize, ra: usize },
    MLS { rd: usize, rn: usize, rm: usize, ra: usize },
    MOV { rd: usize, rm: usize, setflags: bool },
    MOVI { rd: usize, imm32: u32, carry: Option<bool>, setflags: bool },
    MOVT { rd: usize, imm16: u32 },
    MOVW { rd: usize, imm32: u32 },
    MUL { rd: usize, rn: usize, rm: usize, setflags: bool },
    MVN { rd: usize, op2: Operand, setflags: bool },
    POP { registers: RegisterList },
    PUSH { registers: RegisterList },
    REV { rd: usize, rm: usize },
    REV16 { rd: usize, rm: usize },
    REVSH { rd: usize, rm: usize },
    SXTB { rd: usize, rm: usize },
    SXTH { rd: usize, rm: usize },
    UXTB { rd: usize, rm: usize },
    UXTH { rd: usize, rm: usize },
    UBFX { rd: usize, rn: usize, lsb: u32, widthminus1: u32 },
    UDIV { rd: usize, rn: usize, rm: usize },
}

impl Instruction {
    pub fn execute(&self, cpu: &mut CPU) -> EmResult<Signal> {
        match *self {
            // Branches carry their own condition and must sit at the end of
            // any IT block they appear in.
            Self::B { condition, imm32 } => {
                if cpu.in_it_block() && !cpu.last_in_it_block() {
                    return Err(EmulationError::IllegalState(String::from(
                        "branch not last in IT block",
                    )));
                }
                if !cpu.condition_passed(Some(condition)) {
                    return Ok(Signal::Ok);
                }
                let target = cpu.pc_value().wrapping_add(imm32 as u32);
                cpu.branch_write_pc(target);
                Ok(Signal::Branch)
            }
            Self::BL { imm32 } => {
                if cpu.in_it_block() && !cpu.last_in_it_block() {
                    return Err(EmulationError::IllegalState(String::from(
                        "branch not last in IT block",
                    )));
                }
                if !cpu.condition_passed(None) {
                    return Ok(Signal::Ok);
                }
                let return_address = cpu.pc_value();
                cpu.set_reg(LR, return_address | 1);
                cpu.branch_write_pc(return_address.wrapping_add(imm32 as u32));
                Ok(Signal::Branch)
            }
            Self::BLX { rm } => {
                if cpu.in_it_block() && !cpu.last_in_it_block() {
                    return Err(EmulationError::IllegalState(String::from(
                        "branch not last in IT block",
                    )));
                }
                if !cpu.condition_passed(None) {
                    return Ok(Signal::Ok);
                }
                let target = cpu.reg(rm);
                let next = cpu.pc_value().wrapping_sub(2);
                cpu.set_reg(LR, next | 1);
                cpu.bx_write_pc(target)?;
                Ok(Signal::Branch)
            }
            Self::BX { rm } => {
                if cpu.in_it_block() && !cpu.last_in_it_block() {
                    return Err(EmulationError::IllegalState(String::from(
                        "branch not last in IT block",
                    )));
                }
                if !cpu.condition_passed(None) {
                    return Ok(Signal::Ok);
                }
                cpu.bx_write_pc(cpu.reg(rm))?;
                Ok(Signal::Branch)
            }
            // Compare-and-branch never sits in an IT block and is not
            // condition-gated.
            Self::CBZ { rn, imm32, nonzero } => {
                if cpu.in_it_block() {
                    return Err(EmulationError::IllegalState(String::from(
                        "CBZ/CBNZ inside IT block",
                    )));
                }
                if (cpu.reg(rn) == 0) != nonzero {
                    let target = cpu.pc_value().wrapping_add(imm32);
                    cpu.branch_write_pc(target);
                    Ok(Signal::Branch)
                } else {
                    Ok(Signal::Ok)
                }
            }
            Self::IT { firstcond, mask } => {
                cpu.itstate = ((firstcond as u8) << 4) | mask;
                cpu.trace.line(format_args!("  > ITSTATE = {:02X}", cpu.itstate));
                Ok(Signal::Ok)
            }
            // Anything below is a no-op when its IT condition fails; the
            // stepper still advances ITSTATE afterwards.
            _ if !cpu.condition_passed(None) => Ok(Signal::Ok),
            Self::NOP => Ok(Signal::Ok),
            Self::ADD { rd, rn, op2, setflags } => {
                let (result, carry, overflow) =
                    add_with_carry(cpu.reg(rn), op2.value(cpu)?, false);
                write_arithmetic(cpu, rd, result, carry, overflow, setflags)
            }
            Self::ADC { rd, rn, op2, setflags } => {
                let (result, carry, overflow) =
                    add_with_carry(cpu.reg(rn), op2.value(cpu)?, cpu.carry());
                write_arithmetic(cpu, rd, result, carry, overflow, setflags)
            }
            Self::SUB { rd, rn, op2, setflags } => {
                let (result, carry, overflow) =
                    add_with_carry(cpu.reg(rn), !op2.value(cpu)?, true);
                write_arithmetic(cpu, rd, result, carry, overflow, setflags)
            }
            Self::SBC { rd, rn, op2, setflags } => {
                let (result, carry, overflow) =
                    add_with_carry(cpu.reg(rn), !op2.value(cpu)?, cpu.carry());
                write_arithmetic(cpu, rd, result, carry, overflow, setflags)
            }
            Self::RSB { rd, rn, op2, setflags } => {
                let (result, carry, overflow) =
                    add_with_carry(!cpu.reg(rn), op2.value(cpu)?, true);
                write_arithmetic(cpu, rd, result, carry, overflow, setflags)
            }
            Self::AND { rd, rn, op2, setflags } => {
                let (value, carry) = op2.value_c(cpu)?;
                write_logical(cpu, rd, cpu.reg(rn) & value, carry, setflags)
            }
            Self::BIC { rd, rn, op2, setflags } => {
                let (value, carry) = op2.value_c(cpu)?;
                write_logical(cpu, rd, cpu.reg(rn) & !value, carry, setflags)
            }
            Self::EOR { rd, rn, op2, setflags } => {
                let (value, carry) = op2.value_c(cpu)?;
                write_logical(cpu, rd, cpu.reg(rn) ^ value, carry, setflags)
            }
            Self::ORR { rd, rn, op2, setflags } => {
                let (value, carry) = op2.value_c(cpu)?;
                write_logical(cpu, rd, cpu.reg(rn) | value, carry, setflags)
            }
            Self::MVN { rd, op2, setflags } => {
                let (value, carry) = op2.value_c(cpu)?;
                write_logical(cpu, rd, !value, carry, setflags)
            }
            Self::TST { rn, op2 } => {
                let (value, carry) = op2.value_c(cpu)?;
                let mut flags = ApsrFlags::nz(cpu.reg(rn) & value);
                flags.c = carry;
                flags.set(cpu);
                Ok(Signal::Ok)
            }
            Self::CMP { rn, op2 } => {
                let (result, carry, overflow) =
                    add_with_carry(cpu.reg(rn), !op2.value(cpu)?, true);
                let mut flags = ApsrFlags::nz(result);
                flags.c = Some(carry);
                flags.v = Some(overflow);
                flags.set(cpu);
                Ok(Signal::Ok)
            }
            Self::CMN { rn, op2 } => {
                let (result, carry, overflow) =
                    add_with_carry(cpu.reg(rn), op2.value(cpu)?, false);
                let mut flags = ApsrFlags::nz(result);
                flags.c = Some(carry);
                flags.v = Some(overflow);
                flags.set(cpu);
                Ok(Signal::Ok)
            }
            Self::MOV { rd, rm, setflags } => {
                let result = cpu.reg(rm);
                if rd == PC {
                    cpu.branch_write_pc(result);
                    return Ok(Signal::Branch);
                }
                cpu.set_reg(rd, result);
                if setflags {
                    ApsrFlags::nz(result).set(cpu);
                }
                Ok(Signal::Ok)
            }
            Self::MOVI { rd, imm32, carry, setflags } => {
                cpu.set_reg(rd, imm32);
                if setflags {
                    let mut flags = ApsrFlags::nz(imm32);
                    flags.c = carry;
                    flags.set(cpu);
                }
                Ok(Signal::Ok)
            }
            Self::MOVW { rd, imm32 } => {
                cpu.set_reg(rd, imm32);
                Ok(Signal::Ok)
            }
            Self::MOVT { rd, imm16 } => {
                let result = (cpu.reg(rd) & 0xFFFF) | (imm16 << 16);
                cpu.set_reg(rd, result);
                Ok(Signal::Ok)
            }
            Self::LSL { rd, rm, amount, setflags } => {
                shift_operation(cpu, rd, rm, &amount, SRType::LSL, setflags)
            }
            Self::LSR { rd, rm, amount, setflags } => {
                shift_operation(cpu, rd, rm, &amount, SRType::LSR, setflags)
            }
            Self::ASR { rd, rm, amount, setflags } => {
                shift_operation(cpu, rd, rm, &amount, SRType::ASR, setflags)
            }
            Self::ROR { rd, rm, amount, setflags } => {
                shift_operation(cpu, rd, rm, &amount, SRType::ROR, setflags)
            }
            Self::ADR { rd, imm32, add } => {
                let base = cpu.pc_value() & !3;
                let result = if add {
                    base.wrapping_add(imm32)
                } else {
                    base.wrapping_sub(imm32)
                };
                cpu.set_reg(rd, result);
                Ok(Signal::Ok)
            }
            Self::LDR { rt, rn, offset, index, add, wback, size } => {
                let base = if rn == PC { cpu.pc_value() & !3 } else { cpu.reg(rn) };
                let offset_value = offset.value(cpu)?;
                let offset_address = if add {
                    base.wrapping_add(offset_value)
                } else {
                    base.wrapping_sub(offset_value)
                };
                let address = if index { offset_address } else { base };
                let data = cpu.read_traced(address, size)?;
                if wback {
                    cpu.set_reg(rn, offset_address);
                }
                if rt == PC {
                    cpu.load_write_pc(data.inner())?;
                    Ok(Signal::Branch)
                } else {
                    cpu.set_reg(rt, data.inner());
                    Ok(Signal::Ok)
                }
            }
            Self::STR { rt, rn, offset, index, add, wback, size } => {
                let base = cpu.reg(rn);
                let offset_value = offset.value(cpu)?;
                let offset_address = if add {
                    base.wrapping_add(offset_value)
                } else {
                    base.wrapping_sub(offset_value)
                };
                let address = if index { offset_address } else { base };
                cpu.write_traced(address, size.from(cpu.reg(rt)))?;
                if wback {
                    cpu.set_reg(rn, offset_address);
                }
                Ok(Signal::Ok)
            }
            Self::PUSH { registers } => {
                let sp = cpu.reg(SP).wrapping_sub(4 * registers.count());
                cpu.set_reg(SP, sp);
                let mut address = sp;
                for r in registers.iter() {
                    let value = cpu.r[r];
                    cpu.write_traced(address, OpResult::Word(value))?;
                    address = address.wrapping_add(4);
                }
                Ok(Signal::Ok)
            }
            Self::POP { registers } => {
                let mut address = cpu.reg(SP);
                let new_sp = address.wrapping_add(4 * registers.count());
                let mut pc_target = None;
                for r in registers.iter() {
                    let data = cpu.read_traced(address, Size::Word)?.inner();
                    address = address.wrapping_add(4);
                    if r == PC {
                        pc_target = Some(data);
                    } else {
                        cpu.set_reg(r, data);
                    }
                }
                cpu.set_reg(SP, new_sp);
                if let Some(target) = pc_target {
                    cpu.load_write_pc(target)?;
                    Ok(Signal::Branch)
                } else {
                    Ok(Signal::Ok)
                }
            }
            // Masks are stored for the trace and never read back: exception
            // priority is not modelled.
            Self::CPS { im, affect_primask, affect_faultmask } => {
                if affect_primask {
                    cpu.primask = im as u32;
                    cpu.trace.line(format_args!("  > PRIMASK = {:08X}", cpu.primask));
                }
                if affect_faultmask {
                    cpu.faultmask = im as u32;
                    cpu.trace.line(format_args!("  > FAULTMASK = {:08X}", cpu.faultmask));
                }
                Ok(Signal::Ok)
            }
            Self::MUL { rd, rn, rm, setflags } => {
                let result = cpu.reg(rn).wrapping_mul(cpu.reg(rm));
                cpu.set_reg(rd, result);
                if setflags {
                    ApsrFlags::nz(result).set(cpu);
                }
                Ok(Signal::Ok)
            }
            Self::MLA { rd, rn, rm, ra } => {
                let result = cpu.reg(rn).wrapping_mul(cpu.reg(rm)).wrapping_add(cpu.reg(ra));
                cpu.set_reg(rd, result);
                Ok(Signal::Ok)
            }
            Self::MLS { rd, rn, rm, ra } => {
                let result = cpu.reg(ra).wrapping_sub(cpu.reg(rn).wrapping_mul(cpu.reg(rm)));
                cpu.set_reg(rd, result);
                Ok(Signal::Ok)
            }
            Self::UDIV { rd, rn, rm } => {
                let divisor = cpu.reg(rm);
                if divisor == 0 {
                    return Err(EmulationError::IllegalState(String::from("UDIV by zero")));
                }
                let result = cpu.reg(rn) / divisor;
                cpu.set_reg(rd, result);
                Ok(Signal::Ok)
            }
            // The decoder refuses fields reaching past bit 31.
            Self::UBFX { rd, rn, lsb, widthminus1 } => {
                let mask = ((1u64 << (widthminus1 + 1)) - 1) as u32;
                let result = (cpu.reg(rn) >> lsb) & mask;
                cpu.set_reg(rd, result);
                Ok(Signal::Ok)
            }
            Self::UXTB { rd, rm } => {
                let result = cpu.reg(rm) & 0xFF;
                cpu.set_reg(rd, result);
                Ok(Signal::Ok)
            }
            Self::UXTH { rd, rm } => {
                let result = cpu.reg(rm) & 0xFFFF;
                cpu.set_reg(rd, result);
                Ok(Signal::Ok)
            }
            Self::SXTB { rd, rm } => {
                let result = cpu.reg(rm) as u8 as i8 as i32 as u32;
                cpu.set_reg(rd, result);
                Ok(Signal::Ok)
            }
            Self::SXTH { rd, rm } => {
                let result = cpu.reg(rm) as u16 as i16 as i32 as u32;
                cpu.set_reg(rd, result);
                Ok(Signal::Ok)
            }
            Self::REV { rd, rm } => {
                let result = cpu.reg(rm).swap_bytes();
                cpu.set_reg(rd, result);
                Ok(Signal::Ok)
            }
            Self::REV16 { rd, rm } => {
                let value = cpu.reg(rm);
                let result = ((value & 0x00FF_00FF) << 8) | ((value >> 8) & 0x00FF_00FF);
                cpu.set_reg(rd, result);
                Ok(Signal::Ok)
            }
            Self::REVSH { rd, rm } => {
                let result = (cpu.reg(rm) as u16).swap_bytes() as i16 as i32 as u32;
                cpu.set_reg(rd, result);
                Ok(Signal::Ok)
            }
        }
    }

    pub fn as_asm(&self, cpu: &CPU) -> String {
        // Inside an IT block the mnemonic carries the block's condition.
        let cond = if cpu.in_it_block() {
            Condition::from((cpu.itstate >> 4) as usize).as_asm()
        } else {
            ""
        };
        match *self {
            Self::NOP => format!("NOP{}", cond),
            Self::ADD { rd, rn, op2, setflags } => dp3("ADD", setflags, cond, rd, rn, &op2),
            Self::ADC { rd, rn, op2, setflags } => dp3("ADC", setflags, cond, rd, rn, &op2),
            Self::SUB { rd, rn, op2, setflags } => dp3("SUB", setflags, cond, rd, rn, &op2),
            Self::SBC { rd, rn, op2, setflags } => dp3("SBC", setflags, cond, rd, rn, &op2),
            Self::RSB { rd, rn, op2, setflags } => dp3("RSB", setflags, cond, rd, rn, &op2),
            Self::AND { rd, rn, op2, setflags } => dp3("AND", setflags, cond, rd, rn, &op2),
            Self::BIC { rd, rn, op2, setflags } => dp3("BIC", setflags, cond, rd, rn, &op2),
            Self::EOR { rd, rn, op2, setflags } => dp3("EOR", setflags, cond, rd, rn, &op2),
            Self::ORR { rd, rn, op2, setflags } => dp3("ORR", setflags, cond, rd, rn, &op2),
            Self::MVN { rd, op2, setflags } => format!(
                "MVN{}{} {}, {}",
                flags_suffix(setflags),
                cond,
                reg_name(rd),
                op2.as_asm()
            ),
            Self::TST { rn, op2 } => format!("TST{} {}, {}", cond, reg_name(rn), op2.as_asm()),
            Self::CMP { rn, op2 } => format!("CMP{} {}, {}", cond, reg_name(rn), op2.as_asm()),
            Self::CMN { rn, op2 } => format!("CMN{} {}, {}", cond, reg_name(rn), op2.as_asm()),
            Self::MOV { rd, rm, setflags } => format!(
                "MOV{}{} {}, {}",
                flags_suffix(setflags),
                cond,
                reg_name(rd),
                reg_name(rm)
            ),
            Self::MOVI { rd, imm32, setflags, .. } => format!(
                "MOV{}{} {}, #0x{:X}",
                flags_suffix(setflags),
                cond,
                reg_name(rd),
                imm32
            ),
            Self::MOVW { rd, imm32 } => format!("MOVW{} {}, #0x{:X}", cond, reg_name(rd), imm32),
            Self::MOVT { rd, imm16 } => format!("MOVT{} {}, #0x{:X}", cond, reg_name(rd), imm16),
            Self::LSL { rd, rm, amount, setflags } => shift_asm("LSL", setflags, cond, rd, rm, &amount),
            Self::LSR { rd, rm, amount, setflags } => shift_asm("LSR", setflags, cond, rd, rm, &amount),
            Self::ASR { rd, rm, amount, setflags } => shift_asm("ASR", setflags, cond, rd, rm, &amount),
            Self::ROR { rd, rm, amount, setflags } => shift_asm("ROR", setflags, cond, rd, rm, &amount),
            Self::ADR { rd, imm32, add } => format!(
                "ADR{} {}, PC, #{}0x{:X}",
                cond,
                reg_name(rd),
                if add { "" } else { "-" },
                imm32
            ),
            Self::B { condition, imm32 } => format!("B{} #{}", condition.as_asm(), imm32),
            Self::BL { imm32 } => format!("BL{} #{}", cond, imm32),
            Self::BLX { rm } => format!("BLX{} {}", cond, reg_name(rm)),
            Self::BX { rm } => format!("BX{} {}", cond, reg_name(rm)),
            Self::CBZ { rn, imm32, nonzero } => format!(
                "CB{}Z {}, #{}",
                if nonzero { "N" } else { "" },
                reg_name(rn),
                imm32
            ),
            Self::IT { firstcond, mask } => {
                let mut pattern = String::new();
                for j in ((mask.trailing_zeros() + 1)..4).rev() {
                    pattern.push(if (mask >> j) & 1 == (firstcond & 1) as u8 {
                        'T'
                    } else {
                        'E'
                    });
                }
                format!("IT{} {}", pattern, Condition::from(firstcond).as_asm())
            }
            Self::LDR { rt, rn, offset, index, add, wback, size } => format!(
                "LDR{}{} {}, {}",
                size.as_asm(),
                cond,
                reg_name(rt),
                address_asm(rn, &offset, index, add, wback)
            ),
            Self::STR { rt, rn, offset, index, add, wback, size } => format!(
                "STR{}{} {}, {}",
                size.as_asm(),
                cond,
                reg_name(rt),
                address_asm(rn, &offset, index, add, wback)
            ),
            Self::PUSH { registers } => format!("PUSH{} {}", cond, registers.as_asm()),
            Self::POP { registers } => format!("POP{} {}", cond, registers.as_asm()),
            Self::CPS { im, affect_primask, affect_faultmask } => {
                let mut masks = String::new();
                if affect_primask {
                    masks.push('i');
                }
                if affect_faultmask {
                    masks.push('f');
                }
                format!("CPS{} {}", if im { "ID" } else { "IE" }, masks)
            }
            Self::MUL { rd, rn, rm, setflags } => format!(
                "MUL{}{} {}, {}, {}",
                flags_suffix(setflags),
                cond,
                reg_name(rd),
                reg_name(rn),
                reg_name(rm)
            ),
            Self::MLA { rd, rn, rm, ra } => format!(
                "MLA{} {}, {}, {}, {}",
                cond,
                reg_name(rd),
                reg_name(rn),
                reg_name(rm),
                reg_name(ra)
            ),
            Self::MLS { rd, rn, rm, ra } => format!(
                "MLS{} {}, {}, {}, {}",
                cond,
                reg_name(rd),
                reg_name(rn),
                reg_name(rm),
                reg_name(ra)
            ),
            Self::UDIV { rd, rn, rm } => format!(
                "UDIV{} {}, {}, {}",
                cond,
                reg_name(rd),
                reg_name(rn),
                reg_name(rm)
            ),
            Self::UBFX { rd, rn, lsb, widthminus1 } => format!(
                "UBFX{} {}, {}, #{}, #{}",
                cond,
                reg_name(rd),
                reg_name(rn),
                lsb,
                widthminus1 + 1
            ),
            Self::UXTB { rd, rm } => format!("UXTB{} {}, {}", cond, reg_name(rd), reg_name(rm)),
            Self::UXTH { rd, rm } => format!("UXTH{} {}, {}", cond, reg_name(rd), reg_name(rm)),
            Self::SXTB { rd, rm } => format!("SXTB{} {}, {}", cond, reg_name(rd), reg_name(rm)),
            Self::SXTH { rd, rm } => format!("SXTH{} {}, {}", cond, reg_name(rd), reg_name(rm)),
            Self::REV { rd, rm } => format!("REV{} {}, {}", cond, reg_name(rd), reg_name(rm)),
            Self::REV16 { rd, rm } => format!("REV16{} {}, {}", cond, reg_name(rd), reg_name(rm)),
            Self::REVSH { rd, rm } => format!("REVSH{} {}, {}", cond, reg_name(rd), reg_name(rm)),
        }
    }
}

fn flags_suffix(setflags: bool) -> &'static str {
    if setflags {
        "S"
    } else {
        ""
    }
}

fn dp3(mnemonic: &str, setflags: bool, cond: &str, rd: usize, rn: usize, op2: &Operand) -> String {
    format!(
        "{}{}{} {}, {}, {}",
        mnemonic,
        flags_suffix(setflags),
        cond,
        reg_name(rd),
        reg_name(rn),
        op2.as_asm()
    )
}

fn shift_asm(
    mnemonic: &str,
    setflags: bool,
    cond: &str,
    rd: usize,
    rm: usize,
    amount: &Operand,
) -> String {
    format!(
        "{}{}{} {}, {}, {}",
        mnemonic,
        flags_suffix(setflags),
        cond,
        reg_name(rd),
        reg_name(rm),
        amount.as_asm()
    )
}

fn address_asm(rn: usize, offset: &Operand, index: bool, add: bool, wback: bool) -> String {
    let offset_asm = match *offset {
        Operand::Immediate { imm32, .. } => {
            if imm32 == 0 {
                String::new()
            } else {
                format!(", #{}0x{:X}", if add { "" } else { "-" }, imm32)
            }
        }
        Operand::Register { .. } => format!(", {}", offset.as_asm()),
    };
    if index {
        if wback {
            format!("[{}{}]!", reg_name(rn), offset_asm)
        } else {
            format!("[{}{}]", reg_name(rn), offset_asm)
        }
    } else {
        format!("[{}]{}", reg_name(rn), offset_asm)
    }
}

fn write_arithmetic(
    cpu: &mut CPU,
    rd: usize,
    result: u32,
    carry: bool,
    overflow: bool,
    setflags: bool,
) -> EmResult<Signal> {
    if rd == PC {
        cpu.branch_write_pc(result);
        return Ok(Signal::Branch);
    }
    cpu.set_reg(rd, result);
    if setflags {
        let mut flags = ApsrFlags::nz(result);
        flags.c = Some(carry);
        flags.v = Some(overflow);
        flags.set(cpu);
    }
    Ok(Signal::Ok)
}

fn write_logical(
    cpu: &mut CPU,
    rd: usize,
    result: u32,
    carry: Option<bool>,
    setflags: bool,
) -> EmResult<Signal> {
    cpu.set_reg(rd, result);
    if setflags {
        let mut flags = ApsrFlags::nz(result);
        flags.c = carry;
        flags.set(cpu);
    }
    Ok(Signal::Ok)
}

fn shift_operation(
    cpu: &mut CPU,
    rd: usize,
    rm: usize,
    amount: &Operand,
    srtype: SRType,
    setflags: bool,
) -> EmResult<Signal> {
    let n = match *amount {
        Operand::Immediate { imm32, .. } => imm32,
        Operand::Register { rm: rs, .. } => cpu.reg(rs) & 0xFF,
    };
    let (result, carry) = shift_c(cpu.reg(rm), srtype, n, cpu.carry())?;
    cpu.set_reg(rd, result);
    if setflags {
        let mut flags = ApsrFlags::nz(result);
        flags.c = Some(carry);
        flags.set(cpu);
    }
    Ok(Signal::Ok)
}
