// Here reside the definitions of opcode fields; rather than have magic numbers everywhere,
// we opt for rich types wherever it is not too ridiculous.
// The parser then becomes the naturally messy code responsible for constructing said rich types.
//
// The flag arithmetic at the bottom (AddWithCarry, Shift_C, ThumbExpandImm_C and
// friends) follows the ARMv7-M ARM pseudocode, which every data-processing
// instruction is defined in terms of.

use crate::conversions::Truncate;
use crate::processor::{APSR, CPU};
use crate::{EmResult, EmulationError};
use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Size {
    Byte = 1,
    Halfword = 2,
    Word = 4,
}

impl Size {
    pub fn from<T>(&self, res: T) -> OpResult
    where
        T: Truncate<u8> + Truncate<u16> + Truncate<u32>,
    {
        match *self {
            Self::Byte => OpResult::Byte(res.truncate()),
            Self::Halfword => OpResult::Halfword(res.truncate()),
            Self::Word => OpResult::Word(res.truncate()),
        }
    }
    pub fn from_le_bytes(&self, slice: &[u8]) -> OpResult {
        match self {
            Size::Byte => OpResult::Byte(slice[0]),
            Size::Halfword => OpResult::Halfword(u16::from_le_bytes([slice[0], slice[1]])),
            Size::Word => {
                OpResult::Word(u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
            }
        }
    }
    // Mnemonic suffix: LDR/LDRB/LDRH, STR/STRB/STRH.
    pub fn as_asm(&self) -> &'static str {
        match *self {
            Self::Byte => "B",
            Self::Halfword => "H",
            Self::Word => "",
        }
    }
}

#[derive(Debug, Copy, Clone)]
pub enum OpResult {
    Byte(u8),
    Halfword(u16),
    Word(u32),
}

impl OpResult {
    pub fn inner(&self) -> u32 {
        match *self {
            Self::Byte(b) => b as u32,
            Self::Halfword(h) => h as u32,
            Self::Word(w) => w,
        }
    }
    pub fn size(&self) -> Size {
        match self {
            Self::Byte(_) => Size::Byte,
            Self::Halfword(_) => Size::Halfword,
            Self::Word(_) => Size::Word,
        }
    }
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let value = self.inner();
        let size = self.size() as usize;
        let mut result = Vec::with_capacity(size);
        for j in 0..size {
            result.push((value >> (8 * j)) as u8)
        }
        result
    }
}

impl fmt::UpperHex for OpResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            OpResult::Byte(b) => write!(f, "{:02X}", b),
            OpResult::Halfword(h) => write!(f, "{:04X}", h),
            OpResult::Word(w) => write!(f, "{:08X}", w),
        }
    }
}

// Condition codes as used by conditional branches and the IT mechanism.
// 1110 means "always"; 1111 is also treated as "always" where it can be
// reached through ITSTATE.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Condition {
    EQ = 0,
    NE = 1,
    CS = 2,
    CC = 3,
    MI = 4,
    PL = 5,
    VS = 6,
    VC = 7,
    HI = 8,
    LS = 9,
    GE = 10,
    LT = 11,
    GT = 12,
    LE = 13,
    AL = 14,
    NV = 15,
}

impl Condition {
    pub fn from(condition: usize) -> Self {
        match condition {
            0 => Self::EQ,
            1 => Self::NE,
            2 => Self::CS,
            3 => Self::CC,
            4 => Self::MI,
            5 => Self::PL,
            6 => Self::VS,
            7 => Self::VC,
            8 => Self::HI,
            9 => Self::LS,
            10 => Self::GE,
            11 => Self::LT,
            12 => Self::GT,
            13 => Self::LE,
            14 => Self::AL,
            15 => Self::NV,
            _ => Self::AL,
        }
    }
    pub fn as_asm(&self) -> &'static str {
        match *self {
            Self::EQ => "EQ",
            Self::NE => "NE",
            Self::CS => "CS",
            Self::CC => "CC",
            Self::MI => "MI",
            Self::PL => "PL",
            Self::VS => "VS",
            Self::VC => "VC",
            Self::HI => "HI",
            Self::LS => "LS",
            Self::GE => "GE",
            Self::LT => "LT",
            Self::GT => "GT",
            Self::LE => "LE",
            Self::AL => "",
            Self::NV => "",
        }
    }
    pub fn evaluate(&self, cpu: &CPU) -> bool {
        match *self {
            Self::EQ => cpu.flag(APSR::Z),
            Self::NE => !cpu.flag(APSR::Z),
            Self::CS => cpu.flag(APSR::C),
            Self::CC => !cpu.flag(APSR::C),
            Self::MI => cpu.flag(APSR::N),
            Self::PL => !cpu.flag(APSR::N),
            Self::VS => cpu.flag(APSR::V),
            Self::VC => !cpu.flag(APSR::V),
            Self::HI => cpu.flag(APSR::C) && !cpu.flag(APSR::Z),
            Self::LS => !cpu.flag(APSR::C) || cpu.flag(APSR::Z),
            Self::GE => cpu.flag(APSR::N) == cpu.flag(APSR::V),
            Self::LT => cpu.flag(APSR::N) != cpu.flag(APSR::V),
            Self::GT => !cpu.flag(APSR::Z) && (cpu.flag(APSR::N) == cpu.flag(APSR::V)),
            Self::LE => cpu.flag(APSR::Z) || (cpu.flag(APSR::N) != cpu.flag(APSR::V)),
            Self::AL => true,
            Self::NV => true,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_asm())
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum SRType {
    None,
    LSL,
    LSR,
    ASR,
    ROR,
    RRX,
}

impl SRType {
    pub fn as_asm(&self) -> &'static str {
        match *self {
            Self::None => "",
            Self::LSL => "LSL",
            Self::LSR => "LSR",
            Self::ASR => "ASR",
            Self::ROR => "ROR",
            Self::RRX => "RRX",
        }
    }
}

// Table A5-8: decode of the (type, imm5) shift fields of register operands.
pub fn decode_imm_shift(type2: usize, imm5: u32) -> (SRType, u32) {
    match type2 {
        0b00 => (SRType::LSL, imm5),
        0b01 => (SRType::LSR, if imm5 == 0 { 32 } else { imm5 }),
        0b10 => (SRType::ASR, if imm5 == 0 { 32 } else { imm5 }),
        _ => {
            if imm5 == 0 {
                (SRType::RRX, 1)
            } else {
                (SRType::ROR, imm5)
            }
        }
    }
}

// The flexible second operand of the data-processing instructions: either an
// already expanded immediate (with the shifter carry the expansion produced,
// if any) or a register with an optional immediate shift.
#[derive(Debug, Copy, Clone)]
pub enum Operand {
    Immediate { imm32: u32, carry: Option<bool> },
    Register { rm: usize, srtype: SRType, amount: u32 },
}

impl Operand {
    pub fn immediate(imm32: u32) -> Self {
        Operand::Immediate { imm32, carry: None }
    }
    pub fn register(rm: usize) -> Self {
        Operand::Register { rm, srtype: SRType::None, amount: 0 }
    }
    pub fn value(&self, cpu: &CPU) -> EmResult<u32> {
        Ok(self.value_c(cpu)?.0)
    }
    // Value plus the shifter carry-out; None means the carry flag is not
    // touched by this operand (plain register, zero shift, plain immediate).
    pub fn value_c(&self, cpu: &CPU) -> EmResult<(u32, Option<bool>)> {
        match *self {
            Self::Immediate { imm32, carry } => Ok((imm32, carry)),
            Self::Register { rm, srtype, amount } => {
                if amount == 0 {
                    Ok((cpu.reg(rm), None))
                } else {
                    let (result, carry) = shift_c(cpu.reg(rm), srtype, amount, cpu.carry())?;
                    Ok((result, Some(carry)))
                }
            }
        }
    }
    pub fn as_asm(&self) -> String {
        match *self {
            Self::Immediate { imm32, .. } => format!("#0x{:X}", imm32),
            Self::Register { rm, srtype, amount } => {
                if amount == 0 || srtype == SRType::None {
                    reg_name(rm)
                } else if srtype == SRType::RRX {
                    format!("{}, RRX", reg_name(rm))
                } else {
                    format!("{}, {} #{}", reg_name(rm), srtype.as_asm(), amount)
                }
            }
        }
    }
}

// Register list of PUSH/POP, bit n set = register n in the list.
#[derive(Debug, Copy, Clone)]
pub struct RegisterList(pub u16);

impl RegisterList {
    pub fn count(&self) -> u32 {
        self.0.count_ones()
    }
    pub fn contains(&self, register: usize) -> bool {
        self.0 & (1 << register) != 0
    }
    pub fn iter(&self) -> impl Iterator<Item = usize> {
        let list = self.0;
        (0..16).filter(move |r| list & (1 << r) != 0)
    }
    pub fn as_asm(&self) -> String {
        let mut registers = Vec::new();
        for r in self.iter() {
            registers.push(reg_name(r));
        }
        format!("{{{}}}", registers.join(", "))
    }
}

pub fn reg_name(register: usize) -> String {
    match register {
        13 => String::from("SP"),
        14 => String::from("LR"),
        15 => String::from("PC"),
        r => format!("R{}", r),
    }
}

pub fn sign_extend(value: u32, bits: u32) -> i32 {
    (value << (32 - bits)) as i32 >> (32 - bits)
}

// AddWithCarry: the one primitive under ADD, ADC, SUB, SBC, RSB, CMP and CMN.
// Carry-out is detected on the unbounded unsigned sum, overflow on the
// unbounded signed sum.
pub fn add_with_carry(x: u32, y: u32, carry_in: bool) -> (u32, bool, bool) {
    let unsigned_sum = x as u64 + y as u64 + carry_in as u64;
    let signed_sum = x as i32 as i64 + y as i32 as i64 + carry_in as i64;
    let result = unsigned_sum as u32;
    let carry = result as u64 != unsigned_sum;
    let overflow = result as i32 as i64 != signed_sum;
    (result, carry, overflow)
}

fn lsl_c(value: u32, amount: u32) -> (u32, bool) {
    if amount < 32 {
        (value << amount, (value >> (32 - amount)) & 1 == 1)
    } else if amount == 32 {
        (0, value & 1 == 1)
    } else {
        (0, false)
    }
}

fn lsr_c(value: u32, amount: u32) -> (u32, bool) {
    if amount < 32 {
        (value >> amount, (value >> (amount - 1)) & 1 == 1)
    } else if amount == 32 {
        (0, value >> 31 == 1)
    } else {
        (0, false)
    }
}

fn asr_c(value: u32, amount: u32) -> (u32, bool) {
    if amount < 32 {
        (((value as i32) >> amount) as u32, ((value as i32) >> (amount - 1)) & 1 == 1)
    } else {
        let sign = (value as i32) < 0;
        (if sign { 0xFFFF_FFFF } else { 0 }, sign)
    }
}

fn ror_c(value: u32, amount: u32) -> (u32, bool) {
    let result = value.rotate_right(amount % 32);
    (result, result >> 31 == 1)
}

fn rrx_c(value: u32, carry_in: bool) -> (u32, bool) {
    (((carry_in as u32) << 31) | (value >> 1), value & 1 == 1)
}

// Shift_C: a shift amount of zero is the identity and leaves the carry
// untouched; RRX always rotates by exactly one bit.
pub fn shift_c(value: u32, srtype: SRType, amount: u32, carry_in: bool) -> EmResult<(u32, bool)> {
    if srtype == SRType::RRX {
        if amount != 1 {
            return Err(EmulationError::IllegalState(format!(
                "RRX with shift amount {}",
                amount
            )));
        }
        return Ok(rrx_c(value, carry_in));
    }
    if amount == 0 {
        return Ok((value, carry_in));
    }
    Ok(match srtype {
        SRType::None => (value, carry_in),
        SRType::LSL => lsl_c(value, amount),
        SRType::LSR => lsr_c(value, amount),
        SRType::ASR => asr_c(value, amount),
        SRType::ROR => ror_c(value, amount),
        SRType::RRX => rrx_c(value, carry_in),
    })
}

pub fn shift(value: u32, srtype: SRType, amount: u32, carry_in: bool) -> EmResult<u32> {
    Ok(shift_c(value, srtype, amount, carry_in)?.0)
}

// ThumbExpandImm_C: expansion of the 12-bit modified immediate of the 32-bit
// data-processing encodings. The replicated forms with a zero byte are
// UNPREDICTABLE; None tells the decoder to refuse the encoding.
pub fn thumb_expand_imm_c(imm12: u32, carry_in: bool) -> Option<(u32, bool)> {
    let imm8 = imm12 & 0xFF;
    if imm12 >> 10 == 0 {
        let imm32 = match (imm12 >> 8) & 0b11 {
            0b00 => imm8,
            0b01 => {
                if imm8 == 0 {
                    return None;
                }
                (imm8 << 16) | imm8
            }
            0b10 => {
                if imm8 == 0 {
                    return None;
                }
                (imm8 << 24) | (imm8 << 8)
            }
            _ => {
                if imm8 == 0 {
                    return None;
                }
                imm8 * 0x0101_0101
            }
        };
        Some((imm32, carry_in))
    } else {
        let unrotated = 0x80 | (imm12 & 0x7F);
        let result = unrotated.rotate_right(imm12 >> 7);
        Some((result, result >> 31 == 1))
    }
}
