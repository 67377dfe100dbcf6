use rsp_core::state::NUM_GPRS;
use rsp_core::Opcode;

use super::shape::shape;
use super::Image;

/// Scalar registers holding one value for the whole image.
///
/// A register qualifies when the image writes it exactly once and
/// that write is an immediate load from register 0 (`addi`, `addiu`,
/// `ori` with `rs == 0`, or `lui`). Register 0 is always zero.
///
/// The fact is flow-insensitive: it also holds at instructions that
/// execute before the defining write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterFacts {
    values: [Option<u32>; NUM_GPRS],
}

impl RegisterFacts {
    /// Only register 0 is known.
    pub fn none() -> Self {
        let mut values = [None; NUM_GPRS];
        values[0] = Some(0);
        Self { values }
    }

    #[inline]
    pub fn constant(&self, reg: usize) -> Option<u32> {
        self.values[reg]
    }

    #[inline]
    pub fn is_constant(&self, reg: usize) -> bool {
        self.values[reg].is_some()
    }

    /// Number of registers (besides 0) with a known value.
    pub fn count(&self) -> usize {
        self.values[1..].iter().filter(|v| v.is_some()).count()
    }
}

/// Scan the whole image for single-definition immediate registers.
pub fn scan_constants(image: &Image) -> RegisterFacts {
    let mut writes = [0u32; NUM_GPRS];
    let mut produced: [Option<u32>; NUM_GPRS] = [None; NUM_GPRS];

    for pc in (0..0x1000).step_by(4) {
        let insn = image.word(pc);
        let mut mask = shape(insn).gpr_write;
        while mask != 0 {
            let r = mask.trailing_zeros() as usize;
            mask &= mask - 1;
            writes[r] += 1;
        }

        let value = match Opcode::decode(insn) {
            Opcode::Addi | Opcode::Addiu if insn.rs() == 0 => Some(insn.simm() as u32),
            Opcode::Ori if insn.rs() == 0 => Some(insn.imm() as u32),
            Opcode::Lui => Some((insn.imm() as u32) << 16),
            _ => None,
        };
        if let Some(v) = value {
            produced[insn.rt()] = Some(v);
        }
    }

    let mut facts = RegisterFacts::none();
    for r in 1..NUM_GPRS {
        if writes[r] == 1 {
            facts.values[r] = produced[r];
        }
    }
    tracing::debug!(constants = facts.count(), "scanned image for constant registers");
    facts
}
