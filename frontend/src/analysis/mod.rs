//! Whole-image static analysis.
//!
//! Every query here is conservative: when a walk cannot prove a fact
//! it answers the way that keeps generated code correct.

pub mod constants;
pub mod labels;
pub mod liveness;
pub mod shape;

use rsp_core::state::{MEM_SIZE, PC_MASK};
use rsp_core::{CompilerConfig, Insn, Opcode, JUMP_TABLE_SLOTS};

pub use constants::{scan_constants, RegisterFacts};
pub use labels::{build_branch_labels, BranchLabels};
pub use liveness::{
    are_flags_used, delay_slot_affects_branch, will_accumulator_be_read,
    will_vector_dest_be_overwritten,
};
pub use shape::{shape, AccSlices, Domain, Shape, ShapeFlags};

/// Decoded working copy of IMEM.
///
/// Compilation reads instructions from here instead of the emulated
/// IMEM, so the scheduler can permute sub-blocks without touching
/// guest memory.
#[derive(Clone)]
pub struct Image {
    words: Box<[u32; JUMP_TABLE_SLOTS]>,
}

impl Image {
    pub fn from_imem(imem: &[u8; MEM_SIZE]) -> Self {
        let mut words = Box::new([0u32; JUMP_TABLE_SLOTS]);
        for (w, bytes) in words.iter_mut().zip(imem.chunks_exact(4)) {
            *w = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        }
        Self { words }
    }

    /// Build an image from words starting at pc 0; the rest is zero.
    pub fn from_words(program: &[u32]) -> Self {
        let mut words = Box::new([0u32; JUMP_TABLE_SLOTS]);
        for (w, &p) in words.iter_mut().zip(program) {
            *w = p;
        }
        Self { words }
    }

    #[inline]
    pub fn word(&self, pc: u32) -> Insn {
        Insn(self.words[((pc & PC_MASK) >> 2) as usize])
    }

    #[inline]
    pub fn op(&self, pc: u32) -> Opcode {
        Opcode::decode(self.word(pc))
    }

    /// Words in `[start, end)`.
    pub fn range(&self, start: u32, end: u32) -> &[u32] {
        &self.words[(start >> 2) as usize..(end >> 2) as usize]
    }

    /// Overwrite the words starting at `start`.
    pub fn replace(&mut self, start: u32, words: &[u32]) {
        let at = (start >> 2) as usize;
        self.words[at..at + words.len()].copy_from_slice(words);
    }
}

/// Facts derived once per instruction image and shared by every
/// compilation against it.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub facts: RegisterFacts,
    pub labels: BranchLabels,
}

impl Analysis {
    pub fn new(image: &Image, config: &CompilerConfig) -> Self {
        let facts = if config.gpr_constants {
            scan_constants(image)
        } else {
            RegisterFacts::none()
        };
        Self {
            facts,
            labels: build_branch_labels(image),
        }
    }
}
