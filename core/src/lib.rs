//! Core types shared by the RSP translator crates: instruction
//! words, opcode tables, the emulated state layout, jump tables,
//! configuration and errors.

pub mod config;
pub mod error;
pub mod insn;
pub mod jump_table;
pub mod opcode;
pub mod state;

pub use config::CompilerConfig;
pub use error::{Error, Result};
pub use insn::Insn;
pub use jump_table::{image_checksum, JumpTable, JUMP_TABLE_SLOTS};
pub use opcode::{classify, OpClass, Opcode};
pub use state::{RegisterFile, RspState};

/// Single-instruction interpreter used as the universal fallback.
///
/// Generated code calls `execute` for any instruction it does not
/// accelerate. Control transfers (branches, jumps, BREAK) are always
/// compiled natively and never reach this entry point.
pub trait Interpreter {
    /// Apply the side effects of `insn` to `state`. Does not touch
    /// `state.pc`.
    fn execute(&mut self, state: &mut RspState, insn: Insn);
}
