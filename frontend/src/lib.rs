//! RSP microcode to x86-64 translation.
//!
//! The pipeline per block: static analysis of the instruction image,
//! optional local rescheduling of each sub-block, then one codegen
//! routine per instruction selected through the dispatch tables.
//! Branches whose targets are not compiled yet are recorded as
//! fixups and resolved by the linker.

pub mod analysis;
pub mod codegen;
pub mod compiler;
pub mod dispatch;
pub mod linker;
pub mod reorder;

pub use analysis::{Analysis, Image};
pub use codegen::{CompileStats, DisasContext, Runtime};
pub use compiler::{compile_block, BlockState};
pub use linker::{compile, BranchFixup};
