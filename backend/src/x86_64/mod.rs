pub mod emitter;
pub mod regs;

pub use emitter::X86_64CodeGen;
pub use regs::{Reg, Xmm};
