use thiserror::Error;

/// Fatal translator conditions.
///
/// Unimplemented instructions and analysis uncertainty are handled
/// internally and never show up here. Every variant aborts the
/// current compilation and the enclosing run; the instance must be
/// reset before it is used again.
#[derive(Debug, Error)]
pub enum Error {
    #[error("all {max} jump tables in use (image checksum {checksum:#010x})")]
    TooManyImages { checksum: u32, max: usize },

    #[error("more than {max} pending branch fixups while compiling pc {pc:#05x}")]
    TooManyFixups { pc: u32, max: usize },

    #[error("code buffer exhausted while compiling pc {pc:#05x}")]
    CodeBufferFull { pc: u32 },

    #[error("block compiler in invalid state {state} at pc {pc:#05x}")]
    InvalidCompilerState { pc: u32, state: &'static str },

    #[error("no codegen routine for word {word:#010x} at pc {pc:#05x}")]
    NoRoutine { pc: u32, word: u32 },

    #[error("jump table has no entry for pc {pc:#05x} after compilation")]
    MissingEntry { pc: u32 },

    #[error("failed to map code buffer: {0}")]
    Mmap(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
