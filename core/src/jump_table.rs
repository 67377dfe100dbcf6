use std::num::NonZeroUsize;

use crate::state::{MEM_SIZE, PC_MASK};

/// One slot per instruction position of the 4 KiB image.
pub const JUMP_TABLE_SLOTS: usize = MEM_SIZE / 4;

/// Direct-mapped table from instruction position to native entry.
///
/// Indexed by `(pc >> 2)`. The slots live in a boxed array whose
/// address never changes, so generated code may embed that address
/// and read it for indirect jumps. `Option<NonZeroUsize>` has the
/// same layout as `usize`, with `None` read back as a null pointer.
pub struct JumpTable {
    slots: Box<[Option<NonZeroUsize>; JUMP_TABLE_SLOTS]>,
}

impl JumpTable {
    pub fn new() -> Self {
        Self {
            slots: Box::new([None; JUMP_TABLE_SLOTS]),
        }
    }

    #[inline]
    fn index(pc: u32) -> usize {
        ((pc & PC_MASK) >> 2) as usize
    }

    /// Native address compiled for `pc`, if any.
    #[inline]
    pub fn lookup(&self, pc: u32) -> Option<usize> {
        self.slots[Self::index(pc)].map(NonZeroUsize::get)
    }

    #[inline]
    pub fn contains(&self, pc: u32) -> bool {
        self.slots[Self::index(pc)].is_some()
    }

    /// Record the native entry for `pc`. A zero address clears the slot.
    pub fn insert(&mut self, pc: u32, host_addr: usize) {
        self.slots[Self::index(pc)] = NonZeroUsize::new(host_addr);
    }

    pub fn invalidate(&mut self) {
        self.slots.fill(None);
    }

    /// Address of slot 0, for embedding in generated code.
    pub fn base_ptr(&self) -> *const usize {
        self.slots.as_ptr() as *const usize
    }

    /// Number of compiled entry points.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate `(pc, host_addr)` over the populated slots.
    pub fn entries(&self) -> impl Iterator<Item = (u32, usize)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.map(|a| ((i as u32) << 2, a.get())))
    }
}

impl Default for JumpTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Sum of every sixteenth word of the low half of IMEM.
///
/// Deliberately weak: it only has to tell apart the handful of
/// microcode overlays a game rotates through. Two images with the
/// same checksum share compiled code.
pub fn image_checksum(imem: &[u8; MEM_SIZE]) -> u32 {
    (0..0x800)
        .step_by(0x40)
        .map(|a| u32::from_be_bytes([imem[a], imem[a + 1], imem[a + 2], imem[a + 3]]))
        .fold(0u32, u32::wrapping_add)
}
