use std::io;
use std::ptr;

/// Default primary region size: 16 MiB.
pub const DEFAULT_PRIMARY_SIZE: usize = 16 * 1024 * 1024;
/// Default secondary region size: 4 MiB.
pub const DEFAULT_SECONDARY_SIZE: usize = 4 * 1024 * 1024;

/// One of the two emission regions sharing a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    /// Hot, linear code.
    Primary = 0,
    /// Out-of-line slow paths (misaligned accesses, budget exits).
    Secondary = 1,
}

/// A reserved rel32 displacement that has not been patched yet.
///
/// Handles are the only way to rewrite previously emitted bytes.
/// Patching consumes the handle, so a site is written exactly once.
#[must_use = "an unpatched displacement jumps to the next instruction"]
#[derive(Debug, PartialEq, Eq)]
pub struct PatchHandle {
    site: usize,
}

impl PatchHandle {
    /// Buffer offset of the 4-byte displacement field.
    pub fn site(&self) -> usize {
        self.site
    }
}

/// JIT code buffer backed by one mmap'd RWX mapping.
///
/// The mapping is split into a primary and a secondary region with
/// independent cursors; `toggle` switches which one the emit methods
/// append to. Offsets are absolute within the mapping, so a jump
/// emitted in one region can target the other.
pub struct CodeBuffer {
    ptr: *mut u8,
    size: usize,
    split: usize,
    cursors: [usize; 2],
    active: Region,
}

// SAFETY: CodeBuffer owns its mmap'd memory exclusively.
unsafe impl Send for CodeBuffer {}

impl CodeBuffer {
    /// Map a buffer with the given region sizes (each rounded up to
    /// the page size).
    pub fn new(primary: usize, secondary: usize) -> io::Result<Self> {
        let page_size = page_size();
        let round = |n: usize| (n.max(1) + page_size - 1) & !(page_size - 1);
        let split = round(primary);
        let size = split + round(secondary);

        // SAFETY: anonymous private mapping, no file backing.
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE | libc::PROT_EXEC,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };

        if ptr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }

        Ok(Self {
            ptr: ptr as *mut u8,
            size,
            split,
            cursors: [0, split],
            active: Region::Primary,
        })
    }

    pub fn with_default_size() -> io::Result<Self> {
        Self::new(DEFAULT_PRIMARY_SIZE, DEFAULT_SECONDARY_SIZE)
    }

    /// Current write offset of the active region.
    #[inline]
    pub fn offset(&self) -> usize {
        self.cursors[self.active as usize]
    }

    #[inline]
    pub fn offset_in(&self, region: Region) -> usize {
        self.cursors[region as usize]
    }

    #[inline]
    pub fn active(&self) -> Region {
        self.active
    }

    /// Switch emission to the other region.
    #[inline]
    pub fn toggle(&mut self) {
        self.active = match self.active {
            Region::Primary => Region::Secondary,
            Region::Secondary => Region::Primary,
        };
    }

    #[inline]
    pub fn set_active(&mut self, region: Region) {
        self.active = region;
    }

    fn bounds(&self, region: Region) -> (usize, usize) {
        match region {
            Region::Primary => (0, self.split),
            Region::Secondary => (self.split, self.size),
        }
    }

    /// Total capacity of the mapping in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.size
    }

    /// Remaining writable bytes in `region`.
    pub fn remaining_in(&self, region: Region) -> usize {
        self.bounds(region).1 - self.cursors[region as usize]
    }

    /// Remaining writable bytes in the active region.
    pub fn remaining(&self) -> usize {
        self.remaining_in(self.active)
    }

    /// Rewind both cursors: the primary to `primary_start`, the
    /// secondary to the start of its region. Previously returned
    /// addresses become dangling.
    pub fn reset(&mut self, primary_start: usize) {
        assert!(primary_start <= self.split);
        self.cursors = [primary_start, self.split];
        self.active = Region::Primary;
    }

    /// Raw pointer to the start of the mapping.
    #[inline]
    pub fn base_ptr(&self) -> *const u8 {
        self.ptr as *const u8
    }

    /// Pointer at a given offset.
    #[inline]
    pub fn ptr_at(&self, offset: usize) -> *const u8 {
        assert!(offset <= self.size);
        // SAFETY: offset is within the mapping.
        unsafe { self.ptr.add(offset) as *const u8 }
    }

    /// Host address of a buffer offset.
    #[inline]
    pub fn addr_of(&self, offset: usize) -> usize {
        self.ptr_at(offset) as usize
    }

    /// Buffer offset of a host address inside the mapping.
    pub fn offset_of_addr(&self, addr: usize) -> Option<usize> {
        let base = self.ptr as usize;
        (addr >= base && addr < base + self.size).then(|| addr - base)
    }

    // -- Emit methods --

    #[inline]
    fn claim(&mut self, n: usize) -> usize {
        let at = self.offset();
        let end = self.bounds(self.active).1;
        assert!(at + n <= end, "code buffer overflow");
        self.cursors[self.active as usize] = at + n;
        at
    }

    #[inline]
    pub fn emit_u8(&mut self, val: u8) {
        let at = self.claim(1);
        unsafe { self.ptr.add(at).write(val) };
    }

    #[inline]
    pub fn emit_u16(&mut self, val: u16) {
        let at = self.claim(2);
        unsafe { (self.ptr.add(at) as *mut u16).write_unaligned(val) };
    }

    #[inline]
    pub fn emit_u32(&mut self, val: u32) {
        let at = self.claim(4);
        unsafe { (self.ptr.add(at) as *mut u32).write_unaligned(val) };
    }

    #[inline]
    pub fn emit_u64(&mut self, val: u64) {
        let at = self.claim(8);
        unsafe { (self.ptr.add(at) as *mut u64).write_unaligned(val) };
    }

    #[inline]
    pub fn emit_bytes(&mut self, data: &[u8]) {
        let at = self.claim(data.len());
        unsafe {
            ptr::copy_nonoverlapping(data.as_ptr(), self.ptr.add(at), data.len());
        }
    }

    // -- Patching --

    /// Reserve a zeroed rel32 field at the cursor.
    pub fn reserve_rel32(&mut self) -> PatchHandle {
        let site = self.offset();
        self.emit_u32(0);
        PatchHandle { site }
    }

    /// Point a reserved displacement at `target` (absolute offset).
    pub fn patch(&mut self, handle: PatchHandle, target: usize) {
        let disp = target as i64 - (handle.site as i64 + 4);
        assert!(
            disp >= i32::MIN as i64 && disp <= i32::MAX as i64,
            "jump displacement out of i32 range"
        );
        assert!(handle.site + 4 <= self.size);
        unsafe { (self.ptr.add(handle.site) as *mut u32).write_unaligned(disp as u32) };
    }

    /// Point a reserved displacement at the active cursor.
    pub fn patch_here(&mut self, handle: PatchHandle) {
        let here = self.offset();
        self.patch(handle, here);
    }

    /// Absolute target offset encoded by the rel32 field at `site`.
    pub fn rel32_target(&self, site: usize) -> usize {
        let disp = self.read_u32(site) as i32 as i64;
        (site as i64 + 4 + disp) as usize
    }

    #[inline]
    pub fn read_u8(&self, offset: usize) -> u8 {
        assert!(offset < self.size);
        unsafe { self.ptr.add(offset).read() }
    }

    #[inline]
    pub fn read_u32(&self, offset: usize) -> u32 {
        assert!(offset + 4 <= self.size);
        unsafe { (self.ptr.add(offset) as *const u32).read_unaligned() }
    }

    /// Bytes emitted so far into `region`.
    pub fn region_slice(&self, region: Region) -> &[u8] {
        let start = self.bounds(region).0;
        let len = self.cursors[region as usize] - start;
        // SAFETY: start..start+len has been written.
        unsafe { std::slice::from_raw_parts(self.ptr.add(start), len) }
    }
}

impl Drop for CodeBuffer {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe {
                libc::munmap(self.ptr as *mut libc::c_void, self.size);
            }
        }
    }
}

fn page_size() -> usize {
    // SAFETY: sysconf is always safe to call.
    unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
}
