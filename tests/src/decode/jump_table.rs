use rsp_core::state::MEM_SIZE;
use rsp_core::{image_checksum, JumpTable, JUMP_TABLE_SLOTS};

#[test]
fn test_insert_and_lookup() {
    let mut table = JumpTable::new();
    assert!(table.is_empty());
    table.insert(0x100, 0x7000_1000);
    assert_eq!(table.lookup(0x100), Some(0x7000_1000));
    // pc is masked to an instruction slot
    assert_eq!(table.lookup(0x1100), Some(0x7000_1000));
    assert!(!table.contains(0x104));
    assert_eq!(table.len(), 1);
}

#[test]
fn test_invalidate_and_entries() {
    let mut table = JumpTable::new();
    table.insert(0, 0x10);
    table.insert(0xFFC, 0x20);
    let entries: Vec<_> = table.entries().collect();
    assert_eq!(entries, vec![(0, 0x10), (0xFFC, 0x20)]);
    table.invalidate();
    assert!(table.is_empty());
}

#[test]
fn test_slot_layout_is_pointer_sized() {
    let mut table = JumpTable::new();
    table.insert(8, 0xABCD);
    let base = table.base_ptr();
    // SAFETY: the table has JUMP_TABLE_SLOTS pointer-sized slots.
    let slot = unsafe { *base.add(2) };
    assert_eq!(slot, 0xABCD);
    assert_eq!(unsafe { *base.add(JUMP_TABLE_SLOTS - 1) }, 0);
}

#[test]
fn test_checksum_samples_every_sixteenth_word() {
    let mut imem = [0u8; MEM_SIZE];
    imem[0..4].copy_from_slice(&1u32.to_be_bytes());
    imem[0x40..0x44].copy_from_slice(&2u32.to_be_bytes());
    assert_eq!(image_checksum(&imem), 3);

    // words off the stride and in the high half are not sampled
    imem[0x44] = 0xFF;
    imem[0x800] = 0xFF;
    assert_eq!(image_checksum(&imem), 3);
}
