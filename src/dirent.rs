//! Directory entries and the directory walker (C4).

use crate::image::{read_u16, Image};
use crate::inode::{BlockKind, Inode};

/// One directory entry. `inum == 0` slots are filtered out by
/// [`entries`] before a `DirEntry` is ever constructed.
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub inum: u32,
    name: Vec<u8>,
}

impl DirEntry {
    /// The entry's name, truncated at the first NUL byte (names shorter
    /// than `dirsiz` are NUL-padded on disk).
    pub fn name(&self) -> &[u8] {
        match self.name.iter().position(|&b| b == 0) {
            Some(end) => &self.name[..end],
            None => &self.name,
        }
    }

    pub fn is_dot(&self) -> bool {
        self.name() == b"."
    }

    pub fn is_dotdot(&self) -> bool {
        self.name() == b".."
    }

    /// A "structural" entry (`.` or `..`) is excluded from every reference
    /// tally per `spec.md` §9's "Open question" ruling.
    pub fn is_structural(&self) -> bool {
        self.is_dot() || self.is_dotdot()
    }
}

/// Every directory entry across every data block the given `T_DIR` inode
/// references, in block order, skipping empty (`inum == 0`) slots.
///
/// One full block's worth of fixed-size slots is read per referenced data
/// block — never `inode.size / sizeof(dirent)` — per the ruling in
/// `spec.md` §9: this doesn't depend on `size` having been kept precise by
/// whatever wrote the image, and it covers every slot actually present.
/// The indirect block itself (the pointer array) is never scanned for
/// entries; only its `Direct`/`IndirectSlot` data blocks are.
pub fn entries(inode: &Inode, image: &Image) -> Vec<DirEntry> {
    let layout = image.layout();
    let dirent_size = layout.dirent_size();
    let per_block = layout.dirents_per_block();
    let mut out = Vec::new();
    for r in inode.block_refs(image) {
        if r.kind == BlockKind::IndirectBlockItself {
            continue;
        }
        let Some(block) = image.block(r.addr) else {
            continue;
        };
        for k in 0..per_block {
            let off = k * dirent_size;
            if off + dirent_size > block.len() {
                break;
            }
            let inum = read_u16(block, off) as u32;
            if inum == 0 {
                continue;
            }
            out.push(DirEntry {
                inum,
                name: block[off + 2..off + dirent_size].to_vec(),
            });
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::layout::Layout;

    /// A 20-block, 8-inode image whose inode 2 is a directory with one
    /// direct block (block 4) holding the given `(inum, name)` slots.
    fn build(slots: &[(u16, &[u8])]) -> (Vec<u8>, Layout) {
        let layout = Layout::xv6();
        let size: u32 = 20;
        let ninodes: u32 = 8;
        let mut buf = vec![0u8; size as usize * layout.bsize as usize];
        let sb_off = layout.bsize as usize;
        buf[sb_off..sb_off + 4].copy_from_slice(&size.to_le_bytes());
        buf[sb_off + 4..sb_off + 8].copy_from_slice(&(size - 4).to_le_bytes());
        buf[sb_off + 8..sb_off + 12].copy_from_slice(&ninodes.to_le_bytes());

        let record_size = layout.dinode_record_size();
        let inode_off = 2 * layout.bsize as usize + 2 * record_size;
        buf[inode_off..inode_off + 2].copy_from_slice(&1u16.to_le_bytes()); // T_DIR
        let addrs_off = inode_off + 12;
        buf[addrs_off..addrs_off + 4].copy_from_slice(&4u32.to_le_bytes()); // addrs[0] = 4

        let dirent_size = layout.dirent_size();
        let block4_off = 4 * layout.bsize as usize;
        for (k, (inum, name)) in slots.iter().enumerate() {
            let off = block4_off + k * dirent_size;
            buf[off..off + 2].copy_from_slice(&inum.to_le_bytes());
            let n = name.len().min(layout.dirsiz);
            buf[off + 2..off + 2 + n].copy_from_slice(&name[..n]);
        }
        (buf, layout)
    }

    #[test]
    fn entries_skips_empty_slots_and_truncates_names_at_nul() {
        let (buf, layout) = build(&[(2, b"."), (1, b".."), (3, b"foo"), (0, b"")]);
        let image = Image::open(&buf, layout).unwrap();
        let inode = image.inode(2).unwrap();
        let entries = entries(&inode, &image);
        assert_eq!(entries.len(), 3);
        assert!(entries[0].is_dot());
        assert!(entries[0].is_structural());
        assert_eq!(entries[0].inum, 2);
        assert!(entries[1].is_dotdot());
        assert_eq!(entries[1].inum, 1);
        assert_eq!(entries[2].name(), b"foo");
        assert!(!entries[2].is_structural());
    }
}
