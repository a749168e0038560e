//! The twelve validators (C5) and the driver that runs them in order (C6).

use crate::dirent;
use crate::image::Image;
use crate::inode::BlockKind;
use crate::layout::FileKind;
use thiserror::Error;

/// One violated invariant. Each variant's `Display` is the exact,
/// newline-free canonical diagnostic from `spec.md` §6; the caller adds
/// the trailing newline when printing it (see `src/main.rs`).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    #[error("ERROR: bad inode.")]
    BadInode,
    #[error("ERROR: bad direct address in inode.")]
    BadDirectAddress,
    #[error("ERROR: bad indirect address in inode.")]
    BadIndirectAddress,
    #[error("ERROR: root directory does not exist.")]
    RootMissing,
    #[error("ERROR: directory not properly formatted.")]
    BadDirectoryFormat,
    #[error("ERROR: address used by inode but marked free in bitmap.")]
    BlockNotMarked,
    #[error("ERROR: bitmap marks block in use but it is not inuse.")]
    BlockNotInUse,
    #[error("ERROR: direct address used more than once.")]
    DuplicateDirect,
    #[error("ERROR: indirect address used more than once.")]
    DuplicateIndirect,
    #[error("ERROR: inode referred to in directory but marked free.")]
    ReferencedButFree,
    #[error("ERROR: inode marked use but not found in directory.")]
    AllocatedButUnreferenced,
    #[error("ERROR: bad reference count for file.")]
    BadRefCount,
    #[error("ERROR: directory appears more than once in filesystem.")]
    DuplicateDirectory,
}

/// Runs every validator in the fixed order `spec.md` §4.5 requires,
/// stopping at (and returning) the first violation.
///
/// Later validators rely on earlier ones having already held: V5/V6 trust
/// that every referenced address is in range because V2 already checked
/// that, for instance.
pub fn run_checks(image: &Image) -> Result<(), Violation> {
    macro_rules! run {
        ($name:literal, $f:expr) => {{
            log::debug!("running {}", $name);
            $f(image)?;
        }};
    }
    run!("v1_valid_inode", v1_valid_inode);
    run!("v2_valid_inode_blocks", v2_valid_inode_blocks);
    run!("v3_valid_root", v3_valid_root);
    run!("v4_valid_directory", v4_valid_directory);
    run!("v5_v6_bitmap_consistency", v5_v6_bitmap_consistency);
    run!("v7_direct_uniqueness", v7_direct_uniqueness);
    run!("v8_indirect_uniqueness", v8_indirect_uniqueness);
    run!("v9_v10_inode_reachability", v9_v10_inode_reachability);
    run!("v11_file_link_count", v11_file_link_count);
    run!("v12_directory_uniqueness", v12_directory_uniqueness);
    log::debug!("all invariants hold");
    Ok(())
}

fn non_free_inodes<'i>(image: &'i Image) -> impl Iterator<Item = (u32, crate::inode::Inode)> + 'i {
    let rootino = image.layout().rootino;
    let ninodes = image.superblock().ninodes;
    (rootino..ninodes).filter_map(move |i| {
        let inode = image.inode(i).expect("i < ninodes by construction");
        (!inode.is_free()).then_some((i, inode))
    })
}

/// V1 — every non-free inode has a recognized `type`.
fn v1_valid_inode(image: &Image) -> Result<(), Violation> {
    for (_, inode) in non_free_inodes(image) {
        if inode.kind().is_none() {
            return Err(Violation::BadInode);
        }
    }
    Ok(())
}

/// V2 — every block address a non-free inode references is in
/// `[first_data_block, size)`. Direct and indirect violations get distinct
/// messages.
fn v2_valid_inode_blocks(image: &Image) -> Result<(), Violation> {
    let geometry = image.geometry();
    for (_, inode) in non_free_inodes(image) {
        for r in inode.block_refs(image) {
            let valid = geometry.is_valid_data_block(r.addr);
            match r.kind {
                BlockKind::Direct if !valid => return Err(Violation::BadDirectAddress),
                BlockKind::IndirectBlockItself | BlockKind::IndirectSlot if !valid => {
                    return Err(Violation::BadIndirectAddress)
                }
                _ => {}
            }
        }
    }
    Ok(())
}

/// V3 — the root inode exists, is a directory, and every `..` entry in it
/// points back at the root.
fn v3_valid_root(image: &Image) -> Result<(), Violation> {
    let rootino = image.layout().rootino;
    let root = image
        .inode(rootino)
        .map_err(|_| Violation::RootMissing)?;
    if root.is_free() || root.kind() != Some(FileKind::Dir) {
        return Err(Violation::RootMissing);
    }
    for entry in dirent::entries(&root, image) {
        if entry.is_dotdot() && entry.inum != rootino {
            return Err(Violation::RootMissing);
        }
    }
    Ok(())
}

/// V4 — every directory has exactly one `.` entry pointing at itself and
/// exactly one `..` entry.
fn v4_valid_directory(image: &Image) -> Result<(), Violation> {
    for (i, inode) in non_free_inodes(image) {
        if inode.kind() != Some(FileKind::Dir) {
            continue;
        }
        let entries = dirent::entries(&inode, image);
        let dots: Vec<_> = entries.iter().filter(|e| e.is_dot()).collect();
        let dotdot_count = entries.iter().filter(|e| e.is_dotdot()).count();
        let dot_ok = dots.len() == 1 && dots[0].inum == i;
        if !dot_ok || dotdot_count != 1 {
            return Err(Violation::BadDirectoryFormat);
        }
    }
    Ok(())
}

/// V5/V6 — a data block is marked in the bitmap iff some non-free inode
/// references it. Checked as two full passes, in that order, so that an
/// image violating both directions reports the first one.
fn v5_v6_bitmap_consistency(image: &Image) -> Result<(), Violation> {
    let geometry = image.geometry();
    let sb = image.superblock();
    let mut in_use = vec![false; sb.size as usize];
    for (_, inode) in non_free_inodes(image) {
        for r in inode.block_refs(image) {
            if (r.addr as usize) < in_use.len() {
                in_use[r.addr as usize] = true;
            }
        }
    }
    for b in geometry.first_data_block..geometry.last_block_exclusive {
        if in_use[b as usize] && !image.bitmap_bit(b) {
            return Err(Violation::BlockNotMarked);
        }
    }
    for b in geometry.first_data_block..geometry.last_block_exclusive {
        if image.bitmap_bit(b) && !in_use[b as usize] {
            return Err(Violation::BlockNotInUse);
        }
    }
    Ok(())
}

/// V7 — no data block is referenced by more than one direct pointer across
/// the whole inode table.
fn v7_direct_uniqueness(image: &Image) -> Result<(), Violation> {
    let sb = image.superblock();
    let mut counts = vec![0u32; sb.size as usize];
    for (_, inode) in non_free_inodes(image) {
        for &addr in inode.direct_addrs() {
            if addr != 0 && (addr as usize) < counts.len() {
                counts[addr as usize] += 1;
            }
        }
    }
    if counts.into_iter().any(|c| c > 1) {
        return Err(Violation::DuplicateDirect);
    }
    Ok(())
}

/// V8 — no data block is referenced by more than one indirect-block slot
/// across the whole inode table.
fn v8_indirect_uniqueness(image: &Image) -> Result<(), Violation> {
    let sb = image.superblock();
    let mut counts = vec![0u32; sb.size as usize];
    for (_, inode) in non_free_inodes(image) {
        for r in inode.block_refs(image) {
            if r.kind == BlockKind::IndirectSlot && (r.addr as usize) < counts.len() {
                counts[r.addr as usize] += 1;
            }
        }
    }
    if counts.into_iter().any(|c| c > 1) {
        return Err(Violation::DuplicateIndirect);
    }
    Ok(())
}

/// Per-inumber count of non-structural directory entries naming it, built
/// by walking every directory in the filesystem. Shared by V9/V10 (is it
/// referenced at all?) and V11/V12 (exactly how many times?), per the
/// fusion `spec.md` §4.4's algorithmic notes explicitly invite.
fn reference_counts(image: &Image) -> Vec<u32> {
    let ninodes = image.superblock().ninodes;
    let mut counts = vec![0u32; ninodes as usize];
    for (_, inode) in non_free_inodes(image) {
        if inode.kind() != Some(FileKind::Dir) {
            continue;
        }
        for entry in dirent::entries(&inode, image) {
            if entry.is_structural() {
                continue;
            }
            if (entry.inum as usize) < counts.len() {
                counts[entry.inum as usize] += 1;
            }
        }
    }
    counts
}

/// V9/V10 — an inode is non-free iff it is referenced by some directory
/// entry. The root is considered referenced unconditionally.
fn v9_v10_inode_reachability(image: &Image) -> Result<(), Violation> {
    let rootino = image.layout().rootino;
    let mut counts = reference_counts(image);
    if (rootino as usize) < counts.len() {
        counts[rootino as usize] = counts[rootino as usize].max(1);
    }
    let ninodes = image.superblock().ninodes;
    for i in rootino..ninodes {
        let allocated = !image.inode(i).expect("i < ninodes").is_free();
        let referenced = counts[i as usize] > 0;
        if referenced && !allocated {
            return Err(Violation::ReferencedButFree);
        }
    }
    for i in rootino..ninodes {
        let allocated = !image.inode(i).expect("i < ninodes").is_free();
        let referenced = counts[i as usize] > 0;
        if allocated && !referenced {
            return Err(Violation::AllocatedButUnreferenced);
        }
    }
    Ok(())
}

/// V11 — for each `T_FILE` inode, `nlink` equals the number of
/// non-structural directory entries referencing it.
fn v11_file_link_count(image: &Image) -> Result<(), Violation> {
    let counts = reference_counts(image);
    for (i, inode) in non_free_inodes(image) {
        if inode.kind() != Some(FileKind::File) {
            continue;
        }
        if counts[i as usize] != inode.nlink as u32 {
            return Err(Violation::BadRefCount);
        }
    }
    Ok(())
}

/// V12 — for each `T_DIR` inode other than root, exactly one non-structural
/// directory entry references it.
fn v12_directory_uniqueness(image: &Image) -> Result<(), Violation> {
    let rootino = image.layout().rootino;
    let counts = reference_counts(image);
    for (i, inode) in non_free_inodes(image) {
        if i == rootino || inode.kind() != Some(FileKind::Dir) {
            continue;
        }
        if counts[i as usize] != 1 {
            return Err(Violation::DuplicateDirectory);
        }
    }
    Ok(())
}
