//! End-to-end scenarios from the filesystem-checker specification: one
//! well-formed baseline and one targeted mutation per rule, each asserting
//! the exact canonical message (or success) the mutation should produce.

mod support;

use support::{Builder, T_DIR, T_FILE};
use xv6fsck::{validate::run_checks, Image, Layout, Violation};

fn check(buf: &[u8]) -> Result<(), Violation> {
    let image = Image::open(buf, Layout::xv6()).expect("well-formed test image should acquire");
    run_checks(&image)
}

#[test]
fn clean_image_passes() {
    let mut b = Builder::new(20, 8);
    b.init_root();
    assert_eq!(check(&b.finish()), Ok(()));
}

#[test]
fn bad_inode_type() {
    let mut b = Builder::new(20, 8);
    b.init_root();
    b.set_inode(2, 9, 0, &[], 0);
    assert_eq!(check(&b.finish()), Err(Violation::BadInode));
}

#[test]
fn direct_address_out_of_range() {
    let mut b = Builder::new(20, 8);
    b.init_root();
    // addrs[0] = 0 (absent, so never walked), addrs[1] = size + 5.
    b.set_inode(2, T_FILE, 0, &[0, 25], 0);
    assert_eq!(check(&b.finish()), Err(Violation::BadDirectAddress));
}

#[test]
fn missing_root_dotdot() {
    let mut b = Builder::new(20, 8);
    b.init_root();
    let root_block = b.root_block();
    b.write_dirent(root_block, 1, 2, b"..");
    assert_eq!(check(&b.finish()), Err(Violation::RootMissing));
}

#[test]
fn duplicate_direct_use() {
    let mut b = Builder::new(20, 8);
    b.init_root();
    let root_block = b.root_block();
    let shared = root_block + 1;
    b.set_inode(2, T_FILE, 1, &[shared], 0);
    b.set_inode(3, T_FILE, 1, &[shared], 0);
    b.write_dirent(root_block, 2, 2, b"a");
    b.write_dirent(root_block, 3, 3, b"b");
    b.set_bitmap_bit(shared, true);
    assert_eq!(check(&b.finish()), Err(Violation::DuplicateDirect));
}

#[test]
fn orphan_allocated_inode() {
    let mut b = Builder::new(20, 8);
    b.init_root();
    b.set_inode(2, T_FILE, 0, &[], 0);
    assert_eq!(check(&b.finish()), Err(Violation::AllocatedButUnreferenced));
}

#[test]
fn wrong_nlink() {
    let mut b = Builder::new(20, 8);
    b.init_root();
    let root_block = b.root_block();
    let data = root_block + 1;
    b.set_inode(2, T_FILE, 1, &[data], 0);
    b.set_bitmap_bit(data, true);
    b.write_dirent(root_block, 2, 2, b"a");
    b.write_dirent(root_block, 3, 2, b"b");
    assert_eq!(check(&b.finish()), Err(Violation::BadRefCount));
}

#[test]
fn hard_linked_directory() {
    let mut b = Builder::new(20, 8);
    b.init_root();
    let root_block = b.root_block();
    let dir_block = root_block + 1;
    b.set_inode(2, T_DIR, 1, &[dir_block], 0);
    b.write_dirent(dir_block, 0, 2, b".");
    b.write_dirent(dir_block, 1, 1, b"..");
    b.set_bitmap_bit(dir_block, true);
    b.write_dirent(root_block, 2, 2, b"a");
    b.write_dirent(root_block, 3, 2, b"b");
    assert_eq!(check(&b.finish()), Err(Violation::DuplicateDirectory));
}

/// (P4) On an image violating more than one rule, the earliest rule in
/// validator order is the one reported — here V1 (bad inode) must win over
/// V7 (duplicate direct), even though both hold.
#[test]
fn earliest_violation_in_validator_order_wins() {
    let mut b = Builder::new(20, 8);
    b.init_root();
    b.set_inode(2, 9, 0, &[], 0); // V1 violation
    let root_block = b.root_block();
    let shared = root_block + 1;
    b.set_inode(3, T_FILE, 1, &[shared], 0);
    b.set_inode(4, T_FILE, 1, &[shared], 0); // V7 violation
    b.set_bitmap_bit(shared, true);
    assert_eq!(check(&b.finish()), Err(Violation::BadInode));
}

/// (P3) Determinism: the same image produces the same result every time.
#[test]
fn repeated_checks_are_deterministic() {
    let mut b = Builder::new(20, 8);
    b.init_root();
    b.set_inode(2, 9, 0, &[], 0);
    let buf = b.finish();
    let first = check(&buf);
    let second = check(&buf);
    assert_eq!(first, second);
}
