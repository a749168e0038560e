//! Offline consistency checker for xv6-layout filesystem images.
//!
//! The crate is split along the same seams the checker's own pipeline uses:
//! geometry ([`layout`]), buffer access ([`image`]), the inode and directory
//! walkers ([`inode`], [`dirent`]), and the validators themselves
//! ([`validate`]). [`validate::run_checks`] is the library's sole entry
//! point; everything else exists to make that function's body read as plain
//! arithmetic over typed views instead of raw offset juggling.

pub mod dirent;
pub mod image;
pub mod inode;
pub mod layout;
pub mod validate;

pub use image::{AcquisitionError, Image};
pub use layout::Layout;
pub use validate::Violation;
