//! Typed, bounds-checked access to the raw image buffer (C1/C2).
//!
//! Every accessor here is a safe read over an immutable slice: no pointer
//! reinterpretation, no transmute. `spec.md` §9 calls this out explicitly
//! as the intended rendering of the original's pointer arithmetic over a
//! raw `mmap`ed region.

use crate::layout::Layout;
use thiserror::Error;

/// Failure to acquire a consistent view of the image. Distinct from a
/// [`crate::validate::Violation`]: these are deployment/format problems,
/// not filesystem-content problems.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("image is too small to hold a superblock ({0} bytes found)")]
    TruncatedSuperblock(usize),
    #[error("image is smaller than its declared size ({declared} bytes needed, {actual} found)")]
    TooSmall { declared: u64, actual: u64 },
    #[error("inode index {index} out of range (ninodes = {ninodes})")]
    InodeOutOfRange { index: u32, ninodes: u32 },
    #[error("filesystem geometry overflows a 64-bit block count")]
    GeometryOverflow,
}

/// The three superblock fields the checker consumes (`spec.md` §3).
#[derive(Debug, Clone, Copy)]
pub struct Superblock {
    pub size: u32,
    pub nblocks: u32,
    pub ninodes: u32,
}

/// Region offsets derived once from the superblock and the [`Layout`].
#[derive(Debug, Clone, Copy)]
pub struct Geometry {
    pub inode_blocks: u32,
    pub bitmap_blocks: u32,
    pub first_data_block: u32,
    /// Exclusive upper bound for any valid block number (`superblock.size`).
    pub last_block_exclusive: u32,
}

impl Geometry {
    fn derive(sb: &Superblock, layout: &Layout) -> Result<Self, AcquisitionError> {
        let inode_blocks = ceil_div(sb.ninodes, layout.ipb);
        let bitmap_blocks = ceil_div(sb.size, layout.bpb);
        let first_data_block = 2u32
            .checked_add(inode_blocks)
            .and_then(|v| v.checked_add(bitmap_blocks))
            .ok_or(AcquisitionError::GeometryOverflow)?;
        Ok(Self {
            inode_blocks,
            bitmap_blocks,
            first_data_block,
            last_block_exclusive: sb.size,
        })
    }

    /// Whether `addr` names a valid data block: `first_data_block <= addr <
    /// size`. Address `0` ("absent") is never in range.
    pub fn is_valid_data_block(&self, addr: u32) -> bool {
        addr >= self.first_data_block && addr < self.last_block_exclusive
    }
}

fn ceil_div(a: u32, b: u32) -> u32 {
    if b == 0 {
        0
    } else {
        (a + b - 1) / b
    }
}

/// A read-only view over one xv6-layout image and the geometry derived from
/// it. Owns no data; borrows the caller's byte buffer for its whole
/// lifetime, so it is indifferent to whether that buffer came from an
/// `mmap` or a plain `Vec<u8>` read.
pub struct Image<'a> {
    buf: &'a [u8],
    layout: Layout,
    superblock: Superblock,
    geometry: Geometry,
}

impl<'a> Image<'a> {
    /// Parses the superblock, derives geometry, and checks that `buf` is at
    /// least as large as the filesystem claims to be. Every later accessor
    /// relies on this having already rejected a truncated image, so none of
    /// them need to return an error for a merely-too-short buffer.
    pub fn open(buf: &'a [u8], layout: Layout) -> Result<Self, AcquisitionError> {
        let sb_off = layout.bsize as usize;
        if buf.len() < sb_off + 12 {
            return Err(AcquisitionError::TruncatedSuperblock(buf.len()));
        }
        let superblock = Superblock {
            size: read_u32(buf, sb_off),
            nblocks: read_u32(buf, sb_off + 4),
            ninodes: read_u32(buf, sb_off + 8),
        };
        let geometry = Geometry::derive(&superblock, &layout)?;
        log::debug!(
            "geometry: inode_blocks={} bitmap_blocks={} first_data_block={} size={}",
            geometry.inode_blocks,
            geometry.bitmap_blocks,
            geometry.first_data_block,
            superblock.size,
        );
        let declared = (superblock.size as u64) * (layout.bsize as u64);
        if (buf.len() as u64) < declared {
            return Err(AcquisitionError::TooSmall {
                declared,
                actual: buf.len() as u64,
            });
        }
        Ok(Self {
            buf,
            layout,
            superblock,
            geometry,
        })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn superblock(&self) -> &Superblock {
        &self.superblock
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// The byte contents of block `n`. `Image::open` already guaranteed
    /// `buf` covers every block below `superblock.size`, so this is
    /// infallible for any `n < geometry().last_block_exclusive`.
    pub fn block(&self, n: u32) -> Option<&'a [u8]> {
        if n >= self.superblock.size {
            return None;
        }
        let start = n as usize * self.layout.bsize as usize;
        Some(&self.buf[start..start + self.layout.bsize as usize])
    }

    /// Reads the bit for block `b` out of the bitmap region
    /// (`first_data_block` and onward are the only bits rules 5/6 look at,
    /// but any `b < size` can be queried).
    pub fn bitmap_bit(&self, b: u32) -> bool {
        let bitmap_start = 2 + self.geometry.inode_blocks;
        let byte_off = bitmap_start as usize * self.layout.bsize as usize + (b / 8) as usize;
        let byte = self.buf[byte_off];
        (byte >> (b % 8)) & 1 == 1
    }

    /// Reads inode `i`. Fails with [`AcquisitionError::InodeOutOfRange`] if
    /// `i >= ninodes`, per `spec.md` §4.1.
    pub fn inode(&self, i: u32) -> Result<crate::inode::Inode, AcquisitionError> {
        if i >= self.superblock.ninodes {
            return Err(AcquisitionError::InodeOutOfRange {
                index: i,
                ninodes: self.superblock.ninodes,
            });
        }
        let record_size = self.layout.dinode_record_size();
        let block_idx = 2 + i / self.layout.ipb;
        let off_in_block = (i % self.layout.ipb) as usize * record_size;
        let block = self
            .block(block_idx)
            .expect("inode table blocks are covered by the declared-size check in Image::open");
        Ok(crate::inode::Inode::parse(
            &block[off_in_block..off_in_block + record_size],
            &self.layout,
        ))
    }
}

pub(crate) fn read_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes(buf[off..off + 4].try_into().unwrap())
}

pub(crate) fn read_u16(buf: &[u8], off: usize) -> u16 {
    u16::from_le_bytes(buf[off..off + 2].try_into().unwrap())
}
