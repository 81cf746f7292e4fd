//! Page header and type definitions.
//!
//! Every page starts with a [`PageHeader`] containing metadata:
//! - the page's own id (so a page is self-describing once read off disk)
//! - [`PageType`] discriminator
//! - slot count and free-space offset, used by the B+-tree layer to lay
//!   out variable-length keys/values within the page
//! - a CRC32 checksum for integrity

use crate::common::PageId;

/// Type of page stored on disk.
///
/// Uses `#[repr(u8)]` to guarantee a 1-byte representation for serialization.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    /// Uninitialized or corrupted page.
    #[default]
    Invalid = 0,
    /// Generic data page.
    Data = 1,
    /// B-tree internal (non-leaf) node.
    BTreeInternal = 2,
    /// B-tree leaf node.
    BTreeLeaf = 3,
    /// Page on the free list.
    Free = 4,
}

impl PageType {
    /// Convert from u8, returning Invalid for unknown values.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => PageType::Data,
            2 => PageType::BTreeInternal,
            3 => PageType::BTreeLeaf,
            4 => PageType::Free,
            _ => PageType::Invalid,
        }
    }
}

/// Metadata stored at the beginning of every page.
///
/// # Layout (16 bytes)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       4     page_id (little-endian)
/// 4       1     page_type (PageType as u8)
/// 5       2     slot_count (little-endian)
/// 7       2     free_space_offset (little-endian)
/// 9       4     checksum (CRC32, little-endian)
/// 13      3     reserved (zero)
/// ```
///
/// # Checksum
/// The checksum is computed over the entire page with the checksum field
/// itself zeroed out, so verification doesn't need special-case handling.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    /// The id of the page this header is embedded in.
    pub page_id: PageId,
    /// Type of this page.
    pub page_type: PageType,
    /// Number of slots (keys, in the B+-tree layer) stored in this page.
    pub slot_count: u16,
    /// Offset of the first free byte in the page's payload area.
    pub free_space_offset: u16,
    /// CRC32 checksum of the page contents.
    pub checksum: u32,
}

impl PageHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = 16;

    pub const OFFSET_PAGE_ID: usize = 0;
    pub const OFFSET_PAGE_TYPE: usize = 4;
    pub const OFFSET_SLOT_COUNT: usize = 5;
    pub const OFFSET_FREE_SPACE: usize = 7;
    pub const OFFSET_CHECKSUM: usize = 9;

    /// Create a new header with the given page id and type. Slot count,
    /// free-space offset, and checksum start at zero.
    pub fn new(page_id: PageId, page_type: PageType) -> Self {
        Self {
            page_id,
            page_type,
            slot_count: 0,
            free_space_offset: 0,
            checksum: 0,
        }
    }

    /// Read a header from the beginning of a byte slice.
    ///
    /// # Panics
    /// Panics if `data.len() < PageHeader::SIZE`.
    pub fn from_bytes(data: &[u8]) -> Self {
        assert!(data.len() >= Self::SIZE, "buffer too small for PageHeader");

        let page_id = PageId::new(u32::from_le_bytes([
            data[Self::OFFSET_PAGE_ID],
            data[Self::OFFSET_PAGE_ID + 1],
            data[Self::OFFSET_PAGE_ID + 2],
            data[Self::OFFSET_PAGE_ID + 3],
        ]));

        let page_type = PageType::from_u8(data[Self::OFFSET_PAGE_TYPE]);

        let slot_count = u16::from_le_bytes([
            data[Self::OFFSET_SLOT_COUNT],
            data[Self::OFFSET_SLOT_COUNT + 1],
        ]);

        let free_space_offset = u16::from_le_bytes([
            data[Self::OFFSET_FREE_SPACE],
            data[Self::OFFSET_FREE_SPACE + 1],
        ]);

        let checksum = u32::from_le_bytes([
            data[Self::OFFSET_CHECKSUM],
            data[Self::OFFSET_CHECKSUM + 1],
            data[Self::OFFSET_CHECKSUM + 2],
            data[Self::OFFSET_CHECKSUM + 3],
        ]);

        Self {
            page_id,
            page_type,
            slot_count,
            free_space_offset,
            checksum,
        }
    }

    /// Write this header to the beginning of a byte slice.
    ///
    /// # Panics
    /// Panics if `data.len() < PageHeader::SIZE`.
    pub fn write_to(&self, data: &mut [u8]) {
        assert!(data.len() >= Self::SIZE, "buffer too small for PageHeader");

        data[Self::OFFSET_PAGE_ID..Self::OFFSET_PAGE_ID + 4]
            .copy_from_slice(&self.page_id.0.to_le_bytes());

        data[Self::OFFSET_PAGE_TYPE] = self.page_type as u8;

        data[Self::OFFSET_SLOT_COUNT..Self::OFFSET_SLOT_COUNT + 2]
            .copy_from_slice(&self.slot_count.to_le_bytes());

        data[Self::OFFSET_FREE_SPACE..Self::OFFSET_FREE_SPACE + 2]
            .copy_from_slice(&self.free_space_offset.to_le_bytes());

        data[Self::OFFSET_CHECKSUM..Self::OFFSET_CHECKSUM + 4]
            .copy_from_slice(&self.checksum.to_le_bytes());

        for b in &mut data[Self::OFFSET_CHECKSUM + 4..Self::SIZE] {
            *b = 0;
        }
    }

    /// Compute CRC32 checksum of a page.
    ///
    /// The checksum is computed with the checksum field zeroed out, so the
    /// checksum doesn't include itself.
    pub fn compute_checksum(page_data: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();

        hasher.update(&page_data[..Self::OFFSET_CHECKSUM]);
        hasher.update(&[0u8; 4]);
        hasher.update(&page_data[Self::OFFSET_CHECKSUM + 4..]);

        hasher.finalize()
    }

    /// Verify that the stored checksum matches the computed checksum.
    pub fn verify_checksum(&self, page_data: &[u8]) -> bool {
        self.checksum == Self::compute_checksum(page_data)
    }
}
