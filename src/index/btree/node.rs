//! On-disk layout for B+-tree nodes.
//!
//! Both node kinds reuse the same "header then payload" convention the
//! page store already uses for [`crate::storage::page::PageHeader`]: fixed
//! 16-byte header, variable-length payload starting at offset 16.
//!
//! Leaf payload: `next_leaf: u32` followed by `slot_count` `(key, value)`
//! pairs, each length-prefixed with a `u16`.
//!
//! Internal payload: `slot_count + 1` child page ids (`u32` each) followed
//! by `slot_count` length-prefixed keys.

use crate::common::{Error, PageId, Result};
use crate::storage::page::{Page, PageHeader, PageType};

const HEADER_SIZE: usize = PageHeader::SIZE;

/// A leaf node: holds keys and their values directly, plus a pointer to
/// the next leaf for forward range scans.
#[derive(Debug, Clone)]
pub struct LeafNode {
    pub page_id: PageId,
    pub keys: Vec<Vec<u8>>,
    pub values: Vec<Vec<u8>>,
    pub next_leaf: PageId,
}

/// An internal node: `keys.len() + 1` children, separated by keys.
/// `children[i]` holds keys `< keys[i]` (or all keys, for the last child).
#[derive(Debug, Clone)]
pub struct InternalNode {
    pub page_id: PageId,
    pub keys: Vec<Vec<u8>>,
    pub children: Vec<PageId>,
}

#[derive(Debug, Clone)]
pub enum BTreeNode {
    Leaf(LeafNode),
    Internal(InternalNode),
}

impl BTreeNode {
    pub fn page_id(&self) -> PageId {
        match self {
            BTreeNode::Leaf(l) => l.page_id,
            BTreeNode::Internal(i) => i.page_id,
        }
    }

    pub fn key_count(&self) -> usize {
        match self {
            BTreeNode::Leaf(l) => l.keys.len(),
            BTreeNode::Internal(i) => i.keys.len(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, BTreeNode::Leaf(_))
    }

    pub fn write_to(&self, page: &mut Page) {
        match self {
            BTreeNode::Leaf(l) => l.write_to(page),
            BTreeNode::Internal(i) => i.write_to(page),
        }
    }

    pub fn read_from(page: &Page) -> Result<Self> {
        let header = page.header();
        match header.page_type {
            PageType::BTreeLeaf => Ok(BTreeNode::Leaf(LeafNode::read_from(page, &header)?)),
            PageType::BTreeInternal => {
                Ok(BTreeNode::Internal(InternalNode::read_from(page, &header)?))
            }
            other => Err(Error::CorruptionError(format!(
                "page {} has type {:?}, not a B+-tree node",
                header.page_id, other
            ))),
        }
    }
}

/// Write a length-prefixed byte string at `offset`, returning the offset
/// just past it.
fn write_bytes(data: &mut [u8], offset: usize, bytes: &[u8]) -> usize {
    let len = bytes.len() as u16;
    data[offset..offset + 2].copy_from_slice(&len.to_le_bytes());
    let start = offset + 2;
    data[start..start + bytes.len()].copy_from_slice(bytes);
    start + bytes.len()
}

/// Read a length-prefixed byte string at `offset`, returning it along with
/// the offset just past it.
fn read_bytes(data: &[u8], offset: usize) -> Result<(Vec<u8>, usize)> {
    if offset + 2 > data.len() {
        return Err(Error::CorruptionError(
            "truncated B+-tree node: missing length prefix".into(),
        ));
    }
    let len = u16::from_le_bytes([data[offset], data[offset + 1]]) as usize;
    let start = offset + 2;
    if start + len > data.len() {
        return Err(Error::CorruptionError(
            "truncated B+-tree node: payload runs past page boundary".into(),
        ));
    }
    Ok((data[start..start + len].to_vec(), start + len))
}

impl LeafNode {
    pub fn new(page_id: PageId) -> Self {
        Self {
            page_id,
            keys: Vec::new(),
            values: Vec::new(),
            next_leaf: PageId::INVALID,
        }
    }

    fn write_to(&self, page: &mut Page) {
        let mut header = PageHeader::new(self.page_id, PageType::BTreeLeaf);
        header.slot_count = self.keys.len() as u16;

        let data = page.as_mut_slice();
        let mut offset = HEADER_SIZE;
        data[offset..offset + 4].copy_from_slice(&self.next_leaf.0.to_le_bytes());
        offset += 4;

        for (key, value) in self.keys.iter().zip(self.values.iter()) {
            offset = write_bytes(data, offset, key);
            offset = write_bytes(data, offset, value);
        }

        header.free_space_offset = offset as u16;
        page.set_header(&header);
        page.update_checksum();
    }

    fn read_from(page: &Page, header: &PageHeader) -> Result<Self> {
        let data = page.as_slice();
        if HEADER_SIZE + 4 > data.len() {
            return Err(Error::CorruptionError("leaf node missing next_leaf pointer".into()));
        }
        let mut offset = HEADER_SIZE;
        let next_leaf = PageId::new(u32::from_le_bytes(
            data[offset..offset + 4].try_into().unwrap(),
        ));
        offset += 4;

        let mut keys = Vec::with_capacity(header.slot_count as usize);
        let mut values = Vec::with_capacity(header.slot_count as usize);
        for _ in 0..header.slot_count {
            let (key, next) = read_bytes(data, offset)?;
            offset = next;
            let (value, next) = read_bytes(data, offset)?;
            offset = next;
            keys.push(key);
            values.push(value);
        }

        Ok(Self {
            page_id: header.page_id,
            keys,
            values,
            next_leaf,
        })
    }
}

impl InternalNode {
    fn write_to(&self, page: &mut Page) {
        let mut header = PageHeader::new(self.page_id, PageType::BTreeInternal);
        header.slot_count = self.keys.len() as u16;

        let data = page.as_mut_slice();
        let mut offset = HEADER_SIZE;
        for child in &self.children {
            data[offset..offset + 4].copy_from_slice(&child.0.to_le_bytes());
            offset += 4;
        }
        for key in &self.keys {
            offset = write_bytes(data, offset, key);
        }

        header.free_space_offset = offset as u16;
        page.set_header(&header);
        page.update_checksum();
    }

    fn read_from(page: &Page, header: &PageHeader) -> Result<Self> {
        let data = page.as_slice();
        let child_count = header.slot_count as usize + 1;
        let mut offset = HEADER_SIZE;
        if offset + child_count * 4 > data.len() {
            return Err(Error::CorruptionError("internal node missing child pointers".into()));
        }

        let mut children = Vec::with_capacity(child_count);
        for _ in 0..child_count {
            let id = u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap());
            children.push(PageId::new(id));
            offset += 4;
        }

        let mut keys = Vec::with_capacity(header.slot_count as usize);
        for _ in 0..header.slot_count {
            let (key, next) = read_bytes(data, offset)?;
            offset = next;
            keys.push(key);
        }

        Ok(Self {
            page_id: header.page_id,
            keys,
            children,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_roundtrip() {
        let mut leaf = LeafNode::new(PageId::new(5));
        leaf.keys = vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()];
        leaf.values = vec![b"1".to_vec(), b"22".to_vec(), b"333".to_vec()];
        leaf.next_leaf = PageId::new(9);

        let mut page = Page::new();
        leaf.write_to(&mut page);
        assert!(page.verify_checksum());

        let node = BTreeNode::read_from(&page).unwrap();
        match node {
            BTreeNode::Leaf(l) => {
                assert_eq!(l.page_id, PageId::new(5));
                assert_eq!(l.keys, leaf.keys);
                assert_eq!(l.values, leaf.values);
                assert_eq!(l.next_leaf, PageId::new(9));
            }
            BTreeNode::Internal(_) => panic!("expected leaf"),
        }
    }

    #[test]
    fn test_internal_roundtrip() {
        let internal = InternalNode {
            page_id: PageId::new(2),
            keys: vec![b"m".to_vec(), b"t".to_vec()],
            children: vec![PageId::new(3), PageId::new(4), PageId::new(5)],
        };

        let mut page = Page::new();
        internal.write_to(&mut page);

        let node = BTreeNode::read_from(&page).unwrap();
        match node {
            BTreeNode::Internal(i) => {
                assert_eq!(i.keys, internal.keys);
                assert_eq!(i.children, internal.children);
            }
            BTreeNode::Leaf(_) => panic!("expected internal"),
        }
    }

    #[test]
    fn test_empty_leaf_roundtrip() {
        let leaf = LeafNode::new(PageId::new(1));
        let mut page = Page::new();
        leaf.write_to(&mut page);

        match BTreeNode::read_from(&page).unwrap() {
            BTreeNode::Leaf(l) => {
                assert!(l.keys.is_empty());
                assert_eq!(l.next_leaf, PageId::INVALID);
            }
            _ => panic!("expected leaf"),
        }
    }
}
