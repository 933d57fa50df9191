//! Directory - the buffer manager's page table.

use std::collections::HashMap;

use crate::common::{Error, FileId, FrameId, PageId, Result};
use crate::storage::PagedFile;

/// Maps `(file, page)` to the frame caching it.
///
/// An entry exists exactly while the frame is valid and holds that page.
#[derive(Debug, Default)]
pub struct Directory {
    entries: HashMap<(FileId, PageId), FrameId>,
}

impl Directory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
        }
    }

    /// Register a page.
    ///
    /// # Errors
    /// `Error::HashAlreadyPresent` if the page already has a frame.
    pub fn insert(&mut self, file: &PagedFile, page_id: PageId, frame_id: FrameId) -> Result<()> {
        let key = (file.id(), page_id);
        if self.entries.contains_key(&key) {
            return Err(Error::HashAlreadyPresent {
                file: file.filename().to_string(),
                page_id,
            });
        }
        self.entries.insert(key, frame_id);
        Ok(())
    }

    /// Find the frame caching a page.
    ///
    /// # Errors
    /// `Error::HashNotFound` on a miss.
    pub fn lookup(&self, file: &PagedFile, page_id: PageId) -> Result<FrameId> {
        self.entries
            .get(&(file.id(), page_id))
            .copied()
            .ok_or_else(|| Error::HashNotFound {
                file: file.filename().to_string(),
                page_id,
            })
    }

    /// Drop a page's entry.
    ///
    /// # Errors
    /// `Error::HashNotFound` if the page has no entry.
    pub fn remove(&mut self, file: &PagedFile, page_id: PageId) -> Result<FrameId> {
        self.entries
            .remove(&(file.id(), page_id))
            .ok_or_else(|| Error::HashNotFound {
                file: file.filename().to_string(),
                page_id,
            })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&(FileId, PageId), &FrameId)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_insert_lookup_remove() {
        let dir = tempdir().unwrap();
        let file = PagedFile::create(dir.path().join("d.db")).unwrap();
        let mut directory = Directory::with_capacity(4);

        directory.insert(&file, PageId::new(1), FrameId::new(3)).unwrap();
        assert_eq!(directory.lookup(&file, PageId::new(1)).unwrap(), FrameId::new(3));
        assert_eq!(directory.len(), 1);

        assert_eq!(directory.remove(&file, PageId::new(1)).unwrap(), FrameId::new(3));
        assert!(matches!(
            directory.lookup(&file, PageId::new(1)),
            Err(Error::HashNotFound { .. })
        ));
        assert!(directory.remove(&file, PageId::new(1)).is_err());
        assert!(directory.is_empty());
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let dir = tempdir().unwrap();
        let file = PagedFile::create(dir.path().join("d.db")).unwrap();
        let mut directory = Directory::default();

        directory.insert(&file, PageId::new(1), FrameId::new(0)).unwrap();
        assert!(matches!(
            directory.insert(&file, PageId::new(1), FrameId::new(1)),
            Err(Error::HashAlreadyPresent { .. })
        ));
    }

    #[test]
    fn test_keys_are_per_file() {
        let dir = tempdir().unwrap();
        let a = PagedFile::create(dir.path().join("a.db")).unwrap();
        let b = PagedFile::create(dir.path().join("b.db")).unwrap();
        let mut directory = Directory::default();

        directory.insert(&a, PageId::new(1), FrameId::new(0)).unwrap();
        directory.insert(&b, PageId::new(1), FrameId::new(1)).unwrap();

        assert_eq!(directory.lookup(&a, PageId::new(1)).unwrap(), FrameId::new(0));
        assert_eq!(directory.lookup(&b, PageId::new(1)).unwrap(), FrameId::new(1));
    }
}
