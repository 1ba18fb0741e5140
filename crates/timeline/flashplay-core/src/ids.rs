//! Identifiers for document entities.
//!
//! Symbols and bitmaps live in dense arenas inside a [`crate::Document`]; the ids
//! below are indices into those arenas and are only meaningful for the document
//! that issued them.

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolId(pub u32);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BitmapId(pub u32);

/// Authored mask group identifier. Unique per mask layer within a document.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MaskId(pub u32);

impl SymbolId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl BitmapId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Monotonic allocator for arena ids while a document is being built.
#[derive(Default, Debug)]
pub struct IdAllocator {
    next_symbol: u32,
    next_bitmap: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn alloc_symbol(&mut self) -> SymbolId {
        let id = SymbolId(self.next_symbol);
        self.next_symbol = self.next_symbol.wrapping_add(1);
        id
    }

    #[inline]
    pub fn alloc_bitmap(&mut self) -> BitmapId {
        let id = BitmapId(self.next_bitmap);
        self.next_bitmap = self.next_bitmap.wrapping_add(1);
        id
    }
}
