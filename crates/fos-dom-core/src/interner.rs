//! String Interner - Deduplicate names to save memory
//!
//! Element names, attribute names, prefixes and namespace URIs repeat
//! constantly across a document. They are stored once and referenced by a
//! 4-byte atom.

use std::collections::HashMap;

/// Interned string ID - just 4 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Atom(u32);

impl Atom {
    /// Empty string
    pub const EMPTY: Atom = Atom(0);
}

/// String entry storing offset and length
#[derive(Debug, Clone, Copy)]
struct StringEntry {
    offset: u32,
    len: u32,
}

/// String interner for deduplicating names
///
/// Memory layout:
/// - All strings stored in a single contiguous buffer
/// - Each Atom is just a 4-byte index
/// - Lengths stored separately (supports null bytes in strings)
#[derive(Debug)]
pub struct StringInterner {
    buffer: String,
    map: HashMap<Box<str>, u32>,
    entries: Vec<StringEntry>,
}

impl StringInterner {
    /// Create a new interner with the names the core itself looks up
    pub fn new() -> Self {
        let mut interner = Self {
            buffer: String::with_capacity(1024),
            map: HashMap::with_capacity(64),
            entries: Vec::with_capacity(64),
        };

        // Index 0 is the empty string
        interner.intern("");

        const COMMON_NAMES: &[&str] = &[
            "id", "class", "name", "xml", "xmlns",
            crate::document::XML_NAMESPACE,
            crate::document::XMLNS_NAMESPACE,
            crate::document::HTML_NAMESPACE,
            crate::document::SVG_NAMESPACE,
        ];
        for name in COMMON_NAMES {
            interner.intern(name);
        }

        interner
    }

    /// Intern a string, returning the existing atom when already present
    pub fn intern(&mut self, s: &str) -> Atom {
        if let Some(&index) = self.map.get(s) {
            return Atom(index);
        }

        let index = self.entries.len() as u32;
        let offset = self.buffer.len() as u32;
        let len = s.len() as u32;

        self.buffer.push_str(s);
        self.entries.push(StringEntry { offset, len });
        self.map.insert(s.into(), index);

        Atom(index)
    }

    /// Look up a string without interning it
    pub fn lookup(&self, s: &str) -> Option<Atom> {
        self.map.get(s).map(|&index| Atom(index))
    }

    /// Get the string for an atom
    #[inline]
    pub fn get(&self, atom: Atom) -> &str {
        match self.entries.get(atom.0 as usize) {
            Some(entry) => {
                let start = entry.offset as usize;
                &self.buffer[start..start + entry.len as usize]
            }
            None => "",
        }
    }

    /// Number of interned strings
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_dedup() {
        let mut interner = StringInterner::new();
        let a = interner.intern("item");
        let b = interner.intern("item");
        assert_eq!(a, b);
        assert_ne!(a, interner.intern("other"));
    }

    #[test]
    fn test_lookup_does_not_intern() {
        let mut interner = StringInterner::new();
        let before = interner.len();
        assert_eq!(interner.lookup("never-seen"), None);
        assert_eq!(interner.len(), before);

        let atom = interner.intern("seen");
        assert_eq!(interner.lookup("seen"), Some(atom));
    }

    #[test]
    fn test_empty_and_null_bytes() {
        let mut interner = StringInterner::new();
        assert_eq!(interner.get(Atom::EMPTY), "");
        let atom = interner.intern("a\0b");
        assert_eq!(interner.get(atom), "a\0b");
    }
}
