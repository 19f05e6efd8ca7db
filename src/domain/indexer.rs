//! Bidirectional mapping between small integers and symbol names.
//!
//! Characters, languages and glyph-variant tags are all addressed by dense
//! indices in the scoring tables. A [`SymbolIndexer`] hands those indices out
//! in insertion order and can be locked once the alphabet is final, after
//! which indices are stable for the rest of the run.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::{OCRError, OcrResult};

/// Insertion-ordered symbol table with an optional lock.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "StoredIndexer")]
pub struct SymbolIndexer {
    symbols: Vec<String>,
    #[serde(skip)]
    lookup: HashMap<String, usize>,
    locked: bool,
}

#[derive(Deserialize)]
struct StoredIndexer {
    symbols: Vec<String>,
    #[serde(default)]
    locked: bool,
}

impl From<StoredIndexer> for SymbolIndexer {
    fn from(stored: StoredIndexer) -> Self {
        let mut indexer = Self::from_symbols(stored.symbols);
        indexer.locked = stored.locked;
        indexer
    }
}

impl SymbolIndexer {
    /// Creates an empty, unlocked indexer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an indexer holding `symbols` in order. Duplicates keep their first index.
    pub fn from_symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut indexer = Self::new();
        for symbol in symbols {
            indexer.insert(symbol.into());
        }
        indexer
    }

    fn insert(&mut self, symbol: String) -> usize {
        if let Some(&i) = self.lookup.get(&symbol) {
            return i;
        }
        let i = self.symbols.len();
        self.lookup.insert(symbol.clone(), i);
        self.symbols.push(symbol);
        i
    }

    /// Returns the index of `symbol`, adding it if the indexer is unlocked.
    ///
    /// # Errors
    ///
    /// Returns `OCRError::InvalidInput` when the indexer is locked and the
    /// symbol is unknown.
    pub fn index(&mut self, symbol: &str) -> OcrResult<usize> {
        if let Some(i) = self.get_index(symbol) {
            return Ok(i);
        }
        if self.locked {
            return Err(OCRError::invalid_input(format!(
                "symbol '{}' is not in the locked indexer",
                symbol
            )));
        }
        Ok(self.insert(symbol.to_string()))
    }

    /// Looks up a symbol without modifying the indexer.
    pub fn get_index(&self, symbol: &str) -> Option<usize> {
        self.lookup.get(symbol).copied()
    }

    /// Returns the symbol at index `i`.
    pub fn get_object(&self, i: usize) -> Option<&str> {
        self.symbols.get(i).map(String::as_str)
    }

    /// Whether `symbol` has been indexed.
    pub fn contains(&self, symbol: &str) -> bool {
        self.lookup.contains_key(symbol)
    }

    /// Freezes the indexer; later lookups of unknown symbols fail.
    pub fn lock(&mut self) {
        self.locked = true;
    }

    /// Whether the indexer is locked.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Number of indexed symbols.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Whether no symbol has been indexed.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Iterates `(index, symbol)` pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.symbols.iter().enumerate().map(|(i, s)| (i, s.as_str()))
    }
}
