//! Symbol interning.
//!
//! Symbols only cross the wire when they are registered under a key. The
//! registry is owned by the caller and handed to the encoder and decoder.

use std::collections::HashMap;

/// Handle to a symbol owned by a [`SymbolRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol(u32);

#[derive(Debug)]
struct SymbolEntry {
    description: Option<String>,
    registered: bool,
}

/// Interns symbols by key.
///
/// ```
/// use rser::SymbolRegistry;
///
/// let mut symbols = SymbolRegistry::new();
/// let a = symbols.for_key("app.id");
/// assert_eq!(symbols.for_key("app.id"), a);
/// assert_eq!(symbols.key_for(a), Some("app.id"));
///
/// let local = symbols.unique(Some("local"));
/// assert_eq!(symbols.key_for(local), None);
/// ```
#[derive(Debug, Default)]
pub struct SymbolRegistry {
    entries: Vec<SymbolEntry>,
    by_key: HashMap<String, Symbol>,
}

impl SymbolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the registered symbol for `key`, creating it on first use.
    pub fn for_key(&mut self, key: &str) -> Symbol {
        if let Some(symbol) = self.by_key.get(key) {
            return *symbol;
        }
        let symbol = self.push(Some(key.to_owned()), true);
        self.by_key.insert(key.to_owned(), symbol);
        symbol
    }

    /// Creates a fresh symbol that is not registered under any key.
    pub fn unique(&mut self, description: Option<&str>) -> Symbol {
        self.push(description.map(str::to_owned), false)
    }

    fn push(&mut self, description: Option<String>, registered: bool) -> Symbol {
        let symbol = Symbol(self.entries.len() as u32);
        self.entries.push(SymbolEntry {
            description,
            registered,
        });
        symbol
    }

    /// The key a symbol is registered under, if any.
    pub fn key_for(&self, symbol: Symbol) -> Option<&str> {
        self.entries
            .get(symbol.0 as usize)
            .filter(|entry| entry.registered)
            .and_then(|entry| entry.description.as_deref())
    }

    pub fn description(&self, symbol: Symbol) -> Option<&str> {
        self.entries
            .get(symbol.0 as usize)
            .and_then(|entry| entry.description.as_deref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
