//! Text-keyed memoized compilation

use crate::engine::Engine;
use crate::error::Result;
use std::borrow::Cow;
use std::collections::HashMap;
use std::rc::Rc;

/// One memoized parse+compile
pub struct CacheEntry<E: Engine> {
    pub parsed: E::Ast,
    pub exec: E::Exec,
}

/// Compiled-expression cache, keyed by normalized line text. Append-only,
/// never evicted; lives as long as the sheet that owns it and is shared by
/// every pass and every line with identical text.
pub struct CompiledCache<E: Engine> {
    entries: HashMap<String, Rc<CacheEntry<E>>>,
}

impl<E: Engine> CompiledCache<E> {
    pub fn new() -> Self {
        CompiledCache {
            entries: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return the memoized compilation of `text`, compiling on first sight.
    /// The decimal-comma normalized text is both the key and what gets
    /// parsed. Failures are not stored; a bad line re-parses every pass.
    pub fn lookup_or_compile(&mut self, engine: &E, text: &str) -> Result<Rc<CacheEntry<E>>> {
        let key = normalize_decimal_comma(text);

        if let Some(entry) = self.entries.get(key.as_ref()) {
            return Ok(Rc::clone(entry));
        }

        let parsed = engine.parse(&key)?;
        let exec = engine.compile(&parsed)?;
        let entry = Rc::new(CacheEntry { parsed, exec });
        self.entries.insert(key.into_owned(), Rc::clone(&entry));
        Ok(entry)
    }
}

impl<E: Engine> Default for CompiledCache<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Locale convenience: on a line with no parenthesis characters, the first
/// decimal comma becomes a decimal point. Lines with parentheses keep their
/// commas (they separate call arguments).
pub fn normalize_decimal_comma(text: &str) -> Cow<'_, str> {
    if text.contains('(') || text.contains(')') {
        return Cow::Borrowed(text);
    }
    match text.find(',') {
        Some(index) => {
            let mut owned = text.to_string();
            owned.replace_range(index..index + 1, ".");
            Cow::Owned(owned)
        }
        None => Cow::Borrowed(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MathEngine;

    #[test]
    fn test_normalize_first_comma() {
        assert_eq!(normalize_decimal_comma("1,5+2"), "1.5+2");
        assert_eq!(normalize_decimal_comma("1,5+2,5"), "1.5+2,5");
    }

    #[test]
    fn test_normalize_skips_lines_with_parens() {
        assert_eq!(normalize_decimal_comma("max(1,5)"), "max(1,5)");
        assert_eq!(normalize_decimal_comma("(1),5"), "(1),5");
    }

    #[test]
    fn test_normalize_without_comma_borrows() {
        assert!(matches!(
            normalize_decimal_comma("1+2"),
            Cow::Borrowed("1+2")
        ));
    }

    #[test]
    fn test_miss_then_hit() {
        let engine = MathEngine::new();
        let mut cache = CompiledCache::new();
        assert!(cache.is_empty());

        let first = cache.lookup_or_compile(&engine, "1+2").unwrap();
        assert_eq!(cache.len(), 1);
        // Both the parse and the compilation are kept
        assert_eq!(first.parsed.span, crate::ast::Span::new(0, 3));

        let second = cache.lookup_or_compile(&engine, "1+2").unwrap();
        assert_eq!(cache.len(), 1);
        assert!(Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_normalized_and_plain_share_entry() {
        let engine = MathEngine::new();
        let mut cache = CompiledCache::new();
        cache.lookup_or_compile(&engine, "1,5").unwrap();
        cache.lookup_or_compile(&engine, "1.5").unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failed_parse_is_not_cached() {
        let engine = MathEngine::new();
        let mut cache = CompiledCache::new();
        assert!(cache.lookup_or_compile(&engine, "1 +").is_err());
        assert!(cache.is_empty());
    }
}
