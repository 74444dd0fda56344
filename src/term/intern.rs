//! Atom interner for efficient string storage and comparison.
//!
//! Mirrors `Interner` (one allocation per unique string, cheap
//! clones afterwards) but is `Send + Sync`: atoms are shared across the
//! partition locks and the rayon scan threads, so clones are `Arc<str>`
//! reference-count bumps rather than `Rc<str>` ones.

use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;

/// An interned atom name — cheap to clone, comparable by pointer identity.
pub type AtomStr = Arc<str>;

/// Global, thread-safe string interner shared by all parsed/constructed terms.
#[derive(Default)]
pub struct Interner {
    strings: RwLock<HashSet<Arc<str>>>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string, returning a cheap-to-clone reference.
    ///
    /// If the string was already interned, returns the existing `Arc`.
    pub fn intern(&self, s: &str) -> AtomStr {
        if let Some(existing) = self.strings.read().get(s) {
            return Arc::clone(existing);
        }
        let mut guard = self.strings.write();
        if let Some(existing) = guard.get(s) {
            return Arc::clone(existing);
        }
        let rc: Arc<str> = Arc::from(s);
        guard.insert(Arc::clone(&rc));
        rc
    }

    /// Number of unique atoms interned so far.
    pub fn len(&self) -> usize {
        self.strings.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_returns_same_arc() {
        let interner = Interner::new();
        let a = interner.intern("hello");
        let b = interner.intern("hello");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn intern_different_strings() {
        let interner = Interner::new();
        let a = interner.intern("foo");
        let b = interner.intern("bar");
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(&*a, "foo");
        assert_eq!(&*b, "bar");
    }

    #[test]
    fn concurrent_intern_dedups() {
        use std::thread;
        let interner = Arc::new(Interner::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let interner = Arc::clone(&interner);
                thread::spawn(move || interner.intern("shared"))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for r in &results[1..] {
            assert!(Arc::ptr_eq(&results[0], r));
        }
    }
}
