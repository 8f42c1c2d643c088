//! Identifier interning.
//!
//! The interner is process-wide and append-only: identifier equality anywhere
//! in the compiler is `Istr` equality, and a handle stays valid for the life
//! of the process. Interned text is leaked once, so `resolve` hands back
//! `&'static str` without copies.

use rustc_hash::FxHashMap;
use std::num::NonZeroU32;
use std::sync::{OnceLock, RwLock};

/// A lightweight handle to an interned identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Istr(NonZeroU32);

impl Istr {
    #[inline]
    pub fn as_u32(self) -> u32 {
        self.0.get()
    }

    pub fn as_str(self) -> &'static str {
        Identifiers::global().resolve(self)
    }
}

impl std::fmt::Debug for Istr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Istr({:?})", self.as_str())
    }
}

impl std::fmt::Display for Istr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Default)]
struct Inner {
    map: FxHashMap<&'static str, Istr>,
    strings: Vec<&'static str>,
}

/// The process-wide identifier table.
pub struct Identifiers {
    inner: RwLock<Inner>,
}

static GLOBAL: OnceLock<Identifiers> = OnceLock::new();

impl Identifiers {
    pub fn global() -> &'static Identifiers {
        GLOBAL.get_or_init(|| Identifiers {
            inner: RwLock::new(Inner::default()),
        })
    }

    /// Intern a name, returning its stable handle.
    pub fn intern(&self, name: &str) -> Istr {
        if let Ok(inner) = self.inner.read() {
            if let Some(&sym) = inner.map.get(name) {
                return sym;
            }
        }
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if let Some(&sym) = inner.map.get(name) {
            return sym;
        }
        let leaked: &'static str = Box::leak(name.to_owned().into_boxed_str());
        inner.strings.push(leaked);
        // Handles are 1-based so Option<Istr> stays pointer-sized.
        let raw = NonZeroU32::new(inner.strings.len() as u32).unwrap();
        let sym = Istr(raw);
        inner.map.insert(leaked, sym);
        sym
    }

    /// Look up a name without interning it.
    pub fn get(&self, name: &str) -> Option<Istr> {
        self.inner
            .read()
            .ok()
            .and_then(|inner| inner.map.get(name).copied())
    }

    pub fn resolve(&self, sym: Istr) -> &'static str {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.strings[(sym.as_u32() - 1) as usize]
    }
}

/// Intern through the process-wide table.
#[inline]
pub fn intern(name: &str) -> Istr {
    Identifiers::global().intern(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_stable() {
        let a = intern("float4");
        let b = intern("color");
        let a2 = intern("float4");
        assert_eq!(a, a2);
        assert_ne!(a, b);
        assert_eq!(a.as_str(), "float4");
        assert_eq!(b.as_str(), "color");
    }

    #[test]
    fn get_does_not_intern() {
        assert_eq!(Identifiers::global().get("never-interned-name-xyzq"), None);
        let x = intern("definitely-interned");
        assert_eq!(Identifiers::global().get("definitely-interned"), Some(x));
    }

    #[test]
    fn concurrent_interning_agrees() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| intern("shared-name")))
            .collect();
        let syms: Vec<Istr> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(syms.windows(2).all(|w| w[0] == w[1]));
    }
}
