//! Identifier space for the ring: `m`-bit ids, the SHA-1 hash reducer, and the
//! two arc-interval predicates everything else is built on.

use sha1::{Digest, Sha1};

/// A position on the ring, always `< IdSpace::size()`.
pub type Id = u32;

/// The ring's modulus, expressed as a bit width.
///
/// `m` bits give `N = 2^m` identifiers. Arithmetic on [`Id`] values is always
/// performed modulo `N`, never modulo `u32::MAX`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IdSpace {
    m: u32,
}

/// Default ring size used throughout the test suite: `m = 8`, `N = 256`.
pub const DEFAULT_M: u32 = 8;

impl Default for IdSpace {
    fn default() -> Self {
        Self::new(DEFAULT_M)
    }
}

impl IdSpace {
    /// Creates an id space of `2^m` identifiers.
    ///
    /// # Panics
    /// Panics if `m` is zero or greater than 32 — the hash reducer only has
    /// 32 bits of digest to draw from, so `m` cannot exceed that.
    pub fn new(m: u32) -> Self {
        assert!(m > 0 && m <= 32, "m must be in 1..=32, got {m}");
        Self { m }
    }

    /// Number of bits per identifier.
    pub fn m(&self) -> u32 {
        self.m
    }

    /// `N = 2^m`, the size of the ring.
    pub fn size(&self) -> u64 {
        1u64 << self.m
    }

    /// Reduces a 32-bit hash down to an id in `[0, N)`.
    fn reduce(&self, h: u32) -> Id {
        (h as u64 % self.size()) as Id
    }

    /// Hashes an arbitrary string (an IP label or a resource name) to an id.
    ///
    /// Per the hash contract: SHA-1 over the UTF-8 bytes, first four digest
    /// bytes read as a big-endian `u32`, reduced mod `N` exactly once.
    pub fn hash_str(&self, s: &str) -> Id {
        let mut hasher = Sha1::new();
        hasher.update(s.as_bytes());
        let digest = hasher.finalize();
        let h = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
        self.reduce(h)
    }

    /// The id immediately clockwise of `id`, wrapping past `N-1` back to `0`.
    pub fn next(&self, id: Id) -> Id {
        ((id as u64 + 1) % self.size()) as Id
    }

    /// Forward clockwise distance from `a` to `b`, in `[0, N)`.
    pub fn distance(&self, a: Id, b: Id) -> u64 {
        let size = self.size();
        let (a, b) = (a as u64, b as u64);
        if b >= a {
            b - a
        } else {
            size - a + b
        }
    }

    /// `x` lies on the clockwise arc from `a` (exclusive) to `b` (inclusive).
    ///
    /// If `a == b` the arc covers the whole ring except `a` itself.
    pub fn in_half_open(&self, x: Id, a: Id, b: Id) -> bool {
        if a == b {
            x != a
        } else if a < b {
            x > a && x <= b
        } else {
            x > a || x <= b
        }
    }

    /// `x` lies on the clockwise arc from `a` (exclusive) to `b` (exclusive).
    ///
    /// If `a == b` the arc is empty.
    pub fn in_open(&self, x: Id, a: Id, b: Id) -> bool {
        if a == b {
            false
        } else if a < b {
            x > a && x < b
        } else {
            x > a || x < b
        }
    }
}
