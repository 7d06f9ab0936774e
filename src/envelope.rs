//! Discriminated envelopes.
//!
//! An envelope reads its common fields, builds a [`Key`] from the discriminator
//! values, and hands the rest of the input to the first [`VariantEntry`] whose
//! pattern matches. On write, the discriminator values come from the variant
//! itself ([`Envelope::discriminator`]), never from a stored copy, so they cannot
//! drift out of sync with the payload.

use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::codec::{CodecError, ErrorKind};
use std::collections::BTreeSet;
use std::fmt;
use tracing::trace;

pub const MAX_KEY_WIDTH: usize = 4;

/// Tuple of discriminator values, at most [`MAX_KEY_WIDTH`] wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key {
    values: [u64; MAX_KEY_WIDTH],
    len: usize,
}

impl Key {
    pub fn one(a: u64) -> Self {
        Self { values: [a, 0, 0, 0], len: 1 }
    }

    pub fn two(a: u64, b: u64) -> Self {
        Self { values: [a, b, 0, 0], len: 2 }
    }

    pub fn three(a: u64, b: u64, c: u64) -> Self {
        Self { values: [a, b, c, 0], len: 3 }
    }

    pub fn from_slice(values: &[u64]) -> Option<Self> {
        if values.is_empty() || values.len() > MAX_KEY_WIDTH {
            return None;
        }
        let mut key = Self { values: [0; MAX_KEY_WIDTH], len: values.len() };
        key.values[..values.len()].copy_from_slice(values);
        Some(key)
    }

    pub fn values(&self) -> &[u64] {
        &self.values[..self.len]
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, v) in self.values().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:#x}", v)?;
        }
        write!(f, ")")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    Any,
    Is(u64),
}

impl Pattern {
    pub fn matches(self, value: u64) -> bool {
        match self {
            Pattern::Any => true,
            Pattern::Is(v) => v == value,
        }
    }

    /// Every value `other` matches, `self` matches too.
    pub fn covers(self, other: Pattern) -> bool {
        match (self, other) {
            (Pattern::Any, _) => true,
            (Pattern::Is(a), Pattern::Is(b)) => a == b,
            (Pattern::Is(_), Pattern::Any) => false,
        }
    }
}

/// One row of a dispatch table.
pub struct VariantEntry<V: 'static, C: 'static> {
    pub name: &'static str,
    pub pattern: &'static [Pattern],
    pub decode: fn(&mut ReadBuffer<'_>, C) -> Result<V, CodecError>,
}

impl<V, C> VariantEntry<V, C> {
    pub fn matches(&self, key: &Key) -> bool {
        self.pattern.len() == key.len && self.pattern.iter().zip(key.values()).all(|(p, &v)| p.matches(v))
    }
}

/// Ordered, closed set of variants for one envelope. First match wins.
pub struct DispatchTable<V: 'static, C: 'static> {
    pub envelope: &'static str,
    pub entries: &'static [VariantEntry<V, C>],
}

impl<V, C: Copy> DispatchTable<V, C> {
    pub fn lookup(&self, key: &Key) -> Option<&VariantEntry<V, C>> {
        self.entries.iter().find(|e| e.matches(key))
    }

    /// Decode the variant selected by `key` inside a context named after it.
    pub fn decode(&self, rb: &mut ReadBuffer<'_>, key: Key, ctx: C) -> Result<V, CodecError> {
        let entry = self.lookup(&key).ok_or_else(|| {
            rb.error_at("", rb.position(), ErrorKind::UnknownVariant { envelope: self.envelope, key })
        })?;
        trace!(envelope = self.envelope, variant = entry.name, %key, "dispatch");
        rb.in_context(entry.name, |rb| (entry.decode)(rb, ctx))
    }

    /// Pairs `(shadowed, by)` where an earlier entry matches every key a later one does.
    pub fn shadowed_entries(&self) -> Vec<(&'static str, &'static str)> {
        let mut shadowed = Vec::new();
        for (j, later) in self.entries.iter().enumerate() {
            let by = self.entries[..j].iter().find(|earlier| {
                earlier.pattern.len() == later.pattern.len()
                    && earlier.pattern.iter().zip(later.pattern).all(|(e, l)| e.covers(*l))
            });
            if let Some(earlier) = by {
                shadowed.push((later.name, earlier.name));
            }
        }
        shadowed
    }

    /// A key that `entry` matches, avoiding values earlier entries pin at wildcard positions.
    pub fn sample_key(&self, entry: &VariantEntry<V, C>) -> Option<Key> {
        let mut values = Vec::with_capacity(entry.pattern.len());
        for (pos, pattern) in entry.pattern.iter().enumerate() {
            let value = match pattern {
                Pattern::Is(v) => *v,
                Pattern::Any => {
                    let taken: BTreeSet<u64> = self
                        .entries
                        .iter()
                        .filter_map(|e| match e.pattern.get(pos) {
                            Some(Pattern::Is(v)) => Some(*v),
                            _ => None,
                        })
                        .collect();
                    (0..).find(|v| !taken.contains(v)).unwrap_or(0)
                }
            };
            values.push(value);
        }
        Key::from_slice(&values)
    }
}

/// A polymorphic message family: common fields plus one of a closed set of variants.
pub trait Envelope: Sized + 'static {
    /// Parse-time inputs handed to each variant decoder.
    type Context: Copy + 'static;

    fn table() -> &'static DispatchTable<Self, Self::Context>;

    /// Discriminator values that select this variant on the wire.
    fn discriminator(&self) -> Key;

    fn variant_name(&self) -> &'static str;

    /// Write the variant-specific fields only.
    fn serialize_fields(&self, wb: &mut WriteBuffer) -> Result<(), CodecError>;

    fn fields_length_in_bits(&self) -> usize;

    fn decode_variant(rb: &mut ReadBuffer<'_>, key: Key, ctx: Self::Context) -> Result<Self, CodecError> {
        Self::table().decode(rb, key, ctx)
    }

    fn serialize_variant(&self, wb: &mut WriteBuffer) -> Result<(), CodecError> {
        wb.in_context(self.variant_name(), |wb| self.serialize_fields(wb))
    }
}
