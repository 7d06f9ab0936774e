//! Non-fatal findings raised during parsing.
//!
//! A reserved field holding an unexpected value does not fail the parse; it is
//! reported here and decoding continues.

use std::cell::RefCell;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    ReservedMismatch {
        path: String,
        bit_offset: usize,
        expected: u64,
        actual: u64,
    },
}

pub trait DiagnosticSink {
    fn report(&self, diagnostic: Diagnostic);
}

/// Default sink: logs each diagnostic at `warn` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, diagnostic: Diagnostic) {
        match diagnostic {
            Diagnostic::ReservedMismatch { path, bit_offset, expected, actual } => {
                tracing::warn!(%path, bit_offset, expected, actual, "reserved field mismatch");
            }
        }
    }
}

/// Keeps every diagnostic in memory, for tests and fixture runs.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: RefCell<Vec<Diagnostic>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Diagnostic> {
        self.events.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&self, diagnostic: Diagnostic) {
        self.events.borrow_mut().push(diagnostic);
    }
}

/// Adapts a closure into a sink.
pub struct FnSink<F>(pub F);

impl<F: Fn(Diagnostic)> DiagnosticSink for FnSink<F> {
    fn report(&self, diagnostic: Diagnostic) {
        (self.0)(diagnostic)
    }
}
