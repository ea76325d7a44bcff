//! Observability handle supplied by the host.

use tracing::Span;

/// Root span under which confidential operations record their own spans.
///
/// A disabled context hands out [`Span::none`], so tracing costs nothing and
/// changes nothing else.
#[derive(Debug, Clone, Default)]
pub struct TraceContext {
    root: Option<Span>,
}

impl TraceContext {
    pub fn new(root: Span) -> Self {
        TraceContext { root: Some(root) }
    }

    pub fn disabled() -> Self {
        TraceContext { root: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.root.is_some()
    }

    /// A child span for one confidential operation.
    pub fn span(&self, operation: &'static str) -> Span {
        match &self.root {
            Some(root) => tracing::info_span!(parent: root, "fhevm", operation),
            None => Span::none(),
        }
    }
}
