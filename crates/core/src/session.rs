//! Per-session analysis selection.

use crate::hash::ParamsDigest;

/// The "current analysis" pointer a session holds between requests.
///
/// A clustering run hands its fingerprint digest back to the caller; a later
/// pathfinding request presents it again to bind to that clustering's cached
/// artifacts. The context is an explicit value threaded through calls, never
/// ambient state, so one engine can serve many concurrent sessions without
/// cross-talk.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AnalysisContext {
    current: Option<ParamsDigest>,
}

impl AnalysisContext {
    /// Create an empty context (no clustering selected yet).
    pub fn new() -> Self {
        Self::default()
    }

    /// Point the session at a clustering fingerprint.
    pub fn select(&mut self, digest: ParamsDigest) {
        self.current = Some(digest);
    }

    /// The currently selected clustering digest, if any.
    pub fn current(&self) -> Option<&ParamsDigest> {
        self.current.as_ref()
    }

    /// Drop the selection.
    pub fn clear(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_lifecycle() {
        let mut ctx = AnalysisContext::new();
        assert!(ctx.current().is_none());

        let digest = ParamsDigest::compute(b"clustering run");
        ctx.select(digest);
        assert_eq!(ctx.current(), Some(&digest));

        let replacement = ParamsDigest::compute(b"another run");
        ctx.select(replacement);
        assert_eq!(ctx.current(), Some(&replacement));

        ctx.clear();
        assert!(ctx.current().is_none());
    }
}
