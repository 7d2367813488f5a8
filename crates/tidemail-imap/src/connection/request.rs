//! Per-command request plumbing: tags, options and collected responses.

use std::time::Duration;

use crate::codec::{TaggedResponse, UntaggedResponse};

/// Generates monotonically increasing command tags: `A1`, `A2`, ...
#[derive(Debug, Default)]
pub struct TagGenerator {
    counter: u64,
}

impl TagGenerator {
    /// Creates a generator starting at `A1`.
    #[must_use]
    pub const fn new() -> Self {
        Self { counter: 0 }
    }

    /// Returns the next tag.
    pub fn next(&mut self) -> String {
        self.counter += 1;
        format!("A{}", self.counter)
    }
}

/// Options for a single command exchange.
///
/// `collect` is the command's untagged dispatch table: responses whose name
/// matches are copied into the request's [`ExecResult`] in arrival order
/// (they are still routed globally). The table exists only for the command's
/// duration.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecOptions<'a> {
    /// Untagged response names (uppercase) to collect for this request.
    pub collect: &'a [&'a str],
    /// Per-request deadline. Falls back to the configured default.
    pub timeout: Option<Duration>,
    /// Free-text diagnostic, surfaced in trace logs.
    pub comment: Option<&'a str>,
}

impl<'a> ExecOptions<'a> {
    /// Options that collect the given untagged response names.
    #[must_use]
    pub const fn collecting(collect: &'a [&'a str]) -> Self {
        Self {
            collect,
            timeout: None,
            comment: None,
        }
    }
}

/// Result of a completed command exchange.
#[derive(Debug, Clone)]
pub struct ExecResult {
    /// The tagged completion (always OK; NO/BAD surface as errors).
    pub tagged: TaggedResponse,
    /// Untagged responses matched by the request's dispatch table, in
    /// arrival order.
    pub collected: Vec<UntaggedResponse>,
}

impl ExecResult {
    /// Iterates the collected responses with the given name.
    pub fn collected_named<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a UntaggedResponse> {
        self.collected.iter().filter(move |r| r.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_monotonic() {
        let mut tags = TagGenerator::new();
        assert_eq!(tags.next(), "A1");
        assert_eq!(tags.next(), "A2");
        assert_eq!(tags.next(), "A3");
    }
}
