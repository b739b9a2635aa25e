//! Ordered fallback chains over a fetched document.
//!
//! A [`FallbackChain`] holds candidate selectors from most to least
//! preferred. [`FallbackChain::resolve`] returns the first candidate whose
//! result is present and non-empty; an exhausted chain is "no value", never an
//! error.

/// Values that can be "empty" even when a selector matched.
pub trait Presence {
    fn is_present(&self) -> bool;
}

impl Presence for String {
    fn is_present(&self) -> bool {
        !self.trim().is_empty()
    }
}

impl Presence for &str {
    fn is_present(&self) -> bool {
        !self.trim().is_empty()
    }
}

impl<T> Presence for Vec<T> {
    fn is_present(&self) -> bool {
        !self.is_empty()
    }
}

type Selector<'a, D, T> = Box<dyn Fn(&D) -> Option<T> + 'a>;

struct Candidate<'a, D: ?Sized, T> {
    label: &'static str,
    select: Selector<'a, D, T>,
}

/// The winning candidate of a resolved chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved<T> {
    pub value: T,
    pub label: &'static str,
    /// Zero-based position of the winning candidate.
    pub index: usize,
}

/// An ordered list of extraction candidates.
///
/// ```
/// use mf_metadata::FallbackChain;
///
/// let chain = FallbackChain::<[&str], String>::new()
///     .then("first", |doc| doc.first().map(|s| s.to_string()))
///     .then("last", |doc| doc.last().map(|s| s.to_string()));
///
/// let resolved = chain.resolve(&["", "b"][..]).unwrap();
/// assert_eq!(resolved.value, "b");
/// assert_eq!(resolved.label, "last");
/// ```
pub struct FallbackChain<'a, D: ?Sized, T> {
    candidates: Vec<Candidate<'a, D, T>>,
}

impl<'a, D: ?Sized, T: Presence> FallbackChain<'a, D, T> {
    pub fn new() -> Self {
        Self {
            candidates: Vec::new(),
        }
    }

    /// Append a lower-priority candidate.
    pub fn then(mut self, label: &'static str, select: impl Fn(&D) -> Option<T> + 'a) -> Self {
        self.candidates.push(Candidate {
            label,
            select: Box::new(select),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.candidates.iter().map(|c| c.label).collect()
    }

    /// Evaluate candidates in order; later candidates are not evaluated once
    /// one yields a present value.
    pub fn resolve(&self, doc: &D) -> Option<Resolved<T>> {
        self.candidates
            .iter()
            .enumerate()
            .find_map(|(index, candidate)| {
                (candidate.select)(doc)
                    .filter(Presence::is_present)
                    .map(|value| Resolved {
                        value,
                        label: candidate.label,
                        index,
                    })
            })
    }
}

impl<D: ?Sized, T: Presence> Default for FallbackChain<'_, D, T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn constant(value: &'static str) -> impl Fn(&()) -> Option<String> {
        move |_| Some(value.to_string())
    }

    #[test]
    fn first_non_empty_wins() {
        let chain = FallbackChain::<(), String>::new()
            .then("a", constant(""))
            .then("b", constant(""))
            .then("c", constant("http://x"))
            .then("d", constant("http://y"));

        let resolved = chain.resolve(&()).unwrap();
        assert_eq!(resolved.value, "http://x");
        assert_eq!(resolved.label, "c");
        assert_eq!(resolved.index, 2);
    }

    #[test]
    fn later_candidates_are_not_evaluated() {
        let calls = Cell::new(0);
        let chain = FallbackChain::<(), String>::new()
            .then("hit", constant("x"))
            .then("miss", |_| {
                calls.set(calls.get() + 1);
                Some("y".into())
            });

        assert_eq!(chain.resolve(&()).unwrap().value, "x");
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn absent_and_whitespace_are_skipped() {
        let chain = FallbackChain::<(), String>::new()
            .then("none", |_| None)
            .then("blank", constant("   "))
            .then("value", constant("ok"));
        assert_eq!(chain.resolve(&()).unwrap().label, "value");
    }

    #[test]
    fn exhausted_chain_is_no_value() {
        let chain = FallbackChain::<(), String>::new()
            .then("a", |_| None)
            .then("b", constant(""));
        assert!(chain.resolve(&()).is_none());
        assert!(FallbackChain::<(), String>::new().resolve(&()).is_none());
    }

    #[test]
    fn selectors_read_the_document() {
        let doc = vec![("de", "http://de"), ("en", "http://en")];
        let chain = FallbackChain::<Vec<(&str, &str)>, String>::new()
            .then("fr", |d| d.iter().find(|(l, _)| *l == "fr").map(|(_, u)| u.to_string()))
            .then("en", |d| d.iter().find(|(l, _)| *l == "en").map(|(_, u)| u.to_string()));
        assert_eq!(chain.labels(), vec!["fr", "en"]);
        assert_eq!(chain.resolve(&doc).unwrap().value, "http://en");
    }
}
