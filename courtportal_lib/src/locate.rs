//! Ordered-strategy-list lookup: try each locator in order and
//! short-circuit on the first accepted hit.
//!
//! The portal's markup is inconsistent enough that nearly every value is
//! found by a cascade of locators rather than a single selector. This is
//! the one place that cascade logic lives; extraction and challenge
//! discovery both build on it.

/// A single lookup strategy. Returning `None` means "this strategy found
/// nothing, try the next one".
pub type Locator<'a, T> = Box<dyn Fn() -> Option<T> + 'a>;

/// Runs `locators` in order and returns the first result that `accept`
/// approves. Later locators are never invoked once one hits.
pub fn first_hit<T>(locators: &[Locator<'_, T>], accept: impl Fn(&T) -> bool) -> Option<T> {
    for locator in locators {
        if let Some(value) = locator() {
            if accept(&value) {
                return Some(value);
            }
        }
    }
    None
}

/// [`first_hit`] specialized to strings: the first result that is
/// non-empty after trimming wins, and is returned trimmed.
pub fn first_non_empty(locators: &[Locator<'_, String>]) -> Option<String> {
    first_hit(locators, |s| !s.trim().is_empty()).map(|s| s.trim().to_string())
}
