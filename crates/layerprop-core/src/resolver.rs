//! Placeholder resolution
//!
//! Rewrites every merged value by expanding its placeholders against the
//! merged table. A pass is recursive descent over the parsed value with an
//! explicit stack of keys in progress; re-entering a key on the stack is a
//! circular reference and fails that placeholder instead of looping.
//!
//! Substitution can join text into new placeholder syntax (`${open}{x}` with
//! `open=$`), so a value is parsed and expanded again until a pass leaves it
//! unchanged. Text copied from non-resolvable values is never rescanned.
//!
//! Per-key results only read the merged table, so they do not depend on the
//! order keys are visited in. Both successes and failures are cached.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::error::{Error, Result, UnresolvedPlaceholder, UnresolvedReason};
use crate::interpolation::{self, Placeholder, Segment, Syntax, Text};
use crate::merge::{normalize_key, MergedTable};

/// Passes over one value before rescanning gives up
const MAX_PASSES: usize = 64;

/// Fully expanded properties
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Resolution {
    /// Resolved value per key, in merged table order
    pub values: IndexMap<String, String>,
    /// Placeholders kept as text because ignoring unresolvable placeholders
    /// was enabled. Always empty otherwise.
    pub unresolved: Vec<UnresolvedPlaceholder>,
}

/// Expand every value of the merged table.
///
/// Fails with [`Error::unresolvable`] listing every placeholder that could
/// not be expanded, unless `ignore_unresolvable` is set, in which case the
/// placeholder text is kept in the value.
pub fn resolve(
    table: &MergedTable,
    syntax: &Syntax,
    ignore_unresolvable: bool,
    case_sensitive: bool,
) -> Result<Resolution> {
    let mut resolver = Resolver::new(table, syntax, case_sensitive);
    let mut resolution = Resolution::default();

    for (key, property) in table {
        if !property.resolvable || !interpolation::contains_placeholder(&property.raw_value, syntax)
        {
            resolution
                .values
                .insert(key.clone(), property.raw_value.clone());
            continue;
        }

        let (value, failures) = resolver.resolve_top_level(key, &property.raw_value);
        for failure in failures {
            resolution.unresolved.push(UnresolvedPlaceholder {
                key: key.clone(),
                placeholder: failure.placeholder.value,
                reason: failure.reason,
            });
        }
        resolution.values.insert(key.clone(), value);
    }

    if !resolution.unresolved.is_empty() {
        if !ignore_unresolvable {
            return Err(Error::unresolvable(resolution.unresolved));
        }
        for entry in &resolution.unresolved {
            log::warn!(
                "Keeping unresolvable placeholder {} in '{}': {}",
                entry.placeholder,
                entry.key,
                entry.reason
            );
        }
    }

    log::debug!(
        "Resolved {} keys ({} unresolved placeholders kept)",
        resolution.values.len(),
        resolution.unresolved.len()
    );

    Ok(resolution)
}

/// A placeholder that could not be expanded
#[derive(Debug)]
struct Failure {
    /// Placeholder text as it stays in the value
    placeholder: Text,
    reason: UnresolvedReason,
}

struct Resolver<'a> {
    table: &'a MergedTable,
    syntax: &'a Syntax,
    case_sensitive: bool,
    /// Outcome per expanded key. A key that fails under one resolution stack
    /// fails under every other, so failures are reused like successes.
    expanded: HashMap<String, std::result::Result<Text, UnresolvedReason>>,
}

impl<'a> Resolver<'a> {
    fn new(table: &'a MergedTable, syntax: &'a Syntax, case_sensitive: bool) -> Self {
        Self {
            table,
            syntax,
            case_sensitive,
            expanded: HashMap::new(),
        }
    }

    /// Expand a top-level value, collecting every failed placeholder
    fn resolve_top_level(&mut self, key: &str, raw_value: &str) -> (String, Vec<Failure>) {
        if let Some(Ok(text)) = self.expanded.get(key) {
            return (text.value.clone(), Vec::new());
        }

        let mut stack = vec![key.to_string()];
        let (text, failures) = self.expand_value(Text::plain(raw_value), &mut stack);
        self.remember(key, &text, &failures);
        (text.value, failures)
    }

    /// Fully expand the value of a referenced key
    fn expand_key(
        &mut self,
        key: &str,
        raw_value: &str,
        stack: &mut Vec<String>,
    ) -> std::result::Result<Text, UnresolvedReason> {
        if let Some(outcome) = self.expanded.get(key) {
            return outcome.clone();
        }

        stack.push(key.to_string());
        let (text, failures) = self.expand_value(Text::plain(raw_value), stack);
        stack.pop();

        self.remember(key, &text, &failures);
        match failures.into_iter().next() {
            Some(first) => Err(first.reason),
            None => {
                log::trace!("Expanded '{}'", key);
                Ok(text)
            }
        }
    }

    fn remember(&mut self, key: &str, text: &Text, failures: &[Failure]) {
        let outcome = match failures.first() {
            Some(first) => Err(first.reason.clone()),
            None => Ok(text.clone()),
        };
        self.expanded.insert(key.to_string(), outcome);
    }

    /// Expand a value, then rescan the result until a pass changes nothing.
    /// The failures reported are those of the last pass.
    fn expand_value(&mut self, mut text: Text, stack: &mut Vec<String>) -> (Text, Vec<Failure>) {
        let mut passes = 0;
        loop {
            let template = interpolation::parse_text(&text, self.syntax);
            if !template.has_placeholders() {
                return (text, Vec::new());
            }

            if passes == MAX_PASSES {
                log::warn!(
                    "Giving up on '{}' after {} passes",
                    stack.last().map(String::as_str).unwrap_or_default(),
                    passes
                );
                let failure = Failure {
                    placeholder: text.clone(),
                    reason: UnresolvedReason::TooManyPasses { passes },
                };
                return (text, vec![failure]);
            }

            let (next, failures) = self.expand_segments(&template.segments, stack);
            passes += 1;
            if next == text {
                return (next, failures);
            }
            text = next;
        }
    }

    /// Expand a sequence of segments. Failed placeholders are rendered back
    /// as text and reported.
    fn expand_segments(
        &mut self,
        segments: &[Segment],
        stack: &mut Vec<String>,
    ) -> (Text, Vec<Failure>) {
        let mut text = Text::default();
        let mut failures = Vec::new();

        for segment in segments {
            match segment {
                Segment::Literal(s) => text.push_str(s),
                Segment::Verbatim(s) => text.push_verbatim(s),
                Segment::Placeholder(placeholder) => {
                    match self.expand_placeholder(placeholder, stack) {
                        Ok(value) => text.append(&value),
                        Err(failure) => {
                            text.append(&failure.placeholder);
                            failures.push(failure);
                        }
                    }
                }
            }
        }

        (text, failures)
    }

    fn expand_placeholder(
        &mut self,
        placeholder: &Placeholder,
        stack: &mut Vec<String>,
    ) -> std::result::Result<Text, Failure> {
        let table = self.table;
        let syntax = self.syntax;
        let (key_text, key_failures) = self.expand_segments(&placeholder.key, stack);

        let fail = |reason: UnresolvedReason| Failure {
            placeholder: syntax.render(&key_text, placeholder.default.as_deref()),
            reason,
        };

        if let Some(first) = key_failures.into_iter().next() {
            return Err(fail(first.reason));
        }

        let key = normalize_key(&key_text.value, self.case_sensitive).into_owned();

        // The chain starts where the cycle is entered
        if let Some(pos) = stack.iter().position(|k| *k == key) {
            let mut chain = stack[pos..].to_vec();
            chain.push(key);
            return Err(fail(UnresolvedReason::Circular { chain }));
        }

        match table.get(&key) {
            Some(property) if !property.resolvable => {
                Ok(Text::verbatim(property.raw_value.as_str()))
            }
            Some(property) => self
                .expand_key(&key, &property.raw_value, stack)
                .map_err(fail),
            None => match &placeholder.default {
                Some(default) => {
                    let (value, failures) = self.expand_segments(default, stack);
                    match failures.into_iter().next() {
                        Some(first) => Err(fail(first.reason)),
                        None => Ok(value),
                    }
                }
                None => Err(fail(UnresolvedReason::Missing { key })),
            },
        }
    }
}
