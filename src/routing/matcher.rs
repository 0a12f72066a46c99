//! Rule table evaluation.
//!
//! # Responsibilities
//! - Walk an ordered rule table against a cursor
//! - Select the first rule whose pattern matches, consuming its segments
//! - Let a rule veto a structural match before the cursor is touched
//!
//! # Design Decisions
//! - First match wins; no backtracking once a rule is chosen
//! - Failures of the chosen rule are the caller's business (fail-fast,
//!   never fail-over to the next rule)
//! - Vetoed rules leave no trace in the cursor's parameters

use std::fmt;

use crate::routing::cursor::RequestCursor;
use crate::routing::params::Params;
use crate::routing::pattern::Pattern;

/// Anything that can sit in a rule table.
pub trait Rule: fmt::Debug {
    fn pattern(&self) -> &Pattern;

    /// Final say over a structural match. Defaults to accepting.
    fn accepts(&self, _bound: &Params) -> bool {
        true
    }
}

impl Rule for Pattern {
    fn pattern(&self) -> &Pattern {
        self
    }
}

/// The rule chosen for a request, with the variables it bound.
#[derive(Debug)]
pub struct RuleMatch<'r, R> {
    pub rule: &'r R,
    pub params: Params,
}

/// Find the first matching rule and consume its segments.
pub fn first_match<'r, R, I>(rules: I, cursor: &mut RequestCursor) -> Option<RuleMatch<'r, R>>
where
    R: Rule + 'r,
    I: IntoIterator<Item = &'r R>,
{
    for rule in rules {
        let pattern = rule.pattern();
        let Some(bound) = cursor.bind(pattern) else {
            tracing::trace!(rule = %pattern, remaining = %cursor.remaining(), "Rule did not match");
            continue;
        };
        if !rule.accepts(&bound) {
            tracing::trace!(rule = %pattern, "Rule matched but was rejected");
            continue;
        }
        if !pattern.is_empty() {
            cursor.commit(pattern, &bound, true);
        }
        tracing::debug!(rule = %pattern, remaining = %cursor.remaining(), "Rule matched");
        return Some(RuleMatch { rule, params: bound });
    }
    None
}

/// Like [`first_match`] but leaves the cursor untouched.
pub fn probe<'r, R, I>(rules: I, cursor: &RequestCursor) -> Option<RuleMatch<'r, R>>
where
    R: Rule + 'r,
    I: IntoIterator<Item = &'r R>,
{
    rules.into_iter().find_map(|rule| {
        cursor
            .bind(rule.pattern())
            .filter(|bound| rule.accepts(bound))
            .map(|params| RuleMatch { rule, params })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;

    #[derive(Debug)]
    struct OnlyId(Pattern, &'static str);

    impl Rule for OnlyId {
        fn pattern(&self) -> &Pattern {
            &self.0
        }

        fn accepts(&self, bound: &Params) -> bool {
            bound.get("ID") == Some(self.1)
        }
    }

    fn rules(list: &[&str]) -> Vec<Pattern> {
        list.iter().map(|r| Pattern::parse(r).unwrap()).collect()
    }

    #[test]
    fn test_first_match_wins() {
        let table = rules(&["admin/$Action", "$Action", ""]);
        let mut cursor = RequestCursor::new(Method::GET, ["admin", "edit"], None);
        let m = first_match(&table, &mut cursor).unwrap();
        assert_eq!(m.rule.as_str(), "admin/$Action");
        assert_eq!(m.params.get("Action"), Some("edit"));
        assert!(cursor.all_parsed());
    }

    #[test]
    fn test_no_match_leaves_cursor() {
        let table = rules(&["admin/$Action!"]);
        let mut cursor = RequestCursor::new(Method::GET, ["home"], None);
        assert!(first_match(&table, &mut cursor).is_none());
        assert_eq!(cursor.remaining(), "home");
        assert!(cursor.all_params().is_empty());
    }

    #[test]
    fn test_rejected_rule_falls_through() {
        let table = vec![
            OnlyId(Pattern::parse("item/$ID").unwrap(), "1"),
            OnlyId(Pattern::parse("item/$ID").unwrap(), "2"),
        ];
        let mut cursor = RequestCursor::new(Method::GET, ["item", "2"], None);
        let m = first_match(&table, &mut cursor).unwrap();
        assert!(std::ptr::eq(m.rule, &table[1]));
        assert_eq!(cursor.param("ID"), Some("2"));
    }

    #[test]
    fn test_probe_does_not_consume() {
        let table = rules(&["$Action"]);
        let cursor = RequestCursor::new(Method::GET, ["view"], None);
        let m = probe(&table, &cursor).unwrap();
        assert_eq!(m.params.get("Action"), Some("view"));
        assert_eq!(cursor.remaining(), "view");
    }
}
