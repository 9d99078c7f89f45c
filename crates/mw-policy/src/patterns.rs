//! Pattern compilation, validation and matching.
//!
//! Patterns are validated when a rule is saved. At match time an invalid
//! pattern is simply treated as never matching; matching itself never fails.

use mw_core::{MatchMode, PatternDef, ValidationError};
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use tracing::warn;

/// Upper bound on the compiled size of a single pattern.
const PATTERN_SIZE_LIMIT: usize = 1 << 20;

/// Regex options derived from a pattern's flag string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternFlags {
    pub case_insensitive: bool,
    pub multi_line: bool,
    pub dot_matches_new_line: bool,
    pub ignore_whitespace: bool,
    pub unicode: bool,
}

impl Default for PatternFlags {
    fn default() -> Self {
        Self {
            case_insensitive: false,
            multi_line: false,
            dot_matches_new_line: false,
            ignore_whitespace: false,
            unicode: true,
        }
    }
}

impl PatternFlags {
    /// Parses a flag string. `g` and `y` are accepted and ignored.
    pub fn parse(def: &PatternDef) -> Result<Self, ValidationError> {
        let mut flags = PatternFlags::default();
        for flag in def.flags.as_deref().unwrap_or_default().chars() {
            match flag {
                'i' => flags.case_insensitive = true,
                'm' => flags.multi_line = true,
                's' => flags.dot_matches_new_line = true,
                'x' => flags.ignore_whitespace = true,
                'u' => flags.unicode = true,
                'g' | 'y' => {}
                other => {
                    return Err(ValidationError::InvalidFlag {
                        pattern: def.pattern.clone(),
                        flag: other,
                    })
                }
            }
        }
        Ok(flags)
    }
}

/// Compiles a pattern definition into a regex.
pub fn compile_pattern(def: &PatternDef) -> Result<Regex, ValidationError> {
    if def.pattern.is_empty() {
        return Err(ValidationError::InvalidPattern {
            pattern: def.pattern.clone(),
            message: "pattern must not be empty".to_string(),
        });
    }

    let flags = PatternFlags::parse(def)?;
    RegexBuilder::new(&def.pattern)
        .case_insensitive(flags.case_insensitive)
        .multi_line(flags.multi_line)
        .dot_matches_new_line(flags.dot_matches_new_line)
        .ignore_whitespace(flags.ignore_whitespace)
        .unicode(flags.unicode)
        .size_limit(PATTERN_SIZE_LIMIT)
        .build()
        .map_err(|e| ValidationError::InvalidPattern {
            pattern: def.pattern.clone(),
            message: e.to_string(),
        })
}

/// Validates a pattern definition without keeping the compiled regex.
pub fn validate_pattern(def: &PatternDef) -> Result<(), ValidationError> {
    compile_pattern(def).map(|_| ())
}

/// A pattern with its regex built up front. `regex` is `None` for an invalid pattern.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub def: PatternDef,
    regex: Option<Regex>,
}

impl CompiledPattern {
    /// Compiles `def`, logging and degrading to never-matching if it is invalid.
    pub fn compile(def: &PatternDef) -> Self {
        let regex = match compile_pattern(def) {
            Ok(regex) => Some(regex),
            Err(e) => {
                warn!(pattern = %def.display(), error = %e, "Invalid pattern will never match");
                None
            }
        };
        Self {
            def: def.clone(),
            regex,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.regex.is_some()
    }

    /// First match in `content`, if any.
    pub fn find<'c>(&self, content: &'c str) -> Option<&'c str> {
        self.regex
            .as_ref()
            .and_then(|re| re.find(content))
            .map(|m| m.as_str())
    }

    pub fn is_match(&self, content: &str) -> bool {
        self.regex
            .as_ref()
            .map(|re| re.is_match(content))
            .unwrap_or(false)
    }
}

/// The pattern that satisfied a test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatternMatch {
    /// Position of the pattern in the rule's list.
    pub index: usize,
    pub pattern: PatternDef,
    /// Text the pattern matched.
    pub matched_text: String,
}

/// Tests compiled patterns against content.
///
/// `Any` returns the first pattern that matches. `All` requires every pattern to
/// match somewhere and reports the first one in declaration order. Empty content
/// and an empty pattern list never match.
pub fn test_patterns(
    patterns: &[CompiledPattern],
    content: &str,
    mode: MatchMode,
) -> Option<PatternMatch> {
    if content.is_empty() || patterns.is_empty() {
        return None;
    }

    match mode {
        MatchMode::Any => patterns.iter().enumerate().find_map(|(index, p)| {
            p.find(content).map(|text| PatternMatch {
                index,
                pattern: p.def.clone(),
                matched_text: text.to_string(),
            })
        }),
        MatchMode::All => {
            let mut first = None;
            for (index, p) in patterns.iter().enumerate() {
                let text = p.find(content)?;
                if first.is_none() {
                    first = Some(PatternMatch {
                        index,
                        pattern: p.def.clone(),
                        matched_text: text.to_string(),
                    });
                }
            }
            first
        }
    }
}

/// Compiles and tests raw definitions in one go. Used by the dry-run tester.
pub fn test_pattern_defs(
    defs: &[PatternDef],
    content: &str,
    mode: MatchMode,
) -> Option<PatternMatch> {
    let compiled: Vec<CompiledPattern> = defs.iter().map(CompiledPattern::compile).collect();
    test_patterns(&compiled, content, mode)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compiled(defs: &[PatternDef]) -> Vec<CompiledPattern> {
        defs.iter().map(CompiledPattern::compile).collect()
    }

    #[test]
    fn test_any_matches_first_hit() {
        let patterns = compiled(&[PatternDef::new("foo"), PatternDef::new("bar")]);
        let m = test_patterns(&patterns, "a bar here", MatchMode::Any).unwrap();
        assert_eq!(m.index, 1);
        assert_eq!(m.matched_text, "bar");
    }

    #[test]
    fn test_all_requires_every_pattern() {
        let patterns = compiled(&[PatternDef::new("foo"), PatternDef::new("bar")]);
        assert!(test_patterns(&patterns, "foo only", MatchMode::All).is_none());

        let m = test_patterns(&patterns, "bar then foo", MatchMode::All).unwrap();
        assert_eq!(m.index, 0);
        assert_eq!(m.matched_text, "foo");
    }

    #[test]
    fn test_empty_content_never_matches() {
        let patterns = compiled(&[PatternDef::new(".*")]);
        assert!(test_patterns(&patterns, "", MatchMode::Any).is_none());
        assert!(test_patterns(&patterns, "", MatchMode::All).is_none());
    }

    #[test]
    fn test_flags() {
        let ci = compiled(&[PatternDef::new("spam").with_flags("gi")]);
        assert!(test_patterns(&ci, "SPAM", MatchMode::Any).is_some());

        let cs = compiled(&[PatternDef::new("spam")]);
        assert!(test_patterns(&cs, "SPAM", MatchMode::Any).is_none());

        let multiline = compiled(&[PatternDef::new("^b$").with_flags("m")]);
        assert!(test_patterns(&multiline, "a\nb\nc", MatchMode::Any).is_some());

        let dotall = compiled(&[PatternDef::new("a.b").with_flags("s")]);
        assert!(test_patterns(&dotall, "a\nb", MatchMode::Any).is_some());
    }

    #[test]
    fn test_unknown_flag_rejected() {
        let result = validate_pattern(&PatternDef::new("x").with_flags("iq"));
        assert_eq!(
            result,
            Err(ValidationError::InvalidFlag {
                pattern: "x".to_string(),
                flag: 'q',
            })
        );
    }

    #[test]
    fn test_invalid_pattern_never_matches() {
        let bad = CompiledPattern::compile(&PatternDef::new("[unclosed"));
        assert!(!bad.is_valid());
        assert!(!bad.is_match("[unclosed"));
        assert!(matches!(
            validate_pattern(&PatternDef::new("[unclosed")),
            Err(ValidationError::InvalidPattern { .. })
        ));

        // In "any" mode a broken pattern does not prevent a valid one from matching.
        let patterns = vec![bad, CompiledPattern::compile(&PatternDef::new("ok"))];
        assert!(test_patterns(&patterns, "ok", MatchMode::Any).is_some());
        assert!(test_patterns(&patterns, "ok", MatchMode::All).is_none());
    }

    #[test]
    fn test_empty_pattern_rejected() {
        assert!(validate_pattern(&PatternDef::new("")).is_err());
    }
}
