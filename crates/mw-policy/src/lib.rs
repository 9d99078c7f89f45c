//! # mw-policy
//!
//! Rule evaluation for Mod Warden.
//!
//! This crate turns inbound events into inspectable content, compiles and
//! tests rule patterns, selects the matching rule for an event, loads YAML
//! rule files and renders member notification templates. Everything here is
//! pure; side effects live in `mw-actions`.

pub mod config;
pub mod engine;
pub mod extract;
pub mod patterns;
pub mod templates;

pub use config::{load_rule_file, parse_rule_file, ConfigError, RuleConfig, RuleFile};
pub use engine::{evaluate, validate_rule, CompiledRule, RuleEngine, RuleMatch};
pub use extract::extract;
pub use patterns::{
    compile_pattern, test_pattern_defs, test_patterns, validate_pattern, CompiledPattern,
    PatternFlags, PatternMatch,
};
pub use templates::{
    format_duration, render, resolve, ResolvedNotification, TemplateContext, FALLBACK_TEMPLATE,
    PLACEHOLDERS,
};
