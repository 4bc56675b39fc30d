//! rclone-style include/exclude filter rules.
//!
//! Rules are evaluated in order and the first match decides. When no rule
//! matches, the path is included unless the list contains at least one
//! include rule, in which case it is excluded.
//!
//! Pattern syntax is glob: `*` and `?` stay within one path component,
//! `**` crosses components, `[..]`/`[!..]` are (negated) classes, `{a,b}`
//! is an alternation and a backslash escapes the next character. A leading `/`
//! anchors the pattern at the root; otherwise it may match any run of whole
//! components, and a match on a directory covers everything below it.

use globset::{GlobBuilder, GlobMatcher};
use serde::{Deserialize, Serialize};

use crate::error::{OrchestrateError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterRule {
    Include(String),
    Exclude(String),
}

impl FilterRule {
    pub fn pattern(&self) -> &str {
        match self {
            FilterRule::Include(p) | FilterRule::Exclude(p) => p,
        }
    }

    /// The two command-line tokens for this rule.
    pub fn to_args(&self) -> [String; 2] {
        match self {
            FilterRule::Include(p) => ["--include".to_string(), p.clone()],
            FilterRule::Exclude(p) => ["--exclude".to_string(), p.clone()],
        }
    }
}

/// One compiled rule.
#[derive(Debug)]
struct CompiledRule {
    include: bool,
    anchored: bool,
    matcher: GlobMatcher,
}

impl CompiledRule {
    /// Try every run of whole components the rule may see: runs starting at
    /// the root only when anchored, and any prefix of the remaining path so
    /// that a matching directory covers its contents.
    fn matches(&self, components: &[&str]) -> bool {
        let starts = if self.anchored { 0..1 } else { 0..components.len() };
        starts.into_iter().any(|start| {
            (start + 1..=components.len())
                .any(|end| self.matcher.is_match(components[start..end].join("/")))
        })
    }
}

/// Compiled form of an ordered rule list plus an optional depth bound.
#[derive(Debug)]
pub struct FilterSet {
    rules: Vec<CompiledRule>,
    has_include: bool,
    max_depth: Option<usize>,
}

impl FilterSet {
    pub fn compile(rules: &[FilterRule], max_depth: Option<usize>) -> Result<Self> {
        let compiled = rules
            .iter()
            .map(|rule| compile_rule(rule.pattern(), matches!(rule, FilterRule::Include(_))))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            has_include: compiled.iter().any(|rule| rule.include),
            rules: compiled,
            max_depth,
        })
    }

    /// Whether a relative `/`-separated path passes the filters.
    pub fn allows(&self, path: &str) -> bool {
        let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
        if let Some(max) = self.max_depth {
            if components.len() > max {
                return false;
            }
        }
        for rule in &self.rules {
            if rule.matches(&components) {
                return rule.include;
            }
        }
        !self.has_include
    }
}

fn compile_rule(pattern: &str, include: bool) -> Result<CompiledRule> {
    let (anchored, body) = match pattern.strip_prefix('/') {
        Some(rest) => (true, rest),
        None => (false, pattern),
    };
    if body.is_empty() {
        return Err(OrchestrateError::invalid("empty filter pattern"));
    }

    let glob = GlobBuilder::new(body)
        .literal_separator(true)
        .backslash_escape(true)
        .build()
        .map_err(|e| OrchestrateError::invalid(format!("bad filter pattern '{pattern}': {e}")))?;
    Ok(CompiledRule {
        include,
        anchored,
        matcher: glob.compile_matcher(),
    })
}
