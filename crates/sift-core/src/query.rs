//! Interactive filtering over group nodes.
//!
//! A [`NodeQuery`] matches the display values of group nodes, so a filter
//! pane can narrow "all artists" down as the user types. Supported forms:
//!
//! - Substring matching (case-insensitive, the default)
//! - Wildcard patterns (`*`, `?`)
//! - Regular expressions (`r/.../`)
//! - Exact values
//! - Restrictions by column and member count

use crate::error::{Result, SiftError};
use crate::node::GroupNode;
use crate::types::Column;
use regex::Regex;
use std::sync::Arc;

/// A compiled node query ready for matching.
#[derive(Clone)]
pub struct NodeQuery {
    matcher: Arc<dyn Matcher>,
    filters: Vec<NodeFilter>,
}

impl std::fmt::Debug for NodeQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeQuery")
            .field("filters", &self.filters)
            .finish()
    }
}

impl NodeQuery {
    /// Case-insensitive substring query.
    ///
    /// # Example
    /// ```
    /// use sift_core::NodeQuery;
    /// let query = NodeQuery::substring("simone");
    /// ```
    pub fn substring(pattern: &str) -> Self {
        NodeQuery {
            matcher: Arc::new(SubstringMatcher::new(pattern)),
            filters: Vec::new(),
        }
    }

    /// Wildcard query; `*` matches any run of characters, `?` exactly one.
    pub fn wildcard(pattern: &str) -> Result<Self> {
        Ok(NodeQuery {
            matcher: Arc::new(WildcardMatcher::new(pattern)?),
            filters: Vec::new(),
        })
    }

    /// Case-insensitive regular-expression query.
    pub fn regex(pattern: &str) -> Result<Self> {
        let regex =
            Regex::new(&format!("(?i){}", pattern)).map_err(|e| SiftError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;
        Ok(NodeQuery {
            matcher: Arc::new(RegexMatcher { regex }),
            filters: Vec::new(),
        })
    }

    /// Case-insensitive exact-value query.
    pub fn exact(value: &str) -> Self {
        NodeQuery {
            matcher: Arc::new(ExactMatcher::new(value)),
            filters: Vec::new(),
        }
    }

    /// Add a filter to the query.
    pub fn with_filter(mut self, filter: NodeFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Check whether a node matches.
    ///
    /// The pattern is tried against every visible column unless a
    /// [`NodeFilter::Column`] restricts it to one.
    pub fn matches(&self, node: &GroupNode, columns: &[Column]) -> bool {
        if !self.filters.iter().all(|f| f.accepts(node)) {
            return false;
        }

        let restriction = self.filters.iter().find_map(|f| match f {
            NodeFilter::Column(field) => Some(field.as_str()),
            _ => None,
        });

        match restriction {
            Some(field) => columns
                .iter()
                .position(|c| c.field.eq_ignore_ascii_case(field))
                .map(|i| self.matcher.matches(node.column(i)))
                .unwrap_or(false),
            None => (0..node.display_columns().len().max(1))
                .any(|i| self.matcher.matches(node.column(i))),
        }
    }

    /// True if this query keeps every node
    pub fn matches_all(&self) -> bool {
        self.matcher.matches_all() && self.filters.is_empty()
    }
}

/// Filters narrowing which nodes a pattern is tried against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeFilter {
    /// Match the pattern only against this column field
    Column(String),

    /// Only nodes with at least this many members
    MinMembers(usize),

    /// Only nodes with at most this many members
    MaxMembers(usize),
}

impl NodeFilter {
    fn accepts(&self, node: &GroupNode) -> bool {
        match self {
            NodeFilter::Column(_) => true,
            NodeFilter::MinMembers(n) => node.member_count() >= *n,
            NodeFilter::MaxMembers(n) => node.member_count() <= *n,
        }
    }
}

// === Matcher Implementations ===

trait Matcher: Send + Sync {
    fn matches(&self, text: &str) -> bool;

    fn matches_all(&self) -> bool {
        false
    }
}

struct SubstringMatcher {
    pattern_lower: String,
}

impl SubstringMatcher {
    fn new(pattern: &str) -> Self {
        SubstringMatcher {
            pattern_lower: pattern.to_lowercase(),
        }
    }
}

impl Matcher for SubstringMatcher {
    fn matches(&self, text: &str) -> bool {
        if self.pattern_lower.is_empty() {
            return true;
        }
        text.to_lowercase().contains(&self.pattern_lower)
    }

    fn matches_all(&self) -> bool {
        self.pattern_lower.is_empty()
    }
}

struct ExactMatcher {
    pattern_lower: String,
}

impl ExactMatcher {
    fn new(pattern: &str) -> Self {
        ExactMatcher {
            pattern_lower: pattern.to_lowercase(),
        }
    }
}

impl Matcher for ExactMatcher {
    fn matches(&self, text: &str) -> bool {
        text.to_lowercase() == self.pattern_lower
    }
}

/// Glob pattern compiled to an anchored regex.
struct WildcardMatcher {
    regex: Regex,
}

impl WildcardMatcher {
    fn new(pattern: &str) -> Result<Self> {
        let mut regex_pattern = String::with_capacity(pattern.len() * 2 + 6);
        regex_pattern.push_str("(?i)^");

        for c in pattern.chars() {
            match c {
                '*' => regex_pattern.push_str(".*"),
                '?' => regex_pattern.push('.'),
                _ => regex_pattern.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
            }
        }

        regex_pattern.push('$');

        let regex = Regex::new(&regex_pattern).map_err(|e| SiftError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        Ok(WildcardMatcher { regex })
    }
}

impl Matcher for WildcardMatcher {
    fn matches(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

struct RegexMatcher {
    regex: Regex,
}

impl Matcher for RegexMatcher {
    fn matches(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

// === Query Parsing ===

/// Parse a filter string into a [`NodeQuery`].
///
/// # Query Syntax
///
/// - `simone` - nodes with a value containing "simone"
/// - `The *` - wildcard pattern over whole values
/// - `r/^19[89]\d$/` - regular expression
/// - `=Jazz` - exact value
/// - `col:genre` - only match against the genre column
/// - `min:3` / `max:10` - member count bounds
pub fn parse_query(input: &str) -> Result<NodeQuery> {
    let input = input.trim();

    if input.is_empty() {
        return Ok(NodeQuery::substring(""));
    }

    let mut filters = Vec::new();
    let mut pattern_parts = Vec::new();

    for part in input.split_whitespace() {
        if let Some(field) = part.strip_prefix("col:") {
            if !field.is_empty() {
                filters.push(NodeFilter::Column(field.to_string()));
            }
        } else if let Some(n) = part.strip_prefix("min:").and_then(|n| n.parse().ok()) {
            filters.push(NodeFilter::MinMembers(n));
        } else if let Some(n) = part.strip_prefix("max:").and_then(|n| n.parse().ok()) {
            filters.push(NodeFilter::MaxMembers(n));
        } else {
            pattern_parts.push(part);
        }
    }

    let pattern = pattern_parts.join(" ");

    let mut query = if pattern.starts_with("r/") && pattern.ends_with('/') && pattern.len() > 3 {
        NodeQuery::regex(&pattern[2..pattern.len() - 1])?
    } else if let Some(exact) = pattern.strip_prefix('=') {
        NodeQuery::exact(exact)
    } else if pattern.contains('*') || pattern.contains('?') {
        NodeQuery::wildcard(&pattern)?
    } else {
        NodeQuery::substring(&pattern)
    };

    for filter in filters {
        query = query.with_filter(filter);
    }

    Ok(query)
}
