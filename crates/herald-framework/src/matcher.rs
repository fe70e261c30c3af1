//! Command matchers.
//!
//! A [`CommandMatcher`] tests message text and, on success, extracts the
//! arguments the command's handler receives.
//!
//! # Spec Syntax
//!
//! [`CommandMatcher::parse`] turns a short spec into a matcher:
//!
//! ```text
//! "ping"              exact text
//! "deploy *"          prefix; everything after "deploy" is the rest
//! "echo <word>"       pattern; <word> captures one whitespace-free token
//! "add <a> to <b>"    pattern with several captures
//! ```
//!
//! Exact and prefix matching compare word by word, so runs of whitespace in
//! the incoming text are treated like a single space.

use std::fmt;

use regex::Regex;

use crate::command::CommandArgs;
use crate::error::{RegistryError, RegistryResult};
use crate::split::shell_split;

/// How a command recognises the text addressed to it.
#[derive(Clone)]
pub enum CommandMatcher {
    /// The text's words must equal the literal's words.
    Exact(String),
    /// The text must start with the prefix's words; what follows is the rest.
    Prefix(String),
    /// A regular expression; named groups become arguments.
    Pattern {
        regex: Regex,
        /// Human-readable form shown in help output.
        usage: String,
    },
}

impl CommandMatcher {
    /// Exact-text matcher.
    pub fn exact(text: impl Into<String>) -> Self {
        Self::Exact(normalize(&text.into()))
    }

    /// Prefix matcher.
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self::Prefix(normalize(&prefix.into()))
    }

    /// Matcher from a compiled regular expression.
    pub fn regex(regex: Regex) -> Self {
        let usage = regex.as_str().to_string();
        Self::Pattern { regex, usage }
    }

    /// Parses a spec string; see the module docs for the syntax.
    pub fn parse(spec: &str) -> RegistryResult<Self> {
        let spec = spec.trim();

        if let Some(prefix) = spec.strip_suffix(" *") {
            if let Some(name) = prefix.split_whitespace().find_map(placeholder_name) {
                return Err(RegistryError::InvalidPattern {
                    spec: spec.to_string(),
                    reason: format!("placeholder '<{name}>' cannot be used in a prefix command"),
                });
            }
            return Ok(Self::prefix(prefix));
        }

        let words: Vec<&str> = spec.split_whitespace().collect();
        if words.iter().any(|w| placeholder_name(w).is_some()) {
            return compile_pattern(spec, &words);
        }

        Ok(Self::Exact(words.join(" ")))
    }

    /// Returns `true` if there is nothing to match against.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Exact(text) | Self::Prefix(text) => text.is_empty(),
            Self::Pattern { regex, .. } => regex.as_str().is_empty(),
        }
    }

    /// The form shown to users in help output.
    pub fn usage(&self) -> String {
        match self {
            Self::Exact(text) => text.clone(),
            Self::Prefix(prefix) => format!("{prefix} *"),
            Self::Pattern { usage, .. } => usage.clone(),
        }
    }

    /// Tests `text`; returns the extracted arguments on a match.
    pub fn matches(&self, text: &str) -> Option<CommandArgs> {
        let text = text.trim();

        match self {
            Self::Exact(literal) => text
                .split_whitespace()
                .eq(literal.split_whitespace())
                .then(CommandArgs::default),
            Self::Prefix(prefix) => {
                let rest = strip_words(text, prefix)?.trim();
                if rest.is_empty() {
                    return Some(CommandArgs::default());
                }
                Some(CommandArgs::with_rest(rest, shell_split(rest)))
            }
            Self::Pattern { regex, .. } => {
                let captures = regex.captures(text)?;
                let named = regex
                    .capture_names()
                    .flatten()
                    .filter_map(|name| {
                        captures
                            .name(name)
                            .map(|m| (name.to_string(), m.as_str().to_string()))
                    })
                    .collect();
                Some(CommandArgs::with_named(named))
            }
        }
    }
}

impl fmt::Debug for CommandMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(text) => f.debug_tuple("Exact").field(text).finish(),
            Self::Prefix(prefix) => f.debug_tuple("Prefix").field(prefix).finish(),
            Self::Pattern { usage, .. } => f.debug_tuple("Pattern").field(usage).finish(),
        }
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strips the leading `words` from `text`, each ending on a word boundary.
fn strip_words<'a>(text: &'a str, words: &str) -> Option<&'a str> {
    let mut rest = text;
    for word in words.split_whitespace() {
        rest = rest.trim_start().strip_prefix(word)?;
        if !(rest.is_empty() || rest.starts_with(char::is_whitespace)) {
            return None;
        }
    }
    Some(rest)
}

/// Returns the capture name if `word` is a `<name>` placeholder.
fn placeholder_name(word: &str) -> Option<&str> {
    word.strip_prefix('<')?
        .strip_suffix('>')
        .filter(|name| !name.is_empty())
}

fn compile_pattern(spec: &str, words: &[&str]) -> RegistryResult<CommandMatcher> {
    let mut parts = Vec::with_capacity(words.len());

    for word in words {
        match placeholder_name(word) {
            Some(name) => {
                let valid = name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                    && !name.starts_with(|c: char| c.is_ascii_digit());
                if !valid {
                    return Err(RegistryError::InvalidPattern {
                        spec: spec.to_string(),
                        reason: format!("'{name}' is not a valid argument name"),
                    });
                }
                parts.push(format!(r"(?P<{name}>\S+)"));
            }
            None => parts.push(regex::escape(word)),
        }
    }

    let source = format!(r"^{}$", parts.join(r"\s+"));
    let regex = Regex::new(&source).map_err(|e| RegistryError::InvalidPattern {
        spec: spec.to_string(),
        reason: e.to_string(),
    })?;

    Ok(CommandMatcher::Pattern {
        regex,
        usage: words.join(" "),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kinds() {
        assert!(matches!(CommandMatcher::parse("ping").unwrap(), CommandMatcher::Exact(t) if t == "ping"));
        assert!(matches!(CommandMatcher::parse("ping *").unwrap(), CommandMatcher::Prefix(p) if p == "ping"));
        assert!(matches!(
            CommandMatcher::parse("echo <word>").unwrap(),
            CommandMatcher::Pattern { .. }
        ));
    }

    #[test]
    fn test_exact_requires_whole_text() {
        let m = CommandMatcher::exact("hello");
        assert!(m.matches("hello").unwrap().is_empty());
        assert!(m.matches("  hello  ").is_some());
        assert!(m.matches("hello world").is_none());
        assert!(m.matches("Hello").is_none());
    }

    #[test]
    fn test_prefix_captures_rest() {
        let m = CommandMatcher::parse("hello *").unwrap();

        let args = m.matches("hello world  and more").unwrap();
        assert_eq!(args.rest(), Some("world  and more"));
        assert_eq!(args.positional(), ["world", "and", "more"]);

        let bare = m.matches("hello").unwrap();
        assert!(bare.is_empty());
        assert!(bare.rest().is_none());
    }

    #[test]
    fn test_prefix_needs_word_boundary() {
        let m = CommandMatcher::prefix("ping");
        assert!(m.matches("pingpong").is_none());
        assert!(m.matches("ping pong").is_some());
    }

    #[test]
    fn test_inner_whitespace_is_collapsed() {
        let exact = CommandMatcher::parse("ping  pong").unwrap();
        assert!(exact.matches("ping pong").is_some());
        assert!(exact.matches("ping \t  pong").is_some());
        assert!(exact.matches("ping pongs").is_none());

        let prefix = CommandMatcher::parse("deploy   now *").unwrap();
        let args = prefix.matches("deploy    now   prod eu").unwrap();
        assert_eq!(args.rest(), Some("prod eu"));
        assert!(prefix.matches("deploy nowhere").is_none());
        assert!(prefix.matches("deploy").is_none());
    }

    #[test]
    fn test_placeholder_in_prefix_is_rejected() {
        assert!(matches!(
            CommandMatcher::parse("deploy <env> *"),
            Err(RegistryError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_pattern_named_captures() {
        let m = CommandMatcher::parse("add <a> to <b>").unwrap();
        let args = m.matches("add   7 to  list").unwrap();
        assert_eq!(args.get("a"), Some("7"));
        assert_eq!(args.get("b"), Some("list"));
        assert_eq!(args.parse::<u32>("a"), Some(7));

        assert!(m.matches("add 7 into list").is_none());
        assert!(m.matches("add 7 to list now").is_none());
    }

    #[test]
    fn test_pattern_literals_are_escaped() {
        let m = CommandMatcher::parse("what? <thing>").unwrap();
        assert!(m.matches("what? this").is_some());
        assert!(m.matches("wha this").is_none());
    }

    #[test]
    fn test_invalid_placeholder_name() {
        assert!(matches!(
            CommandMatcher::parse("get <1st>"),
            Err(RegistryError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_regex_matcher() {
        let m = CommandMatcher::regex(Regex::new(r"^deploy (?P<env>prod|staging)$").unwrap());
        assert_eq!(m.matches("deploy prod").unwrap().get("env"), Some("prod"));
        assert!(m.matches("deploy dev").is_none());
    }

    #[test]
    fn test_usage_and_empty() {
        assert_eq!(CommandMatcher::parse("deploy *").unwrap().usage(), "deploy *");
        assert_eq!(CommandMatcher::parse("echo  <word>").unwrap().usage(), "echo <word>");
        assert!(CommandMatcher::parse("   ").unwrap().is_empty());
        assert!(CommandMatcher::prefix("").is_empty());
        assert!(!CommandMatcher::exact("x").is_empty());
    }
}
