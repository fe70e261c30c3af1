//! Command definitions and the arguments handed to their handlers.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::str::FromStr;

use crate::context::DispatchContext;
use crate::error::RegistryResult;
use crate::handler::{BoxedHandler, IntoOutcome, into_handler};
use crate::matcher::CommandMatcher;
use crate::split::shell_split;

// ============================================================================
// CommandArgs
// ============================================================================

/// Arguments extracted by a matcher.
///
/// Exact matches yield empty arguments. Prefix matches carry the text after
/// the prefix as [`rest`](Self::rest), also split shell-style into
/// [`positional`](Self::positional) tokens. Pattern matches carry their named
/// captures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandArgs {
    named: HashMap<String, String>,
    rest: Option<String>,
    positional: Vec<String>,
}

impl CommandArgs {
    pub(crate) fn with_rest(rest: &str, positional: Vec<String>) -> Self {
        Self {
            rest: Some(rest.to_string()),
            positional,
            ..Default::default()
        }
    }

    pub(crate) fn with_named(named: HashMap<String, String>) -> Self {
        Self {
            named,
            ..Default::default()
        }
    }

    /// Arguments for a fallback handler: the whole text is the rest.
    pub fn from_text(text: &str) -> Self {
        Self::with_rest(text, shell_split(text))
    }

    /// Returns a named capture.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.named.get(name).map(String::as_str)
    }

    /// Returns a named capture or `default` when absent.
    pub fn get_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.get(name).unwrap_or(default)
    }

    /// Parses a named capture.
    pub fn parse<T: FromStr>(&self, name: &str) -> Option<T> {
        self.get(name)?.parse().ok()
    }

    /// Text following a prefix match.
    pub fn rest(&self) -> Option<&str> {
        self.rest.as_deref()
    }

    /// Shell-split tokens of [`rest`](Self::rest).
    pub fn positional(&self) -> &[String] {
        &self.positional
    }

    /// Returns `true` when nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.named.is_empty() && self.rest.is_none() && self.positional.is_empty()
    }
}

// ============================================================================
// CommandDefinition
// ============================================================================

/// A registered command: a matcher, its handler, and an optional description.
#[derive(Clone)]
pub struct CommandDefinition {
    matcher: CommandMatcher,
    handler: BoxedHandler,
    description: Option<String>,
}

impl CommandDefinition {
    /// Creates a definition from a matcher and an async handler function.
    ///
    /// ```rust,ignore
    /// let ping = CommandDefinition::new(CommandMatcher::exact("ping"), |ctx, _args| async move {
    ///     "pong"
    /// });
    /// ```
    pub fn new<F, Fut>(matcher: CommandMatcher, handler: F) -> Self
    where
        F: Fn(DispatchContext, CommandArgs) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoOutcome,
    {
        Self::from_boxed(matcher, into_handler(handler))
    }

    /// Parses `spec` with [`CommandMatcher::parse`] and wraps the handler.
    pub fn parse<F, Fut>(spec: &str, handler: F) -> RegistryResult<Self>
    where
        F: Fn(DispatchContext, CommandArgs) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoOutcome,
    {
        Ok(Self::new(CommandMatcher::parse(spec)?, handler))
    }

    /// Creates a definition from a pre-built handler.
    pub fn from_boxed(matcher: CommandMatcher, handler: BoxedHandler) -> Self {
        Self {
            matcher,
            handler,
            description: None,
        }
    }

    /// Sets the description shown in help output.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn matcher(&self) -> &CommandMatcher {
        &self.matcher
    }

    pub fn handler(&self) -> &BoxedHandler {
        &self.handler
    }

    pub fn get_description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Shorthand for `self.matcher().usage()`.
    pub fn usage(&self) -> String {
        self.matcher.usage()
    }
}

impl fmt::Debug for CommandDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDefinition")
            .field("matcher", &self.matcher)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}
