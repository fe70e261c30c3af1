//! The ordered command registry.
//!
//! Commands are kept in registration order; routing walks them front to back
//! and the first match wins. The sequence lives behind a read-write lock as an
//! `Arc<Vec<_>>`: readers clone the `Arc` and iterate a snapshot without
//! holding the lock, writers copy-on-write. A router therefore sees either the
//! sequence before an append or after it, never a half-appended one.

use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::command::{CommandArgs, CommandDefinition};
use crate::context::DispatchContext;
use crate::error::{RegistryError, RegistryResult};
use crate::handler::IntoOutcome;

/// An immutable view of the registry at one point in time.
pub type CommandSnapshot = Arc<Vec<Arc<CommandDefinition>>>;

/// Ordered collection of command definitions.
#[derive(Default)]
pub struct CommandRegistry {
    commands: RwLock<CommandSnapshot>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a definition.
    ///
    /// Fails only if the definition's matcher is empty.
    pub fn register(&self, definition: CommandDefinition) -> RegistryResult<()> {
        if definition.matcher().is_empty() {
            return Err(RegistryError::EmptyMatcher);
        }

        let usage = definition.usage();
        let mut commands = self.commands.write();
        Arc::make_mut(&mut *commands).push(Arc::new(definition));
        debug!(command = %usage, position = commands.len() - 1, "Registered command");
        Ok(())
    }

    /// Parses `spec` and registers `handler` under it.
    ///
    /// ```rust,ignore
    /// registry.command("ping", |_ctx, _args| async { "pong" })?;
    /// registry.command("echo *", |_ctx, args| async move {
    ///     args.rest().unwrap_or_default().to_string()
    /// })?;
    /// ```
    pub fn command<F, Fut>(&self, spec: &str, handler: F) -> RegistryResult<()>
    where
        F: Fn(DispatchContext, CommandArgs) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoOutcome,
    {
        self.register(CommandDefinition::parse(spec, handler)?)
    }

    /// Returns the current sequence without copying it.
    pub fn snapshot(&self) -> CommandSnapshot {
        Arc::clone(&self.commands.read())
    }

    /// Returns all definitions in registration order.
    pub fn all(&self) -> Vec<Arc<CommandDefinition>> {
        self.snapshot().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.commands.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.read().is_empty()
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("command_count", &self.len())
            .finish()
    }
}
