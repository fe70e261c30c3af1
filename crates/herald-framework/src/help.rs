//! Built-in `help` command.

use std::fmt::Write;
use std::sync::{Arc, Weak};

use crate::command::CommandDefinition;
use crate::matcher::CommandMatcher;
use crate::registry::CommandRegistry;

/// Text matched by the built-in help command.
pub const HELP_COMMAND: &str = "help";

/// Renders one line per command: its usage, then the description if any.
pub fn help_text(commands: &[Arc<CommandDefinition>]) -> String {
    if commands.is_empty() {
        return "No commands available.".to_string();
    }

    let mut out = String::new();
    for command in commands {
        if !out.is_empty() {
            out.push('\n');
        }
        let _ = write!(out, "• `{}`", command.usage());
        if let Some(description) = command.get_description() {
            let _ = write!(out, " - {description}");
        }
    }
    out
}

/// Builds a `help` command listing every command in `registry`.
///
/// The listing is rendered when the command runs, so commands registered
/// later are included. The registry is held weakly; once it is dropped the
/// command replies with nothing.
pub fn help_command(registry: &Arc<CommandRegistry>) -> CommandDefinition {
    let registry: Weak<CommandRegistry> = Arc::downgrade(registry);

    CommandDefinition::new(CommandMatcher::exact(HELP_COMMAND), move |_ctx, _args| {
        let text = registry.upgrade().map(|r| help_text(&r.snapshot()));
        async move { text }
    })
    .description("Show this list of commands")
}
