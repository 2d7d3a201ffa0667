use anyhow::{Result, bail};
use tracing::debug;

use crate::driver::Browser;
use crate::kernel::ast::Action;
use crate::kernel::condition;
use crate::kernel::config::Config;
use crate::kernel::context::Context;
use crate::kernel::packet_catalog::{ActionSpec, Handler, RegistryBuilder, Reply};

/// Picks the branch to run. Nothing is executed here; condition errors are
/// returned to the engine untouched.
pub fn handle(_cfg: &Config, _browser: &mut dyn Browser, action: &Action, ctx: &mut Context) -> Result<Reply> {
    let Action::Conditional {
        condition,
        then_actions,
        elif_branches,
        else_actions,
    } = action
    else {
        bail!("@if handler called with {}", action);
    };

    if condition::evaluate(condition, ctx)? {
        debug!("'{condition}' holds, taking the @if branch");
        return Ok(Reply::Actions(then_actions.clone()));
    }
    for branch in elif_branches {
        if condition::evaluate(&branch.condition, ctx)? {
            debug!("'{}' holds, taking that @elif branch", branch.condition);
            return Ok(Reply::Actions(branch.actions.clone()));
        }
    }
    if else_actions.is_empty() {
        return Ok(Reply::Nothing);
    }
    Ok(Reply::Actions(else_actions.clone()))
}

pub fn register(b: &mut RegistryBuilder) -> Result<()> {
    b.register(ActionSpec {
        names: &["if"],
        handler: Handler::Contextual(handle),
        syntax: "@if: <condition> { ... } [@elif: <condition> { ... }] [@else { ... }]",
        summary: "Run the first block whose condition holds against the script variables.",
        example: "@var: count=5\n@if: count > 3 {\n    @log: \"big\"\n}\n@else {\n    @log: \"small\"\n}",
    })?;
    Ok(())
}
