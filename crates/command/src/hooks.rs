//! Hook pipeline: run a phase's hooks in order, stopping at the first failure.

use std::path::Path;

use kat_rules::{HookCommand, HookPhase};
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::error::{CommandError, Result};
use crate::exec::{self, Invocation, Truncation};

/// Run `hooks` sequentially in `dir`.
///
/// Each hook gets `stdin` when given. The first failure is wrapped in
/// [`CommandError::Hook`] tagged with `phase`; cancellation passes through
/// unwrapped. Returns the combined truncation of all hooks.
pub async fn run_hooks(
    phase: HookPhase,
    hooks: &[HookCommand],
    dir: &Path,
    stdin: Option<&[u8]>,
    limit: usize,
    cancel: &CancelToken,
) -> Result<Truncation> {
    let mut truncation = Truncation::default();
    for hook in hooks {
        debug!(phase = %phase, hook = %hook, "running hook");
        let inv = Invocation {
            command: &hook.command,
            args: &hook.args,
            env: &hook.env,
            dir,
            stdin,
            limit,
        };
        let result = match exec::run(inv, cancel).await {
            Ok(captured) => captured.check(inv.command_line()),
            Err(e) => Err(e),
        };
        match result {
            Ok(captured) => truncation.add(captured.truncation),
            Err(e) if e.is_canceled() => return Err(e),
            Err(e) => {
                warn!(phase = %phase, hook = %hook, error = %e, "hook failed");
                return Err(CommandError::Hook {
                    phase,
                    command: hook.to_string(),
                    source: Box::new(e),
                });
            }
        }
    }
    Ok(truncation)
}
