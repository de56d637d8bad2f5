//! Route effect execution.
//!
//! # Responsibilities
//! - Execute the three sink kinds: publish, key write, shell call
//! - Enforce the shell-call policy gate
//! - Convert every failure into a `DispatchError` value
//!
//! # Design Decisions
//! - Nothing raises past this boundary: one user-authored route
//!   pointing at a broken destination must never halt routing for
//!   other routes or other messages
//! - Shell calls are the one place user-authored text reaches
//!   process execution; the policy gate and post-substitution
//!   trimming are the security boundary
//! - Nonblocking commands succeed once spawned; blocking commands
//!   are awaited under an optional timeout and a nonzero exit status
//!   is a reported failure

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;

use crate::dispatch::transport::{Transport, TransportError};
use crate::routing::grammar::{Destination, Route};
use crate::routing::substitute::{SubstitutionContext, VAR_MESSAGE};

/// Why a matched route's effect did not happen.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DispatchError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("shell calls are disabled by policy")]
    ShellCallsDisabled,

    #[error("failed to spawn {program:?}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{program:?} exited with status {status}")]
    CommandStatus { program: String, status: i32 },

    #[error("{program:?} was terminated by a signal")]
    CommandKilled { program: String },

    #[error("{program:?} did not finish within {timeout_secs}s")]
    CommandTimeout { program: String, timeout_secs: u64 },
}

/// Executes the effect of one matched route.
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    allow_shell_calls: bool,
    shell_timeout: Option<Duration>,
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        allow_shell_calls: bool,
        shell_timeout: Option<Duration>,
    ) -> Self {
        Self {
            transport,
            allow_shell_calls,
            shell_timeout,
        }
    }

    /// Execute one matched route against the message context.
    ///
    /// Substitution is applied to exactly two targets: the rendered
    /// payload/template text, and, for commands, the program name and
    /// every argument independently.
    pub async fn dispatch(
        &self,
        route: &Route,
        ctx: &SubstitutionContext,
    ) -> Result<(), DispatchError> {
        match &route.destination {
            Destination::Channel(channel) => {
                let text = self.render(route, ctx);
                self.transport.publish(channel, &text).await?;
                tracing::debug!(channel = %channel, bytes = text.len(), "published");
                Ok(())
            }
            Destination::Key { key, field: None } => {
                let text = self.render(route, ctx);
                self.transport.set_value(key, &text).await?;
                tracing::debug!(key = %key, "value written");
                Ok(())
            }
            Destination::Key {
                key,
                field: Some(field),
            } => {
                let text = self.render(route, ctx);
                self.transport.set_field(key, field, &text).await?;
                tracing::debug!(key = %key, field = %field, "field written");
                Ok(())
            }
            Destination::Command {
                blocking,
                program,
                args,
            } => self.shell_call(*blocking, program, args, ctx).await,
        }
    }

    fn render(&self, route: &Route, ctx: &SubstitutionContext) -> String {
        ctx.apply(route.template.as_deref().unwrap_or(VAR_MESSAGE))
    }

    async fn shell_call(
        &self,
        blocking: bool,
        program: &str,
        args: &[String],
        ctx: &SubstitutionContext,
    ) -> Result<(), DispatchError> {
        if !self.allow_shell_calls {
            tracing::warn!(program = %program, "shell call refused by policy");
            return Err(DispatchError::ShellCallsDisabled);
        }

        // Trim each rendered piece: template substitution easily
        // leaves stray surrounding whitespace, and a program name of
        // " aplay " must not reach exec.
        let program = ctx.apply(program).trim().to_string();
        let args: Vec<String> = args
            .iter()
            .map(|arg| ctx.apply(arg).trim().to_string())
            .collect();

        tracing::info!(program = %program, args = ?args, blocking, "invoking shell call");

        let mut child = Command::new(&program)
            .args(&args)
            .spawn()
            .map_err(|source| DispatchError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !blocking {
            // Launched and not awaited: dispatch succeeds once the
            // process starts, independent of its eventual exit code.
            return Ok(());
        }

        let status = match self.shell_timeout {
            None => child.wait().await,
            Some(timeout) => match tokio::time::timeout(timeout, child.wait()).await {
                Ok(status) => status,
                Err(_) => {
                    let _ = child.kill().await;
                    return Err(DispatchError::CommandTimeout {
                        program,
                        timeout_secs: timeout.as_secs(),
                    });
                }
            },
        };

        let status = status.map_err(|source| DispatchError::Spawn {
            program: program.clone(),
            source,
        })?;

        match status.code() {
            Some(0) => Ok(()),
            Some(code) => Err(DispatchError::CommandStatus {
                program,
                status: code,
            }),
            None => Err(DispatchError::CommandKilled { program }),
        }
    }
}
