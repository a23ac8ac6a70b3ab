//! Breakpoint reconciliation.
//!
//! Brings the backend's breakpoint set in line with the locally-declared
//! one: fetch the remote set, partition into add/remove/keep, apply the
//! mutations one at a time, and report what is tracked afterwards.

use crate::breakpoint::Breakpoint;
use crate::error::IkpdbError;
use crate::protocol::ExecutionStatus;
use crate::session::DebugSession;

/// What to do once reconciliation completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterSync {
    /// Start execution via `runScript`. Used on a fresh attach.
    Run,
    /// Leave execution alone and report its status via `getStatus`.
    QueryStatus,
}

/// Membership split of local against remote breakpoints.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BreakpointDiff {
    /// Present in both sets; backend ids copied onto the local entries.
    pub synced: Vec<Breakpoint>,
    /// Local-only; must be added to the backend.
    pub to_add: Vec<Breakpoint>,
    /// Remote-only; must be removed from the backend.
    pub to_remove: Vec<Breakpoint>,
}

/// Outcome of a full reconciliation pass.
#[derive(Debug)]
pub struct SyncReport {
    /// Breakpoints now tracked locally, backend ids populated. Includes
    /// remote extras that failed to clear (see `failed_removes`).
    pub synced: Vec<Breakpoint>,
    /// `toAdd` items the backend rejected; absent from `synced`.
    pub failed_adds: Vec<(Breakpoint, IkpdbError)>,
    /// Remote extras that could not be cleared. They stay in `synced` so no
    /// breakpoint silently vanishes from tracking, but the divergence from
    /// actual backend state is surfaced here for the caller to report.
    pub failed_removes: Vec<(Breakpoint, IkpdbError)>,
    /// Execution status after the post-sync command, when reported.
    pub execution: Option<ExecutionStatus>,
    /// Failure of the post-sync `runScript`/`getStatus` command. The
    /// reconciliation itself already happened, so the report is still
    /// returned; only this one command's outcome is affected.
    pub execution_error: Option<IkpdbError>,
}

/// Split `local` against `remote` on the `(text, line, condition)` key.
///
/// Each remote entry can satisfy at most one local breakpoint: a match is
/// consumed, so the leftover remote entries are true extras.
pub fn partition(local: Vec<Breakpoint>, mut remote: Vec<Breakpoint>) -> BreakpointDiff {
    let mut synced = Vec::new();
    let mut to_add = Vec::new();

    for mut bp in local {
        match remote.iter().position(|rbp| rbp.same_key(&bp)) {
            Some(index) => {
                bp.id = remote.remove(index).id;
                synced.push(bp);
            }
            None => to_add.push(bp),
        }
    }

    BreakpointDiff {
        synced,
        to_add,
        to_remove: remote,
    }
}

/// Reconcile `local` against the backend's breakpoint set over an attached
/// session, then either start execution or query its status.
///
/// Mutations are issued strictly one at a time: the next `setBreakpoint` or
/// `clearBreakpoint` only goes out after the previous item's reply, so the
/// backend numbers breakpoints deterministically and every failure is
/// attributable to a single item. A failing item is set aside and the rest
/// of the batch continues.
///
/// Only failures before any mutation (`getBreakpoints`) abort with `Err`.
/// Once the backend has been mutated the report is always returned; a
/// failing post-sync command lands in [`SyncReport::execution_error`] so
/// the reconciled set and its fresh backend ids are never lost.
pub async fn synchronize(
    session: &DebugSession,
    local: Vec<Breakpoint>,
    after: AfterSync,
) -> Result<SyncReport, IkpdbError> {
    let reply = session
        .request("getBreakpoints", serde_json::json!({}))
        .await?;
    let remote: Vec<Breakpoint> = serde_json::from_value(reply.result)
        .map_err(|err| IkpdbError::InvalidReply(format!("getBreakpoints result: {err}")))?;

    let BreakpointDiff {
        mut synced,
        to_add,
        to_remove,
    } = partition(local, remote);

    let mut failed_adds = Vec::new();
    let mut failed_removes = Vec::new();

    for mut bp in to_add {
        match add_breakpoint(session, &bp).await {
            Ok(number) => {
                bp.id = Some(number);
                synced.push(bp);
            }
            Err(err) => {
                tracing::warn!(text = %bp.text, line = bp.line, %err, "setBreakpoint failed");
                failed_adds.push((bp, err));
            }
        }
    }

    for bp in to_remove {
        if let Err(err) = clear_breakpoint(session, &bp).await {
            tracing::warn!(text = %bp.text, line = bp.line, %err, "clearBreakpoint failed");
            // Keep tracking what we could not remove; the caller sees the
            // divergence in failed_removes.
            synced.push(bp.clone());
            failed_removes.push((bp, err));
        }
    }

    let command = match after {
        AfterSync::Run => "runScript",
        AfterSync::QueryStatus => "getStatus",
    };
    let (execution, execution_error) = match session.request(command, serde_json::json!({})).await
    {
        Ok(reply) => (reply.reported_execution_status(), None),
        Err(err) => {
            tracing::warn!(command, %err, "post-sync command failed");
            (None, Some(err))
        }
    };

    Ok(SyncReport {
        synced,
        failed_adds,
        failed_removes,
        execution,
        execution_error,
    })
}

async fn add_breakpoint(session: &DebugSession, bp: &Breakpoint) -> Result<i64, IkpdbError> {
    let reply = session.request("setBreakpoint", bp.to_set_args()).await?;
    reply
        .result
        .get("breakpoint_number")
        .and_then(|number| number.as_i64())
        .ok_or_else(|| {
            IkpdbError::InvalidReply("setBreakpoint reply missing breakpoint_number".into())
        })
}

async fn clear_breakpoint(session: &DebugSession, bp: &Breakpoint) -> Result<(), IkpdbError> {
    let Some(number) = bp.id else {
        return Err(IkpdbError::InvalidReply(
            "remote breakpoint without a breakpoint number".into(),
        ));
    };
    session
        .request(
            "clearBreakpoint",
            serde_json::json!({ "breakpoint_number": number }),
        )
        .await?;
    Ok(())
}
