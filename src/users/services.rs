use tracing::{error, info};

use super::repo::{StoreError, UserStore};
use super::repo_types::Status;
use crate::auth::session::CurrentUser;

#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("no users selected")]
    NoSelection,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Verified,
    AlreadyVerified,
    Blocked,
    NotFound,
}

/// Mark the caller's own account as verified.
pub async fn verify_self(
    store: &dyn UserStore,
    caller: &CurrentUser,
) -> Result<VerifyOutcome, StoreError> {
    let Some(user) = store.find_by_id(caller.id).await? else {
        return Ok(VerifyOutcome::NotFound);
    };
    if user.is_blocked {
        return Ok(VerifyOutcome::Blocked);
    }
    if user.status == Status::Verified {
        return Ok(VerifyOutcome::AlreadyVerified);
    }
    store.set_status(user.id, Status::Verified).await?;
    info!(user_id = user.id, "user verified their account");
    Ok(VerifyOutcome::Verified)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkAction {
    Block,
    Unblock,
    Delete,
}

impl BulkAction {
    pub fn past_tense(&self) -> &'static str {
        match self {
            BulkAction::Block => "blocked",
            BulkAction::Unblock => "unblocked",
            BulkAction::Delete => "deleted",
        }
    }

    /// Warning shown when no requested user was eligible.
    pub fn nothing_done_notice(&self) -> &'static str {
        match self {
            BulkAction::Block => "No users were blocked (already blocked or not found)",
            BulkAction::Unblock => "No users were unblocked (not blocked or not found)",
            BulkAction::Delete => "No users found to delete",
        }
    }

    pub fn failure_notice(&self) -> &'static str {
        match self {
            BulkAction::Block => "An error occurred while blocking users",
            BulkAction::Unblock => "An error occurred while unblocking users",
            BulkAction::Delete => "An error occurred while deleting users",
        }
    }

    /// Whether applying this action to the caller invalidates their session.
    fn ends_own_session(&self) -> bool {
        matches!(self, BulkAction::Block | BulkAction::Delete)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkOutcome {
    pub action: BulkAction,
    /// Ids the store actually changed.
    pub affected: Vec<i64>,
    /// The caller blocked or deleted themselves and must be signed out.
    pub logout_caller: bool,
}

impl BulkOutcome {
    pub fn count(&self) -> usize {
        self.affected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.affected.is_empty()
    }
}

/// Apply a bulk action to the requested ids as one atomic store call.
pub async fn apply_bulk(
    store: &dyn UserStore,
    caller: &CurrentUser,
    action: BulkAction,
    requested: &[i64],
) -> Result<BulkOutcome, RosterError> {
    if requested.is_empty() {
        return Err(RosterError::NoSelection);
    }
    let mut ids = requested.to_vec();
    ids.sort_unstable();
    ids.dedup();

    let result = match action {
        BulkAction::Block => store.block_many(&ids).await,
        BulkAction::Unblock => store.unblock_many(&ids).await,
        BulkAction::Delete => store.delete_many(&ids).await,
    };
    let affected = result.map_err(|e| {
        error!(error = %e, caller_id = caller.id, ?ids, ?action, "bulk operation failed");
        e
    })?;

    let logout_caller = action.ends_own_session() && affected.contains(&caller.id);
    info!(
        caller_id = caller.id,
        ?action,
        requested = ids.len(),
        affected = affected.len(),
        logout_caller,
        "bulk operation applied"
    );
    Ok(BulkOutcome {
        action,
        affected,
        logout_caller,
    })
}
