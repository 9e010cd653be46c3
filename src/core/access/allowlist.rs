// Single-user access control.
//
// The bot answers exactly one Discord account. This module only knows about
// numeric user IDs, so the Discord layer extracts the author ID and asks here.

/// The one user the bot is willing to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allowlist {
    allowed_user_id: u64,
}

impl Allowlist {
    pub fn new(allowed_user_id: u64) -> Self {
        Self { allowed_user_id }
    }

    pub fn allowed_user_id(&self) -> u64 {
        self.allowed_user_id
    }

    /// Returns true only for the configured user. Everyone else is denied and
    /// the attempt is logged.
    pub fn is_authorized(&self, user_id: u64) -> bool {
        if user_id != self.allowed_user_id {
            tracing::warn!(user_id, "Rejected command from unauthorized user");
            return false;
        }

        true
    }
}
