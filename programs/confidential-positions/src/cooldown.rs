use anchor_lang::prelude::*;

use crate::errors::ErrorCode;
use crate::state::CooldownLedger;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CooldownKind {
    Submission,
    DecryptionRequest,
}

impl CooldownLedger {
    pub fn bind(&mut self, bump: u8, owner: Pubkey) {
        self.bump = bump;
        self.owner = owner;
    }

    fn track(&mut self, kind: CooldownKind) -> &mut Option<i64> {
        match kind {
            CooldownKind::Submission => &mut self.last_submission_at,
            CooldownKind::DecryptionRequest => &mut self.last_request_at,
        }
    }

    /// Seconds until `kind` is allowed again; zero when it already is.
    pub fn remaining(&self, kind: CooldownKind, now: i64, window: i64) -> i64 {
        let last = match kind {
            CooldownKind::Submission => self.last_submission_at,
            CooldownKind::DecryptionRequest => self.last_request_at,
        };
        match last {
            Some(last) => last.saturating_add(window).saturating_sub(now).max(0),
            None => 0,
        }
    }

    /// Rejects with `CooldownActive` while `now < last + window`, otherwise
    /// records `now` for this kind. Must run inside the guarded instruction.
    pub fn check_and_stamp(&mut self, kind: CooldownKind, now: i64, window: i64) -> Result<()> {
        require!(self.remaining(kind, now, window) == 0, ErrorCode::CooldownActive);
        *self.track(kind) = Some(now);
        Ok(())
    }
}
