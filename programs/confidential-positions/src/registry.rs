//! Encrypted positions keyed by (batch, user).

use anchor_lang::prelude::*;

use crate::access::ensure_provider;
use crate::cooldown::CooldownKind;
use crate::errors::ErrorCode;
use crate::events::PositionSubmitted;
use crate::state::{BatchAccount, CooldownLedger, PositionAccount, ProtocolConfig, ProviderRole};

/// Opaque reference to a ciphertext held by the coprocessor.
pub type Handle = [u8; 32];

pub const UNINITIALIZED: Handle = [0u8; 32];

pub fn is_initialized(handle: &Handle) -> bool {
    *handle != UNINITIALIZED
}

/// The three ciphertexts making up a position, in canonical order.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncryptedPosition {
    pub collateral: [u8; 32],
    pub debt: [u8; 32],
    pub leverage: [u8; 32],
}

impl EncryptedPosition {
    pub fn ensure_initialized(&self) -> Result<()> {
        require!(
            self.as_array().iter().all(is_initialized),
            ErrorCode::NotInitialized
        );
        Ok(())
    }

    pub fn as_array(&self) -> [Handle; 3] {
        [self.collateral, self.debt, self.leverage]
    }
}

impl PositionAccount {
    /// Stored handles, or `NotInitialized` if any was never assigned.
    pub fn handles(&self) -> Result<EncryptedPosition> {
        let position = EncryptedPosition {
            collateral: self.collateral,
            debt: self.debt,
            leverage: self.leverage,
        };
        position.ensure_initialized()?;
        Ok(position)
    }

    pub fn belongs_to(&self, batch_id: u64, user: &Pubkey) -> bool {
        self.batch_id == batch_id && self.user == *user
    }

    /// Replaces the stored handles. Prior contents are discarded.
    pub fn overwrite(
        &mut self,
        bump: u8,
        batch_id: u64,
        user: Pubkey,
        position: EncryptedPosition,
        provider: Pubkey,
        now: i64,
    ) -> Result<()> {
        position.ensure_initialized()?;

        self.bump = bump;
        self.batch_id = batch_id;
        self.user = user;
        self.collateral = position.collateral;
        self.debt = position.debt;
        self.leverage = position.leverage;
        self.submitted_by = provider;
        self.updated_at = now;
        self.revision = self
            .revision
            .checked_add(1)
            .ok_or_else(|| error!(ErrorCode::ArithmeticOverflow))?;
        Ok(())
    }
}

/// Accounts touched by a position submission.
pub struct Submission<'a> {
    pub config: &'a ProtocolConfig,
    pub role: Option<&'a ProviderRole>,
    pub cooldown: &'a mut CooldownLedger,
    pub batch: &'a BatchAccount,
    pub position: &'a mut PositionAccount,
    pub position_bump: u8,
}

/// Validates every precondition before the first write, so a rejected
/// submission leaves cooldown and position untouched.
pub fn submit_position(
    accounts: Submission<'_>,
    provider: Pubkey,
    user: Pubkey,
    position: EncryptedPosition,
    now: i64,
) -> Result<PositionSubmitted> {
    let Submission {
        config,
        role,
        cooldown,
        batch,
        position: stored,
        position_bump,
    } = accounts;

    config.ensure_active()?;
    ensure_provider(role, &provider)?;
    batch.ensure_open()?;
    position.ensure_initialized()?;
    cooldown.check_and_stamp(CooldownKind::Submission, now, config.cooldown_window)?;

    stored.overwrite(position_bump, batch.id, user, position, provider, now)?;

    Ok(PositionSubmitted {
        batch_id: batch.id,
        user,
        provider,
        revision: stored.revision,
        timestamp: now,
    })
}
