//! Owner and provider roles plus the global pause switch.

use anchor_lang::prelude::*;

use crate::errors::ErrorCode;
use crate::events::{
    CooldownWindowUpdated, CoprocessorUpdated, OwnershipTransferred, PauseToggled,
    ProviderUpdated,
};
use crate::state::{ProtocolConfig, ProviderRole};

impl ProtocolConfig {
    pub fn setup(
        &mut self,
        bump: u8,
        owner: Pubkey,
        coprocessor: Pubkey,
        cooldown_window: i64,
    ) -> Result<()> {
        require!(cooldown_window > 0, ErrorCode::InvalidParameter);
        require!(coprocessor != Pubkey::default(), ErrorCode::InvalidParameter);

        self.bump = bump;
        self.owner = owner;
        self.coprocessor = coprocessor;
        self.paused = false;
        self.cooldown_window = cooldown_window;
        self.current_batch = 1;
        Ok(())
    }

    pub fn ensure_owner(&self, caller: &Pubkey) -> Result<()> {
        require_keys_eq!(*caller, self.owner, ErrorCode::Unauthorized);
        Ok(())
    }

    pub fn ensure_active(&self) -> Result<()> {
        require!(!self.paused, ErrorCode::Paused);
        Ok(())
    }

    pub fn transfer_ownership(
        &mut self,
        caller: &Pubkey,
        new_owner: Pubkey,
        now: i64,
    ) -> Result<OwnershipTransferred> {
        self.ensure_owner(caller)?;
        require!(new_owner != Pubkey::default(), ErrorCode::InvalidParameter);

        let previous_owner = self.owner;
        self.owner = new_owner;

        Ok(OwnershipTransferred {
            previous_owner,
            new_owner,
            timestamp: now,
        })
    }

    pub fn set_paused(&mut self, caller: &Pubkey, paused: bool, now: i64) -> Result<PauseToggled> {
        self.ensure_owner(caller)?;
        self.paused = paused;

        Ok(PauseToggled {
            paused,
            timestamp: now,
        })
    }

    pub fn set_cooldown_window(
        &mut self,
        caller: &Pubkey,
        window: i64,
        now: i64,
    ) -> Result<CooldownWindowUpdated> {
        self.ensure_owner(caller)?;
        require!(window > 0, ErrorCode::InvalidParameter);

        let previous_window = self.cooldown_window;
        self.cooldown_window = window;

        Ok(CooldownWindowUpdated {
            previous_window,
            new_window: window,
            timestamp: now,
        })
    }

    pub fn set_coprocessor(
        &mut self,
        caller: &Pubkey,
        signer: Pubkey,
        now: i64,
    ) -> Result<CoprocessorUpdated> {
        self.ensure_owner(caller)?;
        require!(signer != Pubkey::default(), ErrorCode::InvalidParameter);

        let previous_signer = self.coprocessor;
        self.coprocessor = signer;

        Ok(CoprocessorUpdated {
            previous_signer,
            new_signer: signer,
            timestamp: now,
        })
    }
}

impl ProviderRole {
    pub fn assign(&mut self, bump: u8, provider: Pubkey, enabled: bool, now: i64) -> ProviderUpdated {
        self.bump = bump;
        self.provider = provider;
        self.enabled = enabled;

        ProviderUpdated {
            provider,
            enabled,
            timestamp: now,
        }
    }
}

/// Fails with `Unauthorized` unless `caller` holds an enabled provider role.
/// A missing role account means the address was never registered.
pub fn ensure_provider(role: Option<&ProviderRole>, caller: &Pubkey) -> Result<()> {
    match role {
        Some(role) if role.enabled && role.provider == *caller => Ok(()),
        _ => err!(ErrorCode::Unauthorized),
    }
}
