use anchor_lang::prelude::*;

pub mod access;
pub mod batch;
pub mod cooldown;
pub mod coprocessor;
pub mod errors;
pub mod events;
pub mod ledger;
pub mod oracle;
pub mod registry;
pub mod state;

#[cfg(test)]
mod testing;

use coprocessor::{Ed25519Attestation, HealthFactorOp};
use ledger::{load_optional, store};
use oracle::DecryptionRequest;
use registry::{EncryptedPosition, Submission};
use state::*;

declare_id!("8STmnFJQDExmgYQWZ6qSss3UTEDLa4JNSzLg9k2p5LRF");

#[program]
pub mod confidential_positions {
    use super::*;

    // ─── Administration ───

    /// Creates the protocol config, the request gateway and batch 1. The
    /// signer becomes the owner.
    pub fn initialize(
        ctx: Context<Initialize>,
        cooldown_window: i64,
        coprocessor: Pubkey,
    ) -> Result<()> {
        let now = Clock::get()?.unix_timestamp;
        let owner = ctx.accounts.owner.key();

        ctx.accounts
            .config
            .setup(ctx.bumps.config, owner, coprocessor, cooldown_window)?;
        ctx.accounts.gateway.setup(ctx.bumps.gateway, crate::ID);
        let opened = ctx.accounts.first_batch.open(ctx.bumps.first_batch, 1, now);

        msg!("Protocol initialized, cooldown window {}s", cooldown_window);
        emit!(opened);
        Ok(())
    }

    pub fn transfer_ownership(ctx: Context<AdminConfig>, new_owner: Pubkey) -> Result<()> {
        let now = Clock::get()?.unix_timestamp;
        let caller = ctx.accounts.owner.key();
        let event = ctx.accounts.config.transfer_ownership(&caller, new_owner, now)?;

        msg!("Ownership transferred to {}", new_owner);
        emit!(event);
        Ok(())
    }

    pub fn set_provider(ctx: Context<SetProvider>, provider: Pubkey, enabled: bool) -> Result<()> {
        let now = Clock::get()?.unix_timestamp;
        ctx.accounts.config.ensure_owner(&ctx.accounts.owner.key())?;
        let event = ctx
            .accounts
            .provider_role
            .assign(ctx.bumps.provider_role, provider, enabled, now);

        msg!("Provider {} enabled={}", provider, enabled);
        emit!(event);
        Ok(())
    }

    pub fn set_paused(ctx: Context<AdminConfig>, paused: bool) -> Result<()> {
        let now = Clock::get()?.unix_timestamp;
        let caller = ctx.accounts.owner.key();
        let event = ctx.accounts.config.set_paused(&caller, paused, now)?;

        msg!("Paused={}", paused);
        emit!(event);
        Ok(())
    }

    pub fn set_cooldown_window(ctx: Context<AdminConfig>, window: i64) -> Result<()> {
        let now = Clock::get()?.unix_timestamp;
        let caller = ctx.accounts.owner.key();
        let event = ctx.accounts.config.set_cooldown_window(&caller, window, now)?;

        msg!("Cooldown window set to {}s", window);
        emit!(event);
        Ok(())
    }

    /// Rotates the key whose attestations are accepted as decryption proofs.
    pub fn set_coprocessor(ctx: Context<AdminConfig>, signer: Pubkey) -> Result<()> {
        let now = Clock::get()?.unix_timestamp;
        let caller = ctx.accounts.owner.key();
        let event = ctx.accounts.config.set_coprocessor(&caller, signer, now)?;

        msg!("Coprocessor signer set to {}", signer);
        emit!(event);
        Ok(())
    }

    // ─── Batches ───

    pub fn close_batch_and_open_next(ctx: Context<CloseBatch>) -> Result<()> {
        let now = Clock::get()?.unix_timestamp;
        let caller = ctx.accounts.owner.key();
        let next_bump = ctx.bumps.next_batch;

        let (closed, opened) = ctx.accounts.config.close_batch_and_open_next(
            &caller,
            &mut ctx.accounts.current_batch,
            &mut ctx.accounts.next_batch,
            next_bump,
            now,
        )?;

        msg!("Batch {} closed, batch {} open", closed.batch_id, opened.batch_id);
        emit!(closed);
        emit!(opened);
        Ok(())
    }

    // ─── Positions ───

    /// Stores the encrypted position of `user` in `batch_id`, replacing any
    /// earlier submission for the same pair.
    pub fn submit_position(
        ctx: Context<SubmitPosition>,
        batch_id: u64,
        user: Pubkey,
        position: EncryptedPosition,
    ) -> Result<()> {
        let now = Clock::get()?.unix_timestamp;
        let provider = ctx.accounts.provider.key();
        let role = load_optional::<ProviderRole>(&ctx.accounts.provider_role.to_account_info())?;
        ctx.accounts.cooldown.bind(ctx.bumps.cooldown, provider);

        let event = registry::submit_position(
            Submission {
                config: &ctx.accounts.config,
                role: role.as_ref(),
                cooldown: &mut ctx.accounts.cooldown,
                batch: &ctx.accounts.batch,
                position: &mut ctx.accounts.position,
                position_bump: ctx.bumps.position,
            },
            provider,
            user,
            position,
            now,
        )?;

        msg!("Position for {} stored in batch {}", user, batch_id);
        emit!(event);
        Ok(())
    }

    // ─── Decryption ───

    /// Snapshots the position, commits to its handles and hands the
    /// decryption to the coprocessor. Returns immediately; the result
    /// arrives through `fulfill_decryption`.
    pub fn request_decryption(
        ctx: Context<RequestDecryption>,
        batch_id: u64,
        user: Pubkey,
    ) -> Result<()> {
        let now = Clock::get()?.unix_timestamp;
        let requester = ctx.accounts.requester.key();
        let role = load_optional::<ProviderRole>(&ctx.accounts.provider_role.to_account_info())?;
        let position = load_optional::<PositionAccount>(&ctx.accounts.position.to_account_info())?;
        ctx.accounts.cooldown.bind(ctx.bumps.cooldown, requester);

        let event = oracle::request_decryption(
            DecryptionRequest {
                config: &ctx.accounts.config,
                role: role.as_ref(),
                cooldown: &mut ctx.accounts.cooldown,
                batch: &ctx.accounts.batch,
                position: position.as_ref(),
                gateway: &mut *ctx.accounts.gateway,
                context: &mut ctx.accounts.decryption_context,
                context_bump: ctx.bumps.decryption_context,
            },
            &HealthFactorOp,
            &crate::ID,
            requester,
            user,
            now,
        )?;

        msg!(
            "Decryption {} requested for {} in batch {}",
            event.request_id,
            user,
            batch_id
        );
        emit!(event);
        Ok(())
    }

    /// Coprocessor callback. Must be preceded in the same transaction by an
    /// ed25519 precompile instruction carrying the attestation in `proof`.
    pub fn fulfill_decryption(
        ctx: Context<FulfillDecryption>,
        request_id: u64,
        cleartext: Vec<u8>,
        proof: Vec<u8>,
    ) -> Result<()> {
        let now = Clock::get()?.unix_timestamp;
        let context_info = ctx.accounts.decryption_context.to_account_info();
        let mut context = load_optional::<DecryptionContext>(&context_info)?;
        let verifier = Ed25519Attestation::new(
            &ctx.accounts.instructions_sysvar,
            ctx.accounts.config.coprocessor,
            crate::ID,
        );

        let event = oracle::fulfill_decryption(
            &ctx.accounts.config,
            context.as_mut(),
            &ctx.accounts.position,
            &HealthFactorOp,
            &verifier,
            &crate::ID,
            request_id,
            &cleartext,
            &proof,
            now,
        )?;
        if let Some(context) = context.as_ref() {
            store(&context_info, context)?;
        }

        msg!("Decryption {} completed", request_id);
        emit!(event);
        Ok(())
    }

    // ─── Views ───

    pub fn request_status(ctx: Context<RequestStatusView>, _request_id: u64) -> Result<RequestState> {
        let context =
            load_optional::<DecryptionContext>(&ctx.accounts.decryption_context.to_account_info())?;
        Ok(oracle::request_status(context.as_ref()))
    }

    /// Handles stored for (batch, user), or `None` if nothing was submitted.
    pub fn position_handles(
        ctx: Context<PositionView>,
        _batch_id: u64,
        _user: Pubkey,
    ) -> Result<Option<EncryptedPosition>> {
        load_optional::<PositionAccount>(&ctx.accounts.position.to_account_info())?
            .map(|position| position.handles())
            .transpose()
    }

    pub fn current_batch(ctx: Context<ConfigView>) -> Result<u64> {
        Ok(ctx.accounts.config.current_batch)
    }

    /// Fails with `InvalidParameter` for batch 0 and for ids not opened yet.
    pub fn is_batch_closed(ctx: Context<ConfigView>, batch_id: u64) -> Result<bool> {
        ctx.accounts.config.is_batch_closed(batch_id)
    }
}

// ─── Account Structs ───

#[derive(Accounts)]
pub struct Initialize<'info> {
    #[account(mut)]
    pub owner: Signer<'info>,
    #[account(
        init,
        payer = owner,
        space = 8 + ProtocolConfig::INIT_SPACE,
        seeds = [ProtocolConfig::SEED],
        bump,
    )]
    pub config: Account<'info, ProtocolConfig>,
    #[account(
        init,
        payer = owner,
        space = 8 + DecryptionGateway::INIT_SPACE,
        seeds = [DecryptionGateway::SEED],
        bump,
    )]
    pub gateway: Account<'info, DecryptionGateway>,
    #[account(
        init,
        payer = owner,
        space = 8 + BatchAccount::INIT_SPACE,
        seeds = [BatchAccount::SEED, 1u64.to_le_bytes().as_ref()],
        bump,
    )]
    pub first_batch: Account<'info, BatchAccount>,
    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
pub struct AdminConfig<'info> {
    pub owner: Signer<'info>,
    #[account(mut, seeds = [ProtocolConfig::SEED], bump = config.bump)]
    pub config: Account<'info, ProtocolConfig>,
}

#[derive(Accounts)]
#[instruction(provider: Pubkey)]
pub struct SetProvider<'info> {
    #[account(mut)]
    pub owner: Signer<'info>,
    #[account(seeds = [ProtocolConfig::SEED], bump = config.bump)]
    pub config: Account<'info, ProtocolConfig>,
    #[account(
        init_if_needed,
        payer = owner,
        space = 8 + ProviderRole::INIT_SPACE,
        seeds = [ProviderRole::SEED, provider.as_ref()],
        bump,
    )]
    pub provider_role: Account<'info, ProviderRole>,
    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
pub struct CloseBatch<'info> {
    #[account(mut)]
    pub owner: Signer<'info>,
    #[account(mut, seeds = [ProtocolConfig::SEED], bump = config.bump)]
    pub config: Account<'info, ProtocolConfig>,
    #[account(
        mut,
        seeds = [BatchAccount::SEED, config.current_batch.to_le_bytes().as_ref()],
        bump = current_batch.bump,
    )]
    pub current_batch: Account<'info, BatchAccount>,
    #[account(
        init,
        payer = owner,
        space = 8 + BatchAccount::INIT_SPACE,
        seeds = [
            BatchAccount::SEED,
            config.current_batch.saturating_add(1).to_le_bytes().as_ref(),
        ],
        bump,
    )]
    pub next_batch: Account<'info, BatchAccount>,
    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
#[instruction(batch_id: u64, user: Pubkey)]
pub struct SubmitPosition<'info> {
    #[account(mut)]
    pub provider: Signer<'info>,
    #[account(seeds = [ProtocolConfig::SEED], bump = config.bump)]
    pub config: Account<'info, ProtocolConfig>,
    /// CHECK: may be absent; an absent role is rejected as unauthorized
    #[account(seeds = [ProviderRole::SEED, provider.key().as_ref()], bump)]
    pub provider_role: UncheckedAccount<'info>,
    #[account(
        init_if_needed,
        payer = provider,
        space = 8 + CooldownLedger::INIT_SPACE,
        seeds = [CooldownLedger::SEED, provider.key().as_ref()],
        bump,
    )]
    pub cooldown: Account<'info, CooldownLedger>,
    #[account(
        seeds = [BatchAccount::SEED, batch_id.to_le_bytes().as_ref()],
        bump = batch.bump,
    )]
    pub batch: Account<'info, BatchAccount>,
    #[account(
        init_if_needed,
        payer = provider,
        space = 8 + PositionAccount::INIT_SPACE,
        seeds = [PositionAccount::SEED, batch_id.to_le_bytes().as_ref(), user.as_ref()],
        bump,
    )]
    pub position: Account<'info, PositionAccount>,
    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
#[instruction(batch_id: u64, user: Pubkey)]
pub struct RequestDecryption<'info> {
    #[account(mut)]
    pub requester: Signer<'info>,
    #[account(seeds = [ProtocolConfig::SEED], bump = config.bump)]
    pub config: Account<'info, ProtocolConfig>,
    /// CHECK: may be absent; an absent role is rejected as unauthorized
    #[account(seeds = [ProviderRole::SEED, requester.key().as_ref()], bump)]
    pub provider_role: UncheckedAccount<'info>,
    #[account(
        init_if_needed,
        payer = requester,
        space = 8 + CooldownLedger::INIT_SPACE,
        seeds = [CooldownLedger::SEED, requester.key().as_ref()],
        bump,
    )]
    pub cooldown: Account<'info, CooldownLedger>,
    #[account(
        seeds = [BatchAccount::SEED, batch_id.to_le_bytes().as_ref()],
        bump = batch.bump,
    )]
    pub batch: Account<'info, BatchAccount>,
    /// CHECK: may be absent; an absent position is rejected as not initialized
    #[account(
        seeds = [PositionAccount::SEED, batch_id.to_le_bytes().as_ref(), user.as_ref()],
        bump,
    )]
    pub position: UncheckedAccount<'info>,
    #[account(mut, seeds = [DecryptionGateway::SEED], bump = gateway.bump)]
    pub gateway: Account<'info, DecryptionGateway>,
    #[account(
        init,
        payer = requester,
        space = 8 + DecryptionContext::INIT_SPACE,
        seeds = [DecryptionContext::SEED, gateway.next_request_id.to_le_bytes().as_ref()],
        bump,
    )]
    pub decryption_context: Account<'info, DecryptionContext>,
    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
#[instruction(request_id: u64)]
pub struct FulfillDecryption<'info> {
    pub relayer: Signer<'info>,
    #[account(seeds = [ProtocolConfig::SEED], bump = config.bump)]
    pub config: Account<'info, ProtocolConfig>,
    /// CHECK: may be absent; an absent context is rejected as an unknown request
    #[account(
        mut,
        seeds = [DecryptionContext::SEED, request_id.to_le_bytes().as_ref()],
        bump,
    )]
    pub decryption_context: UncheckedAccount<'info>,
    /// Matched against the (batch, user) recorded in the context
    pub position: Account<'info, PositionAccount>,
    #[account(address = ::anchor_lang::solana_program::sysvar::instructions::ID)]
    /// CHECK: instructions_sysvar
    pub instructions_sysvar: AccountInfo<'info>,
}

#[derive(Accounts)]
#[instruction(request_id: u64)]
pub struct RequestStatusView<'info> {
    /// CHECK: may be absent; reported as unknown
    #[account(seeds = [DecryptionContext::SEED, request_id.to_le_bytes().as_ref()], bump)]
    pub decryption_context: UncheckedAccount<'info>,
}

#[derive(Accounts)]
#[instruction(batch_id: u64, user: Pubkey)]
pub struct PositionView<'info> {
    /// CHECK: may be absent; reported as none
    #[account(
        seeds = [PositionAccount::SEED, batch_id.to_le_bytes().as_ref(), user.as_ref()],
        bump,
    )]
    pub position: UncheckedAccount<'info>,
}

#[derive(Accounts)]
pub struct ConfigView<'info> {
    #[account(seeds = [ProtocolConfig::SEED], bump = config.bump)]
    pub config: Account<'info, ProtocolConfig>,
}
