//! Two-phase decryption of a position through the coprocessor.
//!
//! The request phase snapshots the position's handles, derives the health
//! factor handle and stores a commitment over all four. The callback is only
//! accepted if the position still hashes to that commitment, the proof
//! verifies, and the request has not been answered before. A position that
//! was overwritten in between is never decrypted under the old request.

use anchor_lang::prelude::*;

use crate::access::ensure_provider;
use crate::coprocessor::{MetricDeriver, ProofVerifier, RequestIssuer};
use crate::cooldown::CooldownKind;
use crate::errors::ErrorCode;
use crate::events::{DecryptionCompleted, DecryptionRequested};
use crate::registry::Handle;
use crate::state::{
    BatchAccount, CooldownLedger, DecryptionContext, PositionAccount, ProtocolConfig,
    ProviderRole, RequestState,
};

const COMMITMENT_TAG: &[u8] = b"confidential-positions:commitment:v1";

/// Cleartext layout: collateral, debt, leverage, health factor as u64 LE.
pub const CLEARTEXT_LEN: usize = 4 * 8;

/// `[collateral, debt, leverage, health factor]` for the position as it is
/// stored right now.
pub fn snapshot_handles<D: MetricDeriver>(
    position: &PositionAccount,
    deriver: &D,
) -> Result<[Handle; 4]> {
    let [collateral, debt, leverage] = position.handles()?.as_array();
    let derived = deriver.derive_metric(&[collateral, debt, leverage]);
    Ok([collateral, debt, leverage, derived])
}

pub fn commitment(handles: &[Handle; 4], protocol: &Pubkey) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(COMMITMENT_TAG);
    hasher.update(protocol.as_ref());
    for handle in handles {
        hasher.update(handle);
    }
    *hasher.finalize().as_bytes()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reveal {
    pub collateral: u64,
    pub debt: u64,
    pub leverage: u64,
    pub health_factor: u64,
}

impl Reveal {
    pub fn decode(cleartext: &[u8]) -> Result<Self> {
        require!(cleartext.len() == CLEARTEXT_LEN, ErrorCode::MalformedCleartext);

        let mut words = cleartext.chunks_exact(8).map(|chunk| {
            let mut word = [0u8; 8];
            word.copy_from_slice(chunk);
            u64::from_le_bytes(word)
        });
        let mut next = || words.next().ok_or_else(|| error!(ErrorCode::MalformedCleartext));

        Ok(Self {
            collateral: next()?,
            debt: next()?,
            leverage: next()?,
            health_factor: next()?,
        })
    }

    pub fn encode(&self) -> [u8; CLEARTEXT_LEN] {
        let mut out = [0u8; CLEARTEXT_LEN];
        for (slot, value) in out
            .chunks_exact_mut(8)
            .zip([self.collateral, self.debt, self.leverage, self.health_factor])
        {
            slot.copy_from_slice(&value.to_le_bytes());
        }
        out
    }
}

impl DecryptionContext {
    pub fn status(&self) -> RequestState {
        if self.processed {
            RequestState::Completed
        } else {
            RequestState::Pending
        }
    }
}

pub fn request_status(context: Option<&DecryptionContext>) -> RequestState {
    context.map_or(RequestState::Unknown, DecryptionContext::status)
}

// ─── Request phase ───

/// Accounts touched by a decryption request.
pub struct DecryptionRequest<'a, G> {
    pub config: &'a ProtocolConfig,
    pub role: Option<&'a ProviderRole>,
    pub cooldown: &'a mut CooldownLedger,
    pub batch: &'a BatchAccount,
    pub position: Option<&'a PositionAccount>,
    pub gateway: &'a mut G,
    pub context: &'a mut DecryptionContext,
    pub context_bump: u8,
}

pub fn request_decryption<G: RequestIssuer, D: MetricDeriver>(
    accounts: DecryptionRequest<'_, G>,
    deriver: &D,
    protocol: &Pubkey,
    requester: Pubkey,
    user: Pubkey,
    now: i64,
) -> Result<DecryptionRequested> {
    let DecryptionRequest {
        config,
        role,
        cooldown,
        batch,
        position,
        gateway,
        context,
        context_bump,
    } = accounts;

    config.ensure_active()?;
    ensure_provider(role, &requester)?;
    batch.ensure_open()?;
    let position = position
        .filter(|position| position.belongs_to(batch.id, &user))
        .ok_or_else(|| error!(ErrorCode::NotInitialized))?;
    let handles = snapshot_handles(position, deriver)?;
    let commitment = commitment(&handles, protocol);
    cooldown.check_and_stamp(CooldownKind::DecryptionRequest, now, config.cooldown_window)?;

    let request_id = gateway.issue(&handles, protocol)?;

    context.bump = context_bump;
    context.request_id = request_id;
    context.batch_id = batch.id;
    context.user = user;
    context.requester = requester;
    context.commitment = commitment;
    context.processed = false;
    context.requested_at = now;
    context.completed_at = None;

    Ok(DecryptionRequested {
        request_id,
        batch_id: batch.id,
        user,
        requester,
        handles,
        commitment,
        timestamp: now,
    })
}

// ─── Callback phase ───

/// Settles a coprocessor callback against the stored request. The position
/// is the one recorded in the context, whoever relays the callback.
#[allow(clippy::too_many_arguments)]
pub fn fulfill_decryption<D: MetricDeriver, V: ProofVerifier>(
    config: &ProtocolConfig,
    context: Option<&mut DecryptionContext>,
    position: &PositionAccount,
    deriver: &D,
    verifier: &V,
    protocol: &Pubkey,
    request_id: u64,
    cleartext: &[u8],
    proof: &[u8],
    now: i64,
) -> Result<DecryptionCompleted> {
    config.ensure_active()?;

    let context = context
        .filter(|context| context.request_id == request_id)
        .ok_or_else(|| error!(ErrorCode::UnknownRequest))?;
    require!(!context.processed, ErrorCode::ReplayDetected);
    require!(
        position.belongs_to(context.batch_id, &context.user),
        ErrorCode::PositionMismatch
    );

    let current = commitment(&snapshot_handles(position, deriver)?, protocol);
    require!(current == context.commitment, ErrorCode::StateMismatch);
    require!(
        verifier.verify(request_id, cleartext, proof),
        ErrorCode::InvalidProof
    );
    let reveal = Reveal::decode(cleartext)?;

    context.processed = true;
    context.completed_at = Some(now);

    Ok(DecryptionCompleted {
        request_id,
        batch_id: context.batch_id,
        user: context.user,
        collateral: reveal.collateral,
        debt: reveal.debt,
        leverage: reveal.leverage,
        health_factor: reveal.health_factor,
        timestamp: now,
    })
}
