//! Capabilities of the external decryption coprocessor.
//!
//! The protocol only ever talks to the coprocessor through three seams:
//!
//! - [`RequestIssuer`] hands out the request id for a new decryption.
//! - [`MetricDeriver`] names the encrypted health factor of a position. The
//!   arithmetic itself runs inside the coprocessor; on chain we only need a
//!   deterministic handle for it.
//! - [`ProofVerifier`] checks that a cleartext really came from the
//!   coprocessor for a given request.
//!
//! Production uses [`DecryptionGateway`], [`HealthFactorOp`] and
//! [`Ed25519Attestation`]. Tests substitute their own implementations.

use anchor_lang::prelude::*;
use anchor_lang::solana_program::sysvar::instructions::{
    load_current_index_checked, load_instruction_at_checked,
};

use crate::errors::ErrorCode;
use crate::registry::{is_initialized, Handle};
use crate::state::DecryptionGateway;

/// Native ed25519 signature verification precompile.
pub mod ed25519_program {
    anchor_lang::declare_id!("Ed25519SigVerify111111111111111111111111111");
}

const HEALTH_FACTOR_TAG: &[u8] = b"confidential-positions:health-factor:v1";
const ATTESTATION_TAG: &[u8] = b"confidential-positions:attestation:v1";

pub trait RequestIssuer {
    /// Registers a decryption of `handles` whose result is delivered back to
    /// `target`, returning the id the callback will carry.
    fn issue(&mut self, handles: &[Handle; 4], target: &Pubkey) -> Result<u64>;
}

pub trait MetricDeriver {
    fn derive_metric(&self, inputs: &[Handle; 3]) -> Handle;
}

pub trait ProofVerifier {
    fn verify(&self, request_id: u64, cleartext: &[u8], proof: &[u8]) -> bool;
}

// ─── Request ids ───

impl DecryptionGateway {
    pub fn setup(&mut self, bump: u8, callback_target: Pubkey) {
        self.bump = bump;
        self.callback_target = callback_target;
        self.next_request_id = 1;
    }
}

/// The relayer picks the handles up from the `DecryptionRequested` event.
/// Only requests answered through the registered callback target, over
/// fully assigned handles, get an id.
impl RequestIssuer for DecryptionGateway {
    fn issue(&mut self, handles: &[Handle; 4], target: &Pubkey) -> Result<u64> {
        require_keys_eq!(*target, self.callback_target, ErrorCode::InvalidParameter);
        require!(handles.iter().all(is_initialized), ErrorCode::NotInitialized);

        let id = self.next_request_id;
        self.next_request_id = id
            .checked_add(1)
            .ok_or_else(|| error!(ErrorCode::ArithmeticOverflow))?;
        Ok(id)
    }
}

// ─── Health factor ───

/// Symbolic handle for `collateral / (debt * leverage)` over the given
/// ciphertexts.
pub struct HealthFactorOp;

impl MetricDeriver for HealthFactorOp {
    fn derive_metric(&self, inputs: &[Handle; 3]) -> Handle {
        let mut hasher = blake3::Hasher::new();
        hasher.update(HEALTH_FACTOR_TAG);
        for handle in inputs {
            hasher.update(handle);
        }
        *hasher.finalize().as_bytes()
    }
}

// ─── Attestations ───

/// Message the coprocessor signs when releasing a cleartext.
pub fn attestation_digest(protocol: &Pubkey, request_id: u64, cleartext: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(ATTESTATION_TAG);
    hasher.update(protocol.as_ref());
    hasher.update(&request_id.to_le_bytes());
    hasher.update(cleartext);
    *hasher.finalize().as_bytes()
}

/// Single signature carried by an ed25519 precompile instruction.
#[derive(Debug, PartialEq, Eq)]
pub struct Ed25519Payload<'a> {
    pub signature: &'a [u8],
    pub public_key: &'a [u8],
    pub message: &'a [u8],
}

impl<'a> Ed25519Payload<'a> {
    pub const HEADER_LEN: usize = 16;
    pub const SIGNATURE_LEN: usize = 64;
    pub const PUBKEY_LEN: usize = 32;

    /// Layout: count (u8), padding (u8), then seven u16 offsets: signature,
    /// signature ix, pubkey, pubkey ix, message, message size, message ix.
    /// Only one signature whose data lives in the same instruction
    /// (ix index `u16::MAX`) is accepted.
    pub fn parse(data: &'a [u8]) -> Option<Self> {
        if data.len() < Self::HEADER_LEN || data[0] != 1 {
            return None;
        }
        let word = |at: usize| u16::from_le_bytes([data[at], data[at + 1]]);

        let signature_at = word(2) as usize;
        let public_key_at = word(6) as usize;
        let message_at = word(10) as usize;
        let message_len = word(12) as usize;

        if [word(4), word(8), word(14)].iter().any(|ix| *ix != u16::MAX) {
            return None;
        }

        Some(Self {
            signature: data.get(signature_at..signature_at + Self::SIGNATURE_LEN)?,
            public_key: data.get(public_key_at..public_key_at + Self::PUBKEY_LEN)?,
            message: data.get(message_at..message_at + message_len)?,
        })
    }

    pub fn attests(&self, signer: &Pubkey, digest: &[u8; 32], proof: &[u8]) -> bool {
        self.public_key == signer.as_ref()
            && self.message == digest.as_slice()
            && self.signature == proof
    }
}

/// Accepts a proof when the instruction right before the callback is an
/// ed25519 precompile check of that exact signature, by the configured
/// coprocessor key, over the request's attestation digest. The precompile
/// has already verified the signature by the time we run.
pub struct Ed25519Attestation<'a, 'info> {
    instructions: &'a AccountInfo<'info>,
    signer: Pubkey,
    protocol: Pubkey,
}

impl<'a, 'info> Ed25519Attestation<'a, 'info> {
    pub fn new(instructions: &'a AccountInfo<'info>, signer: Pubkey, protocol: Pubkey) -> Self {
        Self {
            instructions,
            signer,
            protocol,
        }
    }
}

impl ProofVerifier for Ed25519Attestation<'_, '_> {
    fn verify(&self, request_id: u64, cleartext: &[u8], proof: &[u8]) -> bool {
        let Ok(current) = load_current_index_checked(self.instructions) else {
            return false;
        };
        let Some(previous) = (current as usize).checked_sub(1) else {
            return false;
        };
        let Ok(ix) = load_instruction_at_checked(previous, self.instructions) else {
            return false;
        };
        if ix.program_id != ed25519_program::ID {
            return false;
        }

        let digest = attestation_digest(&self.protocol, request_id, cleartext);
        Ed25519Payload::parse(&ix.data)
            .map(|payload| payload.attests(&self.signer, &digest, proof))
            .unwrap_or(false)
    }
}
