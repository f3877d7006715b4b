use anchor_lang::prelude::*;

/// Global protocol settings. Mutated only by the owner.
#[account]
#[derive(InitSpace)]
pub struct ProtocolConfig {
    /// PDA bump seed
    pub bump: u8,
    /// Sole administrator
    pub owner: Pubkey,
    /// Ed25519 key whose attestations are accepted as decryption proofs
    pub coprocessor: Pubkey,
    /// Rejects every position and decryption write while set
    pub paused: bool,
    /// Minimum seconds between two actions of the same kind by one address
    pub cooldown_window: i64,
    /// Id of the batch currently open for submissions
    pub current_batch: u64,
}

impl ProtocolConfig {
    pub const SEED: &'static [u8] = b"config";
}

/// Request id issuer standing in for the coprocessor's request endpoint.
#[account]
#[derive(InitSpace)]
pub struct DecryptionGateway {
    pub bump: u8,
    /// Program whose callback receives the results
    pub callback_target: Pubkey,
    /// Id handed to the next decryption request
    pub next_request_id: u64,
}

impl DecryptionGateway {
    pub const SEED: &'static [u8] = b"gateway";
}

#[account]
#[derive(InitSpace)]
pub struct ProviderRole {
    pub bump: u8,
    pub provider: Pubkey,
    pub enabled: bool,
}

impl ProviderRole {
    pub const SEED: &'static [u8] = b"provider";
}

/// Last action timestamps for one address, one track per operation kind.
#[account]
#[derive(InitSpace, Default)]
pub struct CooldownLedger {
    pub bump: u8,
    pub owner: Pubkey,
    pub last_submission_at: Option<i64>,
    pub last_request_at: Option<i64>,
}

impl CooldownLedger {
    pub const SEED: &'static [u8] = b"cooldown";
}

#[account]
#[derive(InitSpace)]
pub struct BatchAccount {
    pub bump: u8,
    pub id: u64,
    pub closed: bool,
    pub opened_at: i64,
    pub closed_at: Option<i64>,
}

impl BatchAccount {
    pub const SEED: &'static [u8] = b"batch";
}

/// Encrypted position of one user within one batch.
#[account]
#[derive(InitSpace, Default)]
pub struct PositionAccount {
    /// PDA bump seed
    pub bump: u8,
    pub batch_id: u64,
    pub user: Pubkey,
    /// Ciphertext handles; all-zero means never assigned
    pub collateral: [u8; 32],
    pub debt: [u8; 32],
    pub leverage: [u8; 32],
    /// Provider that wrote the current handles
    pub submitted_by: Pubkey,
    pub updated_at: i64,
    /// Number of writes, starting at 1 for the first submission
    pub revision: u32,
}

impl PositionAccount {
    pub const SEED: &'static [u8] = b"position";
}

/// Pending or completed decryption. Never closed, so it doubles as the
/// replay ledger for its request id.
#[account]
#[derive(InitSpace)]
pub struct DecryptionContext {
    pub bump: u8,
    pub request_id: u64,
    pub batch_id: u64,
    /// Subject of the decryption, used to find the position on callback
    pub user: Pubkey,
    pub requester: Pubkey,
    /// Commitment over the handle snapshot taken at request time
    pub commitment: [u8; 32],
    pub processed: bool,
    pub requested_at: i64,
    pub completed_at: Option<i64>,
}

impl DecryptionContext {
    pub const SEED: &'static [u8] = b"request";
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestState {
    Unknown,
    Pending,
    Completed,
}
