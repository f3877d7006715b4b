use anchor_lang::prelude::*;

// ─── Administration ───

#[event]
pub struct OwnershipTransferred {
    pub previous_owner: Pubkey,
    pub new_owner: Pubkey,
    pub timestamp: i64,
}

#[event]
pub struct ProviderUpdated {
    pub provider: Pubkey,
    pub enabled: bool,
    pub timestamp: i64,
}

#[event]
pub struct PauseToggled {
    pub paused: bool,
    pub timestamp: i64,
}

#[event]
pub struct CooldownWindowUpdated {
    pub previous_window: i64,
    pub new_window: i64,
    pub timestamp: i64,
}

#[event]
pub struct CoprocessorUpdated {
    pub previous_signer: Pubkey,
    pub new_signer: Pubkey,
    pub timestamp: i64,
}

// ─── Batches ───

#[event]
pub struct BatchClosed {
    pub batch_id: u64,
    pub timestamp: i64,
}

#[event]
pub struct BatchOpened {
    pub batch_id: u64,
    pub timestamp: i64,
}

// ─── Positions ───

#[event]
pub struct PositionSubmitted {
    pub batch_id: u64,
    pub user: Pubkey,
    pub provider: Pubkey,
    pub revision: u32,
    pub timestamp: i64,
}

// ─── Decryption ───

#[event]
pub struct DecryptionRequested {
    pub request_id: u64,
    pub batch_id: u64,
    pub user: Pubkey,
    pub requester: Pubkey,
    /// Ordered as collateral, debt, leverage, health factor
    pub handles: [[u8; 32]; 4],
    pub commitment: [u8; 32],
    pub timestamp: i64,
}

#[event]
pub struct DecryptionCompleted {
    pub request_id: u64,
    pub batch_id: u64,
    pub user: Pubkey,
    pub collateral: u64,
    pub debt: u64,
    pub leverage: u64,
    pub health_factor: u64,
    pub timestamp: i64,
}
