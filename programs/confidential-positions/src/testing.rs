//! Fixtures shared by the unit tests.

use anchor_lang::error::Error;
use anchor_lang::prelude::*;

use crate::coprocessor::{MetricDeriver, ProofVerifier};
use crate::errors::ErrorCode;
use crate::events::{DecryptionCompleted, DecryptionRequested, PositionSubmitted};
use crate::oracle::{fulfill_decryption, request_decryption, DecryptionRequest};
use crate::registry::{submit_position, EncryptedPosition, Handle, Submission};
use crate::state::*;

pub const OWNER: u8 = 1;
pub const PROVIDER: u8 = 10;
pub const DEFAULT_USER: u8 = 20;
pub const DEFAULT_COOLDOWN_WINDOW: i64 = 60;

pub fn key(n: u8) -> Pubkey {
    Pubkey::new_from_array([n; 32])
}

pub fn expect_error<T>(result: Result<T>, expected: ErrorCode) {
    match result {
        Ok(_) => panic!("expected {expected:?}, call succeeded"),
        Err(Error::AnchorError(err)) => {
            assert_eq!(err.error_code_number, u32::from(expected), "{}", err.error_msg)
        }
        Err(other) => panic!("expected {expected:?}, got {other:?}"),
    }
}

pub fn config_with_owner(owner: Pubkey) -> ProtocolConfig {
    ProtocolConfig {
        bump: 255,
        owner,
        coprocessor: key(99),
        paused: false,
        cooldown_window: DEFAULT_COOLDOWN_WINDOW,
        current_batch: 1,
    }
}

pub fn blank_batch() -> BatchAccount {
    BatchAccount {
        bump: 0,
        id: 0,
        closed: false,
        opened_at: 0,
        closed_at: None,
    }
}

pub fn open_batch(id: u64, now: i64) -> BatchAccount {
    let mut batch = blank_batch();
    batch.open(250, id, now);
    batch
}

pub fn blank_context() -> DecryptionContext {
    DecryptionContext {
        bump: 0,
        request_id: 0,
        batch_id: 0,
        user: Pubkey::default(),
        requester: Pubkey::default(),
        commitment: [0u8; 32],
        processed: false,
        requested_at: 0,
        completed_at: None,
    }
}

/// Distinct, initialized handles for each `seed`.
pub fn sample_position(seed: u8) -> EncryptedPosition {
    let handle = |field: u8| -> Handle {
        let mut handle = [seed; 32];
        handle[0] = field;
        handle
    };
    EncryptedPosition {
        collateral: handle(1),
        debt: handle(2),
        leverage: handle(3),
    }
}

pub struct HealthFactorStub;

impl MetricDeriver for HealthFactorStub {
    fn derive_metric(&self, inputs: &[Handle; 3]) -> Handle {
        let mut out = [0u8; 32];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = inputs[0][i] ^ inputs[1][i].rotate_left(1) ^ inputs[2][i].rotate_left(2);
        }
        out
    }
}

pub struct AcceptAll;

impl ProofVerifier for AcceptAll {
    fn verify(&self, _request_id: u64, _cleartext: &[u8], _proof: &[u8]) -> bool {
        true
    }
}

pub struct RejectAll;

impl ProofVerifier for RejectAll {
    fn verify(&self, _request_id: u64, _cleartext: &[u8], _proof: &[u8]) -> bool {
        false
    }
}

/// One provider, one user, batch 1 open, nothing submitted yet.
pub struct Fixture {
    pub config: ProtocolConfig,
    pub role: ProviderRole,
    pub cooldown: CooldownLedger,
    pub batch: BatchAccount,
    pub position: PositionAccount,
    pub gateway: DecryptionGateway,
    pub context: DecryptionContext,
}

impl Fixture {
    pub fn new() -> Self {
        let mut role = ProviderRole {
            bump: 0,
            provider: Pubkey::default(),
            enabled: false,
        };
        role.assign(253, key(PROVIDER), true, 0);

        let mut gateway = DecryptionGateway {
            bump: 0,
            callback_target: Pubkey::default(),
            next_request_id: 0,
        };
        gateway.setup(252, crate::ID);

        let mut cooldown = CooldownLedger::default();
        cooldown.bind(251, key(PROVIDER));

        Self {
            config: config_with_owner(key(OWNER)),
            role,
            cooldown,
            batch: open_batch(1, 0),
            position: PositionAccount::default(),
            gateway,
            context: blank_context(),
        }
    }

    pub fn submit(&mut self, position: EncryptedPosition, now: i64) -> Result<PositionSubmitted> {
        self.submit_as(key(PROVIDER), key(DEFAULT_USER), position, now)
    }

    pub fn submit_as(
        &mut self,
        provider: Pubkey,
        user: Pubkey,
        position: EncryptedPosition,
        now: i64,
    ) -> Result<PositionSubmitted> {
        submit_position(
            Submission {
                config: &self.config,
                role: Some(&self.role),
                cooldown: &mut self.cooldown,
                batch: &self.batch,
                position: &mut self.position,
                position_bump: 249,
            },
            provider,
            user,
            position,
            now,
        )
    }

    pub fn request(&mut self, user: Pubkey, now: i64) -> Result<DecryptionRequested> {
        self.request_as(key(PROVIDER), user, now)
    }

    pub fn request_as(
        &mut self,
        requester: Pubkey,
        user: Pubkey,
        now: i64,
    ) -> Result<DecryptionRequested> {
        let mut context = std::mem::replace(&mut self.context, blank_context());
        let result = self.request_with(&mut context, requester, user, now);
        self.context = context;
        result
    }

    pub fn request_into(
        &mut self,
        context: &mut DecryptionContext,
        user: Pubkey,
        now: i64,
    ) -> Result<DecryptionRequested> {
        self.request_with(context, key(PROVIDER), user, now)
    }

    fn request_with(
        &mut self,
        context: &mut DecryptionContext,
        requester: Pubkey,
        user: Pubkey,
        now: i64,
    ) -> Result<DecryptionRequested> {
        request_decryption(
            DecryptionRequest {
                config: &self.config,
                role: Some(&self.role),
                cooldown: &mut self.cooldown,
                batch: &self.batch,
                position: Some(&self.position),
                gateway: &mut self.gateway,
                context,
                context_bump: 248,
            },
            &HealthFactorStub,
            &crate::ID,
            requester,
            user,
            now,
        )
    }

    pub fn fulfill(
        &mut self,
        request_id: u64,
        cleartext: &[u8],
        now: i64,
    ) -> Result<DecryptionCompleted> {
        fulfill_decryption(
            &self.config,
            Some(&mut self.context),
            &self.position,
            &HealthFactorStub,
            &AcceptAll,
            &crate::ID,
            request_id,
            cleartext,
            &[],
            now,
        )
    }
}
