use anchor_lang::prelude::*;

#[error_code]
pub enum ErrorCode {
    #[msg("Caller does not hold the required role")]
    Unauthorized,
    #[msg("Protocol is paused")]
    Paused,
    #[msg("Cooldown window has not elapsed")]
    CooldownActive,
    #[msg("Batch is closed")]
    BatchClosed,
    #[msg("Ciphertext handle is not initialized")]
    NotInitialized,
    #[msg("Unknown decryption request")]
    UnknownRequest,
    #[msg("Decryption request was already processed")]
    ReplayDetected,
    #[msg("Position changed since the decryption was requested")]
    StateMismatch,
    #[msg("Coprocessor proof did not verify")]
    InvalidProof,
    #[msg("Cleartext does not match the expected encoding")]
    MalformedCleartext,
    #[msg("Invalid parameter")]
    InvalidParameter,
    #[msg("Position account does not belong to the request")]
    PositionMismatch,
    #[msg("Arithmetic overflow")]
    ArithmeticOverflow,
}
