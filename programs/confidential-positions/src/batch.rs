//! Sequential submission windows. Exactly one batch is open at a time: the
//! one whose id equals `ProtocolConfig::current_batch`.

use anchor_lang::prelude::*;

use crate::errors::ErrorCode;
use crate::events::{BatchClosed, BatchOpened};
use crate::state::{BatchAccount, ProtocolConfig};

impl BatchAccount {
    pub fn open(&mut self, bump: u8, id: u64, now: i64) -> BatchOpened {
        self.bump = bump;
        self.id = id;
        self.closed = false;
        self.opened_at = now;
        self.closed_at = None;

        BatchOpened {
            batch_id: id,
            timestamp: now,
        }
    }

    pub fn ensure_open(&self) -> Result<()> {
        require!(!self.closed, ErrorCode::BatchClosed);
        Ok(())
    }
}

impl ProtocolConfig {
    pub fn next_batch_id(&self) -> Result<u64> {
        self.current_batch
            .checked_add(1)
            .ok_or_else(|| error!(ErrorCode::ArithmeticOverflow))
    }

    /// Ids start at 1; anything past the open batch was never created.
    pub fn is_batch_closed(&self, batch_id: u64) -> Result<bool> {
        require!(
            batch_id != 0 && batch_id <= self.current_batch,
            ErrorCode::InvalidParameter
        );
        Ok(batch_id < self.current_batch)
    }

    /// Closes `current` and opens `next` in its place. Closed batches never
    /// reopen, their positions stay readable.
    pub fn close_batch_and_open_next(
        &mut self,
        caller: &Pubkey,
        current: &mut BatchAccount,
        next: &mut BatchAccount,
        next_bump: u8,
        now: i64,
    ) -> Result<(BatchClosed, BatchOpened)> {
        self.ensure_owner(caller)?;
        require!(current.id == self.current_batch, ErrorCode::InvalidParameter);
        current.ensure_open()?;
        let next_id = self.next_batch_id()?;

        current.closed = true;
        current.closed_at = Some(now);
        let opened = next.open(next_bump, next_id, now);
        self.current_batch = next_id;

        Ok((
            BatchClosed {
                batch_id: current.id,
                timestamp: now,
            },
            opened,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;

    #[test]
    fn closing_advances_ids_and_never_reopens() {
        let owner = key(1);
        let mut config = config_with_owner(owner);
        let mut batches = vec![open_batch(1, 0)];

        for now in [10, 20] {
            let mut next = blank_batch();
            let current = batches.last_mut().unwrap();
            let (closed, opened) = config
                .close_batch_and_open_next(&owner, current, &mut next, 250, now)
                .unwrap();
            assert_eq!(opened.batch_id, closed.batch_id + 1);
            batches.push(next);
        }

        assert_eq!(config.current_batch, 3);
        assert!(batches[0].closed && batches[1].closed);
        assert!(!batches[2].closed);
        assert_eq!(batches[1].closed_at, Some(20));
        assert!(config.is_batch_closed(1).unwrap());
        assert!(config.is_batch_closed(2).unwrap());
        assert!(!config.is_batch_closed(3).unwrap());

        expect_error(batches[0].ensure_open(), ErrorCode::BatchClosed);
        batches[2].ensure_open().unwrap();
    }

    #[test]
    fn only_owner_rolls_batches() {
        let mut config = config_with_owner(key(1));
        let mut current = open_batch(1, 0);
        let mut next = blank_batch();

        expect_error(
            config.close_batch_and_open_next(&key(2), &mut current, &mut next, 250, 5),
            ErrorCode::Unauthorized,
        );
        assert!(!current.closed);
        assert_eq!(config.current_batch, 1);
    }

    #[test]
    fn stale_batch_account_is_rejected() {
        let owner = key(1);
        let mut config = config_with_owner(owner);
        config.current_batch = 2;
        let mut stale = open_batch(1, 0);
        let mut next = blank_batch();

        expect_error(
            config.close_batch_and_open_next(&owner, &mut stale, &mut next, 250, 5),
            ErrorCode::InvalidParameter,
        );
        assert_eq!(config.current_batch, 2);
    }

    #[test]
    fn closed_query_rejects_ids_never_opened() {
        let mut config = config_with_owner(key(1));
        config.current_batch = 2;

        expect_error(config.is_batch_closed(0), ErrorCode::InvalidParameter);
        expect_error(config.is_batch_closed(3), ErrorCode::InvalidParameter);
        expect_error(config.is_batch_closed(u64::MAX), ErrorCode::InvalidParameter);
        assert!(config.is_batch_closed(1).unwrap());
        assert!(!config.is_batch_closed(2).unwrap());
    }
}
