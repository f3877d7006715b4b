use anchor_lang::prelude::*;

/// Reads an account that may legitimately not exist yet. Anything that is
/// empty or not owned by this program is treated as absent.
pub fn load_optional<T>(info: &AccountInfo) -> Result<Option<T>>
where
    T: AccountDeserialize + Owner,
{
    if info.owner != &T::owner() || info.data_is_empty() {
        return Ok(None);
    }
    let data = info.try_borrow_data()?;
    let account = T::try_deserialize(&mut &data[..])?;
    Ok(Some(account))
}

/// Writes an account loaded through [`load_optional`] back to its data.
pub fn store<T: AccountSerialize>(info: &AccountInfo, account: &T) -> Result<()> {
    let mut data = info.try_borrow_mut_data()?;
    let mut writer: &mut [u8] = &mut data[..];
    account.try_serialize(&mut writer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::request_status;
    use crate::state::{DecryptionContext, RequestState};
    use crate::testing::{blank_context, key};

    fn with_account<R>(owner: Pubkey, data: &mut [u8], f: impl FnOnce(&AccountInfo) -> R) -> R {
        let address = key(77);
        let mut lamports = 1_000_000u64;
        let info = AccountInfo::new(&address, false, true, &mut lamports, data, &owner, false, 0);
        f(&info)
    }

    fn context_space() -> Vec<u8> {
        vec![0u8; 8 + DecryptionContext::INIT_SPACE]
    }

    #[test]
    fn empty_account_reads_as_absent() {
        let loaded = with_account(crate::ID, &mut [], |info| {
            load_optional::<DecryptionContext>(info).unwrap()
        });
        assert!(loaded.is_none());
        assert_eq!(request_status(loaded.as_ref()), RequestState::Unknown);
    }

    #[test]
    fn foreign_owned_account_reads_as_absent() {
        let mut written = context_space();
        with_account(crate::ID, &mut written, |info| {
            store(info, &blank_context()).unwrap();
        });

        let loaded = with_account(key(3), &mut written, |info| {
            load_optional::<DecryptionContext>(info).unwrap()
        });
        assert!(loaded.is_none());
    }

    #[test]
    fn stored_context_round_trips() {
        let mut context = blank_context();
        context.request_id = 9;
        context.batch_id = 2;
        context.user = key(20);
        context.commitment = [5u8; 32];
        context.processed = true;
        context.completed_at = Some(120);

        let mut data = context_space();
        let loaded = with_account(crate::ID, &mut data, |info| {
            store(info, &context).unwrap();
            load_optional::<DecryptionContext>(info).unwrap()
        });

        let loaded = loaded.unwrap();
        assert_eq!(loaded.request_id, 9);
        assert_eq!(loaded.batch_id, 2);
        assert_eq!(loaded.user, key(20));
        assert_eq!(loaded.commitment, [5u8; 32]);
        assert_eq!(loaded.completed_at, Some(120));
        assert_eq!(request_status(Some(&loaded)), RequestState::Completed);
    }

    #[test]
    fn zeroed_program_account_is_rejected() {
        let mut data = context_space();
        let result = with_account(crate::ID, &mut data, |info| {
            load_optional::<DecryptionContext>(info)
        });
        assert!(result.is_err());
    }
}
