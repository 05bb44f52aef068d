//! CPI client for the external AMM adapter program
//!
//! The adapter converts between a pair's main token and its liquidity-pool
//! receipt token. Instructions are built manually against the adapter's
//! Anchor interface; account metas are forwarded from the caller's remaining
//! accounts in the order the adapter declares them. Callers must finish all
//! farm bookkeeping and flush accounts before invoking anything here.

use {
    crate::error::FarmError,
    anchor_lang::{
        prelude::*,
        solana_program::{
            instruction::{AccountMeta, Instruction},
            program::{get_return_data, invoke_signed},
        },
    },
};

/// Anchor instruction discriminators of the adapter interface
mod discriminators {
    /// sighash of "global:add_liquidity"
    pub const ADD_LIQUIDITY: [u8; 8] = [181, 157, 89, 67, 143, 182, 52, 72];
    /// sighash of "global:remove_liquidity"
    pub const REMOVE_LIQUIDITY: [u8; 8] = [80, 85, 209, 72, 24, 206, 177, 108];
}

/// Instruction data: 8 byte discriminator followed by the amount
fn instruction_data(discriminator: [u8; 8], amount: u64) -> Vec<u8> {
    let mut data = discriminator.to_vec();
    data.extend_from_slice(&amount.to_le_bytes());
    data
}

fn forwarded_metas(accounts: &[AccountInfo]) -> Vec<AccountMeta> {
    accounts
        .iter()
        .map(|account| AccountMeta {
            pubkey: *account.key,
            is_signer: account.is_signer,
            is_writable: account.is_writable,
        })
        .collect()
}

/// Amount returned by the adapter through return data
fn returned_amount(adapter_program: &Pubkey) -> Result<u64> {
    let (program, data) =
        get_return_data().ok_or_else(|| error!(FarmError::InvalidAdapterResponse))?;
    require_keys_eq!(program, *adapter_program, FarmError::InvalidAdapterResponse);
    let bytes: [u8; 8] = data
        .get(..8)
        .and_then(|slice| slice.try_into().ok())
        .ok_or_else(|| error!(FarmError::InvalidAdapterResponse))?;
    Ok(u64::from_le_bytes(bytes))
}

fn invoke_adapter<'info>(
    adapter_program: &AccountInfo<'info>,
    accounts: &[AccountInfo<'info>],
    discriminator: [u8; 8],
    amount: u64,
    signer_seeds: &[&[&[u8]]],
) -> Result<u64> {
    let instruction = Instruction {
        program_id: *adapter_program.key,
        accounts: forwarded_metas(accounts),
        data: instruction_data(discriminator, amount),
    };

    invoke_signed(&instruction, accounts, signer_seeds)?;

    returned_amount(adapter_program.key)
}

/// Convert main tokens into liquidity-pool tokens
///
/// The adapter pulls `main_amount` from the payer leg and mints the pool's
/// receipt token to the destination leg among the forwarded accounts.
/// Returns the amount of liquidity-pool tokens produced.
pub fn wrap_liquidity<'info>(
    adapter_program: &AccountInfo<'info>,
    accounts: &[AccountInfo<'info>],
    main_amount: u64,
    signer_seeds: &[&[&[u8]]],
) -> Result<u64> {
    invoke_adapter(
        adapter_program,
        accounts,
        discriminators::ADD_LIQUIDITY,
        main_amount,
        signer_seeds,
    )
}

/// Convert liquidity-pool tokens back into main tokens
///
/// Returns the amount of main tokens produced for the destination leg.
pub fn unwrap_liquidity<'info>(
    adapter_program: &AccountInfo<'info>,
    accounts: &[AccountInfo<'info>],
    lp_amount: u64,
    signer_seeds: &[&[&[u8]]],
) -> Result<u64> {
    invoke_adapter(
        adapter_program,
        accounts,
        discriminators::REMOVE_LIQUIDITY,
        lp_amount,
        signer_seeds,
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_instruction_data_layout() {
        let data = instruction_data(discriminators::ADD_LIQUIDITY, 0x0102_0304_0506_0708);
        assert_eq!(data.len(), 16);
        assert_eq!(data[..8], discriminators::ADD_LIQUIDITY);
        // amount is little-endian after the discriminator
        assert_eq!(data[8..], [0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01]);
    }
}
