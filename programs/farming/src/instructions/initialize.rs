//! Initialize instruction handler
//!
//! Creates the farm singleton, the transfer authority PDA and the reward
//! vault. Must be called exactly once, by the program's upgrade authority,
//! before any other operation.

use {
    crate::{error::FarmError, state::farm::Farm},
    anchor_lang::prelude::*,
    anchor_spl::token::{Mint, Token, TokenAccount},
};

/// Accounts required for initializing the farm
#[derive(Accounts)]
pub struct Initialize<'info> {
    /// Upgrade authority that must sign; pays for account creation
    #[account(mut)]
    pub upgrade_authority: Signer<'info>,

    /// Farm singleton to be created
    #[account(
        init,
        payer = upgrade_authority,
        space = Farm::space(0),
        seeds = [b"farm"],
        bump
    )]
    pub farm: Box<Account<'info, Farm>>,

    /// Empty PDA used as the authority for all farm token accounts
    ///
    /// CHECK: Empty PDA, will be set as authority for token accounts
    #[account(
        init,
        payer = upgrade_authority,
        space = 0,
        seeds = [b"transfer_authority"],
        bump
    )]
    pub transfer_authority: AccountInfo<'info>,

    /// Mint of the reward asset
    pub reward_mint: Box<Account<'info, Mint>>,

    /// Vault holding the reward budget and collected penalties
    #[account(
        init,
        payer = upgrade_authority,
        token::mint = reward_mint,
        token::authority = transfer_authority,
        seeds = [b"reward_vault"],
        bump
    )]
    pub reward_vault: Box<Account<'info, TokenAccount>>,

    /// ProgramData account for upgrade authority validation
    ///
    /// CHECK: ProgramData account, doesn't work in tests
    #[account()]
    pub farm_program_data: AccountInfo<'info>,

    /// This program's account (for upgrade authority validation)
    pub farm_program: Program<'info, crate::program::Farming>,

    system_program: Program<'info, System>,
    token_program: Program<'info, Token>,
}

/// Parameters for initializing the farm
#[derive(AnchorSerialize, AnchorDeserialize, Copy, Clone)]
pub struct InitializeParams {
    /// Governance key allowed to configure setups and fees
    pub authority: Pubkey,
    /// AMM adapter program used for token conversions
    pub adapter_program: Pubkey,
    /// Receiver of the protocol exit fee
    pub fee_receiver: Pubkey,
    /// Protocol exit fee, parts of [`Farm::ONE_HUNDRED`]
    pub exit_fee_bps: u64,
}

pub fn initialize(ctx: Context<Initialize>, params: &InitializeParams) -> Result<()> {
    // Only the program's upgrade authority may bring the farm up
    Farm::validate_upgrade_authority(
        ctx.accounts.upgrade_authority.key(),
        &ctx.accounts.farm_program_data,
        &ctx.accounts.farm_program,
    )?;

    let farm = ctx.accounts.farm.as_mut();

    farm.authority = params.authority;
    farm.adapter_program = params.adapter_program;
    farm.reward_mint = ctx.accounts.reward_mint.key();
    farm.fee_receiver = params.fee_receiver;
    farm.exit_fee_bps = params.exit_fee_bps;
    farm.next_position_id = 0;
    farm.setups = Vec::new();

    farm.transfer_authority_bump = ctx.bumps.transfer_authority;
    farm.farm_bump = ctx.bumps.farm;
    farm.reward_vault_bump = ctx.bumps.reward_vault;
    farm.inception_block = farm.get_block()?;
    farm.in_external_call = false;

    if !farm.validate() {
        return err!(FarmError::InvalidSetupConfig);
    }

    Ok(())
}
