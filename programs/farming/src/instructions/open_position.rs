//! OpenPosition instruction handler
//!
//! Stakes liquidity into a setup and creates the position account. The stake
//! can arrive as liquidity-pool tokens directly or as the pair's main token,
//! in which case the AMM adapter converts it first and the produced LP amount
//! is what gets booked.

use {
    crate::{
        adapter,
        error::FarmError,
        math,
        state::{farm::Farm, position::Position},
    },
    anchor_lang::prelude::*,
    anchor_spl::token::{Mint, Token, TokenAccount},
};

/// Accounts required for opening a position
#[derive(Accounts)]
#[instruction(params: OpenPositionParams)]
pub struct OpenPosition<'info> {
    /// Owner of the new position (signer); pays for account creation
    #[account(mut)]
    pub owner: Signer<'info>,

    /// User's token account the stake is pulled from
    ///
    /// Holds liquidity-pool tokens or the pair's main token depending on
    /// `params.amount_is_lp_token`; validated against the setup in the handler
    #[account(
        mut,
        constraint = funding_account.owner == owner.key()
    )]
    pub funding_account: Box<Account<'info, TokenAccount>>,

    /// Transfer authority PDA for token transfers
    ///
    /// CHECK: Empty PDA, authority for token accounts
    #[account(
        seeds = [b"transfer_authority"],
        bump = farm.transfer_authority_bump
    )]
    pub transfer_authority: AccountInfo<'info>,

    /// Farm singleton (mutable, setup stats will be updated)
    #[account(
        mut,
        seeds = [b"farm"],
        bump = farm.farm_bump
    )]
    pub farm: Box<Account<'info, Farm>>,

    /// New position account, seeded by the next position id
    #[account(
        init,
        payer = owner,
        space = Position::LEN,
        seeds = [b"position",
                 &farm.next_position_id.to_le_bytes()],
        bump
    )]
    pub position: Box<Account<'info, Position>>,

    /// Mint of the setup's liquidity-pool token
    pub lp_mint: Box<Account<'info, Mint>>,

    /// Farm vault holding staked liquidity-pool tokens for this mint
    #[account(
        init_if_needed,
        payer = owner,
        token::mint = lp_mint,
        token::authority = transfer_authority,
        seeds = [b"vault", lp_mint.key().as_ref()],
        bump
    )]
    pub setup_vault: Box<Account<'info, TokenAccount>>,

    /// AMM adapter program for main-token conversions
    ///
    /// CHECK: validated against the farm's configured adapter
    #[account(
        constraint = adapter_program.key() == farm.adapter_program
    )]
    pub adapter_program: AccountInfo<'info>,

    system_program: Program<'info, System>,
    token_program: Program<'info, Token>,
    // remaining accounts: forwarded to the adapter on main-token conversions
}

/// Parameters for opening a position
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy)]
pub struct OpenPositionParams {
    /// Arena index of the setup to stake into
    pub setup_index: u64,
    /// Stake amount, in LP units or main-token units
    pub amount: u64,
    /// Whether `amount` is already denominated in liquidity-pool tokens
    pub amount_is_lp_token: bool,
}

pub fn open_position<'info>(
    ctx: Context<'_, '_, '_, 'info, OpenPosition<'info>>,
    params: &OpenPositionParams,
) -> Result<()> {
    msg!("Validate inputs");
    let farm = ctx.accounts.farm.as_mut();
    let setup = farm.setup(params.setup_index)?;
    require_keys_eq!(
        ctx.accounts.lp_mint.key(),
        setup.liquidity_pool_token,
        FarmError::InvalidSetupConfig
    );
    let expected_funding_mint = if params.amount_is_lp_token {
        setup.liquidity_pool_token
    } else {
        setup.main_token
    };
    require_keys_eq!(
        ctx.accounts.funding_account.mint,
        expected_funding_mint,
        FarmError::InvalidSetupConfig
    );

    // Resolve the stake to LP units, converting through the adapter if needed
    let lp_amount = if params.amount_is_lp_token {
        params.amount
    } else {
        msg!("Convert main tokens through adapter");
        let vault_before = ctx.accounts.setup_vault.amount;

        farm.begin_external_call()?;
        ctx.accounts.farm.exit(&crate::ID)?;
        let produced = adapter::wrap_liquidity(
            &ctx.accounts.adapter_program,
            ctx.remaining_accounts,
            params.amount,
            &[],
        )?;
        let farm = ctx.accounts.farm.as_mut();
        farm.end_external_call();

        ctx.accounts.setup_vault.reload()?;
        let received = math::checked_sub(ctx.accounts.setup_vault.amount, vault_before)?;
        require!(received >= produced, FarmError::InvalidAdapterResponse);
        produced
    };

    msg!("Record position");
    let farm = ctx.accounts.farm.as_mut();
    let block = farm.get_block()?;
    let mut record = farm.open_position(
        params.setup_index,
        lp_amount,
        ctx.accounts.owner.key(),
        block,
    )?;
    record.bump = ctx.bumps.position;
    ctx.accounts.position.set_inner(record);

    // Direct LP stakes move into the vault after bookkeeping is final
    if params.amount_is_lp_token {
        msg!("Transfer tokens");
        ctx.accounts.farm.transfer_tokens_from_user(
            ctx.accounts.funding_account.to_account_info(),
            ctx.accounts.setup_vault.to_account_info(),
            ctx.accounts.owner.to_account_info(),
            ctx.accounts.token_program.to_account_info(),
            lp_amount,
        )?;
    }

    Ok(())
}
