//! Checked fixed-point arithmetic helpers
//!
//! All reward math goes through these helpers: u128 intermediates, floor
//! division, and a hard failure on overflow or on any value that would go
//! negative. No floating point anywhere in reward or fee paths.

use {
    crate::error::FarmError,
    anchor_lang::prelude::*,
    num_traits::PrimInt,
    std::fmt::Display,
};

pub fn checked_add<T>(arg1: T, arg2: T) -> Result<T>
where
    T: PrimInt + Display,
{
    if let Some(res) = arg1.checked_add(&arg2) {
        Ok(res)
    } else {
        msg!("Error: Overflow in {} + {}", arg1, arg2);
        err!(FarmError::MathOverflow)
    }
}

pub fn checked_sub<T>(arg1: T, arg2: T) -> Result<T>
where
    T: PrimInt + Display,
{
    if let Some(res) = arg1.checked_sub(&arg2) {
        Ok(res)
    } else {
        msg!("Error: Overflow in {} - {}", arg1, arg2);
        err!(FarmError::MathOverflow)
    }
}

pub fn checked_mul<T>(arg1: T, arg2: T) -> Result<T>
where
    T: PrimInt + Display,
{
    if let Some(res) = arg1.checked_mul(&arg2) {
        Ok(res)
    } else {
        msg!("Error: Overflow in {} * {}", arg1, arg2);
        err!(FarmError::MathOverflow)
    }
}

/// Floor division. Division by zero is an error, never a panic.
pub fn checked_div<T>(arg1: T, arg2: T) -> Result<T>
where
    T: PrimInt + Display,
{
    if let Some(res) = arg1.checked_div(&arg2) {
        Ok(res)
    } else {
        msg!("Error: Overflow in {} / {}", arg1, arg2);
        err!(FarmError::MathOverflow)
    }
}

pub fn checked_as_u64<T>(arg: T) -> Result<u64>
where
    T: Display + num_traits::ToPrimitive + Clone,
{
    let option: Option<u64> = num_traits::NumCast::from(arg.clone());
    if let Some(res) = option {
        Ok(res)
    } else {
        msg!("Error: Overflow in {} as u64", arg);
        err!(FarmError::MathOverflow)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_division_truncates_toward_zero() {
        assert_eq!(0u128, checked_div(99u128, 100).unwrap());
        assert_eq!(1u128, checked_div(199u128, 100).unwrap());
    }

    #[test]
    fn test_checked_sub_never_negative() {
        assert!(checked_sub(1u64, 2u64).is_err());
    }
}
