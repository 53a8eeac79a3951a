use alloy::primitives::U256;
use thiserror::Error;

/// Largest decimals value accepted for display and scaling. `10^77` is the
/// largest power of ten that fits a U256.
pub const MAX_DECIMALS: u8 = 77;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,

    #[error("'{0}' is not a decimal number")]
    NotANumber(String),

    #[error("amount must be greater than zero")]
    NotPositive,

    #[error("amount has more than {decimals} fractional digits")]
    TooPrecise { decimals: u8 },

    #[error("amount does not fit in 256 bits")]
    Overflow,

    #[error("decimals {0} out of range")]
    Decimals(u8),
}

fn ten_pow(decimals: u8) -> Result<U256, AmountError> {
    if decimals > MAX_DECIMALS {
        return Err(AmountError::Decimals(decimals));
    }
    Ok(U256::from(10u8).pow(U256::from(decimals)))
}

/// Render a raw integer token amount as a decimal string, e.g.
/// `normalize(1_500_000, 6) == "1.5"`. Integer arithmetic only; trailing
/// fractional zeros are trimmed.
pub fn normalize(raw: U256, decimals: u8) -> String {
    let Ok(unit) = ten_pow(decimals) else {
        return raw.to_string();
    };
    let (whole, frac) = raw.div_rem(unit);
    if frac.is_zero() {
        return whole.to_string();
    }
    let frac = format!("{:0>width$}", frac.to_string(), width = decimals as usize);
    format!("{whole}.{}", frac.trim_end_matches('0'))
}

/// Parse a user-entered decimal string into base units for a token with
/// `decimals`. Rejects negatives, zero, exponents and excess precision.
pub fn to_base_units(amount: &str, decimals: u8) -> Result<U256, AmountError> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err(AmountError::Empty);
    }
    let (whole, frac) = match amount.split_once('.') {
        Some((w, f)) => (w, f),
        None => (amount, ""),
    };
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (whole.is_empty() && frac.is_empty()) || !all_digits(whole) || !all_digits(frac) {
        return Err(AmountError::NotANumber(amount.to_string()));
    }

    let frac = frac.trim_end_matches('0');
    if frac.len() > decimals as usize {
        return Err(AmountError::TooPrecise { decimals });
    }

    let unit = ten_pow(decimals)?;
    let whole = if whole.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(whole, 10).map_err(|_| AmountError::Overflow)?
    };
    let frac_units = if frac.is_empty() {
        U256::ZERO
    } else {
        let padded = format!("{frac:0<width$}", width = decimals as usize);
        U256::from_str_radix(&padded, 10).map_err(|_| AmountError::Overflow)?
    };

    let value = whole
        .checked_mul(unit)
        .and_then(|v| v.checked_add(frac_units))
        .ok_or(AmountError::Overflow)?;
    if value.is_zero() {
        return Err(AmountError::NotPositive);
    }
    Ok(value)
}

/// Check that `amount` is a positive decimal without knowing the token yet.
/// Scales by exactly as many places as the input has, so only the digits
/// themselves can overflow.
pub fn validate_decimal(amount: &str) -> Result<(), AmountError> {
    let places = amount
        .trim()
        .split_once('.')
        .map_or(0, |(_, frac)| frac.trim_end_matches('0').len());
    let places = u8::try_from(places)
        .ok()
        .filter(|p| *p <= MAX_DECIMALS)
        .ok_or(AmountError::TooPrecise { decimals: MAX_DECIMALS })?;
    to_base_units(amount, places).map(|_| ())
}
