use std::fmt;

use alloy::primitives::Address;

use crate::evm;
use crate::model::amount::{self, AmountError};

/// Raw user input for the Deposit stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepositForm {
    pub token_address: String,
    pub amount: String,
}

/// Per-field messages, shown next to the input they belong to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors {
    pub token_address: Option<String>,
    pub amount: Option<String>,
}

impl FieldErrors {
    pub fn token_address(message: impl Into<String>) -> Self {
        FieldErrors {
            token_address: Some(message.into()),
            amount: None,
        }
    }

    pub fn amount(message: impl Into<String>) -> Self {
        FieldErrors {
            token_address: None,
            amount: Some(message.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.token_address.is_none() && self.amount.is_none()
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(msg) = &self.token_address {
            parts.push(format!("token address: {msg}"));
        }
        if let Some(msg) = &self.amount {
            parts.push(format!("amount: {msg}"));
        }
        f.write_str(&parts.join("; "))
    }
}

impl std::error::Error for FieldErrors {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidDeposit {
    pub token: Address,
    pub amount: String,
}

pub fn validate(form: &DepositForm) -> Result<ValidDeposit, FieldErrors> {
    let mut errors = FieldErrors::default();

    let token_input = form.token_address.trim();
    let token = evm::parse_address(token_input);
    if token.is_none() {
        errors.token_address = Some("must be 0x followed by 40 hex characters".into());
    }

    let amount_input = form.amount.trim();
    if let Err(e) = amount::validate_decimal(amount_input) {
        errors.amount = Some(amount_message(&e));
    }

    match token {
        Some(token) if errors.is_empty() => Ok(ValidDeposit {
            token,
            amount: amount_input.to_string(),
        }),
        _ => Err(errors),
    }
}

pub(crate) fn amount_message(e: &AmountError) -> String {
    match e {
        AmountError::Empty => "required".into(),
        AmountError::NotANumber(_) => "must be a number".into(),
        AmountError::NotPositive => "must be greater than zero".into(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(token: &str, amount: &str) -> DepositForm {
        DepositForm {
            token_address: token.into(),
            amount: amount.into(),
        }
    }

    #[test]
    fn accepts_valid_input() {
        let valid = validate(&form("0x1111111111111111111111111111111111111111", "1.5")).unwrap();
        assert_eq!(valid.amount, "1.5");
    }

    #[test]
    fn reports_each_bad_field() {
        let errors = validate(&form("0x1234", "abc")).unwrap_err();
        assert!(errors.token_address.is_some());
        assert_eq!(errors.amount.as_deref(), Some("must be a number"));

        let errors = validate(&form("0x1111111111111111111111111111111111111111", "0")).unwrap_err();
        assert!(errors.token_address.is_none());
        assert_eq!(errors.amount.as_deref(), Some("must be greater than zero"));

        let errors = validate(&form("0x1111111111111111111111111111111111111111", "-2")).unwrap_err();
        assert!(errors.amount.is_some());
    }
}
