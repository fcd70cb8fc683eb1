use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::tag::EnumTag;

/// Money amounts are fixed-point decimals; balances are kept at 2 decimal places.
pub type Amount = Decimal;

/// Number of decimal places used for balances and transaction amounts.
pub const MONEY_SCALE: u32 = 2;

/// Supported account currencies.
/// Reading also accepts `Euro` and the positional tags 0, 1, 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "EnumTag")]
pub enum Currency {
    #[serde(rename = "SEK")]
    Sek,
    #[serde(rename = "EUR")]
    Eur,
    #[serde(rename = "USD")]
    Usd,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Sek => "SEK",
            Currency::Eur => "EUR",
            Currency::Usd => "USD",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "SEK" => Some(Currency::Sek),
            "EUR" | "EURO" => Some(Currency::Eur),
            "USD" => Some(Currency::Usd),
            _ => None,
        }
    }
}

impl TryFrom<EnumTag> for Currency {
    type Error = String;

    fn try_from(tag: EnumTag) -> Result<Self, Self::Error> {
        tag.resolve(
            "currency",
            &[Currency::Sek, Currency::Eur, Currency::Usd],
            Self::from_str,
        )
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Round an amount to cents using round-half-away-from-zero.
/// Example: 0.005 -> 0.01, -0.005 -> -0.01, 0.0049 -> 0.00
pub fn round_money(amount: Amount) -> Amount {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Format an amount with exactly two decimals.
/// Example: 50 -> "50.00", -12.3 -> "-12.30"
pub fn format_amount(amount: Amount) -> String {
    format!("{:.2}", round_money(amount))
}

/// Parse a user supplied decimal string into an amount.
/// Example: "50" -> 50, "12.5" -> 12.5, "0.01" -> 0.01
///
/// More than two decimal places is rejected rather than silently rounded.
pub fn parse_amount(input: &str) -> Result<Amount, ParseAmountError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ParseAmountError::InvalidFormat);
    }
    let amount = Decimal::from_str(input).map_err(|_| ParseAmountError::InvalidFormat)?;
    if amount.scale() > MONEY_SCALE && amount != round_money(amount) {
        return Err(ParseAmountError::TooPrecise);
    }
    Ok(amount.normalize())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseAmountError {
    InvalidFormat,
    TooPrecise,
}

impl fmt::Display for ParseAmountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseAmountError::InvalidFormat => write!(f, "invalid money format"),
            ParseAmountError::TooPrecise => write!(f, "at most two decimal places are allowed"),
        }
    }
}

impl std::error::Error for ParseAmountError {}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_money_half_away_from_zero() {
        assert_eq!(round_money(dec!(0.005)), dec!(0.01));
        assert_eq!(round_money(dec!(0.015)), dec!(0.02));
        assert_eq!(round_money(dec!(0.025)), dec!(0.03));
        assert_eq!(round_money(dec!(-0.005)), dec!(-0.01));
        assert_eq!(round_money(dec!(0.0049)), dec!(0.00));
        assert_eq!(round_money(dec!(19.99999999)), dec!(20.00));
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(dec!(50)), "50.00");
        assert_eq!(format_amount(dec!(12.3)), "12.30");
        assert_eq!(format_amount(dec!(0.01)), "0.01");
        assert_eq!(format_amount(dec!(-12.34)), "-12.34");
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("50"), Ok(dec!(50)));
        assert_eq!(parse_amount("50.00"), Ok(dec!(50)));
        assert_eq!(parse_amount("12.5"), Ok(dec!(12.5)));
        assert_eq!(parse_amount(" 0.01 "), Ok(dec!(0.01)));
        assert_eq!(parse_amount("-3"), Ok(dec!(-3)));
        assert_eq!(parse_amount("1.2300"), Ok(dec!(1.23)));
    }

    #[test]
    fn test_parse_amount_invalid() {
        assert_eq!(parse_amount("abc"), Err(ParseAmountError::InvalidFormat));
        assert_eq!(parse_amount(""), Err(ParseAmountError::InvalidFormat));
        assert_eq!(parse_amount("12.34.56"), Err(ParseAmountError::InvalidFormat));
        assert_eq!(parse_amount("1.005"), Err(ParseAmountError::TooPrecise));
    }

    #[test]
    fn test_currency_roundtrip() {
        for currency in [Currency::Sek, Currency::Eur, Currency::Usd] {
            assert_eq!(Currency::from_str(currency.as_str()), Some(currency));
        }
        assert_eq!(Currency::from_str("euro"), Some(Currency::Eur));
        assert_eq!(Currency::from_str("GBP"), None);
    }

    #[test]
    fn test_currency_serde_tags() {
        assert_eq!(serde_json::to_string(&Currency::Sek).unwrap(), "\"SEK\"");
        let parsed: Currency = serde_json::from_str("\"Euro\"").unwrap();
        assert_eq!(parsed, Currency::Eur);
        let parsed: Currency = serde_json::from_str("2").unwrap();
        assert_eq!(parsed, Currency::Usd);
        assert!(serde_json::from_str::<Currency>("3").is_err());
        assert!(serde_json::from_str::<Currency>("\"GBP\"").is_err());
    }
}
