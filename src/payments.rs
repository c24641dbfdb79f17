//! `upi://pay` deep links for settling up outside the app.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::UpiConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::money::Money;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct UpiLinkRequest {
    pub payee_vpa: String,
    pub payee_name: String,
    pub amount: Money,
    #[serde(default)]
    pub note: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct UpiLink {
    pub link: String,
}

/// Whether `vpa` looks like a UPI virtual payment address (`name@handle`).
pub fn is_vpa(vpa: &str) -> bool {
    match vpa.split_once('@') {
        Some((name, handle)) => {
            !name.is_empty()
                && !handle.is_empty()
                && !handle.contains('@')
                && !vpa.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

pub fn upi_link(request: &UpiLinkRequest, config: &UpiConfig) -> LedgerResult<String> {
    let vpa = request.payee_vpa.trim();
    if !is_vpa(vpa) {
        return Err(LedgerError::invalid(format!("{vpa:?} is not a UPI id")));
    }
    if !request.amount.is_positive() {
        return Err(LedgerError::invalid("payment amount must be greater than zero"));
    }
    let note = match request.note.trim() {
        "" => config.default_note.as_str(),
        note => note,
    };
    let amount = request.amount.round2().to_string();
    let url = Url::parse_with_params(
        "upi://pay",
        &[
            ("pa", vpa),
            ("pn", request.payee_name.trim()),
            ("am", amount.as_str()),
            ("tn", note),
            ("cu", config.currency.as_str()),
        ],
    )
    .map_err(|err| LedgerError::invalid(err.to_string()))?;
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request(amount: Money, note: &str) -> UpiLinkRequest {
        UpiLinkRequest {
            payee_vpa: "alice@upi".to_string(),
            payee_name: "Alice Rao".to_string(),
            amount,
            note: note.to_string(),
        }
    }

    #[test]
    fn builds_link_with_two_decimal_amount() {
        let link = upi_link(&request(Money::from(1300), ""), &UpiConfig::default()).unwrap();
        assert_eq!(
            link,
            "upi://pay?pa=alice%40upi&pn=Alice+Rao&am=1300.00&tn=WealthSplit+settlement&cu=INR"
        );
    }

    #[test]
    fn rounds_amount_and_keeps_custom_note() {
        let link = upi_link(
            &request(Money::new(dec!(10.005)), "Goa dinner"),
            &UpiConfig::default(),
        )
        .unwrap();
        assert!(link.contains("am=10.01"));
        assert!(link.contains("tn=Goa+dinner"));
    }

    #[test]
    fn rejects_bad_input() {
        let config = UpiConfig::default();
        assert!(upi_link(&request(Money::ZERO, ""), &config).is_err());
        let mut bad_vpa = request(Money::from(5), "");
        bad_vpa.payee_vpa = "alice".to_string();
        assert!(upi_link(&bad_vpa, &config).is_err());
    }

    #[test]
    fn vpa_shape() {
        assert!(is_vpa("bob@okbank"));
        assert!(!is_vpa("@okbank"));
        assert!(!is_vpa("bob@"));
        assert!(!is_vpa("bob@ok@bank"));
        assert!(!is_vpa("bo b@okbank"));
    }
}
