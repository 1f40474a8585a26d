use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest loan term the service will quote.
pub const MAX_TERM_MONTHS: i64 = 360;

pub const SUCCESS_MESSAGE: &str = "Request created successfully";

const INVALID_NUMBERS: &str = "Please enter valid numeric values";
const PRICE_NOT_POSITIVE: &str = "Price must be greater than 0";
const DOWN_PAYMENT_EXCEEDS_PRICE: &str = "Down payment cannot exceed the full price";
const DOWN_PAYMENT_NEGATIVE: &str = "Down payment cannot be negative";
const TERM_NOT_POSITIVE: &str = "Loan term must be greater than 0 months";
const TERM_TOO_LONG: &str = "Maximum loan term is 360 months";

/// Raw form fields exactly as submitted. Missing fields deserialize to empty
/// strings and are rejected by the numeric parse, never by the extractor.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoanRequest {
    #[serde(default, rename = "fullPrice")]
    pub full_price: String,
    #[serde(default, rename = "downPayment")]
    pub down_payment: String,
    #[serde(default, rename = "monthsToPay")]
    pub months_to_pay: String,
}

impl LoanRequest {
    pub fn new(
        full_price: impl Into<String>,
        down_payment: impl Into<String>,
        months_to_pay: impl Into<String>,
    ) -> Self {
        Self {
            full_price: full_price.into(),
            down_payment: down_payment.into(),
            months_to_pay: months_to_pay.into(),
        }
    }
}

/// A loan triple that passed every check. Only `validate` constructs one, so
/// `full_price > 0`, `0 <= down_payment < full_price` and
/// `1 <= months_to_pay <= 360` hold for every value of this type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidatedLoan {
    full_price: f64,
    down_payment: f64,
    months_to_pay: i64,
}

impl ValidatedLoan {
    /// Flat monthly payment: principal split evenly across the term, full
    /// f64 precision, no rounding.
    pub fn monthly_payment(&self) -> f64 {
        (self.full_price - self.down_payment) / self.months_to_pay as f64
    }

    pub fn full_price(&self) -> f64 {
        self.full_price
    }

    pub fn down_payment(&self) -> f64 {
        self.down_payment
    }

    pub fn months_to_pay(&self) -> i64 {
        self.months_to_pay
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationError {
    pub message: &'static str,
    pub code: u16,
}

impl ValidationError {
    fn bad_request(message: &'static str) -> Self {
        Self { message, code: 400 }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Runs the ordered validation chain. The first failing check decides the
/// reported error; later checks are never consulted.
pub fn validate(request: &LoanRequest) -> Result<ValidatedLoan, ValidationError> {
    let full_price = request.full_price.parse::<f64>();
    let down_payment = request.down_payment.parse::<f64>();
    let months_to_pay = request.months_to_pay.parse::<i64>();

    let (Ok(full_price), Ok(down_payment), Ok(months_to_pay)) =
        (full_price, down_payment, months_to_pay)
    else {
        return Err(ValidationError::bad_request(INVALID_NUMBERS));
    };

    let checks = [
        (full_price <= 0.0, PRICE_NOT_POSITIVE),
        (down_payment >= full_price, DOWN_PAYMENT_EXCEEDS_PRICE),
        (down_payment < 0.0, DOWN_PAYMENT_NEGATIVE),
        (months_to_pay <= 0, TERM_NOT_POSITIVE),
        (months_to_pay > MAX_TERM_MONTHS, TERM_TOO_LONG),
    ];

    for (failed, message) in checks {
        if failed {
            return Err(ValidationError::bad_request(message));
        }
    }

    Ok(ValidatedLoan {
        full_price,
        down_payment,
        months_to_pay,
    })
}

/// The one JSON shape every `/calculate` response takes, success or failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseEnvelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_payment: Option<f64>,
    #[serde(rename = "error", skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<u16>,
}

impl ResponseEnvelope {
    pub fn created(monthly_payment: f64) -> Self {
        Self {
            success: true,
            message: Some(SUCCESS_MESSAGE.to_string()),
            monthly_payment: Some(monthly_payment),
            error_message: None,
            error_code: None,
        }
    }

    pub fn rejected(message: impl Into<String>, code: u16) -> Self {
        Self {
            success: false,
            message: None,
            monthly_payment: None,
            error_message: Some(message.into()),
            error_code: Some(code),
        }
    }
}

impl From<ValidationError> for ResponseEnvelope {
    fn from(error: ValidationError) -> Self {
        Self::rejected(error.message, error.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reject(full_price: &str, down_payment: &str, months: &str) -> ValidationError {
        validate(&LoanRequest::new(full_price, down_payment, months))
            .expect_err("triple should be rejected")
    }

    #[test]
    fn valid_triple_passes_with_exact_quotient() {
        let loan = validate(&LoanRequest::new("10000", "2000", "24")).expect("triple is valid");
        assert_eq!(loan.monthly_payment(), 8000.0 / 24.0);
        assert_eq!(loan.full_price(), 10000.0);
        assert_eq!(loan.down_payment(), 2000.0);
        assert_eq!(loan.months_to_pay(), 24);
    }

    #[test]
    fn zero_down_payment_is_allowed() {
        let loan = validate(&LoanRequest::new("1200", "0", "12")).expect("zero down is valid");
        assert_eq!(loan.monthly_payment(), 100.0);
    }

    #[test]
    fn non_numeric_fields_fail_the_parse_check() {
        for request in [
            LoanRequest::new("abc", "2000", "24"),
            LoanRequest::new("10000", "", "24"),
            LoanRequest::new("10000", "2000", "2.5"),
        ] {
            let error = validate(&request).expect_err("parse should fail");
            assert_eq!(error.message, INVALID_NUMBERS);
            assert_eq!(error.code, 400);
        }
    }

    #[test]
    fn zero_price_is_rejected() {
        assert_eq!(reject("0", "0", "12").message, PRICE_NOT_POSITIVE);
    }

    #[test]
    fn down_payment_equal_to_price_is_rejected() {
        assert_eq!(reject("5000", "5000", "12").message, DOWN_PAYMENT_EXCEEDS_PRICE);
    }

    #[test]
    fn down_payment_above_price_is_rejected() {
        assert_eq!(reject("5000", "6000", "12").message, DOWN_PAYMENT_EXCEEDS_PRICE);
    }

    #[test]
    fn negative_down_payment_is_rejected() {
        assert_eq!(reject("5000", "-1", "12").message, DOWN_PAYMENT_NEGATIVE);
    }

    #[test]
    fn earlier_checks_win_when_several_fail() {
        // the negative down payment and zero term fail their own checks too,
        // but the price check runs first
        assert_eq!(reject("-1", "-5", "0").message, PRICE_NOT_POSITIVE);
    }

    #[test]
    fn term_boundaries_are_inclusive_at_360() {
        assert_eq!(reject("1000", "0", "0").message, TERM_NOT_POSITIVE);
        assert_eq!(reject("1000", "0", "361").message, TERM_TOO_LONG);
        assert!(validate(&LoanRequest::new("1000", "0", "360")).is_ok());
    }

    #[test]
    fn identical_inputs_yield_identical_envelopes() {
        let request = LoanRequest::new("9999.5", "100.25", "36");
        let first = validate(&request).expect("valid").monthly_payment();
        let second = validate(&request).expect("valid").monthly_payment();
        assert_eq!(
            ResponseEnvelope::created(first),
            ResponseEnvelope::created(second)
        );
    }

    #[test]
    fn envelope_serializes_only_the_relevant_fields() {
        let success = serde_json::to_value(ResponseEnvelope::created(250.0)).expect("serializes");
        assert_eq!(success["success"], true);
        assert_eq!(success["monthly_payment"], 250.0);
        assert_eq!(success["message"], SUCCESS_MESSAGE);
        assert!(success.get("error").is_none());
        assert!(success.get("error_code").is_none());

        let failure =
            serde_json::to_value(ResponseEnvelope::rejected(TERM_TOO_LONG, 400)).expect("serializes");
        assert_eq!(failure["success"], false);
        assert_eq!(failure["error"], TERM_TOO_LONG);
        assert_eq!(failure["error_code"], 400);
        assert!(failure.get("message").is_none());
        assert!(failure.get("monthly_payment").is_none());
    }
}
