//! Gateway error type and classification of documented Binance error codes.
//!
//! Classification works on the numeric `code` of the error body. The message is
//! consulted only for the two families Binance documents by message: `-1013`
//! filter failures, which name the failing filter (`Filter failure: NOTIONAL`),
//! and spot's `-2010` order rejections.

use serde::Deserialize;
use thiserror::Error;

/// Failure talking to the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The exchange answered with an error body.
    #[error("Binance API error {code}: {message}")]
    Api { code: i64, message: String },
    /// The request never completed (connect, TLS, timeout).
    #[error("Transport error: {0}")]
    Transport(String),
    /// The response body did not have the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(String),
    /// The connected market has no such operation.
    #[error("Unsupported on this market: {0}")]
    Unsupported(String),
}

impl GatewayError {
    pub fn api(code: i64, message: impl Into<String>) -> Self {
        GatewayError::Api {
            code,
            message: message.into(),
        }
    }

    /// Exchange error code, if the exchange produced one.
    pub fn code(&self) -> Option<i64> {
        match self {
            GatewayError::Api { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            GatewayError::Api { message, .. } => message,
            GatewayError::Transport(message)
            | GatewayError::Decode(message)
            | GatewayError::Unsupported(message) => message,
        }
    }

    /// Map the error onto the classification table.
    pub fn kind(&self) -> ApiErrorKind {
        match self {
            GatewayError::Api { code, message } => ApiErrorKind::classify(*code, message),
            _ => ApiErrorKind::Unclassified,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GatewayError::Decode(err.to_string())
        } else {
            GatewayError::Transport(err.to_string())
        }
    }
}

/// Error body returned by Binance on non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub code: i64,
    pub msg: String,
}

impl From<ApiErrorBody> for GatewayError {
    fn from(body: ApiErrorBody) -> Self {
        GatewayError::Api {
            code: body.code,
            message: body.msg,
        }
    }
}

/// Placement-relevant meaning of an exchange error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// Quantity or notional below what the instrument accepts.
    InsufficientQuantity,
    /// Too many open conditional (algo/stop) orders on the account.
    AlgoOrderLimitExceeded,
    /// Trigger price is already crossed.
    TriggerWouldFireImmediately,
    /// Trailing distance rejected.
    InvalidCallbackRate,
    /// A request parameter was rejected; meaning depends on the order type.
    InvalidParameter,
    Unclassified,
}

const FILTER_FAILURE: i64 = -1013;
const FILTER_FAILURE_PREFIX: &str = "Filter failure: ";
const NEW_ORDER_REJECTED: i64 = -2010;

/// Documented Binance codes (USDⓈ-M futures and spot).
const CODE_TABLE: &[(i64, ApiErrorKind)] = &[
    (-4003, ApiErrorKind::InsufficientQuantity),
    (-4004, ApiErrorKind::InsufficientQuantity),
    (-4164, ApiErrorKind::InsufficientQuantity),
    (-4045, ApiErrorKind::AlgoOrderLimitExceeded),
    (-2021, ApiErrorKind::TriggerWouldFireImmediately),
    (-1102, ApiErrorKind::InvalidParameter),
    (-1130, ApiErrorKind::InvalidParameter),
];

/// Filter names reported under `-1013`.
const FILTER_TABLE: &[(&str, ApiErrorKind)] = &[
    ("NOTIONAL", ApiErrorKind::InsufficientQuantity),
    ("MIN_NOTIONAL", ApiErrorKind::InsufficientQuantity),
    ("LOT_SIZE", ApiErrorKind::InsufficientQuantity),
    ("MAX_NUM_ALGO_ORDERS", ApiErrorKind::AlgoOrderLimitExceeded),
    ("MAX_NUM_ORDERS", ApiErrorKind::AlgoOrderLimitExceeded),
    ("TRAILING_DELTA", ApiErrorKind::InvalidCallbackRate),
];

/// Spot rejection messages reported under `-2010`.
const REJECTION_TABLE: &[(&str, ApiErrorKind)] = &[
    ("Stop price would trigger immediately", ApiErrorKind::TriggerWouldFireImmediately),
    ("Order would trigger immediately", ApiErrorKind::TriggerWouldFireImmediately),
    (
        "The relationship of the prices for the orders is not correct",
        ApiErrorKind::TriggerWouldFireImmediately,
    ),
    ("Account has insufficient balance for requested action", ApiErrorKind::Unclassified),
];

fn lookup(table: &[(&str, ApiErrorKind)], text: &str) -> ApiErrorKind {
    let text = text.trim().trim_end_matches('.');
    table
        .iter()
        .find(|(known, _)| *known == text)
        .map(|(_, kind)| *kind)
        .unwrap_or(ApiErrorKind::Unclassified)
}

impl ApiErrorKind {
    pub fn classify(code: i64, message: &str) -> Self {
        match code {
            FILTER_FAILURE => {
                return message
                    .strip_prefix(FILTER_FAILURE_PREFIX)
                    .map(|name| lookup(FILTER_TABLE, name))
                    .unwrap_or(ApiErrorKind::Unclassified)
            }
            NEW_ORDER_REJECTED => return lookup(REJECTION_TABLE, message),
            _ => {}
        }

        CODE_TABLE
            .iter()
            .find(|(known, _)| *known == code)
            .map(|(_, kind)| *kind)
            .unwrap_or(ApiErrorKind::Unclassified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_code() {
        assert_eq!(
            ApiErrorKind::classify(-4003, "Quantity less than or equal to zero."),
            ApiErrorKind::InsufficientQuantity
        );
        assert_eq!(
            ApiErrorKind::classify(-2021, "Order would immediately trigger."),
            ApiErrorKind::TriggerWouldFireImmediately
        );
        assert_eq!(
            ApiErrorKind::classify(-4045, "Reach max stop order limit."),
            ApiErrorKind::AlgoOrderLimitExceeded
        );
        assert_eq!(
            ApiErrorKind::classify(-1121, "Invalid symbol."),
            ApiErrorKind::Unclassified
        );
    }

    #[test]
    fn test_classify_filter_failures() {
        assert_eq!(
            ApiErrorKind::classify(-1013, "Filter failure: MAX_NUM_ALGO_ORDERS"),
            ApiErrorKind::AlgoOrderLimitExceeded
        );
        assert_eq!(
            ApiErrorKind::classify(-1013, "Filter failure: NOTIONAL"),
            ApiErrorKind::InsufficientQuantity
        );
        assert_eq!(
            ApiErrorKind::classify(-1013, "Filter failure: TRAILING_DELTA"),
            ApiErrorKind::InvalidCallbackRate
        );
        assert_eq!(
            ApiErrorKind::classify(-1013, "Filter failure: PERCENT_PRICE_BY_SIDE"),
            ApiErrorKind::Unclassified
        );
        // Message text is never consulted outside the filter family
        assert_eq!(
            ApiErrorKind::classify(-1000, "Filter failure: NOTIONAL"),
            ApiErrorKind::Unclassified
        );
    }

    #[test]
    fn test_classify_spot_rejections() {
        assert_eq!(
            ApiErrorKind::classify(-2010, "Stop price would trigger immediately."),
            ApiErrorKind::TriggerWouldFireImmediately
        );
        assert_eq!(
            ApiErrorKind::classify(
                -2010,
                "The relationship of the prices for the orders is not correct."
            ),
            ApiErrorKind::TriggerWouldFireImmediately
        );
        assert_eq!(
            ApiErrorKind::classify(-2010, "Account has insufficient balance for requested action."),
            ApiErrorKind::Unclassified
        );
        assert_eq!(
            ApiErrorKind::classify(-2010, "Market is closed."),
            ApiErrorKind::Unclassified
        );
    }

    #[test]
    fn test_transport_errors_are_unclassified() {
        let err = GatewayError::Transport("connection reset".to_string());
        assert_eq!(err.code(), None);
        assert_eq!(err.kind(), ApiErrorKind::Unclassified);
        assert_eq!(err.message(), "connection reset");
    }
}
