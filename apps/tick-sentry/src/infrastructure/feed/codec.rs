//! Book-Ticker Frame Decoding
//!
//! Decodes the Binance `<symbol>@bookTicker` stream payload. The venue uses
//! single-letter field names and string-encoded decimals.

use rust_decimal::Decimal;
use serde::Deserialize;

/// One top-of-book update as the venue encodes it.
#[derive(Debug, Clone, Deserialize)]
pub struct BookTickerFrame {
    /// Order book update id.
    #[serde(rename = "u")]
    pub update_id: u64,
    /// Symbol in venue notation (e.g. "BTCUSDT").
    #[serde(rename = "s")]
    pub symbol: String,
    /// Best bid price.
    #[serde(rename = "b", with = "rust_decimal::serde::str")]
    pub best_bid: Decimal,
    /// Best bid quantity.
    #[serde(rename = "B", with = "rust_decimal::serde::str")]
    pub bid_qty: Decimal,
    /// Best ask price.
    #[serde(rename = "a", with = "rust_decimal::serde::str")]
    pub best_ask: Decimal,
    /// Best ask quantity.
    #[serde(rename = "A", with = "rust_decimal::serde::str")]
    pub ask_qty: Decimal,
}

/// Errors from decoding a frame.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The payload was not a valid book-ticker frame.
    #[error("malformed book-ticker frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Decode a raw text payload into a book-ticker frame.
///
/// # Errors
///
/// Returns [`CodecError::Malformed`] when the payload is not valid JSON or
/// is missing required fields.
pub fn decode_frame(payload: &str) -> Result<BookTickerFrame, CodecError> {
    Ok(serde_json::from_str(payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "u": 400900217,
        "s": "BTCUSDT",
        "b": "50000.00000000",
        "B": "31.21000000",
        "a": "50001.00000000",
        "A": "40.66000000"
    }"#;

    #[test]
    fn decodes_book_ticker_payload() {
        let frame = decode_frame(SAMPLE).unwrap();
        assert_eq!(frame.update_id, 400_900_217);
        assert_eq!(frame.symbol, "BTCUSDT");
        assert_eq!(frame.best_bid, Decimal::from(50_000));
        assert_eq!(frame.best_ask, Decimal::from(50_001));
        assert_eq!(frame.bid_qty, Decimal::new(31_21, 2));
        assert_eq!(frame.ask_qty, Decimal::new(40_66, 2));
    }

    #[test]
    fn rejects_non_json() {
        assert!(decode_frame("not json").is_err());
    }

    #[test]
    fn rejects_missing_fields() {
        assert!(decode_frame(r#"{"u": 1, "s": "BTCUSDT"}"#).is_err());
    }

    #[test]
    fn rejects_non_numeric_price() {
        let payload = r#"{"u":1,"s":"BTCUSDT","b":"abc","B":"1","a":"2","A":"1"}"#;
        assert!(decode_frame(payload).is_err());
    }
}
