//! Binance payload parsing.
//!
//! REST klines arrive as positional arrays
//! `[open_time, open, high, low, close, volume, close_time, ...]`; only the
//! first six fields are used. Numbers are usually JSON strings but plain
//! numbers are accepted too.
//!
//! Stream messages come either raw (`/ws/<topic>`) or wrapped by the combined
//! endpoint as `{"stream": "...", "data": {...}}`. Messages that are not the
//! expected event (subscription acks, other event types) parse to `None`.

use serde_json::Value;

use super::errors::DecodeError;
use super::types::{KlineEvent, Ticker24hRow, TickerEvent};
use crate::types::{Bar, BarUpdate, Symbol, Ticker};

fn number(value: &Value, field: &'static str) -> Result<f64, DecodeError> {
    match value {
        Value::String(s) => s.parse().map_err(|_| DecodeError::Number {
            field,
            value: s.clone(),
        }),
        Value::Number(n) => n.as_f64().ok_or(DecodeError::Field(field)),
        other => Err(DecodeError::Number {
            field,
            value: other.to_string(),
        }),
    }
}

fn parse_str(raw: &str, field: &'static str) -> Result<f64, DecodeError> {
    raw.parse().map_err(|_| DecodeError::Number {
        field,
        value: raw.to_string(),
    })
}

pub fn parse_kline_row(row: &[Value]) -> Result<Bar, DecodeError> {
    if row.len() < 6 {
        return Err(DecodeError::Field("kline row"));
    }

    Ok(Bar {
        ts_ms: row[0].as_u64().ok_or(DecodeError::Field("open_time"))?,
        open: number(&row[1], "open")?,
        high: number(&row[2], "high")?,
        low: number(&row[3], "low")?,
        close: number(&row[4], "close")?,
        volume: number(&row[5], "volume")?,
    })
}

pub fn parse_kline_rows(body: &str) -> Result<Vec<Bar>, DecodeError> {
    let rows: Vec<Vec<Value>> = serde_json::from_str(body)?;
    rows.iter().map(|r| parse_kline_row(r)).collect()
}

pub fn parse_ticker_row(row: &Ticker24hRow) -> Result<Ticker, DecodeError> {
    Ok(Ticker {
        symbol: Symbol::new(&row.symbol),
        price_change_pct: parse_str(&row.price_change_percent, "priceChangePercent")?,
        last_price: parse_str(&row.last_price, "lastPrice")?,
    })
}

/// Strips the combined-stream envelope if present.
fn event_payload(raw: &str) -> Result<Value, DecodeError> {
    let mut value: Value = serde_json::from_str(raw)?;
    if let Some(data) = value.get_mut("data") {
        return Ok(data.take());
    }
    Ok(value)
}

fn event_type(v: &Value) -> Option<&str> {
    v.get("e").and_then(Value::as_str)
}

pub fn parse_kline_message(raw: &str) -> Result<Option<BarUpdate>, DecodeError> {
    let payload = event_payload(raw)?;
    if event_type(&payload) != Some("kline") {
        return Ok(None);
    }

    let event: KlineEvent = serde_json::from_value(payload)?;
    let k = &event.kline;

    Ok(Some(BarUpdate {
        symbol: Symbol::new(&event.symbol),
        bar: Bar {
            ts_ms: k.open_time,
            open: parse_str(&k.open, "o")?,
            high: parse_str(&k.high, "h")?,
            low: parse_str(&k.low, "l")?,
            close: parse_str(&k.close, "c")?,
            volume: parse_str(&k.volume, "v")?,
        },
        is_final: k.is_final,
    }))
}

pub fn parse_ticker_message(raw: &str) -> Result<Option<Ticker>, DecodeError> {
    let payload = event_payload(raw)?;
    if event_type(&payload) != Some("24hrTicker") {
        return Ok(None);
    }

    let event: TickerEvent = serde_json::from_value(payload)?;
    Ok(Some(Ticker {
        symbol: Symbol::new(&event.symbol),
        price_change_pct: parse_str(&event.price_change_percent, "P")?,
        last_price: parse_str(&event.last_price, "c")?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KLINE: &str = r#"{
        "e": "kline", "E": 1672515782136, "s": "BTCUSDT",
        "k": {
            "t": 1672515780000, "T": 1672515839999, "s": "BTCUSDT", "i": "1m",
            "f": 100, "L": 200, "o": "16500.10", "c": "16510.00", "h": "16520.00",
            "l": "16490.00", "v": "12.5", "n": 100, "x": true, "q": "1.0",
            "V": "500", "Q": "0.5", "B": "123456"
        }
    }"#;

    #[test]
    fn kline_event_decodes_to_final_update() {
        let u = parse_kline_message(KLINE).unwrap().unwrap();
        assert_eq!(u.symbol.as_str(), "BTCUSDT");
        assert!(u.is_final);
        assert_eq!(u.bar.ts_ms, 1672515780000);
        assert_eq!(u.bar.open, 16500.10);
        assert_eq!(u.bar.high, 16520.0);
        assert_eq!(u.bar.low, 16490.0);
        assert_eq!(u.bar.close, 16510.0);
        assert_eq!(u.bar.volume, 12.5);
    }

    #[test]
    fn combined_envelope_is_unwrapped() {
        let wrapped = format!(r#"{{"stream":"btcusdt@kline_1m","data":{KLINE}}}"#);
        assert!(parse_kline_message(&wrapped).unwrap().is_some());
    }

    #[test]
    fn non_kline_messages_are_ignored() {
        assert!(parse_kline_message(r#"{"result":null,"id":1}"#).unwrap().is_none());
        assert!(parse_kline_message(r#"{"e":"trade","s":"BTCUSDT"}"#).unwrap().is_none());
    }

    #[test]
    fn malformed_messages_are_errors() {
        assert!(matches!(parse_kline_message("{not json"), Err(DecodeError::Json(_))));

        let bad = KLINE.replace(r#""c": "16510.00""#, r#""c": "abc""#);
        assert!(matches!(
            parse_kline_message(&bad),
            Err(DecodeError::Number { field: "c", .. })
        ));
    }

    #[test]
    fn rest_rows_use_first_six_fields() {
        let body = r#"[
            [1499040000000, "0.0163", "0.8000", "0.0157", "0.0158", "148976.1", 1499644799999, "2434.19", 308, "1756.87", "28.46", "0"],
            [1499040060000, 0.0158, 0.0160, 0.0150, 0.0159, 10, 1499644859999]
        ]"#;
        let bars = parse_kline_rows(body).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].ts_ms, 1499040000000);
        assert_eq!(bars[0].high, 0.8);
        assert_eq!(bars[0].volume, 148976.1);
        assert_eq!(bars[1].close, 0.0159);
    }

    #[test]
    fn short_rest_row_is_rejected() {
        assert!(parse_kline_rows(r#"[[1, "1", "1"]]"#).is_err());
    }

    #[test]
    fn ticker_event_and_row() {
        let raw = r#"{"stream":"ethusdt@ticker","data":{"e":"24hrTicker","E":1,"s":"ETHUSDT","p":"10","P":"0.55","c":"1834.20","o":"1824"}}"#;
        let t = parse_ticker_message(raw).unwrap().unwrap();
        assert_eq!(t.symbol.as_str(), "ETHUSDT");
        assert_eq!(t.last_price, 1834.2);
        assert_eq!(t.price_change_pct, 0.55);

        let row = Ticker24hRow {
            symbol: "BNBUSDT".into(),
            price_change_percent: "-1.25".into(),
            last_price: "245.1".into(),
        };
        let t = parse_ticker_row(&row).unwrap();
        assert_eq!(t.price_change_pct, -1.25);
    }
}
