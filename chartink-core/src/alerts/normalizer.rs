//! ChartInk payload normalizer
//!
//! Turns a decoded webhook body into a [`NormalizedAlert`]. Everything in
//! here is pure: no I/O, no shared state.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::errors::{AlertError, AlertResult};
use super::types::{
    InboundAlert, NormalizedAlert, ParsedStocks, PriceMetrics, SkipReason, SkippedEntry,
    StockEncoding, TriggeredStock, PROCESSING_STATUS_NEW, SOURCE_PLATFORM,
};

/// Fields every payload must carry, in reporting order
pub const REQUIRED_FIELDS: [&str; 4] = ["scan_name", "scan_url", "alert_name", "stocks"];

/// A normalized alert together with the entries dropped on the way
#[derive(Clone, Debug, PartialEq)]
pub struct Normalization {
    pub alert: NormalizedAlert,
    pub skipped: Vec<SkippedEntry>,
}

/// Check required fields and the type of `stocks`
pub fn validate(payload: &Map<String, Value>) -> AlertResult<()> {
    if let Some(missing) = REQUIRED_FIELDS
        .iter()
        .find(|field| !payload.contains_key(**field))
    {
        return Err(AlertError::MissingField(*missing));
    }

    if !payload.get("stocks").map_or(false, Value::is_string) {
        return Err(AlertError::InvalidType("stocks"));
    }

    Ok(())
}

impl InboundAlert {
    /// Validate a payload and detect which stock encoding it uses
    pub fn from_payload(payload: &Map<String, Value>) -> AlertResult<Self> {
        validate(payload)?;

        let stocks = text_field(payload, "stocks")?;
        let encoding = match payload.get("trigger_prices").and_then(Value::as_str) {
            Some(prices) => StockEncoding::Split {
                stocks,
                trigger_prices: prices.to_string(),
            },
            None => StockEncoding::Combined { stocks },
        };

        Ok(Self {
            scan_name: text_field(payload, "scan_name")?,
            scan_url: text_field(payload, "scan_url")?,
            alert_name: text_field(payload, "alert_name")?,
            encoding,
        })
    }
}

fn text_field(payload: &Map<String, Value>, field: &'static str) -> AlertResult<String> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(AlertError::InvalidType(field))
}

/// Parse the stock list according to its encoding
pub fn parse(encoding: &StockEncoding) -> AlertResult<ParsedStocks> {
    match encoding {
        StockEncoding::Split {
            stocks,
            trigger_prices,
        } => parse_split(stocks, trigger_prices).map(ParsedStocks::Split),
        StockEncoding::Combined { stocks } => {
            let (stocks, skipped) = parse_combined(stocks);
            if stocks.is_empty() {
                return Err(AlertError::NoValidStocks);
            }
            Ok(ParsedStocks::Combined { stocks, skipped })
        }
    }
}

/// Strict parse of the split encoding; both lists must line up 1:1
pub fn parse_split(stocks: &str, trigger_prices: &str) -> AlertResult<Vec<TriggeredStock>> {
    let symbols: Vec<&str> = split_entries(stocks).collect();
    let prices = split_entries(trigger_prices)
        .map(|price| parse_price(price).ok_or_else(|| AlertError::PriceFormat(price.to_string())))
        .collect::<AlertResult<Vec<f64>>>()?;

    if symbols.len() != prices.len() {
        return Err(AlertError::CountMismatch {
            stocks: symbols.len(),
            prices: prices.len(),
        });
    }

    Ok(symbols
        .into_iter()
        .zip(prices)
        .map(|(symbol, price)| TriggeredStock::new(symbol, price))
        .collect())
}

/// Lenient parse of `SYMBOL@PRICE` entries
///
/// Malformed entries are logged and reported back instead of failing the
/// batch. An empty accepted list is left to the caller to judge.
pub fn parse_combined(stocks: &str) -> (Vec<TriggeredStock>, Vec<SkippedEntry>) {
    let mut accepted = Vec::new();
    let mut skipped = Vec::new();

    for entry in split_entries(stocks) {
        let Some((symbol, price)) = entry.split_once('@') else {
            warn!("Invalid stock format: {}", entry);
            skipped.push(SkippedEntry {
                entry: entry.to_string(),
                reason: SkipReason::MissingSeparator,
            });
            continue;
        };

        let price = price.trim();
        match parse_price(price) {
            Some(value) => accepted.push(TriggeredStock::new(symbol.trim(), value)),
            None => {
                warn!("Invalid price format: {}", price);
                skipped.push(SkippedEntry {
                    entry: entry.to_string(),
                    reason: SkipReason::InvalidPrice(price.to_string()),
                });
            }
        }
    }

    (accepted, skipped)
}

fn split_entries(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|entry| !entry.is_empty())
}

fn parse_price(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|price| price.is_finite())
}

/// Average (2 dp), min and max of the trigger prices
pub fn compute_metrics(prices: &[f64]) -> PriceMetrics {
    if prices.is_empty() {
        return PriceMetrics::default();
    }

    let count = prices.len() as f64;
    let sum: f64 = prices.iter().sum();
    let avg = if sum.is_finite() {
        sum / count
    } else {
        // Sum overflowed; scale each price first
        prices.iter().map(|price| price / count).sum()
    };
    let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
    let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    PriceMetrics {
        avg_trigger_price: Some(round_to_cents(avg)),
        min_trigger_price: Some(min),
        max_trigger_price: Some(max),
    }
}

/// Scale to cents in binary, then round half away from zero
fn round_to_cents(value: f64) -> f64 {
    let cents = value * 100.0;
    if cents.is_finite() {
        cents.round() / 100.0
    } else {
        value
    }
}

/// Build the record handed to the store
pub fn assemble(inbound: &InboundAlert, stocks: &[TriggeredStock]) -> NormalizedAlert {
    let symbols: Vec<String> = stocks.iter().map(|s| s.symbol.clone()).collect();
    let prices: Vec<f64> = stocks.iter().map(|s| s.trigger_price).collect();
    let metrics = compute_metrics(&prices);

    NormalizedAlert {
        scan_name: inbound.scan_name.clone(),
        scan_url: inbound.scan_url.clone(),
        alert_name: inbound.alert_name.clone(),
        total_stocks: symbols.len(),
        stocks: symbols,
        trigger_prices: prices,
        avg_trigger_price: metrics.avg_trigger_price,
        min_trigger_price: metrics.min_trigger_price,
        max_trigger_price: metrics.max_trigger_price,
        processing_status: PROCESSING_STATUS_NEW.to_string(),
        source_platform: SOURCE_PLATFORM.to_string(),
    }
}

/// Full pipeline: validate, detect encoding, parse, compute metrics, assemble
pub fn normalize(payload: &Map<String, Value>) -> AlertResult<Normalization> {
    let inbound = InboundAlert::from_payload(payload)?;
    let parsed = parse(&inbound.encoding)?;

    debug!(
        "Parsed {} stocks from {} encoding ({} skipped)",
        parsed.stocks().len(),
        inbound.encoding.name(),
        parsed.skipped().len()
    );

    let alert = assemble(&inbound, parsed.stocks());
    let skipped = match parsed {
        ParsedStocks::Combined { skipped, .. } => skipped,
        ParsedStocks::Split(_) => Vec::new(),
    };

    Ok(Normalization { alert, skipped })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("test payload must be an object"),
        }
    }

    fn combined(stocks: &str) -> Map<String, Value> {
        payload(json!({
            "scan_name": "Short term breakouts",
            "scan_url": "short-term-breakouts",
            "alert_name": "Alert for Short term breakouts",
            "stocks": stocks,
        }))
    }

    fn split(stocks: &str, prices: &str) -> Map<String, Value> {
        let mut map = combined(stocks);
        map.insert("trigger_prices".to_string(), json!(prices));
        map
    }

    #[test]
    fn test_validate_reports_first_missing_field() {
        let result = validate(&payload(json!({ "scan_name": "x" })));
        assert!(matches!(result, Err(AlertError::MissingField("scan_url"))));

        let result = validate(&payload(json!({
            "scan_name": "x",
            "scan_url": "y",
            "alert_name": "z",
        })));
        assert!(matches!(result, Err(AlertError::MissingField("stocks"))));
    }

    #[test]
    fn test_validate_rejects_non_string_stocks() {
        let mut map = combined("");
        map.insert("stocks".to_string(), json!(["SEPOWER@3.75"]));
        assert!(matches!(validate(&map), Err(AlertError::InvalidType("stocks"))));
    }

    #[test]
    fn test_null_field_is_present_but_not_text() {
        let mut map = combined("SEPOWER@3.75");
        map.insert("scan_url".to_string(), Value::Null);

        assert!(validate(&map).is_ok());
        assert!(matches!(
            InboundAlert::from_payload(&map),
            Err(AlertError::InvalidType("scan_url"))
        ));
    }

    #[test]
    fn test_encoding_detection() {
        let inbound = InboundAlert::from_payload(&split("A,B", "1,2")).unwrap();
        assert_eq!(inbound.encoding.name(), "split");

        // A non-string trigger_prices does not select the split encoding
        let mut map = combined("A@1");
        map.insert("trigger_prices".to_string(), json!([1.0]));
        let inbound = InboundAlert::from_payload(&map).unwrap();
        assert_eq!(
            inbound.encoding,
            StockEncoding::Combined {
                stocks: "A@1".to_string()
            }
        );
    }

    #[test]
    fn test_combined_sample_payload() {
        let payload = combined("SEPOWER@3.75,ASTEC@541.8,EDUCOMP@2.1,KSERASERA@0.2");
        let result = normalize(&payload).unwrap();
        let alert = result.alert;

        assert_eq!(alert.stocks, vec!["SEPOWER", "ASTEC", "EDUCOMP", "KSERASERA"]);
        assert_eq!(alert.trigger_prices, vec![3.75, 541.8, 2.1, 0.2]);
        assert_eq!(alert.total_stocks, 4);
        // (3.75 + 541.8 + 2.1 + 0.2) / 4 = 136.9625
        assert_eq!(alert.avg_trigger_price, Some(136.96));
        assert_eq!(alert.min_trigger_price, Some(0.2));
        assert_eq!(alert.max_trigger_price, Some(541.8));
        assert_eq!(alert.processing_status, "new");
        assert_eq!(alert.source_platform, "ChartInk");
        assert!(result.skipped.is_empty());
    }

    #[test]
    fn test_split_sample_payload() {
        let result = normalize(&split("NAUKRI,MANAPPURAM", "1378.4,265.7")).unwrap();
        let alert = result.alert;

        assert_eq!(alert.stocks, vec!["NAUKRI", "MANAPPURAM"]);
        assert_eq!(alert.trigger_prices, vec![1378.4, 265.7]);
        assert_eq!(alert.total_stocks, 2);
        assert_eq!(alert.avg_trigger_price, Some(822.05));
        assert_eq!(alert.min_trigger_price, Some(265.7));
        assert_eq!(alert.max_trigger_price, Some(1378.4));
    }

    #[test]
    fn test_split_trims_and_drops_empty_entries() {
        let stocks = parse_split(" NAUKRI , ,MANAPPURAM,", "1378.4,, 265.7 ").unwrap();
        assert_eq!(
            stocks,
            vec![
                TriggeredStock::new("NAUKRI", 1378.4),
                TriggeredStock::new("MANAPPURAM", 265.7),
            ]
        );
    }

    #[test]
    fn test_split_rejects_bad_price() {
        let result = parse_split("NAUKRI,MANAPPURAM", "1378.4,abc");
        match result {
            Err(AlertError::PriceFormat(price)) => assert_eq!(price, "abc"),
            other => panic!("Expected price format error, got {:?}", other),
        }

        assert!(matches!(
            parse_split("NAUKRI", "inf"),
            Err(AlertError::PriceFormat(_))
        ));
    }

    #[test]
    fn test_split_count_mismatch() {
        let result = parse_split("NAUKRI,MANAPPURAM", "1378.4");
        assert!(matches!(
            result,
            Err(AlertError::CountMismatch { stocks: 2, prices: 1 })
        ));
    }

    #[test]
    fn test_split_empty_lists_pass_with_zero_stocks() {
        let result = normalize(&split("  ", "")).unwrap();
        assert_eq!(result.alert.total_stocks, 0);
        assert!(result.alert.stocks.is_empty());
        assert_eq!(result.alert.metrics(), PriceMetrics::default());
    }

    #[test]
    fn test_combined_empty_string_has_no_valid_stocks() {
        assert!(matches!(
            normalize(&combined("   ")),
            Err(AlertError::NoValidStocks)
        ));
    }

    #[test]
    fn test_bare_symbols_without_prices_have_no_valid_stocks() {
        assert!(matches!(
            normalize(&combined("BADENTRY")),
            Err(AlertError::NoValidStocks)
        ));
        assert!(matches!(
            normalize(&combined("SEPOWER,ASTEC,EDUCOMP")),
            Err(AlertError::NoValidStocks)
        ));
    }

    #[test]
    fn test_combined_skips_malformed_entries() {
        let (stocks, skipped) =
            parse_combined("SEPOWER@3.75, BADENTRY ,ASTEC@abc, EDUCOMP @ 2.1");

        assert_eq!(
            stocks,
            vec![
                TriggeredStock::new("SEPOWER", 3.75),
                TriggeredStock::new("EDUCOMP", 2.1),
            ]
        );
        assert_eq!(
            skipped,
            vec![
                SkippedEntry {
                    entry: "BADENTRY".to_string(),
                    reason: SkipReason::MissingSeparator,
                },
                SkippedEntry {
                    entry: "ASTEC@abc".to_string(),
                    reason: SkipReason::InvalidPrice("abc".to_string()),
                },
            ]
        );
    }

    #[test]
    fn test_combined_splits_on_first_separator() {
        // "3.75@1" is not a number, so the entry is skipped rather than truncated
        let (stocks, skipped) = parse_combined("SEPOWER@3.75@1,ASTEC@541.8");
        assert_eq!(stocks, vec![TriggeredStock::new("ASTEC", 541.8)]);
        assert_eq!(skipped[0].reason, SkipReason::InvalidPrice("3.75@1".to_string()));
    }

    #[test]
    fn test_skipped_entries_surface_through_normalize() {
        let result = normalize(&combined("SEPOWER@3.75,BADENTRY")).unwrap();
        assert_eq!(result.alert.total_stocks, 1);
        assert_eq!(result.skipped.len(), 1);
    }

    #[test]
    fn test_combined_lengths_always_match() {
        let inputs = [
            "A@1,B@2,C@3",
            "A@1,B,C@x,D@4",
            "@5,A@,B@6",
            " , ,A@1.5 ,",
        ];
        for input in inputs {
            if let Ok(result) = normalize(&combined(input)) {
                assert_eq!(result.alert.stocks.len(), result.alert.trigger_prices.len());
                assert_eq!(result.alert.total_stocks, result.alert.stocks.len());
            }
        }
    }

    #[test]
    fn test_metrics_empty_are_absent() {
        let metrics = compute_metrics(&[]);
        assert_eq!(metrics.avg_trigger_price, None);
        assert_eq!(metrics.min_trigger_price, None);
        assert_eq!(metrics.max_trigger_price, None);
    }

    #[test]
    fn test_metrics_rounding_boundary() {
        // 2.005 * 100.0 lands exactly on 200.5, which rounds away from zero
        assert_eq!(compute_metrics(&[2.005]).avg_trigger_price, Some(2.01));
        assert_eq!(compute_metrics(&[0.125]).avg_trigger_price, Some(0.13));
        // 1.005 * 100.0 is 100.49999999999999
        assert_eq!(compute_metrics(&[1.005]).avg_trigger_price, Some(1.0));
        assert_eq!(compute_metrics(&[1.0, 2.0]).avg_trigger_price, Some(1.5));
    }

    #[test]
    fn test_metrics_near_f64_max_stay_finite() {
        let metrics = compute_metrics(&[1e308, 1e308]);
        assert_eq!(metrics.avg_trigger_price, Some(1e308));
        assert_eq!(metrics.min_trigger_price, Some(1e308));
        assert_eq!(metrics.max_trigger_price, Some(1e308));

        let metrics = compute_metrics(&[f64::MAX, f64::MAX, 1.0]);
        assert!(metrics.avg_trigger_price.unwrap().is_finite());
    }

    #[test]
    fn test_metrics_are_idempotent() {
        let prices = [3.75, 541.8, 2.1, 0.2];
        assert_eq!(compute_metrics(&prices), compute_metrics(&prices));
    }

    #[test]
    fn test_metrics_rederive_from_assembled_alert() {
        let alert = normalize(&split("A,B,C", "10.5,20.25,3")).unwrap().alert;
        assert_eq!(compute_metrics(&alert.trigger_prices), alert.metrics());
        assert_eq!(alert.min_trigger_price, Some(3.0));
        assert_eq!(alert.max_trigger_price, Some(20.25));
    }

    #[test]
    fn test_text_fields_copied_verbatim() {
        let alert = normalize(&combined("A@1")).unwrap().alert;
        assert_eq!(alert.scan_name, "Short term breakouts");
        assert_eq!(alert.scan_url, "short-term-breakouts");
        assert_eq!(alert.alert_name, "Alert for Short term breakouts");
    }
}
