use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;

use super::model::{Record, SpectrumSeries, Value};
use crate::error::{Error, Result};

/// Keys of a trace section: `P_0`, `P_1`, ...
static POINT_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^P_[0-9]+$").expect("point key pattern is valid"));

/// Separates power from frequency inside a point value.
const POINT_SEPARATOR: &str = " , ";

/// Find the `P_<n>` section and read it as a frequency / power series.
///
/// Depth-first, visiting the most recently inserted child first since the
/// trace usually sits near the end of a save file. The first matching
/// section wins. A file without one yields [`Error::SpectrumNotFound`].
pub fn extract(record: &Record) -> Result<SpectrumSeries> {
    let mut pending = vec![record];

    while let Some(node) = pending.pop() {
        if is_spectrum(node) {
            let series = parse_points(node)?;
            info!("found spectrum with {} points", series.len());
            return Ok(series);
        }
        // Pushed in order, popped last-first.
        pending.extend(node.values().filter_map(Value::as_record));
    }

    debug!("no P_<n> section in record");
    Err(Error::SpectrumNotFound)
}

/// Non-empty and every key is a point key.
pub fn is_spectrum(record: &Record) -> bool {
    !record.is_empty() && record.keys().all(|k| POINT_KEY.is_match(k))
}

fn parse_points(record: &Record) -> Result<SpectrumSeries> {
    let mut frequencies = Vec::with_capacity(record.len());
    let mut powers = Vec::with_capacity(record.len());
    let mut frequency_unit = None;

    for (key, value) in record {
        let point = parse_point(key, value)?;
        if frequencies.is_empty() {
            frequency_unit = point.unit.map(str::to_string);
        }
        frequencies.push(point.frequency);
        powers.push(point.power);
    }

    Ok(SpectrumSeries {
        frequencies,
        powers,
        frequency_unit,
    })
}

struct Point<'a> {
    power: f64,
    frequency: f64,
    unit: Option<&'a str>,
}

/// `"-42.1 , 100.0 MHz"` → power -42.1, frequency 100.0, unit `MHz`.
fn parse_point<'a>(key: &str, value: &'a Value) -> Result<Point<'a>> {
    let malformed = |raw: &str, reason: &str| Error::MalformedValue {
        key: key.to_string(),
        value: raw.to_string(),
        reason: reason.to_string(),
    };

    let raw = value
        .as_scalar()
        .ok_or_else(|| malformed("", "expected a value, found a section"))?;
    let (power, frequency) = raw
        .split_once(POINT_SEPARATOR)
        .ok_or_else(|| malformed(raw, "missing ' , ' separator"))?;

    let power = power
        .trim()
        .parse::<f64>()
        .map_err(|e| malformed(raw, &format!("power: {e}")))?;

    let mut tokens = frequency.split_whitespace();
    let frequency = tokens
        .next()
        .ok_or_else(|| malformed(raw, "missing frequency"))?
        .parse::<f64>()
        .map_err(|e| malformed(raw, &format!("frequency: {e}")))?;

    Ok(Point {
        power,
        frequency,
        unit: tokens.next(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::decoder::decode;

    fn trace(points: &[(&str, &str)]) -> Record {
        points
            .iter()
            .map(|(k, v)| (k.to_string(), Value::from(*v)))
            .collect()
    }

    #[test]
    fn nested_trace_is_found() {
        let text = "Model=MS2723B\n# Begin Trace\nP_0=-42.1 , 100.0 MHz\nP_1=-40.3 , 100.1 MHz\n# Trace Done\n";
        let series = extract(&decode(text).unwrap()).unwrap();
        assert_eq!(series.frequencies, vec![100.0, 100.1]);
        assert_eq!(series.powers, vec![-42.1, -40.3]);
        assert_eq!(series.frequency_unit.as_deref(), Some("MHz"));
    }

    #[test]
    fn metadata_only_has_no_spectrum() {
        let record = decode("Model=MS2723B\nFreq=Unknown\n").unwrap();
        let err = extract(&record).unwrap_err();
        assert!(err.is_spectrum_not_found());
    }

    #[test]
    fn empty_record_has_no_spectrum() {
        assert!(matches!(extract(&Record::new()), Err(Error::SpectrumNotFound)));
    }

    #[test]
    fn point_pattern() {
        assert!(is_spectrum(&trace(&[("P_0", "1 , 2"), ("P_12", "3 , 4")])));
        assert!(!is_spectrum(&trace(&[("P_0", "1 , 2"), ("P_x", "3 , 4")])));
        assert!(!is_spectrum(&trace(&[("P_", "1 , 2")])));
        assert!(!is_spectrum(&trace(&[("XP_1", "1 , 2")])));
        assert!(!is_spectrum(&Record::new()));
    }

    #[test]
    fn stored_order_is_kept() {
        let record = trace(&[("P_2", "-3 , 30 Hz"), ("P_0", "-1 , 10 Hz"), ("P_1", "-2 , 20 Hz")]);
        let series = extract(&record).unwrap();
        assert_eq!(series.frequencies, vec![30.0, 10.0, 20.0]);
        assert_eq!(series.powers, vec![-3.0, -1.0, -2.0]);
    }

    #[test]
    fn frequency_without_unit() {
        let series = extract(&trace(&[("P_0", "-1.5 , 2400")])).unwrap();
        assert_eq!(series.frequencies, vec![2400.0]);
        assert_eq!(series.frequency_unit, None);
    }

    #[test]
    fn last_child_is_searched_first() {
        let mut root = Record::new();
        root.insert("First".into(), trace(&[("P_0", "-1 , 1 MHz")]).into());
        root.insert("Second".into(), trace(&[("P_0", "-2 , 2 MHz")]).into());

        let series = extract(&root).unwrap();
        assert_eq!(series.frequencies, vec![2.0]);
    }

    #[test]
    fn deep_subtree_before_earlier_sibling() {
        let mut deep = Record::new();
        deep.insert("Trace".into(), trace(&[("P_0", "-9 , 9 GHz")]).into());
        let mut root = Record::new();
        root.insert("Early".into(), trace(&[("P_0", "-1 , 1 MHz")]).into());
        root.insert("Late".into(), deep.into());

        let series = extract(&root).unwrap();
        assert_eq!(series.powers, vec![-9.0]);
        assert_eq!(series.frequency_unit.as_deref(), Some("GHz"));
    }

    #[test]
    fn malformed_point_is_an_error_not_a_skip() {
        let err = extract(&trace(&[("P_0", "-1 , 1 MHz"), ("P_1", "garbage")])).unwrap_err();
        match err {
            Error::MalformedValue { key, value, .. } => {
                assert_eq!(key, "P_1");
                assert_eq!(value, "garbage");
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = extract(&trace(&[("P_0", "abc , 1 MHz")])).unwrap_err();
        assert!(matches!(err, Error::MalformedValue { .. }));

        let err = extract(&trace(&[("P_0", "-1 , MHz")])).unwrap_err();
        assert!(matches!(err, Error::MalformedValue { .. }));
    }

    #[test]
    fn nested_point_value_is_malformed() {
        let mut record = Record::new();
        record.insert("P_0".into(), Record::new().into());
        let err = extract(&record).unwrap_err();
        assert!(matches!(err, Error::MalformedValue { .. }));
    }
}
