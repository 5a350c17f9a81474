//! User-facing renderings of durations, file sizes and start-time keys.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};

const NANOS_PER_MILLI: u128 = 1_000_000;
const MILLIS_PER_DAY: i64 = 86_400_000;
const KIB: u64 = 1024;
const MIB: u64 = 1024 * 1024;

/// Whole milliseconds, truncated. This is the numeric duration carried by rows.
pub fn duration_millis(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

/// Under one second: rounded whole milliseconds with " ms".
/// Otherwise: seconds rounded to three decimals with " s", trailing zeros dropped.
///
/// Ties round to even, so 12.5 ms renders as "12 ms" and 13.5 ms as "14 ms".
pub fn duration_label(d: Duration) -> String {
    let rounded_ms = round_half_even(d.as_nanos(), NANOS_PER_MILLI);
    if d < Duration::from_secs(1) {
        return format!("{rounded_ms} ms");
    }

    let whole = rounded_ms / 1000;
    let frac = rounded_ms % 1000;
    if frac == 0 {
        return format!("{whole} s");
    }
    let digits = format!("{frac:03}");
    format!("{whole}.{} s", digits.trim_end_matches('0'))
}

fn round_half_even(value: u128, unit: u128) -> u128 {
    let quotient = value / unit;
    let twice_rem = (value % unit) * 2;
    if twice_rem > unit || (twice_rem == unit && quotient % 2 == 1) {
        quotient + 1
    } else {
        quotient
    }
}

/// `ceil(bytes / KiB)` + " KB" below one MiB, else `ceil(bytes / MiB)` + " MB".
pub fn size_label(bytes: u64) -> String {
    if bytes < MIB {
        format!("{} KB", bytes.div_ceil(KIB))
    } else {
        format!("{} MB", bytes.div_ceil(MIB))
    }
}

/// OLE Automation date: days since 1899-12-30 with the time of day as the
/// fraction, at millisecond precision. Before the epoch the fraction stays
/// positive while the day count goes negative.
pub fn oa_date(t: DateTime<Utc>) -> f64 {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let mut millis = (t - epoch).num_milliseconds();
    if millis < 0 {
        let frac = millis % MILLIS_PER_DAY;
        if frac != 0 {
            millis -= (MILLIS_PER_DAY + frac) * 2;
        }
    }
    millis as f64 / MILLIS_PER_DAY as f64
}

/// The textual start-time key a caller passes to pick a run: the shortest
/// round-trip rendering of [`oa_date`].
pub fn oa_date_key(t: DateTime<Utc>) -> String {
    oa_date(t).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_duration_label_boundaries() {
        assert_eq!(duration_label(Duration::from_millis(999)), "999 ms");
        assert_eq!(duration_label(Duration::from_millis(1000)), "1 s");
        assert_eq!(duration_label(Duration::from_millis(1500)), "1.5 s");
        assert_eq!(duration_label(Duration::ZERO), "0 ms");
    }

    #[test]
    fn test_duration_label_rounding() {
        assert_eq!(duration_label(Duration::from_micros(12_400)), "12 ms");
        assert_eq!(duration_label(Duration::from_micros(12_500)), "12 ms");
        assert_eq!(duration_label(Duration::from_micros(13_500)), "14 ms");
        assert_eq!(duration_label(Duration::from_micros(999_500)), "1000 ms");
        assert_eq!(duration_label(Duration::from_micros(2_344_500)), "2.344 s");
        assert_eq!(duration_label(Duration::from_micros(2_345_500)), "2.346 s");
        assert_eq!(duration_label(Duration::from_micros(999_600)), "1000 ms");
        assert_eq!(duration_label(Duration::from_micros(2_345_600)), "2.346 s");
        assert_eq!(duration_label(Duration::from_micros(1_999_600)), "2 s");
        assert_eq!(duration_label(Duration::from_millis(61_020)), "61.02 s");
    }

    #[test]
    fn test_duration_millis_truncates() {
        assert_eq!(duration_millis(Duration::from_micros(1_999)), 1);
        assert_eq!(duration_millis(Duration::from_secs(2)), 2000);
    }

    #[test]
    fn test_size_label_ceils() {
        assert_eq!(size_label(0), "0 KB");
        assert_eq!(size_label(1), "1 KB");
        assert_eq!(size_label(1024), "1 KB");
        assert_eq!(size_label(1025), "2 KB");
        assert_eq!(size_label(MIB - 1), "1024 KB");
        assert_eq!(size_label(MIB), "1 MB");
        assert_eq!(size_label(MIB + 1), "2 MB");
    }

    #[test]
    fn test_oa_date() {
        let epoch = Utc.with_ymd_and_hms(1899, 12, 30, 0, 0, 0).unwrap();
        assert_eq!(oa_date(epoch), 0.0);
        let noon = Utc.with_ymd_and_hms(1900, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(oa_date(noon), 2.5);
        let before = Utc.with_ymd_and_hms(1899, 12, 29, 18, 0, 0).unwrap();
        assert_eq!(oa_date(before), -1.75);
    }

    #[test]
    fn test_oa_date_key_rendering() {
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(oa_date_key(t), "45352");
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap();
        assert_eq!(oa_date_key(t), "45352.25");
    }
}
