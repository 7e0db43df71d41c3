// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text formatting helpers shared by the receipt and kitchen layouts.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use rust_decimal::{Decimal, RoundingStrategy};

/// `"$12.50"`: two decimals, half away from zero.
pub fn format_currency(amount: Decimal, symbol: &str) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{symbol}{rounded:.2}")
}

/// Left-justify `left` and right-justify `right` within `width` characters.
///
/// When both do not fit with at least one space between them, `left` is
/// truncated and `right` follows after a single space.  `right` is never
/// shortened, so an over-long value still prints in full.
pub fn pad_line(left: &str, right: &str, width: usize) -> String {
    let left_len = left.chars().count();
    let right_len = right.chars().count();

    if left_len + right_len < width {
        let padding = width - left_len - right_len;
        format!("{left}{}{right}", " ".repeat(padding))
    } else {
        let keep = width.saturating_sub(right_len + 1);
        let truncated: String = left.chars().take(keep).collect();
        format!("{truncated} {right}")
    }
}

/// `"2026-03-14 18:05"`, shifted by `utc_offset_minutes`.
pub fn format_date_time(at: DateTime<Utc>, utc_offset_minutes: i32) -> String {
    let offset = FixedOffset::east_opt(utc_offset_minutes.saturating_mul(60)).unwrap_or(Utc.fix());
    at.with_timezone(&offset).format("%Y-%m-%d %H:%M").to_string()
}

/// `ch` repeated `width` times.
pub fn separator(ch: char, width: usize) -> String {
    std::iter::repeat_n(ch, width).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn currency_has_two_decimals() {
        assert_eq!(format_currency(dec("12.5"), "$"), "$12.50");
        assert_eq!(format_currency(dec("3"), "$"), "$3.00");
        assert_eq!(format_currency(dec("0.005"), "€"), "€0.01");
        assert_eq!(format_currency(dec("1234.994"), "$"), "$1234.99");
    }

    #[test]
    fn pad_fills_to_width() {
        let line = pad_line("Subtotal:", "$9.00", 20);
        assert_eq!(line, "Subtotal:      $9.00");
        assert_eq!(line.chars().count(), 20);
    }

    #[test]
    fn pad_truncates_label_but_keeps_value() {
        let line = pad_line("2x Extremely long burger name", "$12.00", 20);
        // 20 - 6 - 1 = 13 label chars survive, the last one a space.
        assert_eq!(line, "2x Extremely  $12.00");
        assert!(line.ends_with("$12.00"));
        assert_eq!(line.chars().count(), 20);
    }

    #[test]
    fn pad_exact_fit_still_separates() {
        // 10 + 10 == width: no room for a space, so the label loses a char.
        assert_eq!(pad_line("abcdefghij", "0123456789", 20), "abcdefghi 0123456789");
    }

    #[test]
    fn pad_value_wider_than_line_is_kept_whole() {
        assert_eq!(pad_line("Total", "$1000000.00", 8), " $1000000.00");
    }

    #[test]
    fn pad_counts_characters_not_bytes() {
        let line = pad_line("Café", "$1.00", 12);
        assert_eq!(line.chars().count(), 12);
    }

    #[test]
    fn date_time_is_fixed_numeric() {
        let at = Utc.with_ymd_and_hms(2026, 3, 14, 18, 5, 59).unwrap();
        assert_eq!(format_date_time(at, 0), "2026-03-14 18:05");
        assert_eq!(format_date_time(at, 60), "2026-03-14 19:05");
        assert_eq!(format_date_time(at, -19 * 60), "2026-03-13 23:05");
    }

    #[test]
    fn absurd_offset_falls_back_to_utc() {
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(format_date_time(at, 100_000), "2026-01-01 00:00");
    }

    #[test]
    fn separator_repeats() {
        assert_eq!(separator('-', 4), "----");
        assert_eq!(separator('=', 0), "");
    }
}
