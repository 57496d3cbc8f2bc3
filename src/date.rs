//! Date parsing for `Date:` headers and envelope from-lines.
//!
//! A small strptime-style matcher: the handful of specifiers mail dates
//! actually use, a permissive literal matcher between them, and a pure UTC
//! conversion to UNIX seconds so results do not depend on the host timezone.

const DAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Broken-down date. Fields hold `-1` until a specifier fills them in.
///
/// `mon` is 0-based, `year` is the full calendar year, `zone_diff` is the
/// numeric `±HHMM` value of a `%z` offset (`-800` for `-0800`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateParts {
    pub sec: i32,
    pub min: i32,
    pub hour: i32,
    pub mday: i32,
    pub mon: i32,
    pub year: i32,
    pub wday: i32,
    pub zone_diff: i32,
}

impl Default for DateParts {
    fn default() -> Self {
        DateParts {
            sec: -1,
            min: -1,
            hour: -1,
            mday: -1,
            mon: -1,
            year: -1,
            wday: -1,
            zone_diff: -1,
        }
    }
}

/// Read up to `max_digits` decimal digits at `input[pos..]`.
fn take_int(input: &[u8], pos: usize, max_digits: usize) -> Option<(i32, usize)> {
    let mut value: i32 = 0;
    let mut read = 0;

    while read < max_digits {
        match input.get(pos + read) {
            Some(byte) if byte.is_ascii_digit() => {
                value = value * 10 + (byte - b'0') as i32;
                read += 1;
            }
            _ => break,
        }
    }

    if read == 0 {
        None
    } else {
        Some((value, pos + read))
    }
}

fn match_name_3(input: &[u8], pos: usize, names: &[&str]) -> Option<(i32, usize)> {
    let window = input.get(pos..pos + 3)?;
    for (i, name) in names.iter().enumerate() {
        if window.eq_ignore_ascii_case(name.as_bytes()) {
            return Some((i as i32, pos + 3));
        }
    }
    None
}

/// Parse `input` against `format`.
///
/// Specifiers: `%a` `%b` `%d` `%m` `%Y` `%H` `%M` `%S` `%p` `%z`. Any other
/// format byte must match the input byte or it is skipped without consuming
/// input. Input running out before the format is fine — unfilled fields stay
/// `-1` — so `"27 Feb 2023 19:36:54"` parses against a format that also
/// names a `%z`. A specifier that finds nothing usable fails the parse.
///
/// `%p` folds the already-parsed `%H` hour onto the 12-hour clock when it
/// consumes its AM/PM token, so it only has effect after `%H`.
pub fn parse_date(input: &str, format: &str) -> Option<DateParts> {
    let mut parts = DateParts::default();
    let input = input.as_bytes();
    let format = format.as_bytes();
    let mut i = 0;
    let mut f = 0;

    while f < format.len() && i < input.len() {
        if format[f] == b'%' && f + 1 < format.len() {
            f += 1;
            match format[f] {
                b'a' => {
                    let (wday, next) = match_name_3(input, i, &DAYS)?;
                    parts.wday = wday;
                    i = next;
                }
                b'b' => {
                    let (mon, next) = match_name_3(input, i, &MONTHS)?;
                    parts.mon = mon;
                    i = next;
                }
                b'd' => {
                    let (mday, next) = take_int(input, i, 2)?;
                    parts.mday = mday;
                    i = next;
                }
                b'm' => {
                    let (mon, next) = take_int(input, i, 2)?;
                    parts.mon = mon - 1;
                    i = next;
                }
                b'Y' => {
                    let (year, next) = take_int(input, i, 4)?;
                    parts.year = year;
                    i = next;
                }
                b'H' => {
                    let (hour, next) = take_int(input, i, 2)?;
                    parts.hour = hour;
                    i = next;
                }
                b'M' => {
                    let (min, next) = take_int(input, i, 2)?;
                    parts.min = min;
                    i = next;
                }
                b'S' => {
                    let (sec, next) = take_int(input, i, 2)?;
                    parts.sec = sec;
                    i = next;
                }
                b'p' => {
                    let token = input.get(i..i + 2)?;
                    if token.eq_ignore_ascii_case(b"AM") {
                        if parts.hour >= 12 {
                            parts.hour -= 12;
                        }
                    } else if token.eq_ignore_ascii_case(b"PM") {
                        if parts.hour >= 0 && parts.hour < 12 {
                            parts.hour += 12;
                        }
                    } else {
                        return None;
                    }
                    i += 2;
                }
                b'z' => {
                    let negative = match input.get(i) {
                        Some(b'-') => {
                            i += 1;
                            true
                        }
                        Some(b'+') => {
                            i += 1;
                            false
                        }
                        _ => false,
                    };
                    let (value, next) = take_int(input, i, 4)?;
                    parts.zone_diff = if negative { -value } else { value };
                    i = next;
                }
                _ => {}
            }
            f += 1;
        } else {
            if format[f] == input[i] {
                i += 1;
            }
            f += 1;
        }
    }

    Some(parts)
}

/// Days since 1970-01-01 for a proleptic Gregorian calendar date.
fn days_from_civil(year: i64, month: i64, day: i64) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400;
    let mp = (month + 9) % 12;
    let doy = (153 * mp + 2) / 5 + day - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146097 + doe - 719468
}

/// UNIX seconds (UTC) for the parsed date.
///
/// Unset time fields count as zero and an unset day as the 1st. A
/// `zone_diff` of `0` or the `-1` sentinel leaves the value untouched;
/// positive offsets are subtracted and negative ones added, bringing the
/// local wall-clock reading back to UTC.
pub fn to_unix_seconds(parts: &DateParts) -> i64 {
    let year = parts.year as i64;
    let month = (parts.mon.max(0) + 1) as i64;
    let day = parts.mday.max(1) as i64;

    let days = days_from_civil(year, month, day);
    let mut seconds = days * 86_400
        + parts.hour.max(0) as i64 * 3600
        + parts.min.max(0) as i64 * 60
        + parts.sec.max(0) as i64;

    if parts.zone_diff != 0 && parts.zone_diff != -1 {
        let hours = (parts.zone_diff.abs() / 100) as i64;
        let minutes = (parts.zone_diff.abs() % 100) as i64;
        let shift = hours * 3600 + minutes * 60;
        if parts.zone_diff < 0 {
            seconds += shift;
        } else {
            seconds -= shift;
        }
    }

    seconds
}

/// Render `parts` back through `format`. Inverse of [`parse_date`] for
/// fully-populated dates.
pub fn format_date(parts: &DateParts, format: &str) -> String {
    let mut out = String::with_capacity(format.len() + 16);
    let format = format.as_bytes();
    let mut f = 0;

    while f < format.len() {
        if format[f] == b'%' && f + 1 < format.len() {
            f += 1;
            match format[f] {
                b'a' => out.push_str(DAYS[parts.wday.clamp(0, 6) as usize]),
                b'b' => out.push_str(MONTHS[parts.mon.clamp(0, 11) as usize]),
                b'd' => out.push_str(&format!("{:02}", parts.mday)),
                b'm' => out.push_str(&format!("{:02}", parts.mon + 1)),
                b'Y' => out.push_str(&format!("{:04}", parts.year)),
                b'H' => out.push_str(&format!("{:02}", parts.hour)),
                b'M' => out.push_str(&format!("{:02}", parts.min)),
                b'S' => out.push_str(&format!("{:02}", parts.sec)),
                b'p' => out.push_str(if parts.hour >= 12 { "PM" } else { "AM" }),
                b'z' => {
                    let sign = if parts.zone_diff < 0 { '-' } else { '+' };
                    out.push(sign);
                    out.push_str(&format!("{:04}", parts.zone_diff.abs()));
                }
                other => out.push(other as char),
            }
            f += 1;
        } else {
            out.push(format[f] as char);
            f += 1;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const FMT_HEADER: &str = "%a, %d %b %Y %H:%M:%S %z";
    const FMT_SHORT: &str = "%d %b %Y %H:%M:%S %z";
    const FMT_FROM_LINE: &str = "%a %b %d %H:%M:%S %z %Y";

    fn stamp(input: &str, format: &str) -> i64 {
        to_unix_seconds(&parse_date(input, format).expect("parse failed"))
    }

    #[test]
    fn test_header_dates() {
        assert_eq!(stamp("Mon, 27 Feb 2023 07:30:00 +0000 (UTC)", FMT_HEADER), 1_677_483_000);
        assert_eq!(stamp("Mon, 27 Feb 2023 14:37:33 -0800", FMT_HEADER), 1_677_537_453);
        assert_eq!(stamp("Fri, 25 Feb 2023 05:30:47 -0500 (EST)", FMT_HEADER), 1_677_321_047);
        assert_eq!(stamp("Mon, 27 Feb 2023 19:36:54 -0600 (CST)", FMT_HEADER), 1_677_548_214);
    }

    #[test]
    fn test_missing_zone_is_utc() {
        assert_eq!(stamp("Mon, 27 Feb 2023 19:36:54", FMT_HEADER), 1_677_526_614);
        assert_eq!(stamp("27 Feb 2023 19:36:54", FMT_SHORT), 1_677_526_614);
    }

    #[test]
    fn test_from_line_format() {
        assert_eq!(stamp("Fri Feb 24 15:13:20 +0000 2023", FMT_FROM_LINE), 1_677_251_600);
    }

    #[test]
    fn test_fields_populated() {
        let parts = parse_date("Mon, 27 Feb 2023 07:30:00 +0000", FMT_HEADER).unwrap();
        assert_eq!(parts.wday, 1);
        assert_eq!(parts.mday, 27);
        assert_eq!(parts.mon, 1);
        assert_eq!(parts.year, 2023);
        assert_eq!(parts.hour, 7);
        assert_eq!(parts.min, 30);
        assert_eq!(parts.sec, 0);
        assert_eq!(parts.zone_diff, 0);
    }

    #[test]
    fn test_negative_zone_parsed() {
        let parts = parse_date("Mon, 27 Feb 2023 14:37:33 -0800", FMT_HEADER).unwrap();
        assert_eq!(parts.zone_diff, -800);
    }

    #[test]
    fn test_unparseable_month_fails() {
        assert!(parse_date("Mon, 27 Xxx 2023 07:30:00 +0000", FMT_HEADER).is_none());
    }

    #[test]
    fn test_single_digit_day() {
        let parts = parse_date("Wed, 1 Mar 2023 00:00:00 +0000", FMT_HEADER).unwrap();
        assert_eq!(parts.mday, 1);
        assert_eq!(parts.mon, 2);
    }

    #[test]
    fn test_pm_adjusts_hour() {
        let parts = parse_date("27 Feb 2023 07:30:00 PM", "%d %b %Y %H:%M:%S %p").unwrap();
        assert_eq!(parts.hour, 19);
        let noon = parse_date("27 Feb 2023 12:00:00 PM", "%d %b %Y %H:%M:%S %p").unwrap();
        assert_eq!(noon.hour, 12);
        let midnight = parse_date("27 Feb 2023 12:00:00 AM", "%d %b %Y %H:%M:%S %p").unwrap();
        assert_eq!(midnight.hour, 0);
    }

    #[test]
    fn test_format_round_trip() {
        let inputs = [
            ("Mon, 27 Feb 2023 07:30:00 +0000", FMT_HEADER),
            ("Fri, 24 Feb 2023 15:13:20 -0800", FMT_HEADER),
            ("Fri Feb 24 15:13:20 +0530 2023", FMT_FROM_LINE),
        ];
        for (input, format) in inputs {
            let parts = parse_date(input, format).unwrap();
            let rendered = format_date(&parts, format);
            assert_eq!(parse_date(&rendered, format), Some(parts));
        }
    }

    #[test]
    fn test_days_from_civil_epoch() {
        assert_eq!(days_from_civil(1970, 1, 1), 0);
        assert_eq!(days_from_civil(1970, 1, 2), 1);
        assert_eq!(days_from_civil(1969, 12, 31), -1);
        assert_eq!(days_from_civil(2023, 2, 27), 19_415);
    }
}
