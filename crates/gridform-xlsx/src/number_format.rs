//! Number-format classification and display rendering.
//!
//! The reader only needs display strings, so this is deliberately not a full
//! format-code interpreter: it decides whether a code groups thousands or
//! denotes a date/time, and renders accordingly.

use chrono::{Duration, NaiveDate};

/// How a cell's number format affects display rendering.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum NumFmtKind {
    /// Plain numeric rendering.
    General,
    /// Numeric with thousands grouping (`#,##0`-style codes).
    Grouped,
    /// Date (optionally with a time-of-day component).
    Date { with_time: bool },
}

/// Built-in format codes for the ids the classifier needs to see. The rest
/// of Excel's built-in table never changes rendering here.
pub(crate) fn builtin_code(id: u16) -> Option<&'static str> {
    let code = match id {
        3 => "#,##0",
        4 => "#,##0.00",
        14 => "mm-dd-yy",
        15 => "d-mmm-yy",
        16 => "d-mmm",
        17 => "mmm-yy",
        18 => "h:mm AM/PM",
        19 => "h:mm:ss AM/PM",
        20 => "h:mm",
        21 => "h:mm:ss",
        22 => "m/d/yy h:mm",
        37 => "#,##0 ;(#,##0)",
        38 => "#,##0 ;[Red](#,##0)",
        39 => "#,##0.00;(#,##0.00)",
        40 => "#,##0.00;[Red](#,##0.00)",
        45 => "mm:ss",
        46 => "[h]:mm:ss",
        47 => "mmss.0",
        _ => return None,
    };
    Some(code)
}

/// Classify a format by id and (custom) code. The code wins when present.
pub(crate) fn classify(id: u16, custom_code: Option<&str>) -> NumFmtKind {
    let code = custom_code.or_else(|| builtin_code(id));
    match code {
        Some(code) => classify_code(code),
        None => NumFmtKind::General,
    }
}

fn classify_code(code: &str) -> NumFmtKind {
    let mut has_date = false;
    let mut has_time = false;
    let mut has_grouping = false;

    // Quoted literals and [..] sections (colors, locale ids) don't count as
    // format tokens, except elapsed-time brackets like `[h]`.
    let mut chars = code.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                for c in chars.by_ref() {
                    if c == '"' {
                        break;
                    }
                }
            }
            '\\' => {
                chars.next();
            }
            '[' => {
                let mut section = String::new();
                for c in chars.by_ref() {
                    if c == ']' {
                        break;
                    }
                    section.push(c);
                }
                if section.eq_ignore_ascii_case("h")
                    || section.eq_ignore_ascii_case("hh")
                    || section.eq_ignore_ascii_case("mm")
                    || section.eq_ignore_ascii_case("ss")
                {
                    has_time = true;
                }
            }
            ',' => has_grouping = true,
            'y' | 'Y' | 'd' | 'D' => has_date = true,
            'h' | 'H' | 's' | 'S' => has_time = true,
            // `m` is month next to date tokens, minutes next to time tokens;
            // either way the cell is date/time formatted.
            'm' | 'M' => has_date = true,
            _ => {}
        }
    }

    if has_date || has_time {
        NumFmtKind::Date {
            with_time: has_time,
        }
    } else if has_grouping {
        NumFmtKind::Grouped
    } else {
        NumFmtKind::General
    }
}

/// Shortest natural rendering: integers lose the trailing `.0`.
pub(crate) fn format_number_plain(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// Render with thousands grouping on the integer digits.
pub(crate) fn format_number_grouped(n: f64) -> String {
    let plain = format_number_plain(n);
    let (sign, rest) = match plain.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", plain.as_str()),
    };
    let (int_part, frac_part) = match rest.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (rest, None),
    };

    let digits: Vec<u8> = int_part.bytes().collect();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, b) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*b as char);
    }

    match frac_part {
        Some(frac) => format!("{sign}{grouped}.{frac}"),
        None => format!("{sign}{grouped}"),
    }
}

/// Render an Excel 1900-system serial as `YYYY-MM-DD` (plus `HH:MM:SS` when
/// the format carries time tokens). Returns `None` for serials outside the
/// representable range.
pub(crate) fn format_date_serial(serial: f64, with_time: bool) -> Option<String> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }

    let days = serial.floor() as i64;
    // The 1900 date system counts a phantom Feb 29 1900 at serial 60; the
    // usual compensation is a different epoch on either side of it.
    let epoch = if days >= 60 {
        NaiveDate::from_ymd_opt(1899, 12, 30)?
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 31)?
    };
    let date = epoch.checked_add_signed(Duration::days(days))?;

    if !with_time {
        return Some(date.format("%Y-%m-%d").to_string());
    }

    let day_fraction = serial - serial.floor();
    let seconds = (day_fraction * 86_400.0).round() as u32;
    let time = chrono::NaiveTime::from_num_seconds_from_midnight_opt(seconds.min(86_399), 0)?;
    Some(format!("{} {}", date.format("%Y-%m-%d"), time.format("%H:%M:%S")))
}
