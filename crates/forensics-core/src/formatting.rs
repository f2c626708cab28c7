use chrono::NaiveDateTime;

/// Format a floating-point number with thousands separators and a fixed number
/// of decimal places.
///
/// # Examples
///
/// ```
/// use forensics_core::formatting::format_number;
///
/// assert_eq!(format_number(1234.5,  1), "1,234.5");
/// assert_eq!(format_number(1234567.0, 0), "1,234,567");
/// assert_eq!(format_number(0.0, 2), "0.00");
/// assert_eq!(format_number(-9876.5, 1), "-9,876.5");
/// ```
pub fn format_number(value: f64, decimals: u32) -> String {
    let negative = value < 0.0;
    let abs_value = value.abs();

    // Nudge by half an ULP at the target precision so exact midpoints round up.
    let factor = 10_f64.powi(decimals as i32);
    let epsilon = f64::EPSILON * abs_value * factor;
    let rounded = ((abs_value * factor) + epsilon).round() / factor;

    let integer_part = rounded.trunc() as u64;
    let frac_part = rounded - rounded.trunc();

    let grouped = group_thousands(&integer_part.to_string());

    let result = if decimals == 0 {
        grouped
    } else {
        let frac_str = format!("{:.prec$}", frac_part, prec = decimals as usize);
        // "0.50" -> ".50"
        format!("{}{}", grouped, &frac_str[1..])
    };

    if negative {
        format!("-{}", result)
    } else {
        result
    }
}

/// Format a journal size given in megabytes, e.g. `"1,536.00 MB"`.
///
/// Unknown sizes render as `"-"`.
///
/// # Examples
///
/// ```
/// use forensics_core::formatting::format_size_mb;
///
/// assert_eq!(format_size_mb(Some(1536.0)), "1,536.00 MB");
/// assert_eq!(format_size_mb(None), "-");
/// ```
pub fn format_size_mb(size: Option<f64>) -> String {
    match size {
        Some(mb) => format!("{} MB", format_number(mb, 2)),
        None => "-".to_string(),
    }
}

/// Calculate `(part / whole) * 100`, rounded to `decimal_places`.
///
/// Returns `0.0` if `whole` is zero to avoid division by zero.
///
/// # Examples
///
/// ```
/// use forensics_core::formatting::percentage;
///
/// assert!((percentage(50.0, 200.0, 1) - 25.0).abs() < 1e-9);
/// assert_eq!(percentage(0.0, 0.0, 2), 0.0);
/// ```
pub fn percentage(part: f64, whole: f64, decimal_places: u32) -> f64 {
    if whole == 0.0 {
        return 0.0;
    }
    let raw = (part / whole) * 100.0;
    let factor = 10_f64.powi(decimal_places as i32);
    (raw * factor).round() / factor
}

/// Format a count ratio the way rig reports label it: `"3/40 = 7.5%"`.
///
/// # Examples
///
/// ```
/// use forensics_core::formatting::format_ratio;
///
/// assert_eq!(format_ratio(3, 40), "3/40 = 7.5%");
/// assert_eq!(format_ratio(0, 0), "0/0 = 0.0%");
/// ```
pub fn format_ratio(part: usize, whole: usize) -> String {
    let pct = percentage(part as f64, whole as f64, 1);
    format!("{}/{} = {:.1}%", part, whole, pct)
}

/// Date label of the earliest timestamp, `dd.mm.YYYY`.
///
/// Returns `None` when no timestamps are given.
pub fn format_start_date<'a, I>(timestamps: I) -> Option<String>
where
    I: IntoIterator<Item = &'a NaiveDateTime>,
{
    timestamps
        .into_iter()
        .min()
        .map(|ts| ts.format("%d.%m.%Y").to_string())
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Insert commas every three digits from the right of an integer string.
fn group_thousands(s: &str) -> String {
    if s.len() <= 3 {
        return s.to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    let remainder = chars.len() % 3;
    for (i, &c) in chars.iter().enumerate() {
        if i != 0 && (i % 3 == remainder) {
            result.push(',');
        }
        result.push(c);
    }
    result
}

// ── Tests ──────────────────────────────────────────────────────────────────────
