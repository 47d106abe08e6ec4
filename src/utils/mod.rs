pub mod datetime;

pub use datetime::{DateTimeError, DateTimeParser};

/// Human readable number with thousands separators
pub fn format_count(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if value < 0 {
        format!("-{}", out)
    } else {
        out
    }
}

/// Signed variant of [`format_count`] used for deltas
pub fn format_delta(value: i64) -> String {
    if value > 0 {
        format!("+{}", format_count(value))
    } else {
        format_count(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1150), "1,150");
        assert_eq!(format_count(-1234567), "-1,234,567");
    }

    #[test]
    fn test_format_delta() {
        assert_eq!(format_delta(150), "+150");
        assert_eq!(format_delta(-5), "-5");
        assert_eq!(format_delta(0), "0");
    }
}
