//! Size literal parsing (`500M`, `2G`, `1T`, `10%`, raw bytes).

pub const MIB: u64 = 1024 * 1024;
pub const GIB: u64 = 1024 * MIB;
pub const TIB: u64 = 1024 * GIB;

/// Parse a user size literal into bytes.
///
/// Units are binary (`M`/`MB` = 2^20, `G`/`GB` = 2^30, `T`/`TB` = 2^40) and
/// case-insensitive. `N%` is a fraction of `disk_total`, evaluated now.
/// A bare integer is a byte count. Anything else, and any negative or
/// non-finite result, is 0: a bad literal shows up as a space deficit, never
/// as an error.
pub fn parse_size(input: &str, disk_total: u64) -> u64 {
    let text = input.trim().to_ascii_uppercase();

    if let Some(pct) = text.strip_suffix('%') {
        return match pct.trim_end_matches('%').parse::<f64>() {
            Ok(pct) => clamp_bytes(pct / 100.0 * disk_total as f64),
            Err(_) => 0,
        };
    }

    if let Some((number, multiplier)) = split_unit(&text) {
        if is_decimal(number) {
            return match number.parse::<f64>() {
                Ok(value) => clamp_bytes(value * multiplier as f64),
                Err(_) => 0,
            };
        }
    }

    text.parse::<i64>().map(|n| n.max(0) as u64).unwrap_or(0)
}

/// Split `<number><unit>`; a missing unit means bytes.
fn split_unit(text: &str) -> Option<(&str, u64)> {
    let units: [(&str, u64); 6] = [
        ("MB", MIB),
        ("GB", GIB),
        ("TB", TIB),
        ("M", MIB),
        ("G", GIB),
        ("T", TIB),
    ];
    for (suffix, multiplier) in units {
        if let Some(number) = text.strip_suffix(suffix) {
            return Some((number, multiplier));
        }
    }
    Some((text, 1))
}

/// `\d+(\.\d+)?`
fn is_decimal(text: &str) -> bool {
    let mut parts = text.splitn(2, '.');
    let whole = parts.next().unwrap_or_default();
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    match parts.next() {
        Some(frac) => digits(whole) && digits(frac),
        None => digits(whole),
    }
}

fn clamp_bytes(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value as u64
    } else {
        0
    }
}
