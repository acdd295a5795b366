//! Rendering of resolved records into text lines.

use std::fmt::Write;

use crate::types::*;

/// Deltas above this many microseconds are treated as corrupt timestamps.
const MAX_DELTA_USECS: f64 = 1_000_000_000.0;

/// Upper bound on printf field widths, so a corrupt format text cannot
/// request an arbitrarily large padding.
const MAX_FIELD_WIDTH: usize = MAX_TEXT_LEN as usize;

const COLOR_RED: &str = "\x1b[31m";
const COLOR_RESET: &str = "\x1b[0m";

/// Convert clock ticks to microseconds. `clock` is in ticks per microsecond.
pub fn to_usecs(ticks: u64, clock: f64) -> f64 {
    ticks as f64 / clock
}

/// Time elapsed since the previous record, in microseconds.
///
/// `None` when the timestamp went backwards or jumped implausibly far ahead.
pub fn delta_usecs(prev: u64, cur: u64, clock: f64) -> Option<f64> {
    let ticks = cur.checked_sub(prev)?;
    let dt = to_usecs(ticks, clock);
    if dt.is_finite() && dt <= MAX_DELTA_USECS {
        Some(dt)
    } else {
        None
    }
}

/// Mask selecting the low `bits` bits of an identifier field.
pub fn id_mask(bits: u32) -> u32 {
    ((1u64 << bits.min(32)) - 1) as u32
}

/// Column header printed once before the first record.
pub fn table_header() -> String {
    format!(
        "{:>5} {:>6} {:>12} {:>7} {:>16} {:>16} {:>24}\t{}",
        "CORE", "LEVEL", "COMP_ID", "", "TIMESTAMP", "DELTA", "FILE_NAME", "CONTENT"
    )
}

/// Formats resolved records into output lines.
#[derive(Debug, Clone, Copy)]
pub struct LineFormatter {
    pub clock: f64,
    pub colors: bool,
    pub id_mask: u32,
}

impl LineFormatter {
    pub fn new(clock: f64) -> Self {
        Self {
            clock,
            colors: false,
            id_mask: id_mask(DEFAULT_ID_BITS),
        }
    }

    /// Render one line, without a trailing newline.
    pub fn format_line(
        &self,
        record: &TraceRecord,
        entry: &LdcEntry,
        params: &Params,
        prev_timestamp: u64,
    ) -> String {
        let mut line = String::with_capacity(128 + entry.text.len());

        if self.colors && LogLevel::from_raw(entry.header.level) == Some(LogLevel::Critical) {
            line.push_str(COLOR_RED);
        }

        let ids = if entry.has_ids() {
            format!(
                "{}.{}",
                record.id_0 & self.id_mask,
                record.id_1 & self.id_mask
            )
        } else {
            String::new()
        };

        let delta = match delta_usecs(prev_timestamp, record.timestamp, self.clock) {
            Some(dt) => format!("{:.6}", dt),
            None => "nan".to_string(),
        };

        let _ = write!(
            line,
            "{:5} {:6} {:>12} {:<7} {:16.6} {:>16} {:>20}:{:<4}\t",
            record.core_id,
            entry.header.level,
            ComponentClass::from_raw(entry.header.component_class).name(),
            ids,
            to_usecs(record.timestamp, self.clock),
            delta,
            entry.file_name(),
            entry.header.line_idx,
        );

        let text = entry.text();
        if entry.header.params_num == 0 {
            line.push_str(&text);
        } else {
            line.push_str(&fill_params(&text, params.as_slice()));
        }

        if self.colors {
            line.push_str(COLOR_RESET);
        }
        line
    }
}

/// A parsed printf conversion specification.
#[derive(Debug, Default, PartialEq)]
struct Conversion {
    left: bool,
    plus: bool,
    space: bool,
    alt: bool,
    zero: bool,
    width: usize,
    precision: Option<usize>,
    kind: char,
}

/// Parse the conversion following a `%`. Returns the conversion and the
/// number of bytes it spans, or `None` if the text ends mid-conversion.
fn parse_conversion(s: &str) -> Option<(Conversion, usize)> {
    let b = s.as_bytes();
    let mut i = 0;
    let mut c = Conversion::default();

    while i < b.len() {
        match b[i] {
            b'-' => c.left = true,
            b'+' => c.plus = true,
            b' ' => c.space = true,
            b'#' => c.alt = true,
            b'0' => c.zero = true,
            _ => break,
        }
        i += 1;
    }
    while i < b.len() && b[i].is_ascii_digit() {
        c.width = c.width.saturating_mul(10).saturating_add((b[i] - b'0') as usize);
        i += 1;
    }
    if i < b.len() && b[i] == b'.' {
        i += 1;
        let mut p: usize = 0;
        while i < b.len() && b[i].is_ascii_digit() {
            p = p.saturating_mul(10).saturating_add((b[i] - b'0') as usize);
            i += 1;
        }
        c.precision = Some(p.min(MAX_FIELD_WIDTH));
    }
    // Length modifiers carry no meaning for 32-bit parameter words.
    while i < b.len() && matches!(b[i], b'h' | b'l' | b'L' | b'q' | b'j' | b'z' | b't') {
        i += 1;
    }

    c.width = c.width.min(MAX_FIELD_WIDTH);

    let kind = *b.get(i)?;
    if !kind.is_ascii() {
        return None;
    }
    c.kind = kind as char;
    Some((c, i + 1))
}

fn render(c: &Conversion, v: u32) -> String {
    if c.kind == 'c' {
        let ch = (v as u8) as char;
        return pad(String::new(), "", ch.to_string(), c.width, c.left, false);
    }

    let (sign, mut digits, prefix) = match c.kind {
        'd' | 'i' => {
            let n = v as i32;
            let sign = if n < 0 {
                "-"
            } else if c.plus {
                "+"
            } else if c.space {
                " "
            } else {
                ""
            };
            (sign, n.unsigned_abs().to_string(), "")
        }
        'x' => ("", format!("{:x}", v), if c.alt && v != 0 { "0x" } else { "" }),
        'X' => ("", format!("{:X}", v), if c.alt && v != 0 { "0X" } else { "" }),
        'o' => ("", format!("{:o}", v), if c.alt && v != 0 { "0" } else { "" }),
        // Pointers and strings refer to firmware memory; show the address.
        'p' | 's' => ("", format!("{:x}", v), "0x"),
        _ => ("", v.to_string(), ""),
    };

    if let Some(p) = c.precision {
        if p == 0 && v == 0 {
            digits.clear();
        } else if digits.len() < p {
            digits = format!("{}{}", "0".repeat(p - digits.len()), digits);
        }
    }

    let zero = c.zero && !c.left && c.precision.is_none();
    pad(sign.to_string(), prefix, digits, c.width, c.left, zero)
}

fn pad(sign: String, prefix: &str, body: String, width: usize, left: bool, zero: bool) -> String {
    let len = sign.len() + prefix.len() + body.chars().count();
    let fill = width.saturating_sub(len);
    if left {
        format!("{}{}{}{}", sign, prefix, body, " ".repeat(fill))
    } else if zero {
        format!("{}{}{}{}", sign, prefix, "0".repeat(fill), body)
    } else {
        format!("{}{}{}{}", " ".repeat(fill), sign, prefix, body)
    }
}

/// Substitute `params` into the printf-style `text`, in order.
///
/// Conversions beyond the available parameters are left as written, and
/// surplus parameters are ignored.
pub fn fill_params(text: &str, params: &[u32]) -> String {
    let mut out = String::with_capacity(text.len() + params.len() * 8);
    let mut args = params.iter();
    let mut rest = text;

    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        let Some((conv, len)) = parse_conversion(after) else {
            out.push_str(&rest[pos..]);
            return out;
        };
        let spec = &rest[pos..pos + 1 + len];
        rest = &after[len..];

        if conv.kind == '%' {
            out.push('%');
            continue;
        }
        match args.next() {
            Some(v) => out.push_str(&render(&conv, *v)),
            None => out.push_str(spec),
        }
    }

    out.push_str(rest);
    out
}
