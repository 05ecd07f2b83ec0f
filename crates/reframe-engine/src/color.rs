//! Letterbox background color parsing
//!
//! Accepts a handful of CSS color names plus `#rgb` and `#rrggbb` hex forms.
//! Anything unparseable falls back to black, the documented letterbox
//! default, so a bad color never fails a request.

use image::Rgba;

/// Parse a background color value, falling back to opaque black.
pub fn parse_background(value: &str) -> Rgba<u8> {
    named(value)
        .or_else(|| hex(value))
        .unwrap_or(Rgba([0, 0, 0, 255]))
}

fn named(value: &str) -> Option<Rgba<u8>> {
    let rgb: [u8; 3] = match value.to_lowercase().as_str() {
        "black" => [0, 0, 0],
        "white" => [255, 255, 255],
        "gray" | "grey" => [128, 128, 128],
        "silver" => [192, 192, 192],
        "red" => [255, 0, 0],
        "green" => [0, 128, 0],
        "blue" => [0, 0, 255],
        "yellow" => [255, 255, 0],
        "cyan" => [0, 255, 255],
        "magenta" => [255, 0, 255],
        "orange" => [255, 165, 0],
        _ => return None,
    };
    Some(Rgba([rgb[0], rgb[1], rgb[2], 255]))
}

fn hex(value: &str) -> Option<Rgba<u8>> {
    let digits = value.strip_prefix('#')?;
    match digits.len() {
        3 => {
            let mut rgb = [0u8; 3];
            for (i, c) in digits.chars().enumerate() {
                let v = c.to_digit(16)? as u8;
                rgb[i] = v * 16 + v;
            }
            Some(Rgba([rgb[0], rgb[1], rgb[2], 255]))
        }
        6 => {
            let r = u8::from_str_radix(&digits[0..2], 16).ok()?;
            let g = u8::from_str_radix(&digits[2..4], 16).ok()?;
            let b = u8::from_str_radix(&digits[4..6], 16).ok()?;
            Some(Rgba([r, g, b, 255]))
        }
        _ => None,
    }
}
