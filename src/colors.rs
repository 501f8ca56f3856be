use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// 8-bit RGB color, rendered as `#rrggbb` for chart output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Parse a `#rrggbb` string, with or without the leading `#`.
    pub fn parse_hex(raw: &str) -> Result<Self> {
        let digits = raw.trim().trim_start_matches('#');
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            bail!("invalid hex color: {}", raw);
        }
        Ok(Rgb {
            r: u8::from_str_radix(&digits[0..2], 16)?,
            g: u8::from_str_radix(&digits[2..4], 16)?,
            b: u8::from_str_radix(&digits[4..6], 16)?,
        })
    }
}

/// Diverging heatmap palette: low through mid to high, plus a neutral color
/// for cells with no data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palette {
    pub low: Rgb,
    pub mid: Rgb,
    pub high: Rgb,
    pub absent: Rgb,
}

impl Default for Palette {
    fn default() -> Self {
        Palette {
            low: Rgb::new(0xd7, 0x30, 0x27),
            mid: Rgb::new(0xfe, 0xe0, 0x8b),
            high: Rgb::new(0x1a, 0x98, 0x50),
            absent: Rgb::new(0x9e, 0x9e, 0x9e),
        }
    }
}

impl Palette {
    /// Map a metric value onto the palette given the metric's [min, max]
    /// range over the whole grid.
    ///
    /// Missing or non-finite values take the neutral color. When the range
    /// has zero span every value normalizes to 0 and takes the low color,
    /// which keeps a single-valued grid from dividing by zero. Values outside
    /// the range clamp to its ends.
    pub fn color_for(&self, value: Option<f64>, min: f64, max: f64) -> Rgb {
        let Some(value) = value else {
            return self.absent;
        };
        if !value.is_finite() || !min.is_finite() || !max.is_finite() {
            return self.absent;
        }

        let span = max - min;
        let denom = if span == 0.0 { 1.0 } else { span };
        let t = ((value - min) / denom).clamp(0.0, 1.0);

        if t <= 0.5 {
            lerp(self.low, self.mid, t * 2.0)
        } else {
            lerp(self.mid, self.high, (t - 0.5) * 2.0)
        }
    }
}

fn lerp(from: Rgb, to: Rgb, t: f64) -> Rgb {
    let channel = |a: u8, b: u8| -> u8 {
        (a as f64 + (b as f64 - a as f64) * t).round().clamp(0.0, 255.0) as u8
    };
    Rgb {
        r: channel(from.r, to.r),
        g: channel(from.g, to.g),
        b: channel(from.b, to.b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_values_take_the_neutral_color() {
        let palette = Palette::default();
        assert_eq!(palette.color_for(None, 0.0, 10.0), palette.absent);
        assert_eq!(palette.color_for(Some(f64::NAN), 0.0, 10.0), palette.absent);
    }

    #[test]
    fn endpoints_hit_the_palette_ends() {
        let palette = Palette::default();
        assert_eq!(palette.color_for(Some(0.0), 0.0, 10.0), palette.low);
        assert_eq!(palette.color_for(Some(10.0), 0.0, 10.0), palette.high);
        assert_eq!(palette.color_for(Some(5.0), 0.0, 10.0), palette.mid);
    }

    #[test]
    fn zero_span_range_maps_to_the_low_color() {
        let palette = Palette::default();
        assert_eq!(palette.color_for(Some(7.0), 7.0, 7.0), palette.low);
    }

    #[test]
    fn out_of_range_values_clamp() {
        let palette = Palette::default();
        assert_eq!(palette.color_for(Some(-100.0), 0.0, 10.0), palette.low);
        assert_eq!(palette.color_for(Some(100.0), 0.0, 10.0), palette.high);
    }

    #[test]
    fn hex_round_trips() {
        let color = Rgb::new(0x1a, 0x98, 0x50);
        assert_eq!(color.to_hex(), "#1a9850");
        assert_eq!(Rgb::parse_hex("#1a9850").unwrap(), color);
        assert_eq!(Rgb::parse_hex("1a9850").unwrap(), color);
        assert!(Rgb::parse_hex("#12345").is_err());
        assert!(Rgb::parse_hex("zzzzzz").is_err());
    }
}
