/// Helper utilities shared by the stream output and the dashboard

use serde::Serialize;

/// 8-bit RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// `#rrggbb` notation
    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

// How fast red saturates as usage climbs
const RED_FACTOR: f64 = 1.75;

/// Map a 0-100 percentage onto a green-to-red ramp.
///
/// Red saturates at ~57%, green starts fading past 50%, so mid-range usage
/// reads as amber. Out-of-range input is clamped.
pub fn percent_to_rgb(percent: f64) -> Rgb {
    let norm = percent.clamp(0.0, 100.0) / 100.0;
    let red = (norm * RED_FACTOR).clamp(0.0, 1.0) * 255.0;
    let green = ((1.0 - norm) * 2.0).clamp(0.0, 1.0) * 255.0;
    Rgb(red as u8, green as u8, 0)
}

/// Format bytes to human-readable format
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    if bytes >= TB {
        format!("{:.2} TB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// One decimal, fixed width so columns line up
pub fn format_percent(percent: f64) -> String {
    format!("{:5.1}%", percent)
}

/// Text meter like `[|||||     ]` scaled to `width` characters
pub fn meter_bar(percent: f64, width: usize) -> String {
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * width as f64) as usize;
    format!("[{}{}]", "|".repeat(filled), " ".repeat(width - filled))
}
