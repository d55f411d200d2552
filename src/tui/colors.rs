//! Color constants for the terminal user interface.

use ratatui::style::Color;

use crate::fields::Status;

/// Used for completed work
pub const DARK_GREEN: Color = Color::Rgb(0, 80, 0);
/// Used for in-progress work and the status bar
pub const GOLD: Color = Color::Rgb(255, 215, 0);
/// Used for blocked work
pub const DARK_RED: Color = Color::Rgb(114, 0, 0);
/// Used for cancelled work
pub const DARK_PURPLE: Color = Color::Rgb(86, 60, 92);

/// Accent color for a status column and its cards.
pub fn status_color(status: Status) -> Color {
    match status {
        Status::Pending => Color::Blue,
        Status::InProgress => GOLD,
        Status::Blocked => DARK_RED,
        Status::Completed => DARK_GREEN,
        Status::Cancelled => DARK_PURPLE,
    }
}
