//! Console colour palette (hex strings handed to the renderer).

pub const BLUE: &str = "#00A3FF";
pub const GREEN: &str = "#00E676";
pub const AMBER: &str = "#FFB300";
pub const RED: &str = "#FF3A5E";
pub const WHITE: &str = "#FFFFFF";

/// Dark panel body.
pub const PANEL: &str = "#1A1F2C";
/// Raised steel trim.
pub const STEEL: &str = "#2C3142";
/// Floors and shadowed frames.
pub const SHADOW: &str = "#141821";
