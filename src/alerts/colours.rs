/// Embed colours used by the webhook alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Colour {
    Green,
    Red,
    Blue,
    Cyan,
    Yellow,
    Orange,
}

impl Colour {
    /// 24-bit RGB value as the webhook expects it.
    pub fn rgb(&self) -> u32 {
        match self {
            Colour::Green => 0x00FF00,  // connected / online / average
            Colour::Red => 0xFF0000,    // offline / error / hot
            Colour::Blue => 0x0000FF,   // cold
            Colour::Cyan => 0x00FFFF,   // cool
            Colour::Yellow => 0xFFFF00, // warm / mispositioned
            Colour::Orange => 0xFFA500, // disconnected
        }
    }
}
