//! Identifiers and colors shared across the core.

use serde::{Deserialize, Serialize};

/// Node identifier assigned by the runtime. Stable for the node's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuntimeNodeId(pub u64);

impl std::fmt::Display for RuntimeNodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Human-facing node label (the runtime's "translated" id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisplayId(pub u64);

impl std::fmt::Display for DisplayId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Default fill for nodes the program has not colored.
    pub const NODE_DEFAULT: Self = Self::new(0xdd, 0xdd, 0xff);

    /// Default stroke for routing edges.
    pub const EDGE_DEFAULT: Self = Self::new(0x33, 0x33, 0x33);

    /// Saturating conversion from the runtime's int channels.
    pub fn from_channels(r: i64, g: i64, b: i64) -> Self {
        let clamp = |c: i64| c.clamp(0, 255) as u8;
        Self::new(clamp(r), clamp(g), clamp(b))
    }

    /// `#rrggbb` form for presentation clients.
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_serialize_as_bare_integers() {
        assert_eq!(serde_json::to_string(&RuntimeNodeId(7)).unwrap(), "7");
        let id: DisplayId = serde_json::from_str("100").unwrap();
        assert_eq!(id, DisplayId(100));
    }

    #[test]
    fn channels_saturate() {
        assert_eq!(Rgb::from_channels(-4, 128, 999), Rgb::new(0, 128, 255));
        assert_eq!(Rgb::new(255, 0, 16).to_hex(), "#ff0010");
    }
}
