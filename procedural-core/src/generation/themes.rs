//! Room visual themes.
//!
//! Each room draws one theme at random. The renderer uses the texture names
//! and tints; the generator only uses the decoration pool.

use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Theme {
    pub wall: &'static str,
    pub floor: &'static str,
    pub wall_tint: u32,
    pub floor_tint: u32,
    pub decorations: &'static [&'static str],
}

pub const THEMES: [Theme; 5] = [
    Theme {
        wall: "bad_bricks",
        floor: "bad_concrete",
        wall_tint: 0xA09999,
        floor_tint: 0x666666,
        decorations: &["box"],
    },
    Theme {
        wall: "bad_bricks",
        floor: "bad_concrete",
        wall_tint: 0xA00000,
        floor_tint: 0x666666,
        decorations: &["box", "bookshelf", "cabinet", "lamp", "table"],
    },
    Theme {
        wall: "test_wall",
        floor: "bad_concrete",
        wall_tint: 0x0000AA,
        floor_tint: 0x666644,
        decorations: &["bookshelf", "cabinet", "lamp", "table"],
    },
    Theme {
        wall: "test_wall",
        floor: "bad_concrete",
        wall_tint: 0x990099,
        floor_tint: 0x669966,
        decorations: &["bookshelf", "cabinet", "lamp"],
    },
    Theme {
        wall: "bad_bricks",
        floor: "bad_concrete",
        wall_tint: 0x999900,
        floor_tint: 0x996633,
        decorations: &["box", "bookshelf", "cabinet", "table"],
    },
];

pub fn theme(id: usize) -> Option<&'static Theme> {
    THEMES.get(id)
}
