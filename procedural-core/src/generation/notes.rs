//! Handwritten notes left around the levels.
//!
//! Notes are gated by level depth; at most one is placed per level. Their
//! text lives with the UI layer, keyed by `id`.

use rand::seq::SliceRandom;
use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Note {
    pub id: &'static str,
    pub min_level: Option<i32>,
    pub max_level: Option<i32>,
}

impl Note {
    const fn new(id: &'static str, min_level: Option<i32>, max_level: Option<i32>) -> Self {
        Self {
            id,
            min_level,
            max_level,
        }
    }

    pub fn fits(&self, level: i32) -> bool {
        self.min_level.map_or(true, |min| level >= min)
            && self.max_level.map_or(true, |max| level <= max)
    }

    /// Name used for the placed object
    pub fn object_name(&self) -> String {
        format!("note:{}", self.id)
    }
}

pub const NOTES: [Note; 12] = [
    Note::new("drilled_holes", None, None),
    Note::new("screwdriver", Some(2), None),
    Note::new("no_desks", None, Some(2)),
    Note::new("gaping_maw", Some(2), None),
    Note::new("five_eyes", Some(2), None),
    Note::new("sofa_sofa", Some(2), None),
    Note::new("lamps", Some(3), None),
    Note::new("stiff_joints", Some(3), None),
    Note::new("black_stars", Some(4), None),
    Note::new("no_escape", Some(5), None),
    Note::new("wrong_channel", Some(6), None),
    Note::new("exit_found", Some(7), None),
];

pub fn notes_for_level(level: i32) -> Vec<&'static Note> {
    NOTES.iter().filter(|n| n.fits(level)).collect()
}

pub fn pick_note<R: Rng>(level: i32, rng: &mut R) -> Option<&'static Note> {
    notes_for_level(level).choose(rng).copied()
}
