// Test fixtures: sample scenes shared by integration tests
#![allow(dead_code)]

/// Cast used by every scene below
pub const CAST: &[&str] = &["Kotori", "Umi", "Honoka"];

/// Short scenes mixing every heuristic kind, quotes and a pronoun
pub const SCENES: &[&str] = &[
    "Kotori: Good morning!\n\"Umi, wait,\" Honoka called. Umi sighed.",
    "\"Kotori said she would come,\" Umi muttered. Honoka's bag fell.",
    "Honoka smiled at the door. She waved. \"Hey, Kotori!\"",
    "Umi's voice cracked. Kotori bowed.\nHonoka; hello",
];

/// A scene whose quoted dialogue names characters that never act
pub const QUOTED_ONLY: &str = "\"Kotori smiled at Umi,\" the narrator read, \"and Honoka walked off.\"";

/// Build a long narration of `count` alternating lines
pub fn alternating_scene(count: usize) -> String {
    let mut result = String::new();
    for i in 0..count {
        let name = CAST[i % CAST.len()];
        result.push_str(&format!("{name} nodded at line {i}. "));
    }
    result
}
