//! Default nickname for servers that do not configure one.
//!
//! RFC 1459 only guarantees nine characters, so the result is a short word
//! followed by digits, never longer than [`MAX_NICK_LEN`].

use rand::RngExt;

pub const MAX_NICK_LEN: usize = 9;

const STEMS: &[&str] = &[
    "crab", "shell", "reef", "tide", "kelp", "coral", "pinch", "claw", "molt", "drift", "brine",
    "shoal", "wave", "sand", "pearl", "krill",
];

/// Generate a random nickname like `reef4821`.
pub fn generate_nickname() -> String {
    let mut rng = rand::rng();
    let stem = STEMS[rng.random_range(0..STEMS.len())];
    let digits = MAX_NICK_LEN - stem.len();
    let upper = 10u32.pow(digits.min(4) as u32);
    format!("{}{}", stem, rng.random_range(0..upper))
}
