//! Name uniquification for rooms and rollers.
//!
//! Room names are unique process-wide, roller names are unique within
//! their room. Both go through [`uniquify`], which never fails and never
//! loops forever:
//!
//! - An empty request gets a random `adjective-noun` name, retried up to
//!   [`MAX_GENERATION_ATTEMPTS`] times before falling back to a
//!   deterministic pattern that widens until it is free.
//! - A non-empty request is used as a base and suffixed with `-1`, `-2`, …
//!   until the smallest free suffix is found.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

/// Random name attempts before the deterministic fallback kicks in.
pub const MAX_GENERATION_ATTEMPTS: usize = 100;

/// Base of the deterministic fallback pattern.
const FALLBACK_NAME: &str = "anonymous";

const ADJECTIVES: &[&str] = &[
    "ancient", "bitter", "bold", "brave", "calm", "cold", "crimson", "curly", "damp", "dark",
    "dawn", "delicate", "divine", "dry", "empty", "falling", "fancy", "flat", "floral",
    "fragrant", "frosty", "gentle", "green", "hidden", "holy", "icy", "jolly", "late",
    "lingering", "little", "lively", "long", "lucky", "misty", "morning", "muddy", "nameless",
    "noisy", "old", "orange", "patient", "plain", "polished", "proud", "purple", "quiet",
    "rapid", "raspy", "restless", "rough", "round", "royal", "shiny", "shy", "silent",
    "small", "snowy", "soft", "solitary", "sparkling", "spring", "square", "steep", "still",
    "summer", "super", "sweet", "throbbing", "tight", "tiny", "twilight", "wandering",
    "weathered", "white", "wild", "winter", "wispy", "withered", "yellow", "young",
];

const NOUNS: &[&str] = &[
    "art", "band", "bar", "base", "bird", "block", "boat", "bonus", "bread", "breeze",
    "brook", "bush", "butterfly", "cake", "cell", "cherry", "cloud", "credit", "darkness",
    "dawn", "dew", "disk", "dream", "dust", "feather", "field", "fire", "firefly", "flower",
    "fog", "forest", "frog", "frost", "glade", "glitter", "grass", "hall", "hat", "haze",
    "heart", "hill", "king", "lab", "lake", "leaf", "limit", "math", "meadow", "mode",
    "moon", "morning", "mountain", "mouse", "mud", "night", "paper", "pine", "poetry",
    "pond", "queen", "rain", "recipe", "resonance", "rice", "river", "salad", "scene",
    "sea", "shadow", "shape", "silence", "sky", "smoke", "snow", "snowflake", "sound",
    "star", "sun", "sunset", "surf", "term", "thunder", "tooth", "tree", "truth", "union",
    "unit", "violet", "voice", "water", "waterfall", "wave", "wildflower", "wind", "wood",
];

/// Return a name that is not contained in `taken`.
///
/// `requested` is used verbatim when it is free. Collisions are resolved by
/// appending the smallest `-N` suffix that is free. An empty `requested`
/// is replaced by a generated name first.
#[must_use]
pub fn uniquify(requested: &str, taken: &HashSet<&str>) -> String {
    let base = if requested.is_empty() {
        generate_name(taken)
    } else {
        requested.to_string()
    };

    if !taken.contains(base.as_str()) {
        return base;
    }

    // Each step consumes a new suffix and `taken` is finite, so this ends.
    let mut suffix: u64 = 1;
    loop {
        let candidate = format!("{base}-{suffix}");
        if !taken.contains(candidate.as_str()) {
            return candidate;
        }
        suffix += 1;
    }
}

/// Generate a random human-readable name that is not in `taken`.
///
/// The generator is seeded from the wall clock. After
/// [`MAX_GENERATION_ATTEMPTS`] collisions the deterministic fallback is
/// used instead.
#[must_use]
pub fn generate_name(taken: &HashSet<&str>) -> String {
    let mut rng = StdRng::seed_from_u64(wall_clock_seed());

    for _ in 0..MAX_GENERATION_ATTEMPTS {
        let adjective = ADJECTIVES.choose(&mut rng).copied().unwrap_or("plain");
        let noun = NOUNS.choose(&mut rng).copied().unwrap_or("die");
        let name = format!("{adjective}-{noun}");
        if !taken.contains(name.as_str()) {
            return name;
        }
    }

    tracing::warn!(
        target: "dice.names",
        attempts = MAX_GENERATION_ATTEMPTS,
        taken = taken.len(),
        "Random name generation exhausted, using fallback pattern"
    );
    fallback_name(taken)
}

/// Deterministic fallback: `anonymous`, `anonymousanonymous`, … until free.
fn fallback_name(taken: &HashSet<&str>) -> String {
    let mut name = String::new();
    loop {
        name.push_str(FALLBACK_NAME);
        if !taken.contains(name.as_str()) {
            return name;
        }
    }
}

fn wall_clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| {
            // Truncation is fine, any bits make a seed
            #[allow(clippy::cast_possible_truncation)]
            let nanos = d.as_nanos() as u64;
            nanos
        })
        .unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn taken<'a>(names: &[&'a str]) -> HashSet<&'a str> {
        names.iter().copied().collect()
    }

    #[test]
    fn test_free_name_is_kept() {
        assert_eq!(uniquify("alice", &taken(&["bob"])), "alice");
        assert_eq!(uniquify("alice", &HashSet::new()), "alice");
    }

    #[test]
    fn test_collision_appends_smallest_suffix() {
        assert_eq!(uniquify("alice", &taken(&["alice"])), "alice-1");
        assert_eq!(
            uniquify("alice", &taken(&["alice", "alice-1", "alice-2"])),
            "alice-3"
        );
        // Gaps are filled with the smallest free suffix
        assert_eq!(uniquify("alice", &taken(&["alice", "alice-2"])), "alice-1");
    }

    #[test]
    fn test_suffix_applies_to_names_that_look_suffixed() {
        assert_eq!(uniquify("alice-1", &taken(&["alice-1"])), "alice-1-1");
    }

    #[test]
    fn test_empty_request_generates_name() {
        let name = uniquify("", &HashSet::new());
        assert!(!name.is_empty());
        assert!(name.contains('-'), "expected adjective-noun, got {name}");
    }

    #[test]
    fn test_generated_name_avoids_taken() {
        let first = generate_name(&HashSet::new());
        let second = generate_name(&taken(&[first.as_str()]));
        assert_ne!(first, second);
    }

    #[test]
    fn test_fallback_widens_until_free() {
        assert_eq!(fallback_name(&HashSet::new()), "anonymous");
        assert_eq!(
            fallback_name(&taken(&["anonymous", "anonymousanonymous"])),
            "anonymousanonymousanonymous"
        );
    }

    #[test]
    fn test_generation_terminates_when_every_random_name_is_taken() {
        let all: Vec<String> = ADJECTIVES
            .iter()
            .flat_map(|a| NOUNS.iter().map(move |n| format!("{a}-{n}")))
            .collect();
        let set: HashSet<&str> = all.iter().map(String::as_str).collect();

        assert_eq!(generate_name(&set), "anonymous");
    }

    #[test]
    fn test_growing_taken_set_stays_unique() {
        let mut owned: Vec<String> = Vec::new();
        for requested in ["", "alice", "alice", "", "bob", "alice", "alice-1", ""] {
            let set: HashSet<&str> = owned.iter().map(String::as_str).collect();
            let name = uniquify(requested, &set);
            assert!(!set.contains(name.as_str()), "{name} collided");
            owned.push(name);
        }
        assert_eq!(owned.len(), 8);
    }
}
