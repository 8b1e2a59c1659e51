use rand::seq::SliceRandom;
use rand::Rng;

const DEFAULT_CHARACTERS: [&str; 28] = [
    "Abigail", "Alex", "Alice", "Amy", "Andy", "Ashley", "Brandon", "Brian", "Daniel", "David",
    "Emily", "Henry", "Jake", "James", "Joe", "Jon", "Joseph", "Joshua", "Justin", "Kyle", "Matt",
    "Megan", "Melissa", "Nick", "Peter", "Rachael", "Tyler", "William",
];

/// The characters on the board. Names match exactly (case-sensitive).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    names: Vec<String>,
}

impl Default for Roster {
    fn default() -> Self {
        Self::new(DEFAULT_CHARACTERS)
    }
}

impl Roster {
    /// Build a roster; duplicate names are kept once, first position wins.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if !unique.contains(&name) {
                unique.push(name);
            }
        }
        Self { names: unique }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Two distinct characters, in random order
    pub fn pick_pair<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<(String, String)> {
        let mut picked = self.names.choose_multiple(rng, 2);
        let first = picked.next()?.clone();
        let second = picked.next()?.clone();
        Some((first, second))
    }
}
