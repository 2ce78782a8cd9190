//! Random bin names

use rand::Rng;

/// Characters bin names are drawn from by default
pub const DEFAULT_ALPHABET: &str = "0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Default bin name length
pub const DEFAULT_NAME_LENGTH: usize = 10;

/// Generate a name of `length` characters drawn uniformly from `alphabet`
///
/// Returns an empty string when the alphabet is empty.
pub fn random_name(alphabet: &str, length: usize) -> String {
    let chars: Vec<char> = alphabet.chars().collect();
    if chars.is_empty() {
        return String::new();
    }

    let mut rng = rand::rng();
    (0..length)
        .map(|_| chars[rng.random_range(0..chars.len())])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_and_alphabet() {
        let name = random_name(DEFAULT_ALPHABET, DEFAULT_NAME_LENGTH);

        assert_eq!(name.chars().count(), 10);
        assert!(name.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_restricted_alphabet() {
        let name = random_name("ab", 64);
        assert!(name.chars().all(|c| c == 'a' || c == 'b'));
    }

    #[test]
    fn test_empty_alphabet() {
        assert_eq!(random_name("", 10), "");
    }
}
