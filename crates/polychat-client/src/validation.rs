//! Input predicates for identities and channel names.
//!
//! Lengths are counted in characters, not bytes.

use std::ops::RangeInclusive;

/// Accepted identity length.
pub const USERNAME_LEN: RangeInclusive<usize> = 3..=15;

/// Accepted channel name length.
pub const GROUP_NAME_LEN: RangeInclusive<usize> = 5..=20;

/// Whether `name` is an acceptable identity.
pub fn validate_username(name: &str) -> bool {
    USERNAME_LEN.contains(&name.chars().count())
}

/// Whether `name` is an acceptable channel name.
pub fn validate_group_name(name: &str) -> bool {
    GROUP_NAME_LEN.contains(&name.chars().count())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_bounds() {
        assert!(!validate_username("ab"));
        assert!(validate_username("abc"));
        assert!(validate_username("abcdefghijklmno"));
        assert!(!validate_username("abcdefghijklmnop"));
    }

    #[test]
    fn group_name_bounds() {
        assert!(!validate_group_name("abcd"));
        assert!(validate_group_name("abcde"));
        assert!(validate_group_name(&"x".repeat(20)));
        assert!(!validate_group_name(&"x".repeat(21)));
    }

    #[test]
    fn length_counts_characters() {
        // Three characters, nine bytes.
        assert!(validate_username("\u{00e9}t\u{00e9}"));
        assert!(validate_username("\u{4f60}\u{597d}\u{5417}"));
    }
}
