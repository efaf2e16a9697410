//! Node name validation.
//!
//! A node name is 1..=255 bytes of ASCII letters, digits and `_`, and must not
//! start with a digit. Uniqueness is not checked here; the middleware layer
//! owns the domain-wide registry.

/// Longest accepted node name, in bytes.
pub const MAX_NODE_NAME_LEN: usize = 255;

/// Why a node name was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    #[error("name is empty")]
    Empty,
    #[error("name is {len} bytes long, limit is {max}")]
    TooLong { len: usize, max: usize },
    #[error("name must not start with a digit")]
    StartsWithDigit,
    #[error("invalid character {ch:?} at index {index}")]
    InvalidCharacter { ch: char, index: usize },
}

/// Check `name` against the node naming rules.
pub fn validate_node_name(name: &str) -> Result<(), NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    if let Some((index, ch)) = name
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
    {
        return Err(NameError::InvalidCharacter { ch, index });
    }
    // Only ASCII past this point, so byte length == char count.
    if name.len() > MAX_NODE_NAME_LEN {
        return Err(NameError::TooLong {
            len: name.len(),
            max: MAX_NODE_NAME_LEN,
        });
    }
    if name.as_bytes()[0].is_ascii_digit() {
        return Err(NameError::StartsWithDigit);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_accepts_plain_names() {
        for name in ["talker", "_hidden", "node_42", "A"] {
            assert_eq!(validate_node_name(name), Ok(()), "{name}");
        }
    }

    #[test]
    fn test_rejects_empty() {
        assert_eq!(validate_node_name(""), Err(NameError::Empty));
    }

    #[test]
    fn test_rejects_leading_digit() {
        assert_eq!(validate_node_name("9lives"), Err(NameError::StartsWithDigit));
    }

    #[test]
    fn test_rejects_separators() {
        assert_eq!(
            validate_node_name("ns/talker"),
            Err(NameError::InvalidCharacter { ch: '/', index: 2 })
        );
        assert_eq!(
            validate_node_name("tälker"),
            Err(NameError::InvalidCharacter { ch: 'ä', index: 1 })
        );
    }

    #[test]
    fn test_length_limit() {
        let at_limit = "n".repeat(MAX_NODE_NAME_LEN);
        assert_eq!(validate_node_name(&at_limit), Ok(()));

        let over = "n".repeat(MAX_NODE_NAME_LEN + 1);
        assert_eq!(
            validate_node_name(&over),
            Err(NameError::TooLong {
                len: MAX_NODE_NAME_LEN + 1,
                max: MAX_NODE_NAME_LEN
            })
        );
    }

    proptest! {
        #[test]
        fn prop_identifiers_are_accepted(name in "[A-Za-z_][A-Za-z0-9_]{0,254}") {
            prop_assert_eq!(validate_node_name(&name), Ok(()));
        }

        #[test]
        fn prop_names_with_a_dash_are_rejected(prefix in "[a-z]{1,10}", suffix in "[a-z]{0,10}") {
            let name = format!("{prefix}-{suffix}");
            let rejected = matches!(
                validate_node_name(&name),
                Err(NameError::InvalidCharacter { ch: '-', .. })
            );
            prop_assert!(rejected);
        }
    }
}
