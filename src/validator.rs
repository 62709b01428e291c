//! Syntax checks for rule engine and tag names.

/// Maximum length of a rule engine or tag name.
pub const MAX_NAME_LEN: usize = 30;

/// A name is valid when it has 1 to 30 characters, all ASCII letters or digits.
pub fn is_valid_name(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_NAME_LEN
        && value.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Tags follow the same rules as engine names.
pub fn is_valid_tag(value: &str) -> bool {
    is_valid_name(value)
}
