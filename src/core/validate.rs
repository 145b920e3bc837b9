use std::collections::BTreeMap;

use crate::core::error::{Error, Result};

/// Collects field-level validation errors so callers receive every violation
/// at once instead of failing on the first.
#[derive(Debug, Default)]
pub struct Validator {
    pub errors: BTreeMap<String, String>,
}

impl Validator {
    pub fn new() -> Self {
        Validator {
            errors: BTreeMap::new(),
        }
    }

    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Records an error for a field unless one is already present.
    pub fn add_error(&mut self, key: &str, message: &str) {
        self.errors
            .entry(key.to_string())
            .or_insert_with(|| message.to_string());
    }

    pub fn check(&mut self, ok: bool, key: &str, message: &str) {
        if !ok {
            self.add_error(key, message);
        }
    }

    /// Consumes the validator, returning `Ok(())` when no checks failed.
    pub fn finish(self) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(Error::validation(self.errors))
        }
    }
}

pub fn permitted_value<T: PartialEq>(value: &T, permitted: &[T]) -> bool {
    permitted.contains(value)
}

/// Rejects control and format characters (bidi controls, zero-width marks).
/// Input is expected to be normalized already.
pub fn clean_unicode(value: &str) -> bool {
    !value.chars().any(|c| {
        c.is_control()
            || matches!(
                c,
                '\u{200B}'..='\u{200F}' | '\u{202A}'..='\u{202E}' | '\u{2066}'..='\u{2069}' | '\u{FEFF}'
            )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;

    #[test]
    fn collects_all_failures() {
        let mut v = Validator::new();
        v.check(false, "title", "must be provided");
        v.check(false, "status", "must be valid");
        v.check(true, "notes", "never recorded");

        let err = v.finish().unwrap_err();
        match err.kind {
            ErrorKind::Validation(fields) => {
                assert_eq!(fields.len(), 2);
                assert_eq!(fields["title"], "must be provided");
                assert_eq!(fields["status"], "must be valid");
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn first_error_per_field_wins() {
        let mut v = Validator::new();
        v.add_error("title", "first");
        v.add_error("title", "second");
        assert_eq!(v.errors["title"], "first");
    }

    #[test]
    fn clean_unicode_rejects_controls() {
        assert!(clean_unicode("plain text, 中文も OK"));
        assert!(!clean_unicode("sneaky\u{202E}reversed"));
        assert!(!clean_unicode("null\u{0000}byte"));
        assert!(!clean_unicode("zero\u{200B}width"));
    }
}
