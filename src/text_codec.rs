//! Rewrites the trailing padding characters of standard Base64 (`=`) into the
//! OpenToken text alphabet (`*`), and back.
//!
//! This is the only place in the crate that knows about the `*` substitution;
//! everywhere else deals in plain URL-safe Base64.

/// Replaces trailing Base64 pad characters with the OpenToken `*` form.
///
/// `==` becomes `**`, a single trailing `=` becomes `*`, and anything else is
/// returned unchanged.
#[must_use]
pub fn to_otk(b64: &str) -> String {
    if let Some(stem) = b64.strip_suffix("==") {
        format!("{stem}**")
    } else if let Some(stem) = b64.strip_suffix('=') {
        format!("{stem}*")
    } else {
        b64.to_owned()
    }
}

/// Inverse of [`to_otk`]: rewrites the OpenToken `*` pad back into standard
/// Base64 `=`.
#[must_use]
pub fn from_otk(otk_str: &str) -> String {
    if let Some(stem) = otk_str.strip_suffix("**") {
        format!("{stem}==")
    } else if let Some(stem) = otk_str.strip_suffix('*') {
        format!("{stem}=")
    } else {
        otk_str.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_double_pad() {
        assert_eq!(to_otk("YWJj=="), "YWJj**");
        assert_eq!(from_otk("YWJj**"), "YWJj==");
    }

    #[test]
    fn rewrites_single_pad() {
        assert_eq!(to_otk("YWI="), "YWI*");
        assert_eq!(from_otk("YWI*"), "YWI=");
    }

    #[test]
    fn leaves_unpadded_input_unchanged() {
        assert_eq!(to_otk("YWJjZA"), "YWJjZA");
        assert_eq!(from_otk("YWJjZA"), "YWJjZA");
    }

    #[test]
    fn round_trips() {
        for sample in ["YWJj==", "YWI=", "YWJjZA", ""] {
            assert_eq!(from_otk(&to_otk(sample)), sample);
        }
    }
}
