//! Filesystem-safe names for channels, threads and attachments.

use once_cell::sync::Lazy;
use regex::Regex;

static RESERVED: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[<>:"/\\|?*]"#).unwrap());

/// Replace every character that is reserved on common filesystems with `_`.
///
/// Total and idempotent: any input yields a valid path segment, and
/// sanitizing an already-sanitized name is a no-op.
pub fn sanitize_filename(name: &str) -> String {
    RESERVED.replace_all(name, "_").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replaces_reserved_characters() {
        assert_eq!(sanitize_filename(r#"a<b>c:d"e/f\g|h?i*j"#), "a_b_c_d_e_f_g_h_i_j");
    }

    #[test]
    fn test_plain_names_pass_through() {
        assert_eq!(sanitize_filename("general"), "general");
        assert_eq!(sanitize_filename("日本語チャンネル"), "日本語チャンネル");
        assert_eq!(sanitize_filename(""), "");
    }

    #[test]
    fn test_idempotent() {
        let once = sanitize_filename("rules & faq: read/me");
        assert_eq!(sanitize_filename(&once), once);
    }
}
