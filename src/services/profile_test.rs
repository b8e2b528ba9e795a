use super::*;

#[test]
fn display_name_prefers_full_name() {
    assert_eq!(display_name(Some("Casey"), Some("Reyes"), "c@example.com"), "Casey Reyes");
}

#[test]
fn display_name_uses_either_half_alone() {
    assert_eq!(display_name(Some("Casey"), None, "c@example.com"), "Casey");
    assert_eq!(display_name(None, Some("Reyes"), "c@example.com"), "Reyes");
}

#[test]
fn display_name_ignores_blank_halves() {
    assert_eq!(display_name(Some("  "), Some("Reyes"), "c@example.com"), "Reyes");
    assert_eq!(display_name(Some(""), Some(""), "casey@example.com"), "casey");
}

#[test]
fn display_name_falls_back_to_email_local_part() {
    assert_eq!(display_name(None, None, "casey@example.com"), "casey");
    assert_eq!(display_name(None, None, "@example.com"), "user");
}
