//! Locators: serving origin + relative storage path.

/// Join an origin (`scheme://host[:port]`) and a relative storage path with
/// exactly one slash between them.
pub fn build_locator(origin: &str, relative_path: &str) -> String {
    format!(
        "{}/{}",
        origin.trim_end_matches('/'),
        relative_path.trim_start_matches('/')
    )
}
