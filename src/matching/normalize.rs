/// Canonical comparison form of a title: lower-case ASCII letters and digits
/// only.
///
/// `"Spider-Man: No Way Home"` and `"spider man no way home"` both become
/// `"spidermannowayhome"`. Accented letters are dropped rather than folded.
#[must_use]
pub fn normalize(title: &str) -> String {
    title
        .chars()
        .flat_map(char::to_lowercase)
        .filter(char::is_ascii_alphanumeric)
        .collect()
}
