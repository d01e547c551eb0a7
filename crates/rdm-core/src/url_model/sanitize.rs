//! Filename sanitization for local filesystems.

const NAME_MAX: usize = 255;

/// Makes a candidate filename safe to create in a single directory.
///
/// Path separators, NUL and control characters become `_`; runs of `_` are
/// collapsed; leading/trailing whitespace, dots and `_` are trimmed; the result is
/// cut to 255 bytes on a char boundary. Interior spaces are kept.
pub fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        let c = if c == '/' || c == '\\' || c.is_control() {
            '_'
        } else {
            c
        };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }

    let trimmed = out.trim_matches(|c: char| c.is_whitespace() || c == '.' || c == '_');
    let mut end = trimmed.len().min(NAME_MAX);
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].to_string()
}
