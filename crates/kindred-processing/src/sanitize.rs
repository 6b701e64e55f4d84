//! Filename sanitization for storage keys.

/// Upper bound on a sanitized name, in characters.
pub const MAX_SANITIZED_LEN: usize = 100;

/// Normalize an arbitrary client filename into a safe key fragment.
///
/// Characters outside `[a-zA-Z0-9.-]` become `_`, runs of `.` collapse to a
/// single `.` (so `../` sequences cannot survive) and the result is cut to
/// [`MAX_SANITIZED_LEN`] characters. Never fails; the output may be empty.
pub fn sanitize_file_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len().min(MAX_SANITIZED_LEN));
    let mut previous_dot = false;

    for c in name.chars() {
        let c = if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
            c
        } else {
            '_'
        };

        if c == '.' {
            if previous_dot {
                continue;
            }
            previous_dot = true;
        } else {
            previous_dot = false;
        }

        // Output is ASCII only, so byte length equals character count.
        if out.len() == MAX_SANITIZED_LEN {
            break;
        }
        out.push(c);
    }

    out
}

/// Client filename without directories or its final extension.
///
/// `C:\\Users\\me\\holiday.final.JPG` gives `holiday.final`.
pub fn base_name(name: &str) -> &str {
    let name = name.trim();
    let file = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(name);
    match file.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => file,
    }
}
