const WINDOWS_DEVICE_FILES: [&str; 11] = [
    "CON", "AUX", "COM1", "COM2", "COM3", "COM4", "LPT1", "LPT2", "LPT3", "PRN", "NUL",
];

/// Turns an arbitrary identifier into a file name that is safe on every platform.
///
/// Only ASCII letters, digits, `_`, `.` and `-` survive, whitespace runs become
/// a single `_`.
pub fn secure_filename(name: &str) -> String {
    let spaced: String = name
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let mut filename: String = spaced
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect::<String>()
        .trim_matches(|c| c == '.' || c == '_')
        .to_string();

    if cfg!(windows) {
        let stem = filename.split('.').next().unwrap_or_default();
        if !stem.is_empty() && WINDOWS_DEVICE_FILES.contains(&stem.to_ascii_uppercase().as_str()) {
            filename.insert(0, '_');
        }
    }

    if filename.is_empty() {
        filename.push('_');
    }
    filename
}
