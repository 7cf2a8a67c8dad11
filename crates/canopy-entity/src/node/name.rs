//! Node name rules and collision-free naming.

use canopy_core::error::AppError;

/// Validate a user-supplied node name and return it trimmed.
pub fn validate_name(name: &str, max_length: usize) -> Result<String, AppError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid_argument("Name cannot be empty"));
    }
    if trimmed.chars().count() > max_length {
        return Err(AppError::invalid_argument(format!(
            "Name exceeds {max_length} characters"
        )));
    }
    if trimmed == "." || trimmed == ".." {
        return Err(AppError::invalid_argument("Name cannot be '.' or '..'"));
    }
    if trimmed
        .chars()
        .any(|c| c == '/' || c == '\\' || c.is_control())
    {
        return Err(AppError::invalid_argument(
            "Name cannot contain slashes or control characters",
        ));
    }
    Ok(trimmed.to_string())
}

/// Split `name` into stem and extension (extension includes the dot).
///
/// A leading dot (dotfiles) or a trailing dot does not start an extension.
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx < name.len() - 1 => name.split_at(idx),
        _ => (name, ""),
    }
}

/// `name` with ` (n)` inserted before the extension.
pub fn numbered_name(name: &str, n: u32) -> String {
    let (stem, ext) = split_extension(name);
    format!("{stem} ({n}){ext}")
}

/// First of `name`, `name (1)`, `name (2)`, ... for which `taken` is false.
pub fn first_free_name(name: &str, mut taken: impl FnMut(&str) -> bool) -> String {
    if !taken(name) {
        return name.to_string();
    }
    let mut n = 1;
    loop {
        let candidate = numbered_name(name, n);
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}
