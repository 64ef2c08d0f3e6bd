//! Value-format helpers shared by log fields and human-readable dumps.

pub const NONE: &str = "none";

pub fn format_optional(value: Option<&str>) -> &str {
    value.unwrap_or(NONE)
}
