//! Per-stage command builders.
//!
//! Builders are the one place that has to match the external tools' CLI
//! syntax exactly. Each is a pure function from typed parameters to shell
//! lines appended onto a caller-supplied list, so stages can be chained into
//! a single batch script. Builders never execute anything.

pub mod fold;
pub mod rm;
pub mod rvm;

/// Normalize an archive name to the required suffix, accepting the bare
/// stem, `.ar`, or `.ar2` forms interchangeably.
pub fn archive_with_suffix(name: &str, suffix: &str) -> String {
    let stem = name
        .strip_suffix(".ar2")
        .or_else(|| name.strip_suffix(".ar"))
        .unwrap_or(name);
    format!("{stem}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_is_normalized_from_any_form() {
        for name in ["x_archive", "x_archive.ar", "x_archive.ar2"] {
            assert_eq!(archive_with_suffix(name, ".ar"), "x_archive.ar");
            assert_eq!(archive_with_suffix(name, ".ar2"), "x_archive.ar2");
        }
    }

    #[test]
    fn unrelated_extensions_are_left_alone() {
        assert_eq!(archive_with_suffix("x.fits", ".ar"), "x.fits.ar");
    }
}
