//! Centralized name handling for source and destination files.
//!
//! Every stage that turns a name into something else goes through here:
//!
//! - **Slugs**: destination filenames and heading ids use [`slugify`].
//! - **Stems**: the hole plugger compares files by [`normalize_stem`], so
//!   `README.md`, `readme.markdown` and `Readme.MD` all count as a readme.
//! - **HTML names**: [`html_filename`] maps a source filename onto its
//!   default output name.
//!
//! ## Slug rules
//!
//! - `"My File Name!"` → `"my-file-name"`
//! - `"Café"` → `"cafe"` (accents transliterated)
//! - `"  spaced  out  "` → `"spaced-out"`
//! - `"snake_case"` → `"snake_case"` (underscores are word characters)
//!
//! Applying [`slugify`] to its own output returns the same string.

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s-]").unwrap());
static SEPARATOR_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[-\s]+").unwrap());

/// Stem used when a filename slugs down to nothing (e.g. `!!!.md`).
pub const FALLBACK_STEM: &str = "untitled";

/// Convert text into a URL- and filename-safe slug.
///
/// Accents are transliterated to ASCII, anything that is not a word
/// character, whitespace or hyphen is dropped, the result is trimmed and
/// lower-cased, and runs of whitespace/hyphens collapse to one hyphen.
pub fn slugify(value: &str) -> String {
    let ascii = deunicode::deunicode(value);
    let stripped = NON_WORD.replace_all(&ascii, "");
    let lowered = stripped.trim().to_lowercase();
    SEPARATOR_RUN
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

/// Lower-cased file stem, used to recognise conventional files.
///
/// - `"README.md"` → `"readme"`
/// - `"Index.MD"` → `"index"`
/// - `"notes"` → `"notes"`
pub fn normalize_stem(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Default destination filename for a source file name: slugged stem plus `.html`.
pub fn html_filename(source_name: &str) -> String {
    let stem = Path::new(source_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let slug = slugify(&stem);
    if slug.is_empty() {
        format!("{FALLBACK_STEM}.html")
    } else {
        format!("{slug}.html")
    }
}

/// Raw file stem used as the last-resort document title.
pub fn display_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_strips_punctuation_and_joins_words() {
        assert_eq!(slugify("My File Name!"), "my-file-name");
    }

    #[test]
    fn slug_strips_accents() {
        assert_eq!(slugify("Café"), "cafe");
        assert_eq!(slugify("Crème Brûlée"), "creme-brulee");
    }

    #[test]
    fn slug_is_idempotent() {
        for input in ["My File Name!", "Café", "a -- b", "  x  y  ", "snake_case"] {
            let once = slugify(input);
            assert_eq!(slugify(&once), once, "input: {input:?}");
        }
    }

    #[test]
    fn slug_collapses_separator_runs() {
        assert_eq!(slugify("a -- b"), "a-b");
        assert_eq!(slugify("  spaced  out  "), "spaced-out");
    }

    #[test]
    fn slug_keeps_underscores() {
        assert_eq!(slugify("snake_case"), "snake_case");
    }

    #[test]
    fn slug_of_symbols_is_empty() {
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn stem_is_case_and_extension_normalized() {
        assert_eq!(normalize_stem("README.md"), "readme");
        assert_eq!(normalize_stem("Index.MD"), "index");
        assert_eq!(normalize_stem("notes"), "notes");
    }

    #[test]
    fn html_filename_slugs_the_stem() {
        assert_eq!(html_filename("My File Name.md"), "my-file-name.html");
        assert_eq!(html_filename("getting-started.md"), "getting-started.html");
    }

    #[test]
    fn html_filename_falls_back_for_empty_slug() {
        assert_eq!(html_filename("!!!.md"), "untitled.html");
    }

    #[test]
    fn display_stem_keeps_original_casing() {
        assert_eq!(display_stem(Path::new("docs/My Notes.md")), "My Notes");
    }
}
