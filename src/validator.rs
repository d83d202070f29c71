//! 扩展名校验：把文件名映射到允许的存储分类。

use crate::config::Category;
use crate::error::ApiError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionMatch {
    pub category: String,
    pub extension: String,
}

/// Maps `filename` to the first category (in declared order) that allows its
/// lowercased extension. Names without a `.` have an empty extension and
/// never match.
pub fn validate_extension(
    filename: &str,
    categories: &[Category],
) -> Result<ExtensionMatch, ApiError> {
    let extension = extension_of(filename);
    if !extension.is_empty()
        && let Some(category) = categories
            .iter()
            .find(|category| category.allows(&extension))
    {
        return Ok(ExtensionMatch {
            category: category.name.clone(),
            extension,
        });
    }
    Err(ApiError::UnsupportedExtension(extension))
}

fn extension_of(filename: &str) -> String {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categories() -> Vec<Category> {
        vec![
            Category::new("png", ["png"]),
            Category::new("video", ["mp4"]),
            Category::new("docs", ["txt", "md"]),
        ]
    }

    #[test]
    fn matches_case_insensitively() {
        let matched = validate_extension("Holiday.MP4", &categories()).expect("allowed");
        assert_eq!(matched.category, "video");
        assert_eq!(matched.extension, "mp4");
    }

    #[test]
    fn uses_last_dot() {
        let matched = validate_extension("archive.png.txt", &categories()).expect("allowed");
        assert_eq!(matched.category, "docs");
    }

    #[test]
    fn rejects_unknown_and_missing_extensions() {
        let err = validate_extension("evil.exe", &categories()).unwrap_err();
        assert!(matches!(err, ApiError::UnsupportedExtension(ref ext) if ext == "exe"));
        assert!(err.to_string().contains("not allowed"));

        let err = validate_extension("README", &categories()).unwrap_err();
        assert!(matches!(err, ApiError::UnsupportedExtension(ref ext) if ext.is_empty()));

        let err = validate_extension("trailing.", &categories()).unwrap_err();
        assert!(matches!(err, ApiError::UnsupportedExtension(_)));
    }

    #[test]
    fn empty_config_allows_nothing() {
        assert!(validate_extension("test.png", &[]).is_err());
    }

    #[test]
    fn overlapping_extensions_first_declared_wins() {
        let overlapping = vec![
            Category::new("images", ["png", "jpg"]),
            Category::new("png", ["png"]),
        ];
        let matched = validate_extension("a.png", &overlapping).expect("allowed");
        assert_eq!(matched.category, "images");
        assert_eq!(validate_extension("a.png", &overlapping).unwrap(), matched);
    }
}
