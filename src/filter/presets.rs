//! Named filters usable anywhere a filter is accepted

use super::structured::StructuredFilter;

const PRESETS: &[(&str, &str)] = &[
    ("all", r#"{"op": "and", "conditions": []}"#),
    ("large_files", r#"{"field": "size", "op": ">", "value": "100M"}"#),
    ("small_files", r#"{"field": "size", "op": "<", "value": "1K"}"#),
    ("today", r#"{"field": "date", "op": "=", "value": "today"}"#),
    ("this_week", r#"{"field": "date", "op": ">=", "value": "mo"}"#),
    (
        "images",
        r#"{"field": "ext", "op": "in", "value": ["jpg", "jpeg", "png", "gif", "webp", "bmp", "svg"]}"#,
    ),
    (
        "videos",
        r#"{"field": "ext", "op": "in", "value": ["mp4", "mkv", "avi", "mov", "wmv", "flv", "webm"]}"#,
    ),
    (
        "archives",
        r#"{"field": "ext", "op": "in", "value": ["zip", "rar", "7z", "tar", "gz", "bz2", "xz"]}"#,
    ),
    (
        "documents",
        r#"{"field": "ext", "op": "in", "value": ["pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "txt", "md"]}"#,
    ),
    (
        "code",
        r#"{"field": "ext", "op": "in", "value": ["py", "js", "ts", "java", "c", "cpp", "h", "go", "rs", "rb"]}"#,
    ),
    ("in_archive", r#"{"field": "archive", "op": "!=", "value": ""}"#),
    ("directories", r#"{"field": "type", "op": "=", "value": "dir"}"#),
    ("files_only", r#"{"field": "type", "op": "=", "value": "file"}"#),
];

/// Preset names in display order
#[must_use]
pub fn names() -> Vec<&'static str> {
    PRESETS.iter().map(|(name, _)| *name).collect()
}

/// The JSON source of a preset, matched case-insensitively
#[must_use]
pub fn source(name: &str) -> Option<&'static str> {
    PRESETS
        .iter()
        .find(|(preset, _)| preset.eq_ignore_ascii_case(name.trim()))
        .map(|(_, json)| *json)
}

/// Look up a preset by name
#[must_use]
pub fn get(name: &str) -> Option<StructuredFilter> {
    source(name).and_then(|json| StructuredFilter::from_json(json).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_presets_parse() {
        for name in names() {
            let json = source(name).unwrap();
            assert!(StructuredFilter::from_json(json).is_ok(), "{name}");
        }
    }

    #[test]
    fn test_get_case_insensitive() {
        assert!(get("Images").is_some());
        assert!(get(" large_files ").is_some());
        assert!(get("nope").is_none());
    }

    #[test]
    fn test_preset_text() {
        assert_eq!(get("large_files").unwrap().to_string(), "size > 104857600");
        assert_eq!(get("today").unwrap().to_string(), "date = today");
        assert_eq!(get("in_archive").unwrap().to_string(), "archive != ''");
        assert_eq!(get("all").unwrap().to_string(), "true");
    }

    #[test]
    fn test_names_order() {
        let all = names();
        assert_eq!(all.first(), Some(&"all"));
        assert_eq!(all.len(), 13);
    }
}
