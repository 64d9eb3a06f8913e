//! OutlineParser (§4.D): turns the outline stage's raw LLM text into an
//! [`OutlinePlan`]. Grounded on the original implementation's
//! `_extract_chapter_metadata` (JSON-block extraction with a brace-scan
//! fallback) combined with its Markdown `parse_outline` title/chapter-list
//! fallback, generalized into typed chapter plans instead of raw strings.

use crate::domain::model::{ChapterPlan, OutlinePlan, Subsection};
use crate::error::OrchestratorError;
use crate::Result;
use regex::Regex;
use serde::Deserialize;

/// Parse the outline stage's full LLM output into an [`OutlinePlan`].
///
/// # Errors
/// Returns [`OrchestratorError::OutlineParse`] if no title can be found, or
/// if the extracted chapter list is empty.
pub fn parse_outline(raw: &str) -> Result<OutlinePlan> {
    let title_cn = extract_markdown_title(raw)
        .ok_or_else(|| OrchestratorError::outline_parse("no top-level Markdown title found"))?;
    let introduction = extract_introduction(raw);
    let content_type = extract_content_type_info(raw);

    let chapters = match extract_json_block(raw) {
        Some(json_str) => parse_chapters_json(&json_str)?,
        None => parse_chapters_markdown_fallback(raw),
    };

    if chapters.is_empty() {
        return Err(OrchestratorError::outline_parse(
            "no chapters found in outline (neither JSON block nor numbered list)",
        ));
    }

    Ok(OutlinePlan {
        title_cn,
        title_en: extract_title_en(raw),
        introduction,
        content_type,
        chapters,
        total_estimated_words: None,
    })
}

fn extract_markdown_title(raw: &str) -> Option<String> {
    let re = Regex::new(r"(?m)^#\s+(.+)$").unwrap();
    re.captures(raw).map(|c| c[1].trim().to_string())
}

/// A second-line English title, e.g. `## Title (EN)`, is optional and best-effort.
fn extract_title_en(raw: &str) -> Option<String> {
    let re = Regex::new(r"(?m)^##\s*(?:Title|English Title)\s*:?\s*(.+)$").unwrap();
    re.captures(raw).map(|c| c[1].trim().to_string())
}

fn extract_introduction(raw: &str) -> Option<String> {
    let re = Regex::new(r"(?m)^(?:##\s*)?(?:Introduction|简介|引言)\s*:?\s*\n+([\s\S]+?)(?:\n#|\n```|\z)").unwrap();
    re.captures(raw).map(|c| c[1].trim().to_string())
}

fn extract_content_type_info(raw: &str) -> Option<String> {
    let re = Regex::new(r"(?mi)^content[_ ]type\s*:?\s*(.+)$").unwrap();
    re.captures(raw).map(|c| c[1].trim().to_string())
}

/// Extract a fenced ```json block first; fall back to a brace-scan for an
/// object literally containing `"chapters"`, mirroring the two-step regex
/// the original implementation uses before giving up.
fn extract_json_block(raw: &str) -> Option<String> {
    let fenced = Regex::new(r"(?s)```json\s*(.*?)```").unwrap();
    if let Some(c) = fenced.captures(raw) {
        return Some(c[1].trim().to_string());
    }
    let bare = Regex::new(r#"(?s)\{.*"chapters".*\}"#).unwrap();
    bare.find(raw).map(|m| m.as_str().trim().to_string())
}

#[derive(Deserialize)]
struct RawOutlineJson {
    #[serde(default)]
    chapters: Vec<RawChapter>,
    #[serde(default)]
    total_estimated_words: Option<u32>,
}

#[derive(Deserialize, Default)]
struct RawChapter {
    #[serde(default)]
    index: u32,
    #[serde(default)]
    title: String,
    #[serde(default)]
    subsections: Vec<RawSubsection>,
    #[serde(default)]
    must_include: Vec<String>,
    #[serde(default)]
    must_exclude: Vec<String>,
    #[serde(default)]
    opening_hook: Option<String>,
    #[serde(default)]
    closing_transition: Option<String>,
    #[serde(default)]
    prev_chapter_link: Option<String>,
    #[serde(default)]
    next_chapter_link: Option<String>,
    #[serde(default)]
    rationale: Option<String>,
    #[serde(default)]
    content_guidance: Option<String>,
}

#[derive(Deserialize, Default)]
struct RawSubsection {
    #[serde(default)]
    subtitle: String,
    #[serde(default)]
    key_points: Vec<String>,
}

fn parse_chapters_json(json_str: &str) -> Result<Vec<ChapterPlan>> {
    let parsed: RawOutlineJson = serde_json::from_str(json_str)
        .map_err(|e| OrchestratorError::outline_parse(format!("malformed outline JSON: {e}")))?;

    let chapters = parsed
        .chapters
        .into_iter()
        .filter(|c| c.index > 0)
        .map(|c| ChapterPlan {
            index: c.index,
            title: c.title,
            subsections: c
                .subsections
                .into_iter()
                .map(|s| Subsection {
                    subtitle: s.subtitle,
                    key_points: s.key_points,
                })
                .collect(),
            must_include: c.must_include,
            must_exclude: c.must_exclude,
            opening_hook: c.opening_hook,
            closing_transition: c.closing_transition,
            prev_chapter_link: c.prev_chapter_link,
            next_chapter_link: c.next_chapter_link,
            rationale: c.rationale,
            content_guidance: c.content_guidance,
        })
        .collect();
    Ok(chapters)
}

/// Last-resort fallback when no JSON block could be extracted: a numbered
/// Markdown list (`1. Title`, `2. Title`, ...), mirroring the original's
/// `parse_outline`. Brackets around titles are stripped as a safety measure.
fn parse_chapters_markdown_fallback(raw: &str) -> Vec<ChapterPlan> {
    let re = Regex::new(r"(?m)^\d+\.\s*(.+)$").unwrap();
    re.captures_iter(raw)
        .enumerate()
        .map(|(i, c)| ChapterPlan {
            index: (i + 1) as u32,
            title: c[1].replace(['[', ']'], "").trim().to_string(),
            ..Default::default()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const JSON_OUTLINE: &str = r#"# 深度解讀：測試標題

## Introduction
這是一段簡介內容。

1. [第一章]
2. [第二章]

```json
{
  "chapters": [
    {"index": 1, "title": "第一章", "must_include": ["a"], "subsections": [{"subtitle": "s1", "key_points": ["p1"]}]},
    {"index": 2, "title": "第二章", "must_exclude": ["b"]}
  ],
  "total_estimated_words": 4000
}
```
"#;

    #[test]
    fn parses_json_block_when_present() {
        let plan = parse_outline(JSON_OUTLINE).unwrap();
        assert_eq!(plan.title_cn, "深度解讀：測試標題");
        assert_eq!(plan.chapter_count(), 2);
        assert_eq!(plan.chapters[0].must_include, vec!["a".to_string()]);
        assert_eq!(plan.introduction.as_deref(), Some("這是一段簡介內容。"));
    }

    #[test]
    fn falls_back_to_numbered_markdown_list() {
        let raw = "# 標題\n\n1. [第一章]\n2. [第二章]\n3. 第三章\n";
        let plan = parse_outline(raw).unwrap();
        assert_eq!(plan.chapter_count(), 3);
        assert_eq!(plan.chapters[0].title, "第一章");
        assert_eq!(plan.chapters[2].title, "第三章");
    }

    #[test]
    fn errors_when_no_title_found() {
        let result = parse_outline("1. chapter one\n2. chapter two\n");
        assert!(result.is_err());
    }

    #[test]
    fn errors_when_no_chapters_found() {
        let result = parse_outline("# Only A Title\n\nNo chapters here.\n");
        assert!(result.is_err());
    }

    #[test]
    fn malformed_json_block_surfaces_outline_parse_error() {
        let raw = "# Title\n\n1. chapter\n\n```json\n{not valid json\n```\n";
        let result = parse_outline(raw);
        assert!(matches!(result, Err(OrchestratorError::OutlineParse(_))));
    }
}
