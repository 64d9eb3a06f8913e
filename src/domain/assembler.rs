//! ReportAssembler (§4.E): a pure function assembling the outline, chapter
//! bodies, and conclusion into one front-mattered Markdown report. Grounded
//! on `original_source/.../api/routes/ultra_deep.py`'s TOC-rebuild step and
//! the hash registry's filename/hash conventions, with the anchor/slug rule
//! taken directly from spec §4.E rather than that file's numeric
//! `section-N` anchors.

use crate::domain::model::DocumentFrontMatter;

/// Everything [`assemble`] needs to produce a final report body.
pub struct AssemblyInput<'a> {
    /// Front matter to serialize as the YAML block.
    pub front_matter: &'a DocumentFrontMatter,
    /// The report's introduction paragraph.
    pub introduction: &'a str,
    /// Chapter bodies, each starting with `### N. Title` (§4.F's normalized
    /// heading), in order.
    pub chapters: &'a [String],
    /// The conclusion stage's raw output (`### 延伸洞察` / `### 金句摘錄`).
    pub conclusion: &'a str,
}

/// Assemble a complete Markdown report, including a regenerated table of
/// contents whose anchors are a deterministic slug of each chapter title
/// (§4.E: "lowercase; strip punctuation; spaces -> hyphens; preserve CJK
/// characters and word characters").
///
/// # Errors
/// Returns an error only if the front matter fails to serialize as YAML,
/// which does not happen for well-formed [`DocumentFrontMatter`] values.
pub fn assemble(input: &AssemblyInput<'_>) -> crate::Result<String> {
    let yaml = serde_yaml::to_string(input.front_matter)
        .map_err(|e| crate::error::OrchestratorError::config(format!("front matter serialization failed: {e}")))?;

    let chapter_titles: Vec<(u32, String)> = input.chapters.iter().map(|body| chapter_heading(body)).collect();
    let toc = build_toc(&chapter_titles);

    let chapters_with_anchors: Vec<String> = input
        .chapters
        .iter()
        .zip(&chapter_titles)
        .map(|(body, (_, title))| format!("<a id=\"{}\"></a>\n\n{}", slugify(title), body.trim()))
        .collect();

    let mut out = String::new();
    out.push_str("---\n");
    out.push_str(yaml.trim_end());
    out.push_str("\n---\n\n");
    out.push_str(&format!("# {}\n\n", input.front_matter.title_cn));
    if !input.introduction.is_empty() {
        out.push_str("### 引言\n\n");
        out.push_str(input.introduction.trim());
        out.push_str("\n\n");
    }
    out.push_str(&toc);
    out.push('\n');
    out.push_str(&chapters_with_anchors.join("\n\n---\n\n"));
    out.push_str("\n\n---\n\n");
    out.push_str(&conclusion_sections(input.conclusion).join("\n\n"));
    out.push('\n');

    Ok(out)
}

/// Split the conclusion stage's raw output into its two named subsections
/// ("insights extension", "quotes / original citations") by splitting on
/// `\n### ` (§4.E), discarding any preamble before the first heading.
fn conclusion_sections(conclusion: &str) -> Vec<String> {
    let trimmed = conclusion.trim();
    let Some(start) = trimmed.find("### ") else {
        return vec![trimmed.to_string()];
    };
    let body = &trimmed[start..];
    body.split("\n### ")
        .enumerate()
        .map(|(i, part)| {
            let part = part.trim();
            if i == 0 {
                part.to_string()
            } else {
                format!("### {part}")
            }
        })
        .filter(|s| !s.is_empty())
        .collect()
}

/// Extract `(index, title)` from a chapter body's first line, which is
/// expected to read `### N. Title` after §4.F's normalization pass. Falls
/// back to the raw first line if the heading is not in that shape.
fn chapter_heading(body: &str) -> (u32, String) {
    let first_line = body.lines().next().unwrap_or_default();
    let stripped = first_line.trim_start_matches('#').trim();
    match stripped.split_once('.') {
        Some((index_str, title)) => {
            let index = index_str.trim().parse().unwrap_or(0);
            (index, title.trim().to_string())
        }
        None => (0, stripped.to_string()),
    }
}

/// Build the `### 主要目录` block, one `- [N. Title](#slug)` line per chapter.
fn build_toc(chapters: &[(u32, String)]) -> String {
    let mut lines = vec!["### 主要目录\n".to_string()];
    for (index, title) in chapters {
        lines.push(format!("- [{index}. {title}](#{})", slugify(title)));
    }
    lines.push(String::new());
    lines.join("\n")
}

/// The deterministic TOC-anchor slug rule of §4.E: lowercase, strip
/// punctuation, collapse whitespace runs to a single hyphen, and preserve
/// CJK characters alongside ASCII word characters.
pub fn slugify(title: &str) -> String {
    let mut out = String::new();
    let mut pending_hyphen = false;
    for c in title.to_lowercase().chars() {
        if c.is_whitespace() {
            pending_hyphen = !out.is_empty();
            continue;
        }
        if c.is_alphanumeric() || is_cjk(c) {
            if pending_hyphen {
                out.push('-');
                pending_hyphen = false;
            }
            out.push(c);
        }
        // Other punctuation is stripped outright.
    }
    out
}

fn is_cjk(c: char) -> bool {
    matches!(c as u32, 0x4E00..=0x9FFF | 0x3400..=0x4DBF | 0xF900..=0xFAFF)
}

/// Generate the on-disk filename for a document: the English title if
/// present, else the Chinese title, with filesystem-unsafe characters
/// stripped, suffixed with its version (§4.E).
pub fn generate_filename(title_en: Option<&str>, title_cn: &str, version: u32) -> String {
    let source = title_en.unwrap_or(title_cn);
    let sanitized: String = source
        .chars()
        .map(|c| if c.is_whitespace() || "/\\:*?\"<>|".contains(c) { '_' } else { c })
        .collect();
    format!("{}_v{}.md", sanitized, version)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn front_matter() -> DocumentFrontMatter {
        DocumentFrontMatter {
            title_cn: "測試報告".into(),
            title_en: None,
            upload_date: "2026-07-28".into(),
            created_at: "2026-07-28T00:00:00Z".into(),
            chapter_count: 2,
            version: 1,
            hash: "deadbeef".into(),
            video_url: Some("https://youtu.be/abc".into()),
            content_identifier: None,
            is_ultra_deep: None,
            base_version: None,
        }
    }

    #[test]
    fn assembles_toc_with_slug_anchors() {
        let chapters = vec![
            "### 1. 開端\n\n內容一".to_string(),
            "### 2. The Turning Point\n\n內容二".to_string(),
        ];
        let fm = front_matter();
        let input = AssemblyInput {
            front_matter: &fm,
            introduction: "本文導讀。",
            chapters: &chapters,
            conclusion: "### 延伸洞察\n洞察內容\n\n### 金句摘錄\n金句內容",
        };
        let report = assemble(&input).unwrap();
        assert!(report.starts_with("---\n"));
        assert!(report.contains("### 引言"));
        assert!(report.contains("- [1. 開端](#開端)"));
        assert!(report.contains("- [2. The Turning Point](#the-turning-point)"));
        assert!(report.contains("<a id=\"開端\"></a>"));
        assert!(report.contains("延伸洞察"));
        let heading_count = report.matches("### 1.").count() + report.matches("### 2.").count();
        assert_eq!(heading_count, 2);
    }

    #[test]
    fn filename_prefers_english_title_when_present() {
        assert_eq!(generate_filename(Some("A/B: Test Title"), "中文", 2), "A_B__Test_Title_v2.md");
        assert_eq!(generate_filename(None, "測試 標題", 1), "測試_標題_v1.md");
    }

    #[test]
    fn slugify_strips_punctuation_and_preserves_cjk() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("深度解讀：第一章"), "深度解讀第一章");
        assert_eq!(slugify("  leading and trailing  "), "leading-and-trailing");
    }
}
