//! PromptBuilder (§4.C): deterministic pure functions building the outline,
//! chapter, and conclusion prompts, grounded on subx-cli's
//! `services::ai::prompts::build_analysis_prompt` string-builder pattern.

use crate::domain::model::{ChapterPlan, Mode};

/// Chapter-count and target-length knobs for a [`Mode`] (§4.C mode config).
#[derive(Debug, Clone, Copy)]
pub struct ModeProfile {
    /// Minimum chapter count the outline should aim for.
    pub min_chapters: u32,
    /// Maximum chapter count the outline should aim for.
    pub max_chapters: u32,
    /// Target words per chapter.
    pub target_words_per_chapter: u32,
}

impl ModeProfile {
    /// The profile for a given [`Mode`], per spec §4.C's example bounds.
    pub fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::Deep => Self {
                min_chapters: 6,
                max_chapters: 15,
                target_words_per_chapter: 800,
            },
            Mode::Ultra => Self {
                min_chapters: 12,
                max_chapters: 20,
                target_words_per_chapter: 1200,
            },
        }
    }
}

/// Build the outline-stage prompt (§4.F stage 1).
///
/// Asks for a human-readable outline plus a JSON block enumerating
/// `chapters[]`, so [`crate::domain::outline::OutlineParser`] has a
/// structured source of truth (§9: "stringly-typed outline parsing... is
/// replaced by requiring the LLM to emit a JSON block").
pub fn build_outline_prompt(content: &str, mode: Mode) -> String {
    let profile = ModeProfile::for_mode(mode);
    format!(
        "You are writing a deep-interpretation outline in Chinese for the following source \
content. Produce {min}-{max} chapters, each targeting roughly {words} words.\n\n\
## Source content\n{content}\n\n\
## Output format\n\
First, write a human-readable outline: a Chinese title, an English title, a short \
introduction, and a numbered chapter list.\n\n\
Then append a single fenced ```json code block containing:\n\
{{\n  \"chapters\": [\n    {{\n      \"index\": 1,\n      \"title\": \"...\",\n      \
\"subsections\": [{{\"subtitle\": \"...\", \"key_points\": [\"...\"]}}],\n      \
\"must_include\": [\"...\"],\n      \"must_exclude\": [\"...\"],\n      \
\"opening_hook\": \"...\",\n      \"closing_transition\": \"...\",\n      \
\"rationale\": \"...\",\n      \"content_guidance\": \"...\"\n    }}\n  ]\n}}\n",
        min = profile.min_chapters,
        max = profile.max_chapters,
        words = profile.target_words_per_chapter,
        content = content,
    )
}

/// Context carried across sequential chapter generation, per §4.F stage 2's
/// sequential mode ("chapter N's prompt includes the full text of chapter
/// N-1 and short summaries... of chapters 1..N-2").
pub struct SequentialContext<'a> {
    /// Full text of the immediately preceding chapter.
    pub previous_chapter: &'a str,
    /// Short (roughly 500-character) summaries of chapters before that one.
    pub previous_summaries: &'a [String],
}

/// Build a chapter-stage prompt (§4.F stage 2). `sequential` is `None` in
/// concurrent mode, per §9's resolved open question: concurrent mode never
/// passes prior-chapter summaries.
pub fn build_chapter_prompt(
    full_content: &str,
    full_outline: &str,
    chapter: &ChapterPlan,
    sequential: Option<SequentialContext<'_>>,
) -> String {
    let subsections = chapter
        .subsections
        .iter()
        .map(|s| format!("- {}: {}", s.subtitle, s.key_points.join("; ")))
        .collect::<Vec<_>>()
        .join("\n");

    let mut prompt = format!(
        "Write only the section for chapter {index}, titled exactly \
`### {index}. {title}`. Do not write any other chapter.\n\n\
## Full source content\n{full_content}\n\n\
## Full outline\n{full_outline}\n\n\
## This chapter's guidance\nSubsections:\n{subsections}\n\
Must include: {must_include}\nMust exclude: {must_exclude}\n",
        index = chapter.index,
        title = chapter.title,
        full_content = full_content,
        full_outline = full_outline,
        subsections = subsections,
        must_include = chapter.must_include.join(", "),
        must_exclude = chapter.must_exclude.join(", "),
    );
    if let Some(guidance) = &chapter.content_guidance {
        prompt.push_str(&format!("Content guidance: {guidance}\n"));
    }
    if let Some(ctx) = sequential {
        prompt.push_str(&format!(
            "\n## Previous chapter (for continuity, do not repeat)\n{}\n",
            ctx.previous_chapter
        ));
        if !ctx.previous_summaries.is_empty() {
            prompt.push_str("\n## Summaries of earlier chapters\n");
            for (i, summary) in ctx.previous_summaries.iter().enumerate() {
                prompt.push_str(&format!("{}. {}\n", i + 1, summary));
            }
        }
    }
    prompt
}

/// Build the conclusion-stage prompt (§4.F stage 3).
pub fn build_conclusion_prompt(full_content: &str, all_generated_chapters: &str) -> String {
    format!(
        "Given the source content and the generated chapters below, write exactly two \
named sections, in this order: `### 延伸洞察` (insights extension) and `### 金句摘錄` \
(quotes / original citations).\n\n\
## Source content\n{full_content}\n\n\
## Generated chapters\n{all_generated_chapters}\n"
    )
}

/// Force a chapter's raw LLM output to start with exactly `### N. Title`
/// (§4.F: "insert if missing, replace if wrong"), so the assembler's
/// heading/TOC extraction has a reliable contract to parse against.
pub fn normalize_chapter_heading(raw: &str, index: u32, title: &str) -> String {
    let expected = format!("### {index}. {title}");
    let trimmed = raw.trim_start();
    let mut lines: Vec<&str> = trimmed.lines().collect();
    let is_heading_like = lines
        .first()
        .map(|line| {
            let stripped = line.trim().trim_start_matches('#').trim();
            stripped.split_once('.').is_some()
        })
        .unwrap_or(false);
    if is_heading_like {
        lines.remove(0);
        format!("{expected}\n{}", lines.join("\n").trim_start_matches('\n'))
    } else {
        format!("{expected}\n\n{trimmed}")
    }
}
