//! Lesson loading, parsing, and navigation.
//!
//! Lessons are markdown files fetched by name from a directory or an HTTP
//! base URL. Each `<name>.md` may have a `<name>.yaml` sidecar carrying its
//! category (and optionally its difficulty).

use std::collections::HashSet;
use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::annotate::is_target_script;
use crate::error::{Result, TutorError};
use crate::i18n::Language;

/// Category used when a lesson has no readable sidecar.
pub const DEFAULT_CATEGORY: &str = "三字经";

/// Lesson files loaded when the configuration does not list any.
pub const DEFAULT_LESSON_FILES: &[&str] = &["lesson1.md", "lesson2.md", "lesson3.md"];

const MAX_TAGS: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }

    /// Localised label, e.g. "Beginner" / "初级".
    pub fn label(self, lang: Language) -> &'static str {
        match self {
            Difficulty::Beginner => lang.t("lesson.beginner"),
            Difficulty::Intermediate => lang.t("lesson.intermediate"),
            Difficulty::Advanced => lang.t("lesson.advanced"),
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: String,
    pub title: String,
    pub category: String,
    pub content: String,
    pub difficulty: Difficulty,
    pub tags: Vec<String>,
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LessonCategory {
    pub id: String,
    pub name: String,
    pub description: String,
    pub lessons: Vec<Lesson>,
}

/// Sidecar metadata. Unknown keys are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LessonMeta {
    pub category: Option<String>,
    pub difficulty: Option<Difficulty>,
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Split markdown into its `# ` title and the remaining body.
///
/// Every `# ` line is removed from the body; the first one becomes the title.
pub fn parse_markdown(content: &str) -> (String, String) {
    let mut title = None;
    let mut body = Vec::new();
    for line in content.split('\n') {
        match line.strip_prefix("# ") {
            Some(rest) => {
                if title.is_none() {
                    title = Some(rest.trim_end_matches('\r').to_string());
                }
            }
            None => body.push(line),
        }
    }
    let title = title
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Untitled".to_string());
    (title, body.join("\n").trim().to_string())
}

/// First few distinct target-script characters of the title and body.
pub fn extract_tags(title: &str, body: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    title
        .chars()
        .chain(body.chars())
        .filter(|c| is_target_script(*c))
        .filter(|c| seen.insert(*c))
        .take(MAX_TAGS)
        .map(String::from)
        .collect()
}

/// Lowercase the name and collapse whitespace runs into `-`.
pub fn category_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut in_space = false;
    for c in name.chars() {
        if c.is_whitespace() {
            if !in_space {
                slug.push('-');
            }
            in_space = true;
        } else {
            slug.extend(c.to_lowercase());
            in_space = false;
        }
    }
    slug
}

pub fn category_description(category: &str) -> &'static str {
    match category {
        "基础汉字" => "Learn fundamental Chinese characters and their meanings",
        "三字经" => "Traditional Chinese text for children learning",
        "人体部位" => "Body parts and human anatomy in Chinese",
        "自然元素" => "Natural elements and phenomena",
        _ => "Chinese language learning content",
    }
}

/// Group lessons by category, keeping first-appearance order.
pub fn categorize_lessons(lessons: &[Lesson]) -> Vec<LessonCategory> {
    let mut categories: Vec<LessonCategory> = Vec::new();
    for lesson in lessons {
        match categories.iter_mut().find(|c| c.name == lesson.category) {
            Some(cat) => cat.lessons.push(lesson.clone()),
            None => categories.push(LessonCategory {
                id: category_slug(&lesson.category),
                name: lesson.category.clone(),
                description: category_description(&lesson.category).to_string(),
                lessons: vec![lesson.clone()],
            }),
        }
    }
    categories
}

pub fn parse_meta(yaml: &str) -> Option<LessonMeta> {
    match serde_yaml::from_str::<LessonMeta>(yaml) {
        Ok(meta) => Some(meta),
        Err(e) => {
            warn!(error = %e, "unreadable lesson sidecar");
            None
        }
    }
}

/// Build a lesson from its markdown and optional sidecar.
pub fn build_lesson(filename: &str, markdown: &str, meta: Option<LessonMeta>) -> Lesson {
    let (title, body) = parse_markdown(markdown);
    let meta = meta.unwrap_or_default();
    let tags = extract_tags(&title, &body);
    Lesson {
        id: filename.strip_suffix(".md").unwrap_or(filename).to_string(),
        category: meta
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
        difficulty: meta.difficulty.unwrap_or_default(),
        title,
        content: body,
        tags,
        filename: filename.to_string(),
    }
}

fn sidecar_name(filename: &str) -> String {
    match filename.strip_suffix(".md") {
        Some(stem) => format!("{stem}.yaml"),
        None => format!("{filename}.yaml"),
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Where lesson files come from.
#[derive(Debug, Clone, PartialEq)]
pub enum LessonSource {
    Dir(PathBuf),
    Http { base_url: String },
}

impl LessonSource {
    /// `http://` / `https://` strings are URLs, anything else a directory.
    pub fn parse(s: &str) -> Self {
        if s.starts_with("http://") || s.starts_with("https://") {
            LessonSource::Http {
                base_url: s.trim_end_matches('/').to_string(),
            }
        } else {
            LessonSource::Dir(PathBuf::from(s))
        }
    }
}

pub struct LessonLoader {
    source: LessonSource,
    files: Vec<String>,
    client: reqwest::Client,
}

impl LessonLoader {
    pub fn new(source: LessonSource, files: Vec<String>) -> Self {
        Self {
            source,
            files,
            client: reqwest::Client::new(),
        }
    }

    /// Load every lesson. Any lesson file that cannot be fetched fails the
    /// whole load; missing sidecars only fall back to defaults.
    pub async fn load(&self) -> Result<LessonLibrary> {
        let files = self.resolve_files().await?;
        info!(count = files.len(), source = ?self.source, "loading lessons");

        let mut lessons = Vec::with_capacity(files.len());
        for filename in &files {
            let markdown = self.fetch(filename).await.map_err(|detail| TutorError::LessonLoad {
                filename: filename.clone(),
                detail,
            })?;
            let sidecar = sidecar_name(filename);
            let meta = match self.fetch(&sidecar).await {
                Ok(yaml) => parse_meta(&yaml),
                Err(detail) => {
                    debug!(file = %sidecar, %detail, "no sidecar metadata");
                    None
                }
            };
            lessons.push(build_lesson(filename, &markdown, meta));
        }
        Ok(LessonLibrary::new(lessons))
    }

    async fn resolve_files(&self) -> Result<Vec<String>> {
        if !self.files.is_empty() {
            return Ok(self.files.clone());
        }
        match &self.source {
            LessonSource::Dir(dir) => {
                let unreadable = |e: std::io::Error| TutorError::LessonLoad {
                    filename: dir.display().to_string(),
                    detail: e.to_string(),
                };
                let mut entries = tokio::fs::read_dir(dir).await.map_err(unreadable)?;
                let mut found = Vec::new();
                while let Some(entry) = entries.next_entry().await.map_err(unreadable)? {
                    let name = entry.file_name().to_string_lossy().into_owned();
                    if name.ends_with(".md") {
                        found.push(name);
                    }
                }
                found.sort();
                Ok(found)
            }
            LessonSource::Http { .. } => {
                Ok(DEFAULT_LESSON_FILES.iter().map(|s| s.to_string()).collect())
            }
        }
    }

    async fn fetch(&self, filename: &str) -> std::result::Result<String, String> {
        match &self.source {
            LessonSource::Dir(dir) => tokio::fs::read_to_string(dir.join(filename))
                .await
                .map_err(|e| e.to_string()),
            LessonSource::Http { base_url } => {
                let url = format!("{base_url}/{filename}");
                let resp = self.client.get(&url).send().await.map_err(|e| e.to_string())?;
                if !resp.status().is_success() {
                    return Err(format!("HTTP {} from {url}", resp.status().as_u16()));
                }
                resp.text().await.map_err(|e| e.to_string())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Library navigation
// ---------------------------------------------------------------------------

/// Loaded lessons plus the current selection.
#[derive(Debug, Clone)]
pub struct LessonLibrary {
    lessons: Vec<Lesson>,
    categories: Vec<LessonCategory>,
    current: Option<usize>,
}

impl LessonLibrary {
    /// The first lesson, if any, becomes current.
    pub fn new(lessons: Vec<Lesson>) -> Self {
        let categories = categorize_lessons(&lessons);
        let current = if lessons.is_empty() { None } else { Some(0) };
        Self {
            lessons,
            categories,
            current,
        }
    }

    pub fn lessons(&self) -> &[Lesson] {
        &self.lessons
    }

    pub fn categories(&self) -> &[LessonCategory] {
        &self.categories
    }

    pub fn current(&self) -> Option<&Lesson> {
        self.current.and_then(|i| self.lessons.get(i))
    }

    pub fn get(&self, id: &str) -> Option<&Lesson> {
        self.lessons.iter().find(|l| l.id == id)
    }

    pub fn select(&mut self, id: &str) -> Result<&Lesson> {
        let idx = self
            .lessons
            .iter()
            .position(|l| l.id == id)
            .ok_or_else(|| TutorError::UnknownLesson(id.to_string()))?;
        self.current = Some(idx);
        Ok(&self.lessons[idx])
    }

    pub fn next_lesson(&self) -> Option<&Lesson> {
        self.current.and_then(|i| self.lessons.get(i + 1))
    }

    pub fn previous_lesson(&self) -> Option<&Lesson> {
        self.current
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| self.lessons.get(i))
    }

    /// Move to the next lesson; stays put at the end.
    pub fn navigate_next(&mut self) -> Option<&Lesson> {
        let i = self.current?;
        if i + 1 < self.lessons.len() {
            self.current = Some(i + 1);
            return self.lessons.get(i + 1);
        }
        None
    }

    /// Move to the previous lesson; stays put at the start.
    pub fn navigate_previous(&mut self) -> Option<&Lesson> {
        let i = self.current?.checked_sub(1)?;
        self.current = Some(i);
        self.lessons.get(i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lesson(id: &str, category: &str) -> Lesson {
        build_lesson(
            &format!("{id}.md"),
            &format!("# {id}\n天地人"),
            Some(LessonMeta {
                category: Some(category.to_string()),
                difficulty: None,
            }),
        )
    }

    #[test]
    fn test_parse_markdown_title_and_body() {
        let (title, body) = parse_markdown("# 天地人\n\n天 地 人\n你 我 他\n");
        assert_eq!(title, "天地人");
        assert_eq!(body, "天 地 人\n你 我 他");
    }

    #[test]
    fn test_parse_markdown_untitled() {
        let (title, body) = parse_markdown("no heading here");
        assert_eq!(title, "Untitled");
        assert_eq!(body, "no heading here");
    }

    #[test]
    fn test_parse_markdown_drops_all_h1_lines() {
        let (title, body) = parse_markdown("# First\nbody\n# Second\nmore");
        assert_eq!(title, "First");
        assert_eq!(body, "body\nmore");
    }

    #[test]
    fn test_parse_markdown_keeps_h2() {
        let (_, body) = parse_markdown("# T\n## Sub\ntext");
        assert_eq!(body, "## Sub\ntext");
    }

    #[test]
    fn test_extract_tags_unique_and_limited() {
        let tags = extract_tags("天地人", "天地人你我他她");
        assert_eq!(tags, vec!["天", "地", "人", "你", "我"]);
    }

    #[test]
    fn test_extract_tags_ignores_latin() {
        assert!(extract_tags("Hello", "world 123").is_empty());
    }

    #[test]
    fn test_category_slug() {
        assert_eq!(category_slug("Basic  Characters"), "basic-characters");
        assert_eq!(category_slug("三字经"), "三字经");
    }

    #[test]
    fn test_category_description_fallback() {
        assert_eq!(
            category_description("unknown"),
            "Chinese language learning content"
        );
        assert_eq!(
            category_description("自然元素"),
            "Natural elements and phenomena"
        );
    }

    #[test]
    fn test_categorize_preserves_first_appearance_order() {
        let lessons = vec![
            lesson("a", "自然元素"),
            lesson("b", "三字经"),
            lesson("c", "自然元素"),
        ];
        let cats = categorize_lessons(&lessons);
        assert_eq!(cats.len(), 2);
        assert_eq!(cats[0].name, "自然元素");
        assert_eq!(cats[0].lessons.len(), 2);
        assert_eq!(cats[1].name, "三字经");
    }

    #[test]
    fn test_build_lesson_defaults_without_meta() {
        let l = build_lesson("lesson1.md", "# 天地人\n天地人", None);
        assert_eq!(l.id, "lesson1");
        assert_eq!(l.category, DEFAULT_CATEGORY);
        assert_eq!(l.difficulty, Difficulty::Beginner);
        assert_eq!(l.tags, vec!["天", "地", "人"]);
    }

    #[test]
    fn test_parse_meta_with_difficulty() {
        let meta = parse_meta("category: 自然元素\ndifficulty: advanced\nauthor: x\n").unwrap();
        assert_eq!(meta.category.as_deref(), Some("自然元素"));
        assert_eq!(meta.difficulty, Some(Difficulty::Advanced));
    }

    #[test]
    fn test_sidecar_name() {
        assert_eq!(sidecar_name("lesson1.md"), "lesson1.yaml");
        assert_eq!(sidecar_name("notes"), "notes.yaml");
    }

    #[test]
    fn test_source_parse() {
        assert_eq!(
            LessonSource::parse("http://localhost:5173/lesson/"),
            LessonSource::Http {
                base_url: "http://localhost:5173/lesson".into()
            }
        );
        assert_eq!(
            LessonSource::parse("./lesson"),
            LessonSource::Dir(PathBuf::from("./lesson"))
        );
    }

    #[test]
    fn test_library_navigation() {
        let mut lib = LessonLibrary::new(vec![
            lesson("a", "x"),
            lesson("b", "x"),
            lesson("c", "x"),
        ]);
        assert_eq!(lib.current().unwrap().id, "a");
        assert!(lib.previous_lesson().is_none());
        assert_eq!(lib.navigate_next().unwrap().id, "b");
        assert_eq!(lib.navigate_next().unwrap().id, "c");
        assert!(lib.navigate_next().is_none());
        assert_eq!(lib.current().unwrap().id, "c");
        assert_eq!(lib.navigate_previous().unwrap().id, "b");
        assert_eq!(lib.previous_lesson().unwrap().id, "a");
        assert_eq!(lib.next_lesson().unwrap().id, "c");
    }

    #[test]
    fn test_library_select_unknown() {
        let mut lib = LessonLibrary::new(vec![lesson("a", "x")]);
        assert!(matches!(lib.select("zzz"), Err(TutorError::UnknownLesson(_))));
        assert_eq!(lib.current().unwrap().id, "a");
    }

    #[test]
    fn test_empty_library_has_no_current() {
        let mut lib = LessonLibrary::new(Vec::new());
        assert!(lib.current().is_none());
        assert!(lib.navigate_next().is_none());
        assert!(lib.navigate_previous().is_none());
    }

    #[test]
    fn test_difficulty_label() {
        assert_eq!(Difficulty::Advanced.label(Language::En), "Advanced");
        assert_eq!(Difficulty::Beginner.label(Language::Zh), "初级");
    }
}
