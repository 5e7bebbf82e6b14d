//! Lesson search, filtering, and query suggestions.

use std::collections::HashSet;

use crate::lessons::{Difficulty, Lesson};

const MAX_SUGGESTIONS: usize = 5;

/// Case-insensitive match on title, content, or any tag. A blank query
/// matches everything.
pub fn search_lessons<'a>(lessons: &'a [Lesson], query: &str) -> Vec<&'a Lesson> {
    let query = query.trim();
    if query.is_empty() {
        return lessons.iter().collect();
    }
    let q = query.to_lowercase();
    lessons.iter().filter(|l| matches_query(l, &q)).collect()
}

fn matches_query(lesson: &Lesson, q: &str) -> bool {
    lesson.title.to_lowercase().contains(q)
        || lesson.content.to_lowercase().contains(q)
        || lesson.tags.iter().any(|t| t.to_lowercase().contains(q))
}

/// Combined search / category / difficulty filter. `None` means "all".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LessonFilter {
    pub query: String,
    pub category: Option<String>,
    pub difficulty: Option<Difficulty>,
}

impl LessonFilter {
    pub fn apply<'a>(&self, lessons: &'a [Lesson]) -> Vec<&'a Lesson> {
        let q = self.query.trim().to_lowercase();
        lessons
            .iter()
            .filter(|l| q.is_empty() || matches_query(l, &q))
            .filter(|l| self.category.as_ref().map_or(true, |c| &l.category == c))
            .filter(|l| self.difficulty.map_or(true, |d| l.difficulty == d))
            .collect()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn has_active_filters(&self) -> bool {
        !self.query.trim().is_empty() || self.category.is_some() || self.difficulty.is_some()
    }
}

/// Up to five distinct tags or title words containing `query`.
pub fn suggestions(lessons: &[Lesson], query: &str) -> Vec<String> {
    let query = query.trim();
    if query.is_empty() {
        return Vec::new();
    }
    let q = query.to_lowercase();
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for lesson in lessons {
        let candidates = lesson
            .tags
            .iter()
            .map(String::as_str)
            .chain(lesson.title.split_whitespace());
        for candidate in candidates {
            if candidate.to_lowercase().contains(&q) && seen.insert(candidate.to_string()) {
                out.push(candidate.to_string());
            }
        }
    }
    out.truncate(MAX_SUGGESTIONS);
    out
}
