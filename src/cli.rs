use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use colored::*;

use crate::annotate::PinyinStyle;
use crate::config::TutorConfig;
use crate::i18n::Language;
use crate::lessons::{Difficulty, Lesson, LessonCategory, LessonLibrary};

#[derive(Parser, Debug)]
#[command(name = "pinyin-tutor")]
#[command(version)]
#[command(about = "Chinese lesson browser with pinyin annotation, word lookup, and a streaming learning assistant")]
pub struct Args {
    /// Config file (defaults to <config dir>/pinyin-tutor/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Backend host for the chat socket and /query
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Backend port
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Lesson directory or http(s) base URL
    #[arg(long, global = true)]
    pub lessons: Option<String>,

    /// Display language for this run (does not change the stored preference)
    #[arg(long, value_enum, global = true)]
    pub lang: Option<Language>,

    /// Preference file (defaults to <config dir>/pinyin-tutor/prefs.json)
    #[arg(long, global = true)]
    pub prefs: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// List lessons grouped by category
    Lessons,
    /// Show a lesson with pinyin annotation
    Show {
        /// Lesson id (defaults to the first lesson)
        id: Option<String>,
        /// Hide the pinyin row
        #[arg(long)]
        no_pinyin: bool,
    },
    /// Search lessons by text, category, and difficulty
    Search {
        #[arg(default_value = "")]
        query: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long, value_enum)]
        difficulty: Option<Difficulty>,
    },
    /// Print the pinyin of some text
    Pinyin {
        text: String,
        #[arg(long, value_enum, default_value = "tone")]
        style: PinyinStyle,
        /// Print readings above characters instead of a flat line
        #[arg(long)]
        annotate: bool,
    },
    /// Look up a word's definition
    Define {
        word: String,
        #[arg(long, value_enum)]
        difficulty: Option<Difficulty>,
        /// Speak the pronunciation after lookup
        #[arg(long)]
        speak: bool,
    },
    /// Interactive study session with the learning assistant
    Chat {
        /// Lesson to study (defaults to the first lesson)
        #[arg(long)]
        lesson: Option<String>,
        /// Chat without lesson context
        #[arg(long)]
        no_lesson: bool,
    },
    /// Show, set, or toggle the stored display language
    Lang {
        #[arg(value_enum)]
        set: Option<Language>,
        #[arg(long)]
        toggle: bool,
        /// Forget the stored language and fall back to the default
        #[arg(long, conflicts_with_all = ["set", "toggle"])]
        reset: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Args {
    /// Fold CLI overrides into `config`.
    pub fn apply_to(&self, config: &mut TutorConfig) {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(src) = &self.lessons {
            config.lesson_source = src.clone();
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering helpers
// ---------------------------------------------------------------------------

pub fn render_categories(categories: &[LessonCategory], current: Option<&str>, lang: Language) -> String {
    if categories.is_empty() {
        return format!("{}\n", lang.t("lesson.noLessons"));
    }
    let mut out = format!("{}\n", lang.t("lesson.title").bright_cyan().bold());
    for cat in categories {
        out.push_str(&format!(
            "\n{} {}\n",
            lang.t(&cat.name).bright_yellow(),
            format!("({})", cat.description).dimmed()
        ));
        for lesson in &cat.lessons {
            out.push_str(&lesson_row(lesson, current == Some(lesson.id.as_str()), lang));
        }
    }
    out
}

pub fn lesson_row(lesson: &Lesson, is_current: bool, lang: Language) -> String {
    let marker = if is_current { "▶" } else { " " };
    format!(
        "{} {:<10} {}  {}\n",
        marker.bright_green(),
        lesson.id,
        lesson.title.bright_white(),
        format!("[{}]", lesson.difficulty.label(lang)).dimmed()
    )
}

/// Header, annotated body, tags, and navigation hints for the current lesson.
pub fn render_lesson(library: &LessonLibrary, lesson: &Lesson, body: &str, lang: Language) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{}  {}\n\n",
        lesson.title.bright_white().bold(),
        lang.t(&lesson.category).dimmed()
    ));
    out.push_str(body);
    out.push_str("\n\n");
    out.push_str(&format!(
        "{} {}\n",
        lang.t("lesson.tags").bright_yellow(),
        lesson.tags.join(" ")
    ));
    out.push_str(&format!(
        "{} {}\n",
        lang.t("lesson.difficulty").bright_yellow(),
        lesson.difficulty.label(lang)
    ));

    let prev = library
        .previous_lesson()
        .map(|l| format!("← {} ({})", lang.t("lesson.previous"), l.id))
        .unwrap_or_default();
    let next = library
        .next_lesson()
        .map(|l| format!("{} ({}) →", lang.t("lesson.next"), l.id))
        .unwrap_or_default();
    if !prev.is_empty() || !next.is_empty() {
        out.push_str(&format!("\n{}   {}\n", prev.dimmed(), next.dimmed()));
    }
    out
}

pub fn print_banner(lang: Language, lesson: Option<&Lesson>) {
    println!("{}", lang.t("lesson.assistant").bright_cyan().bold());
    match lesson {
        Some(l) => println!("{}{}", lang.t("lesson.studying").bright_yellow(), l.title),
        None => println!("{}", lang.t("lesson.selectLesson").bright_yellow()),
    }
    println!("{}", lang.t("lesson.askAnything").dimmed());
    println!("{}", "=".repeat(50).bright_blue());
}

pub const REPL_HELP: &str = "\
:next / :prev          move between lessons
:lesson <id>           switch lesson
:show                  show the current lesson
:pinyin                toggle the pinyin row
:define <word>         look up a word
:speak [def|ex <n>]    play pronunciation, definition, or example n
:cancel                abandon the reply being streamed
:suggest               list suggested questions
:s <n>                 ask suggested question n
:lang                  toggle display language
:reload                reload lessons
:help                  this help
:quit                  leave";
