use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::{CommandFactory, Parser};
use colored::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pinyin_tutor::annotate::{char_pinyin, text_pinyin, PinyinView};
use pinyin_tutor::chat::{contextual_message, suggestions, ChatClient, TurnHandle};
use pinyin_tutor::cli::{self, Args, Command};
use pinyin_tutor::config::TutorConfig;
use pinyin_tutor::definition::{DefinitionClient, WordPopup};
use pinyin_tutor::error::{ChatError, TutorError};
use pinyin_tutor::i18n::Language;
use pinyin_tutor::lessons::{Difficulty, LessonLibrary, LessonLoader};
use pinyin_tutor::prefs::{PreferenceStore, LANGUAGE_KEY};
use pinyin_tutor::search::{self, LessonFilter};
use pinyin_tutor::speech::{CommandSpeechEngine, SpeechCategory, SpeechController, Utterance};
use pinyin_tutor::transcript::{FragmentOutcome, Transcript};

fn load_config(args: &Args) -> Result<TutorConfig, TutorError> {
    let mut config = match args.config.clone().or_else(TutorConfig::default_path) {
        Some(path) => TutorConfig::load(&path)?,
        None => TutorConfig::default(),
    };
    config.apply_env();
    args.apply_to(&mut config);
    config.validate()?;
    Ok(config)
}

/// Load all lessons, printing the page-level error state on failure.
async fn load_library(config: &TutorConfig, lang: Language) -> Result<LessonLibrary, TutorError> {
    eprintln!("{}", lang.t("lesson.loadingLessons").dimmed());
    let loader = LessonLoader::new(config.lesson_source(), config.lesson_files.clone());
    loader.load().await.map_err(|e| {
        eprintln!("{}", lang.t("lesson.loadingFailed").bright_red().bold());
        eprintln!("{}", e.to_string().red());
        eprintln!("{}", format!("[{}]", lang.t("error.reload")).dimmed());
        e
    })
}

fn print_popup(popup: &WordPopup, lang: Language) {
    print!("{}", popup.render(lang));
    let _ = io::stdout().flush();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    if let Some(Command::Completions { shell }) = &args.command {
        clap_complete::generate(*shell, &mut Args::command(), "pinyin-tutor", &mut io::stdout());
        return Ok(());
    }

    let config = load_config(&args)?;
    let prefs_path = args
        .prefs
        .clone()
        .or_else(PreferenceStore::default_path)
        .unwrap_or_else(|| PathBuf::from("prefs.json"));
    let mut prefs = PreferenceStore::open(prefs_path);
    let lang = args.lang.unwrap_or_else(|| prefs.language());

    let command = args.command.clone().unwrap_or(Command::Chat {
        lesson: None,
        no_lesson: false,
    });

    match command {
        Command::Lessons => {
            let library = load_library(&config, lang).await?;
            let current = library.current().map(|l| l.id.clone());
            print!("{}", cli::render_categories(library.categories(), current.as_deref(), lang));
        }
        Command::Show { id, no_pinyin } => {
            let mut library = load_library(&config, lang).await?;
            if let Some(id) = id {
                library.select(&id)?;
            }
            let Some(lesson) = library.current() else {
                println!("{}", lang.t("lesson.selectStart"));
                return Ok(());
            };
            let view = PinyinView { show_pinyin: !no_pinyin };
            print!("{}", cli::render_lesson(&library, lesson, &view.render(&lesson.content), lang));
        }
        Command::Search { query, category, difficulty } => {
            let library = load_library(&config, lang).await?;
            let filter = LessonFilter { query, category, difficulty };
            let hits = filter.apply(library.lessons());
            if hits.is_empty() {
                println!("{}", lang.t("lesson.noResults").bright_yellow());
                println!("{}", lang.t("lesson.tryDifferent").dimmed());
            }
            for lesson in hits {
                print!("{}", cli::lesson_row(lesson, false, lang));
            }
            let hints = search::suggestions(library.lessons(), &filter.query);
            if !hints.is_empty() {
                println!("\n{} {}", lang.t("lesson.suggestions").bright_yellow(), hints.join("  "));
            }
        }
        Command::Pinyin { text, style, annotate } => {
            if annotate {
                println!("{}", PinyinView::default().render(&text));
            } else {
                println!("{}", text_pinyin(&text, style));
            }
        }
        Command::Define { word, difficulty, speak } => {
            let client = DefinitionClient::new(&config.http_base(), config.lookup_policy());
            let reading = word.chars().filter_map(char_pinyin).collect::<Vec<_>>().join(" ");
            let mut popup = WordPopup::loading(&word, &reading);
            eprintln!("{}", lang.t("common.loading").dimmed());
            popup.resolve(client.lookup(&word, lang, difficulty.unwrap_or(config.difficulty)).await);
            print_popup(&popup, lang);

            if speak {
                let mut speech = SpeechController::new(CommandSpeechEngine::new(config.tts_command.clone()));
                if speech.play(SpeechCategory::Pronunciation, &Utterance::pronunciation(&word)) {
                    for _ in 0..100 {
                        speech.poll();
                        if speech.active().is_none() {
                            break;
                        }
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                    speech.stop();
                }
            }
        }
        Command::Lang { set, toggle, reset } => {
            let next = if reset {
                prefs.remove(LANGUAGE_KEY)?;
                prefs.language()
            } else if toggle {
                prefs.toggle_language()?
            } else if let Some(l) = set {
                prefs.set_language(l)?;
                l
            } else {
                prefs.language()
            };
            println!("{next}");
        }
        Command::Chat { lesson, no_lesson } => {
            let mut session = Session::start(config, prefs, lang, lesson, no_lesson).await;
            session.run().await?;
        }
        Command::Completions { .. } => {}
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Interactive session
// ---------------------------------------------------------------------------

enum Event {
    Line(io::Result<Option<String>>),
    Fragment(Option<String>),
    Tick,
}

/// Next fragment of the active turn; never resolves when there is none.
async fn next_fragment(active: &mut Option<TurnHandle>) -> Option<String> {
    match active {
        Some(handle) => handle.next_fragment().await,
        None => std::future::pending().await,
    }
}

struct Session {
    config: TutorConfig,
    prefs: PreferenceStore,
    lang: Language,
    library: LessonLibrary,
    with_lesson: bool,
    view: PinyinView,
    client: Option<ChatClient>,
    transcript: Transcript,
    active: Option<TurnHandle>,
    definitions: DefinitionClient,
    speech: SpeechController<CommandSpeechEngine>,
    popup: Option<WordPopup>,
}

impl Session {
    async fn start(
        config: TutorConfig,
        prefs: PreferenceStore,
        lang: Language,
        lesson: Option<String>,
        no_lesson: bool,
    ) -> Self {
        let mut library = load_library(&config, lang)
            .await
            .unwrap_or_else(|_| LessonLibrary::new(Vec::new()));
        if let Some(id) = lesson {
            if let Err(e) = library.select(&id) {
                eprintln!("{}", e.to_string().red());
            }
        }

        let url = config.ws_url();
        let client = match ChatClient::connect(&url).await {
            Ok(c) => Some(c),
            Err(e) => {
                warn!(%url, error = %e, "chat unavailable");
                eprintln!("{}", format!("chat unavailable: {e}").red());
                None
            }
        };

        Self {
            definitions: DefinitionClient::new(&config.http_base(), config.lookup_policy()),
            speech: SpeechController::new(CommandSpeechEngine::new(config.tts_command.clone())),
            config,
            prefs,
            lang,
            library,
            with_lesson: !no_lesson,
            view: PinyinView::default(),
            client,
            transcript: Transcript::new(),
            active: None,
            popup: None,
        }
    }

    fn current_lesson(&self) -> Option<&pinyin_tutor::Lesson> {
        if self.with_lesson {
            self.library.current()
        } else {
            None
        }
    }

    async fn run(&mut self) -> Result<(), TutorError> {
        cli::print_banner(self.lang, self.current_lesson());
        self.print_suggestions();

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut tick = tokio::time::interval(Duration::from_millis(200));

        loop {
            let event = tokio::select! {
                line = lines.next_line() => Event::Line(line),
                fragment = next_fragment(&mut self.active) => Event::Fragment(fragment),
                _ = tick.tick() => Event::Tick,
            };
            match event {
                Event::Line(line) => match line? {
                    Some(line) => {
                        if !self.handle_line(line.trim()).await {
                            break;
                        }
                    }
                    None => break,
                },
                Event::Fragment(fragment) => self.on_fragment(fragment),
                Event::Tick => self.speech.poll(),
            }
        }

        self.speech.stop();
        if let Some(client) = self.client.take() {
            client.close().await;
        }
        Ok(())
    }

    fn on_fragment(&mut self, fragment: Option<String>) {
        let Some(turn) = self.active.as_ref().map(|h| h.turn().to_string()) else {
            return;
        };
        let Some(fragment) = fragment else {
            self.transcript.close_turn(&turn);
            self.active = None;
            println!();
            warn!(%turn, "reply ended without end marker");
            return;
        };
        match self.transcript.apply_fragment(&turn, &fragment) {
            FragmentOutcome::Started => {
                print!("{} {}", "assistant>".bright_green().bold(), fragment);
            }
            FragmentOutcome::Appended => print!("{fragment}"),
            FragmentOutcome::Ended => {
                println!();
                self.active = None;
            }
            FragmentOutcome::Ignored => {}
        }
        let _ = io::stdout().flush();
    }

    /// Returns `false` when the session should end.
    async fn handle_line(&mut self, line: &str) -> bool {
        if line.is_empty() {
            return true;
        }
        let Some(cmd) = line.strip_prefix(':') else {
            self.ask(line).await;
            return true;
        };
        let (name, rest) = cmd.split_once(' ').unwrap_or((cmd, ""));
        let rest = rest.trim();

        match name {
            "q" | "quit" | "exit" => return false,
            "help" => println!("{}", cli::REPL_HELP),
            "next" => {
                if self.library.navigate_next().is_some() {
                    self.show_lesson();
                }
            }
            "prev" => {
                if self.library.navigate_previous().is_some() {
                    self.show_lesson();
                }
            }
            "lesson" => match self.library.select(rest) {
                Ok(_) => self.show_lesson(),
                Err(e) => eprintln!("{}", e.to_string().red()),
            },
            "show" => self.show_lesson(),
            "pinyin" => {
                self.view.toggle();
                self.show_lesson();
            }
            "define" => self.define(rest).await,
            "speak" => self.speak(rest),
            "cancel" => self.cancel(),
            "suggest" => self.print_suggestions(),
            "s" => {
                let picked = rest
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|i| suggestions(self.current_lesson(), self.lang).into_iter().nth(i));
                match picked {
                    Some(s) => self.ask(&s.action).await,
                    None => eprintln!("{}", "no such suggestion".red()),
                }
            }
            "lang" => match self.prefs.toggle_language() {
                Ok(l) => {
                    self.lang = l;
                    println!("{l}");
                }
                Err(e) => eprintln!("{}", e.to_string().red()),
            },
            "reload" => {
                self.library = load_library(&self.config, self.lang)
                    .await
                    .unwrap_or_else(|_| LessonLibrary::new(Vec::new()));
            }
            other => eprintln!("unknown command :{other} (try :help)"),
        }
        true
    }

    async fn ask(&mut self, text: &str) {
        let Some(client) = self.client.as_ref() else {
            eprintln!("{}", ChatError::NotConnected.to_string().red());
            return;
        };
        match client.ready() {
            Ok(()) => {}
            Err(ChatError::Busy) => {
                eprintln!("{}", self.lang.t("chat.waitMessage").bright_yellow());
                return;
            }
            Err(e) => {
                eprintln!("{}", e.to_string().red());
                return;
            }
        }

        let lesson = if self.with_lesson { self.library.current() } else { None };
        let message = contextual_message(text, lesson, self.lang);
        let turn = self.transcript.push_user(text);
        match client.submit(&turn, &message).await {
            Ok(handle) => {
                if self.active.is_some() {
                    println!();
                }
                info!(%turn, "question sent");
                self.active = Some(handle);
                eprintln!("{}", self.lang.t("common.loading").dimmed());
            }
            Err(e) => {
                self.transcript.close_turn(&turn);
                eprintln!("{}", e.to_string().red());
            }
        }
    }

    /// Stop listening to the current reply; it keeps what has arrived.
    fn cancel(&mut self) {
        let Some(handle) = self.active.take() else {
            return;
        };
        if let Some(client) = self.client.as_ref() {
            client.cancel_turn();
        }
        self.transcript.close_turn(handle.turn());
        println!();
        info!(turn = %handle.turn(), "reply abandoned");
    }

    async fn define(&mut self, word: &str) {
        if word.is_empty() {
            eprintln!("usage: :define <word>");
            return;
        }
        let reading = word.chars().filter_map(char_pinyin).collect::<Vec<_>>().join(" ");
        let mut popup = WordPopup::loading(word, &reading);
        eprintln!("{}", self.lang.t("common.loading").dimmed());
        popup.resolve(self.definitions.lookup(word, self.lang, self.difficulty()).await);
        print_popup(&popup, self.lang);
        self.speech.stop();
        self.popup = Some(popup);
    }

    fn difficulty(&self) -> Difficulty {
        self.library
            .current()
            .map(|l| l.difficulty)
            .unwrap_or(self.config.difficulty)
    }

    fn speak(&mut self, arg: &str) {
        let Some(popup) = self.popup.as_ref() else {
            eprintln!("look up a word first with :define <word>");
            return;
        };
        let mut parts = arg.split_whitespace();
        let (category, utterance) = match (parts.next(), parts.next()) {
            (None, _) => (
                SpeechCategory::Pronunciation,
                Utterance::pronunciation(&popup.word),
            ),
            (Some("def"), _) => (
                SpeechCategory::Definition,
                Utterance::in_language(&popup.state.display_text(self.lang), self.lang),
            ),
            (Some("ex"), Some(n)) => {
                let idx = n.parse::<usize>().ok().and_then(|n| n.checked_sub(1));
                match idx.and_then(|i| popup.state.examples().get(i).map(|ex| (i, ex))) {
                    Some((i, ex)) => (
                        SpeechCategory::Example(i),
                        Utterance::in_language(ex, self.lang),
                    ),
                    None => {
                        eprintln!("no such example");
                        return;
                    }
                }
            }
            _ => {
                eprintln!("usage: :speak [def|ex <n>]");
                return;
            }
        };
        self.speech.toggle(category, &utterance);
    }

    fn show_lesson(&self) {
        match self.library.current() {
            Some(lesson) => {
                println!("{}", self.view.toggle_label(self.lang).dimmed());
                print!(
                    "{}",
                    cli::render_lesson(&self.library, lesson, &self.view.render(&lesson.content), self.lang)
                );
            }
            None => println!("{}", self.lang.t("lesson.selectStart")),
        }
    }

    fn print_suggestions(&self) {
        if !self.transcript.is_empty() {
            return;
        }
        println!("{}", self.lang.t("lesson.suggestions").bright_yellow());
        for (i, s) in suggestions(self.current_lesson(), self.lang).iter().enumerate() {
            println!("  :s {}  {}", i + 1, s.title);
        }
    }
}
