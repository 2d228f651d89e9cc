use std::collections::HashSet;
use std::io::Write;
use std::path::PathBuf;

use indicatif::{ProgressBar, ProgressStyle};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::{info, warn};

use crate::dcr::{self, Template};
use crate::error::Result;
use crate::fetch::Fetch;
use crate::output;
use crate::parser::schema;
use crate::parser::tables::fetch_supported_tables;
use crate::parser::template::TemplateSource;
use crate::selection::{Selection, SelectionError};
use crate::settings::Settings;

/// One read from the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Line(String),
    Interrupted,
    Eof,
}

pub trait Prompt {
    fn read(&mut self, prompt: &str) -> Input;
}

/// Interactive terminal prompt. Ctrl-C surfaces as [`Input::Interrupted`].
pub struct LineEditor {
    editor: DefaultEditor,
}

impl LineEditor {
    pub fn new() -> rustyline::Result<Self> {
        Ok(LineEditor {
            editor: DefaultEditor::new()?,
        })
    }
}

impl Prompt for LineEditor {
    fn read(&mut self, prompt: &str) -> Input {
        match self.editor.readline(prompt) {
            Ok(line) => {
                let _ = self.editor.add_history_entry(line.trim_end());
                Input::Line(line)
            }
            Err(ReadlineError::Interrupted) => Input::Interrupted,
            Err(ReadlineError::Eof) => Input::Eof,
            Err(err) => {
                warn!("Reading input failed: {:?}", err);
                Input::Eof
            }
        }
    }
}

/// How the menu loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// Operator chose exit, or input ran out.
    Quit,
    /// Every per-table template was written.
    Finished,
    Interrupted,
}

impl Exit {
    pub fn code(self) -> i32 {
        match self {
            Exit::Quit | Exit::Finished => 0,
            Exit::Interrupted => 130,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Add,
    Remove,
    List,
    Build,
    BuildAll,
    Exit,
}

impl Action {
    fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "a" => Some(Action::Add),
            "b" => Some(Action::Remove),
            "c" => Some(Action::List),
            "d" => Some(Action::Build),
            "e" => Some(Action::BuildAll),
            "f" => Some(Action::Exit),
            _ => None,
        }
    }
}

enum Step {
    Continue,
    Stop(Exit),
}

enum Choice {
    Number(usize),
    Invalid,
    Stop(Exit),
}

const MENU: &str = "Choose from the following options:
A: Add a table to the DCR Deployment Template
B: Remove a selected table
C: Print the table(s) already selected
D: Create the DCR Deployment Template
E: Create an individual template for each supported table
F: Exit and quit";

/// Session state: everything the menu reads and mutates.
pub struct App<F: Fetch> {
    fetcher: F,
    settings: Settings,
    discovered: Vec<String>,
    skeleton: Template,
    selection: Selection,
}

impl<F: Fetch> App<F> {
    pub fn new(fetcher: F, settings: Settings, discovered: Vec<String>, skeleton: Template) -> Self {
        App {
            fetcher,
            settings,
            discovered,
            skeleton,
            selection: Selection::new(),
        }
    }

    /// Discover supported tables and load the skeleton. Either failing is fatal.
    pub fn bootstrap(fetcher: F, settings: Settings) -> Result<Self> {
        let discovered = fetch_supported_tables(&fetcher, &settings)?;
        let skeleton = TemplateSource::from_settings(&settings).load_skeleton(&fetcher)?;
        Ok(Self::new(fetcher, settings, discovered, skeleton))
    }

    pub fn discovered(&self) -> &[String] {
        &self.discovered
    }

    pub fn run<P: Prompt, W: Write>(&mut self, prompt: &mut P, out: &mut W) -> Result<Exit> {
        writeln!(out, "Welcome to the DCR Deployment Template Builder")?;
        loop {
            writeln!(out, "{}", MENU)?;
            let step = match prompt.read("Choose an option (A-F): ") {
                Input::Line(line) => match Action::parse(&line) {
                    Some(action) => self.dispatch(action, prompt, out)?,
                    None => {
                        writeln!(out, "Invalid choice. Choose an option (A-F)\n")?;
                        Step::Continue
                    }
                },
                Input::Interrupted => Step::Stop(interrupted(out)?),
                Input::Eof => Step::Stop(Exit::Quit),
            };
            if let Step::Stop(exit) = step {
                info!("Menu finished: {:?}", exit);
                return Ok(exit);
            }
        }
    }

    fn dispatch<P: Prompt, W: Write>(
        &mut self,
        action: Action,
        prompt: &mut P,
        out: &mut W,
    ) -> Result<Step> {
        match action {
            Action::Add => self.add_table(prompt, out),
            Action::Remove => self.remove_table(prompt, out),
            Action::List => {
                self.list_selection(out)?;
                Ok(Step::Continue)
            }
            Action::Build => {
                self.build_selection(out)?;
                Ok(Step::Continue)
            }
            Action::BuildAll => self.build_all(out),
            Action::Exit => {
                writeln!(out, "\nExiting...")?;
                Ok(Step::Stop(Exit::Quit))
            }
        }
    }

    fn add_table<P: Prompt, W: Write>(&mut self, prompt: &mut P, out: &mut W) -> Result<Step> {
        if self.selection.is_full() {
            writeln!(out, "{}", SelectionError::Full)?;
            return Ok(Step::Continue);
        }

        writeln!(out, "\nSelect a supported table to add to the DCR Deployment Template:")?;
        enumerate(out, &self.discovered)?;

        loop {
            let choice = read_number(
                prompt,
                out,
                "Choose a table (number) to add, or select 0 to return to menu: ",
            )?;
            match choice {
                Choice::Stop(exit) => return Ok(Step::Stop(exit)),
                Choice::Invalid => {}
                Choice::Number(0) => {
                    writeln!(out, "Returning to main menu\n")?;
                    return Ok(Step::Continue);
                }
                Choice::Number(n) if n <= self.discovered.len() => {
                    let table = &self.discovered[n - 1];
                    match self.selection.add(table) {
                        Ok(_) => {
                            writeln!(out, "\nTable {}. {} added\n", n, table)?;
                            return Ok(Step::Continue);
                        }
                        Err(SelectionError::Duplicate(_)) => {
                            writeln!(out, "Selection already chosen\n")?;
                        }
                        Err(e @ SelectionError::Full) => {
                            writeln!(out, "{}", e)?;
                            return Ok(Step::Continue);
                        }
                    }
                }
                Choice::Number(_) => {
                    writeln!(
                        out,
                        "Invalid choice. Enter a number between 1 and {}\n",
                        self.discovered.len()
                    )?;
                }
            }
        }
    }

    fn remove_table<P: Prompt, W: Write>(&mut self, prompt: &mut P, out: &mut W) -> Result<Step> {
        if self.selection.is_empty() {
            writeln!(out, "\nNo tables have been added\n")?;
            return Ok(Step::Continue);
        }

        writeln!(out, "\nSelect a table to remove from the DCR Deployment Template:\n")?;
        enumerate(out, self.selection.as_slice())?;

        loop {
            match read_number(prompt, out, "Choose a table (number) to remove: ")? {
                Choice::Stop(exit) => return Ok(Step::Stop(exit)),
                Choice::Invalid => {}
                Choice::Number(n) => match self.selection.remove(n) {
                    Some(table) => {
                        writeln!(out, "Table {}. {} removed\n", n, table)?;
                        return Ok(Step::Continue);
                    }
                    None => {
                        writeln!(
                            out,
                            "Invalid choice. Enter a number between 1 and {}",
                            self.selection.len()
                        )?;
                    }
                },
            }
        }
    }

    fn list_selection<W: Write>(&self, out: &mut W) -> Result<()> {
        if self.selection.is_empty() {
            writeln!(out, "\nNo tables have been added\n")?;
            return Ok(());
        }
        writeln!(out, "\nThe following tables have been added to the DCR Deployment:")?;
        enumerate(out, self.selection.as_slice())?;
        writeln!(out)?;
        Ok(())
    }

    fn build_selection<W: Write>(&self, out: &mut W) -> Result<()> {
        if self.selection.is_empty() {
            writeln!(out, "No tables selected!\n")?;
            return Ok(());
        }
        match self.build(self.selection.as_slice(), out) {
            Ok(path) => writeln!(
                out,
                "\nDCR Deployment template created: {}\n",
                path.display()
            )?,
            Err(e) => writeln!(out, "\nFailed to create DCR Deployment template: {}\n", e)?,
        }
        Ok(())
    }

    fn build_all<W: Write>(&self, out: &mut W) -> Result<Step> {
        let pb = ProgressBar::new(self.discovered.len() as u64);
        pb.set_style(
            ProgressStyle::with_template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );

        let mut written = 0usize;
        let mut failed = 0usize;
        let mut seen = HashSet::new();
        for table in &self.discovered {
            if !seen.insert(table.to_lowercase()) {
                warn!("{} listed more than once, building it once", table);
                pb.inc(1);
                continue;
            }
            pb.set_message(table.clone());
            match self.build(std::slice::from_ref(table), out) {
                Ok(_) => written += 1,
                Err(e) => {
                    failed += 1;
                    writeln!(out, "Failed to create template for {}: {}", table, e)?;
                }
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        info!("Per-table build: {} written, {} failed", written, failed);
        writeln!(
            out,
            "\nDCR Deployment Template created for each supported table ({} written, {} failed)\n",
            written, failed
        )?;
        Ok(Step::Stop(Exit::Finished))
    }

    /// Assemble `tables` and write the result, warning about anything left out.
    fn build<W: Write>(&self, tables: &[String], out: &mut W) -> Result<PathBuf> {
        let assembly = dcr::assemble(&self.skeleton, &self.discovered, tables, |table| {
            schema::fetch_columns(&self.fetcher, &self.settings, table)
        })?;
        for skipped in &assembly.skipped {
            writeln!(out, "Warning: {} left out: {}", skipped.table, skipped.reason)?;
        }
        info!("Assembled template for {:?}", assembly.tables);
        output::write_template(&self.settings.output_dir, tables, &assembly.template)
    }
}

fn enumerate<W: Write>(out: &mut W, items: &[String]) -> Result<()> {
    for (i, item) in items.iter().enumerate() {
        writeln!(out, "{}. {}", i + 1, item)?;
    }
    Ok(())
}

fn interrupted<W: Write>(out: &mut W) -> Result<Exit> {
    writeln!(out, "\nExiting...")?;
    Ok(Exit::Interrupted)
}

fn read_number<P: Prompt, W: Write>(prompt: &mut P, out: &mut W, text: &str) -> Result<Choice> {
    match prompt.read(text) {
        Input::Line(line) => match line.trim().parse::<usize>() {
            Ok(n) => Ok(Choice::Number(n)),
            Err(_) => {
                writeln!(out, "Invalid input. Enter a number.")?;
                Ok(Choice::Invalid)
            }
        },
        Input::Interrupted => Ok(Choice::Stop(interrupted(out)?)),
        Input::Eof => Ok(Choice::Stop(Exit::Quit)),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::path::Path;

    use serde_json::Value;

    use super::*;
    use crate::fetch::StaticFetcher;
    use crate::parser::template::join_code_blocks;
    use crate::settings::test_settings;

    const BASE: &str = "https://docs.test";

    /// Replays a fixed list of inputs, then reports end of input.
    pub struct ScriptedPrompt {
        inputs: VecDeque<Input>,
        prompts: Vec<String>,
    }

    impl ScriptedPrompt {
        pub fn new<I, S>(lines: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            ScriptedPrompt {
                inputs: lines.into_iter().map(|l| Input::Line(l.into())).collect(),
                prompts: Vec::new(),
            }
        }

        pub fn then(mut self, input: Input) -> Self {
            self.inputs.push_back(input);
            self
        }

        pub fn prompts(&self) -> &[String] {
            &self.prompts
        }

        pub fn remaining(&self) -> usize {
            self.inputs.len()
        }
    }

    impl Prompt for ScriptedPrompt {
        fn read(&mut self, prompt: &str) -> Input {
            self.prompts.push(prompt.to_string());
            self.inputs.pop_front().unwrap_or(Input::Eof)
        }
    }

    fn schema_page(columns: &[(&str, &str)]) -> String {
        let rows: String = columns
            .iter()
            .map(|(n, t)| format!("<tr><td>{}</td><td>{}</td><td>desc</td></tr>", n, t))
            .collect();
        format!(
            "<html><body><table><tr><th>Column</th><th>Type</th><th>Description</th></tr>{}</table></body></html>",
            rows
        )
    }

    fn skeleton() -> Template {
        let html = std::fs::read_to_string("tests/fixtures/dcr_template.html").unwrap();
        Template::parse(&join_code_blocks(&html))
            .unwrap()
            .into_skeleton()
            .unwrap()
    }

    fn app(dir: &Path, discovered: &[&str]) -> App<StaticFetcher> {
        let mut settings = test_settings(BASE);
        settings.output_dir = dir.to_path_buf();
        let mut fetcher = StaticFetcher::new();
        for t in discovered {
            fetcher = fetcher.with_page(
                settings.table_url(t),
                schema_page(&[("TimeGenerated", "datetime"), ("_ItemId", "string"), ("Message", "string")]),
            );
        }
        App::new(
            fetcher,
            settings,
            discovered.iter().map(|s| s.to_string()).collect(),
            skeleton(),
        )
    }

    fn run(app: &mut App<StaticFetcher>, prompt: &mut ScriptedPrompt) -> (Exit, String) {
        let mut out = Vec::new();
        let exit = app.run(prompt, &mut out).unwrap();
        (exit, String::from_utf8(out).unwrap())
    }

    fn read_json(path: &Path) -> Value {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    fn stream_keys(doc: &Value) -> Vec<String> {
        doc["resources"][0]["properties"]["streamDeclarations"]
            .as_object()
            .unwrap()
            .keys()
            .cloned()
            .collect()
    }

    #[test]
    fn add_then_build_writes_single_table_template() {
        let tmp = tempfile::tempdir().unwrap();
        let mut app = app(tmp.path(), &["Syslog", "SecurityEvent"]);
        let mut prompt = ScriptedPrompt::new(["A", "1", "d", "f"]);

        let (exit, out) = run(&mut app, &mut prompt);
        assert_eq!(exit, Exit::Quit);
        assert!(out.contains("Table 1. Syslog added"));
        assert!(out.contains("DCR Deployment template created"));

        let doc = read_json(&tmp.path().join("dcr-Syslog-1.json"));
        assert_eq!(stream_keys(&doc), vec!["Custom-Syslog"]);
        let flows = doc["resources"][0]["properties"]["dataFlows"].as_array().unwrap();
        assert_eq!(flows.len(), 1);
        assert_eq!(flows[0]["streams"][0], "Custom-Syslog");
        assert_eq!(flows[0]["outputStream"], "Microsoft-Syslog");
        let columns = doc["resources"][0]["properties"]["streamDeclarations"]["Custom-Syslog"]
            ["columns"]
            .as_array()
            .unwrap();
        assert_eq!(columns.len(), 2);
    }

    #[test]
    fn combined_build_uses_count_in_name() {
        let tmp = tempfile::tempdir().unwrap();
        let mut app = app(tmp.path(), &["Syslog", "SecurityEvent"]);
        let mut prompt = ScriptedPrompt::new(["a", "2", "a", "1", "d", "f"]);

        run(&mut app, &mut prompt);
        let doc = read_json(&tmp.path().join("dcr-Combined-2.json"));
        assert_eq!(stream_keys(&doc), vec!["Custom-SecurityEvent", "Custom-Syslog"]);
    }

    #[test]
    fn build_all_writes_one_file_per_table_and_stops() {
        let tmp = tempfile::tempdir().unwrap();
        let mut app = app(tmp.path(), &["A", "B"]);
        let mut prompt = ScriptedPrompt::new(["a", "1", "E", "c", "f"]);

        let (exit, _) = run(&mut app, &mut prompt);
        assert_eq!(exit, Exit::Finished);
        assert_eq!(prompt.remaining(), 2);

        let mut files: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        files.sort();
        assert_eq!(files, vec!["dcr-A-1.json", "dcr-B-1.json"]);
        for (file, key) in [("dcr-A-1.json", "Custom-A"), ("dcr-B-1.json", "Custom-B")] {
            assert_eq!(stream_keys(&read_json(&tmp.path().join(file))), vec![key]);
        }
    }

    #[test]
    fn build_all_builds_repeated_names_once() {
        let tmp = tempfile::tempdir().unwrap();
        let mut app = app(tmp.path(), &["Syslog", "B", "SYSLOG"]);
        let mut prompt = ScriptedPrompt::new(["E"]);

        let (exit, out) = run(&mut app, &mut prompt);
        assert_eq!(exit, Exit::Finished);
        assert!(out.contains("(2 written, 0 failed)"), "{}", out);

        let mut files: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        files.sort();
        assert_eq!(files, vec!["dcr-B-1.json", "dcr-Syslog-1.json"]);

        let syslog_url = app.settings.table_url("Syslog");
        let fetched = app.fetcher.hits().iter().filter(|u| **u == syslog_url).count();
        assert_eq!(fetched, 1);
    }

    #[test]
    fn add_recovers_from_bad_input_and_duplicates() {
        let tmp = tempfile::tempdir().unwrap();
        let mut app = app(tmp.path(), &["Syslog", "SecurityEvent"]);
        let mut prompt = ScriptedPrompt::new(["a", "1", "a", "x", "7", "1", "0", "f"]);

        let (_, out) = run(&mut app, &mut prompt);
        assert!(out.contains("Invalid input. Enter a number."));
        assert!(out.contains("Invalid choice. Enter a number between 1 and 2"));
        assert!(out.contains("Selection already chosen"));
        assert!(out.contains("Returning to main menu"));
        assert_eq!(app.selection.as_slice(), ["Syslog"]);
    }

    #[test]
    fn add_is_refused_once_full() {
        let tmp = tempfile::tempdir().unwrap();
        let names: Vec<String> = (1..=11).map(|i| format!("T{}", i)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let mut app = app(tmp.path(), &refs);

        let mut script = Vec::new();
        for i in 1..=10 {
            script.push("a".to_string());
            script.push(i.to_string());
        }
        script.push("a".to_string());
        script.push("f".to_string());
        let mut prompt = ScriptedPrompt::new(script);

        let (_, out) = run(&mut app, &mut prompt);
        assert_eq!(app.selection.len(), 10);
        assert!(out.contains("Max (10) amount of tables selected"));
        assert!(!app.selection.as_slice().iter().any(|t| t == "T11"));
        // the 11th add never asks for a number
        let number_prompts = prompt
            .prompts()
            .iter()
            .filter(|p| p.starts_with("Choose a table"))
            .count();
        assert_eq!(number_prompts, 10);
    }

    #[test]
    fn remove_shifts_selection() {
        let tmp = tempfile::tempdir().unwrap();
        let mut app = app(tmp.path(), &["A", "B", "C"]);
        let mut prompt =
            ScriptedPrompt::new(["a", "1", "a", "2", "a", "3", "b", "9", "2", "c", "f"]);

        let (_, out) = run(&mut app, &mut prompt);
        assert!(out.contains("Invalid choice. Enter a number between 1 and 3"));
        assert!(out.contains("Table 2. B removed"));
        assert_eq!(app.selection.as_slice(), ["A", "C"]);
        assert!(out.contains("1. A\n2. C\n"));
    }

    #[test]
    fn empty_selection_notices() {
        let tmp = tempfile::tempdir().unwrap();
        let mut app = app(tmp.path(), &["A"]);
        let mut prompt = ScriptedPrompt::new(["b", "c", "d", "z", "f"]);

        let (exit, out) = run(&mut app, &mut prompt);
        assert_eq!(exit, Exit::Quit);
        assert_eq!(out.matches("No tables have been added").count(), 2);
        assert!(out.contains("No tables selected!"));
        assert!(out.contains("Invalid choice. Choose an option (A-F)"));
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn interrupt_during_number_read_exits_nonzero() {
        let tmp = tempfile::tempdir().unwrap();
        let mut app = app(tmp.path(), &["A"]);
        let mut prompt = ScriptedPrompt::new(["a"])
            .then(Input::Interrupted)
            .then(Input::Line("f".into()));

        let (exit, out) = run(&mut app, &mut prompt);
        assert_eq!(exit, Exit::Interrupted);
        assert_ne!(exit.code(), 0);
        assert!(out.ends_with("\nExiting...\n"));
        assert_eq!(prompt.remaining(), 1);
    }

    #[test]
    fn interrupt_at_menu_exits_nonzero() {
        let tmp = tempfile::tempdir().unwrap();
        let mut app = app(tmp.path(), &["A"]);
        let mut prompt = ScriptedPrompt::new(Vec::<String>::new()).then(Input::Interrupted);
        let (exit, _) = run(&mut app, &mut prompt);
        assert_eq!(exit.code(), 130);
    }

    #[test]
    fn end_of_input_is_clean_exit() {
        let tmp = tempfile::tempdir().unwrap();
        let mut app = app(tmp.path(), &["A"]);
        let mut prompt = ScriptedPrompt::new(["a"]);
        let (exit, _) = run(&mut app, &mut prompt);
        assert_eq!(exit, Exit::Quit);
        assert_eq!(exit.code(), 0);
    }

    #[test]
    fn build_warns_about_tables_without_schema() {
        let tmp = tempfile::tempdir().unwrap();
        let mut app = app(tmp.path(), &["Syslog"]);
        app.discovered.push("Missing".to_string());
        let mut prompt = ScriptedPrompt::new(["a", "1", "a", "2", "d", "f"]);

        let (_, out) = run(&mut app, &mut prompt);
        assert!(out.contains("Warning: Missing left out: GET https://docs.test/reference/tables/Missing returned HTTP 404"));
        let doc = read_json(&tmp.path().join("dcr-Combined-2.json"));
        assert_eq!(stream_keys(&doc), vec!["Custom-Syslog"]);
    }

    #[test]
    fn bootstrap_discovers_tables_and_skeleton() {
        let settings = test_settings(BASE);
        let index = r#"<a href="/reference/tables/Syslog">Syslog</a><a href="/reference/tables/SecurityEvent">SecurityEvent</a>"#;
        let template = std::fs::read_to_string("tests/fixtures/dcr_template.html").unwrap();
        let fetcher = StaticFetcher::new()
            .with_page(settings.supported_tables_url(), index)
            .with_page(settings.template_url.clone(), template);

        let app = App::bootstrap(fetcher, settings).unwrap();
        assert_eq!(app.discovered(), ["Syslog", "SecurityEvent"]);
        assert!(app.skeleton.data_flows().unwrap().is_empty());
        assert!(app.selection.is_empty());
    }

    #[test]
    fn bootstrap_fails_without_skeleton() {
        let settings = test_settings(BASE);
        let fetcher = StaticFetcher::new().with_page(
            settings.supported_tables_url(),
            r#"<a href="/reference/tables/Syslog">Syslog</a>"#,
        );
        assert!(App::bootstrap(fetcher, settings).is_err());
    }

    #[test]
    fn menu_letters_ignore_case_and_whitespace() {
        assert_eq!(Action::parse(" A "), Some(Action::Add));
        assert_eq!(Action::parse("e"), Some(Action::BuildAll));
        assert_eq!(Action::parse("F\n"), Some(Action::Exit));
        assert_eq!(Action::parse("g"), None);
        assert_eq!(Action::parse(""), None);
    }
}
