//! Interactive sheet editing (Read-Eval-Print Loop)

use crate::settings::{self, Settings};
use crate::sheet::{LineKind, Sheet, default_export_name};
use rustyline::error::ReadlineError;
use rustyline::{DefaultEditor, Result as RlResult};
use std::fs;
use std::path::PathBuf;

const PROMPT: &str = "> ";
const HISTORY_FILE: &str = "history";

/// REPL state
pub struct Repl {
    editor: DefaultEditor,
    sheet: Sheet,
    settings: Settings,
    history_path: Option<PathBuf>,
}

impl Repl {
    /// Create a new REPL, restoring the saved buffer when configured
    pub fn new() -> RlResult<Self> {
        let editor = DefaultEditor::new()?;
        let settings = Settings::load();
        let mut sheet = Sheet::new();

        if settings.save_history
            && let Some(path) = settings::buffer_path()
            && let Ok(saved) = fs::read_to_string(&path)
        {
            sheet.restore(saved);
            sheet.recompute();
        }

        let history_path = settings::config_dir().map(|dir| dir.join(HISTORY_FILE));

        let mut repl = Repl {
            editor,
            sheet,
            settings,
            history_path,
        };

        if let Some(ref path) = repl.history_path {
            let _ = repl.editor.load_history(path);
        }

        Ok(repl)
    }

    /// Run the REPL
    pub fn run(&mut self) -> RlResult<()> {
        println!("tally {}", env!("CARGO_PKG_VERSION"));
        println!("Type :help for help, :quit to exit.\n");

        loop {
            let indent = self.continuation_indent();
            match self.editor.readline_with_initial(PROMPT, (indent.as_str(), "")) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        let _ = self.editor.add_history_entry(line.trim_end());
                    }

                    let trimmed = line.trim();
                    if trimmed.starts_with(':') {
                        if self.handle_command(trimmed) {
                            break;
                        }
                        continue;
                    }

                    // Blank lines matter: they close open scopes
                    self.sheet.push_line(&line);
                    self.sheet.recompute();
                    self.echo_last();
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!("Goodbye!");
                    break;
                }
                Err(err) => {
                    eprintln!("Error: {err}");
                    break;
                }
            }
        }

        if let Some(ref path) = self.history_path {
            if let Some(dir) = path.parent() {
                let _ = fs::create_dir_all(dir);
            }
            let _ = self.editor.save_history(path);
        }

        if self.settings.save_history
            && let Some(path) = settings::buffer_path()
        {
            if let Some(dir) = path.parent() {
                let _ = fs::create_dir_all(dir);
            }
            let _ = fs::write(path, self.sheet.buffer_text());
        }

        Ok(())
    }

    /// Indent to pre-fill on the next prompt: one unit deeper after a
    /// scope header, same depth after anything else.
    fn continuation_indent(&self) -> String {
        match self.sheet.lines().last() {
            Some(line) if line.is_header() => "  ".repeat(line.depth + 1),
            Some(line) if line.kind != LineKind::Blank => "  ".repeat(line.depth),
            _ => String::new(),
        }
    }

    /// Echo the outcome of the line just entered
    fn echo_last(&self) {
        let Some(line) = self.sheet.lines().last() else {
            return;
        };
        if let Some(error) = &line.error {
            eprintln!("  // {}", error.to_string().replace('\n', ";"));
        } else if let Some(value) = &line.result
            && (line.is_header() || !line.trivial)
        {
            println!(
                "  = {}",
                crate::sheet::format_value(value, &self.settings)
            );
        }
    }

    /// Handle REPL commands (starting with :). Returns true to quit.
    fn handle_command(&mut self, cmd: &str) -> bool {
        let mut parts = cmd.split_whitespace();
        let head = parts.next().unwrap_or(cmd);
        let arg = parts.next();
        let arg2 = parts.next();

        match head {
            ":quit" | ":q" | ":exit" => {
                println!("Goodbye!");
                return true;
            }
            ":help" | ":h" | ":?" => self.print_help(),
            ":clear" => {
                self.sheet.restore("");
                self.sheet.recompute();
                print!("\x1B[2J\x1B[1;1H");
            }
            ":show" => print!("{}", self.sheet.render(&self.settings)),
            ":save" => {
                let path = arg
                    .map(PathBuf::from)
                    .or_else(settings::buffer_path);
                match path {
                    Some(path) => {
                        if let Some(dir) = path.parent()
                            && !dir.as_os_str().is_empty()
                        {
                            let _ = fs::create_dir_all(dir);
                        }
                        match fs::write(&path, self.sheet.buffer_text()) {
                            Ok(_) => println!("Saved to {}", path.display()),
                            Err(err) => eprintln!("Error: {err}"),
                        }
                    }
                    None => eprintln!("Error: no save path available"),
                }
            }
            ":load" => {
                let path = arg
                    .map(PathBuf::from)
                    .or_else(settings::buffer_path);
                match path.as_deref().map(fs::read_to_string) {
                    Some(Ok(text)) => {
                        self.sheet.restore(text);
                        self.sheet.recompute();
                        print!("{}", self.sheet.render(&self.settings));
                    }
                    Some(Err(err)) => eprintln!("Error: {err}"),
                    None => eprintln!("Error: no load path available"),
                }
            }
            ":set" => match (arg, arg2.map(|v| v == "on")) {
                (Some("round_results"), Some(value)) => {
                    self.settings.round_results = value;
                    self.store_settings();
                }
                (Some("save_history"), Some(value)) => {
                    self.settings.save_history = value;
                    self.store_settings();
                }
                _ => {
                    println!("Usage: :set round_results|save_history on|off");
                    println!(
                        "  round_results = {}, save_history = {}",
                        on_off(self.settings.round_results),
                        on_off(self.settings.save_history)
                    );
                }
            },
            ":export" => {
                let path = arg
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(default_export_name()));
                match self.sheet.export(&path, &self.settings) {
                    Ok(_) => println!("Exported to {}", path.display()),
                    Err(err) => eprintln!("Error: {err}"),
                }
            }
            _ => {
                println!("Unknown command: {cmd}");
                println!("Type :help for help.");
            }
        }
        false
    }

    fn store_settings(&self) {
        match self.settings.store() {
            Ok(_) => println!(
                "round_results = {}, save_history = {}",
                on_off(self.settings.round_results),
                on_off(self.settings.save_history)
            ),
            Err(err) => eprintln!("Error: {err}"),
        }
    }

    /// Print help message
    fn print_help(&self) {
        println!("tally commands:");
        println!("  :help, :h, :?    Show this help");
        println!("  :quit, :q        Exit");
        println!("  :clear           Reset the sheet and clear the screen");
        println!("  :show            Render the whole sheet");
        println!("  :save [path]     Save the raw buffer");
        println!("  :load [path]     Load a raw buffer");
        println!("  :export [path]   Write the rendered sheet to a file");
        println!("  :set key on|off  Toggle round_results or save_history");
        println!();
        println!("You can enter:");
        println!("  - Expressions: 1 + 2, price * 0.2, sqrt(2)");
        println!("  - Assignments: price = 40");
        println!("  - Scope headers: groceries:  (indented lines below sum into it)");
        println!("  - `last` refers to the previous result; closed scope");
        println!("    labels are ordinary variables");
    }
}

fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repl_new() {
        let repl = Repl::new();
        assert!(repl.is_ok());
    }

    #[test]
    fn test_handle_command_quit_variants() {
        let mut repl = Repl::new().unwrap();
        assert!(repl.handle_command(":quit"));
        assert!(repl.handle_command(":q"));
        assert!(repl.handle_command(":exit"));
    }

    #[test]
    fn test_handle_command_help_does_not_quit() {
        let mut repl = Repl::new().unwrap();
        assert!(!repl.handle_command(":help"));
        assert!(!repl.handle_command(":h"));
        assert!(!repl.handle_command(":?"));
    }

    #[test]
    fn test_handle_command_unknown() {
        let mut repl = Repl::new().unwrap();
        assert!(!repl.handle_command(":nonsense"));
    }

    #[test]
    fn test_handle_command_show() {
        let mut repl = Repl::new().unwrap();
        repl.sheet.push_line("1+1");
        repl.sheet.recompute();
        assert!(!repl.handle_command(":show"));
    }

    #[test]
    fn test_continuation_indent_after_header() {
        let mut repl = Repl::new().unwrap();
        repl.sheet.restore("food:");
        repl.sheet.recompute();
        assert_eq!(repl.continuation_indent(), "  ");
    }

    #[test]
    fn test_continuation_indent_follows_depth() {
        let mut repl = Repl::new().unwrap();
        repl.sheet.restore("food:\n  10");
        repl.sheet.recompute();
        assert_eq!(repl.continuation_indent(), "  ");
    }

    #[test]
    fn test_continuation_indent_empty_for_blank() {
        let mut repl = Repl::new().unwrap();
        repl.sheet.restore("food:\n");
        repl.sheet.recompute();
        assert_eq!(repl.continuation_indent(), "");
    }

    #[test]
    fn test_constants() {
        assert_eq!(PROMPT, "> ");
        assert_eq!(HISTORY_FILE, "history");
    }
}
