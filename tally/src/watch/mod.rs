//! Watch mode: re-evaluate a sheet file whenever it changes
//!
//! Debounced file events are the trigger; a low-frequency timer is the
//! fallback. One `Sheet` lives for the whole session, so the compiled
//! cache carries across passes and an unchanged file costs nothing.

use crate::error::{CalcError, Result};
use crate::settings::Settings;
use crate::sheet::{Sheet, render_text};
use notify::RecursiveMode;
use notify_debouncer_mini::new_debouncer;
use std::fs;
use std::path::Path;
use std::sync::mpsc;
use std::time::Duration;

const DEBOUNCE: Duration = Duration::from_millis(250);
const FALLBACK_TICK: Duration = Duration::from_millis(900);

/// Watch `path` until the channel dies (or the process is interrupted)
pub fn watch_file(path: &Path, settings: &Settings) -> Result<()> {
    let mut sheet = Sheet::new();
    reload(&mut sheet, path, settings, true)?;

    let (tx, rx) = mpsc::channel();
    let mut debouncer =
        new_debouncer(DEBOUNCE, tx).map_err(|e| CalcError::io(e.to_string()))?;
    debouncer
        .watcher()
        .watch(path, RecursiveMode::NonRecursive)
        .map_err(|e| CalcError::io(e.to_string()))?;

    loop {
        match rx.recv_timeout(FALLBACK_TICK) {
            Ok(Ok(_events)) => {
                if let Err(err) = reload(&mut sheet, path, settings, false) {
                    eprintln!("Error: {err}");
                }
            }
            Ok(Err(err)) => eprintln!("watch error: {err:?}"),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                // Fallback tick: editors that replace the file can slip
                // past the watcher
                if let Err(err) = reload(&mut sheet, path, settings, false) {
                    eprintln!("Error: {err}");
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    Ok(())
}

/// Re-read the file and run a pass; render only when something ran
fn reload(sheet: &mut Sheet, path: &Path, settings: &Settings, force: bool) -> Result<()> {
    let text = fs::read_to_string(path)?;
    if text != sheet.buffer_text() {
        sheet.restore(text);
    }

    if sheet.poll() || force {
        print!("\x1B[2J\x1B[1;1H");
        let mut lines = sheet.lines().to_vec();
        for line in &mut lines {
            line.selected = false;
        }
        print!("{}", render_text(&lines, settings));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reload_reads_and_renders() {
        let dir = std::env::temp_dir().join("tally-watch-test");
        fs::create_dir_all(&dir).unwrap();
        let file = dir.join("sheet.txt");
        fs::write(&file, "1+2").unwrap();

        let mut sheet = Sheet::new();
        reload(&mut sheet, &file, &Settings::default(), true).unwrap();
        assert_eq!(sheet.lines().len(), 1);
        assert!(sheet.lines()[0].error.is_none());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_reload_missing_file_is_io_error() {
        let mut sheet = Sheet::new();
        let missing = Path::new("/nonexistent/tally/sheet.txt");
        let err = reload(&mut sheet, missing, &Settings::default(), true).unwrap_err();
        assert!(matches!(err, CalcError::Io { .. }));
    }
}
