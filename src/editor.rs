use std::env;
use std::fs;
use std::process::Command;
use std::sync::atomic::{AtomicU32, Ordering};
use thiserror::Error;

/// Prefix for report lines written into the scratch file. Lines starting
/// with it are stripped when the edited entry is read back.
const ANNOTATION_PREFIX: &str = "% bibcheck:";

static SCRATCH_COUNTER: AtomicU32 = AtomicU32::new(0);

#[derive(Error, Debug)]
pub enum FixError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No editor configured: set $EDITOR or the editor key in config.toml")]
    NoEditor,

    #[error("Editor '{0}' exited with failure")]
    EditorFailed(String),
}

/// Produces a replacement for an entry that failed validation. The
/// production implementation opens an external editor; tests inject a
/// scripted one.
pub trait Fixer {
    fn fix(&self, entry_text: &str, report: &str) -> Result<String, FixError>;
}

/// Write the failure report above the entry as stripped-on-read comment
/// lines, so the human sees the error next to the text to fix.
fn annotate(entry_text: &str, report: &str) -> String {
    let mut annotated = String::new();
    for line in report.lines() {
        annotated.push_str(ANNOTATION_PREFIX);
        annotated.push(' ');
        annotated.push_str(line);
        annotated.push('\n');
    }
    annotated.push('\n');
    annotated.push_str(entry_text);
    annotated
}

/// Remove annotation lines and the surrounding blank padding.
fn strip_annotations(text: &str) -> String {
    let stripped: Vec<&str> = text
        .lines()
        .filter(|line| !line.trim_start().starts_with(ANNOTATION_PREFIX))
        .collect();
    stripped.join("\n").trim().to_string()
}

/// Opens the failing entry in an external editor and reads the result
/// back once the editor exits.
pub struct EditorFixer {
    program: String,
    args: Vec<String>,
}

impl EditorFixer {
    /// Resolve the editor command: the config value wins, then $EDITOR.
    pub fn resolve(configured: Option<&str>) -> Result<Self, FixError> {
        let command = match configured {
            Some(cmd) => cmd.to_string(),
            None => env::var("EDITOR").map_err(|_| FixError::NoEditor)?,
        };
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or(FixError::NoEditor)?;
        Ok(EditorFixer {
            program,
            args: parts.collect(),
        })
    }
}

impl Fixer for EditorFixer {
    fn fix(&self, entry_text: &str, report: &str) -> Result<String, FixError> {
        let id = SCRATCH_COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = env::temp_dir().join(format!(
            "bibcheck_edit_{}_{}.bib",
            std::process::id(),
            id
        ));
        fs::write(&path, annotate(entry_text, report))?;

        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(&path)
            .status()?;
        if !status.success() {
            let _ = fs::remove_file(&path);
            return Err(FixError::EditorFailed(self.program.clone()));
        }

        let edited = fs::read_to_string(&path)?;
        fs::remove_file(&path)?;
        Ok(strip_annotations(&edited))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENTRY: &str = "@article{Key:1,\n    title = \"{T}\"\n}";

    #[test]
    fn annotate_then_strip_is_identity() {
        let report = "problem running pdflatex with item Key:1\nerror from the log:\n    ! Oops";
        let annotated = annotate(ENTRY, report);
        assert!(annotated.starts_with("% bibcheck: problem running pdflatex"));
        assert_eq!(strip_annotations(&annotated), ENTRY);
    }

    #[test]
    fn strip_keeps_user_edits() {
        let edited = format!(
            "% bibcheck: some report line\n\n{}\n",
            ENTRY.replace("{T}", "{Title}")
        );
        assert_eq!(
            strip_annotations(&edited),
            ENTRY.replace("{T}", "{Title}")
        );
    }

    #[test]
    fn resolve_prefers_configured_command() {
        let fixer = EditorFixer::resolve(Some("emacs -nw")).unwrap();
        assert_eq!(fixer.program, "emacs");
        assert_eq!(fixer.args, vec!["-nw"]);
    }
}
