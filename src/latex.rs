use crate::entry::Entry;
use regex::Regex;
use std::cmp::min;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LatexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not run '{0}': is the TeX toolchain installed?")]
    ToolNotFound(String),
}

/// Outcome of compiling the minimal citing document for one entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    Pass,
    /// Compilation failed; carries the human-readable failure report
    /// (failed tool plus the error context from the log).
    Fail(String),
}

/// The seam between the check loop and the external TeX toolchain.
pub trait Validator {
    fn validate(&self, entry: &Entry) -> Result<Validation, LatexError>;
}

const BIBLATEX_TEMPLATE: &str = r"
\documentclass{article}
\usepackage[backend=bibtex, style=numeric-comp, sorting=none, firstinits=true, defernumbers=true]{biblatex}
\addbibresource{tmp.bib}
\usepackage{amsmath}
\usepackage[utf8]{inputenc}
\usepackage{syntonly}
\syntaxonly
\begin{document}
Try to cite: \cite{CITATION}.
\printbibliography
\end{document}
";

const BIBTEX_TEMPLATE: &str = r"
\documentclass{article}
\usepackage{amsmath}
\usepackage[utf8]{inputenc}
\usepackage{syntonly}
\syntaxonly
\begin{document}
Try to cite: \cite{CITATION}.
\bibliographystyle{unsrt}
\bibliography{tmp}
\end{document}
";

/// Render the minimal citing document for one citation key.
fn render_template(use_bibtex: bool, key: &str) -> String {
    let template = if use_bibtex {
        BIBTEX_TEMPLATE
    } else {
        BIBLATEX_TEMPLATE
    };
    template.replace("CITATION", key)
}

/// Pull the context around the first error marker out of a compile log:
/// three lines before through two lines after, indented for display.
pub(crate) fn extract_error_context(log: &str) -> Option<String> {
    let re = Regex::new(r"(?i)error").unwrap();
    let lines: Vec<&str> = log.lines().collect();
    let iline = lines.iter().position(|line| re.is_match(line))?;
    let start = iline.saturating_sub(3);
    let end = min(iline + 3, lines.len());
    Some(lines[start..end].join("\n    "))
}

/// Run one external tool inside `workdir`, appending its output to the
/// in-memory log. Returns whether the tool exited cleanly.
pub fn run_tool(
    program: &str,
    args: &[&str],
    workdir: &Path,
    log: &mut String,
) -> Result<bool, LatexError> {
    let output = Command::new(program)
        .current_dir(workdir)
        .args(args)
        .output()
        .map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => LatexError::ToolNotFound(program.to_string()),
            _ => LatexError::Io(err),
        })?;
    log.push_str(&String::from_utf8_lossy(&output.stdout));
    log.push_str(&String::from_utf8_lossy(&output.stderr));
    Ok(output.status.success())
}

/// Drives the external TeX toolchain in a private working directory:
/// compile, resolve the bibliography, compile twice more.
pub struct TexToolchain {
    workdir: PathBuf,
    use_bibtex: bool,
}

impl TexToolchain {
    pub fn new(workdir: PathBuf, use_bibtex: bool) -> Result<Self, LatexError> {
        fs::create_dir_all(&workdir)?;
        let toolchain = TexToolchain {
            workdir,
            use_bibtex,
        };
        toolchain.clean_workdir()?;
        Ok(toolchain)
    }

    /// The workdir name is stable across runs, so `tmp*` leftovers from
    /// an aborted run would feed the first pdflatex pass.
    fn clean_workdir(&self) -> Result<(), LatexError> {
        for dir_entry in fs::read_dir(&self.workdir)? {
            let dir_entry = dir_entry?;
            if dir_entry.file_name().to_string_lossy().starts_with("tmp") {
                let _ = fs::remove_file(dir_entry.path());
            }
        }
        Ok(())
    }

    /// The four compile steps, in order. `bibtex` resolves citations for
    /// both templates since the biblatex one is pinned to the bibtex
    /// backend.
    const STEPS: &'static [(&'static str, &'static [&'static str])] = &[
        ("pdflatex", &["-interaction=nonstopmode", "tmp.tex"]),
        ("bibtex", &["tmp"]),
        ("pdflatex", &["-interaction=nonstopmode", "tmp.tex"]),
        ("pdflatex", &["-interaction=nonstopmode", "tmp.tex"]),
    ];

    /// Leftovers from a failed run that would poison the retry.
    fn clean_aux_files(&self) {
        for name in ["tmp.aux", "tmp.blg", "tmp.bbl"] {
            let _ = fs::remove_file(self.workdir.join(name));
        }
    }
}

impl Validator for TexToolchain {
    fn validate(&self, entry: &Entry) -> Result<Validation, LatexError> {
        fs::write(self.workdir.join("tmp.bib"), &entry.text)?;
        fs::write(
            self.workdir.join("tmp.tex"),
            render_template(self.use_bibtex, &entry.key),
        )?;

        let mut log = String::new();
        for (program, args) in Self::STEPS {
            if !run_tool(program, args, &self.workdir, &mut log)? {
                let context = extract_error_context(&log)
                    .unwrap_or_else(|| "no error in the output".to_string());
                self.clean_aux_files();
                return Ok(Validation::Fail(format!(
                    "problem running {} with item {}\nerror from the log:\n    {}",
                    program, entry.key, context
                )));
            }
        }
        Ok(Validation::Pass)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn template_cites_the_key() {
        let doc = render_template(false, "Aad:2012tfa");
        assert!(doc.contains(r"\cite{Aad:2012tfa}"));
        assert!(doc.contains(r"\printbibliography"));

        let doc = render_template(true, "Aad:2012tfa");
        assert!(doc.contains(r"\cite{Aad:2012tfa}"));
        assert!(doc.contains(r"\bibliographystyle{unsrt}"));
    }

    #[test]
    fn error_context_surrounds_the_marker() {
        let log = "line one\nline two\nline three\nline four\n! Undefined control sequence Error\nline six\nline seven\nline eight\n";
        let context = extract_error_context(log).unwrap();
        let lines: Vec<&str> = context.split("\n    ").collect();
        assert_eq!(
            lines,
            vec![
                "line two",
                "line three",
                "line four",
                "! Undefined control sequence Error",
                "line six",
            ]
        );
    }

    #[test]
    fn stale_tmp_files_are_removed_on_open() {
        let dir = tempdir().unwrap();
        let workdir = dir.path().join("build");
        fs::create_dir_all(&workdir).unwrap();
        fs::write(workdir.join("tmp.bbl"), "stale bibliography").unwrap();
        fs::write(workdir.join("tmp.aux"), "stale aux").unwrap();
        fs::write(workdir.join("notes.txt"), "keep me").unwrap();

        TexToolchain::new(workdir.clone(), false).unwrap();

        assert!(!workdir.join("tmp.bbl").exists());
        assert!(!workdir.join("tmp.aux").exists());
        assert!(workdir.join("notes.txt").exists());
    }

    #[test]
    fn error_context_is_case_insensitive_and_clamped() {
        let log = "ERROR at the very start\nnext line\n";
        let context = extract_error_context(log).unwrap();
        assert!(context.starts_with("ERROR at the very start"));
        assert!(extract_error_context("all good\nnothing to see\n").is_none());
    }
}
