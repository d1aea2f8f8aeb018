use crate::latex::{extract_error_context, run_tool};
use crate::ui::UI;
use anyhow::{bail, Result};
use std::fs;
use std::path::Path;

/// Placeholder in the document template where the bibliography file
/// stem goes.
const BIB_PLACEHOLDER: &str = "ADD_BIBTEX_HERE";

const DEFAULT_TEMPLATE: &str = r"
\documentclass{article}
\usepackage{amsmath}
\usepackage[utf8]{inputenc}
\begin{document}
\nocite{*}
\bibliographystyle{unsrt}
\bibliography{ADD_BIBTEX_HERE}
\end{document}
";

fn render_document(template: &str, stem: &str) -> String {
    template.replace(BIB_PLACEHOLDER, stem)
}

const STEPS: &[(&str, &[&str])] = &[
    ("pdflatex", &["-interaction=nonstopmode", "publications.tex"]),
    ("bibtex", &["publications"]),
    ("pdflatex", &["-interaction=nonstopmode", "publications.tex"]),
    ("pdflatex", &["-interaction=nonstopmode", "publications.tex"]),
];

/// Compile the whole bibliography into `publications.pdf` in the
/// current directory, citing every entry.
pub fn render(bibtex: &Path, template: Option<&Path>) -> Result<()> {
    let stem = match bibtex.file_stem() {
        Some(stem) => stem.to_string_lossy().into_owned(),
        None => bail!("'{}' is not a bibliography file", bibtex.display()),
    };
    let template = match template {
        Some(path) => fs::read_to_string(path)?,
        None => DEFAULT_TEMPLATE.to_string(),
    };
    fs::write("publications.tex", render_document(&template, &stem))?;

    let workdir = Path::new(".");
    let mut log = String::new();
    let pb = UI::spinner("Rendering", "pdflatex");
    for (program, args) in STEPS {
        pb.set_message(program.to_string());
        if !run_tool(program, args, workdir, &mut log)? {
            pb.finish_and_clear();
            let context = extract_error_context(&log)
                .unwrap_or_else(|| "no error in the output".to_string());
            bail!(
                "problem running {} on the full bibliography\nerror from the log:\n    {}",
                program,
                context
            );
        }
    }
    UI::finish_with_message(pb, "Done", "output written in publications.pdf");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_cites_the_bibliography_stem() {
        let doc = render_document(DEFAULT_TEMPLATE, "bibtex_2024-01-01");
        assert!(doc.contains(r"\bibliography{bibtex_2024-01-01}"));
        assert!(!doc.contains(BIB_PLACEHOLDER));
    }

    #[test]
    fn custom_template_keeps_its_surroundings() {
        let template = "before ADD_BIBTEX_HERE after";
        assert_eq!(render_document(template, "refs"), "before refs after");
    }
}
