use crate::cache::FixCache;
use crate::editor::Fixer;
use crate::entry::{apply_substitutions, mark_unicode, replace_unicode, split_blocks, Entry, Substitutions};
use crate::latex::{TexToolchain, Validation, Validator};
use crate::{blog, blog_done, blog_warning, blog_working};
use anyhow::{anyhow, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::thread;

pub struct CheckOptions {
    pub fix_unicode: bool,
    pub use_bibtex: bool,
    pub nthreads: usize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Validate one entry, repairing it until it compiles. Returns the
/// (original, accepted) substitution when the accepted text differs.
///
/// The cache is probed on the exact original text first; a hit resolves
/// the entry without invoking the toolchain at all.
fn process_entry(
    entry: &Entry,
    position: usize,
    total: usize,
    fix_unicode: bool,
    validator: &dyn Validator,
    fixer: &dyn Fixer,
    cache: &Mutex<FixCache>,
    console: &Mutex<()>,
) -> Result<Option<(String, String)>> {
    let original = entry.text.clone();

    if let Some(accepted) = lock(cache).lookup(&original)? {
        let _console = lock(console);
        blog!("Cached", "{} resolved from a previous run", entry.key);
        return Ok(if accepted != original {
            Some((original, accepted))
        } else {
            None
        });
    }

    let mut current = entry.clone();
    if fix_unicode {
        let replaced = replace_unicode(&current.text);
        if replaced != current.text {
            let _console = lock(console);
            blog!("Unicode", "normalized {}", current.key);
            current.text = replaced;
        }
    }

    loop {
        {
            let _console = lock(console);
            blog_working!("Checking", "key {} ({}/{})", current.key, position, total);
        }
        match validator.validate(&current)? {
            Validation::Pass => break,
            Validation::Fail(report) => {
                let _console = lock(console);
                blog_warning!("Failed", "{}", current.key);
                println!("{}", report);
                if let Some(marked) = mark_unicode(&current.text) {
                    println!("the entry contains non-ascii characters:\n{}", marked);
                }
                let edited = fixer.fix(&current.text, &report)?;
                current = Entry::parse(&edited)?;
            }
        }
    }

    lock(cache).store(&current.key, &original, &current.text)?;
    Ok(if current.text != original {
        Some((original, current.text))
    } else {
        None
    })
}

/// Walk every entry through validation, spreading the work over
/// `nthreads` workers that pull from a shared index. Substitutions
/// collected before a failure are returned alongside the error so the
/// caller can still write them out.
fn run_entries<F>(
    entries: &[Entry],
    nthreads: usize,
    fix_unicode: bool,
    cache: &Mutex<FixCache>,
    fixer: &(dyn Fixer + Sync),
    make_validator: F,
) -> (Substitutions, Result<()>)
where
    F: Fn(usize) -> Result<Box<dyn Validator>> + Sync,
{
    let console = Mutex::new(());
    let substitutions = Mutex::new(Substitutions::new());
    let next = AtomicUsize::new(0);
    let total = entries.len();

    let worker = |id: usize| -> Result<()> {
        let validator = make_validator(id)?;
        loop {
            let index = next.fetch_add(1, Ordering::SeqCst);
            if index >= total {
                break;
            }
            let substitution = process_entry(
                &entries[index],
                index + 1,
                total,
                fix_unicode,
                validator.as_ref(),
                fixer,
                cache,
                &console,
            )?;
            if let Some(substitution) = substitution {
                lock(&substitutions).push(substitution);
            }
        }
        Ok(())
    };

    let outcome = if nthreads <= 1 {
        worker(0)
    } else {
        thread::scope(|scope| {
            let worker = &worker;
            let handles: Vec<_> = (0..nthreads)
                .map(|id| scope.spawn(move || worker(id)))
                .collect();
            let mut outcome = Ok(());
            for handle in handles {
                let joined = match handle.join() {
                    Ok(result) => result,
                    Err(_) => Err(anyhow!("worker thread panicked")),
                };
                if outcome.is_ok() {
                    outcome = joined;
                }
            }
            outcome
        })
    };

    (substitutions.into_inner().unwrap_or_else(|p| p.into_inner()), outcome)
}

fn output_path(bibtex: &Path) -> PathBuf {
    let stem = bibtex
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "bibliography".to_string());
    bibtex.with_file_name(format!("{}_new.bib", stem))
}

/// Check every entry of a bibliography file and write the repaired copy
/// next to it as `<stem>_new.bib`.
pub fn check(
    bibtex: &Path,
    options: &CheckOptions,
    cache: FixCache,
    fixer: &(dyn Fixer + Sync),
) -> Result<()> {
    let biblio = fs::read_to_string(bibtex)?;
    let entries = split_blocks(&biblio)
        .into_iter()
        .map(Entry::parse)
        .collect::<Result<Vec<_>, _>>()?;
    blog!("Checking", "{} entries in {}", entries.len(), bibtex.display());

    let nthreads = options.nthreads.max(1);
    let use_bibtex = options.use_bibtex;
    let cache = Mutex::new(cache);
    let (substitutions, outcome) = run_entries(
        &entries,
        nthreads,
        options.fix_unicode,
        &cache,
        fixer,
        |id| {
            let workdir = env::temp_dir().join(format!("bibcheck_{}_{}", process::id(), id));
            let toolchain = TexToolchain::new(workdir, use_bibtex)?;
            Ok(Box::new(toolchain) as Box<dyn Validator>)
        },
    );

    // Repairs accepted before an abort are not lost: the output file is
    // written in every case.
    let repaired = apply_substitutions(&biblio, &substitutions);
    let output = output_path(bibtex);
    fs::write(&output, &repaired)?;
    blog_done!(
        "Done",
        "{} fixes applied, output written in {}",
        substitutions.len(),
        output.display()
    );
    outcome
}
