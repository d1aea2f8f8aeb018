use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EntryError {
    #[error("Cannot match a citation key in entry starting with '{0}'")]
    NoKey(String),
}

/// One raw `@type{key, ...}` block from the bibliography file.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub key: String,
    pub text: String,
}

impl Entry {
    /// Parse a raw block into an entry. The block must contain a key
    /// matching the `@type{key,` opening; anything else is unrecoverable.
    pub fn parse(block: &str) -> Result<Entry, EntryError> {
        let re = Regex::new(r"@[a-z]+\{([A-Za-z0-9\-:]+),").unwrap();
        let key = re
            .captures(block)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| EntryError::NoKey(first_line(block)))?;
        Ok(Entry {
            key,
            text: block.to_string(),
        })
    }
}

fn first_line(block: &str) -> String {
    block.lines().next().unwrap_or("").trim().to_string()
}

/// Split a bibliography into raw entry blocks. Blocks are separated by
/// blank lines; blocks without an `@` (page separators, stray comments)
/// are dropped.
pub fn split_blocks(biblio: &str) -> Vec<&str> {
    biblio
        .split("\n\n")
        .filter(|block| block.contains('@'))
        .collect()
}

/// Replacement table for the usual copy-paste offenders in INSPIRE output.
const UNICODE_FIXES: &[(&str, &str)] = &[
    ("\u{a0}", " "),
    ("\u{2009}\u{2009}", " "),
    ("\u{2212}", "-"),
    ("\u{2217}", "*"),
];

/// Replace known problematic unicode characters with their ASCII
/// equivalents. Idempotent: the replacements never produce text the
/// table matches again.
pub fn replace_unicode(text: &str) -> String {
    let pattern = UNICODE_FIXES
        .iter()
        .map(|(from, _)| regex::escape(from))
        .collect::<Vec<_>>()
        .join("|");
    let re = Regex::new(&format!("({})", pattern)).unwrap();
    re.replace_all(text, |caps: &regex::Captures| {
        let found = caps.get(0).map_or("", |m| m.as_str());
        UNICODE_FIXES
            .iter()
            .find(|(from, _)| *from == found)
            .map(|(_, to)| to.to_string())
            .unwrap_or_else(|| found.to_string())
    })
    .into_owned()
}

/// Bracket the first non-ASCII character with loud markers so a human
/// editing the entry can spot it. Returns None for pure-ASCII text.
pub fn mark_unicode(text: &str) -> Option<String> {
    let re = Regex::new(r"[^\x00-\x7F]").unwrap();
    let m = re.find(text)?;
    Some(format!(
        "{}***UNICODE***{}***UNICODE***{}",
        &text[..m.start()],
        m.as_str(),
        &text[m.end()..]
    ))
}

/// Ordered (original, replacement) pairs collected while checking.
pub type Substitutions = Vec<(String, String)>;

/// Apply every substitution as a literal string replacement over the
/// whole bibliography text. Bytes outside the replaced spans are
/// preserved exactly.
pub fn apply_substitutions(biblio: &str, substitutions: &Substitutions) -> String {
    let mut result = biblio.to_string();
    for (old, new) in substitutions {
        result = result.replace(old, new);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "@article{Aad:2012tfa,\n    author = \"Aad, Georges\",\n    title = \"{Observation of a new particle}\",\n    year = \"2012\"\n}";

    #[test]
    fn parse_extracts_key() {
        let entry = Entry::parse(SAMPLE).unwrap();
        assert_eq!(entry.key, "Aad:2012tfa");
        assert_eq!(entry.text, SAMPLE);
    }

    #[test]
    fn parse_rejects_block_without_key() {
        let err = Entry::parse("@article{???}").unwrap_err();
        assert!(matches!(err, EntryError::NoKey(_)));
    }

    #[test]
    fn split_drops_blocks_without_at() {
        let biblio = format!("%% ===============\n\n{}\n\n%% ===============", SAMPLE);
        let blocks = split_blocks(&biblio);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0], SAMPLE);
    }

    #[test]
    fn replace_unicode_fixes_minus_and_star() {
        assert_eq!(replace_unicode("hello"), "hello");
        assert_eq!(replace_unicode("H\u{2212}>yy"), "H->yy");
        assert_eq!(replace_unicode("H\u{2212}\u{2212}>yy"), "H-->yy");
        assert_eq!(replace_unicode("a\u{2217}b\u{a0}c"), "a*b c");
    }

    #[test]
    fn replace_unicode_is_idempotent() {
        let input = "p\u{a0}T\u{2009}\u{2009}spectrum \u{2212}1 \u{2217}";
        let once = replace_unicode(input);
        let twice = replace_unicode(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn mark_unicode_brackets_first_offender() {
        let marked = mark_unicode("x\u{2212}y\u{2212}z").unwrap();
        assert_eq!(marked, "x***UNICODE***\u{2212}***UNICODE***y\u{2212}z");
        assert!(mark_unicode("plain ascii").is_none());
    }

    #[test]
    fn substitutions_preserve_untouched_bytes() {
        let biblio = format!("prefix text\n\n{}\n\nsuffix text", SAMPLE);
        let fixed_entry = SAMPLE.replace("Georges", "G.");
        let subs = vec![(SAMPLE.to_string(), fixed_entry.clone())];
        let result = apply_substitutions(&biblio, &subs);
        assert_eq!(
            result,
            format!("prefix text\n\n{}\n\nsuffix text", fixed_entry)
        );
        assert!(result.starts_with("prefix text\n\n"));
        assert!(result.ends_with("\n\nsuffix text"));
    }

    #[test]
    fn empty_substitutions_leave_text_unchanged() {
        let biblio = "anything at all";
        assert_eq!(apply_substitutions(biblio, &Vec::new()), biblio);
    }
}
