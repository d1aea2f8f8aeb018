use crate::blog;
use chrono::Local;
use reqwest::blocking::Client;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

/// Page separator appended after every fetched page, as a visual marker
/// in the accumulated file.
const PAGE_SEPARATOR: &str = "%% ===============\n";

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Cannot connect to {url}, code: {code}")]
    Http { code: u16, url: String },

    #[error("Invalid base url '{0}': {1}")]
    InvalidBaseUrl(String, url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Number of entries in a chunk of raw BibTeX text.
fn count_entries(text: &str) -> usize {
    text.matches('@').count()
}

/// Build the query URL for one page of literature results. The query
/// string is passed through untouched so callers can supply their own
/// encoding, as the search syntax expects.
fn page_url(baseurl: &str, query: &str, size: usize, page: usize) -> Result<String, FetchError> {
    Url::parse(baseurl).map_err(|e| FetchError::InvalidBaseUrl(baseurl.to_string(), e))?;
    Ok(format!(
        "{}literature?q={}&format=bibtex&size={}&page={}",
        baseurl, query, size, page
    ))
}

/// Accumulate pages until one comes back with zero entries. The page
/// fetcher is injected so the pagination logic stays independent of the
/// HTTP client.
fn accumulate_pages<F>(mut fetch_page: F) -> Result<String, FetchError>
where
    F: FnMut(usize) -> Result<String, FetchError>,
{
    let mut bibtex = String::new();
    let mut page = 1;
    loop {
        let content = fetch_page(page)?;
        if count_entries(&content) == 0 {
            break;
        }
        bibtex.push_str(&content);
        bibtex.push_str(PAGE_SEPARATOR);
        blog!("Fetching", "{} entries so far...", count_entries(&bibtex));
        page += 1;
    }
    Ok(bibtex)
}

/// Fetch the full result set for a query, page by page.
pub fn fetch_bibliography(
    baseurl: &str,
    query: &str,
    page_size: usize,
) -> Result<String, FetchError> {
    let client = Client::new();
    accumulate_pages(|page| {
        let url = page_url(baseurl, query, page_size, page)?;
        let response = client.get(&url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                code: status.as_u16(),
                url,
            });
        }
        Ok(response.text()?)
    })
}

/// Fetch and write the dated bibliography file, returning its path.
pub fn fetch(baseurl: &str, query: &str, page_size: usize) -> Result<PathBuf, FetchError> {
    let bibtex = fetch_bibliography(baseurl, query, page_size)?;
    blog!("Fetched", "{} entries found", count_entries(&bibtex));
    let filename = PathBuf::from(format!("bibtex_{}.bib", Local::now().format("%Y-%m-%d")));
    fs::write(&filename, &bibtex)?;
    Ok(filename)
}
