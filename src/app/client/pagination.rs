//! Pagination cursor extraction from `Link` response headers

use reqwest::header::{HeaderMap, LINK};
use url::Url;

use crate::app::models::PageCursor;

/// Base used to resolve relative link targets
const RELATIVE_BASE: &str = "http://localhost/";

/// Cursor of the next page, read from the response's `Link` headers
///
/// Returns `None` when no `rel="next"` entry carries a valid `page` number,
/// which ends enumeration.
pub fn next_page(headers: &HeaderMap) -> Option<PageCursor> {
    headers
        .get_all(LINK)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(parse_next_link)
}

/// Parse one `Link` header value, e.g.
/// `<https://host/artifacts?page=2&per_page=100>; rel="next", <...>; rel="last"`
pub fn parse_next_link(value: &str) -> Option<PageCursor> {
    value.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts.next()?.trim();

        if !parts.any(is_next_relation) {
            return None;
        }

        let target = target.strip_prefix('<')?.strip_suffix('>')?;
        page_from_target(target)
    })
}

fn is_next_relation(param: &str) -> bool {
    let Some((key, value)) = param.split_once('=') else {
        return false;
    };
    key.trim().eq_ignore_ascii_case("rel")
        && value
            .trim()
            .trim_matches('"')
            .split_whitespace()
            .any(|rel| rel.eq_ignore_ascii_case("next"))
}

fn page_from_target(target: &str) -> Option<PageCursor> {
    let url = Url::parse(target)
        .or_else(|_| Url::parse(RELATIVE_BASE).and_then(|base| base.join(target)))
        .ok()?;

    let (_, page) = url.query_pairs().find(|(key, _)| key == "page")?;
    PageCursor::new(page.parse().ok()?)
}
