use serde_json::Value;
use tracing::warn;

use super::api::ApiPage;
use crate::error::ProbeError;

/// Pages collected by one probe
#[derive(Debug, Clone, PartialEq)]
pub struct PageSet {
    pub bodies: Vec<Value>,
    /// False when a later page failed or the page cap was hit
    pub complete: bool,
}

/// Follow `NextToken` until exhausted.
///
/// A failure on the first page is returned as an error. A failure on a later
/// page keeps what was already fetched and marks the set incomplete.
pub fn collect_pages<F>(mut fetch: F, max_pages: usize, context: &str) -> Result<PageSet, ProbeError>
where
    F: FnMut(Option<&str>) -> Result<ApiPage, ProbeError>,
{
    let mut bodies = Vec::new();
    let mut token: Option<String> = None;

    loop {
        let page = match fetch(token.as_deref()) {
            Ok(page) => page,
            Err(e) if bodies.is_empty() => return Err(e),
            Err(e) => {
                warn!(
                    "{}: page {} failed, keeping {} page(s): {}",
                    context,
                    bodies.len() + 1,
                    bodies.len(),
                    e
                );
                return Ok(PageSet {
                    bodies,
                    complete: false,
                });
            }
        };

        bodies.push(page.body);

        match page.next_token {
            None => {
                return Ok(PageSet {
                    bodies,
                    complete: true,
                });
            }
            Some(next) if token.as_deref() == Some(next.as_str()) => {
                warn!("{}: provider repeated pagination token, stopping", context);
                return Ok(PageSet {
                    bodies,
                    complete: false,
                });
            }
            Some(_) if bodies.len() >= max_pages => {
                warn!("{}: stopped after {} pages", context, max_pages);
                return Ok(PageSet {
                    bodies,
                    complete: false,
                });
            }
            Some(next) => token = Some(next),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(n: u32, next: Option<&str>) -> ApiPage {
        ApiPage {
            body: json!({ "n": n }),
            next_token: next.map(|t| t.to_string()),
        }
    }

    #[test]
    fn test_follows_tokens_until_exhausted() {
        let mut seen_tokens = Vec::new();
        let result = collect_pages(
            |token| {
                seen_tokens.push(token.map(|t| t.to_string()));
                Ok(match token {
                    None => page(1, Some("t2")),
                    Some("t2") => page(2, Some("t3")),
                    _ => page(3, None),
                })
            },
            10,
            "test",
        )
        .unwrap();

        assert!(result.complete);
        assert_eq!(result.bodies.len(), 3);
        assert_eq!(
            seen_tokens,
            vec![None, Some("t2".to_string()), Some("t3".to_string())]
        );
    }

    #[test]
    fn test_first_page_failure_is_error() {
        let result = collect_pages(
            |_| Err(ProbeError::Throttled("rate exceeded".to_string())),
            10,
            "test",
        );
        assert_eq!(
            result.unwrap_err(),
            ProbeError::Throttled("rate exceeded".to_string())
        );
    }

    #[test]
    fn test_later_page_failure_keeps_partial() {
        let result = collect_pages(
            |token| match token {
                None => Ok(page(1, Some("t2"))),
                _ => Err(ProbeError::Timeout("read timeout".to_string())),
            },
            10,
            "test",
        )
        .unwrap();

        assert!(!result.complete);
        assert_eq!(result.bodies, vec![json!({"n": 1})]);
    }

    #[test]
    fn test_page_cap() {
        let result = collect_pages(|_| Ok(page(1, Some(&uuid_like()))), 3, "test").unwrap();
        assert!(!result.complete);
        assert_eq!(result.bodies.len(), 3);
    }

    #[test]
    fn test_repeated_token_stops() {
        let result = collect_pages(|_| Ok(page(1, Some("same"))), 10, "test").unwrap();
        assert!(!result.complete);
        assert_eq!(result.bodies.len(), 2);
    }

    fn uuid_like() -> String {
        uuid::Uuid::new_v4().to_string()
    }
}
