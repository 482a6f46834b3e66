//! Redirect history walker.
//!
//! Follows a redirect chain one hop at a time, with auto-redirecting forced
//! off, and accumulates every hop's record. Redirect classification is
//! strictly status 300..=399, independent of method. The walk ends on a
//! non-redirect status, a missing Location header, or a Location that
//! cannot be resolved into a URL; the last appended record is terminal
//! either way.
//!
//! One client is resolved for the whole walk, so cookies observed at hop k
//! are in the jar for hop k+1. Jar semantics beyond that belong to the
//! engine.

use tracing::debug;

use super::single::Dispatcher;
use crate::api::models::{RequestDescriptor, ResponseRecord};
use url::Url;

pub async fn walk(
    dispatcher: &Dispatcher,
    descriptor: &mut RequestDescriptor,
) -> Vec<ResponseRecord> {
    // every hop must surface its own 3xx instead of auto-following
    descriptor.follow_redirects = false;

    let resolved = match dispatcher.resolve_client(descriptor) {
        Ok(resolved) => resolved,
        Err(error) => {
            dispatcher.metrics().engine_error();
            return vec![ResponseRecord::error(
                descriptor.session().map(str::to_owned),
                error,
            )];
        }
    };

    dispatcher.metrics().history_walk();

    let mut history = Vec::new();
    loop {
        let record = dispatcher.dispatch_on(&resolved, descriptor).await;
        let is_redirect = (300..=399).contains(&record.status);
        let location = record.header("Location").map(str::to_owned);
        history.push(record);

        if !is_redirect {
            break;
        }
        let Some(location) = location else {
            break;
        };
        match merge_relative(&descriptor.url, &location) {
            Ok(next) => {
                debug!(from = %descriptor.url, to = %next, "walking redirect");
                descriptor.url = next;
            }
            Err(error) => {
                debug!(location, error = %error, "unresolvable redirect ends walk");
                break;
            }
        }
    }

    history
}

/// Resolve a Location header against the URL it was served from.
///
/// A Location carrying both scheme and host is used unchanged; otherwise
/// the missing parts are inherited from the source URL.
pub fn merge_relative(source: &str, location: &str) -> Result<String, url::ParseError> {
    match Url::parse(location) {
        Ok(parsed) if parsed.has_host() && !parsed.scheme().is_empty() => {
            Ok(parsed.into())
        }
        Ok(_) | Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = Url::parse(source)?;
            Ok(base.join(location)?.into())
        }
        Err(error) => Err(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_path_inherits_scheme_and_host() {
        assert_eq!(
            merge_relative("https://a.com/x", "/y").unwrap(),
            "https://a.com/y"
        );
    }

    #[test]
    fn absolute_location_is_unchanged() {
        assert_eq!(
            merge_relative("https://a.com/x", "https://b.com/z").unwrap(),
            "https://b.com/z"
        );
    }

    #[test]
    fn schemeless_location_inherits_scheme() {
        assert_eq!(
            merge_relative("https://a.com/x", "//b.com/z").unwrap(),
            "https://b.com/z"
        );
    }

    #[test]
    fn bare_path_resolves_against_current_directory() {
        assert_eq!(
            merge_relative("https://a.com/dir/page", "other").unwrap(),
            "https://a.com/dir/other"
        );
    }

    #[test]
    fn query_only_location_is_kept() {
        assert_eq!(
            merge_relative("https://a.com/x?p=1", "/y?p=2").unwrap(),
            "https://a.com/y?p=2"
        );
    }

    #[test]
    fn unparsable_source_is_an_error() {
        assert!(merge_relative("not a url", "/y").is_err());
    }
}
