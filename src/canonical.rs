//! Mirror-relative rewriting of upstream media URLs.
//!
//! Mirrors hand out absolute upstream URLs whose query strings carry
//! short-lived, instance-scoped tokens. To stream through the mirror the URL
//! is rewritten as `<instance>/<endpoint>?<query>` against the instance that
//! issued it.

use url::Url;

use crate::directory::Instance;

/// Endpoint used when the upstream URL has no usable path segment.
pub const DEFAULT_ENDPOINT: &str = "videoplayback";

/// Rewrite `upstream` into the proxy form served by `instance`.
///
/// Repeated query keys keep the position of their first occurrence and the
/// value of their last. Relative inputs (already canonical forms) are
/// resolved against `instance`, so applying this twice is a no-op.
pub fn canonicalize(upstream: &str, instance: &Instance) -> Result<String, url::ParseError> {
    let parsed = match Url::parse(upstream) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = Url::parse(&format!("{}/", instance.base_url()))?;
            base.join(upstream.trim_start_matches('/'))?
        }
        Err(e) => return Err(e),
    };

    let endpoint = parsed
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
        .unwrap_or(DEFAULT_ENDPOINT);

    let mut params: Vec<(String, String)> = Vec::new();
    for (key, value) in parsed.query_pairs() {
        match params.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value.into_owned(),
            None => params.push((key.into_owned(), value.into_owned())),
        }
    }

    if params.is_empty() {
        return Ok(format!("{}/{endpoint}", instance.base_url()));
    }

    let query = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .finish();

    Ok(format!("{}/{endpoint}?{query}", instance.base_url()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(url: &str) -> Instance {
        Instance::parse(url).unwrap()
    }

    #[test]
    fn rewrites_upstream_host_to_instance() {
        let m1 = instance("https://m1.example");
        let out = canonicalize(
            "https://rr3---sn-abc.googlevideo.com/videoplayback?expire=17&itag=140&sig=AB",
            &m1,
        )
        .unwrap();
        assert_eq!(
            out,
            "https://m1.example/videoplayback?expire=17&itag=140&sig=AB"
        );
    }

    #[test]
    fn repeated_key_keeps_first_position_and_last_value() {
        let m1 = instance("https://m1.example");
        let out = canonicalize("https://up.example/videoplayback?a=1&b=2&a=3", &m1).unwrap();
        assert_eq!(out, "https://m1.example/videoplayback?a=3&b=2");
    }

    #[test]
    fn idempotent_on_absolute_output() {
        let m1 = instance("https://m1.example/");
        let once = canonicalize(
            "https://up.example/videoplayback?mime=audio%2Fmp4&n=a+b&lsig=x%3D%3D",
            &m1,
        )
        .unwrap();
        let twice = canonicalize(&once, &m1).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn relative_canonical_form_is_noop() {
        let m1 = instance("https://m1.example");
        let expected = "https://m1.example/videoplayback?id=abc&itag=140";
        assert_eq!(canonicalize("/videoplayback?id=abc&itag=140", &m1).unwrap(), expected);
        assert_eq!(canonicalize("videoplayback?id=abc&itag=140", &m1).unwrap(), expected);
    }

    #[test]
    fn empty_path_falls_back_to_default_endpoint() {
        let m1 = instance("https://m1.example");
        let out = canonicalize("https://up.example/?x=1", &m1).unwrap();
        assert_eq!(out, "https://m1.example/videoplayback?x=1");
    }

    #[test]
    fn uses_the_given_instance_only() {
        let m1 = instance("https://m1.example");
        let m2 = instance("https://m2.example");
        let upstream = "https://up.example/videoplayback?token=t1";
        assert!(canonicalize(upstream, &m1).unwrap().starts_with("https://m1.example/"));
        assert!(canonicalize(upstream, &m2).unwrap().starts_with("https://m2.example/"));
    }

    #[test]
    fn no_query_has_no_question_mark() {
        let m1 = instance("https://m1.example");
        assert_eq!(
            canonicalize("https://up.example/videoplayback", &m1).unwrap(),
            "https://m1.example/videoplayback"
        );
    }
}
