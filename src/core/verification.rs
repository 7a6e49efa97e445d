use reqwest::Url;

/// Query parameter the confirmation link appends to the redirect URL.
pub const VERIFIED_PARAM: &str = "verified";

/// Detect a completed email verification in the URL the app was opened
/// with. Returns the URL with the marker removed so it is handled once.
pub fn detect_verification(url: &str) -> Option<String> {
    let mut url = Url::parse(url).ok()?;
    let mut verified = false;
    let remaining: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, value)| {
            if key == VERIFIED_PARAM {
                verified |= !matches!(&**value, "false" | "0");
                false
            } else {
                true
            }
        })
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    if !verified {
        return None;
    }
    if remaining.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(remaining);
    }
    Some(url.to_string())
}
