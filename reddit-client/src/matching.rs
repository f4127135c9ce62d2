use crate::api::RedditPostData;
use url::Url;

/// First post whose trimmed title equals the candidate's trimmed title.
pub fn find_exact_title<'a>(posts: &'a [RedditPostData], title: &str) -> Option<&'a RedditPostData> {
    let wanted = title.trim();
    posts.iter().find(|post| post.title.trim() == wanted)
}

/// First post whose title contains any of the needles, ignoring case.
pub fn find_by_keywords<'a>(
    posts: &'a [RedditPostData],
    needles: &[&str],
) -> Option<&'a RedditPostData> {
    let needles: Vec<String> = needles
        .iter()
        .map(|needle| needle.trim().to_lowercase())
        .filter(|needle| !needle.is_empty())
        .collect();
    if needles.is_empty() {
        return None;
    }

    posts.iter().find(|post| {
        let title = post.title.to_lowercase();
        needles.iter().any(|needle| title.contains(needle.as_str()))
    })
}

/// Extract the base-36 submission id from a Reddit permalink such as
/// `https://www.reddit.com/r/leasing/comments/abc123/some_title/`.
pub fn thread_id_from_url(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    let host = url.host_str()?;
    if host != "redd.it" && host != "reddit.com" && !host.ends_with(".reddit.com") {
        return None;
    }

    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    if host == "redd.it" {
        return segments.first().map(|id| id.to_string());
    }

    segments
        .iter()
        .position(|segment| *segment == "comments")
        .and_then(|index| segments.get(index + 1))
        .filter(|id| id.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|id| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(id: &str, title: &str) -> RedditPostData {
        RedditPostData {
            id: id.to_string(),
            title: title.to_string(),
            selftext: String::new(),
            author: Some("someone".to_string()),
            subreddit: "leasing".to_string(),
            url: String::new(),
            permalink: format!("/r/leasing/comments/{id}/x/"),
            created_utc: 1_709_290_000.0,
            score: 1,
            num_comments: 0,
            locked: false,
            archived: false,
            is_self: true,
        }
    }

    #[test]
    fn test_exact_title_ignores_surrounding_whitespace() {
        let posts = vec![
            post("a1", "Lease transfer fees"),
            post("b2", "  Is a $595 lease transfer fee normal? "),
        ];
        let found = find_exact_title(&posts, "Is a $595 lease transfer fee normal?").unwrap();
        assert_eq!(found.id, "b2");
        assert!(find_exact_title(&posts, "lease transfer fees").is_none());
    }

    #[test]
    fn test_keywords_match_case_insensitively() {
        let posts = vec![post("a1", "Best EV for commuting"), post("b2", "Swapping my LEASE early")];
        let found = find_by_keywords(&posts, &["lease", "transfer"]).unwrap();
        assert_eq!(found.id, "b2");
    }

    #[test]
    fn test_blank_keywords_never_match() {
        let posts = vec![post("a1", "anything")];
        assert!(find_by_keywords(&posts, &["", "  "]).is_none());
        assert!(find_by_keywords(&posts, &[]).is_none());
    }

    #[test]
    fn test_thread_id_from_url() {
        assert_eq!(
            thread_id_from_url("https://www.reddit.com/r/leasing/comments/1b2c3d/lease_transfer/"),
            Some("1b2c3d".to_string())
        );
        assert_eq!(
            thread_id_from_url("https://old.reddit.com/r/cars/comments/xyz789"),
            Some("xyz789".to_string())
        );
        assert_eq!(thread_id_from_url("https://redd.it/q1w2e3"), Some("q1w2e3".to_string()));
        assert_eq!(
            thread_id_from_url("https://reddit.com/r/cars/comments/abc123"),
            Some("abc123".to_string())
        );
        assert_eq!(thread_id_from_url("https://example.com/comments/abc"), None);
        assert_eq!(
            thread_id_from_url("https://notreddit.com/r/leasing/comments/abc123/x/"),
            None
        );
        assert_eq!(thread_id_from_url("https://www.reddit.com/r/leasing/"), None);
        assert_eq!(thread_id_from_url("not a url"), None);
    }
}
