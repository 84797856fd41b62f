use chrono::{DateTime, Utc};

use crate::config::{SelectionConfig, StalePolicy};
use crate::types::Post;

#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub candidates: Vec<Post>,
    /// Posts inside the window before truncation.
    pub recent_count: usize,
    /// True when nothing was recent and the stale policy decided the result.
    pub fell_back: bool,
}

/// Posts with a timestamp at or after `now - window`. Untimestamped posts never pass.
pub fn filter_recent(posts: &[Post], now: DateTime<Utc>, window: std::time::Duration) -> Vec<Post> {
    let window = chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::max_value());
    let cutoff = now.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC);
    posts
        .iter()
        .filter(|p| matches!(p.published_at, Some(ts) if ts >= cutoff))
        .cloned()
        .collect()
}

/// Newest first; posts without a timestamp go last. Stable for equal keys.
pub fn sort_newest_first(posts: &mut [Post]) {
    // `None < Some(_)`, so a descending comparison already places them last.
    posts.sort_by(|a, b| b.published_at.cmp(&a.published_at));
}

pub fn select_candidates(posts: &[Post], now: DateTime<Utc>, config: &SelectionConfig) -> Selection {
    let recent = filter_recent(posts, now, config.window);
    let recent_count = recent.len();

    let (mut candidates, fell_back) = if !recent.is_empty() {
        (recent, false)
    } else {
        match config.stale_policy {
            StalePolicy::FailOpen => (posts.to_vec(), true),
            StalePolicy::FailClosed => (Vec::new(), true),
        }
    };

    sort_newest_first(&mut candidates);
    candidates.truncate(config.max_candidates);

    Selection {
        candidates,
        recent_count,
        fell_back,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn post(title: &str, published_at: Option<DateTime<Utc>>) -> Post {
        Post {
            title: title.to_string(),
            url: format!("https://example.com/{}", title),
            author: String::new(),
            published_at,
            content: String::new(),
            word_count: 0,
            feed_title: "Example".to_string(),
            feed_url: "https://example.com/feed".to_string(),
            category: String::new(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn titles(posts: &[Post]) -> Vec<&str> {
        posts.iter().map(|p| p.title.as_str()).collect()
    }

    #[test]
    fn test_filter_recent_window() {
        let now = now();
        let posts = vec![
            post("1h", Some(now - Duration::hours(1))),
            post("40h", Some(now - Duration::hours(40))),
            post("50h", Some(now - Duration::hours(50))),
            post("none", None),
        ];
        let recent = filter_recent(&posts, now, std::time::Duration::from_secs(48 * 3600));
        assert_eq!(titles(&recent), vec!["1h", "40h"]);
    }

    #[test]
    fn test_fallback_returns_everything_newest_first() {
        let now = now();
        let posts = vec![
            post("none", None),
            post("60h", Some(now - Duration::hours(60))),
            post("100h", Some(now - Duration::hours(100))),
            post("50h", Some(now - Duration::hours(50))),
        ];
        let selection = select_candidates(&posts, now, &SelectionConfig::default());
        assert!(selection.fell_back);
        assert_eq!(selection.recent_count, 0);
        assert_eq!(titles(&selection.candidates), vec!["50h", "60h", "100h", "none"]);
    }

    #[test]
    fn test_fail_closed_selects_nothing() {
        let now = now();
        let posts = vec![post("old", Some(now - Duration::hours(100))), post("none", None)];
        let config = SelectionConfig {
            stale_policy: StalePolicy::FailClosed,
            ..SelectionConfig::default()
        };
        let selection = select_candidates(&posts, now, &config);
        assert!(selection.fell_back);
        assert!(selection.candidates.is_empty());
    }

    #[test]
    fn test_recent_selection_sorted_and_truncated() {
        let now = now();
        let posts = vec![
            post("3h", Some(now - Duration::hours(3))),
            post("1h", Some(now - Duration::hours(1))),
            post("2h", Some(now - Duration::hours(2))),
            post("none", None),
        ];
        let config = SelectionConfig {
            max_candidates: 2,
            ..SelectionConfig::default()
        };
        let selection = select_candidates(&posts, now, &config);
        assert!(!selection.fell_back);
        assert_eq!(selection.recent_count, 3);
        assert_eq!(titles(&selection.candidates), vec!["1h", "2h"]);
    }
}
