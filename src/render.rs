//! Terminal rendering of posts

use crate::backend::{Post, Timestamp};
use chrono::{Local, TimeZone};
use colored::Colorize;

/// Shown for a post whose server timestamp is not resolved yet
pub const PENDING_LABEL: &str = "Just now";

/// Shown for a post with a missing or unreadable timestamp
pub const UNKNOWN_LABEL: &str = "Unknown time";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Humanize a timestamp in the viewer's local timezone
pub fn humanize(timestamp: &Timestamp) -> String {
    humanize_in(timestamp, &Local)
}

/// Humanize a timestamp in the given timezone
///
/// # Examples
///
/// ```
/// use blogline::backend::Timestamp;
/// use blogline::render::humanize_in;
/// use chrono::{TimeZone, Utc};
///
/// let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
/// assert_eq!(humanize_in(&Timestamp::Assigned(at), &Utc), "2024-03-01 12:30:00");
/// assert_eq!(humanize_in(&Timestamp::Pending, &Utc), "Just now");
/// ```
pub fn humanize_in<Tz>(timestamp: &Timestamp, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    match timestamp {
        Timestamp::Assigned(at) => at.with_timezone(tz).format(TIME_FORMAT).to_string(),
        Timestamp::Pending => PENDING_LABEL.to_string(),
        Timestamp::Unknown => UNKNOWN_LABEL.to_string(),
    }
}

/// Plain two-line rendering: content, then author and time
pub fn render_post(post: &Post) -> String {
    format!(
        "{}\nBy {} | {}",
        post.content,
        post.author,
        humanize(&post.timestamp)
    )
}

/// Colored rendering for the interactive client
pub fn render_post_colored(post: &Post) -> String {
    format!(
        "{}\n{} {} {} {}",
        post.content,
        "By".dimmed(),
        post.author.cyan(),
        "|".dimmed(),
        humanize(&post.timestamp).dimmed()
    )
}

/// Render a whole feed, newest first, separated by blank lines
pub fn render_feed(posts: &[Post], colored: bool) -> String {
    if posts.is_empty() {
        return "No posts yet.".to_string();
    }
    posts
        .iter()
        .map(|post| {
            if colored {
                render_post_colored(post)
            } else {
                render_post(post)
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    fn post(timestamp: Timestamp) -> Post {
        Post {
            id: "p1".to_string(),
            content: "hello".to_string(),
            author: "u@x.com".to_string(),
            timestamp,
        }
    }

    #[test]
    fn test_humanize_assigned_in_timezone() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 23, 30, 5).unwrap();
        let ts = Timestamp::Assigned(at);
        assert_eq!(humanize_in(&ts, &Utc), "2024-03-01 23:30:05");

        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        assert_eq!(humanize_in(&ts, &plus_two), "2024-03-02 01:30:05");
    }

    #[test]
    fn test_humanize_pending_and_unknown() {
        assert_eq!(humanize(&Timestamp::Pending), "Just now");
        assert_eq!(humanize(&Timestamp::Unknown), "Unknown time");
    }

    #[test]
    fn test_render_post() {
        let rendered = render_post(&post(Timestamp::Pending));
        assert_eq!(rendered, "hello\nBy u@x.com | Just now");
    }

    #[test]
    fn test_render_feed_empty() {
        assert_eq!(render_feed(&[], false), "No posts yet.");
    }

    #[test]
    fn test_render_feed_joins_posts() {
        let posts = vec![post(Timestamp::Pending), post(Timestamp::Unknown)];
        let rendered = render_feed(&posts, false);
        assert_eq!(
            rendered,
            "hello\nBy u@x.com | Just now\n\nhello\nBy u@x.com | Unknown time"
        );
    }

    #[test]
    fn test_colored_render_keeps_text() {
        colored::control::set_override(false);
        let rendered = render_post_colored(&post(Timestamp::Unknown));
        assert_eq!(rendered, "hello\nBy u@x.com | Unknown time");
        colored::control::unset_override();
    }
}
