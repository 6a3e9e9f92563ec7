//! Text renderings of posts used inside prompts

use chrono::{TimeZone, Utc};

use crate::models::Post;

/// Image description produced by an `ImageDescriber`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDescription {
    pub title: String,
    pub description: String,
}

/// `Jun 1, 12:00 PM` style timestamp (UTC)
pub fn format_timestamp(unix_secs: i64) -> String {
    match Utc.timestamp_opt(unix_secs, 0).single() {
        Some(dt) => dt.format("%b %-d, %I:%M %p").to_string(),
        None => unix_secs.to_string(),
    }
}

fn photo_urls(post: &Post) -> String {
    post.photos
        .iter()
        .map(|p| p.url.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// The post being answered
pub fn format_post(post: &Post) -> String {
    let mut formatted = format!(
        "  ID: {}\n  From: {} (@{})\n  Text: {}\n  ",
        post.id, post.name, post.username, post.text
    );
    if !post.photos.is_empty() {
        formatted.push_str(&format!("  Photos: {}", photo_urls(post)));
    }
    formatted
}

/// The thread as a timestamped, attributed transcript
pub fn format_conversation(thread: &[Post]) -> String {
    thread
        .iter()
        .map(|post| {
            let mut entry = format!(
                "@{} ({}):\n{}",
                post.username,
                format_timestamp(post.timestamp),
                post.text
            );
            if !post.photos.is_empty() {
                entry.push_str(&format!("\nPhoto: {}", photo_urls(post)));
            }
            entry
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Recent posts of one account, oldest first
pub fn format_posts(posts: &[Post]) -> String {
    let mut sorted: Vec<&Post> = posts.iter().collect();
    sorted.sort_by_key(|p| p.timestamp);
    sorted
        .iter()
        .map(|p| format!("ID: {}\nFrom: {} (@{})\nText: {}", p.id, p.name, p.username, p.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn format_image_descriptions(descriptions: &[ImageDescription]) -> String {
    if descriptions.is_empty() {
        return String::new();
    }
    let body = descriptions
        .iter()
        .enumerate()
        .map(|(i, d)| format!("Image {}: Title: {}\nDescription: {}", i + 1, d.title, d.description))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("\nImages in Tweet:\n{}", body)
}
