//! Content transcoder: rewrites the site's rich markup into the reduced
//! dialect the chat platform can render.
//!
//! The pipeline is a chain of order-sensitive text rewrites over the
//! document description; later rules assume earlier rules already ran.
//! It is pure and deterministic and has no error channel: malformed markup
//! degrades gracefully (drop, leave as-is, or best-effort substitution).
//!
//! Destination markup coverage:
//! - Emphasis, links, quotes, lists, code: supported or left as-is
//! - Headers: unsupported, rewritten to bold/underline
//! - Images: unsupported inline, first one promoted to the document image,
//!   the rest removed
//! - `==highlight==`: rewritten to bold
//! - `{{icon}}` tokens: removed
//! - `{iframe}(url)`: video frames become links, other frames are dropped

use regex::{Captures, Regex};
use tracing::debug;

use crate::contract::{Image, PostDocument};

/// Maximum character length of a document body on the destination platform.
pub const DESCRIPTION_LIMIT: usize = 2048;

/// Stateless rewrite engine; regexes are compiled once at construction.
pub struct Transcoder {
    base_url: String,
    header: Regex,
    image: Regex,
    nested_image_link: Regex,
    empty_link: Regex,
    empty_link_label: Regex,
    icon: Regex,
    iframe: Regex,
    video_url: Regex,
}

impl Transcoder {
    /// `base_url` is the site origin used to absolutize path-relative
    /// author icon URLs, e.g. `https://media.example.org`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            header: Regex::new(r"(#+)\s*([^\r\n]+)(?:\r\n|\r|\n|$)").expect("header pattern"),
            image: Regex::new(r"!\[[^\]]*\]\(([^)]*)\)").expect("image pattern"),
            nested_image_link: Regex::new(r"\[!\[([^\]]*)\]\([^)]*\)\]\(([^)]*)\)")
                .expect("nested image pattern"),
            empty_link: Regex::new(r"\[[^\]]*\]\(\s*\)").expect("empty link pattern"),
            empty_link_label: Regex::new(r"\[\s*\]\(([^)]*)\)").expect("empty label pattern"),
            icon: Regex::new(r"\{\{[^}]+\}\}").expect("icon pattern"),
            iframe: Regex::new(r"\{iframe\}\(([^)]*)\)").expect("iframe pattern"),
            video_url: Regex::new(r"https?://(?:www\.)?youtu(?:be\.com/watch\?v=|\.be/)([\w\-]{1,11})")
                .expect("video url pattern"),
        }
    }

    /// Transcode a document for the destination platform.
    ///
    /// Operates primarily on the description; additionally promotes the
    /// first inline image to the document image, absolutizes the author
    /// icon URL, trims every field and enforces [`DESCRIPTION_LIMIT`].
    pub fn transcode(&self, mut doc: PostDocument) -> PostDocument {
        let mut description = doc.description.unwrap_or_default();

        description = self.rewrite_headers(description);

        // The first image reference, including one nested inside a link,
        // becomes the document image.
        if let Some(caps) = self.image.captures(&description) {
            debug!(url = &caps[1], "Promoting first inline image to document image");
            doc.image = Some(Image {
                url: caps[1].to_string(),
            });
        }

        // Unwrap image-as-link into a plain link labelled by the alt text.
        description = self
            .nested_image_link
            .replace_all(&description, |caps: &Captures| {
                format!("[{}]({})", &caps[1], &caps[2])
            })
            .into_owned();

        // Remaining inline images are unsupported on the destination.
        description = self.image.replace_all(&description, "").into_owned();

        // Remove links with an empty target, then rewrite links with an
        // empty label to their bare target URL.
        description = self.empty_link.replace_all(&description, "").into_owned();
        description = self
            .empty_link_label
            .replace_all(&description, |caps: &Captures| caps[1].to_string())
            .into_owned();

        description = rewrite_highlights(&description);

        description = self.icon.replace_all(&description, "").into_owned();

        description = self.rewrite_iframes(description);

        // The feed stores author icons path-relative to the site origin.
        if let Some(author) = doc.author.as_mut() {
            author.icon_url = format!("{}{}", self.base_url, author.icon_url);
        }

        let mut description = description.trim().to_string();
        doc.title = doc.title.trim().to_string();
        doc.url = doc.url.trim().to_string();
        if let Some(author) = doc.author.as_mut() {
            author.name = author.name.trim().to_string();
            author.url = author.url.trim().to_string();
            author.icon_url = author.icon_url.trim().to_string();
        }
        if let Some(footer) = doc.footer.as_mut() {
            footer.text = footer.text.trim().to_string();
        }
        if let Some(image) = doc.image.as_mut() {
            image.url = image.url.trim().to_string();
        }

        if description.chars().count() > DESCRIPTION_LIMIT {
            let suffix = format!("...\n\n[Read more]({})", doc.url);
            let keep = DESCRIPTION_LIMIT.saturating_sub(suffix.chars().count());
            debug!(
                length = description.chars().count(),
                keep, "Truncating over-long description"
            );
            description = description.chars().take(keep).collect::<String>() + &suffix;
        }

        doc.description = Some(description);
        doc
    }

    /// Heading markers are unsupported on the destination:
    /// `# H1` becomes `**__H1__**`, deeper levels become `__Hn__`.
    ///
    /// Explicit find-transform-rescan loop: each replacement shifts
    /// subsequent offsets, so the text is re-scanned from the start until
    /// no heading marker remains.
    fn rewrite_headers(&self, mut description: String) -> String {
        loop {
            let (range, replacement) = match self.header.captures(&description) {
                None => break,
                Some(caps) => {
                    let depth = caps[1].len();
                    let text = &caps[2];
                    let replacement = if depth == 1 {
                        format!("**__{}__**\n", text)
                    } else {
                        format!("__{}__\n", text)
                    };
                    (caps.get(0).expect("whole match").range(), replacement)
                }
            };
            description.replace_range(range, &replacement);
        }
        description
    }

    /// Embedded frames cannot be rendered: video frames become a `[Video]`
    /// link, everything else (maps and the like) is dropped.
    fn rewrite_iframes(&self, mut description: String) -> String {
        loop {
            let (range, replacement) = match self.iframe.captures(&description) {
                None => break,
                Some(caps) => {
                    let token = caps.get(0).expect("whole match");
                    let url = &caps[1];
                    let replacement = if url.is_empty() {
                        String::new()
                    } else if let Some(video) = self.video_url.find(token.as_str()) {
                        format!("[Video]({})", video.as_str())
                    } else {
                        debug!(url, "Dropping non-video embedded frame");
                        String::new()
                    };
                    (token.range(), replacement)
                }
            };
            description.replace_range(range, &replacement);
        }
        description
    }
}

/// Rewrite `==text==` highlight spans to bold `**text**`.
///
/// A plain regex cannot exclude `=` used for other purposes, so this is a
/// single left-to-right scan with two states: outside any span, or awaiting
/// the close of the most recently opened one. Spans do not nest. Unmatched
/// opening delimiters are left untouched, as is a closing pair that would
/// overlap the opening pair (`====`).
fn rewrite_highlights(description: &str) -> String {
    let mut chars: Vec<char> = description.chars().collect();
    let mut open: Option<usize> = None;
    let mut last = '\0';
    let mut i = 0;
    while i < chars.len() {
        let cur = chars[i];
        if cur == '=' && last == '=' {
            match open {
                None => open = Some(i - 1),
                // Delimiters are the same length as the bold markers, so
                // the span is rewritten in place.
                Some(start) if i - 1 >= start + 2 => {
                    chars[start] = '*';
                    chars[start + 1] = '*';
                    chars[i - 1] = '*';
                    chars[i] = '*';
                    open = None;
                    last = '\0';
                    i += 1;
                    continue;
                }
                Some(_) => {}
            }
        }
        last = cur;
        i += 1;
    }
    chars.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{Author, Footer};

    fn transcoder() -> Transcoder {
        Transcoder::new("https://media.example.org")
    }

    fn doc_with_description(description: &str) -> PostDocument {
        PostDocument {
            title: "Title".to_string(),
            description: Some(description.to_string()),
            url: "https://media.example.org/news/1".to_string(),
            ..Default::default()
        }
    }

    fn transcoded_description(description: &str) -> String {
        transcoder()
            .transcode(doc_with_description(description))
            .description
            .unwrap()
    }

    #[test]
    fn depth_one_heading_becomes_bold_underline() {
        assert_eq!(
            transcoded_description("# Big News\nbody"),
            "**__Big News__**\nbody"
        );
    }

    #[test]
    fn deeper_headings_become_underline() {
        assert_eq!(transcoded_description("## Sub\nbody"), "__Sub__\nbody");
        assert_eq!(transcoded_description("#### Deep\nbody"), "__Deep__\nbody");
    }

    #[test]
    fn multiple_headings_are_all_rewritten() {
        assert_eq!(
            transcoded_description("# A\ntext\n## B\nmore"),
            "**__A__**\ntext\n__B__\nmore"
        );
    }

    #[test]
    fn heading_at_end_of_text_without_newline() {
        assert_eq!(transcoded_description("## Last"), "__Last__");
    }

    #[test]
    fn header_rewrite_is_idempotent_on_transcoded_text() {
        let once = transcoded_description("# A\n## B\nbody");
        let twice = transcoded_description(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn first_image_is_promoted_and_stripped() {
        let out = transcoder().transcode(doc_with_description("![x](http://img)rest"));
        assert_eq!(out.image.unwrap().url, "http://img");
        assert_eq!(out.description.unwrap(), "rest");
    }

    #[test]
    fn later_images_are_removed_but_not_promoted() {
        let out =
            transcoder().transcode(doc_with_description("![a](http://one) and ![b](http://two)"));
        assert_eq!(out.image.unwrap().url, "http://one");
        assert_eq!(out.description.unwrap(), "and");
    }

    #[test]
    fn nested_image_link_unwraps_to_plain_link() {
        let out = transcoder()
            .transcode(doc_with_description("[![alt](http://img)](http://target) tail"));
        // The inner image is still the first image reference in the text.
        assert_eq!(out.image.unwrap().url, "http://img");
        assert_eq!(out.description.unwrap(), "[alt](http://target) tail");
    }

    #[test]
    fn empty_target_links_are_removed() {
        assert_eq!(transcoded_description("a [label]( ) b"), "a  b");
    }

    #[test]
    fn empty_label_links_become_bare_urls() {
        assert_eq!(
            transcoded_description("see [](http://x.org) here"),
            "see http://x.org here"
        );
    }

    #[test]
    fn highlight_pair_becomes_bold() {
        assert_eq!(transcoded_description("a ==bold== b"), "a **bold** b");
    }

    #[test]
    fn unclosed_highlight_is_left_untouched() {
        assert_eq!(transcoded_description("a ==unclosed"), "a ==unclosed");
    }

    #[test]
    fn adjacent_highlight_spans_do_not_merge() {
        assert_eq!(transcoded_description("==a== ==b=="), "**a** **b**");
    }

    #[test]
    fn overlapping_close_does_not_terminate_a_span() {
        // The second pair shares a character with the first and cannot
        // close it.
        assert_eq!(rewrite_highlights("==="), "===");
        assert_eq!(rewrite_highlights("====a=="), "****a==");
    }

    #[test]
    fn icons_are_removed() {
        assert_eq!(transcoded_description("hi {{smile}} there"), "hi  there");
    }

    #[test]
    fn video_iframe_becomes_video_link() {
        assert_eq!(
            transcoded_description("{iframe}(https://www.youtube.com/watch?v=dQw4w9WgXcQ)"),
            "[Video](https://www.youtube.com/watch?v=dQw4w9WgXcQ)"
        );
    }

    #[test]
    fn short_host_video_iframe_becomes_video_link() {
        assert_eq!(
            transcoded_description("{iframe}(https://youtu.be/dQw4w9WgXcQ)"),
            "[Video](https://youtu.be/dQw4w9WgXcQ)"
        );
    }

    #[test]
    fn empty_iframe_is_removed() {
        assert_eq!(transcoded_description("before {iframe}() after"), "before  after");
    }

    #[test]
    fn non_video_iframe_is_dropped() {
        assert_eq!(
            transcoded_description("a {iframe}(https://maps.example.com/embed?pb=1) b"),
            "a  b"
        );
    }

    #[test]
    fn author_icon_url_is_absolutized() {
        let mut doc = doc_with_description("body");
        doc.author = Some(Author {
            name: " Alice ".to_string(),
            url: "https://media.example.org/users/alice".to_string(),
            icon_url: "/images/alice.png".to_string(),
        });
        let out = transcoder().transcode(doc);
        let author = out.author.unwrap();
        assert_eq!(author.icon_url, "https://media.example.org/images/alice.png");
        assert_eq!(author.name, "Alice");
    }

    #[test]
    fn fields_are_trimmed() {
        let mut doc = doc_with_description("  body  ");
        doc.title = " Title ".to_string();
        doc.url = " https://media.example.org/news/1 ".to_string();
        doc.footer = Some(Footer {
            text: " footer ".to_string(),
        });
        let out = transcoder().transcode(doc);
        assert_eq!(out.title, "Title");
        assert_eq!(out.url, "https://media.example.org/news/1");
        assert_eq!(out.description.unwrap(), "body");
        assert_eq!(out.footer.unwrap().text, "footer");
    }

    #[test]
    fn over_long_description_is_truncated_to_exact_limit() {
        let url = "https://media.example.org/news/1";
        let mut doc = doc_with_description(&"x".repeat(DESCRIPTION_LIMIT + 500));
        doc.url = url.to_string();
        let out = transcoder().transcode(doc).description.unwrap();
        assert_eq!(out.chars().count(), DESCRIPTION_LIMIT);
        assert!(out.ends_with(&format!("...\n\n[Read more]({})", url)));
    }

    #[test]
    fn description_at_limit_is_not_truncated() {
        let body = "y".repeat(DESCRIPTION_LIMIT);
        assert_eq!(transcoded_description(&body), body);
    }

    #[test]
    fn absent_description_transcodes_to_empty() {
        let mut doc = doc_with_description("");
        doc.description = None;
        let out = transcoder().transcode(doc);
        assert_eq!(out.description.unwrap(), "");
    }

    #[test]
    fn malformed_markup_does_not_panic() {
        for ugly in [
            "![broken",
            "[](",
            "{{unterminated",
            "{iframe}(",
            "== = == =",
            "# \n#",
        ] {
            let _ = transcoded_description(ugly);
        }
    }
}
