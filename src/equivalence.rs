//! Structural comparison between a stored destination document and a
//! freshly transcoded one, deciding whether an edit is needed.

use tracing::debug;

use crate::contract::PostDocument;

/// Returns whether the two documents are the same in terms of a news or
/// event post. No field is more significant than another; any single
/// mismatch makes the documents non-equivalent.
///
/// One asymmetry: the platform round-trips an empty rich-text body as an
/// absent one, so a stored description of `None` is equivalent to a fresh
/// description of `""`.
pub fn equivalent(stored: &PostDocument, fresh: &PostDocument) -> bool {
    match (&stored.author, &fresh.author) {
        (Some(a1), Some(a2)) => {
            if a1.icon_url != a2.icon_url {
                debug!("Author icon URL has changed.");
                return false;
            }
            if a1.name != a2.name {
                debug!("Author name has changed.");
                return false;
            }
            if a1.url != a2.url {
                debug!("Author URL has changed.");
                return false;
            }
        }
        (None, None) => {}
        _ => {
            debug!("Author presence has changed.");
            return false;
        }
    }

    if stored.title != fresh.title {
        debug!("Title has changed.");
        return false;
    }

    if stored.url != fresh.url {
        debug!("URL has changed.");
        return false;
    }

    if stored.description != fresh.description {
        let stored_absent_fresh_empty =
            stored.description.is_none() && fresh.description.as_deref() == Some("");
        if !stored_absent_fresh_empty {
            debug!("Description has changed.");
            return false;
        }
    }

    match (&stored.footer, &fresh.footer) {
        (Some(f1), Some(f2)) => {
            if f1.text != f2.text {
                debug!("Footer text has changed.");
                return false;
            }
        }
        (None, None) => {}
        _ => {
            debug!("Footer presence has changed.");
            return false;
        }
    }

    match (&stored.image, &fresh.image) {
        (Some(i1), Some(i2)) => {
            if i1.url != i2.url {
                debug!("Image URL has changed.");
                return false;
            }
        }
        (None, None) => {}
        _ => {
            debug!("Image presence has changed.");
            return false;
        }
    }

    true
}
