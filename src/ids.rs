//! Stable identifiers and store-friendly dates.
//!
//! Stories are re-ingested whenever their transcript or index changes, so
//! their store ids must be derived from their source ids rather than
//! generated. The same story in two collections gets two ids.

use uuid::Uuid;

/// Turn an arbitrary id into a stable UUID.
///
/// - A UUID (any format `uuid` parses) is returned normalised.
/// - A hex id such as a Mongo `ObjectId` is right-padded with zeros (or
///   truncated) to 32 hex digits.
/// - Anything else becomes a UUIDv5 of the id in the URL namespace.
///
/// ```rust
/// use timeslab::convert_to_uuid;
///
/// assert_eq!(
///     convert_to_uuid("507f1f77bcf86cd799439011").to_string(),
///     "507f1f77-bcf8-6cd7-9943-901100000000",
/// );
/// assert_eq!(convert_to_uuid("story-1"), convert_to_uuid(" story-1 "));
/// ```
#[must_use]
pub fn convert_to_uuid(raw: &str) -> Uuid {
    let s = raw.trim();

    if let Ok(id) = Uuid::parse_str(s) {
        return id;
    }

    let compact: String = s.chars().filter(|&c| c != '-').collect();
    if !compact.is_empty() && compact.chars().all(|c| c.is_ascii_hexdigit()) {
        let padded: String = compact.chars().chain(std::iter::repeat('0')).take(32).collect();
        if let Ok(id) = Uuid::parse_str(&padded) {
            return id;
        }
    }

    let name = if s.is_empty() { "default" } else { s };
    Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes())
}

/// The store id of a story within a collection.
///
/// The collection id is lowercased; a blank one becomes `default`.
#[must_use]
pub fn story_uuid(collection_id: &str, story_id: &str) -> Uuid {
    let collection = collection_id.trim().to_lowercase();
    let collection = if collection.is_empty() { "default".to_string() } else { collection };
    convert_to_uuid(&format!("{collection}:{story_id}"))
}

/// The store id of the `chunk_id`-th chunk of a story.
#[must_use]
pub fn chunk_uuid(story: Uuid, chunk_id: usize) -> Uuid {
    Uuid::new_v5(&story, chunk_id.to_string().as_bytes())
}

/// Normalise a recording date to RFC 3339.
///
/// `YYYY-MM-DD` gains `T00:00:00Z`; a value already containing `T` has any
/// spaces replaced by `T`. Anything else is `None`.
///
/// ```rust
/// use timeslab::to_store_date;
///
/// assert_eq!(to_store_date("1999-04-01").as_deref(), Some("1999-04-01T00:00:00Z"));
/// assert_eq!(to_store_date("April 1999"), None);
/// ```
#[must_use]
pub fn to_store_date(value: &str) -> Option<String> {
    let s = value.trim();
    if s.is_empty() {
        return None;
    }
    if is_plain_date(s) {
        return Some(format!("{s}T00:00:00Z"));
    }
    if s.contains('T') {
        return Some(s.replace(' ', "T"));
    }
    None
}

fn is_plain_date(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() == 10
        && b.iter().enumerate().all(|(i, c)| match i {
            4 | 7 => *c == b'-',
            _ => c.is_ascii_digit(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_passes_through() {
        let id = "6F9619FF-8B86-D011-B42D-00CF4FC964FF";
        assert_eq!(convert_to_uuid(id).to_string(), id.to_lowercase());
        assert_eq!(
            convert_to_uuid("6f9619ff8b86d011b42d00cf4fc964ff").to_string(),
            "6f9619ff-8b86-d011-b42d-00cf4fc964ff"
        );
    }

    #[test]
    fn test_long_hex_is_truncated() {
        let long = "0123456789abcdef0123456789abcdef0123";
        assert_eq!(
            convert_to_uuid(long).to_string(),
            "01234567-89ab-cdef-0123-456789abcdef"
        );
    }

    #[test]
    fn test_other_ids_are_v5() {
        let id = convert_to_uuid("interview #12");
        assert_eq!(id.get_version_num(), 5);
        assert_eq!(id, Uuid::new_v5(&Uuid::NAMESPACE_URL, b"interview #12"));
        assert_eq!(convert_to_uuid(""), Uuid::new_v5(&Uuid::NAMESPACE_URL, b"default"));
    }

    #[test]
    fn test_story_uuid_scopes_by_collection() {
        let a = story_uuid("Oral-Histories", "507f1f77bcf86cd799439011");
        let b = story_uuid("oral-histories", "507f1f77bcf86cd799439011");
        let c = story_uuid("other", "507f1f77bcf86cd799439011");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(story_uuid("  ", "x"), convert_to_uuid("default:x"));
    }

    #[test]
    fn test_chunk_uuid_is_stable() {
        let story = story_uuid("c", "s");
        assert_eq!(chunk_uuid(story, 3), chunk_uuid(story, 3));
        assert_ne!(chunk_uuid(story, 3), chunk_uuid(story, 4));
    }

    #[test]
    fn test_store_dates() {
        assert_eq!(to_store_date(" 2020-02-29 ").as_deref(), Some("2020-02-29T00:00:00Z"));
        assert_eq!(
            to_store_date("2020-02-29T10:00:00 +00:00").as_deref(),
            Some("2020-02-29T10:00:00T+00:00")
        );
        assert_eq!(to_store_date("2020/02/29"), None);
        assert_eq!(to_store_date(""), None);
    }
}
