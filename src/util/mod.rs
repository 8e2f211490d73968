//=========================================================================
// Path Utilities
//=========================================================================
//
// Pure helpers for resolving and inspecting resource URLs.
//
// URLs are treated as opaque strings with '/' separators. Query strings
// and fragments are tolerated everywhere and stripped wherever the file
// component matters.
//
//=========================================================================

/// Joins a resource root onto a URL.
///
/// Absolute URLs (leading '/' or an explicit scheme) pass through
/// untouched, as does everything when the root is empty.
pub fn combine(root: &str, url: &str) -> String {
    if root.is_empty() || is_absolute(url) {
        return url.to_string();
    }
    if url.is_empty() {
        return root.to_string();
    }
    format!("{}/{}", root.trim_end_matches('/'), url)
}

/// Returns the file component of a URL, query and fragment stripped.
pub fn file_name(url: &str) -> &str {
    let path = strip_query(url);
    match path.rfind('/') {
        Some(i) => &path[i + 1..],
        None => path,
    }
}

/// Returns the lowercased extension of the URL's file component, if any.
pub fn extension(url: &str) -> Option<String> {
    let name = file_name(url);
    let i = name.rfind('.')?;
    let ext = &name[i + 1..];
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}

/// Strips the query string and fragment from a URL.
pub fn strip_query(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}

fn is_absolute(url: &str) -> bool {
    url.starts_with('/') || url.contains("://")
}

//=== Tests ===============================================================

#[cfg(test)]
mod tests {
    use super::*;

    //--- combine ----------------------------------------------------------

    #[test]
    fn combine_joins_relative_urls() {
        assert_eq!(combine("assets", "bg.png"), "assets/bg.png");
        assert_eq!(combine("assets/art", "bg.png"), "assets/art/bg.png");
    }

    #[test]
    fn combine_tolerates_trailing_slash_on_root() {
        assert_eq!(combine("assets/", "bg.png"), "assets/bg.png");
    }

    #[test]
    fn combine_keeps_absolute_urls() {
        assert_eq!(combine("assets", "/shared/bg.png"), "/shared/bg.png");
        assert_eq!(
            combine("assets", "https://cdn.example.com/bg.png"),
            "https://cdn.example.com/bg.png"
        );
    }

    #[test]
    fn combine_with_empty_root_is_identity() {
        assert_eq!(combine("", "bg.png"), "bg.png");
    }

    #[test]
    fn combine_with_empty_url_yields_root() {
        assert_eq!(combine("assets", ""), "assets");
    }

    //--- file_name --------------------------------------------------------

    #[test]
    fn file_name_takes_last_component() {
        assert_eq!(file_name("a/b/c.png"), "c.png");
        assert_eq!(file_name("c.png"), "c.png");
    }

    #[test]
    fn file_name_strips_query_and_fragment() {
        assert_eq!(file_name("a/b.png?v=2"), "b.png");
        assert_eq!(file_name("a/b.png#east"), "b.png");
    }

    #[test]
    fn file_name_of_directory_url_is_empty() {
        assert_eq!(file_name("a/b/"), "");
    }

    //--- extension --------------------------------------------------------

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(extension("sprites.PNG").as_deref(), Some("png"));
    }

    #[test]
    fn extension_ignores_query_and_fragment() {
        assert_eq!(extension("map.json?rev=7").as_deref(), Some("json"));
        assert_eq!(extension("map.json#layer").as_deref(), Some("json"));
    }

    #[test]
    fn extension_takes_last_dot() {
        assert_eq!(extension("backup.tar.gz").as_deref(), Some("gz"));
    }

    #[test]
    fn extension_missing_is_none() {
        assert_eq!(extension("README"), None);
        assert_eq!(extension("oddly."), None);
        assert_eq!(extension(""), None);
    }

    //--- strip_query ------------------------------------------------------

    #[test]
    fn strip_query_handles_both_markers() {
        assert_eq!(strip_query("a.png?x=1#frag"), "a.png");
        assert_eq!(strip_query("a.png"), "a.png");
    }
}
