use crate::config::FolderProfile;

/// Find the association that applies to `path`.
///
/// The association with the longest matching path wins, so an entry for a
/// project directory overrides one for its parent. Equal lengths go to the
/// entry stored first. Matching is per path segment: `/home/u/work` matches
/// `/home/u/work` and `/home/u/work/repo` but not `/home/u/work2`.
pub fn resolve<'a>(path: &str, associations: &'a [FolderProfile]) -> Option<&'a FolderProfile> {
    let mut best: Option<&FolderProfile> = None;

    for association in associations {
        if !is_path_prefix(&association.path, path) {
            continue;
        }
        if best.map_or(true, |b| association.path.len() > b.path.len()) {
            best = Some(association);
        }
    }

    best
}

fn is_separator(c: char) -> bool {
    c == '/' || c == std::path::MAIN_SEPARATOR
}

fn is_path_prefix(prefix: &str, path: &str) -> bool {
    if prefix.is_empty() {
        return false;
    }
    let Some(rest) = path.strip_prefix(prefix) else {
        return false;
    };
    rest.is_empty() || prefix.ends_with(is_separator) || rest.starts_with(is_separator)
}
