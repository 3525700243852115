//! Forward-slash path helpers shared by identities and package entry names.

/// Lexically normalize a path: unify separators, drop `.` and empty
/// segments, and fold `..` where a parent segment exists.
///
/// Leading `/` is preserved. Unresolvable `..` segments are kept on relative
/// paths and dropped on absolute ones.
pub fn normalize(path: &str) -> String {
    let path = path.replace('\\', "/");
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|p| *p != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            s => parts.push(s),
        }
    }
    let joined = parts.join("/");
    if absolute {
        format!("/{}", joined)
    } else {
        joined
    }
}

/// True for `/abs`, `\\abs`, and drive-letter paths such as `C:/x`.
pub fn is_absolute(path: &str) -> bool {
    if path.starts_with('/') || path.starts_with('\\') {
        return true;
    }
    let bytes = path.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'/' || bytes[2] == b'\\')
}

/// Last `/`-separated component.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Everything before the last `/`, or `""` for a bare name.
pub fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(i) => &path[..i],
        None => "",
    }
}

/// Extension of the final component, without the dot.
///
/// Dotfiles such as `.hidden` have no extension.
pub fn extension(path: &str) -> Option<&str> {
    let name = file_name(path);
    match name.rfind('.') {
        Some(0) | None => None,
        Some(i) if i + 1 == name.len() => None,
        Some(i) => Some(&name[i + 1..]),
    }
}

/// Final component without its extension.
pub fn stem(path: &str) -> &str {
    let name = file_name(path);
    match extension(name) {
        Some(ext) => &name[..name.len() - ext.len() - 1],
        None => name,
    }
}

/// Replace (or add) the extension of the final component.
pub fn with_extension(path: &str, ext: &str) -> String {
    let dir = parent_dir(path);
    let stem = stem(path);
    let name = if ext.is_empty() {
        stem.to_string()
    } else {
        format!("{}.{}", stem, ext)
    };
    join(dir, &name)
}

/// Join a directory and a relative path with a single `/`.
pub fn join(dir: &str, rel: &str) -> String {
    if dir.is_empty() {
        rel.to_string()
    } else if dir.ends_with('/') {
        format!("{}{}", dir, rel)
    } else {
        format!("{}/{}", dir, rel)
    }
}

/// Express package entry `to` relative to the directory `from_dir`.
///
/// Both arguments are package-relative and normalized.
pub fn relative_path(from_dir: &str, to: &str) -> String {
    let from: Vec<&str> = from_dir.split('/').filter(|s| !s.is_empty()).collect();
    let target: Vec<&str> = to.split('/').filter(|s| !s.is_empty()).collect();
    let common = from
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let mut parts: Vec<&str> = Vec::with_capacity(from.len() - common + target.len() - common);
    parts.extend(std::iter::repeat_n("..", from.len() - common));
    parts.extend(&target[common..]);
    parts.join("/")
}

/// Resolve `raw` as written inside package entry `from_entry`.
///
/// Returns `None` for absolute paths and paths that escape the package root.
pub fn resolve_in_package(from_entry: &str, raw: &str) -> Option<String> {
    if raw.is_empty() || is_absolute(raw) {
        return None;
    }
    let joined = normalize(&join(parent_dir(from_entry), raw));
    if joined.is_empty() || joined == ".." || joined.starts_with("../") {
        return None;
    }
    Some(joined)
}

/// A valid package entry name: relative, normalized, no traversal, no
/// control characters or backslashes.
pub fn is_valid_entry_name(name: &str) -> bool {
    !name.is_empty()
        && !is_absolute(name)
        && !name.contains('\\')
        && !name.chars().any(char::is_control)
        && name
            .split('/')
            .all(|seg| !seg.is_empty() && seg != "." && seg != "..")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_folds_dot_segments() {
        assert_eq!(normalize("/a/./b/../c"), "/a/c");
        assert_eq!(normalize("a//b/"), "a/b");
        assert_eq!(normalize("../x"), "../x");
        assert_eq!(normalize("/../x"), "/x");
        assert_eq!(normalize("C:\\assets\\tex.png"), "C:/assets/tex.png");
    }

    #[test]
    fn test_extension_and_stem() {
        assert_eq!(extension("a/b/tex.PNG"), Some("PNG"));
        assert_eq!(extension(".hidden"), None);
        assert_eq!(extension("noext"), None);
        assert_eq!(extension("trailing."), None);
        assert_eq!(stem("dir/scene.sda"), "scene");
        assert_eq!(stem("archive.tar.gz"), "archive.tar");
    }

    #[test]
    fn test_with_extension_keeps_directory() {
        assert_eq!(with_extension("dir/scene.sda", "sdc"), "dir/scene.sdc");
        assert_eq!(with_extension("scene", "sdc"), "scene.sdc");
    }

    #[test]
    fn test_parent_dir() {
        assert_eq!(parent_dir("/a/b.sda"), "/a");
        assert_eq!(parent_dir("/b.sda"), "/");
        assert_eq!(parent_dir("b.sda"), "");
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(relative_path("", "tex.png"), "tex.png");
        assert_eq!(relative_path("", "textures/a.png"), "textures/a.png");
        assert_eq!(relative_path("sub", "textures/a.png"), "../textures/a.png");
        assert_eq!(relative_path("textures", "textures/a.png"), "a.png");
        assert_eq!(relative_path("a/b", "scene.sda"), "../../scene.sda");
    }

    #[test]
    fn test_resolve_in_package() {
        assert_eq!(
            resolve_in_package("sub/mat.sda", "../textures/a.png").as_deref(),
            Some("textures/a.png")
        );
        assert_eq!(resolve_in_package("scene.sda", "a.png").as_deref(), Some("a.png"));
        assert_eq!(resolve_in_package("scene.sda", "../out.png"), None);
        assert_eq!(resolve_in_package("scene.sda", "/abs/out.png"), None);
    }

    #[test]
    fn test_is_valid_entry_name() {
        assert!(is_valid_entry_name("textures/a.png"));
        assert!(!is_valid_entry_name("../a.png"));
        assert!(!is_valid_entry_name("/a.png"));
        assert!(!is_valid_entry_name("a/./b.png"));
        assert!(!is_valid_entry_name(""));
        assert!(!is_valid_entry_name("a\\b.png"));
    }
}
