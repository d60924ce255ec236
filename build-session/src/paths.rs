//! Display forms of build target paths

use std::path::Path;

/// Render `path` with a leading `home` directory replaced by `~`.
pub fn alias_path(path: &Path, home: Option<&Path>) -> String {
    if let Some(home) = home.filter(|h| !h.as_os_str().is_empty()) {
        if let Ok(rest) = path.strip_prefix(home) {
            if rest.as_os_str().is_empty() {
                return "~".to_string();
            }
            return format!("~/{}", rest.to_string_lossy().replace('\\', "/"));
        }
    }
    path.to_string_lossy().into_owned()
}

/// Directory diagnostics are resolved against: the target's parent
pub fn base_directory(target: &Path) -> &Path {
    target.parent().unwrap_or_else(|| Path::new(""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_under_home() {
        let home = Path::new("/home/dev");
        assert_eq!(
            alias_path(Path::new("/home/dev/src/x.cpp"), Some(home)),
            "~/src/x.cpp"
        );
        assert_eq!(alias_path(home, Some(home)), "~");
    }

    #[test]
    fn test_alias_outside_home() {
        let home = Path::new("/home/dev");
        assert_eq!(alias_path(Path::new("/tmp/x.cpp"), Some(home)), "/tmp/x.cpp");
        assert_eq!(alias_path(Path::new("/home/developer/x.cpp"), Some(home)), "/home/developer/x.cpp");
        assert_eq!(alias_path(Path::new("x.cpp"), None), "x.cpp");
    }

    #[test]
    fn test_base_directory() {
        assert_eq!(base_directory(Path::new("/a/b/x.cpp")), Path::new("/a/b"));
        assert_eq!(base_directory(Path::new("x.cpp")), Path::new(""));
    }
}
