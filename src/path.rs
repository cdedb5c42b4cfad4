//! Conversions between a slash-separated storage path and the name-chain
//! representation used to walk the directory tree.

/// Splits a path into a chain of component names, resolving `.` and `..`
/// the way a filesystem path cleaner would. An empty path yields `["."]`
/// (the root itself). A path that `..`s above the root yields an empty
/// chain, which callers should treat as "no such entry" rather than
/// resolving relative to an ambient cwd.
pub fn name_chain_from_path(path: &str) -> Vec<String> {
    if path.is_empty() {
        return vec![".".to_string()];
    }

    let mut stack: Vec<String> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => continue,
            ".." => {
                if stack.pop().is_none() {
                    return Vec::new();
                }
            }
            other => stack.push(other.to_string()),
        }
    }
    stack
}

/// Inverse of [`name_chain_from_path`]: joins a name chain back into an
/// absolute, slash-separated path. An empty chain is the root, `"/"`.
pub fn path_from_name_chain(names: &[String]) -> String {
    if names.is_empty() {
        return "/".to_string();
    }
    let mut out = String::new();
    for name in names {
        out.push('/');
        out.push_str(name);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_path_is_self() {
        assert_eq!(name_chain_from_path(""), vec!["."]);
    }

    #[test]
    fn absolute_path_splits_on_slash() {
        assert_eq!(
            name_chain_from_path("/foo/bar/baz/"),
            vec!["foo", "bar", "baz"]
        );
    }

    #[test]
    fn relative_path_splits_on_slash() {
        assert_eq!(
            name_chain_from_path("foo/bar/baz"),
            vec!["foo", "bar", "baz"]
        );
    }

    #[test]
    fn dotdot_pops_the_preceding_component() {
        assert_eq!(name_chain_from_path("foo/bar/../baz"), vec!["foo", "baz"]);
    }

    #[test]
    fn dotdot_escaping_the_root_yields_empty() {
        let empty: Vec<String> = Vec::new();
        assert_eq!(name_chain_from_path("foo/../../baz"), empty);
    }

    #[test]
    fn path_from_empty_chain_is_root() {
        assert_eq!(path_from_name_chain(&[]), "/");
    }

    #[test]
    fn path_from_chain_joins_with_slash() {
        let names = vec!["foo".to_string(), "bar".to_string(), "baz".to_string()];
        assert_eq!(path_from_name_chain(&names), "/foo/bar/baz");
    }
}
