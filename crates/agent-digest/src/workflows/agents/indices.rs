use std::fmt;

/// Comma separated index expression a search request is issued against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexTarget(String);

impl IndexTarget {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Request path relative to the cluster root.
    pub fn search_path(&self) -> String {
        format!("{}/_search", self.0)
    }
}

impl fmt::Display for IndexTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Maps subscriber languages to listing indices. No languages means every language index.
pub fn select_indices<S: AsRef<str>>(prefix: &str, languages: &[S]) -> IndexTarget {
    if languages.is_empty() {
        return IndexTarget(format!("{prefix}-*"));
    }

    let names: Vec<String> = languages
        .iter()
        .map(|code| format!("{prefix}-{}", code.as_ref()))
        .collect();
    IndexTarget(names.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_languages_target_all_indices() {
        let target = select_indices::<String>("offers", &[]);
        assert_eq!(target.as_str(), "offers-*");
        assert_eq!(target.search_path(), "offers-*/_search");
    }

    #[test]
    fn languages_keep_subscriber_order() {
        let target = select_indices("offers", &["en", "ru"]);
        assert_eq!(target.as_str(), "offers-en,offers-ru");
    }

    #[test]
    fn single_language_has_no_separator() {
        let target = select_indices("offers", &["lv".to_string()]);
        assert_eq!(target.to_string(), "offers-lv");
    }
}
