use std::fmt;

use crate::Error;

/// Thin wrapper over `fancy_regex` with owned match data.
#[derive(Debug, Clone)]
pub(crate) struct Regex {
    backend: fancy_regex::Regex,
}

impl Regex {
    pub(crate) fn new(pattern: &str) -> Result<Self, RegexError> {
        let backend = fancy_regex::Regex::new(pattern).map_err(RegexError::from)?;
        Ok(Self { backend })
    }

    pub(crate) fn captures(&self, input: &str) -> Result<Option<Captures>, RegexError> {
        let captures = self.backend.captures(input).map_err(RegexError::from)?;
        Ok(captures.as_ref().map(Captures::from_backend))
    }

    /// Replaces every match with `replacement`, taken literally.
    pub(crate) fn replace_all(&self, input: &str, replacement: &str) -> Result<String, RegexError> {
        let mut out = String::with_capacity(input.len());
        let mut last = 0;
        for matched in self.backend.find_iter(input) {
            let matched = matched.map_err(RegexError::from)?;
            out.push_str(&input[last..matched.start()]);
            out.push_str(replacement);
            last = matched.end();
        }
        out.push_str(&input[last..]);
        Ok(out)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Captures {
    groups: Vec<Option<String>>,
}

impl Captures {
    fn from_backend(captures: &fancy_regex::Captures<'_>) -> Self {
        let groups = (0..captures.len())
            .map(|idx| captures.get(idx).map(|m| m.as_str().to_string()))
            .collect();
        Self { groups }
    }

    pub(crate) fn get(&self, index: usize) -> Option<&str> {
        self.groups.get(index).and_then(|group| group.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RegexError {
    message: String,
}

impl fmt::Display for RegexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RegexError {}

impl From<fancy_regex::Error> for RegexError {
    fn from(value: fancy_regex::Error) -> Self {
        Self {
            message: value.to_string(),
        }
    }
}

impl From<RegexError> for Error {
    fn from(value: RegexError) -> Self {
        Error::BindingSyntax(value.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_all_substitutes_literally() -> Result<(), RegexError> {
        let re = Regex::new(r"[^A-Za-z0-9_-]+")?;
        assert_eq!(re.replace_all("$vm.model.items", "-")?, "-vm-model-items");
        assert_eq!(re.replace_all("plain", "$1")?, "plain");
        Ok(())
    }

    #[test]
    fn captures_expose_optional_groups() -> Result<(), RegexError> {
        let re = Regex::new(r"^(\w+)(?:\((.*)\))?$")?;
        let caps = re.captures("go")?.expect("matches");
        assert_eq!(caps.get(1), Some("go"));
        assert_eq!(caps.get(2), None);
        assert_eq!(re.captures("two words")?, None);
        Ok(())
    }
}
