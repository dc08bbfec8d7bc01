//! Ordered filename collection used to stage archive operations.

/// An append-only, duplicate-tolerant sequence of file names.
///
/// The caller owns the list; the archive engine only reads it (write
/// path) or populates it (`list`). Duplicates are kept in order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FileList {
    names: Vec<String>,
}

impl FileList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a name. Duplicates are allowed.
    pub fn push(&mut self, name: impl Into<String>) {
        self.names.push(name.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn clear(&mut self) {
        self.names.clear();
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for FileList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        FileList {
            names: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl<'a> IntoIterator for &'a FileList {
    type Item = &'a str;
    type IntoIter = std::iter::Map<std::slice::Iter<'a, String>, fn(&'a String) -> &'a str>;

    fn into_iter(self) -> Self::IntoIter {
        self.names.iter().map(String::as_str)
    }
}
