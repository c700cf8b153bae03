//! Class-index to display-name lookup.

use std::borrow::Cow;

/// In-memory label table indexed by class id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelTable {
    names: Vec<String>,
}

impl LabelTable {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn get(&self, class_index: usize) -> Option<&str> {
        self.names.get(class_index).map(String::as_str)
    }

    /// Returns the label, or `class {id}` for ids outside the table.
    pub fn name_or_id(&self, class_index: usize) -> Cow<'_, str> {
        match self.get(class_index) {
            Some(name) => Cow::Borrowed(name),
            None => Cow::Owned(format!("class {class_index}")),
        }
    }
}

impl<S: Into<String>> FromIterator<S> for LabelTable {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::LabelTable;

    #[test]
    fn falls_back_to_class_id() {
        let labels: LabelTable = ["person", "car"].into_iter().collect();
        assert_eq!(labels.get(1), Some("car"));
        assert_eq!(labels.name_or_id(0), "person");
        assert_eq!(labels.name_or_id(7), "class 7");
    }
}
