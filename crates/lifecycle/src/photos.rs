//! Photo sets: one optional primary image plus an ordered list of extras.
//!
//! Clients only ever see the flat list `[primary, ...additional]`. The
//! additional list is persisted as a JSON array of strings.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoSet {
    pub primary: Option<String>,
    pub additional: Vec<String>,
}

impl PhotoSet {
    pub fn new(primary: Option<String>, additional: Vec<String>) -> Self {
        Self {
            primary,
            additional,
        }
    }

    /// Rebuild a set from a flat list; the first entry becomes the primary.
    pub fn from_external_list(list: Vec<String>) -> Self {
        let mut iter = list.into_iter();
        let primary = iter.next();
        Self {
            primary,
            additional: iter.collect(),
        }
    }

    pub fn to_external_list(&self) -> Vec<String> {
        self.primary
            .iter()
            .chain(self.additional.iter())
            .cloned()
            .collect()
    }

    /// Append freshly uploaded extras after the existing ones.
    pub fn merge_new_uploads(mut self, uploads: impl IntoIterator<Item = String>) -> Self {
        self.additional.extend(uploads);
        self
    }

    /// Replace the primary only when a new one is supplied.
    pub fn replace_primary(mut self, primary: Option<String>) -> Self {
        if primary.is_some() {
            self.primary = primary;
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_none() && self.additional.is_empty()
    }

    /// Decode a persisted additional list.
    ///
    /// Anything that is not a JSON array of strings decodes to an empty list.
    pub fn decode_additional(raw: Option<&str>) -> Vec<String> {
        raw.and_then(|s| serde_json::from_str::<Vec<String>>(s).ok())
            .unwrap_or_default()
    }

    pub fn encode_additional(&self) -> String {
        serde_json::Value::from(self.additional.clone()).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn s(v: &str) -> String {
        v.to_string()
    }

    #[test]
    fn external_list_puts_primary_first() {
        let set = PhotoSet::new(Some(s("P")), vec![s("A"), s("B")]);
        assert_eq!(set.to_external_list(), vec!["P", "A", "B"]);
    }

    #[test]
    fn merge_appends_after_existing_extras() {
        let set = PhotoSet::new(Some(s("P")), vec![s("A"), s("B")]).merge_new_uploads([s("C")]);
        assert_eq!(set.to_external_list(), vec!["P", "A", "B", "C"]);
    }

    #[test]
    fn replace_primary_keeps_old_when_none() {
        let set = PhotoSet::new(Some(s("P")), vec![]);
        assert_eq!(set.clone().replace_primary(None).primary.as_deref(), Some("P"));
        assert_eq!(set.replace_primary(Some(s("Q"))).primary.as_deref(), Some("Q"));
    }

    #[test]
    fn missing_primary_yields_only_extras() {
        let set = PhotoSet::new(None, vec![s("A")]);
        assert_eq!(set.to_external_list(), vec!["A"]);
    }

    #[test]
    fn tolerant_decoding() {
        assert!(PhotoSet::decode_additional(None).is_empty());
        assert!(PhotoSet::decode_additional(Some("not json")).is_empty());
        assert!(PhotoSet::decode_additional(Some("{\"a\":1}")).is_empty());
        assert!(PhotoSet::decode_additional(Some("NULL")).is_empty());
        assert_eq!(
            PhotoSet::decode_additional(Some("[\"uploads/a.jpg\"]")),
            vec!["uploads/a.jpg"]
        );
    }

    #[test]
    fn encode_is_a_json_array() {
        let set = PhotoSet::new(None, vec![s("uploads/x.png")]);
        assert_eq!(set.encode_additional(), "[\"uploads/x.png\"]");
        assert_eq!(PhotoSet::default().encode_additional(), "[]");
    }

    proptest! {
        #[test]
        fn external_list_round_trips(list in proptest::collection::vec("[a-z]{1,8}", 0..6)) {
            let set = PhotoSet::from_external_list(list.clone());
            prop_assert_eq!(set.to_external_list(), list);
        }

        #[test]
        fn merge_never_drops_photos(
            existing in proptest::collection::vec("[a-z]{1,8}", 0..6),
            uploads in proptest::collection::vec("[a-z]{1,8}", 0..6),
        ) {
            let set = PhotoSet::from_external_list(existing.clone()).merge_new_uploads(uploads.clone());
            let mut expected = existing;
            expected.extend(uploads);
            prop_assert_eq!(set.to_external_list(), expected);
        }
    }
}
