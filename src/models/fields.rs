//! Response field names accepted by the `include` parameter.

bitflags::bitflags! {
    /// Set of document fields a projection emits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FieldSet: u32 {
        const PAPER_ID = 1 << 0;
        const PAPER_ID_V = 1 << 1;
        const VERSION = 1 << 2;
        const CANONICAL = 1 << 3;
        const HREF = 1 << 4;
        const TITLE = 1 << 5;
        const ABSTRACT = 1 << 6;
        const AUTHORS = 1 << 7;
        const AUTHORS_FREEFORM = 1 << 8;
        const PRIMARY_CLASSIFICATION = 1 << 9;
        const SECONDARY_CLASSIFICATION = 1 << 10;
        const SUBMITTED_DATE = 1 << 11;
        const SUBMITTED_DATE_FIRST = 1 << 12;
        const ANNOUNCED_DATE_FIRST = 1 << 13;
        const LICENSE = 1 << 14;
        const FORMATS = 1 << 15;
        const COMMENTS = 1 << 16;
        const JOURNAL_REF = 1 << 17;
        const REPORT_NUM = 1 << 18;
        const ACM_CLASS = 1 << 19;
        const MSC_CLASS = 1 << 20;
        const DOI = 1 << 21;
        const IS_CURRENT = 1 << 22;
        const IS_WITHDRAWN = 1 << 23;
        const LATEST = 1 << 24;

        /// Emitted for every result regardless of `include`
        const ALWAYS = Self::PAPER_ID.bits()
            | Self::PAPER_ID_V.bits()
            | Self::VERSION.bits()
            | Self::CANONICAL.bits()
            | Self::HREF.bits();
    }
}

/// Field names as they appear in `include` and in response JSON
const FIELD_NAMES: &[(&str, FieldSet)] = &[
    ("paper_id", FieldSet::PAPER_ID),
    ("paper_id_v", FieldSet::PAPER_ID_V),
    ("version", FieldSet::VERSION),
    ("canonical", FieldSet::CANONICAL),
    ("href", FieldSet::HREF),
    ("title", FieldSet::TITLE),
    ("abstract", FieldSet::ABSTRACT),
    ("authors", FieldSet::AUTHORS),
    ("authors_freeform", FieldSet::AUTHORS_FREEFORM),
    ("primary_classification", FieldSet::PRIMARY_CLASSIFICATION),
    ("secondary_classification", FieldSet::SECONDARY_CLASSIFICATION),
    ("submitted_date", FieldSet::SUBMITTED_DATE),
    ("submitted_date_first", FieldSet::SUBMITTED_DATE_FIRST),
    ("announced_date_first", FieldSet::ANNOUNCED_DATE_FIRST),
    ("license", FieldSet::LICENSE),
    ("formats", FieldSet::FORMATS),
    ("comments", FieldSet::COMMENTS),
    ("journal_ref", FieldSet::JOURNAL_REF),
    ("report_num", FieldSet::REPORT_NUM),
    ("acm_class", FieldSet::ACM_CLASS),
    ("msc_class", FieldSet::MSC_CLASS),
    ("doi", FieldSet::DOI),
    ("is_current", FieldSet::IS_CURRENT),
    ("is_withdrawn", FieldSet::IS_WITHDRAWN),
    ("latest", FieldSet::LATEST),
];

impl FieldSet {
    /// Look up a single field by its response name
    pub fn from_field_name(name: &str) -> Option<FieldSet> {
        FIELD_NAMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, flag)| *flag)
    }

    /// Whether the set contains the field with this response name
    pub fn contains_name(&self, name: &str) -> bool {
        Self::from_field_name(name).is_some_and(|flag| self.contains(flag))
    }

    /// Response names of the fields in this set, in canonical order
    pub fn names(&self) -> Vec<&'static str> {
        FIELD_NAMES
            .iter()
            .filter(|(_, flag)| self.contains(*flag))
            .map(|(n, _)| *n)
            .collect()
    }
}

impl Default for FieldSet {
    fn default() -> Self {
        FieldSet::ALWAYS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_name() {
        assert_eq!(FieldSet::from_field_name("license"), Some(FieldSet::LICENSE));
        assert_eq!(FieldSet::from_field_name("abstract"), Some(FieldSet::ABSTRACT));
        assert_eq!(FieldSet::from_field_name("nonsense"), None);
    }

    #[test]
    fn test_default_is_always_set() {
        let set = FieldSet::default();
        assert_eq!(
            set.names(),
            vec!["paper_id", "paper_id_v", "version", "canonical", "href"]
        );
        assert!(!set.contains_name("title"));
    }

    #[test]
    fn test_every_flag_has_a_name() {
        assert_eq!(FieldSet::all().names().len(), FIELD_NAMES.len());
    }
}
