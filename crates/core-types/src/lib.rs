use std::fmt;

/// Which list of the rule set a rule lives in.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "lowercase"))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum RuleKind {
    Class,
    Id,
}

impl RuleKind {
    /// Key under which the list for this kind is persisted.
    pub fn store_key(self) -> &'static str {
        match self {
            RuleKind::Class => "hiddenClasses",
            RuleKind::Id => "hiddenIds",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleKind::Class => f.write_str("class"),
            RuleKind::Id => f.write_str("id"),
        }
    }
}

/// A single hide rule: exact class name or exact element id.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Rule {
    pub kind: RuleKind,
    pub value: String,
}

impl Rule {
    pub fn class(name: impl Into<String>) -> Self {
        Self {
            kind: RuleKind::Class,
            value: name.into(),
        }
    }

    pub fn id(id: impl Into<String>) -> Self {
        Self {
            kind: RuleKind::Id,
            value: id.into(),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            RuleKind::Class => write!(f, ".{}", self.value),
            RuleKind::Id => write!(f, "#{}", self.value),
        }
    }
}

/// Hidden class names and hidden element ids, each an insertion-ordered list
/// without duplicates.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "camelCase", default))]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RuleSet {
    pub hidden_classes: Vec<String>,
    pub hidden_ids: Vec<String>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a rule set from raw lists, dropping duplicates but keeping the
    /// first occurrence of every value.
    pub fn from_lists(classes: Vec<String>, ids: Vec<String>) -> Self {
        let mut set = Self::default();
        for class in classes {
            set.insert(RuleKind::Class, &class);
        }
        for id in ids {
            set.insert(RuleKind::Id, &id);
        }
        set
    }

    pub fn values(&self, kind: RuleKind) -> &[String] {
        match kind {
            RuleKind::Class => &self.hidden_classes,
            RuleKind::Id => &self.hidden_ids,
        }
    }

    fn values_mut(&mut self, kind: RuleKind) -> &mut Vec<String> {
        match kind {
            RuleKind::Class => &mut self.hidden_classes,
            RuleKind::Id => &mut self.hidden_ids,
        }
    }

    pub fn contains(&self, kind: RuleKind, value: &str) -> bool {
        self.values(kind).iter().any(|existing| existing == value)
    }

    /// Returns `false` when the value was already present.
    pub fn insert(&mut self, kind: RuleKind, value: &str) -> bool {
        if self.contains(kind, value) {
            return false;
        }
        self.values_mut(kind).push(value.to_string());
        true
    }

    /// Returns `false` when the value was not present.
    pub fn remove(&mut self, kind: RuleKind, value: &str) -> bool {
        let list = self.values_mut(kind);
        let before = list.len();
        list.retain(|existing| existing != value);
        list.len() != before
    }

    pub fn apply(&mut self, rule: &Rule, hidden: bool) -> bool {
        if hidden {
            self.insert(rule.kind, &rule.value)
        } else {
            self.remove(rule.kind, &rule.value)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hidden_classes.is_empty() && self.hidden_ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hidden_classes.len() + self.hidden_ids.len()
    }

    /// Every rule, classes first, in insertion order.
    pub fn rules(&self) -> impl Iterator<Item = Rule> + '_ {
        self.hidden_classes
            .iter()
            .map(|class| Rule::class(class.clone()))
            .chain(self.hidden_ids.iter().map(|id| Rule::id(id.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_keeps_first_occurrence_only() {
        let mut set = RuleSet::new();
        assert!(set.insert(RuleKind::Class, "ad"));
        assert!(set.insert(RuleKind::Class, "promo"));
        assert!(!set.insert(RuleKind::Class, "ad"));
        assert_eq!(set.hidden_classes, vec!["ad", "promo"]);
        assert!(set.hidden_ids.is_empty());
    }

    #[test]
    fn remove_reports_presence() {
        let mut set = RuleSet::from_lists(vec![], vec!["banner".into(), "footer".into()]);
        assert!(set.remove(RuleKind::Id, "banner"));
        assert!(!set.remove(RuleKind::Id, "banner"));
        assert_eq!(set.values(RuleKind::Id), ["footer".to_string()]);
    }

    #[test]
    fn from_lists_drops_duplicates() {
        let set = RuleSet::from_lists(
            vec!["ad".into(), "ad".into(), "promo".into()],
            vec!["x".into(), "x".into()],
        );
        assert_eq!(set.hidden_classes, vec!["ad", "promo"]);
        assert_eq!(set.hidden_ids, vec!["x"]);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn rules_iterates_classes_then_ids() {
        let set = RuleSet::from_lists(vec!["ad".into()], vec!["banner".into()]);
        let rendered: Vec<String> = set.rules().map(|rule| rule.to_string()).collect();
        assert_eq!(rendered, vec![".ad", "#banner"]);
    }

    #[cfg(feature = "serde-full")]
    #[test]
    fn rule_set_uses_store_field_names() {
        let set = RuleSet::from_lists(vec!["ad".into()], vec![]);
        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"hiddenClasses": ["ad"], "hiddenIds": []})
        );
        let parsed: RuleSet = serde_json::from_str("{}").unwrap();
        assert!(parsed.is_empty());
    }
}
