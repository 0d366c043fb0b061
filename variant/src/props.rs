/*!
A small typed value tree standing in for the reflection-driven property
structs the source builds at runtime. Every module's declared properties,
and every conditional subtree the expander folds into them, is one of
these; the merger only ever needs to know "string", "bool", "string list",
or "nested group", which is exactly the shape the design notes call for
(a typed-sum value tree manipulated by the merger, rather than dynamic
struct construction).
*/

use std::collections::{BTreeMap, HashSet};

/// One property value, or a nested group of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropValue {
    Str(String),
    Bool(bool),
    List(Vec<String>),
    Group(BTreeMap<String, PropValue>),
}

impl Default for PropValue {
    /// The identity element for merging: merging anything into a fresh
    /// default, or merging a default into anything, is a no-op.
    fn default() -> Self {
        PropValue::empty_group()
    }
}

impl PropValue {
    pub fn empty_group() -> Self {
        PropValue::Group(BTreeMap::new())
    }

    pub fn group(pairs: impl IntoIterator<Item = (&'static str, PropValue)>) -> Self {
        PropValue::Group(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    pub fn as_group(&self) -> Option<&BTreeMap<String, PropValue>> {
        match self {
            PropValue::Group(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            PropValue::List(l) => Some(l),
            _ => None,
        }
    }

    fn is_empty_group(&self) -> bool {
        matches!(self, PropValue::Group(m) if m.is_empty())
    }
}

/// Fold `src` into `dest` in place, field by field, per the fixed
/// append-order contract of the property merger (spec section 4.3):
/// scalars are overwritten by the later value, lists are appended unless
/// the field's dotted path is in `prepend_fields` (the "variant prepend"
/// struct tag), in which case the later value's entries are prepended.
///
/// No-op if `src` is an empty group: this lets callers unconditionally
/// merge an absent conditional subtree (e.g. a feature with no
/// declaration) without special-casing it.
pub fn merge_into(dest: &mut PropValue, src: &PropValue, prepend_fields: &HashSet<String>, path: &str) {
    if src.is_empty_group() {
        return;
    }
    match (dest, src) {
        (PropValue::Group(dest_map), PropValue::Group(src_map)) => {
            for (key, src_value) in src_map {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                match dest_map.get_mut(key) {
                    Some(existing) => merge_into(existing, src_value, prepend_fields, &child_path),
                    None => {
                        dest_map.insert(key.clone(), src_value.clone());
                    }
                }
            }
        }
        (PropValue::List(dest_list), PropValue::List(src_list)) => {
            if prepend_fields.contains(path) {
                let mut merged = src_list.clone();
                merged.extend(dest_list.iter().cloned());
                *dest_list = merged;
            } else {
                dest_list.extend(src_list.iter().cloned());
            }
        }
        (dest_slot, src_value) => {
            *dest_slot = src_value.clone();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn group_with_list(key: &'static str, items: &[&str]) -> PropValue {
        PropValue::group([(
            key,
            PropValue::List(items.iter().map(|s| s.to_string()).collect()),
        )])
    }

    #[test]
    fn scalar_merge_overwrites() {
        let mut dest = PropValue::group([("x", PropValue::Str("a".into()))]);
        let src = PropValue::group([("x", PropValue::Str("b".into()))]);
        merge_into(&mut dest, &src, &HashSet::new(), "");
        assert_eq!(
            dest.as_group().unwrap().get("x"),
            Some(&PropValue::Str("b".into()))
        );
    }

    #[test]
    fn list_merge_appends_by_default() {
        let mut dest = group_with_list("srcs", &["a"]);
        let src = group_with_list("srcs", &["b", "c"]);
        merge_into(&mut dest, &src, &HashSet::new(), "");
        assert_eq!(
            dest.as_group().unwrap().get("srcs").unwrap().as_list(),
            Some(["a", "b", "c"].map(String::from).as_slice())
        );
    }

    #[test]
    fn list_merge_prepends_when_tagged() {
        let mut dest = group_with_list("srcs", &["a"]);
        let src = group_with_list("srcs", &["b", "c"]);
        let mut prepend = HashSet::new();
        prepend.insert("srcs".to_string());
        merge_into(&mut dest, &src, &prepend, "");
        assert_eq!(
            dest.as_group().unwrap().get("srcs").unwrap().as_list(),
            Some(["b", "c", "a"].map(String::from).as_slice())
        );
    }

    #[test]
    fn merging_empty_subtree_is_a_no_op() {
        let mut dest = group_with_list("srcs", &["a"]);
        let before = dest.clone();
        merge_into(&mut dest, &PropValue::empty_group(), &HashSet::new(), "");
        assert_eq!(dest, before);
    }

    #[test]
    fn merge_into_empty_destination_is_deterministic() {
        let src = group_with_list("srcs", &["a", "b"]);
        let mut dest1 = PropValue::empty_group();
        let mut dest2 = PropValue::empty_group();
        merge_into(&mut dest1, &src, &HashSet::new(), "");
        merge_into(&mut dest2, &src, &HashSet::new(), "");
        assert_eq!(dest1, dest2);
    }

    #[test]
    fn nested_groups_merge_recursively() {
        let mut dest = PropValue::group([(
            "nested",
            PropValue::group([("a", PropValue::List(vec!["1".into()]))]),
        )]);
        let src = PropValue::group([(
            "nested",
            PropValue::group([("a", PropValue::List(vec!["2".into()]))]),
        )]);
        merge_into(&mut dest, &src, &HashSet::new(), "");
        let nested = dest.as_group().unwrap().get("nested").unwrap();
        assert_eq!(
            nested.as_group().unwrap().get("a").unwrap().as_list(),
            Some(["1", "2"].map(String::from).as_slice())
        );
    }
}
