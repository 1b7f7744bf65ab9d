//! Insertion-ordered map keyed by entity id
//!
//! Iteration order is the order members were appended or positioned in. It
//! drives both display order and generated script order, so the map is never
//! re-sorted. Serialized as a JSON object whose keys appear in that order.

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::marker::PhantomData;

/// Ordered collection of entities with unique string keys
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<T> {
    entries: Vec<(String, T)>,
}

impl<T> Default for OrderedMap<T> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<T> OrderedMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    /// Index of `id` in iteration order
    pub fn position(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|(key, _)| key == id)
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.entries.iter().find(|(key, _)| key == id).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        self.entries.iter_mut().find(|(key, _)| key == id).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.entries.iter_mut().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(key, v)| (key.as_str(), v))
    }

    /// Append `value` under `id`.
    ///
    /// Hands the value back when `id` is already present.
    pub fn push(&mut self, id: String, value: T) -> Result<usize, T> {
        self.insert_after(id, value, None)
    }

    /// Place `value` immediately after `after`, or at the end when `after`
    /// is `None` or not a member. Other members keep their relative order.
    ///
    /// Returns the index the value landed at, or hands the value back when
    /// `id` is already present.
    pub fn insert_after(&mut self, id: String, value: T, after: Option<&str>) -> Result<usize, T> {
        if self.contains_key(&id) {
            return Err(value);
        }
        let index = after
            .and_then(|anchor| self.position(anchor))
            .map(|pos| pos + 1)
            .unwrap_or(self.entries.len());
        self.entries.insert(index, (id, value));
        Ok(index)
    }

    /// Remove `id`, keeping the order of the remaining members
    pub fn remove(&mut self, id: &str) -> Option<T> {
        let pos = self.position(id)?;
        Some(self.entries.remove(pos).1)
    }

    /// Exchange the positions of two members
    pub fn swap(&mut self, a: &str, b: &str) -> bool {
        match (self.position(a), self.position(b)) {
            (Some(i), Some(j)) => {
                self.entries.swap(i, j);
                true
            }
            _ => false,
        }
    }
}

impl<T: Serialize> Serialize for OrderedMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

struct OrderedMapVisitor<T>(PhantomData<T>);

impl<'de, T: Deserialize<'de>> Visitor<'de> for OrderedMapVisitor<T> {
    type Value = OrderedMap<T>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of id to entity")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut map = OrderedMap { entries: Vec::with_capacity(access.size_hint().unwrap_or(0)) };
        while let Some((key, value)) = access.next_entry::<String, T>()? {
            if map.contains_key(&key) {
                return Err(de::Error::custom(format!("duplicate id `{}`", key)));
            }
            map.entries.push((key, value));
        }
        Ok(map)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for OrderedMap<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abc() -> OrderedMap<u32> {
        let mut map = OrderedMap::new();
        map.push("a".into(), 1).unwrap();
        map.push("b".into(), 2).unwrap();
        map.push("c".into(), 3).unwrap();
        map
    }

    #[test]
    fn test_insert_after_member() {
        let mut map = abc();
        assert_eq!(map.insert_after("d".into(), 4, Some("b")), Ok(2));
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["a", "b", "d", "c"]);
    }

    #[test]
    fn test_insert_after_missing_anchor_appends() {
        let mut map = abc();
        map.insert_after("d".into(), 4, Some("zzz")).unwrap();
        assert_eq!(map.keys().last(), Some("d"));
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut map = abc();
        assert_eq!(map.push("b".into(), 9), Err(9));
        assert_eq!(map.get("b"), Some(&2));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn test_remove_and_swap_keep_order() {
        let mut map = abc();
        assert_eq!(map.remove("b"), Some(2));
        assert!(map.remove("b").is_none());
        assert!(map.swap("a", "c"));
        assert!(!map.swap("a", "b"));
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["c", "a"]);
    }

    #[test]
    fn test_json_preserves_document_order() {
        let json = r#"{"z":1,"a":2,"m":3}"#;
        let map: OrderedMap<u32> = serde_json::from_str(json).unwrap();
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["z", "a", "m"]);
        assert_eq!(serde_json::to_string(&map).unwrap(), json);
    }

    #[test]
    fn test_json_duplicate_key_rejected() {
        let result: Result<OrderedMap<u32>, _> = serde_json::from_str(r#"{"a":1,"a":2}"#);
        assert!(result.is_err());
    }
}
