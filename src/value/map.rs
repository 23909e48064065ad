//! Ordered maps with arbitrary values as keys.
//!
//! Sass maps preserve insertion order and compare keys structurally, so the
//! representation is an ordered vector of pairs with linear lookup.  Maps in
//! stylesheets are small; preserving order matters far more than lookup
//! asymptotics.

use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Map {
    entries: Vec<(Value, Value)>,
}

impl Map {
    pub fn new() -> Map {
        Map::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.get(key).is_some()
    }

    /// Inserts a pair.  Re-inserting an existing key replaces its value in
    /// place, keeping the key's original position.
    pub fn insert(&mut self, key: Value, value: Value) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &Value) -> Option<Value> {
        let i = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(i).1)
    }

    /// All of `other`'s entries layered over this map's.
    pub fn merge(&self, other: &Map) -> Map {
        let mut merged = self.clone();
        for (k, v) in &other.entries {
            merged.insert(k.clone(), v.clone());
        }
        merged
    }

    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Value, Value)> {
        self.entries.iter()
    }
}

impl FromIterator<(Value, Value)> for Map {
    fn from_iter<I: IntoIterator<Item = (Value, Value)>>(iter: I) -> Map {
        let mut map = Map::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::number::Number;

    fn num(n: f64) -> Value {
        Value::Number(Number::new(n))
    }

    #[test]
    fn preserves_insertion_order() {
        let mut map = Map::new();
        map.insert(num(3.0), num(30.0));
        map.insert(num(1.0), num(10.0));
        map.insert(num(2.0), num(20.0));

        let keys: Vec<_> = map.keys().cloned().collect();
        assert_eq!(keys, vec![num(3.0), num(1.0), num(2.0)]);
    }

    #[test]
    fn reinsert_replaces_in_place() {
        let mut map = Map::new();
        map.insert(num(1.0), num(10.0));
        map.insert(num(2.0), num(20.0));
        map.insert(num(1.0), num(11.0));

        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&num(1.0)), Some(&num(11.0)));
        let keys: Vec<_> = map.keys().cloned().collect();
        assert_eq!(keys, vec![num(1.0), num(2.0)]);
    }

    #[test]
    fn keys_compare_structurally() {
        let mut map = Map::new();
        map.insert(
            Value::Number(Number::with_unit(1.0, "cm")),
            num(1.0),
        );

        // 10mm == 1cm, so it hits the same entry.
        assert!(map.contains_key(&Value::Number(Number::with_unit(10.0, "mm"))));
    }

    #[test]
    fn merge_layers_the_right_operand() {
        let mut a = Map::new();
        a.insert(num(1.0), num(10.0));
        a.insert(num(2.0), num(20.0));

        let mut b = Map::new();
        b.insert(num(2.0), num(22.0));
        b.insert(num(3.0), num(33.0));

        let merged = a.merge(&b);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.get(&num(2.0)), Some(&num(22.0)));
    }
}
