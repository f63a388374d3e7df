use std::collections::HashMap;

use anyhow::Result;

use super::KeyValueStore;

#[derive(Debug, Default)]
pub struct MemoryStore {
    items: HashMap<String, String>,
}

impl MemoryStore {
    #[cfg(test)]
    pub fn with_item(key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut store = Self::default();
        store.items.insert(key.into(), value.into());
        store
    }
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_overwrites_and_missing_is_none() {
        let mut store = MemoryStore::with_item("a", "1");
        assert_eq!(store.get_item("a").unwrap().as_deref(), Some("1"));

        store.set_item("a", "2").unwrap();
        assert_eq!(store.get_item("a").unwrap().as_deref(), Some("2"));

        assert_eq!(store.get_item("b").unwrap(), None);
    }
}
