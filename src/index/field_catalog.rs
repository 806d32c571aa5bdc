use std::collections::{BTreeSet, HashMap};
use parking_lot::RwLock;
use tracing::debug;
use crate::core::error::{Error, ErrorKind, Result};
use crate::index::rows::FieldRow;

#[derive(Default)]
struct Catalog {
    by_name: HashMap<String, u16>,
    names: Vec<String>,           // index == field id
    unpersisted: BTreeSet<u16>,   // allocated but no committed Field row yet
}

/// Bidirectional field name <-> id map. Append-only; ids are dense from 0.
#[derive(Default)]
pub struct FieldCatalog {
    inner: RwLock<Catalog>,
}

impl FieldCatalog {
    pub fn new() -> Self {
        FieldCatalog::default()
    }

    /// Replace the contents with the Field rows found at open
    pub fn load(&self, rows: impl IntoIterator<Item = FieldRow>) -> Result<()> {
        let mut rows: Vec<FieldRow> = rows.into_iter().collect();
        rows.sort_by_key(|r| r.index);

        let mut catalog = Catalog::default();
        for (expected, row) in rows.into_iter().enumerate() {
            if row.index as usize != expected {
                return Err(Error::corrupt(format!(
                    "field ids are not dense: expected {}, found {} ('{}')",
                    expected, row.index, row.name
                )));
            }
            if catalog.by_name.insert(row.name.clone(), row.index).is_some() {
                return Err(Error::corrupt(format!("field '{}' has two ids", row.name)));
            }
            catalog.names.push(row.name);
        }

        *self.inner.write() = catalog;
        Ok(())
    }

    /// Id for `name`, allocating the next one when `create` is set.
    ///
    /// Returns `(id, existed)`. A fresh id stays on the unpersisted list until
    /// `mark_persisted` is called for it.
    pub fn field_id(&self, name: &str, create: bool) -> Result<Option<(u16, bool)>> {
        if let Some(&id) = self.inner.read().by_name.get(name) {
            return Ok(Some((id, true)));
        }
        if !create {
            return Ok(None);
        }

        let mut inner = self.inner.write();
        // Another thread may have won the race between the two locks
        if let Some(&id) = inner.by_name.get(name) {
            return Ok(Some((id, true)));
        }
        let id = u16::try_from(inner.names.len()).map_err(|_| {
            Error::new(ErrorKind::InvalidArgument, format!("no field ids left for '{}'", name))
        })?;
        inner.by_name.insert(name.to_string(), id);
        inner.names.push(name.to_string());
        inner.unpersisted.insert(id);
        debug!(field = name, id, "allocated field id");

        Ok(Some((id, false)))
    }

    pub fn field_name(&self, id: u16) -> Option<String> {
        self.inner.read().names.get(id as usize).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every (id, name) pair in id order
    pub fn fields(&self) -> Vec<(u16, String)> {
        self.inner
            .read()
            .names
            .iter()
            .enumerate()
            .map(|(id, name)| (id as u16, name.clone()))
            .collect()
    }

    /// Field rows that still have to be written by the next mutation batch
    pub fn unpersisted_rows(&self) -> Vec<FieldRow> {
        let inner = self.inner.read();
        inner
            .unpersisted
            .iter()
            .map(|&id| FieldRow::new(id, inner.names[id as usize].as_str()))
            .collect()
    }

    pub fn mark_persisted(&self, ids: impl IntoIterator<Item = u16>) {
        let mut inner = self.inner.write();
        for id in ids {
            inner.unpersisted.remove(&id);
        }
    }
}
