use serde_json::Value;

use crate::store::{ComputeStore, Document, RowDocument};

/// Working copies of row documents with per-row change tracking.
pub(crate) struct Staged {
    docs: Vec<Document>,
    changed: Vec<bool>,
}

impl Staged {
    pub(crate) fn new(rows: &[RowDocument]) -> Self {
        Self {
            docs: rows.iter().map(|r| r.data.clone()).collect(),
            changed: vec![false; rows.len()],
        }
    }

    /// Stage `column = value` on row `index`. An absent key differs from null.
    pub(crate) fn set(&mut self, index: usize, column: &str, value: Value) {
        let doc = &mut self.docs[index];
        if doc.get(column) != Some(&value) {
            doc.insert(column.to_string(), value);
            self.changed[index] = true;
        }
    }

    /// Write every changed row, one call per row. A row's in-memory copy is
    /// advanced only once its write succeeded.
    pub(crate) async fn persist(
        self,
        store: &dyn ComputeStore,
        rows: &mut [RowDocument],
        errors: &mut Vec<String>,
    ) -> usize {
        let mut written = 0;
        for ((row, doc), changed) in rows.iter_mut().zip(self.docs).zip(self.changed) {
            if !changed {
                continue;
            }
            match store.update_row_data(row.id, &doc).await {
                Ok(()) => {
                    row.data = doc;
                    written += 1;
                }
                Err(e) => {
                    tracing::warn!(row_id = %row.id, error = %e, "row write-back failed");
                    errors.push(format!("Failed to update row {}: {e}", row.id));
                }
            }
        }
        written
    }
}
