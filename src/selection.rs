use thiserror::Error;

pub const MAX_SELECTED: usize = 10;

/// Table names compare case-insensitively everywhere.
pub fn same_table(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("Max ({}) amount of tables selected", MAX_SELECTED)]
    Full,
    #[error("{0} is already selected")]
    Duplicate(String),
}

/// Ordered set of tables the operator picked for a combined template.
#[derive(Debug, Default, Clone)]
pub struct Selection {
    tables: Vec<String>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `table`, returning its 1-based position.
    pub fn add(&mut self, table: &str) -> Result<usize, SelectionError> {
        if self.is_full() {
            return Err(SelectionError::Full);
        }
        if let Some(existing) = self.tables.iter().find(|t| same_table(t, table)) {
            return Err(SelectionError::Duplicate(existing.clone()));
        }
        self.tables.push(table.to_string());
        Ok(self.tables.len())
    }

    /// Remove the entry at 1-based `position`.
    pub fn remove(&mut self, position: usize) -> Option<String> {
        if position == 0 || position > self.tables.len() {
            return None;
        }
        Some(self.tables.remove(position - 1))
    }

    pub fn is_full(&self) -> bool {
        self.tables.len() >= MAX_SELECTED
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.tables
    }
}
