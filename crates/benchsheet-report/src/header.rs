use benchsheet_core::DATETIME_COLUMN;

/// Ordered, duplicate-free column names of the result sheet.
///
/// Columns are only ever appended; an existing column keeps its position for
/// the lifetime of the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderRegistry {
    columns: Vec<String>,
}

impl Default for HeaderRegistry {
    fn default() -> Self {
        Self {
            columns: vec![DATETIME_COLUMN.to_string()],
        }
    }
}

impl HeaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|column| column == name)
    }

    /// Appends `name` unless already present. Returns whether the header grew.
    pub fn ensure(&mut self, name: &str) -> bool {
        if self.contains(name) {
            return false;
        }
        self.columns.push(name.to_string());
        true
    }

    /// Adopts the remote first row as the authoritative column order.
    ///
    /// An empty remote row leaves the registry untouched. The remote row is
    /// taken verbatim, blank or repeated cells included, so positions keep
    /// lining up with the data already in the sheet. Columns known only
    /// locally are appended after it so nothing registered in this process is
    /// lost.
    pub fn adopt_remote(&mut self, remote: Vec<String>) -> bool {
        if remote.iter().all(|name| name.is_empty()) {
            return false;
        }
        let local = std::mem::replace(&mut self.columns, remote);
        for name in &local {
            self.ensure(name);
        }
        true
    }
}
