//! In-memory sheet service that records every call, for tests.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use super::{SheetError, SheetService, Worksheet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Open,
    Headers,
    Rows,
    Append(Vec<String>),
    Write(u32, Vec<String>),
    Delete(u32),
}

#[derive(Default)]
struct Inner {
    available: bool,
    failing_writes: bool,
    /// Row 1 first, exactly as the sheet lays it out.
    grid: Vec<Vec<String>>,
    calls: Vec<Call>,
}

#[derive(Clone, Default)]
pub struct MemorySheets {
    inner: Arc<Mutex<Inner>>,
}

impl MemorySheets {
    pub fn new(headers: &[&str], rows: Vec<Vec<String>>) -> Self {
        let mut grid = vec![headers.iter().map(|h| h.to_string()).collect()];
        grid.extend(rows);
        Self {
            inner: Arc::new(Mutex::new(Inner {
                available: true,
                grid,
                ..Inner::default()
            })),
        }
    }

    /// A service whose `open` always fails.
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Make every write fail with a permission error.
    pub fn fail_writes(&self) {
        self.inner.lock().unwrap().failing_writes = true;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    /// Data rows (row 2 onward).
    pub fn rows(&self) -> Vec<Vec<String>> {
        self.inner.lock().unwrap().grid.iter().skip(1).cloned().collect()
    }

    fn record(&self, call: Call) -> std::sync::MutexGuard<'_, Inner> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(call);
        inner
    }
}

fn denied() -> SheetError {
    SheetError::Api {
        status: 403,
        message: "The caller does not have permission".into(),
    }
}

#[async_trait]
impl SheetService for MemorySheets {
    async fn open(&self) -> Result<Box<dyn Worksheet>, SheetError> {
        let inner = self.record(Call::Open);
        if !inner.available {
            return Err(SheetError::NotConfigured("no spreadsheet".into()));
        }
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl Worksheet for MemorySheets {
    async fn header_row(&self) -> Result<Vec<String>, SheetError> {
        let inner = self.record(Call::Headers);
        Ok(inner.grid.first().cloned().unwrap_or_default())
    }

    async fn data_rows(&self) -> Result<Vec<Vec<String>>, SheetError> {
        let inner = self.record(Call::Rows);
        Ok(inner.grid.iter().skip(1).cloned().collect())
    }

    async fn append_row(&self, values: Vec<String>) -> Result<(), SheetError> {
        let mut inner = self.record(Call::Append(values.clone()));
        if inner.failing_writes {
            return Err(denied());
        }
        inner.grid.push(values);
        Ok(())
    }

    async fn write_row(&self, row: u32, values: Vec<String>) -> Result<(), SheetError> {
        let mut inner = self.record(Call::Write(row, values.clone()));
        if inner.failing_writes {
            return Err(denied());
        }
        let idx = row as usize - 1;
        if inner.grid.len() <= idx {
            inner.grid.resize(idx + 1, Vec::new());
        }
        inner.grid[idx] = values;
        Ok(())
    }

    async fn delete_row(&self, row: u32) -> Result<(), SheetError> {
        let mut inner = self.record(Call::Delete(row));
        if inner.failing_writes {
            return Err(denied());
        }
        let idx = row as usize - 1;
        if idx < inner.grid.len() {
            inner.grid.remove(idx);
        }
        Ok(())
    }
}
