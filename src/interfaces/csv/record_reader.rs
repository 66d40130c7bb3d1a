use crate::domain::cart::{CartLine, CartSnapshot};
use crate::error::{Result, SchedulerError};
use serde::de::DeserializeOwned;
use std::io::Read;

/// Reads typed records from a CSV source with a header row.
///
/// Wraps `csv::Reader`, trimming whitespace around fields and headers. Works
/// for any row type that derives `Deserialize`: cart lines, catalog products,
/// delivery addresses.
pub struct RecordReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> RecordReader<R> {
    /// Creates a new `RecordReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes rows, yielding one result per row.
    pub fn records<T: DeserializeOwned>(self) -> impl Iterator<Item = Result<T>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(SchedulerError::from))
    }

    /// Reads every row as a cart line and freezes them into a snapshot.
    ///
    /// Unlike `records`, a single bad row fails the whole cart.
    pub fn into_cart_snapshot(self) -> Result<CartSnapshot> {
        let lines = self.records::<CartLine>().collect::<Result<Vec<_>>>()?;
        CartSnapshot::new(lines)
    }
}
