//! Centrality export
//!
//! Rank-capable engines expose their view of the node's social standing as
//! a vector of numbers. [`CentralityReport`] turns those vectors into the
//! plain-text global popularity report.

use std::io::{self, Write};

use oppnet_core::PeerIdentity;

use crate::history::EncounterTracker;

/// Engines that can report per-node centrality values
pub trait Centralities<I: PeerIdentity> {
    /// Centrality values computed over the given encounter bookkeeping
    ///
    /// Rank engines return `[own rank, rank-table size, recorded contacts]`.
    fn global_centralities(&self, encounters: &EncounterTracker<I>) -> Vec<f64>;

    /// Centrality values over the engine's own encounter bookkeeping
    fn centralities(&self) -> Vec<f64>;
}

/// Text report of node centralities
///
/// ```text
/// NodeID
/// n0 0.13 0 0
/// n1 0.4521 2 5
/// ```
#[derive(Debug, Clone)]
pub struct CentralityReport<I: PeerIdentity> {
    rows: Vec<(I, Vec<f64>)>,
}

impl<I: PeerIdentity> Default for CentralityReport<I> {
    fn default() -> Self {
        Self { rows: Vec::new() }
    }
}

impl<I: PeerIdentity> CentralityReport<I> {
    /// Create an empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one node's values
    pub fn push(&mut self, node: I, values: Vec<f64>) {
        self.rows.push((node, values));
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the report has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values recorded for `node`
    pub fn values(&self, node: &I) -> Option<&[f64]> {
        self.rows
            .iter()
            .find(|(n, _)| n == node)
            .map(|(_, v)| v.as_slice())
    }

    /// Write the report, rows in insertion order
    pub fn write_to<W: Write>(&self, mut out: W) -> io::Result<()> {
        writeln!(out, "NodeID")?;
        for (node, values) in &self.rows {
            write!(out, "{}", node)?;
            for value in values {
                write!(out, " {}", value)?;
            }
            writeln!(out)?;
        }
        out.flush()
    }

    /// Render the report to a string
    pub fn render(&self) -> String {
        let mut buf = Vec::new();
        // Writing into a Vec cannot fail
        let _ = self.write_to(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

impl<I: PeerIdentity> FromIterator<(I, Vec<f64>)> for CentralityReport<I> {
    fn from_iter<T: IntoIterator<Item = (I, Vec<f64>)>>(iter: T) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}
