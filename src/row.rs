//! Source rows and the column overlay used during expansion.
//!
//! A source record is immutable once read. Everything the expander derives
//! for it (binding results, subtemplate iteration variables) lives in an
//! overlay stacked on top of the record. Entering a nested scope takes a
//! [`ScopeGuard`]; dropping the guard pops every column added inside the
//! scope, so sibling iterations never see each other's columns, even when a
//! scope is left early through `?`.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

use crate::datum::Datum;

/// Column name → position map for a source file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl Header {
    /// Build a header from column names. A repeated name resolves to its last
    /// position.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let index = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Header { names, index }
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Where an overlay column came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnOrigin {
    Binding,
    Iteration,
}

#[derive(Debug, Clone)]
struct OverlayColumn {
    name: String,
    value: Datum,
    origin: ColumnOrigin,
}

/// A source record plus the columns derived for it so far.
#[derive(Debug)]
pub struct RowFrame<'a> {
    header: &'a Header,
    cells: &'a [Datum],
    overlay: Vec<OverlayColumn>,
}

impl<'a> RowFrame<'a> {
    pub fn new(header: &'a Header, cells: &'a [Datum]) -> Self {
        RowFrame {
            header,
            cells,
            overlay: Vec::new(),
        }
    }

    /// Look up a column. The most recently added overlay column shadows
    /// older ones and the source record. A header position past the end of
    /// a short row reads as missing.
    pub fn get(&self, name: &str) -> Option<&Datum> {
        if let Some(col) = self.overlay.iter().rev().find(|c| c.name == name) {
            return Some(&col.value);
        }
        self.header
            .position(name)
            .and_then(|i| self.cells.get(i))
    }

    /// Origin of an overlay column, `None` for source columns and unknown names.
    pub fn origin(&self, name: &str) -> Option<ColumnOrigin> {
        self.overlay
            .iter()
            .rev()
            .find(|c| c.name == name)
            .map(|c| c.origin)
    }

    pub fn bind(&mut self, name: impl Into<String>, value: Datum, origin: ColumnOrigin) {
        self.overlay.push(OverlayColumn {
            name: name.into(),
            value,
            origin,
        });
    }

    /// Open a nested scope. Columns bound through the guard are removed when
    /// it drops.
    pub fn scope(&mut self) -> ScopeGuard<'_, 'a> {
        let mark = self.overlay.len();
        ScopeGuard { frame: self, mark }
    }

    /// Number of overlay columns currently visible.
    #[cfg(test)]
    pub(crate) fn overlay_depth(&self) -> usize {
        self.overlay.len()
    }
}

pub struct ScopeGuard<'s, 'a> {
    frame: &'s mut RowFrame<'a>,
    mark: usize,
}

impl<'a> Deref for ScopeGuard<'_, 'a> {
    type Target = RowFrame<'a>;

    fn deref(&self) -> &Self::Target {
        self.frame
    }
}

impl DerefMut for ScopeGuard<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.frame
    }
}

impl Drop for ScopeGuard<'_, '_> {
    fn drop(&mut self) {
        self.frame.overlay.truncate(self.mark);
    }
}
