//! Column descriptors and sort state.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::filter::FilterSpec;

/// Sort direction of a column. At most one column is non-`None` at a time;
/// `Table::set_sort` enforces this.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    None,
    Asc,
    Desc,
}

/// Record comparator attached to a sortable column.
pub type CompareFn<T> = Box<dyn Fn(&T, &T) -> Ordering>;

/// Column definition supplied at table construction.
pub struct ColumnSpec<T> {
    id: String,
    label: String,
    selected: bool,
    can_hide: bool,
    sort: SortDirection,
    compare: Option<CompareFn<T>>,
    filter: Option<FilterSpec<T>>,
}

impl<T> ColumnSpec<T> {
    /// A visible, hideable, unsorted column with no comparator or filter.
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            selected: true,
            can_hide: true,
            sort: SortDirection::None,
            compare: None,
            filter: None,
        }
    }

    /// Start hidden.
    pub fn hidden(mut self) -> Self {
        self.selected = false;
        self
    }

    /// Forbid hiding, e.g. for a key column.
    pub fn locked(mut self) -> Self {
        self.can_hide = false;
        self
    }

    /// Default sort direction.
    pub fn sorted(mut self, direction: SortDirection) -> Self {
        self.sort = direction;
        self
    }

    /// Comparator enabling sorting on this column.
    pub fn comparing(mut self, compare: impl Fn(&T, &T) -> Ordering + 'static) -> Self {
        self.compare = Some(Box::new(compare));
        self
    }

    /// Filter attached to this column, registered under the column id.
    pub fn filtered(mut self, spec: FilterSpec<T>) -> Self {
        self.filter = Some(spec);
        self
    }
}

/// Runtime column state.
pub struct Column<T> {
    pub(crate) id: String,
    pub(crate) label: String,
    pub(crate) selected: bool,
    pub(crate) can_hide: bool,
    pub(crate) sort: SortDirection,
    pub(crate) compare: Option<CompareFn<T>>,
    pub(crate) filterable: bool,
}

impl<T> Column<T> {
    /// Splits a spec into the runtime column and its attached filter, if any.
    pub(crate) fn from_spec(spec: ColumnSpec<T>) -> (Self, Option<FilterSpec<T>>) {
        let column = Self {
            id: spec.id,
            label: spec.label,
            selected: spec.selected,
            can_hide: spec.can_hide,
            sort: spec.sort,
            compare: spec.compare,
            filterable: spec.filter.is_some(),
        };
        (column, spec.filter)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether the column is currently shown.
    pub fn selected(&self) -> bool {
        self.selected
    }

    pub fn can_hide(&self) -> bool {
        self.can_hide
    }

    pub fn sort(&self) -> SortDirection {
        self.sort
    }

    pub fn sortable(&self) -> bool {
        self.compare.is_some()
    }

    pub fn filterable(&self) -> bool {
        self.filterable
    }
}

/// Keeps the first non-`None` sort direction and clears the rest.
pub(crate) fn enforce_single_sort<T>(columns: &mut [Column<T>]) {
    let mut seen = false;
    for column in columns.iter_mut() {
        if column.sort != SortDirection::None {
            if seen {
                column.sort = SortDirection::None;
            }
            seen = true;
        }
    }
}
