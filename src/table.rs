//! Table store: the filter → search → sort → paginate derivation pipeline.

use tracing::debug;

use crate::column::{Column, ColumnSpec, SortDirection, enforce_single_sort};
use crate::filter::{FilterKind, FilterSet, FilterSpec, SelectOption};
use crate::pagination::{DEFAULT_PAGE_SIZES, Pagination};
use crate::persist::{ConfigStore, TableConfig};
use crate::search::Matcher;
use crate::selection::Selection;
use crate::view::{ColumnView, IndexedRecord, PageInfo, SelectionView, TableView};

/// Seam to the opaque record type. The engine never prescribes the record's
/// shape beyond enumerating its string-coercible field values, which is what
/// the global search runs against.
pub trait Record {
    fn fields(&self) -> Vec<String>;
}

/// Construction options.
pub struct TableOptions {
    pub page_size: usize,
    pub page_size_options: Vec<usize>,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            page_size: 10,
            page_size_options: DEFAULT_PAGE_SIZES.to_vec(),
        }
    }
}

struct PersistHandle {
    store: Box<dyn ConfigStore>,
    id: String,
}

/// The table engine.
///
/// Owns the source rows and every piece of derived state. All mutation goes
/// through the command methods below; each one synchronously recomputes the
/// affected pipeline stages, so a [`Table::view`] snapshot taken afterwards
/// is always consistent. Derived sequences depend only on the source, the
/// filter and search state, and the active sort, never on mutation history.
pub struct Table<T> {
    source: Vec<T>,
    columns: Vec<Column<T>>,
    filters: FilterSet<T>,
    search: String,
    selection: Selection,
    pagination: Pagination,
    /// Original indices surviving every filter stage, in source order.
    filtered: Vec<usize>,
    /// `filtered`, reordered by the active sort.
    sorted: Vec<usize>,
    /// Per source row: survived every filter stage.
    check_list: Vec<bool>,
    persist: Option<PersistHandle>,
}

impl<T: Record> Table<T> {
    pub fn new(source: Vec<T>, columns: Vec<ColumnSpec<T>>) -> Self {
        Self::with_options(source, columns, TableOptions::default())
    }

    pub fn with_options(
        source: Vec<T>,
        columns: Vec<ColumnSpec<T>>,
        options: TableOptions,
    ) -> Self {
        Self::build(source, columns, options, None)
    }

    /// A table with persisted column/sort/page-size configuration. The blob
    /// stored under `id`, when present and well-formed, overrides the column
    /// and page-size defaults before the first derivation.
    pub fn persisted(
        source: Vec<T>,
        columns: Vec<ColumnSpec<T>>,
        options: TableOptions,
        store: Box<dyn ConfigStore>,
        id: impl Into<String>,
    ) -> Self {
        Self::build(
            source,
            columns,
            options,
            Some(PersistHandle {
                store,
                id: id.into(),
            }),
        )
    }

    fn build(
        source: Vec<T>,
        specs: Vec<ColumnSpec<T>>,
        options: TableOptions,
        persist: Option<PersistHandle>,
    ) -> Self {
        let mut filters = FilterSet::new();
        let mut columns = Vec::with_capacity(specs.len());
        for spec in specs {
            let (column, filter_spec) = Column::from_spec(spec);
            if let Some(filter_spec) = filter_spec {
                let kind = match &filter_spec {
                    FilterSpec::Text(_) => FilterKind::Is,
                    FilterSpec::Select(_) => FilterKind::OneOf,
                };
                filters.add(
                    column.id().to_string(),
                    column.label().to_string(),
                    kind,
                    filter_spec,
                );
            }
            columns.push(column);
        }
        enforce_single_sort(&mut columns);

        let len = source.len();
        let mut table = Self {
            source,
            columns,
            filters,
            search: String::new(),
            selection: Selection::new(len),
            pagination: Pagination::new(options.page_size, options.page_size_options),
            filtered: Vec::new(),
            sorted: Vec::new(),
            check_list: vec![true; len],
            persist,
        };
        table.load_config();
        table.refilter(false);
        table
    }

    // --- source ---

    /// Replaces the source collection. Filter, sort, column, and pagination
    /// configuration survive; row selection is rebuilt and the page index is
    /// clamped to the new page count.
    pub fn reset(&mut self, source: Vec<T>) {
        debug!(rows = source.len(), "table source replaced");
        self.source = source;
        self.selection.reset(self.source.len());
        self.refilter(false);
    }

    pub fn source(&self) -> &[T] {
        &self.source
    }

    // --- global search ---

    pub fn set_global_search(&mut self, value: impl Into<String>) {
        self.search = value.into();
        self.refilter(true);
    }

    pub fn clear_global_search(&mut self) {
        self.set_global_search("");
    }

    pub fn global_search(&self) -> &str {
        &self.search
    }

    // --- filters ---

    /// Registers a free-text filter, replacing any filter with the same id.
    pub fn add_text_filter(
        &mut self,
        id: impl Into<String>,
        label: impl Into<String>,
        kind: FilterKind,
        match_fn: impl Fn(&T, &str, &Matcher) -> bool + 'static,
    ) {
        let spec = FilterSpec::Text(Box::new(match_fn));
        if self.filters.add(id, label, kind, spec) {
            self.refilter(true);
        }
    }

    /// Registers a select filter, replacing any filter with the same id.
    pub fn add_select_filter(
        &mut self,
        id: impl Into<String>,
        label: impl Into<String>,
        kind: FilterKind,
        options: Vec<SelectOption<T>>,
    ) {
        if self.filters.add(id, label, kind, FilterSpec::Select(options)) {
            self.refilter(true);
        }
    }

    pub fn remove_filter(&mut self, id: &str) {
        if self.filters.remove(id) {
            self.refilter(true);
        }
    }

    pub fn clear_filter(&mut self, id: &str) {
        if self.filters.clear(id) {
            self.refilter(true);
        }
    }

    pub fn set_filter_text(&mut self, id: &str, value: &str) {
        if self.filters.set_text(id, value) {
            self.refilter(true);
        }
    }

    pub fn toggle_filter_option(&mut self, id: &str, label: &str) {
        if self.filters.toggle_option(id, label) {
            self.refilter(true);
        }
    }

    pub fn filters(&self) -> &FilterSet<T> {
        &self.filters
    }

    // --- columns ---

    /// Flips column visibility. Locked and unknown columns are left alone;
    /// visibility never touches the data pipeline.
    pub fn toggle_column(&mut self, id: &str) {
        let Some(column) = self.columns.iter_mut().find(|c| c.id() == id) else {
            return;
        };
        if !column.can_hide() {
            return;
        }
        column.selected = !column.selected;
        self.save_config();
    }

    /// Sets a column's sort direction, clearing every other column. Setting
    /// the current direction again short-circuits without a resort.
    pub fn set_sort(&mut self, id: &str, direction: SortDirection) {
        let Some(pos) = self.columns.iter().position(|c| c.id() == id) else {
            return;
        };
        if self.columns[pos].sort == direction {
            return;
        }
        for (i, column) in self.columns.iter_mut().enumerate() {
            column.sort = if i == pos {
                direction
            } else {
                SortDirection::None
            };
        }
        self.resort(true);
        self.save_config();
    }

    pub fn columns(&self) -> &[Column<T>] {
        &self.columns
    }

    // --- selection ---

    /// Checks or unchecks every currently visible row; rows hidden by a
    /// filter keep their state.
    pub fn toggle_global(&mut self, checked: bool) {
        self.selection.toggle_global(checked, &self.check_list);
    }

    /// Checks or unchecks one row by its original index.
    pub fn toggle_row(&mut self, index: usize, checked: bool) {
        self.selection.toggle_row(index, checked, &self.check_list);
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    // --- pagination ---

    pub fn first(&mut self) {
        self.pagination.first();
    }

    pub fn prev(&mut self) {
        self.pagination.prev();
    }

    pub fn next(&mut self) {
        self.pagination.next();
    }

    pub fn last(&mut self) {
        self.pagination.last();
    }

    pub fn to(&mut self, page: usize) {
        self.pagination.jump(page);
    }

    pub fn set_page_size(&mut self, size: usize) {
        if self.pagination.set_page_size(size) {
            self.save_config();
        }
    }

    pub fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    // --- derived reads ---

    pub fn filtered_len(&self) -> usize {
        self.filtered.len()
    }

    /// Per source row: whether it survives the current filters and search.
    pub fn check_list(&self) -> &[bool] {
        &self.check_list
    }

    /// Rows of the current page, in display order.
    pub fn page_rows(&self) -> impl Iterator<Item = IndexedRecord<'_, T>> {
        let (start, end) = self.pagination.page_bounds();
        self.sorted[start..end].iter().map(|&i| IndexedRecord {
            record: &self.source[i],
            original_index: i,
        })
    }

    /// Complete snapshot for the presentation layer.
    pub fn view(&self) -> TableView<'_, T> {
        TableView {
            rows: self.page_rows().collect(),
            columns: self.columns.iter().map(ColumnView::from_column).collect(),
            pagination: PageInfo::from_pagination(&self.pagination),
            selection: SelectionView::from_selection(&self.selection),
        }
    }

    // --- pipeline ---

    /// Full pipeline: global search, then the filter registry, then sort and
    /// pagination. A row dropped at any stage is cleared in the check list
    /// and never reinstated within one pass.
    fn refilter(&mut self, reset_page: bool) {
        self.check_list.clear();
        self.check_list.resize(self.source.len(), true);
        self.filtered = (0..self.source.len()).collect();

        if !self.search.is_empty() {
            let matcher = Matcher::new(&self.search);
            let source = &self.source;
            let check_list = &mut self.check_list;
            self.filtered.retain(|&i| {
                if source[i].fields().iter().any(|f| matcher.matches(f)) {
                    true
                } else {
                    check_list[i] = false;
                    false
                }
            });
        }

        self.filters
            .apply(&self.source, &mut self.filtered, &mut self.check_list);
        self.selection.recompute(&self.check_list);
        self.resort(reset_page);
    }

    /// Sort stage and below; refilters nothing.
    fn resort(&mut self, reset_page: bool) {
        if reset_page {
            self.pagination.first();
        }
        self.sorted = self.sort_indices();
        self.pagination.set_total(self.filtered.len());
    }

    /// Stable-sorts the filtered indices by the single active sort column,
    /// if it has a comparator; otherwise keeps filtered (source) order.
    fn sort_indices(&self) -> Vec<usize> {
        let mut sorted = self.filtered.clone();
        for column in &self.columns {
            let Some(compare) = column.compare.as_ref() else {
                continue;
            };
            match column.sort {
                SortDirection::None => continue,
                SortDirection::Asc => {
                    sorted.sort_by(|&a, &b| compare(&self.source[a], &self.source[b]));
                }
                SortDirection::Desc => {
                    sorted.sort_by(|&a, &b| compare(&self.source[b], &self.source[a]));
                }
            }
            break;
        }
        sorted
    }

    // --- persistence ---

    fn load_config(&mut self) {
        let Some(handle) = &self.persist else { return };
        let Some(blob) = handle.store.load(&handle.id) else {
            return;
        };
        let Some(config) = TableConfig::decode(&blob) else {
            return;
        };
        config.apply(&mut self.columns, &mut self.pagination);
        enforce_single_sort(&mut self.columns);
    }

    fn save_config(&self) {
        let Some(handle) = &self.persist else { return };
        let Some(blob) = TableConfig::snapshot(&self.columns, &self.pagination).encode() else {
            return;
        };
        handle.store.save(&handle.id, &blob);
    }
}
