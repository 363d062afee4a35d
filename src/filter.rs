//! Named filters narrowing the visible record set.

use crate::search::Matcher;

/// How a filter participates in the combination step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    /// AND chain: records must match.
    Is,
    /// AND chain: records must not match.
    Not,
    /// OR group: at least one active `OneOf` filter must match.
    OneOf,
}

/// Free-text match function. Receives the record, the trimmed filter value,
/// and the default matcher compiled from that value.
pub type MatchFn<T> = Box<dyn Fn(&T, &str, &Matcher) -> bool>;

/// One selectable value of a select filter.
pub struct SelectOption<T> {
    label: String,
    predicate: Box<dyn Fn(&T) -> bool>,
}

impl<T> SelectOption<T> {
    pub fn new(label: impl Into<String>, predicate: impl Fn(&T) -> bool + 'static) -> Self {
        Self {
            label: label.into(),
            predicate: Box::new(predicate),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Filter payload, fixed at registration time.
pub enum FilterSpec<T> {
    /// Free-text filter; active once its trimmed value is non-empty.
    Text(MatchFn<T>),
    /// Discrete option set; active once at least one option is selected.
    Select(Vec<SelectOption<T>>),
}

enum Payload<T> {
    Text { value: String, match_fn: MatchFn<T> },
    Select {
        selected: Vec<String>,
        options: Vec<SelectOption<T>>,
    },
}

/// A registered filter.
pub struct Filter<T> {
    id: String,
    label: String,
    kind: FilterKind,
    payload: Payload<T>,
}

impl<T> Filter<T> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    /// Whether the filter currently narrows anything.
    pub fn is_active(&self) -> bool {
        match &self.payload {
            Payload::Text { value, .. } => !value.trim().is_empty(),
            Payload::Select { selected, .. } => !selected.is_empty(),
        }
    }

    /// Current text value, for text filters.
    pub fn text_value(&self) -> Option<&str> {
        match &self.payload {
            Payload::Text { value, .. } => Some(value),
            Payload::Select { .. } => None,
        }
    }

    /// Labels of the currently selected options, for select filters.
    pub fn selected_labels(&self) -> Option<&[String]> {
        match &self.payload {
            Payload::Select { selected, .. } => Some(selected),
            Payload::Text { .. } => None,
        }
    }

    /// Labels of all available options, for select filters.
    pub fn option_labels(&self) -> Option<Vec<&str>> {
        match &self.payload {
            Payload::Select { options, .. } => {
                Some(options.iter().map(|o| o.label.as_str()).collect())
            }
            Payload::Text { .. } => None,
        }
    }

    fn prepare(&self) -> Prepared<'_, T> {
        let want = self.kind != FilterKind::Not;
        let payload = match &self.payload {
            Payload::Text { value, match_fn } => {
                let value = value.trim().to_string();
                let matcher = Matcher::new(&value);
                PreparedPayload::Text {
                    value,
                    match_fn,
                    matcher,
                }
            }
            Payload::Select { selected, options } => PreparedPayload::Select {
                options: options
                    .iter()
                    .filter(|o| selected.iter().any(|s| s == &o.label))
                    .collect(),
            },
        };
        Prepared { want, payload }
    }
}

enum PreparedPayload<'a, T> {
    Text {
        value: String,
        match_fn: &'a MatchFn<T>,
        matcher: Matcher,
    },
    Select { options: Vec<&'a SelectOption<T>> },
}

/// A filter with its per-recomputation state (trimmed value, compiled
/// matcher, selected option subset) hoisted out of the per-record loop.
struct Prepared<'a, T> {
    want: bool,
    payload: PreparedPayload<'a, T>,
}

impl<T> Prepared<'_, T> {
    fn passes(&self, record: &T) -> bool {
        let hit = match &self.payload {
            PreparedPayload::Text {
                value,
                match_fn,
                matcher,
            } => match_fn(record, value, matcher),
            // A select filter matches when any selected option accepts the
            // record; options within one filter widen, distinct filters narrow.
            PreparedPayload::Select { options } => {
                options.iter().any(|o| (o.predicate)(record))
            }
        };
        hit == self.want
    }
}

/// The filter registry. Filters keep registration order, which is also the
/// evaluation order.
pub struct FilterSet<T> {
    filters: Vec<Filter<T>>,
}

impl<T> Default for FilterSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FilterSet<T> {
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Filter<T>> {
        self.filters.iter().find(|f| f.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Filter<T>> {
        self.filters.iter()
    }

    /// Registers a filter, replacing any filter with the same id. Returns
    /// true when an active filter was replaced and the view must recompute.
    pub(crate) fn add(
        &mut self,
        id: impl Into<String>,
        label: impl Into<String>,
        kind: FilterKind,
        spec: FilterSpec<T>,
    ) -> bool {
        let payload = match spec {
            FilterSpec::Text(match_fn) => Payload::Text {
                value: String::new(),
                match_fn,
            },
            FilterSpec::Select(options) => Payload::Select {
                selected: Vec::new(),
                options,
            },
        };
        let filter = Filter {
            id: id.into(),
            label: label.into(),
            kind,
            payload,
        };
        match self.filters.iter().position(|f| f.id == filter.id) {
            Some(pos) => {
                let was_active = self.filters[pos].is_active();
                self.filters[pos] = filter;
                was_active
            }
            None => {
                self.filters.push(filter);
                false
            }
        }
    }

    /// Removes a filter. Returns true when it existed.
    pub(crate) fn remove(&mut self, id: &str) -> bool {
        match self.filters.iter().position(|f| f.id == id) {
            Some(pos) => {
                self.filters.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Clears a filter's value (text) or selected options (select). Returns
    /// true when the filter exists.
    pub(crate) fn clear(&mut self, id: &str) -> bool {
        let Some(filter) = self.filters.iter_mut().find(|f| f.id == id) else {
            return false;
        };
        match &mut filter.payload {
            Payload::Text { value, .. } => value.clear(),
            Payload::Select { selected, .. } => selected.clear(),
        }
        true
    }

    /// Sets a text filter's value. Unknown ids and select filters are no-ops.
    pub(crate) fn set_text(&mut self, id: &str, value: &str) -> bool {
        let Some(filter) = self.filters.iter_mut().find(|f| f.id == id) else {
            return false;
        };
        match &mut filter.payload {
            Payload::Text { value: v, .. } => {
                *v = value.to_string();
                true
            }
            Payload::Select { .. } => false,
        }
    }

    /// Toggles a select filter's option by label, with set semantics.
    /// Unknown ids, text filters, and unknown labels are no-ops.
    pub(crate) fn toggle_option(&mut self, id: &str, label: &str) -> bool {
        let Some(filter) = self.filters.iter_mut().find(|f| f.id == id) else {
            return false;
        };
        match &mut filter.payload {
            Payload::Select { selected, options } => {
                if !options.iter().any(|o| o.label == label) {
                    return false;
                }
                match selected.iter().position(|s| s == label) {
                    Some(pos) => {
                        selected.remove(pos);
                    }
                    None => selected.push(label.to_string()),
                }
                true
            }
            Payload::Text { .. } => false,
        }
    }

    /// Applies every active filter to `keep` (candidate original indices),
    /// clearing `check_list` for each record dropped. Non-`OneOf` filters
    /// narrow sequentially; `OneOf` filters are deferred and combined with OR.
    pub(crate) fn apply(&self, source: &[T], keep: &mut Vec<usize>, check_list: &mut [bool]) {
        let mut one_of = Vec::new();
        for filter in self.filters.iter().filter(|f| f.is_active()) {
            if filter.kind == FilterKind::OneOf {
                one_of.push(filter.prepare());
                continue;
            }
            let prepared = filter.prepare();
            keep.retain(|&i| {
                if prepared.passes(&source[i]) {
                    true
                } else {
                    check_list[i] = false;
                    false
                }
            });
        }

        if !one_of.is_empty() {
            keep.retain(|&i| {
                if one_of.iter().any(|f| f.passes(&source[i])) {
                    true
                } else {
                    check_list[i] = false;
                    false
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Row {
        name: &'static str,
        country: &'static str,
    }

    const ROWS: &[Row] = &[
        Row { name: "Bob", country: "Germany" },
        Row { name: "alice", country: "France" },
        Row { name: "Eve", country: "Germany" },
        Row { name: "BOB2", country: "Spain" },
        Row { name: "Dan", country: "France" },
    ];

    fn name_filter() -> FilterSpec<Row> {
        FilterSpec::Text(Box::new(|row: &Row, _value, matcher: &Matcher| {
            matcher.matches(row.name)
        }))
    }

    fn country_options() -> Vec<SelectOption<Row>> {
        ["Germany", "France", "Spain"]
            .iter()
            .map(|&c| SelectOption::new(c, move |row: &Row| row.country == c))
            .collect()
    }

    fn run(filters: &FilterSet<Row>) -> (Vec<&'static str>, Vec<bool>) {
        let mut keep: Vec<usize> = (0..ROWS.len()).collect();
        let mut check_list = vec![true; ROWS.len()];
        filters.apply(ROWS, &mut keep, &mut check_list);
        let names = keep.iter().map(|&i| ROWS[i].name).collect();
        (names, check_list)
    }

    #[test]
    fn text_filter_inactive_until_nonblank() {
        let mut filters = FilterSet::new();
        filters.add("name", "Name", FilterKind::Is, name_filter());
        let (names, _) = run(&filters);
        assert_eq!(names.len(), ROWS.len());

        filters.set_text("name", "   ");
        let (names, _) = run(&filters);
        assert_eq!(names.len(), ROWS.len());

        filters.set_text("name", " bob ");
        let (names, check_list) = run(&filters);
        assert_eq!(names, ["Bob", "BOB2"]);
        assert_eq!(check_list, vec![true, false, false, true, false]);
    }

    #[test]
    fn not_kind_inverts_a_text_filter() {
        let mut filters = FilterSet::new();
        filters.add("name", "Name", FilterKind::Not, name_filter());
        filters.set_text("name", "bob");
        let (names, _) = run(&filters);
        assert_eq!(names, ["alice", "Eve", "Dan"]);
    }

    #[test]
    fn two_is_filters_intersect() {
        let mut filters = FilterSet::new();
        filters.add("name", "Name", FilterKind::Is, name_filter());
        filters.add(
            "country",
            "Country",
            FilterKind::Is,
            FilterSpec::Select(country_options()),
        );
        filters.set_text("name", "b");
        filters.toggle_option("country", "Germany");
        let (names, _) = run(&filters);
        assert_eq!(names, ["Bob"]);
    }

    #[test]
    fn options_within_one_select_filter_widen() {
        let mut filters = FilterSet::new();
        filters.add(
            "country",
            "Country",
            FilterKind::Is,
            FilterSpec::Select(country_options()),
        );
        filters.toggle_option("country", "Germany");
        let (names, _) = run(&filters);
        assert_eq!(names, ["Bob", "Eve"]);

        filters.toggle_option("country", "France");
        let (names, _) = run(&filters);
        assert_eq!(names, ["Bob", "alice", "Eve", "Dan"]);
    }

    #[test]
    fn not_kind_inverts_a_select_filter() {
        let mut filters = FilterSet::new();
        filters.add(
            "country",
            "Country",
            FilterKind::Not,
            FilterSpec::Select(country_options()),
        );
        filters.toggle_option("country", "Germany");
        let (names, _) = run(&filters);
        assert_eq!(names, ["alice", "BOB2", "Dan"]);
    }

    #[test]
    fn one_of_filters_union() {
        let mut filters = FilterSet::new();
        filters.add("name", "Name", FilterKind::OneOf, name_filter());
        filters.add(
            "country",
            "Country",
            FilterKind::OneOf,
            FilterSpec::Select(country_options()),
        );
        filters.set_text("name", "alice");
        filters.toggle_option("country", "Germany");
        let (names, check_list) = run(&filters);
        assert_eq!(names, ["Bob", "alice", "Eve"]);
        assert_eq!(check_list, vec![true, true, true, false, false]);
    }

    #[test]
    fn one_of_group_applies_after_the_and_chain() {
        let mut filters = FilterSet::new();
        filters.add("name", "Name", FilterKind::Is, name_filter());
        filters.add(
            "country",
            "Country",
            FilterKind::OneOf,
            FilterSpec::Select(country_options()),
        );
        filters.set_text("name", "e");
        filters.toggle_option("country", "France");
        let (names, _) = run(&filters);
        // "e" keeps alice and Eve; the OR group then keeps France only.
        assert_eq!(names, ["alice"]);
    }

    #[test]
    fn option_toggle_has_set_semantics() {
        let mut filters = FilterSet::new();
        filters.add(
            "country",
            "Country",
            FilterKind::Is,
            FilterSpec::Select(country_options()),
        );
        assert!(filters.toggle_option("country", "Germany"));
        assert!(filters.toggle_option("country", "Germany"));
        assert!(!filters.get("country").is_some_and(|f| f.is_active()));
        assert!(!filters.toggle_option("country", "Atlantis"));
    }

    #[test]
    fn mismatched_operations_are_noops() {
        let mut filters = FilterSet::new();
        filters.add("name", "Name", FilterKind::Is, name_filter());
        filters.add(
            "country",
            "Country",
            FilterKind::Is,
            FilterSpec::Select(country_options()),
        );
        assert!(!filters.set_text("country", "x"));
        assert!(!filters.toggle_option("name", "Germany"));
        assert!(!filters.set_text("missing", "x"));
        assert!(!filters.toggle_option("missing", "Germany"));
        assert!(!filters.remove("missing"));
        assert!(!filters.clear("missing"));
    }

    #[test]
    fn clear_resets_both_payload_kinds() {
        let mut filters = FilterSet::new();
        filters.add("name", "Name", FilterKind::Is, name_filter());
        filters.add(
            "country",
            "Country",
            FilterKind::Is,
            FilterSpec::Select(country_options()),
        );
        filters.set_text("name", "bob");
        filters.toggle_option("country", "Spain");
        assert!(filters.clear("name"));
        assert!(filters.clear("country"));
        let (names, _) = run(&filters);
        assert_eq!(names.len(), ROWS.len());
    }

    #[test]
    fn replacing_an_active_filter_reports_it() {
        let mut filters = FilterSet::new();
        assert!(!filters.add("name", "Name", FilterKind::Is, name_filter()));
        assert!(!filters.add("name", "Name", FilterKind::Is, name_filter()));
        filters.set_text("name", "bob");
        assert!(filters.add("name", "Name", FilterKind::Is, name_filter()));
    }
}
