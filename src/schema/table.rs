//! List queries and the table projection.
//!
//! [`plan`] turns request parameters into predicates, a sort and a page
//! window. [`apply`] evaluates a plan over in-memory rows; the Postgres
//! store compiles the same plan to SQL.

use chrono::{Days, Months, NaiveDate};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use super::form::{Options, DATE_DISPLAY_FORMAT};
use super::{ColumnFormat, Filter, Period, ResourceSchema, Sort, SortDirection, Toggle};
use crate::errors::AppError;
use crate::models::{FieldValue, Page, Row};

pub const MAX_PAGE_SIZE: u32 = 100;

const HEADER_ACTIONS: &[&str] = &["create"];
const RESOURCE_ACTIONS: &[&str] = &["view", "edit"];
const RELATION_ACTIONS: &[&str] = &["edit", "delete"];
const BULK_ACTIONS: &[&str] = &["delete"];

/// Raw list parameters as sent by the table UI.
///
/// `search[<column>]` holds per-column searches and `filter[<input>]` the
/// filter form inputs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableQuery {
    pub page: u32,
    pub per_page: u32,
    pub sort: Option<String>,
    pub direction: Option<String>,
    pub search: Option<String>,
    pub column_search: BTreeMap<String, String>,
    pub filters: BTreeMap<String, String>,
    pub tab: Option<String>,
}

impl TableQuery {
    pub fn new(per_page: u32) -> Self {
        TableQuery { page: 1, per_page, ..TableQuery::default() }
    }

    pub fn from_params(
        params: &HashMap<String, String>,
        default_per_page: u32,
    ) -> Result<Self, AppError> {
        let mut query = TableQuery::new(default_per_page);
        for (key, value) in params {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key.as_str() {
                "page" => query.page = parse_number(key, value)?.max(1),
                "per_page" => query.per_page = parse_number(key, value)?.clamp(1, MAX_PAGE_SIZE),
                "sort" => query.sort = Some(value.to_string()),
                "direction" => query.direction = Some(value.to_lowercase()),
                "search" => query.search = Some(value.to_string()),
                "tab" => query.tab = Some(value.to_string()),
                _ => {
                    if let Some(column) = bracketed(key, "search") {
                        query.column_search.insert(column.to_string(), value.to_string());
                    } else if let Some(input) = bracketed(key, "filter") {
                        query.filters.insert(input.to_string(), value.to_string());
                    }
                }
            }
        }
        Ok(query)
    }
}

fn bracketed<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    key.strip_prefix(prefix)?.strip_prefix('[')?.strip_suffix(']')
}

fn parse_number(key: &str, value: &str) -> Result<u32, AppError> {
    value
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid value for '{}'", key)))
}

fn parse_date(key: &str, value: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        AppError::BadRequest(format!("Invalid date for '{}', expected YYYY-MM-DD", key))
    })
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Case-insensitive substring match on any of the cells.
    Contains { keys: Vec<&'static str>, needle: String },
    Equals { key: &'static str, id: i64 },
    OnOrAfter { key: &'static str, date: NaiveDate },
    OnOrBefore { key: &'static str, date: NaiveDate },
}

impl Predicate {
    pub fn matches(&self, row: &Row) -> bool {
        match self {
            Predicate::Contains { keys, needle } => {
                let needle = needle.to_lowercase();
                keys.iter()
                    .any(|key| row.cell(key).display().to_lowercase().contains(&needle))
            }
            Predicate::Equals { key, id } => row.cell(key).as_id() == Some(*id),
            Predicate::OnOrAfter { key, date } => {
                row.cell(key).as_date().map_or(false, |d| d >= *date)
            }
            Predicate::OnOrBefore { key, date } => {
                row.cell(key).as_date().map_or(false, |d| d <= *date)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListPlan {
    pub predicates: Vec<Predicate>,
    /// `None` lists in id order.
    pub sort: Option<Sort>,
    pub offset: u64,
    pub limit: u64,
}

/// Resolves a query against the schema. `scope` pins a foreign key for relation managers.
pub fn plan(
    schema: &ResourceSchema,
    query: &TableQuery,
    scope: Option<(&'static str, i64)>,
    today: NaiveDate,
) -> Result<ListPlan, AppError> {
    let mut predicates = Vec::new();

    if let Some((key, id)) = scope {
        predicates.push(Predicate::Equals { key, id });
    }

    if let Some(needle) = &query.search {
        let keys: Vec<&'static str> = schema
            .columns
            .iter()
            .filter(|column| column.search.global)
            .map(|column| column.key)
            .collect();
        if !keys.is_empty() {
            predicates.push(Predicate::Contains { keys, needle: needle.clone() });
        }
    }

    for (key, needle) in &query.column_search {
        let column = schema
            .column(key)
            .filter(|column| column.search.individual)
            .ok_or_else(|| AppError::BadRequest(format!("Column '{}' is not searchable", key)))?;
        predicates.push(Predicate::Contains { keys: vec![column.key], needle: needle.clone() });
    }

    for filter in &schema.filters {
        match filter {
            Filter::Select { field, .. } => {
                if let Some(raw) = query.filters.get(*field) {
                    let id = raw.parse::<i64>().map_err(|_| {
                        AppError::BadRequest(format!("Invalid value for filter '{}'", field))
                    })?;
                    predicates.push(Predicate::Equals { key: *field, id });
                }
            }
            Filter::DateRange { column, from, until } => {
                if let Some(raw) = query.filters.get(from.0) {
                    let date = parse_date(from.0, raw)?;
                    predicates.push(Predicate::OnOrAfter { key: *column, date });
                }
                if let Some(raw) = query.filters.get(until.0) {
                    let date = parse_date(until.0, raw)?;
                    predicates.push(Predicate::OnOrBefore { key: *column, date });
                }
            }
        }
    }

    if let Some(key) = &query.tab {
        let tab = schema
            .tab(key)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown tab '{}'", key)))?;
        predicates.extend(tab_predicate(tab.since, today));
    }

    let direction = match query.direction.as_deref() {
        None | Some("asc") => SortDirection::Asc,
        Some("desc") => SortDirection::Desc,
        Some(other) => {
            return Err(AppError::BadRequest(format!("Invalid sort direction '{}'", other)))
        }
    };
    let sort = match &query.sort {
        Some(key) => {
            let column = schema
                .column(key)
                .filter(|column| column.sortable)
                .ok_or_else(|| AppError::BadRequest(format!("Column '{}' is not sortable", key)))?;
            Some(Sort { key: column.key, direction })
        }
        None => schema.default_sort,
    };

    let per_page = query.per_page.clamp(1, MAX_PAGE_SIZE) as u64;
    let page = query.page.max(1) as u64;
    Ok(ListPlan { predicates, sort, offset: (page - 1) * per_page, limit: per_page })
}

/// Predicate of a list tab, if it narrows anything.
pub fn tab_predicate(since: Option<(&'static str, Period)>, today: NaiveDate) -> Option<Predicate> {
    let (key, period) = since?;
    let date = match period {
        Period::Week => today.checked_sub_days(Days::new(7)),
        Period::Month => today.checked_sub_months(Months::new(1)),
        Period::Year => today.checked_sub_months(Months::new(12)),
    }?;
    Some(Predicate::OnOrAfter { key, date })
}

/// Filters, sorts and paginates rows already in id order.
pub fn apply(rows: Vec<Row>, plan: &ListPlan) -> Page {
    let mut rows: Vec<Row> = rows
        .into_iter()
        .filter(|row| plan.predicates.iter().all(|predicate| predicate.matches(row)))
        .collect();
    sort_rows(&mut rows, plan.sort);
    let total = rows.len() as u64;
    let rows = rows
        .into_iter()
        .skip(plan.offset as usize)
        .take(plan.limit as usize)
        .collect();
    Page { total, rows }
}

/// Stable: rows that compare equal keep their incoming order.
pub fn sort_rows(rows: &mut [Row], sort: Option<Sort>) {
    let Some(sort) = sort else {
        return;
    };
    rows.sort_by(|a, b| {
        let (left, right) = (a.cell(sort.key), b.cell(sort.key));
        match (sort.direction, left.is_null() || right.is_null()) {
            (SortDirection::Desc, false) => right.sort_cmp(&left),
            _ => left.sort_cmp(&right),
        }
    });
}

pub fn format_cell(format: ColumnFormat, value: &FieldValue) -> String {
    match (format, value) {
        (ColumnFormat::Date, _) => value
            .as_date()
            .map(|date| date.format("%b %-d, %Y").to_string())
            .unwrap_or_default(),
        (ColumnFormat::DateTime, FieldValue::Timestamp(at)) => {
            at.format("%b %-d, %Y %H:%M:%S").to_string()
        }
        _ => value.display(),
    }
}

#[derive(Debug, Serialize)]
pub struct TableView {
    pub resource: &'static str,
    pub heading: String,
    pub columns: Vec<ColumnView>,
    pub rows: Vec<RowView>,
    pub filters: Vec<FilterView>,
    pub indicators: Vec<Indicator>,
    pub tabs: Vec<TabView>,
    pub pagination: Pagination,
    pub header_actions: &'static [&'static str],
    pub actions: &'static [&'static str],
    pub bulk_actions: &'static [&'static str],
}

#[derive(Debug, Serialize)]
pub struct ColumnView {
    pub key: &'static str,
    pub label: String,
    pub sortable: bool,
    pub searchable: bool,
    pub individually_searchable: bool,
    pub toggleable: bool,
    pub hidden: bool,
    pub format: ColumnFormat,
}

#[derive(Debug, Serialize)]
pub struct RowView {
    pub id: i64,
    pub cells: BTreeMap<&'static str, String>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterView {
    Select {
        name: &'static str,
        label: &'static str,
        options: Vec<crate::models::SelectOption>,
        value: Option<String>,
    },
    DateRange {
        column: &'static str,
        inputs: Vec<FilterInput>,
    },
}

#[derive(Debug, Serialize)]
pub struct FilterInput {
    pub name: &'static str,
    pub label: &'static str,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Indicator {
    pub filter: &'static str,
    pub label: String,
}

#[derive(Debug, Serialize)]
pub struct TabView {
    pub key: &'static str,
    pub label: &'static str,
    pub badge: Option<u64>,
    pub active: bool,
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub last_page: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableMode {
    Resource,
    /// Embedded under a parent record's view.
    Relation,
}

/// Data the table needs besides the page itself.
#[derive(Debug, Default)]
pub struct TableContext {
    /// Options of select filters, keyed by field.
    pub filter_options: Options,
    pub tab_badges: BTreeMap<&'static str, u64>,
}

/// Labels describing the active filters, e.g. `Department: Sales`.
pub fn indicators(
    schema: &ResourceSchema,
    query: &TableQuery,
    context: &TableContext,
) -> Vec<Indicator> {
    let mut indicators = Vec::new();
    for filter in &schema.filters {
        match filter {
            Filter::Select { field, indicator, .. } => {
                if let Some(raw) = query.filters.get(*field) {
                    let name = context
                        .filter_options
                        .get(field)
                        .and_then(|options| options.iter().find(|o| o.id.to_string() == *raw))
                        .map(|o| o.label.clone())
                        .unwrap_or_else(|| raw.clone());
                    let label = format!("{}: {}", indicator, name);
                    indicators.push(Indicator { filter: *field, label });
                }
            }
            Filter::DateRange { column, from, until } => {
                for &(name, label) in [from, until] {
                    let date = query
                        .filters
                        .get(name)
                        .and_then(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok());
                    if let Some(date) = date {
                        indicators.push(Indicator {
                            filter: *column,
                            label: format!(
                                "{} {}",
                                label,
                                date.format(&chrono_format(DATE_DISPLAY_FORMAT))
                            ),
                        });
                    }
                }
            }
        }
    }
    indicators
}

/// `d/m/Y` -> `%d/%m/%Y`
pub fn chrono_format(display_format: &str) -> String {
    display_format
        .chars()
        .map(|c| match c {
            'd' | 'm' | 'Y' | 'H' => format!("%{}", c),
            'i' => "%M".to_string(),
            other => other.to_string(),
        })
        .collect()
}

pub fn project(
    schema: &ResourceSchema,
    query: &TableQuery,
    page: &Page,
    context: &TableContext,
    mode: TableMode,
) -> TableView {
    let columns = schema
        .columns
        .iter()
        .map(|column| ColumnView {
            key: column.key,
            label: column.label.clone(),
            sortable: column.sortable,
            searchable: column.search.global,
            individually_searchable: column.search.individual,
            toggleable: column.toggle != Toggle::Fixed,
            hidden: column.toggle == Toggle::Hidden,
            format: column.format,
        })
        .collect();

    let rows = page
        .rows
        .iter()
        .map(|row| RowView {
            id: row.id,
            cells: schema
                .columns
                .iter()
                .map(|column| (column.key, format_cell(column.format, &row.cell(column.key))))
                .collect(),
        })
        .collect();

    let filters = schema
        .filters
        .iter()
        .map(|filter| match filter {
            Filter::Select { field, label, .. } => FilterView::Select {
                name: *field,
                label: *label,
                options: context.filter_options.get(field).cloned().unwrap_or_default(),
                value: query.filters.get(*field).cloned(),
            },
            Filter::DateRange { column, from, until } => FilterView::DateRange {
                column: *column,
                inputs: [from, until]
                    .into_iter()
                    .map(|&(name, label)| FilterInput {
                        name,
                        label,
                        value: query.filters.get(name).cloned(),
                    })
                    .collect(),
            },
        })
        .collect();

    let tabs = match mode {
        TableMode::Resource => schema
            .tabs
            .iter()
            .map(|tab| TabView {
                key: tab.key,
                label: tab.label,
                badge: context.tab_badges.get(tab.key).copied(),
                active: query.tab.as_deref().unwrap_or("all") == tab.key,
            })
            .collect(),
        TableMode::Relation => Vec::new(),
    };

    let per_page = query.per_page.clamp(1, MAX_PAGE_SIZE);
    let actions = match mode {
        TableMode::Resource => RESOURCE_ACTIONS,
        TableMode::Relation => RELATION_ACTIONS,
    };

    TableView {
        resource: schema.slug,
        heading: schema.navigation.label.to_string(),
        columns,
        rows,
        filters,
        indicators: indicators(schema, query, context),
        tabs,
        pagination: Pagination {
            page: query.page.max(1),
            per_page,
            total: page.total,
            last_page: page.total.div_ceil(per_page as u64).max(1),
        },
        header_actions: HEADER_ACTIONS,
        actions,
        bulk_actions: BULK_ACTIONS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Values;
    use crate::resources;
    use chrono::{TimeZone, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn row(id: i64, name: &str, created: NaiveDate) -> Row {
        let at = Utc.from_utc_datetime(&created.and_hms_opt(9, 30, 0).unwrap());
        let mut values = Values::new();
        values.insert("name".to_string(), FieldValue::Text(name.to_string()));
        Row { id, values, related: Values::new(), created_at: at, updated_at: at }
    }

    fn names(page: &Page) -> Vec<String> {
        page.rows.iter().map(|row| row.cell("name").display()).collect()
    }

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn created_rows() -> Vec<Row> {
        vec![
            row(1, "Jan", date(2024, 1, 1)),
            row(2, "Jun", date(2024, 6, 1)),
            row(3, "Dec", date(2024, 12, 1)),
        ]
    }

    #[test]
    fn date_range_bounds_are_inclusive_and_optional() {
        let schema = resources::employee::schema();
        let today = date(2025, 1, 1);

        let from = params(&[("filter[created_from]", "2024-02-01")]);
        let query = TableQuery::from_params(&from, 10).unwrap();
        let page = apply(created_rows(), &plan(&schema, &query, None, today).unwrap());
        assert_eq!(names(&page), vec!["Jun", "Dec"]);

        let query = TableQuery::from_params(
            &params(&[
                ("filter[created_from]", "2024-02-01"),
                ("filter[created_until]", "2024-07-01"),
            ]),
            10,
        )
        .unwrap();
        let page = apply(created_rows(), &plan(&schema, &query, None, today).unwrap());
        assert_eq!(names(&page), vec!["Jun"]);

        let until = params(&[("filter[created_until]", "2024-06-01")]);
        let query = TableQuery::from_params(&until, 10).unwrap();
        let page = apply(created_rows(), &plan(&schema, &query, None, today).unwrap());
        assert_eq!(names(&page), vec!["Jan", "Jun"]);

        let unfiltered = plan(&schema, &TableQuery::new(10), None, today).unwrap();
        let page = apply(created_rows(), &unfiltered);
        assert_eq!(page.total, 3);
    }

    #[test]
    fn sorting_by_name_is_ascending_or_descending() {
        let schema = resources::department::schema();
        let rows = vec![
            row(1, "Banana", date(2024, 1, 1)),
            row(2, "Apple", date(2024, 1, 1)),
            row(3, "Cherry", date(2024, 1, 1)),
        ];
        let today = date(2025, 1, 1);

        let query = TableQuery::from_params(&params(&[("sort", "name")]), 10).unwrap();
        let page = apply(rows.clone(), &plan(&schema, &query, None, today).unwrap());
        assert_eq!(names(&page), vec!["Apple", "Banana", "Cherry"]);

        let sort = params(&[("sort", "name"), ("direction", "desc")]);
        let query = TableQuery::from_params(&sort, 10).unwrap();
        let page = apply(rows, &plan(&schema, &query, None, today).unwrap());
        assert_eq!(names(&page), vec!["Cherry", "Banana", "Apple"]);
    }

    #[test]
    fn ties_keep_id_order() {
        let mut rows = vec![
            row(1, "Same", date(2024, 1, 1)),
            row(2, "Alpha", date(2024, 1, 1)),
            row(3, "Same", date(2024, 1, 1)),
            row(4, "Same", date(2024, 1, 1)),
        ];
        for direction in [SortDirection::Asc, SortDirection::Desc] {
            sort_rows(&mut rows, Some(Sort { key: "name", direction }));
            let same: Vec<i64> = rows
                .iter()
                .filter(|r| r.cell("name").display() == "Same")
                .map(|r| r.id)
                .collect();
            assert_eq!(same, vec![1, 3, 4]);
        }
    }

    #[test]
    fn unknown_or_unsortable_columns_are_rejected() {
        let schema = resources::country::schema();
        let today = date(2025, 1, 1);

        let query = TableQuery::from_params(&params(&[("sort", "phonecode")]), 10).unwrap();
        assert!(matches!(plan(&schema, &query, None, today), Err(AppError::BadRequest(_))));

        let query = TableQuery::from_params(&params(&[("search[nope]", "x")]), 10).unwrap();
        assert!(matches!(plan(&schema, &query, None, today), Err(AppError::BadRequest(_))));

        let query = TableQuery::from_params(&params(&[("direction", "sideways")]), 10).unwrap();
        assert!(matches!(plan(&schema, &query, None, today), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn global_search_skips_individual_only_columns() {
        let schema = resources::state::schema();
        let query = TableQuery::from_params(&params(&[("search", "tur")]), 10).unwrap();
        let plan = plan(&schema, &query, None, date(2025, 1, 1)).unwrap();

        assert_eq!(
            plan.predicates,
            vec![Predicate::Contains { keys: vec!["name"], needle: "tur".to_string() }]
        );
    }

    #[test]
    fn search_is_case_insensitive() {
        let predicate = Predicate::Contains { keys: vec!["name"], needle: "AN".to_string() };
        assert!(predicate.matches(&row(1, "Banana", date(2024, 1, 1))));
        assert!(!predicate.matches(&row(2, "Cherry", date(2024, 1, 1))));
    }

    #[test]
    fn pagination_windows_the_sorted_rows() {
        let schema = resources::department::schema();
        let rows: Vec<Row> =
            (1..=7).map(|id| row(id, &format!("D{}", id), date(2024, 1, 1))).collect();
        let query =
            TableQuery::from_params(&params(&[("page", "2"), ("per_page", "3")]), 10).unwrap();

        let page = apply(rows, &plan(&schema, &query, None, date(2025, 1, 1)).unwrap());
        assert_eq!(page.total, 7);
        assert_eq!(names(&page), vec!["D4", "D5", "D6"]);

        let view = project(&schema, &query, &page, &TableContext::default(), TableMode::Resource);
        assert_eq!(view.pagination.last_page, 3);
    }

    #[test]
    fn tabs_narrow_on_hire_date() {
        let today = date(2024, 3, 31);
        let Some(Predicate::OnOrAfter { key, date: since }) =
            tab_predicate(Some(("date_hired", Period::Month)), today)
        else {
            panic!("expected a lower bound");
        };
        assert_eq!(key, "date_hired");
        assert_eq!(since, date(2024, 2, 29));
        assert_eq!(tab_predicate(None, today), None);
    }

    #[test]
    fn indicators_describe_active_filters() {
        let schema = resources::employee::schema();
        let query = TableQuery::from_params(
            &params(&[("filter[department_id]", "2"), ("filter[created_from]", "2024-02-01")]),
            10,
        )
        .unwrap();
        let mut context = TableContext::default();
        context.filter_options.insert(
            "department_id",
            vec![crate::models::SelectOption { id: 2, label: "Sales".to_string() }],
        );

        let labels: Vec<String> =
            indicators(&schema, &query, &context).into_iter().map(|i| i.label).collect();
        assert_eq!(labels, vec!["Department: Sales", "Created from 01/02/2024"]);
    }

    #[test]
    fn projection_formats_cells_and_hides_toggled_columns() {
        let schema = resources::department::schema();
        let mut department = row(1, "Sales", date(2024, 5, 6));
        department.related.insert("employees_count".to_string(), FieldValue::Integer(3));
        let page = Page { total: 1, rows: vec![department] };

        let context = TableContext::default();
        let view = project(&schema, &TableQuery::new(10), &page, &context, TableMode::Resource);
        assert_eq!(view.rows[0].cells["employees_count"], "3");
        assert_eq!(view.rows[0].cells["created_at"], "May 6, 2024 09:30:00");
        let created = view.columns.iter().find(|c| c.key == "created_at").unwrap();
        assert!(created.hidden && created.toggleable);
    }

    #[test]
    fn date_columns_render_without_a_time() {
        let schema = resources::employee::schema();
        let mut employee = row(1, "Ada", date(2024, 5, 6));
        employee.values.insert("date_hired".to_string(), FieldValue::Date(date(2024, 3, 9)));
        let page = Page { total: 1, rows: vec![employee] };

        let context = TableContext::default();
        let view = project(&schema, &TableQuery::new(10), &page, &context, TableMode::Resource);
        assert_eq!(view.rows[0].cells["date_hired"], "Mar 9, 2024");
        assert_eq!(view.rows[0].cells["date_of_birth"], "");
        let hired = view.columns.iter().find(|c| c.key == "date_hired").unwrap();
        assert_eq!(hired.format, ColumnFormat::Date);
    }
}
