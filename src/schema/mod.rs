//! Declarative resource descriptions.
//!
//! Each entity is described once by a [`ResourceSchema`]; the form, table and
//! infolist views are pure projections of it (see [`form`], [`table`] and
//! [`infolist`]), and the stores generate their queries from it.

pub mod cascade;
pub mod form;
pub mod infolist;
pub mod table;

use serde::Serialize;

use crate::errors::AppError;
use crate::models::Row;

/// What a dependent select offers while its parent field is still empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnsetParent {
    ShowAll,
    ShowNone,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Text { max_length: usize },
    Integer { max_digits: usize },
    Date,
    /// Single-select foreign key into `table`, displayed by its `title` column.
    BelongsTo { table: &'static str, title: &'static str },
}

/// Cascade link: the options of the field are the rows of its table whose
/// `column` equals the current value of `parent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependency {
    pub parent: &'static str,
    pub column: &'static str,
    pub when_unset: UnsetParent,
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub depends_on: Option<Dependency>,
}

impl Field {
    fn new(name: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Field { name, label, kind, required: false, depends_on: None }
    }

    pub fn text(name: &'static str, label: &'static str) -> Self {
        Field::new(name, label, FieldKind::Text { max_length: 255 })
    }

    pub fn integer(name: &'static str, label: &'static str, max_digits: usize) -> Self {
        Field::new(name, label, FieldKind::Integer { max_digits })
    }

    pub fn date(name: &'static str, label: &'static str) -> Self {
        Field::new(name, label, FieldKind::Date)
    }

    pub fn belongs_to(name: &'static str, label: &'static str, table: &'static str) -> Self {
        Field::new(name, label, FieldKind::BelongsTo { table, title: "name" })
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn max_length(mut self, max_length: usize) -> Self {
        if let FieldKind::Text { .. } = self.kind {
            self.kind = FieldKind::Text { max_length };
        }
        self
    }

    /// Narrows the options to rows whose `parent` column matches the parent field's value.
    pub fn depends_on(mut self, parent: &'static str, when_unset: UnsetParent) -> Self {
        self.depends_on = Some(Dependency { parent, column: parent, when_unset });
        self
    }

    /// `country_id` -> `country`
    pub fn relation_name(&self) -> Option<&'static str> {
        match self.kind {
            FieldKind::BelongsTo { .. } => Some(self.name.strip_suffix("_id").unwrap_or(self.name)),
            _ => None,
        }
    }

    /// Cell key of the related record's title, e.g. `country.name`.
    pub fn relation_key(&self) -> Option<String> {
        match self.kind {
            FieldKind::BelongsTo { title, .. } => {
                self.relation_name().map(|relation| format!("{}.{}", relation, title))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FormSection {
    pub title: &'static str,
    pub description: Option<&'static str>,
    pub columns: u8,
    pub fields: Vec<&'static str>,
}

impl FormSection {
    pub fn new(title: &'static str) -> Self {
        FormSection { title, description: None, columns: 1, fields: Vec::new() }
    }

    pub fn description(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }

    pub fn columns(mut self, columns: u8) -> Self {
        self.columns = columns;
        self
    }

    pub fn fields(mut self, fields: &[&'static str]) -> Self {
        self.fields = fields.to_vec();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnFormat {
    Text,
    Numeric,
    Date,
    DateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Search {
    pub individual: bool,
    pub global: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Fixed,
    Hidden,
}

#[derive(Debug, Clone)]
pub struct Column {
    pub key: &'static str,
    pub label: String,
    pub sortable: bool,
    pub search: Search,
    pub toggle: Toggle,
    pub format: ColumnFormat,
}

impl Column {
    pub fn new(key: &'static str) -> Self {
        Column {
            key,
            label: humanize(key),
            sortable: false,
            search: Search::default(),
            toggle: Toggle::Fixed,
            format: ColumnFormat::Text,
        }
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    /// Included in the table-wide search box.
    pub fn searchable(mut self) -> Self {
        self.search.global = true;
        self
    }

    /// Own search input, and still part of the table-wide search.
    pub fn searchable_individually(mut self) -> Self {
        self.search = Search { individual: true, global: true };
        self
    }

    /// Own search input only.
    pub fn searchable_individually_only(mut self) -> Self {
        self.search = Search { individual: true, global: false };
        self
    }

    pub fn hidden_by_default(mut self) -> Self {
        self.toggle = Toggle::Hidden;
        self
    }

    pub fn numeric(mut self) -> Self {
        self.format = ColumnFormat::Numeric;
        self
    }

    pub fn date(mut self) -> Self {
        self.format = ColumnFormat::Date;
        self
    }

    pub fn date_time(mut self) -> Self {
        self.format = ColumnFormat::DateTime;
        self
    }
}

#[derive(Debug, Clone)]
pub enum Filter {
    /// Single-select over a belongs-to field's options.
    Select {
        field: &'static str,
        label: &'static str,
        indicator: &'static str,
    },
    /// Inclusive calendar-date range over a date or timestamp column.
    DateRange {
        column: &'static str,
        from: (&'static str, &'static str),
        until: (&'static str, &'static str),
    },
}

impl Filter {
    pub fn select(field: &'static str, label: &'static str, indicator: &'static str) -> Self {
        Filter::Select { field, label, indicator }
    }

    pub fn created_between() -> Self {
        Filter::DateRange {
            column: "created_at",
            from: ("created_from", "Created from"),
            until: ("created_until", "Created until"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub key: &'static str,
    pub direction: SortDirection,
}

#[derive(Debug, Clone)]
pub struct Entry {
    pub key: &'static str,
    pub label: &'static str,
}

#[derive(Debug, Clone)]
pub struct InfoSection {
    pub title: &'static str,
    pub columns: u8,
    pub entries: Vec<Entry>,
}

impl InfoSection {
    pub fn new(title: &'static str, columns: u8, entries: &[(&'static str, &'static str)]) -> Self {
        InfoSection {
            title,
            columns,
            entries: entries.iter().map(|&(key, label)| Entry { key, label }).collect(),
        }
    }
}

/// Child records pointing back at this resource through `foreign_key`.
#[derive(Debug, Clone)]
pub struct HasMany {
    pub name: &'static str,
    pub resource: &'static str,
    pub foreign_key: &'static str,
    /// Exposed as a relation manager on the parent's pages.
    pub managed: bool,
}

impl HasMany {
    pub fn new(name: &'static str, resource: &'static str, foreign_key: &'static str) -> Self {
        HasMany { name, resource, foreign_key, managed: false }
    }

    pub fn managed(mut self) -> Self {
        self.managed = true;
        self
    }

    /// Cell key holding the number of children, e.g. `employees_count`.
    pub fn count_key(&self) -> String {
        format!("{}_count", self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Week,
    Month,
    Year,
}

/// List tab: narrows the table to rows whose `field` falls within the last `period`.
#[derive(Debug, Clone)]
pub struct ListTab {
    pub key: &'static str,
    pub label: &'static str,
    pub since: Option<(&'static str, Period)>,
}

impl ListTab {
    pub fn all() -> Self {
        ListTab { key: "all", label: "All", since: None }
    }

    pub fn since(
        key: &'static str,
        label: &'static str,
        field: &'static str,
        period: Period,
    ) -> Self {
        ListTab { key, label, since: Some((field, period)) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Success,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub status: NotificationStatus,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl Notification {
    pub fn success(title: &str) -> Self {
        Notification { status: NotificationStatus::Success, title: title.to_string(), body: None }
    }

    pub fn danger(title: &str) -> Self {
        Notification { status: NotificationStatus::Danger, title: title.to_string(), body: None }
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct Notifications {
    pub created: Notification,
    pub saved: Notification,
    pub deleted: Notification,
}

impl Default for Notifications {
    fn default() -> Self {
        Notifications {
            created: Notification::success("Created"),
            saved: Notification::success("Saved"),
            deleted: Notification::success("Deleted"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Navigation {
    pub group: &'static str,
    pub label: &'static str,
    pub icon: &'static str,
    pub sort: Option<u8>,
}

#[derive(Debug, Clone)]
pub struct ResourceSchema {
    pub slug: &'static str,
    /// Storage table; resources are stored under their slug.
    pub table: &'static str,
    pub model_label: &'static str,
    pub navigation: Navigation,
    pub fields: Vec<Field>,
    pub form: Vec<FormSection>,
    pub columns: Vec<Column>,
    pub default_sort: Option<Sort>,
    pub filters: Vec<Filter>,
    pub infolist: Vec<InfoSection>,
    pub has_many: Vec<HasMany>,
    pub tabs: Vec<ListTab>,
    pub notifications: Notifications,
    pub title_fields: Vec<&'static str>,
}

impl ResourceSchema {
    pub fn new(slug: &'static str, model_label: &'static str) -> Self {
        ResourceSchema {
            slug,
            table: slug,
            model_label,
            navigation: Navigation { group: "", label: model_label, icon: "", sort: None },
            fields: Vec::new(),
            form: Vec::new(),
            columns: Vec::new(),
            default_sort: None,
            filters: Vec::new(),
            infolist: Vec::new(),
            has_many: Vec::new(),
            tabs: Vec::new(),
            notifications: Notifications::default(),
            title_fields: vec!["name"],
        }
    }

    pub fn navigation(
        mut self,
        group: &'static str,
        label: &'static str,
        icon: &'static str,
        sort: Option<u8>,
    ) -> Self {
        self.navigation = Navigation { group, label, icon, sort };
        self
    }

    pub fn fields(mut self, fields: Vec<Field>) -> Self {
        self.fields = fields;
        self
    }

    /// Without explicit sections every field lands in one untitled section.
    pub fn form(mut self, sections: Vec<FormSection>) -> Self {
        self.form = sections;
        self
    }

    pub fn columns(mut self, columns: Vec<Column>) -> Self {
        self.columns = columns;
        self
    }

    pub fn default_sort(mut self, key: &'static str, direction: SortDirection) -> Self {
        self.default_sort = Some(Sort { key, direction });
        self
    }

    pub fn filters(mut self, filters: Vec<Filter>) -> Self {
        self.filters = filters;
        self
    }

    pub fn infolist(mut self, sections: Vec<InfoSection>) -> Self {
        self.infolist = sections;
        self
    }

    pub fn has_many(mut self, relations: Vec<HasMany>) -> Self {
        self.has_many = relations;
        self
    }

    pub fn tabs(mut self, tabs: Vec<ListTab>) -> Self {
        self.tabs = tabs;
        self
    }

    pub fn notifications(mut self, notifications: Notifications) -> Self {
        self.notifications = notifications;
        self
    }

    pub fn title_fields(mut self, fields: &[&'static str]) -> Self {
        self.title_fields = fields.to_vec();
        self
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn column(&self, key: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.key == key)
    }

    pub fn relation_manager(&self, name: &str) -> Option<&HasMany> {
        self.has_many.iter().find(|relation| relation.managed && relation.name == name)
    }

    pub fn tab(&self, key: &str) -> Option<&ListTab> {
        self.tabs.iter().find(|tab| tab.key == key)
    }

    /// Every field whose options depend on `name`, directly or through another dependent.
    pub fn dependents_of(&self, name: &str) -> Vec<&'static str> {
        let mut found: Vec<&'static str> = Vec::new();
        let mut frontier = vec![name.to_string()];
        while let Some(parent) = frontier.pop() {
            for field in &self.fields {
                let is_child = field.depends_on.map_or(false, |dep| dep.parent == parent);
                if is_child && !found.contains(&field.name) {
                    found.push(field.name);
                    frontier.push(field.name.to_string());
                }
            }
        }
        found
    }

    pub fn record_title(&self, row: &Row) -> String {
        let parts: Vec<String> = self
            .title_fields
            .iter()
            .map(|key| row.cell(key).display())
            .filter(|part| !part.is_empty())
            .collect();
        if parts.is_empty() {
            format!("{} #{}", self.model_label, row.id)
        } else {
            parts.join(" ")
        }
    }
}

/// All resources served by the panel, in declaration order.
#[derive(Debug, Clone)]
pub struct Registry {
    resources: Vec<ResourceSchema>,
}

impl Registry {
    pub fn new(resources: Vec<ResourceSchema>) -> Self {
        Registry { resources }
    }

    pub fn get(&self, slug: &str) -> Result<&ResourceSchema, AppError> {
        self.resources
            .iter()
            .find(|schema| schema.slug == slug)
            .ok_or_else(|| AppError::NotFound(format!("Unknown resource '{}'", slug)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceSchema> {
        self.resources.iter()
    }
}

/// `employees_count` -> `Employees count`, `country.name` -> `Country name`
pub fn humanize(key: &str) -> String {
    let spaced = key.replace(['_', '.'], " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
