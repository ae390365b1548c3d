use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::db::Store;
use crate::errors::AppError;
use crate::schema::table::{self, TableQuery};
use crate::schema::Registry;
use crate::utils::jwt::AdminClaims;

const RESULTS_PER_RESOURCE: u32 = 5;

#[derive(Deserialize)]
pub struct SearchParams {
    q: Option<String>,
}

#[derive(Serialize)]
struct SearchResult {
    resource: &'static str,
    title: String,
    url: String,
}

#[derive(Serialize)]
struct NavigationGroup {
    group: &'static str,
    items: Vec<NavigationItem>,
}

#[derive(Serialize)]
struct NavigationItem {
    label: &'static str,
    icon: &'static str,
    url: String,
}

pub async fn global_search(
    _admin: AdminClaims,
    params: web::Query<SearchParams>,
    registry: web::Data<Registry>,
    store: web::Data<dyn Store>,
) -> Result<HttpResponse, AppError> {
    let needle = params.q.as_deref().map(str::trim).unwrap_or_default();
    let mut results = Vec::new();
    if needle.is_empty() {
        return Ok(HttpResponse::Ok().json(results));
    }

    let today = Utc::now().date_naive();
    for schema in registry.iter() {
        if !schema.columns.iter().any(|column| column.search.global) {
            continue;
        }
        let query = TableQuery {
            search: Some(needle.to_string()),
            ..TableQuery::new(RESULTS_PER_RESOURCE)
        };
        let plan = table::plan(schema, &query, None, today)?;
        let page = store.list(schema, &plan).await?;
        results.extend(page.rows.iter().map(|row| SearchResult {
            resource: schema.navigation.label,
            title: schema.record_title(row),
            url: format!("/{}/{}/edit", schema.slug, row.id),
        }));
    }

    Ok(HttpResponse::Ok().json(results))
}

/// Sidebar entries grouped by navigation group. Items with a sort position
/// come first, the rest follow by label.
pub async fn navigation(_admin: AdminClaims, registry: web::Data<Registry>) -> HttpResponse {
    HttpResponse::Ok().json(navigation_groups(&registry))
}

fn navigation_groups(registry: &Registry) -> Vec<NavigationGroup> {
    let mut entries: Vec<_> =
        registry.iter().map(|schema| (&schema.navigation, schema.slug)).collect();
    entries.sort_by(|(a, _), (b, _)| {
        let position = |sort: Option<u8>| sort.map_or(u16::MAX, u16::from);
        position(a.sort).cmp(&position(b.sort)).then(a.label.cmp(&b.label))
    });

    let mut groups: Vec<NavigationGroup> = Vec::new();
    for (navigation, slug) in entries {
        let item = NavigationItem {
            label: navigation.label,
            icon: navigation.icon,
            url: format!("/{}", slug),
        };
        match groups.iter_mut().find(|group| group.group == navigation.group) {
            Some(group) => group.items.push(item),
            None => groups.push(NavigationGroup { group: navigation.group, items: vec![item] }),
        }
    }
    groups
}
