use actix_web::{web, HttpResponse};
use chrono::{NaiveDate, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};

use crate::config::Config;
use crate::db::Store;
use crate::errors::AppError;
use crate::models::{Row, Values};
use crate::schema::cascade::{self, FormChange, FormState};
use crate::schema::form::{self, Options};
use crate::schema::table::{self, TableContext, TableMode, TableQuery};
use crate::schema::{infolist, FieldKind, Filter, Notification, Registry, ResourceSchema};
use crate::utils::jwt::AdminClaims;

#[derive(Deserialize)]
pub struct BulkDeleteRequest {
    ids: Vec<i64>,
}

#[derive(Serialize)]
struct SavedResponse {
    notification: Notification,
    record: Row,
    redirect: String,
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn record_not_found(schema: &ResourceSchema, id: i64) -> AppError {
    AppError::NotFound(format!("{} #{} not found", schema.model_label, id))
}

/// Options of every select filter, keyed by the filtered field.
async fn filter_options(store: &dyn Store, schema: &ResourceSchema) -> Result<Options, AppError> {
    let mut options = Options::new();
    for filter in &schema.filters {
        let Filter::Select { field, .. } = filter else {
            continue;
        };
        if let Some(FieldKind::BelongsTo { table, title }) = schema.field(field).map(|f| &f.kind) {
            options.insert(*field, store.options(table, title, None).await?);
        }
    }
    Ok(options)
}

async fn tab_badges(
    store: &dyn Store,
    schema: &ResourceSchema,
    today: NaiveDate,
) -> Result<BTreeMap<&'static str, u64>, AppError> {
    let mut badges = BTreeMap::new();
    for tab in &schema.tabs {
        if let Some(predicate) = table::tab_predicate(tab.since, today) {
            badges.insert(tab.key, store.count(schema, &[predicate]).await?);
        }
    }
    Ok(badges)
}

/// Validates a submitted form, checks its selects against the store and persists it.
async fn create_record(
    store: &dyn Store,
    schema: &ResourceSchema,
    payload: &Map<String, Value>,
) -> Result<HttpResponse, AppError> {
    let values = form::validate(schema, payload)?;
    cascade::verify(store, schema, &values).await?;
    let record = store.insert(schema, &values).await?;

    Ok(HttpResponse::Created().json(SavedResponse {
        notification: schema.notifications.created.clone(),
        record,
        redirect: format!("/{}", schema.slug),
    }))
}

pub async fn list(
    _admin: AdminClaims,
    path: web::Path<String>,
    params: web::Query<HashMap<String, String>>,
    registry: web::Data<Registry>,
    store: web::Data<dyn Store>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let schema = registry.get(&path)?;
    let store = store.get_ref();
    let today = today();

    let query = TableQuery::from_params(&params, config.default_page_size)?;
    let plan = table::plan(schema, &query, None, today)?;
    let page = store.list(schema, &plan).await?;

    let context = TableContext {
        filter_options: filter_options(store, schema).await?,
        tab_badges: tab_badges(store, schema, today).await?,
    };
    let view = table::project(schema, &query, &page, &context, TableMode::Resource);
    Ok(HttpResponse::Ok().json(view))
}

pub async fn create(
    _admin: AdminClaims,
    path: web::Path<String>,
    payload: web::Json<Map<String, Value>>,
    registry: web::Data<Registry>,
    store: web::Data<dyn Store>,
) -> Result<HttpResponse, AppError> {
    let schema = registry.get(&path)?;
    create_record(store.get_ref(), schema, &payload).await
}

pub async fn create_form(
    _admin: AdminClaims,
    path: web::Path<String>,
    registry: web::Data<Registry>,
    store: web::Data<dyn Store>,
) -> Result<HttpResponse, AppError> {
    let schema = registry.get(&path)?;
    let state = FormState::default();
    let options = cascade::resolve_options(store.get_ref(), schema, &state).await?;
    Ok(HttpResponse::Ok().json(form::project(schema, &state.values, &options, None)))
}

/// Live form update: applies a change to the submitted state and returns the
/// cleared dependents with fresh options.
pub async fn form_state(
    _admin: AdminClaims,
    path: web::Path<String>,
    change: web::Json<FormChange>,
    registry: web::Data<Registry>,
    store: web::Data<dyn Store>,
) -> Result<HttpResponse, AppError> {
    let schema = registry.get(&path)?;
    let mut state = FormState::from_payload(schema, &change.values)?;

    let cleared = match change.changed.as_deref() {
        Some(name) => {
            if schema.field(name).is_none() {
                return Err(AppError::BadRequest(format!("Unknown field '{}'", name)));
            }
            cascade::apply_change(schema, &mut state, name)
        }
        None => Vec::new(),
    };

    let options = cascade::resolve_options(store.get_ref(), schema, &state).await?;
    Ok(HttpResponse::Ok().json(json!({
        "values": state.values,
        "cleared": cleared,
        "form": form::project(schema, &state.values, &options, None),
    })))
}

pub async fn view(
    _admin: AdminClaims,
    path: web::Path<(String, i64)>,
    registry: web::Data<Registry>,
    store: web::Data<dyn Store>,
) -> Result<HttpResponse, AppError> {
    let (slug, id) = path.into_inner();
    let schema = registry.get(&slug)?;
    let row = store.find(schema, id).await?.ok_or_else(|| record_not_found(schema, id))?;
    Ok(HttpResponse::Ok().json(infolist::project(schema, &row)))
}

pub async fn edit_form(
    _admin: AdminClaims,
    path: web::Path<(String, i64)>,
    registry: web::Data<Registry>,
    store: web::Data<dyn Store>,
) -> Result<HttpResponse, AppError> {
    let (slug, id) = path.into_inner();
    let schema = registry.get(&slug)?;
    let store = store.get_ref();
    let row = store.find(schema, id).await?.ok_or_else(|| record_not_found(schema, id))?;

    let state = FormState::new(row.values.clone());
    let options = cascade::resolve_options(store, schema, &state).await?;
    Ok(HttpResponse::Ok().json(json!({
        "id": row.id,
        "title": schema.record_title(&row),
        "form": form::project(schema, &row.values, &options, None),
    })))
}

pub async fn update(
    _admin: AdminClaims,
    path: web::Path<(String, i64)>,
    patch: web::Json<Map<String, Value>>,
    registry: web::Data<Registry>,
    store: web::Data<dyn Store>,
) -> Result<HttpResponse, AppError> {
    let (slug, id) = path.into_inner();
    let schema = registry.get(&slug)?;
    let store = store.get_ref();
    let row = store.find(schema, id).await?.ok_or_else(|| record_not_found(schema, id))?;

    let values: Values = form::validate(schema, &form::merge(&row, &patch))?;
    cascade::verify(store, schema, &values).await?;
    let record = store
        .update(schema, id, &values)
        .await?
        .ok_or_else(|| record_not_found(schema, id))?;

    Ok(HttpResponse::Ok().json(SavedResponse {
        notification: schema.notifications.saved.clone(),
        record,
        redirect: format!("/{}", schema.slug),
    }))
}

pub async fn delete(
    admin: AdminClaims,
    path: web::Path<(String, i64)>,
    registry: web::Data<Registry>,
    store: web::Data<dyn Store>,
) -> Result<HttpResponse, AppError> {
    let (slug, id) = path.into_inner();
    let schema = registry.get(&slug)?;
    if store.delete(schema, &[id]).await? == 0 {
        return Err(record_not_found(schema, id));
    }
    info!("{} #{} deleted by admin {}", schema.model_label, id, admin.0.sub);
    Ok(HttpResponse::Ok().json(json!({
        "message": format!("{} deleted successfully", schema.model_label),
        "notification": schema.notifications.deleted,
    })))
}

pub async fn bulk_delete(
    admin: AdminClaims,
    path: web::Path<String>,
    payload: web::Json<BulkDeleteRequest>,
    registry: web::Data<Registry>,
    store: web::Data<dyn Store>,
) -> Result<HttpResponse, AppError> {
    let schema = registry.get(&path)?;
    let mut ids = payload.into_inner().ids;
    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() {
        return Err(AppError::BadRequest("No records selected".to_string()));
    }

    let deleted = store.delete(schema, &ids).await?;
    info!("{} {} record(s) deleted by admin {}", deleted, schema.slug, admin.0.sub);
    Ok(HttpResponse::Ok().json(json!({
        "deleted": deleted,
        "notification": schema.notifications.deleted,
    })))
}

pub async fn relation_list(
    _admin: AdminClaims,
    path: web::Path<(String, i64, String)>,
    params: web::Query<HashMap<String, String>>,
    registry: web::Data<Registry>,
    store: web::Data<dyn Store>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let (slug, id, relation) = path.into_inner();
    let schema = registry.get(&slug)?;
    let store = store.get_ref();
    let manager = schema
        .relation_manager(&relation)
        .ok_or_else(|| AppError::NotFound(format!("Unknown relation '{}'", relation)))?;
    let child = registry.get(manager.resource)?;
    store.find(schema, id).await?.ok_or_else(|| record_not_found(schema, id))?;

    let query = TableQuery::from_params(&params, config.default_page_size)?;
    let plan = table::plan(child, &query, Some((manager.foreign_key, id)), today())?;
    let page = store.list(child, &plan).await?;

    let context = TableContext {
        filter_options: filter_options(store, child).await?,
        ..TableContext::default()
    };
    Ok(HttpResponse::Ok().json(table::project(child, &query, &page, &context, TableMode::Relation)))
}

/// Creates a child record from a relation manager; the parent key is preset.
pub async fn relation_create(
    _admin: AdminClaims,
    path: web::Path<(String, i64, String)>,
    payload: web::Json<Map<String, Value>>,
    registry: web::Data<Registry>,
    store: web::Data<dyn Store>,
) -> Result<HttpResponse, AppError> {
    let (slug, id, relation) = path.into_inner();
    let schema = registry.get(&slug)?;
    let store = store.get_ref();
    let manager = schema
        .relation_manager(&relation)
        .ok_or_else(|| AppError::NotFound(format!("Unknown relation '{}'", relation)))?;
    let child = registry.get(manager.resource)?;
    store.find(schema, id).await?.ok_or_else(|| record_not_found(schema, id))?;

    let mut payload = payload.into_inner();
    payload.insert(manager.foreign_key.to_string(), Value::from(id));
    create_record(store, child, &payload).await
}

#[cfg(test)]
mod tests {
    use actix_web::{http::StatusCode, test, web, App};
    use serde_json::{json, Value};
    use std::sync::Arc;

    use crate::config::Config;
    use crate::db::memory::MemoryStore;
    use crate::db::Store;
    use crate::resources;
    use crate::utils::jwt::generate_token;

    fn config() -> Config {
        Config {
            database_url: "memory://".to_string(),
            jwt_secret: "test-secret".to_string(),
            bind_address: "127.0.0.1:0".to_string(),
            default_page_size: 10,
            token_ttl_days: 1,
            max_connections: 1,
        }
    }

    fn bearer() -> (&'static str, String) {
        let token = generate_token("admin", "test-secret", 1).unwrap();
        ("Authorization", format!("Bearer {}", token))
    }

    macro_rules! app {
        () => {{
            let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
            test::init_service(
                App::new()
                    .app_data(web::Data::from(store))
                    .app_data(web::Data::new(resources::registry()))
                    .app_data(web::Data::new(config()))
                    .configure(crate::handlers::configure),
            )
            .await
        }};
    }

    macro_rules! call {
        ($app:expr, $req:expr) => {{
            let resp = test::call_service(&$app, $req.insert_header(bearer()).to_request()).await;
            let status = resp.status();
            let body: Value = test::read_body_json(resp).await;
            (status, body)
        }};
    }

    macro_rules! create {
        ($app:expr, $uri:expr, $payload:expr) => {{
            let (status, body) =
                call!($app, test::TestRequest::post().uri($uri).set_json($payload));
            assert_eq!(status, StatusCode::CREATED, "{}", body);
            body["record"]["id"].as_i64().unwrap()
        }};
    }

    /// Seeds Turkey > Ankara > Cankaya and an Engineering department.
    macro_rules! seed_directory {
        ($app:expr) => {{
            let country = create!(
                $app,
                "/v1/countries",
                json!({"name": "Turkey", "code": "TR", "phonecode": 90})
            );
            let state =
                create!($app, "/v1/states", json!({"country_id": country, "name": "Ankara"}));
            let city = create!($app, "/v1/cities", json!({"state_id": state, "name": "Cankaya"}));
            let department = create!($app, "/v1/departments", json!({"name": "Engineering"}));
            (country, state, city, department)
        }};
    }

    fn employee(ids: (i64, i64, i64, i64), date_hired: &str) -> Value {
        let (country, state, city, department) = ids;
        json!({
            "country_id": country,
            "state_id": state,
            "city_id": city,
            "department_id": department,
            "first_name": "Ada",
            "last_name": "Lovelace",
            "address": "12 Analytical Way",
            "zip_code": "06100",
            "date_of_birth": "1990-12-10",
            "date_hired": date_hired,
        })
    }

    #[actix_web::test]
    async fn every_resource_creates_valid_forms_and_rejects_incomplete_ones() {
        let app = app!();
        let ids = seed_directory!(app);
        let (country, state, _, _) = ids;

        let cases = [
            (
                "countries",
                json!({"name": "France", "code": "FR", "phonecode": 33}),
                "phonecode",
                "The phone code field is required.",
            ),
            (
                "states",
                json!({"country_id": country, "name": "Izmir"}),
                "name",
                "The state name field is required.",
            ),
            (
                "cities",
                json!({"state_id": state, "name": "Kecioren"}),
                "state_id",
                "The state field is required.",
            ),
            (
                "departments",
                json!({"name": "Legal"}),
                "name",
                "The department name field is required.",
            ),
            (
                "employees",
                employee(ids, "2024-03-09"),
                "date_hired",
                "The date hired field is required.",
            ),
        ];

        for (slug, payload, omitted, message) in cases {
            let uri = format!("/v1/{}", slug);
            let (_, body) = call!(app, test::TestRequest::get().uri(&uri));
            let before = body["pagination"]["total"].as_u64().unwrap();

            let mut incomplete = payload.clone();
            incomplete.as_object_mut().unwrap().remove(omitted);
            let (status, body) =
                call!(app, test::TestRequest::post().uri(&uri).set_json(incomplete));
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", slug);
            assert_eq!(body["errors"][omitted][0], message, "{}", slug);

            let (_, body) = call!(app, test::TestRequest::get().uri(&uri));
            assert_eq!(body["pagination"]["total"], before, "{}", slug);

            let id = create!(app, &uri, payload);
            let (status, body) = call!(app, test::TestRequest::get().uri(&uri));
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["pagination"]["total"], before + 1, "{}", slug);
            let rows = body["rows"].as_array().unwrap();
            assert!(rows.iter().any(|row| row["id"] == id), "{}", slug);
        }
    }

    #[actix_web::test]
    async fn create_form_offers_countries_and_waits_for_parents() {
        let app = app!();
        seed_directory!(app);

        let (status, body) = call!(app, test::TestRequest::get().uri("/v1/employees/create"));
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["resource"], "employees");

        let relationships = &body["form"]["sections"][0]["fields"];
        assert_eq!(relationships[0]["name"], "country_id");
        assert_eq!(relationships[0]["widget"], "select");
        assert_eq!(relationships[0]["options"][0]["label"], "Turkey");
        assert_eq!(relationships[0]["value"], Value::Null);
        assert_eq!(relationships[1]["options"], json!([]));
        assert_eq!(relationships[3]["options"][0]["label"], "Engineering");
    }

    #[actix_web::test]
    async fn edit_form_and_view_show_the_stored_employee() {
        let app = app!();
        let ids = seed_directory!(app);
        let id = create!(app, "/v1/employees", employee(ids, "2024-03-09"));

        let edit = format!("/v1/employees/{}/edit", id);
        let (status, body) = call!(app, test::TestRequest::get().uri(&edit));
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], id);
        assert_eq!(body["title"], "Ada Lovelace");
        let sections = &body["form"]["sections"];
        assert_eq!(sections[0]["fields"][1]["value"], ids.1);
        assert_eq!(sections[0]["fields"][1]["options"][0]["label"], "Ankara");
        assert_eq!(sections[0]["fields"][2]["options"][0]["label"], "Cankaya");
        assert_eq!(sections[1]["fields"][0]["value"], "Ada");

        let view = format!("/v1/employees/{}", id);
        let (status, body) = call!(app, test::TestRequest::get().uri(&view));
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Ada Lovelace");
        let relationships = &body["sections"][0]["entries"];
        assert_eq!(relationships[0]["value"], "Turkey");
        assert_eq!(relationships[3]["value"], "Engineering");
        let name = &body["sections"][1]["entries"];
        assert_eq!(name[2]["key"], "middle_name");
        assert_eq!(name[2]["value"], "-");
        assert_eq!(body["sections"][3]["entries"][1]["value"], "09/03/2024");
    }

    #[actix_web::test]
    async fn deleted_records_cannot_be_viewed_or_edited() {
        let app = app!();
        let id = create!(app, "/v1/departments", json!({"name": "Ops"}));

        let uri = format!("/v1/departments/{}", id);
        let (status, _) = call!(app, test::TestRequest::delete().uri(&uri));
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call!(app, test::TestRequest::get().uri(&uri));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], format!("Department #{} not found", id));

        let edit = format!("/v1/departments/{}/edit", id);
        let (status, _) = call!(app, test::TestRequest::get().uri(&edit));
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn hiring_tabs_count_recent_employees() {
        let app = app!();
        let ids = seed_directory!(app);
        let today = super::today().format("%Y-%m-%d").to_string();
        create!(app, "/v1/employees", employee(ids, &today));
        create!(app, "/v1/employees", employee(ids, "2000-01-03"));

        let (status, body) = call!(app, test::TestRequest::get().uri("/v1/employees"));
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pagination"]["total"], 2);
        let badges: Vec<(&str, Value)> = body["tabs"]
            .as_array()
            .unwrap()
            .iter()
            .map(|tab| (tab["key"].as_str().unwrap(), tab["badge"].clone()))
            .collect();
        assert_eq!(
            badges,
            vec![
                ("all", Value::Null),
                ("this_week", json!(1)),
                ("this_month", json!(1)),
                ("this_year", json!(1)),
            ]
        );

        let (_, body) = call!(app, test::TestRequest::get().uri("/v1/employees?tab=this_week"));
        assert_eq!(body["pagination"]["total"], 1);
        let hired = super::today().format("%b %-d, %Y").to_string();
        assert_eq!(body["rows"][0]["cells"]["date_hired"], hired);
    }

    #[actix_web::test]
    async fn malformed_ids_are_json_not_found_errors() {
        let app = app!();

        let (status, body) = call!(app, test::TestRequest::get().uri("/v1/countries/abc"));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid path"));

        let (status, body) = call!(app, test::TestRequest::get().uri("/v1/search?q=a&q=b"));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid query string"));
    }

    #[actix_web::test]
    async fn created_department_shows_up_in_the_list() {
        let app = app!();

        let (status, body) = call!(
            app,
            test::TestRequest::post().uri("/v1/departments").set_json(json!({"name": "Sales"}))
        );
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["notification"]["title"], "Created");
        assert_eq!(body["redirect"], "/departments");

        let (status, body) = call!(app, test::TestRequest::get().uri("/v1/departments"));
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pagination"]["total"], 1);
        assert_eq!(body["rows"][0]["cells"]["name"], "Sales");
        assert_eq!(body["rows"][0]["cells"]["employees_count"], "0");
    }

    #[actix_web::test]
    async fn missing_required_field_is_rejected_without_writing() {
        let app = app!();

        let (status, body) = call!(
            app,
            test::TestRequest::post()
                .uri("/v1/countries")
                .set_json(json!({"name": "Turkey", "phonecode": 90}))
        );
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"]["code"][0], "The country code field is required.");

        let (_, body) = call!(app, test::TestRequest::get().uri("/v1/countries"));
        assert_eq!(body["pagination"]["total"], 0);
    }

    #[actix_web::test]
    async fn deleting_twice_is_a_not_found() {
        let app = app!();

        let (_, body) = call!(
            app,
            test::TestRequest::post().uri("/v1/departments").set_json(json!({"name": "Ops"}))
        );
        let id = body["record"]["id"].as_i64().unwrap();

        let uri = format!("/v1/departments/{}", id);
        let (status, body) = call!(app, test::TestRequest::delete().uri(&uri));
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["notification"]["title"], "Deleted");

        let (status, _) = call!(app, test::TestRequest::delete().uri(&uri));
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn requests_without_a_token_are_unauthorized() {
        let app = app!();
        let req = test::TestRequest::get().uri("/v1/countries").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn unknown_resources_are_not_found() {
        let app = app!();
        let (status, body) = call!(app, test::TestRequest::get().uri("/v1/planets"));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Unknown resource 'planets'");
    }

    #[actix_web::test]
    async fn changing_the_country_clears_state_and_city() {
        let app = app!();
        let (_, body) = call!(
            app,
            test::TestRequest::post()
                .uri("/v1/countries")
                .set_json(json!({"name": "Turkey", "code": "TR", "phonecode": 90}))
        );
        let turkey = body["record"]["id"].as_i64().unwrap();
        let (_, body) = call!(
            app,
            test::TestRequest::post()
                .uri("/v1/states")
                .set_json(json!({"country_id": turkey, "name": "Ankara"}))
        );
        let ankara = body["record"]["id"].as_i64().unwrap();

        let (status, body) = call!(
            app,
            test::TestRequest::post().uri("/v1/employees/form").set_json(json!({
                "values": {"country_id": turkey, "state_id": ankara, "city_id": 9},
                "changed": "country_id"
            }))
        );
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cleared"], json!(["state_id", "city_id"]));
        assert_eq!(body["values"]["state_id"], Value::Null);
        assert_eq!(body["values"]["country_id"], turkey);

        let relationships = &body["form"]["sections"][0]["fields"];
        assert_eq!(relationships[1]["name"], "state_id");
        assert_eq!(relationships[1]["options"][0]["label"], "Ankara");
        assert_eq!(relationships[2]["options"], json!([]));
    }

    #[actix_web::test]
    async fn updates_merge_over_the_stored_record() {
        let app = app!();
        let (_, body) = call!(
            app,
            test::TestRequest::post()
                .uri("/v1/countries")
                .set_json(json!({"name": "Turkey", "code": "TR", "phonecode": 90}))
        );
        let id = body["record"]["id"].as_i64().unwrap();

        let (status, body) = call!(
            app,
            test::TestRequest::patch()
                .uri(&format!("/v1/countries/{}", id))
                .set_json(json!({"name": "Türkiye"}))
        );
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["notification"]["title"], "Saved");
        assert_eq!(body["record"]["name"], "Türkiye");
        assert_eq!(body["record"]["code"], "TR");

        let (status, _) = call!(
            app,
            test::TestRequest::patch().uri("/v1/countries/999").set_json(json!({"name": "X"}))
        );
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn relation_manager_lists_only_the_parents_children() {
        let app = app!();
        let mut states = Vec::new();
        for (name, code) in [("Turkey", "TR"), ("France", "FR")] {
            let (_, body) = call!(
                app,
                test::TestRequest::post()
                    .uri("/v1/countries")
                    .set_json(json!({"name": name, "code": code, "phonecode": 1}))
            );
            let country = body["record"]["id"].as_i64().unwrap();
            let (_, body) = call!(
                app,
                test::TestRequest::post()
                    .uri("/v1/states")
                    .set_json(json!({"country_id": country, "name": format!("{} state", name)}))
            );
            states.push(body["record"]["id"].as_i64().unwrap());
        }

        let (status, body) = call!(
            app,
            test::TestRequest::post()
                .uri(&format!("/v1/states/{}/relations/cities", states[0]))
                .set_json(json!({"name": "Cankaya"}))
        );
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["record"]["state_id"], states[0]);

        let (_, body) = call!(
            app,
            test::TestRequest::get().uri(&format!("/v1/states/{}/relations/cities", states[1]))
        );
        assert_eq!(body["pagination"]["total"], 0);
        assert_eq!(body["actions"], json!(["edit", "delete"]));

        let (_, body) = call!(
            app,
            test::TestRequest::get().uri(&format!("/v1/states/{}/relations/cities", states[0]))
        );
        assert_eq!(body["pagination"]["total"], 1);

        let (status, body) = call!(
            app,
            test::TestRequest::delete().uri(&format!("/v1/states/{}", states[0]))
        );
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "State still contains cities");
    }

    #[actix_web::test]
    async fn bulk_delete_reports_the_removed_count() {
        let app = app!();
        let mut ids = Vec::new();
        for name in ["Sales", "Ops", "Legal"] {
            let (_, body) = call!(
                app,
                test::TestRequest::post().uri("/v1/departments").set_json(json!({"name": name}))
            );
            ids.push(body["record"]["id"].as_i64().unwrap());
        }

        let (status, body) = call!(
            app,
            test::TestRequest::post()
                .uri("/v1/departments/bulk-delete")
                .set_json(json!({"ids": [ids[0], ids[2], 404]}))
        );
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deleted"], 2);

        let (_, body) = call!(app, test::TestRequest::get().uri("/v1/departments"));
        assert_eq!(body["rows"][0]["cells"]["name"], "Ops");
    }
}
