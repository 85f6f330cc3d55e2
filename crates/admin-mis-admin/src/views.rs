//! Request handlers for the admin API.
//!
//! Every handler authenticates the request, resolves the model admin from the
//! `{app}/{model}` path segments and checks the permission the HTTP method
//! maps to before touching any data. Writes run inside one store
//! transaction that only commits once everything has succeeded.

use std::sync::Arc;

use admin_mis_auth::User;
use admin_mis_core::{MisError, UploadedFile};
use admin_mis_db::{QueryContext, Record, Tables};
use admin_mis_forms::{all_valid, FormData, FormSetSpec, InlineFormSet, ModelForm};
use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Path, RawQuery, Request, State};
use axum::http::{header, HeaderMap, Method};
use axum::Json;
use serde_json::{json, Map, Value};

use crate::actions::{describe, ActionContext};
use crate::changelist::{ChangeList, FILTER_LIST_VAR, ORDER_VAR, SEARCH_VAR};
use crate::deleted_objects::get_deleted_objects;
use crate::error::{ApiError, ApiResult};
use crate::filters::filter_specs;
use crate::inlines::attach_inline_objects;
use crate::log_entry::construct_change_message;
use crate::messages::Messages;
use crate::meta::fields_metadata;
use crate::model_admin::{InlineInstance, ModelAdmin};
use crate::permissions::{check, PermissionKind};
use crate::serializer::RecordSerializer;
use crate::site::AdminSite;
use crate::utils::{parse_query, query_get, QueryParams};

pub type SharedSite = Arc<AdminSite>;

const ID_NOT_A_NUMBER: &str = "ID must be a number.";
const NO_ITEMS_SELECTED: &str =
    "Items must be selected in order to perform actions on them. No items have been changed.";

// ── Permission gate ─────────────────────────────────────────────────

/// Authenticates the request and checks the model-level permission its
/// method requires.
async fn gate<'a>(
    site: &'a AdminSite,
    headers: &HeaderMap,
    method: &Method,
    app: &str,
    model: &str,
) -> ApiResult<(&'a ModelAdmin, User, PermissionKind)> {
    let user = site.authenticate(headers).await?;
    let kind = PermissionKind::for_method(method)?;
    let admin = site.resolve(app, model)?;
    if !check(admin.policy.as_ref(), kind, &user, &admin.meta, None) {
        tracing::debug!(
            model = %admin.model_key(),
            user = %user.username,
            %kind,
            "permission denied"
        );
        return Err(ApiError::PermissionDenied);
    }
    Ok((admin, user, kind))
}

/// The object-level check. `add` never looks at the object.
fn check_object(
    admin: &ModelAdmin,
    user: &User,
    kind: PermissionKind,
    obj: &Record,
) -> ApiResult<()> {
    if check(admin.policy.as_ref(), kind, user, &admin.meta, Some(obj)) {
        Ok(())
    } else {
        Err(ApiError::PermissionDenied)
    }
}

fn parse_id(raw: &str) -> ApiResult<i64> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::message(ID_NOT_A_NUMBER))
}

/// Parses a comma-separated id list and checks each row exists and passes
/// the object-level permission.
fn get_objects(
    admin: &ModelAdmin,
    user: &User,
    kind: PermissionKind,
    tables: &Tables,
    raw: &str,
) -> ApiResult<Vec<i64>> {
    let mut pks = Vec::new();
    for part in raw.split(',') {
        let pk = parse_id(part)?;
        let record = tables
            .get(&admin.meta, pk)
            .ok_or_else(|| ApiError::NotFound(format!("Object with ID {pk} not found.")))?;
        check_object(admin, user, kind, record)?;
        pks.push(pk);
    }
    Ok(pks)
}

fn into_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn error_text(err: &MisError) -> String {
    match err {
        MisError::BadRequest(message) => message.clone(),
        other => other.to_string(),
    }
}

// ── Request bodies ──────────────────────────────────────────────────

/// Reads a `multipart/form-data`, urlencoded or JSON body.
async fn read_form_data(request: Request) -> ApiResult<FormData> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("multipart/form-data") {
        let mut multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| ApiError::message(e.body_text()))?;
        let mut data = FormData::new();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::message(e.body_text()))?
        {
            let Some(name) = field.name().map(ToString::to_string) else {
                continue;
            };
            let file_name = field.file_name().map(ToString::to_string);
            let file_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::message(e.body_text()))?;
            match file_name {
                Some(file_name) if !file_name.is_empty() => {
                    data.add_file(name, UploadedFile::new(file_name, file_type, bytes.to_vec()));
                }
                Some(_) => {}
                None => data.append(name, String::from_utf8_lossy(&bytes).into_owned()),
            }
        }
        return Ok(data);
    }

    let body = Bytes::from_request(request, &())
        .await
        .map_err(|e| ApiError::message(e.body_text()))?;
    if body.is_empty() {
        return Ok(FormData::new());
    }
    if content_type.starts_with("application/x-www-form-urlencoded") {
        return Ok(FormData::from_urlencoded(&body));
    }
    let value: Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::Parse(json!({ "detail": format!("JSON parse error - {e}") })))?;
    Ok(FormData::from_json(&value))
}

// ── Index ───────────────────────────────────────────────────────────

/// `GET /`: site branding followed by every app with the models the user
/// may see.
pub async fn index(
    State(site): State<SharedSite>,
    method: Method,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let user = site.authenticate(&headers).await?;
    PermissionKind::for_method(&method)?;
    let api_root = site.api_root(&headers);
    let registry = site.registry();

    let mut apps: Map<String, Value> = Map::new();
    for admin in site.admins() {
        let meta = &admin.meta;
        if !admin.has_module_permission(&user) {
            continue;
        }
        let perms = admin.get_model_perms(&user);
        if !perms.any() {
            continue;
        }
        let mut model = json!({
            "verbose_name": meta.verbose_name_plural,
            "model_name": meta.object_name,
            "perms": perms,
        });
        if perms.change || perms.view {
            model["api_url"] = json!(format!("{api_root}{}/{}/", meta.app_label, meta.model_name));
        }
        let app = apps.entry(meta.app_label.clone()).or_insert_with(|| {
            let verbose_name = registry
                .app_verbose_name(&meta.app_label)
                .unwrap_or(meta.app_label.as_str());
            json!({
                "verbose_name": verbose_name,
                "app_label": meta.app_label,
                "app_models": [],
            })
        });
        if let Some(models) = app["app_models"].as_array_mut() {
            models.push(model);
        }
    }

    let settings = site.settings();
    let mut out = vec![json!({
        "site_header": settings.site_header,
        "site_title": settings.site_title,
        "index_title": settings.index_title,
    })];
    out.extend(apps.into_iter().map(|(_, app)| app));
    Ok(Json(Value::Array(out)))
}

// ── List views ──────────────────────────────────────────────────────

/// `GET /{app}/{model}/`: the filtered, ordered and paginated rows.
pub async fn changelist(
    State(site): State<SharedSite>,
    method: Method,
    headers: HeaderMap,
    Path((app, model)): Path<(String, String)>,
    RawQuery(query): RawQuery,
) -> ApiResult<Json<Value>> {
    let (admin, _user, _) = gate(&site, &headers, &method, &app, &model).await?;
    let params = parse_query(query.as_deref());
    let filter_list = query_get(&params, FILTER_LIST_VAR) == Some("true");
    let params = ChangeList::allowed_params(admin, params);

    let tables = site.store().read().await;
    let ctx = QueryContext {
        registry: site.registry(),
        tables: &tables,
    };
    let cl = ChangeList::new(admin, ctx, params)
        .map_err(|e| ApiError::message(format!("Error due to {}", error_text(&e))))?;

    let data = if filter_list {
        cl.filter_list_rows()
    } else {
        cl.rows()
    };
    let mut out = json!({
        "count": cl.result_count,
        "data_per_page": cl.list_per_page,
        "data": data,
    });
    if let Some(hierarchy) = cl.date_hierarchy_data() {
        out["date_hierarchy_data"] = hierarchy;
    }
    Ok(Json(out))
}

/// `GET /{app}/{model}/filters`: what the list view can be narrowed and
/// ordered by, and the actions the user may run.
pub async fn filters(
    State(site): State<SharedSite>,
    method: Method,
    headers: HeaderMap,
    Path((app, model)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let (admin, user, _) = gate(&site, &headers, &method, &app, &model).await?;
    let api_root = site.api_root(&headers);
    let params = QueryParams::new();

    let tables = site.store().read().await;
    let ctx = QueryContext {
        registry: site.registry(),
        tables: &tables,
    };
    let cl = ChangeList::new(admin, ctx, params.clone())
        .map_err(|e| ApiError::message(format!("Error due to {}", error_text(&e))))?;

    let mut out = Map::new();
    let specs = filter_specs(admin, ctx, &params, &api_root);
    if !specs.is_empty() {
        out.insert("filters".into(), Value::Array(specs));
    }
    if !admin.get_ordering().is_empty() {
        out.insert(
            "order".into(),
            json!({ "name": ORDER_VAR, "fields": admin.get_ordering() }),
        );
    }
    if !admin.search_fields.is_empty() {
        out.insert("search".into(), json!({ "name": SEARCH_VAR }));
    }
    if let Some(hierarchy) = cl.date_hierarchy_data() {
        out.insert("date_hierarchy_data".into(), hierarchy);
    }
    let actions: Vec<Value> = admin
        .actions
        .allowed(admin, &user)
        .into_iter()
        .map(|action| json!({ "name": action.name(), "desc": describe(action, &admin.meta) }))
        .collect();
    if !actions.is_empty() {
        out.insert("actions".into(), Value::Array(actions));
    }
    out.insert("list_display".into(), json!(admin.get_list_display()));
    Ok(Json(Value::Object(out)))
}

/// `GET /{app}/{model}/fields`: form field descriptors and inlines.
pub async fn fields(
    State(site): State<SharedSite>,
    method: Method,
    headers: HeaderMap,
    Path((app, model)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let (admin, user, _) = gate(&site, &headers, &method, &app, &model).await?;
    Ok(Json(fields_metadata(admin, &user, &site.api_root(&headers))))
}

// ── Single records ──────────────────────────────────────────────────

/// `GET /{app}/{model}/{id}`.
pub async fn detail(
    State(site): State<SharedSite>,
    method: Method,
    headers: HeaderMap,
    Path((app, model, id)): Path<(String, String, String)>,
) -> ApiResult<Json<Value>> {
    let (admin, user, kind) = gate(&site, &headers, &method, &app, &model).await?;
    let pk = parse_id(&id)?;
    let tables = site.store().read().await;
    let record = tables
        .get(&admin.meta, pk)
        .ok_or_else(|| ApiError::NotFound("Not found.".into()))?;
    check_object(admin, &user, kind, record)?;

    let media_base = site.media_base(&headers);
    let ctx = QueryContext {
        registry: site.registry(),
        tables: &tables,
    };
    let serializer = RecordSerializer::new(ctx, &media_base);
    let mut out = into_map(serializer.to_representation(&admin.meta, record));
    out.insert("perms".into(), json!(admin.object_perms(&user, record)));
    let inlines = admin.get_inline_instances(&user);
    attach_inline_objects(&mut out, &inlines, &user, &tables, &serializer, pk);
    Ok(Json(Value::Object(out)))
}

/// `POST /{app}/{model}/add`.
pub async fn create(
    State(site): State<SharedSite>,
    method: Method,
    headers: HeaderMap,
    Path((app, model)): Path<(String, String)>,
    request: Request,
) -> ApiResult<Json<Value>> {
    let (admin, user, _) = gate(&site, &headers, &method, &app, &model).await?;
    let data = read_form_data(request).await?;
    save_form(&site, admin, &user, &headers, &data, None).await.map(Json)
}

/// `PATCH /{app}/{model}/{id}/change`.
pub async fn change(
    State(site): State<SharedSite>,
    method: Method,
    headers: HeaderMap,
    Path((app, model, id)): Path<(String, String, String)>,
    request: Request,
) -> ApiResult<Json<Value>> {
    let (admin, user, _) = gate(&site, &headers, &method, &app, &model).await?;
    let pk = parse_id(&id)?;
    let data = read_form_data(request).await?;
    save_form(&site, admin, &user, &headers, &data, Some(pk)).await.map(Json)
}

/// Binds the admin form and its inline formsets, validates everything, then
/// saves and logs in one transaction. `object` is the row being changed.
async fn save_form(
    site: &AdminSite,
    admin: &ModelAdmin,
    user: &User,
    headers: &HeaderMap,
    data: &FormData,
    object: Option<i64>,
) -> ApiResult<Value> {
    let meta = Arc::clone(&admin.meta);
    let mut txn = site.store().begin().await;

    let instance = match object {
        Some(pk) => {
            let record = txn
                .get(&meta, pk)
                .cloned()
                .ok_or_else(|| ApiError::NotFound("Not found.".into()))?;
            check_object(admin, user, PermissionKind::Change, &record)?;
            Some(record)
        }
        None => None,
    };
    let change = instance.is_some();

    let fields = admin.form_fields();
    let inline_instances = admin.get_inline_instances(user);
    let specs: Vec<FormSetSpec> = inline_instances
        .iter()
        .map(InlineInstance::formset_spec)
        .collect();

    let mut form = ModelForm::new(Arc::clone(&meta), &fields, data)
        .instance(instance)
        .extra_fields(&admin.extra_fields);
    let ctx = QueryContext {
        registry: site.registry(),
        tables: &txn,
    };
    let form_valid = form.full_clean(ctx);
    let mut formsets: Vec<InlineFormSet<'_>> = specs
        .iter()
        .map(|spec| InlineFormSet::bind(ctx, spec, data, object))
        .collect();
    let formsets_valid = all_valid(&mut formsets, ctx);

    if !(form_valid && formsets_valid) {
        let mut errors = into_map(form.errors());
        let inline_errors: Vec<Value> = formsets
            .iter()
            .filter(|formset| !formset.is_valid())
            .map(InlineFormSet::error_entry)
            .collect();
        if !inline_errors.is_empty() {
            errors.insert("inlines".into(), Value::Array(inline_errors));
        }
        tracing::debug!(model = %admin.model_key(), "form submission rejected");
        return Err(ApiError::Parse(Value::Object(errors)));
    }

    let pk = form.save(&mut txn)?;
    let mut changes = Vec::new();
    for formset in &mut formsets {
        changes.extend(formset.save(site.registry(), &mut txn, pk)?);
    }
    let message = construct_change_message(&form.changed_labels(), &changes, !change).to_string();

    let repr = txn.get(&meta, pk).map(|r| meta.str(r)).unwrap_or_default();
    let log = Arc::clone(site.log_store());
    let (user_id, content_type) = (user.id, meta.label_lower());
    txn.on_commit(move || {
        let object_id = pk.to_string();
        if change {
            log.log_change(user_id, &content_type, &object_id, &repr, &message);
        } else {
            log.log_addition(user_id, &content_type, &object_id, &repr, &message);
        }
    });

    let media_base = site.media_base(headers);
    let ctx = QueryContext {
        registry: site.registry(),
        tables: &txn,
    };
    let serializer = RecordSerializer::new(ctx, &media_base);
    let mut out = Map::new();
    if let Some(record) = txn.get(&meta, pk) {
        out = into_map(serializer.to_representation(&meta, record));
        out.insert(
            "perms".into(),
            json!({
                "change": admin.has_change_permission(user, Some(record)),
                "delete": admin.has_delete_permission(user, Some(record)),
                "view": admin.has_view_permission(user, Some(record)),
            }),
        );
    }
    attach_inline_objects(&mut out, &inline_instances, user, &txn, &serializer, pk);

    txn.commit();
    tracing::info!(
        model = %meta.label_lower(),
        pk,
        user = %user.username,
        "{}",
        if change { "changed" } else { "created" }
    );
    Ok(Value::Object(out))
}

// ── Bulk operations ─────────────────────────────────────────────────

/// Reads a required, non-blank body value, trying each alias in turn.
fn required_value<'d>(
    data: &'d FormData,
    keys: &[&str],
    errors: &mut Map<String, Value>,
) -> Option<&'d str> {
    let value = keys.iter().find_map(|key| data.get(key));
    let error = match value {
        None => "This field is required.",
        Some(v) if v.trim().is_empty() => "This field may not be blank.",
        Some(v) => return Some(v),
    };
    errors.insert(keys[0].to_string(), json!([error]));
    None
}

/// `POST /{app}/{model}/action`: runs an action over `item_ids`.
pub async fn action(
    State(site): State<SharedSite>,
    method: Method,
    headers: HeaderMap,
    Path((app, model)): Path<(String, String)>,
    request: Request,
) -> ApiResult<Json<Value>> {
    let (admin, user, _) = gate(&site, &headers, &method, &app, &model).await?;
    let data = read_form_data(request).await?;

    let mut errors = Map::new();
    let item_ids = required_value(&data, &["item_ids", "ids"], &mut errors);
    let action_name = required_value(&data, &["action"], &mut errors);
    let (Some(item_ids), Some(action_name)) = (item_ids, action_name) else {
        return Err(ApiError::Parse(Value::Object(errors)));
    };

    let ids = item_ids
        .split(',')
        .map(|part| part.trim().parse::<i64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| ApiError::message("Error due to getting items from item_ids."))?;

    let mut txn = site.store().begin().await;
    let selected: Vec<i64> = txn
        .all(&admin.meta)
        .into_iter()
        .filter_map(|record| admin.meta.pk_of(record))
        .filter(|pk| ids.contains(pk))
        .collect();
    if selected.is_empty() {
        return Err(ApiError::message(NO_ITEMS_SELECTED));
    }

    let action = admin
        .actions
        .allowed(admin, &user)
        .into_iter()
        .find(|a| a.name() == action_name)
        .ok_or_else(|| ApiError::message("Given action is not found."))?;

    let count = selected.len();
    let mut messages = Messages::new();
    let mut ctx = ActionContext {
        site: &site,
        model_admin: admin,
        user: &user,
        txn: &mut txn,
        selected,
        messages: &mut messages,
    };
    action.execute(&mut ctx).await?;
    txn.commit();
    tracing::info!(model = %admin.model_key(), action = action_name, count, "action performed");
    Ok(Json(json!(messages.into_payload())))
}

/// `DELETE /{app}/{model}/{ids}/delete-summary`: what deleting each row
/// would remove, without deleting anything.
pub async fn delete_summary(
    State(site): State<SharedSite>,
    method: Method,
    headers: HeaderMap,
    Path((app, model, ids)): Path<(String, String, String)>,
) -> ApiResult<Json<Value>> {
    let (admin, user, kind) = gate(&site, &headers, &method, &app, &model).await?;
    let tables = site.store().read().await;
    let pks = get_objects(admin, &user, kind, &tables, &ids)?;
    let ctx = QueryContext {
        registry: site.registry(),
        tables: &tables,
    };

    let summaries = pks
        .into_iter()
        .map(|pk| {
            let summary = get_deleted_objects(&site, &user, ctx, &admin.meta, &[pk]);
            let permission = summary.is_allowed();
            json!({
                "deleted_objects": summary.to_delete,
                "model_count": summary.model_count,
                "permission": permission,
                "id": pk,
            })
        })
        .collect();
    Ok(Json(Value::Array(summaries)))
}

/// `DELETE /{app}/{model}/{ids}/delete`: deletes every row or none.
pub async fn delete_objects(
    State(site): State<SharedSite>,
    method: Method,
    headers: HeaderMap,
    Path((app, model, ids)): Path<(String, String, String)>,
) -> ApiResult<Json<Value>> {
    let (admin, user, kind) = gate(&site, &headers, &method, &app, &model).await?;
    let meta = Arc::clone(&admin.meta);
    let mut txn = site.store().begin().await;
    let pks = get_objects(admin, &user, kind, &txn, &ids)?;

    let mut deleted = Vec::with_capacity(pks.len());
    for pk in pks {
        let ctx = QueryContext {
            registry: site.registry(),
            tables: &txn,
        };
        let summary = get_deleted_objects(&site, &user, ctx, &meta, &[pk]);
        if !summary.is_allowed() {
            tracing::debug!(model = %meta.label_lower(), pk, "delete blocked");
            return Err(ApiError::PermissionDenied);
        }
        if let Some(record) = txn.get(&meta, pk) {
            deleted.push((pk.to_string(), meta.str(record)));
        }
        summary.plan.apply(&mut txn);
    }

    let log = Arc::clone(site.log_store());
    let (user_id, content_type) = (user.id, meta.label_lower());
    let count = deleted.len();
    txn.on_commit(move || {
        for (object_id, repr) in &deleted {
            log.log_deletion(user_id, &content_type, object_id, repr);
        }
    });
    txn.commit();
    tracing::info!(model = %meta.label_lower(), count, "deleted");
    Ok(Json(json!({ "message": "The objects was deleted successfully." })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request(content_type: &str, body: &'static str) -> Request {
        Request::builder()
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_read_json_and_urlencoded_bodies() {
        let data = read_form_data(request("application/json", r#"{"title": "a", "n": 2}"#))
            .await
            .unwrap();
        assert_eq!(data.get("title"), Some("a"));
        assert_eq!(data.get("n"), Some("2"));

        let data = read_form_data(request("application/x-www-form-urlencoded", "title=b+c&x=1"))
            .await
            .unwrap();
        assert_eq!(data.get("title"), Some("b c"));

        assert!(read_form_data(request("application/json", "")).await.unwrap().is_empty());
        let err = read_form_data(request("application/json", "{")).await.unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn test_read_multipart_body() {
        let body = "--XX\r\n\
                    Content-Disposition: form-data; name=\"title\"\r\n\r\n\
                    hello\r\n\
                    --XX\r\n\
                    Content-Disposition: form-data; name=\"doc\"; filename=\"a.txt\"\r\n\
                    Content-Type: text/plain\r\n\r\n\
                    data\r\n\
                    --XX--\r\n";
        let data = read_form_data(request("multipart/form-data; boundary=XX", body))
            .await
            .unwrap();
        assert_eq!(data.get("title"), Some("hello"));
        let file = data.file("doc").unwrap();
        assert_eq!(file.name, "a.txt");
        assert_eq!(file.content, b"data");
    }

    #[test]
    fn test_required_value() {
        let mut data = FormData::new();
        data.set("ids", "1,2");
        data.set("action", " ");
        let mut errors = Map::new();
        assert_eq!(required_value(&data, &["item_ids", "ids"], &mut errors), Some("1,2"));
        assert_eq!(required_value(&data, &["action"], &mut errors), None);
        assert_eq!(required_value(&data, &["missing"], &mut errors), None);
        assert_eq!(errors["action"], json!(["This field may not be blank."]));
        assert_eq!(errors["missing"], json!(["This field is required."]));
    }
}
