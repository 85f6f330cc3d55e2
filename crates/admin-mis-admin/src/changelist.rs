//! The change list: the filtered, searched, ordered and paginated rows of a
//! model.
//!
//! Query parameters follow the admin conventions: `q` searches, `o` orders by
//! list-display indexes joined with `.` (`"0.-2"`), `p` picks a 1-based page,
//! and every other kept parameter is a field lookup such as `status__exact=1`
//! or `created__year=2024`.

use std::fmt;

use admin_mis_core::{MisError, MisResult};
use admin_mis_db::fields::FieldType;
use admin_mis_db::query::{filter, order_by, search};
use admin_mis_db::{Lookup, ModelMeta, QueryContext, Record};
use serde_json::{json, Map, Value};

use crate::date_hierarchy::date_hierarchy;
use crate::filters::apply_simple_filters;
use crate::model_admin::{ListFilter, ModelAdmin};
use crate::utils::{query_get, QueryParams};

pub const SEARCH_VAR: &str = "q";
pub const ORDER_VAR: &str = "o";
pub const PAGE_VAR: &str = "p";
/// Returns `[{id, display}]` rows instead of list-display rows.
pub const FILTER_LIST_VAR: &str = "filter_list";

// ── Pagination ──────────────────────────────────────────────────────

/// Why a requested page cannot be served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaginationError {
    LessThanOne,
    EmptyPage,
}

impl fmt::Display for PaginationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LessThanOne => write!(f, "That page number is less than 1"),
            Self::EmptyPage => write!(f, "That page contains no results"),
        }
    }
}

/// Splits rows into pages of `per_page`. An empty first page is allowed.
#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    count: usize,
    per_page: usize,
}

impl Paginator {
    pub fn new(count: usize, per_page: usize) -> Self {
        Self {
            count,
            per_page: per_page.max(1),
        }
    }

    pub const fn num_pages(&self) -> usize {
        if self.count == 0 {
            1
        } else {
            self.count.div_ceil(self.per_page)
        }
    }

    /// The index range of a 1-based page.
    ///
    /// # Errors
    ///
    /// Fails for page zero and for pages past the last one.
    pub fn page(&self, number: usize) -> Result<std::ops::Range<usize>, PaginationError> {
        if number == 0 {
            return Err(PaginationError::LessThanOne);
        }
        if number > self.num_pages() {
            return Err(PaginationError::EmptyPage);
        }
        let start = (number - 1) * self.per_page;
        Ok(start..(start + self.per_page).min(self.count))
    }
}

// ── ChangeList ──────────────────────────────────────────────────────

/// The rows one list request resolves to.
pub struct ChangeList<'a> {
    admin: &'a ModelAdmin,
    ctx: QueryContext<'a>,
    params: QueryParams,
    /// Rows after filtering and search, before pagination.
    pub filtered: Vec<&'a Record>,
    /// The rows of the requested page.
    pub result_list: Vec<&'a Record>,
    pub result_count: usize,
    pub full_result_count: usize,
    pub list_per_page: usize,
    pub page_num: usize,
    pub ordering: Vec<String>,
}

impl<'a> ChangeList<'a> {
    /// Drops parameters the list does not understand: anything whose root is
    /// not `q`, `o`, `p`, a list filter or the date hierarchy field.
    pub fn allowed_params(admin: &ModelAdmin, params: QueryParams) -> QueryParams {
        let mut roots: Vec<String> = vec![SEARCH_VAR.into(), ORDER_VAR.into(), PAGE_VAR.into()];
        roots.extend(admin.filter_roots());
        if let Some(field) = &admin.date_hierarchy {
            roots.push(field.split("__").next().unwrap_or_default().to_string());
        }
        params
            .into_iter()
            .filter(|(key, _)| {
                let root = key.split("__").next().unwrap_or_default();
                roots.iter().any(|r| r == root)
            })
            .collect()
    }

    /// Builds the change list for already-restricted `params`.
    ///
    /// # Errors
    ///
    /// Returns [`MisError::BadRequest`] for a lookup that names no field or
    /// a page outside the results.
    pub fn new(
        admin: &'a ModelAdmin,
        ctx: QueryContext<'a>,
        params: QueryParams,
    ) -> MisResult<Self> {
        let meta = &admin.meta;
        let all = ctx.tables.all(meta);
        let full_result_count = all.len();

        let simple: Vec<&str> = admin
            .list_filter
            .iter()
            .filter_map(|f| match f {
                ListFilter::Simple(s) => Some(s.parameter_name.as_str()),
                ListFilter::Field(_) => None,
            })
            .collect();
        let lookups = params
            .iter()
            .filter(|(key, _)| {
                ![SEARCH_VAR, ORDER_VAR, PAGE_VAR].contains(&key.as_str())
                    && !simple.contains(&key.as_str())
            })
            .map(|(key, value)| {
                Lookup::parse(ctx.registry, meta, key, Value::String(value.clone()))
            })
            .collect::<MisResult<Vec<_>>>()?;

        let rows = apply_simple_filters(admin, &params, all);
        let rows = filter(ctx, meta, rows, &lookups);
        let mut filtered = match query_get(&params, SEARCH_VAR) {
            Some(q) => search(ctx, meta, rows, &admin.search_fields, q),
            None => rows,
        };

        let ordering = get_ordering(admin, &params);
        order_by(ctx, meta, &mut filtered, &ordering);

        let result_count = filtered.len();
        let list_per_page = admin.list_per_page;
        let page_num = query_get(&params, PAGE_VAR)
            .and_then(|p| p.trim().parse::<usize>().ok())
            .unwrap_or(1);
        let result_list = if result_count > list_per_page {
            let range = Paginator::new(result_count, list_per_page)
                .page(page_num)
                .map_err(|e| MisError::BadRequest(e.to_string()))?;
            filtered[range].to_vec()
        } else {
            filtered.clone()
        };

        Ok(Self {
            admin,
            ctx,
            params,
            filtered,
            result_list,
            result_count,
            full_result_count,
            list_per_page,
            page_num,
            ordering,
        })
    }

    /// One object per row: `id` (unless listed) and every list-display
    /// column.
    pub fn rows(&self) -> Vec<Value> {
        let meta = &self.admin.meta;
        let list_display = self.admin.get_list_display();
        self.result_list
            .iter()
            .map(|record| {
                let mut row = Map::new();
                if !list_display.iter().any(|c| c == "id") {
                    row.insert("id".into(), json!(meta.pk_of(record)));
                }
                for column in list_display {
                    row.insert(column.clone(), self.column_value(meta, record, column));
                }
                Value::Object(row)
            })
            .collect()
    }

    /// `[{id, display}]` rows, used to populate relation pickers.
    pub fn filter_list_rows(&self) -> Vec<Value> {
        let meta = &self.admin.meta;
        self.result_list
            .iter()
            .map(|record| json!({"id": meta.pk_of(record), "display": meta.str(record)}))
            .collect()
    }

    /// The drill-down over the filtered rows, when the admin has a date
    /// hierarchy.
    pub fn date_hierarchy_data(&self) -> Option<Value> {
        let field = self.admin.date_hierarchy.as_deref()?;
        Some(date_hierarchy(self.ctx, &self.admin.meta, field, &self.filtered, &self.params))
    }

    fn column_value(&self, meta: &ModelMeta, record: &Record, column: &str) -> Value {
        if column == "__str__" {
            return Value::String(meta.str(record));
        }
        if let Some(computed) = self.admin.get_column(column) {
            return computed.value(record);
        }
        let Some(field) = meta.get_field(column) else {
            tracing::warn!(
                model = %meta.label_lower(),
                column,
                "list_display names no field or column"
            );
            return Value::Null;
        };
        let value = record.get(field.name).cloned().unwrap_or(Value::Null);
        match &field.field_type {
            FieldType::ForeignKey { .. } | FieldType::OneToOneField { .. } => value
                .as_i64()
                .and_then(|pk| {
                    let related = self.ctx.registry.get_by_label(field.related_model()?)?;
                    let row = self.ctx.tables.get(&related, pk)?;
                    Some(Value::String(related.str(row)))
                })
                .unwrap_or(value),
            _ => value,
        }
    }
}

impl fmt::Debug for ChangeList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeList")
            .field("model", &self.admin.model_key())
            .field("result_count", &self.result_count)
            .field("page_num", &self.page_num)
            .field("ordering", &self.ordering)
            .finish_non_exhaustive()
    }
}

/// The ordering for the request. An `o` parameter replaces the default
/// ordering; its entries are list-display indexes, optionally prefixed with
/// `-`, or field names.
fn get_ordering(admin: &ModelAdmin, params: &QueryParams) -> Vec<String> {
    let Some(order) = query_get(params, ORDER_VAR) else {
        let ordering = admin.get_ordering();
        return if ordering.is_empty() {
            admin.meta.ordering.clone()
        } else {
            ordering.to_vec()
        };
    };
    let list_display = admin.get_list_display();
    let mut ordering = Vec::new();
    for part in order.split('.') {
        let (desc, rest) = part.strip_prefix('-').map_or((false, part), |r| (true, r));
        let name = match rest.parse::<usize>() {
            Ok(idx) => match list_display.get(idx) {
                Some(column) => column.as_str(),
                None => continue,
            },
            Err(_) => rest,
        };
        let Some(field) = ordering_field(admin, name) else {
            continue;
        };
        ordering.push(if desc { format!("-{field}") } else { field });
    }
    ordering
}

fn ordering_field(admin: &ModelAdmin, name: &str) -> Option<String> {
    if let Some(column) = admin.get_column(name) {
        return column.admin_order_field.clone();
    }
    let root = name.split("__").next().unwrap_or_default();
    (name == "pk" || admin.meta.get_field(root).is_some()).then(|| name.to_string())
}
