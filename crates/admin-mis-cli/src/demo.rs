//! The demo app served by `runserver`.
//!
//! Two small lookup models and `AllfieldModel`, which declares one field of
//! every supported type so that every branch of the field metadata and form
//! cleaning can be exercised from a client.

use std::sync::Arc;

use admin_mis_admin::actions::ActionContext;
use admin_mis_admin::{
    AdminSite, DisplayColumn, FnAction, InlineAdmin, ListFilter, ModelAdmin, PermissionKind,
    SimpleListFilter,
};
use admin_mis_core::{MisResult, Settings};
use admin_mis_db::validators::{
    FileExtensionValidator, ImageValidator, Limit, MaxValueValidator, MinValueValidator,
    RegexValidator,
};
use admin_mis_db::{
    FieldDef, FieldType, GeometryType, ModelMeta, ModelRegistry, OnDelete, Record, Store,
};
use chrono::{Datelike, Duration, NaiveDateTime, Utc};
use serde_json::{json, Value};

pub const APP_LABEL: &str = "django_admin_mis";

fn years_ago(years: i32) -> NaiveDateTime {
    let now = Utc::now().naive_utc();
    now.with_year(now.year() - years)
        .unwrap_or_else(|| now - Duration::days(365 * i64::from(years)))
}

fn min_year() -> Limit {
    Limit::DateTime(years_ago(100))
}

fn max_year() -> Limit {
    Limit::DateTime(years_ago(18))
}

const fn min_value() -> Limit {
    Limit::Int(100)
}

const fn max_value() -> Limit {
    Limit::Int(200)
}

fn name_of(record: &Record) -> String {
    record
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn geometry(name: &'static str, geom_type: GeometryType) -> FieldDef {
    FieldDef::new(name, FieldType::GeometryField { geom_type }).help_text("help")
}

fn all_field_model() -> MisResult<ModelMeta> {
    let phone = RegexValidator::from_pattern(r"^9\d{9}$")?
        .message("Phone number must be start with 9 and 10 digits allowed.");
    let help = |name: &'static str, field_type: FieldType| {
        FieldDef::new(name, field_type).help_text("help")
    };

    Ok(ModelMeta::new(APP_LABEL, "AllfieldModel")
        .field(help("big_integer_field", FieldType::BigIntegerField))
        .field(help("boolean_field", FieldType::BooleanField).default(false).nullable().blank())
        .field(help("binary_field", FieldType::BinaryField))
        .field(help("char_field", FieldType::CharField).max_length(24))
        .field(help("char_choices_field", FieldType::CharField).choices(&[(1, "1")]))
        .field(
            help("date_field", FieldType::DateTimeField)
                .validator(MinValueValidator::new(Limit::Callable(min_year)))
                .validator(MaxValueValidator::new(Limit::Callable(max_year))),
        )
        .field(help(
            "decimal_field",
            FieldType::DecimalField {
                max_digits: Some(12),
                decimal_places: Some(2),
            },
        ))
        .field(help("duration_field", FieldType::DurationField))
        .field(help("email_field", FieldType::EmailField))
        .field(
            FieldDef::new(
                "file_field",
                FieldType::FileField {
                    upload_to: "website/icon/".into(),
                },
            )
            .validator(FileExtensionValidator::new(&["pdf", "mp4"]))
            .help_text("icon to show in press release."),
        )
        .field(
            help("float_field", FieldType::FloatField)
                .validator(MinValueValidator::new(Limit::Callable(min_value)))
                .validator(MaxValueValidator::new(Limit::Callable(max_value))),
        )
        .field(
            help(
                "foreign_field",
                FieldType::ForeignKey {
                    to: format!("{APP_LABEL}.foreign1"),
                    on_delete: OnDelete::Cascade,
                    related_name: Some("Foreign1ss".into()),
                },
            )
            .limit_choices_to("name__icontains", "anc"),
        )
        .field(help("generic_ip_field", FieldType::GenericIpAddressField))
        .field(geometry("geometry_field", GeometryType::Geometry))
        .field(
            FieldDef::new(
                "image_field",
                FieldType::ImageField {
                    upload_to: "website/icon/".into(),
                },
            )
            .validator(ImageValidator::new(Some(500), Some((100, 100)), Some((500, 500))))
            .help_text("help"),
        )
        .field(help("integer_field", FieldType::IntegerField))
        .field(help("json_field", FieldType::JsonField).default_fn(|| json!({})))
        .field(geometry("line_string_field", GeometryType::LineString))
        .field(help(
            "many_to_many_field",
            FieldType::ManyToManyField {
                to: format!("{APP_LABEL}.foreign1"),
                related_name: None,
            },
        ))
        .field(geometry("multi_line_string_field", GeometryType::MultiLineString))
        .field(geometry("multi_polygon_field", GeometryType::MultiPolygon))
        .field(help(
            "o2o_field",
            FieldType::OneToOneField {
                to: format!("{APP_LABEL}.foreign2"),
                on_delete: OnDelete::Cascade,
                related_name: None,
            },
        ))
        .field(geometry("point_field", GeometryType::Point))
        .field(geometry("polygon_field", GeometryType::Polygon))
        .field(help("positive_big_integer_field", FieldType::PositiveBigIntegerField))
        .field(help("positive_small_integer_field", FieldType::PositiveSmallIntegerField))
        .field(help("positive_integer_field", FieldType::PositiveIntegerField))
        .field(help("small_interger_field", FieldType::SmallIntegerField))
        .field(help("time_field", FieldType::TimeField))
        .field(help("url_field", FieldType::UrlField))
        .field(help("uuid_field", FieldType::UuidField))
        .field(
            help("pg_array_field", FieldType::ArrayField { size: Some(2) }).base_field(
                FieldDef::new("pg_array_field", FieldType::CharField)
                    .max_length(24)
                    .choices(&[
                        ("superuser", "Superuser"),
                        ("client", "Client"),
                        ("vendor", "Vendor"),
                        ("employee", "Employee"),
                    ]),
            ),
        )
        .field(
            help("pg_array_integer_field", FieldType::ArrayField { size: Some(2) })
                .base_field(FieldDef::new("pg_array_integer_field", FieldType::IntegerField)),
        )
        .field(help("pg_big_integer_range_field", FieldType::BigIntegerRangeField).nullable())
        .field(help("pg_date_range_field", FieldType::DateRangeField).nullable())
        .field(help("pg_date_time_range_field", FieldType::DateTimeRangeField).nullable())
        .field(
            help("pg_decimal_range_field", FieldType::DecimalRangeField)
                .nullable()
                .base_field(FieldDef::new(
                    "pg_decimal_range_field",
                    FieldType::DecimalField {
                        max_digits: Some(12),
                        decimal_places: Some(2),
                    },
                )),
        )
        .field(help("pg_integer_range_field", FieldType::IntegerRangeField))
        .field(help("pg_hstore_field", FieldType::HStoreField))
        .field(
            FieldDef::new("phone_number", FieldType::CharField)
                .validator(phone)
                .max_length(14)
                .unique()
                .verbose_name("Phone Number")
                .help_text("Enter your phone number."),
        ))
}

/// The demo model registry.
///
/// # Errors
///
/// Fails only if a declared validator pattern does not compile.
pub fn registry() -> MisResult<ModelRegistry> {
    let mut registry = ModelRegistry::new();
    registry.register_app(APP_LABEL, "Django Admin Mis");
    registry.register(
        ModelMeta::new(APP_LABEL, "Foreign1")
            .field(FieldDef::new("name", FieldType::CharField))
            .display(name_of),
    );
    registry.register(
        ModelMeta::new(APP_LABEL, "Foreign2")
            .field(FieldDef::new("name", FieldType::CharField))
            .display(name_of),
    );
    registry.register(all_field_model()?);
    Ok(registry)
}

fn mark_checked(ctx: &mut ActionContext<'_>) -> MisResult<()> {
    let meta = Arc::clone(ctx.meta());
    let selected = ctx.selected.clone();
    for pk in &selected {
        ctx.txn.set_field(&meta, *pk, "boolean_field", json!(true));
    }
    ctx.messages.success(format!("{} rows were marked as checked.", selected.len()));
    Ok(())
}

fn named_like(value: &str, record: &Record) -> bool {
    let name = name_of(record).to_lowercase();
    match value {
        "anc" => name.contains("anc"),
        "other" => !name.contains("anc"),
        _ => true,
    }
}

/// Builds the demo site: the registry, its model admins and the settings.
///
/// # Errors
///
/// Returns an error when the registry cannot be built or an admin is
/// misconfigured.
pub fn site(settings: Settings) -> MisResult<AdminSite> {
    let registry = Arc::new(registry()?);
    let model = |name: &str| {
        registry.get_model(APP_LABEL, name).ok_or_else(|| {
            admin_mis_core::MisError::ImproperlyConfigured(format!("demo model {name} is missing"))
        })
    };
    let foreign1 = model("foreign1")?;
    let foreign2 = model("foreign2")?;
    let all_fields = model("allfieldmodel")?;

    let mut site = AdminSite::new(settings, Store::new(Arc::clone(&registry)));
    site.register(
        ModelAdmin::new(Arc::clone(&foreign1))
            .list_display(vec!["__str__", "name", "field_count"])
            .list_filter(vec![ListFilter::Simple(
                SimpleListFilter::new("name", "name_kind", named_like)
                    .lookup("anc", "Contains anc")
                    .lookup("other", "Other"),
            )])
            .search_fields(vec!["name"])
            .column(
                DisplayColumn::new("field_count", |r| json!(name_of(r).len())).order_field("name"),
            )
            .inlines(vec![InlineAdmin::new(Arc::clone(&all_fields))
                .fk_name("foreign_field")
                .fields(vec![
                    "char_field",
                    "char_choices_field",
                    "integer_field",
                    "phone_number",
                ])]),
    )?;
    site.register(
        ModelAdmin::new(foreign2)
            .list_display(vec!["id", "name"])
            .search_fields(vec!["^name"])
            .ordering(vec!["name"]),
    )?;
    site.register(
        ModelAdmin::new(all_fields)
            .list_display(vec![
                "__str__",
                "char_field",
                "integer_field",
                "boolean_field",
                "date_field",
            ])
            .list_filter_fields(vec![
                "boolean_field",
                "foreign_field",
                "date_field",
                "char_choices_field",
            ])
            .search_fields(vec!["char_field", "=phone_number", "foreign_field__name"])
            .date_hierarchy("date_field")
            .ordering(vec!["-id"])
            .readonly_fields(vec!["uuid_field"])
            .action(Box::new(
                FnAction::new(
                    "mark_checked",
                    "Mark selected %(verbose_name_plural)s as checked",
                    mark_checked,
                )
                .permissions(&[PermissionKind::Change]),
            )),
    )?;
    Ok(site)
}

/// Loads a few rows into every demo table.
///
/// # Errors
///
/// Returns an error when a fixture row is rejected by the store.
pub async fn seed(site: &AdminSite) -> MisResult<()> {
    let registry = site.registry();
    let store = site.store();
    let Some(foreign1) = registry.get_model(APP_LABEL, "foreign1") else {
        return Ok(());
    };
    let Some(foreign2) = registry.get_model(APP_LABEL, "foreign2") else {
        return Ok(());
    };
    let Some(all_fields) = registry.get_model(APP_LABEL, "allfieldmodel") else {
        return Ok(());
    };
    store
        .seed(
            &foreign1,
            vec![
                json!({"name": "ancient"}),
                json!({"name": "fancy"}),
                json!({"name": "plain"}),
            ],
        )
        .await?;
    store
        .seed(&foreign2, vec![json!({"name": "first"}), json!({"name": "second"})])
        .await?;
    let rows = (1..=2).map(|n: i64| {
        json!({
            "big_integer_field": 9_000_000_000_i64 + n,
            "boolean_field": false,
            "binary_field": null,
            "char_field": format!("row {n}"),
            "char_choices_field": "1",
            "date_field": format!("{}-05-17T10:30:00", 1990 + n),
            "decimal_field": "12.50",
            "duration_field": "1 02:00:00",
            "email_field": format!("row{n}@example.com"),
            "file_field": "",
            "float_field": 150.0,
            "foreign_field": n,
            "generic_ip_field": "127.0.0.1",
            "geometry_field": "POINT (1 2)",
            "image_field": "",
            "integer_field": n * 10,
            "json_field": {},
            "line_string_field": "LINESTRING (0 0, 1 1)",
            "many_to_many_field": [1, 2],
            "multi_line_string_field": "MULTILINESTRING ((0 0, 1 1))",
            "multi_polygon_field": "MULTIPOLYGON (((0 0, 0 1, 1 1, 0 0)))",
            "o2o_field": n,
            "point_field": "POINT (1 2)",
            "polygon_field": "POLYGON ((0 0, 0 1, 1 1, 0 0))",
            "positive_big_integer_field": n,
            "positive_small_integer_field": n,
            "positive_integer_field": n,
            "small_interger_field": n,
            "time_field": "10:30:00",
            "url_field": "https://example.com/",
            "uuid_field": format!("6f1c1d38-8a48-4b6e-9d7a-00000000000{n}"),
            "pg_array_field": ["client", "vendor"],
            "pg_array_integer_field": [n, n + 1],
            "pg_integer_range_field": {"lower": 1, "upper": 10, "bounds": "[)"},
            "pg_hstore_field": {"key": "value"},
            "phone_number": format!("912345678{n}"),
        })
    });
    store.seed(&all_fields, rows).await?;
    tracing::info!("seeded demo data");
    Ok(())
}
