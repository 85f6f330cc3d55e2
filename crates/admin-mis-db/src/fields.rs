//! Field type definitions.
//!
//! A [`FieldDef`] captures everything the admin API reports about a model
//! field: type, flags, validators, choices, relation target, and the extra
//! attributes of array, range and geometry fields.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use crate::validators::{
    slug_validator, url_validator, ArrayMaxLengthValidator, DecimalValidator, EmailValidator,
    Ipv46Validator, Limit, MaxLengthValidator, MaxValueValidator, MinValueValidator,
    ProhibitNullCharactersValidator, Validator,
};

/// The type of a model field.
///
/// Relational variants carry the lowercased label (`"app.model"`) of the
/// target model.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    AutoField,
    BigAutoField,
    CharField,
    TextField,
    SlugField,
    EmailField,
    UrlField,
    IntegerField,
    SmallIntegerField,
    BigIntegerField,
    PositiveIntegerField,
    PositiveSmallIntegerField,
    PositiveBigIntegerField,
    FloatField,
    /// Fixed-precision decimal, stored as a string.
    DecimalField {
        max_digits: Option<u32>,
        decimal_places: Option<u32>,
    },
    BooleanField,
    DateField,
    DateTimeField,
    TimeField,
    DurationField,
    UuidField,
    BinaryField,
    JsonField,
    FileField {
        upload_to: String,
    },
    ImageField {
        upload_to: String,
    },
    GenericIpAddressField,
    /// Many-to-one relationship.
    ForeignKey {
        to: String,
        on_delete: OnDelete,
        related_name: Option<String>,
    },
    /// One-to-one relationship (unique foreign key).
    OneToOneField {
        to: String,
        on_delete: OnDelete,
        related_name: Option<String>,
    },
    /// Many-to-many relationship, stored as a list of primary keys.
    ManyToManyField {
        to: String,
        related_name: Option<String>,
    },
    /// Homogeneous array; the element type is the field's `base_field`.
    ArrayField {
        size: Option<usize>,
    },
    HStoreField,
    IntegerRangeField,
    BigIntegerRangeField,
    DecimalRangeField,
    DateRangeField,
    DateTimeRangeField,
    GeometryField {
        geom_type: GeometryType,
    },
}

/// Behavior when a referenced object is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDelete {
    /// Delete all related objects.
    Cascade,
    /// Prevent deletion while related objects exist.
    Protect,
    /// Set the foreign key to NULL.
    SetNull,
    /// Set the foreign key to its default value.
    SetDefault,
    /// Take no action.
    DoNothing,
}

/// Geometry kinds of a geometry field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryType {
    Geometry,
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
    GeometryCollection,
}

impl GeometryType {
    /// The upper-case OGC name, e.g. `LINESTRING`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Geometry => "GEOMETRY",
            Self::Point => "POINT",
            Self::LineString => "LINESTRING",
            Self::Polygon => "POLYGON",
            Self::MultiPoint => "MULTIPOINT",
            Self::MultiLineString => "MULTILINESTRING",
            Self::MultiPolygon => "MULTIPOLYGON",
            Self::GeometryCollection => "GEOMETRYCOLLECTION",
        }
    }

    /// Whether a `GeoJSON` / WKT type name is acceptable for this field.
    pub fn accepts(self, type_name: &str) -> bool {
        let upper = type_name.to_ascii_uppercase();
        self == Self::Geometry || upper == self.as_str()
    }
}

/// A default value, either fixed or computed per use.
#[derive(Clone)]
pub enum FieldDefault {
    Value(Value),
    Callable(fn() -> Value),
}

impl std::fmt::Debug for FieldDefault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(v) => write!(f, "Value({v})"),
            Self::Callable(_) => write!(f, "Callable"),
        }
    }
}

impl FieldDefault {
    pub fn resolve(&self) -> Value {
        match self {
            Self::Value(v) => v.clone(),
            Self::Callable(func) => func(),
        }
    }
}

/// Spatial attributes of a geometry field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoOptions {
    pub dim: u8,
    pub srid: u32,
    pub geography: bool,
    pub extent: [f64; 4],
    pub tolerance: f64,
}

impl Default for GeoOptions {
    fn default() -> Self {
        Self {
            dim: 2,
            srid: 4326,
            geography: false,
            extent: [-180.0, -90.0, 180.0, 90.0],
            tolerance: 0.05,
        }
    }
}

/// Complete definition of a model field.
#[derive(Debug)]
pub struct FieldDef {
    pub name: &'static str,
    pub field_type: FieldType,
    pub primary_key: bool,
    /// Created by the model layer rather than declared (e.g. the implicit `id`).
    pub auto_created: bool,
    pub null: bool,
    /// Whether the field may be left blank in forms.
    pub blank: bool,
    pub default: Option<FieldDefault>,
    pub unique: bool,
    pub max_length: Option<usize>,
    pub help_text: String,
    pub verbose_name: String,
    /// Allowed values as `(value, label)` pairs.
    pub choices: Option<Vec<(Value, String)>>,
    pub validators: Vec<Box<dyn Validator>>,
    pub editable: bool,
    pub auto_now: bool,
    pub auto_now_add: bool,
    /// Element field of array fields and bound field of range fields.
    pub base_field: Option<Box<FieldDef>>,
    /// Lookups restricting selectable related objects, e.g. `name__icontains`.
    pub limit_choices_to: Vec<(String, Value)>,
    pub geo: Option<GeoOptions>,
}

static PARENTHETICAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\([^)(]*\)").expect("valid regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

impl FieldDef {
    /// Creates a new `FieldDef` with the defaults implied by its type.
    pub fn new(name: &'static str, field_type: FieldType) -> Self {
        let auto = matches!(field_type, FieldType::AutoField | FieldType::BigAutoField);
        let max_length = match field_type {
            FieldType::EmailField => Some(254),
            FieldType::SlugField => Some(50),
            FieldType::UrlField => Some(200),
            FieldType::FileField { .. } | FieldType::ImageField { .. } => Some(100),
            _ => None,
        };
        let base_field = match field_type {
            FieldType::IntegerRangeField => Some(FieldType::IntegerField),
            FieldType::BigIntegerRangeField => Some(FieldType::BigIntegerField),
            FieldType::DecimalRangeField => Some(FieldType::DecimalField {
                max_digits: None,
                decimal_places: None,
            }),
            FieldType::DateRangeField => Some(FieldType::DateField),
            FieldType::DateTimeRangeField => Some(FieldType::DateTimeField),
            _ => None,
        }
        .map(|ft| Box::new(Self::new(name, ft)));
        let geo = matches!(field_type, FieldType::GeometryField { .. }).then(GeoOptions::default);
        let editable = !auto && field_type != FieldType::BinaryField;

        Self {
            name,
            field_type,
            primary_key: false,
            auto_created: false,
            null: false,
            blank: auto,
            default: None,
            unique: false,
            max_length,
            help_text: String::new(),
            verbose_name: name.replace('_', " "),
            choices: None,
            validators: Vec::new(),
            editable,
            auto_now: false,
            auto_now_add: false,
            base_field,
            limit_choices_to: Vec::new(),
            geo,
        }
    }

    /// The implicit `id` primary key added to models that declare none.
    pub fn auto_id() -> Self {
        let mut field = Self::new("id", FieldType::BigAutoField).primary_key();
        field.auto_created = true;
        field.verbose_name = "ID".to_string();
        field
    }

    /// Marks this field as the primary key.
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.unique = true;
        self
    }

    /// Allows NULL values.
    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.null = true;
        self
    }

    /// Allows the field to be left blank in forms.
    #[must_use]
    pub const fn blank(mut self) -> Self {
        self.blank = true;
        self
    }

    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    #[must_use]
    pub const fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    /// Sets a fixed default value.
    #[must_use]
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(FieldDefault::Value(value.into()));
        self
    }

    /// Sets a default computed each time it is needed.
    #[must_use]
    pub fn default_fn(mut self, func: fn() -> Value) -> Self {
        self.default = Some(FieldDefault::Callable(func));
        self
    }

    #[must_use]
    pub fn verbose_name(mut self, name: impl Into<String>) -> Self {
        self.verbose_name = name.into();
        self
    }

    #[must_use]
    pub fn help_text(mut self, text: impl Into<String>) -> Self {
        self.help_text = text.into();
        self
    }

    /// Restricts the value to the given `(value, label)` pairs.
    #[must_use]
    pub fn choices<V: Into<Value> + Clone>(mut self, choices: &[(V, &str)]) -> Self {
        self.choices = Some(
            choices
                .iter()
                .map(|(v, label)| (v.clone().into(), (*label).to_string()))
                .collect(),
        );
        self
    }

    /// Adds a declared validator.
    #[must_use]
    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validators.push(Box::new(validator));
        self
    }

    #[must_use]
    pub const fn editable(mut self, editable: bool) -> Self {
        self.editable = editable;
        self
    }

    /// Sets the value to "now" on every save; implies non-editable.
    #[must_use]
    pub const fn auto_now(mut self) -> Self {
        self.auto_now = true;
        self.editable = false;
        self.blank = true;
        self
    }

    /// Sets the value to "now" on creation; implies non-editable.
    #[must_use]
    pub const fn auto_now_add(mut self) -> Self {
        self.auto_now_add = true;
        self.editable = false;
        self.blank = true;
        self
    }

    /// Sets the element field of an array field or the bound field of a range.
    #[must_use]
    pub fn base_field(mut self, mut base: Self) -> Self {
        base.name = self.name;
        self.base_field = Some(Box::new(base));
        self
    }

    /// Adds a lookup restricting which related objects may be chosen.
    #[must_use]
    pub fn limit_choices_to(mut self, lookup: impl Into<String>, value: impl Into<Value>) -> Self {
        self.limit_choices_to.push((lookup.into(), value.into()));
        self
    }

    /// Overrides the spatial reference system of a geometry field.
    #[must_use]
    pub fn srid(mut self, srid: u32) -> Self {
        if let Some(geo) = self.geo.as_mut() {
            geo.srid = srid;
        }
        self
    }

    /// Marks a geometry field as geography-typed.
    #[must_use]
    pub fn geography(mut self) -> Self {
        if let Some(geo) = self.geo.as_mut() {
            geo.geography = true;
        }
        self
    }

    /// Installs the validators implied by the field type and flags.
    ///
    /// Called once when the field is added to a model.
    #[must_use]
    pub fn finalize(mut self) -> Self {
        let mut front: Vec<Box<dyn Validator>> = Vec::new();
        match &self.field_type {
            FieldType::EmailField => front.push(Box::new(EmailValidator)),
            FieldType::SlugField => front.push(Box::new(slug_validator())),
            FieldType::UrlField => front.push(Box::new(url_validator())),
            FieldType::GenericIpAddressField => front.push(Box::new(Ipv46Validator)),
            FieldType::DecimalField {
                max_digits,
                decimal_places,
            } => front.push(Box::new(DecimalValidator::new(*max_digits, *decimal_places))),
            _ => {}
        }

        let mut back: Vec<Box<dyn Validator>> = Vec::new();
        if matches!(
            self.field_type,
            FieldType::CharField
                | FieldType::SlugField
                | FieldType::EmailField
                | FieldType::UrlField
        ) {
            if let Some(max) = self.max_length {
                back.push(Box::new(MaxLengthValidator::new(max)));
            }
            back.push(Box::new(ProhibitNullCharactersValidator));
        }
        if let Some((min, max)) = self.field_type.integer_range() {
            back.push(Box::new(MinValueValidator::new(Limit::Int(min))));
            back.push(Box::new(MaxValueValidator::new(Limit::Int(max))));
        }
        if let FieldType::ArrayField { size: Some(size) } = self.field_type {
            back.push(Box::new(ArrayMaxLengthValidator::new(size)));
        }

        let declared = std::mem::take(&mut self.validators);
        self.validators = front.into_iter().chain(declared).chain(back).collect();
        self.base_field = self.base_field.take().map(|base| Box::new(base.finalize()));
        self
    }

    /// Returns `true` if this field represents a relational field.
    pub const fn is_relation(&self) -> bool {
        self.field_type.is_relation()
    }

    /// The lowercased label of the related model, for relational fields.
    pub fn related_model(&self) -> Option<&str> {
        match &self.field_type {
            FieldType::ForeignKey { to, .. }
            | FieldType::OneToOneField { to, .. }
            | FieldType::ManyToManyField { to, .. } => Some(to),
            _ => None,
        }
    }

    /// The `on_delete` behavior of foreign keys and one-to-one fields.
    pub const fn on_delete(&self) -> Option<OnDelete> {
        match &self.field_type {
            FieldType::ForeignKey { on_delete, .. }
            | FieldType::OneToOneField { on_delete, .. } => Some(*on_delete),
            _ => None,
        }
    }

    /// Name used to query from the related model back to this model.
    pub fn related_query_name(&self, model_name: &str) -> String {
        match &self.field_type {
            FieldType::ForeignKey {
                related_name: Some(name),
                ..
            }
            | FieldType::OneToOneField {
                related_name: Some(name),
                ..
            }
            | FieldType::ManyToManyField {
                related_name: Some(name),
                ..
            } => name.clone(),
            _ => model_name.to_string(),
        }
    }

    /// The human description of the field type.
    pub fn description(&self) -> String {
        match &self.field_type {
            FieldType::ArrayField { .. } => {
                let base = self
                    .base_field
                    .as_ref()
                    .map_or_else(String::new, |b| b.description());
                format!("Array of {base}")
            }
            other => other.description().to_string(),
        }
    }

    /// The `field_type` reported to clients.
    ///
    /// The description is lowercased with parenthetical remarks removed;
    /// date-time fields append `" time"` and geometry fields report their
    /// geometry kind.
    pub fn field_type_name(&self) -> String {
        if let FieldType::GeometryField { geom_type } = self.field_type {
            return geom_type.as_str().to_lowercase();
        }
        let lowered = self.description().to_lowercase();
        let stripped = PARENTHETICAL_RE.replace_all(&lowered, "");
        let stripped = PARENTHETICAL_RE.replace_all(&stripped, "");
        let mut name = WHITESPACE_RE.replace_all(&stripped, " ").trim().to_string();
        if self.field_type == FieldType::DateTimeField {
            name.push_str(" time");
        }
        name
    }

    /// Choices as `[[value, label], ...]`; empty when the field has none.
    pub fn flatchoices(&self) -> Value {
        self.choices.as_ref().map_or_else(
            || json!([]),
            |choices| {
                Value::Array(
                    choices
                        .iter()
                        .map(|(v, label)| json!([v, label]))
                        .collect(),
                )
            },
        )
    }

    /// Whether `value` is one of the declared choices (compared loosely, so
    /// `1` and `"1"` match).
    pub fn is_valid_choice(&self, value: &Value) -> bool {
        self.choices.as_ref().map_or(true, |choices| {
            choices
                .iter()
                .any(|(choice, _)| loose_eq(choice, value))
        })
    }

    /// The default value, evaluated if callable.
    pub fn default_value(&self) -> Option<Value> {
        self.default.as_ref().map(FieldDefault::resolve)
    }

    pub const fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// `limit_choices_to` as a JSON object, or `null` when unrestricted.
    pub fn limit_choices_json(&self) -> Value {
        if self.limit_choices_to.is_empty() {
            return Value::Null;
        }
        Value::Object(
            self.limit_choices_to
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

/// Compares two JSON scalars, treating numbers and their string form as equal.
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    let text = |v: &Value| match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    };
    matches!((text(a), text(b)), (Some(x), Some(y)) if x == y)
}

impl FieldType {
    pub const fn is_relation(&self) -> bool {
        matches!(
            self,
            Self::ForeignKey { .. } | Self::OneToOneField { .. } | Self::ManyToManyField { .. }
        )
    }

    pub const fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::AutoField
                | Self::BigAutoField
                | Self::IntegerField
                | Self::SmallIntegerField
                | Self::BigIntegerField
                | Self::PositiveIntegerField
                | Self::PositiveSmallIntegerField
                | Self::PositiveBigIntegerField
        )
    }

    pub const fn is_range(&self) -> bool {
        matches!(
            self,
            Self::IntegerRangeField
                | Self::BigIntegerRangeField
                | Self::DecimalRangeField
                | Self::DateRangeField
                | Self::DateTimeRangeField
        )
    }

    /// Storage range of integer fields.
    pub const fn integer_range(&self) -> Option<(i64, i64)> {
        match self {
            Self::IntegerField => Some((-2_147_483_648, 2_147_483_647)),
            Self::SmallIntegerField => Some((-32_768, 32_767)),
            Self::BigIntegerField => Some((i64::MIN, i64::MAX)),
            Self::PositiveIntegerField => Some((0, 2_147_483_647)),
            Self::PositiveSmallIntegerField => Some((0, 32_767)),
            Self::PositiveBigIntegerField => Some((0, i64::MAX)),
            _ => None,
        }
    }

    /// The human description of the type.
    pub const fn description(&self) -> &'static str {
        match self {
            Self::AutoField | Self::IntegerField => "Integer",
            Self::BigAutoField | Self::BigIntegerField => "Big (8 byte) integer",
            Self::CharField => "String (up to %(max_length)s)",
            Self::TextField => "Text",
            Self::SlugField => "Slug (up to %(max_length)s)",
            Self::EmailField => "Email address",
            Self::UrlField => "URL",
            Self::SmallIntegerField => "Small integer",
            Self::PositiveIntegerField => "Positive integer",
            Self::PositiveSmallIntegerField => "Positive small integer",
            Self::PositiveBigIntegerField => "Positive big integer",
            Self::FloatField => "Floating point number",
            Self::DecimalField { .. } => "Decimal number",
            Self::BooleanField => "Boolean (Either True or False)",
            Self::DateField => "Date (without time)",
            Self::DateTimeField => "Date (with time)",
            Self::TimeField => "Time",
            Self::DurationField => "Duration",
            Self::UuidField => "Universally unique identifier",
            Self::BinaryField => "Raw binary data",
            Self::JsonField => "A JSON object",
            Self::FileField { .. } => "File",
            Self::ImageField { .. } => "Image",
            Self::GenericIpAddressField => "IP address",
            Self::ForeignKey { .. } => "Foreign Key (type determined by related field)",
            Self::OneToOneField { .. } => "One-to-one relationship",
            Self::ManyToManyField { .. } => "Many-to-many relationship",
            Self::ArrayField { .. } => "Array",
            Self::HStoreField => "Map of strings to strings/nulls",
            Self::IntegerRangeField => "Range of integers",
            Self::BigIntegerRangeField => "Range of big integers",
            Self::DecimalRangeField => "Range of numbers",
            Self::DateRangeField => "Range of dates",
            Self::DateTimeRangeField => "Range of date times",
            Self::GeometryField { .. } => "The base Geometry field",
        }
    }
}
