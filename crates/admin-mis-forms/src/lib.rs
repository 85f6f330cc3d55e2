//! # admin-mis-forms
//!
//! Binding and cleaning of submitted data against model metadata.
//!
//! ## Modules
//!
//! - [`data`] - [`FormData`], the flattened request body
//! - [`fields`] - Per-field cleaning: coercion, required checks, validators
//! - [`model_form`] - [`ModelForm`], validation and saving of one record
//! - [`formset`] - [`InlineFormSet`], child rows edited alongside a parent

pub mod data;
pub mod fields;
pub mod formset;
pub mod model_form;

pub use data::FormData;
pub use fields::clean_field;
pub use formset::{all_valid, FormSetChange, FormSetSpec, InlineFormSet};
pub use model_form::{ExtraField, ModelForm, NON_FIELD_ERRORS};
