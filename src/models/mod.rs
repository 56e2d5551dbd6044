//! Object model shared by every analysis
//!
//! Structure:
//! - `object.rs` - `ClusterObject`, `OwnerReference`, `ObjectKey`
//! - `document.rs` - path accessors for schema-free `spec`/`status` documents
//! - `delivery_kind.rs` - continuous-delivery kinds the chain resolver understands

pub mod delivery_kind;
pub mod document;
pub mod object;

pub use delivery_kind::{DeliveryKind, DeliveryRole};
pub use document::{
    find_condition, get_nested, get_nested_bool, get_nested_i64, get_nested_map,
    get_nested_slice, get_nested_string,
};
pub use object::{ClusterObject, ObjectKey, OwnerReference};
