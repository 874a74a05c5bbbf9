//! qom SDK - contract types for the object runtime
//!
//! This crate holds the pieces that device code needs to talk to the object
//! runtime without depending on the full `qom-engine`:
//! - the error taxonomy (`ObjectError`, `ObjectResult`)
//! - property values and declared property types
//! - the `Visitor` trait and its stock implementations
//! - enum and name parsing helpers
//!
//! # Example
//!
//! ```ignore
//! use qom_sdk::{PropertyValue, ValueInputVisitor, Visitor};
//!
//! let mut flag = false;
//! let mut v = ValueInputVisitor::new(PropertyValue::Bool(true));
//! v.visit_bool("opened", &mut flag)?;
//! assert!(flag);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod error;
pub mod util;
pub mod value;
pub mod visitor;

pub use error::{ObjectError, ObjectResult};
pub use util::{enum_parse, is_valid_path_component, parse_name};
pub use value::{EnumLookup, PropertyType, PropertyValue};
pub use visitor::{
    StringInputVisitor, StringOutputVisitor, ValueInputVisitor, ValueOutputVisitor, Visitor,
};
