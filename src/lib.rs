//! Compatkit – ordered collections and a dynamically typed value tree with
//! structural encoding between typed values and that tree.
//!
//! The crate is built from three layers:
//! * [`ordered_set::OrderedSet`] keeps unique elements in insertion order with
//!   constant time membership tests, backed by a parallel hash index.
//! * [`ordered_dictionary::OrderedDictionary`] composes an ordered key set with a
//!   parallel value array, so iteration, sorting and shuffling always keep each
//!   key next to its value.
//! * [`mixed::MixedTypeField`] is a tagged value (string, bool, int, double, null,
//!   dictionary, array) used as a neutral interchange tree. Any `Serialize` type
//!   can be encoded into it with [`to_mixed`] and decoded back with [`from_mixed`].
//!
//! ## Modules
//! * [`ordered_set`] – Insertion ordered unique collection, set algebra, reordering.
//! * [`ordered_dictionary`] – Insertion ordered map; serializes as a flat
//!   `[k0, v0, k1, v1, ..]` stream.
//! * [`mixed`] – The tagged value, the [`mixed::ToMixedField`] conversion
//!   trait and JSON interop.
//! * [`coding`] – Coding paths and the nesting depth guard.
//! * [`encoder`] / [`decoder`] – The structural encoder and decoder with keyed,
//!   unkeyed and single-value containers.
//! * [`settings`] – Layered configuration (defaults, file, environment).
//! * [`telemetry`] – Tracing subscriber setup.
//!
//! ## Errors
//! Decoding reports a [`CompatError`] that names the category (type mismatch,
//! missing key, missing value, data corruption) and the coding path of the
//! failing node, e.g. `owner.pets[1].name`. Values that have no tree
//! representation are not errors on the encoding side; they are dropped with a
//! `warn!` event.
//!
//! ## Quick Start
//! ```
//! use serde::{Deserialize, Serialize};
//! use compatkit::{from_mixed, to_mixed, MixedTypeField};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Pet {
//!     name: String,
//!     age: u8,
//!     nickname: Option<String>,
//! }
//!
//! let pet = Pet { name: "Rex".into(), age: 3, nickname: None };
//! let tree = to_mixed(&pet).unwrap();
//! assert_eq!(tree.get("age"), Some(&MixedTypeField::Int(3)));
//! let back: Pet = from_mixed(&tree).unwrap();
//! assert_eq!(back, pet);
//! ```

pub mod coding;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod mixed;
pub mod ordered_dictionary;
pub mod ordered_set;
pub mod settings;
pub mod telemetry;

pub use decoder::{from_mixed, from_mixed_with};
pub use encoder::{to_mixed, to_mixed_with};
pub use error::{CompatError, Result};
pub use mixed::{MixedTypeField, ToMixedField};
pub use ordered_dictionary::OrderedDictionary;
pub use ordered_set::OrderedSet;
