//! # mist - multi-valued string-template engine
//!
//! A template engine in which every placeholder evaluates to a *sequence* of
//! values rather than a single string. Templates can reference each other by
//! name to build larger documents from smaller pieces, and conditionals pick
//! a branch per-output rather than once for the whole template.
//!
//! ## Quick Start
//!
//! ```
//! use mist::driver;
//!
//! let mut group = driver::build_single("greeting", "Hello, <$NAME$>!", "<$", "$>").unwrap();
//! driver::set_attribute(&mut group, "NAME", "world");
//! let values = driver::evaluate(&mut group);
//! assert_eq!(values, vec!["Hello, world!"]);
//! ```
//!
//! ## Modules
//!
//! - [`error`]: the crate-wide error type
//! - [`template`]: lexer, parser, template group and evaluator
//! - [`dict`]: order-preserving parameter multimap
//! - [`driver`]: the stable facade over [`template::Group`]
//! - [`config`]: values-file loader
//! - [`discovery`]: template-group directory loader

pub mod config;
pub mod dict;
pub mod discovery;
pub mod driver;
pub mod error;
pub mod template;

pub use crate::dict::ParamDict;
pub use crate::error::{MistError, MistResult};
pub use crate::template::Group;
