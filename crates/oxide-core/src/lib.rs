//! # oxide-core
//!
//! Declarative table schemas shared by the query compiler and the
//! migration engine.
//!
//! A schema is built in two phases: every model is registered on a
//! [`SchemaBuilder`], then [`SchemaBuilder::build`] validates the models,
//! resolves forward and reverse relations and returns an immutable
//! [`Schema`].
//!
//! ```ignore
//! use oxide_core::{field, schema::model, SchemaBuilder};
//!
//! let schema = SchemaBuilder::new()
//!     .model(
//!         model("users")
//!             .field("id", field::id())
//!             .field("username", field::string(64).length(3, 64))
//!             .field("email", field::email().unique()),
//!     )
//!     .model(
//!         model("posts")
//!             .field("id", field::id())
//!             .field("title", field::string(255))
//!             .field("author", field::integer().references("users", "id")),
//!     )
//!     .build()?;
//!
//! // `posts.author` is a forward relation, `users.posts` its reverse.
//! assert!(schema.model("users").unwrap().relation("posts").is_some());
//! ```
//!
//! The crate also defines the contract a database driver fulfils
//! ([`driver::Executor`]) and the values exchanged across it.

pub mod driver;
pub mod error;
pub mod field;
pub mod schema;
pub mod value;

pub use driver::{ColumnSnapshot, ExecResult, Executor, LiveSchema, Row, Session};
pub use error::{
    DriverError, FieldError, ForeignKeyError, RelationGraphError, SchemaError, ValidationError,
};
pub use field::{DefaultValue, FieldDefinition, FieldKind, Reference, Transform, Validator};
pub use schema::{
    ModelBuilder, ModelSchema, Multiplicity, RelationKind, RelationPath, RelationRef, Schema,
    SchemaBuilder,
};
pub use value::{Engine, SqlValue};
