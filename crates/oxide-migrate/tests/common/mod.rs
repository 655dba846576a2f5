#![allow(dead_code)]

use oxide_core::schema::{model, ModelBuilder};
use oxide_core::{field, Schema, SchemaBuilder};

/// `users{id, username, email unique}`.
pub fn users() -> ModelBuilder {
    model("users")
        .field("id", field::id())
        .field("username", field::string(64))
        .field("email", field::email().unique())
}

/// `posts` referencing `users`.
pub fn posts() -> ModelBuilder {
    model("posts")
        .field("id", field::id())
        .field("title", field::string(255))
        .field("views", field::integer().default(0))
        .field("published", field::boolean().default(false))
        .field("created_at", field::datetime().default_now())
        .field("author", field::integer().references("users", "id").indexed())
}

/// Builds a schema from models, in declaration order.
pub fn schema(models: impl IntoIterator<Item = ModelBuilder>) -> Schema {
    models
        .into_iter()
        .fold(SchemaBuilder::new(), SchemaBuilder::model)
        .build()
        .unwrap_or_else(|e| panic!("test schema is invalid: {e}"))
}

/// The blog schema, declared child-first.
pub fn blog() -> Schema {
    schema([posts(), users()])
}
