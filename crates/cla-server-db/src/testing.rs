// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory SQLite helpers for tests in this and downstream crates.

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::schema::{ensure_schema, TableNames};

pub const TEST_STAGE: &str = "test";

/// A private in-memory database. One connection, since every SQLite
/// `:memory:` connection is its own database.
pub async fn create_test_pool() -> SqlitePool {
	SqlitePoolOptions::new()
		.max_connections(1)
		.idle_timeout(None)
		.max_lifetime(None)
		.connect("sqlite::memory:")
		.await
		.unwrap()
}

/// In-memory pool with the `test` stage schema in place.
pub async fn create_cla_test_pool() -> (SqlitePool, TableNames) {
	let pool = create_test_pool().await;
	let tables = TableNames::for_stage(TEST_STAGE);
	ensure_schema(&pool, &tables).await.unwrap();
	(pool, tables)
}
