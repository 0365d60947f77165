// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client for the foundation's project catalog.
//!
//! Reads are memoized per client in a bounded [`ProjectCache`]; call
//! [`ProjectServiceClient::scoped`] to get a client with its own cache for
//! one request, and drop or [`ProjectServiceClient::clear_cache`] it at
//! teardown.

pub mod cache;
pub mod catalog;
pub mod client;
pub mod error;
pub mod token;
pub mod types;

pub use cache::{ProjectCache, DEFAULT_CACHE_CAPACITY};
pub use catalog::ProjectCatalog;
pub use client::ProjectServiceClient;
pub use error::ProjectServiceError;
pub use token::{ClientCredentialsTokenProvider, StaticTokenProvider, TokenProvider};
pub use types::{Foundation, Project, ProjectSummary};
