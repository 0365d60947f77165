// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Bounded project memoization keyed by sfid.
//!
//! When full, the oldest inserted entry is evicted. Two concurrent writers for
//! the same sfid may race; the last one wins.

use std::collections::{HashMap, VecDeque};

use tokio::sync::RwLock;

use crate::types::Project;

pub const DEFAULT_CACHE_CAPACITY: usize = 256;

#[derive(Default)]
struct Entries {
	projects: HashMap<String, Project>,
	/// Insertion order, oldest first.
	order: VecDeque<String>,
}

pub struct ProjectCache {
	entries: RwLock<Entries>,
	capacity: usize,
}

impl ProjectCache {
	pub fn new(capacity: usize) -> Self {
		Self {
			entries: RwLock::new(Entries::default()),
			capacity: capacity.max(1),
		}
	}

	pub async fn get(&self, sfid: &str) -> Option<Project> {
		self.entries.read().await.projects.get(sfid).cloned()
	}

	pub async fn insert(&self, sfid: &str, project: Project) {
		let mut entries = self.entries.write().await;
		if entries.projects.insert(sfid.to_string(), project).is_some() {
			return;
		}
		entries.order.push_back(sfid.to_string());
		while entries.order.len() > self.capacity {
			if let Some(oldest) = entries.order.pop_front() {
				entries.projects.remove(&oldest);
			}
		}
	}

	pub async fn invalidate(&self, sfid: &str) {
		let mut entries = self.entries.write().await;
		if entries.projects.remove(sfid).is_some() {
			entries.order.retain(|k| k != sfid);
		}
	}

	pub async fn clear(&self) {
		let mut entries = self.entries.write().await;
		entries.projects.clear();
		entries.order.clear();
	}

	pub async fn len(&self) -> usize {
		self.entries.read().await.projects.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.len().await == 0
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}
}

impl Default for ProjectCache {
	fn default() -> Self {
		Self::new(DEFAULT_CACHE_CAPACITY)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn project(id: &str) -> Project {
		Project {
			id: id.to_string(),
			name: format!("Project {id}"),
			parent: None,
			foundation: None,
			enabled_services: vec![],
			slug: None,
			status: None,
			project_type: None,
		}
	}

	#[tokio::test]
	async fn evicts_oldest_when_full() {
		let cache = ProjectCache::new(2);
		cache.insert("a", project("a")).await;
		cache.insert("b", project("b")).await;
		cache.insert("c", project("c")).await;

		assert_eq!(cache.len().await, 2);
		assert!(cache.get("a").await.is_none());
		assert!(cache.get("b").await.is_some());
		assert!(cache.get("c").await.is_some());
	}

	#[tokio::test]
	async fn overwrite_keeps_position_and_size() {
		let cache = ProjectCache::new(2);
		cache.insert("a", project("a")).await;
		let mut renamed = project("a");
		renamed.name = "Renamed".into();
		cache.insert("a", renamed).await;

		assert_eq!(cache.len().await, 1);
		assert_eq!(cache.get("a").await.unwrap().name, "Renamed");
	}

	#[tokio::test]
	async fn invalidate_and_clear() {
		let cache = ProjectCache::new(4);
		cache.insert("a", project("a")).await;
		cache.insert("b", project("b")).await;

		cache.invalidate("a").await;
		assert!(cache.get("a").await.is_none());
		assert_eq!(cache.len().await, 1);

		cache.clear().await;
		assert!(cache.is_empty().await);
	}

	#[test]
	fn zero_capacity_holds_one() {
		assert_eq!(ProjectCache::new(0).capacity(), 1);
	}

	proptest! {
		#[test]
		fn never_exceeds_capacity(cap in 1usize..8, keys in proptest::collection::vec("[a-e]", 0..40)) {
			let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
			rt.block_on(async {
				let cache = ProjectCache::new(cap);
				for k in &keys {
					cache.insert(k, project(k)).await;
					assert!(cache.len().await <= cap);
				}
				if let Some(last) = keys.last() {
					assert!(cache.get(last).await.is_some());
				}
			});
		}
	}
}
