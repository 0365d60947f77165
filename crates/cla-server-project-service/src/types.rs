// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Catalog records. The catalog speaks PascalCase JSON with `ID` keys.

use cla_common_core::{is_foundation_root_name, CLA_SERVICE};
use serde::{Deserialize, Deserializer, Serialize};

/// `null` and missing both decode to the default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
	D: Deserializer<'de>,
	T: Default + Deserialize<'de>,
{
	Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Foundation {
	#[serde(rename = "ID", default)]
	pub id: String,
	#[serde(default)]
	pub name: String,
	#[serde(default)]
	pub slug: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Project {
	#[serde(rename = "ID")]
	pub id: String,
	pub name: String,
	#[serde(default)]
	pub parent: Option<String>,
	#[serde(default)]
	pub foundation: Option<Foundation>,
	#[serde(default, deserialize_with = "null_as_default")]
	pub enabled_services: Vec<String>,
	#[serde(default)]
	pub slug: Option<String>,
	#[serde(default)]
	pub status: Option<String>,
	#[serde(default)]
	pub project_type: Option<String>,
}

impl Project {
	/// The parent sfid, treating `""` as absent.
	pub fn parent_sfid(&self) -> Option<&str> {
		self.parent.as_deref().filter(|p| !p.is_empty())
	}

	/// Named after one of the foundation roots.
	pub fn is_root(&self) -> bool {
		is_foundation_root_name(&self.name)
	}

	pub fn foundation_is_root(&self) -> bool {
		self
			.foundation
			.as_ref()
			.is_some_and(|f| is_foundation_root_name(&f.name))
	}

	/// The parent that owns repositories linked under this project, or
	/// `None` when the project stands on its own: no parent, a root
	/// foundation, or a root itself.
	pub fn effective_parent(&self) -> Option<&str> {
		if self.is_root() || self.foundation_is_root() {
			return None;
		}
		self.parent_sfid()
	}

	/// [`Self::effective_parent`], falling back to the project's own sfid.
	pub fn effective_parent_sfid(&self) -> &str {
		self.effective_parent().unwrap_or(&self.id)
	}

	pub fn has_cla_service(&self) -> bool {
		self.enabled_services.iter().any(|s| s == CLA_SERVICE)
	}
}

/// One node of the catalog's project tree, as returned by the summary
/// endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProjectSummary {
	#[serde(rename = "ID")]
	pub id: String,
	pub name: String,
	#[serde(default)]
	pub slug: Option<String>,
	#[serde(default)]
	pub status: Option<String>,
	#[serde(default)]
	pub parent: Option<String>,
	#[serde(default)]
	pub project_type: Option<String>,
	#[serde(default, deserialize_with = "null_as_default")]
	pub enabled_services: Vec<String>,
	#[serde(default, deserialize_with = "null_as_default")]
	pub projects: Vec<ProjectSummary>,
}

/// `{"Data": [...], "Metadata": {...}}` envelope used by list endpoints.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase", bound(deserialize = "T: Deserialize<'de>"))]
pub(crate) struct ListEnvelope<T> {
	#[serde(default = "Vec::new", deserialize_with = "null_as_default")]
	pub data: Vec<T>,
}

/// Body of the project update call; only the services list is written.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct EnabledServicesUpdate<'a> {
	pub enabled_services: &'a [String],
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use serde_json::json;

	fn project(name: &str, parent: Option<&str>, foundation: Option<&str>) -> Project {
		Project {
			id: "P1".to_string(),
			name: name.to_string(),
			parent: parent.map(str::to_string),
			foundation: foundation.map(|n| Foundation {
				id: "F".to_string(),
				name: n.to_string(),
				slug: None,
			}),
			enabled_services: vec![],
			slug: None,
			status: None,
			project_type: None,
		}
	}

	#[test]
	fn decodes_catalog_json() {
		let raw = json!({
			"ID": "a0941000002wBz4AAE",
			"Name": "Kubernetes",
			"Parent": "a0941000002wBz9AAE",
			"Foundation": {"ID": "a0941000002wBz9AAE", "Name": "CNCF", "Slug": "cncf"},
			"EnabledServices": null,
			"Slug": "kubernetes",
			"Status": "Active"
		});
		let p: Project = serde_json::from_value(raw).unwrap();
		assert_eq!(p.id, "a0941000002wBz4AAE");
		assert!(p.enabled_services.is_empty());
		assert_eq!(p.foundation.as_ref().unwrap().name, "CNCF");
		assert_eq!(p.effective_parent_sfid(), "a0941000002wBz9AAE");
	}

	#[test]
	fn effective_parent_rules() {
		assert_eq!(project("Kube", None, None).effective_parent_sfid(), "P1");
		assert_eq!(project("Kube", Some(""), None).effective_parent_sfid(), "P1");
		assert_eq!(
			project("Kube", Some("LF"), Some("The Linux Foundation")).effective_parent_sfid(),
			"P1"
		);
		assert_eq!(project("Kube", Some("F9"), Some("CNCF")).effective_parent_sfid(), "F9");
		assert_eq!(
			project("LF Projects, LLC", Some("F9"), None).effective_parent_sfid(),
			"P1"
		);
	}

	#[test]
	fn cla_service_detection() {
		let mut p = project("Kube", None, None);
		assert!(!p.has_cla_service());
		p.enabled_services = vec!["Insights".into(), "CLA".into()];
		assert!(p.has_cla_service());
	}

	#[test]
	fn summary_tree_decodes() {
		let raw = json!({
			"Data": [{
				"ID": "F1", "Name": "CNCF",
				"Projects": [{"ID": "P1", "Name": "Kubernetes", "Projects": null}]
			}],
			"Metadata": {"Offset": 0, "PageSize": 100, "TotalSize": 1}
		});
		let env: ListEnvelope<ProjectSummary> = serde_json::from_value(raw).unwrap();
		assert_eq!(env.data[0].projects[0].id, "P1");
		assert!(env.data[0].projects[0].projects.is_empty());
	}

	proptest! {
		#[test]
		fn effective_parent_is_self_or_parent(
			name in "[A-Za-z ]{1,20}",
			parent in proptest::option::of("[A-Z0-9]{0,6}"),
			foundation in proptest::option::of(prop_oneof![
				Just("The Linux Foundation".to_string()),
				Just("LF Projects, LLC".to_string()),
				"[A-Z]{2,6}",
			]),
		) {
			let p = project(&name, parent.as_deref(), foundation.as_deref());
			let eff = p.effective_parent_sfid();
			prop_assert!(eff == p.id || Some(eff) == p.parent.as_deref());
			if p.foundation_is_root() || p.parent_sfid().is_none() {
				prop_assert_eq!(eff, p.id.as_str());
			}
		}
	}
}
