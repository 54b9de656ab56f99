//! Alias checks against cluster parameters
//!
//! An alias instantiates a component under another name. Only components
//! whose parameters declare `multi_instance: true` may be aliased; every
//! component is implicitly aliased to itself.
//!
//! Cluster parameters are looked up by [`parameter_key`], so component
//! `nfs-provisioner` is configured under `parameters.nfs_provisioner`.

use crate::component::parameter_key;
use crate::core::CommodoreError;
use anyhow::Result;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

fn component_parameters<'a>(cluster_parameters: &'a Value, component: &str) -> Option<&'a Value> {
    cluster_parameters.get(parameter_key(component))
}

/// Checks that every alias targets a component supporting multiple instances.
///
/// `aliases` maps alias to component name. Fails with
/// [`CommodoreError::ConfigurationError`] for the first offending alias in
/// alias-name order. Components without parameters count as not supporting
/// instantiation.
pub fn verify_component_aliases(aliases: &BTreeMap<String, String>, cluster_parameters: &Value) -> Result<()> {
    for (alias, component) in aliases {
        if alias == component {
            continue;
        }

        let multi_instance = component_parameters(cluster_parameters, component)
            .and_then(|params| params.get("multi_instance"))
            .and_then(Value::as_bool)
            .unwrap_or(false);

        if !multi_instance {
            return Err(CommodoreError::ConfigurationError {
                component: component.clone(),
                alias: alias.clone(),
            }
            .into());
        }
    }
    Ok(())
}

/// Deprecation notices for the components referenced by `aliases`.
///
/// A component is deprecated when `parameters.<key>._metadata.deprecated` is
/// true. The notice names the replacement (`replaced_by`) and appends the
/// free-form `deprecation_notice` when present. One notice per component,
/// ordered by component name.
#[must_use]
pub fn component_deprecation_notices(aliases: &BTreeMap<String, String>, cluster_parameters: &Value) -> Vec<String> {
    let components: BTreeSet<&str> = aliases.values().map(String::as_str).collect();

    components
        .into_iter()
        .filter_map(|component| {
            let metadata = component_parameters(cluster_parameters, component)?.get("_metadata")?;
            if !metadata.get("deprecated").and_then(Value::as_bool).unwrap_or(false) {
                return None;
            }

            let mut notice = format!("Component {component} is deprecated.");
            if let Some(replacement) = metadata.get("replaced_by").and_then(Value::as_str) {
                notice.push_str(&format!(" Use component {replacement} instead."));
            }
            if let Some(extra) = metadata.get("deprecation_notice").and_then(Value::as_str) {
                notice.push(' ');
                notice.push_str(extra);
            }
            Some(notice)
        })
        .collect()
}
