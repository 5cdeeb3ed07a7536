//! Precomputed (collection, action) -> allowed bearer secrets

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::types::{AccessToken, Action, Collection};

/// Read-only lookup built once from configuration. Each entry is the union of the
/// collection's `all` names and the action's names, resolved to token secrets.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationIndex {
    grants: HashMap<String, HashMap<Action, HashSet<String>>>,
}

impl AuthorizationIndex {
    pub fn build(collections: &[Collection], tokens: &[AccessToken]) -> Self {
        let registry: HashMap<&str, &str> = tokens
            .iter()
            .map(|t| (t.name.as_str(), t.token.as_str()))
            .collect();

        let mut grants = HashMap::with_capacity(collections.len());
        for collection in collections {
            let mut per_action = HashMap::with_capacity(Action::ALL.len());
            for action in Action::ALL {
                let names = collection
                    .auth
                    .all
                    .iter()
                    .chain(collection.auth.names_for(action));
                per_action.insert(action, resolve_secrets(&collection.name, names, &registry));
            }
            grants.insert(collection.name.clone(), per_action);
        }

        Self { grants }
    }

    /// Secrets allowed for the pair; empty for unknown collections
    pub fn allowed_tokens(&self, collection: &str, action: Action) -> Option<&HashSet<String>> {
        self.grants.get(collection).and_then(|g| g.get(&action))
    }

    /// Exact membership test. The empty string never matches.
    pub fn is_allowed(&self, collection: &str, action: Action, presented: &str) -> bool {
        if presented.is_empty() {
            return false;
        }
        self.allowed_tokens(collection, action)
            .map(|set| set.contains(presented))
            .unwrap_or(false)
    }
}

// Names missing from the registry are skipped so they can never match anything.
fn resolve_secrets<'a>(
    collection: &str,
    names: impl Iterator<Item = &'a String>,
    registry: &HashMap<&str, &str>,
) -> HashSet<String> {
    let mut secrets = HashSet::new();
    for name in names {
        match registry.get(name.as_str()) {
            Some(secret) if !secret.is_empty() => {
                secrets.insert((*secret).to_string());
            }
            _ => {
                warn!("Collection '{}' references unknown access token '{}'", collection, name);
            }
        }
    }
    secrets
}
