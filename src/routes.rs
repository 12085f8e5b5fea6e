//! Immutable route table
//!
//! Built once from configuration at startup and shared read-only across
//! all connections.

use crate::config::RouteConfig;
use std::collections::HashMap;

/// An upstream file served under a fixed path
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub path: String,
    pub url: String,
    pub description: Option<String>,
}

impl From<&RouteConfig> for Route {
    fn from(config: &RouteConfig) -> Self {
        Self {
            path: config.path.clone(),
            url: config.url.clone(),
            description: config.description.clone(),
        }
    }
}

/// Path → upstream mapping that preserves configuration order
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
    index: HashMap<String, usize>,
}

impl RouteTable {
    /// Build the table. On duplicate paths the first entry wins; config
    /// validation rejects duplicates before we get here.
    pub fn new(routes: impl IntoIterator<Item = Route>) -> Self {
        let mut table = Self::default();
        for route in routes {
            if table.index.contains_key(&route.path) {
                continue;
            }
            table.index.insert(route.path.clone(), table.routes.len());
            table.routes.push(route);
        }
        table
    }

    pub fn from_config(routes: &[RouteConfig]) -> Self {
        Self::new(routes.iter().map(Route::from))
    }

    /// Exact-match lookup
    pub fn get(&self, path: &str) -> Option<&Route> {
        self.index.get(path).map(|&i| &self.routes[i])
    }

    /// Routes in configuration order
    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|r| r.path.as_str())
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
