//! Dispatch decision for an inbound request path

use crate::routes::{Route, RouteTable};

/// What to do with a request
#[derive(Debug, PartialEq)]
pub enum Dispatch<'a> {
    /// Serve the listing page
    Index,
    /// Proxy the mapped upstream file
    Proxy(&'a Route),
    /// Nothing configured for this path
    NotFound,
}

/// Resolve a request path. Matching is exact; callers pass the path
/// component only, so query strings never take part.
pub fn resolve<'a>(routes: &'a RouteTable, path: &str) -> Dispatch<'a> {
    if path.is_empty() || path == "/" {
        return Dispatch::Index;
    }

    match routes.get(path) {
        Some(route) => Dispatch::Proxy(route),
        None => Dispatch::NotFound,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RouteTable {
        RouteTable::new(vec![Route {
            path: "/a.sh".to_string(),
            url: "https://example.test/a.sh".to_string(),
            description: None,
        }])
    }

    #[test]
    fn test_root_is_index() {
        let routes = table();
        assert_eq!(resolve(&routes, "/"), Dispatch::Index);
        assert_eq!(resolve(&routes, ""), Dispatch::Index);
    }

    #[test]
    fn test_configured_path_proxies() {
        let routes = table();
        match resolve(&routes, "/a.sh") {
            Dispatch::Proxy(route) => assert_eq!(route.url, "https://example.test/a.sh"),
            other => panic!("expected proxy, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_path_not_found() {
        let routes = table();
        assert_eq!(resolve(&routes, "/missing"), Dispatch::NotFound);
        assert_eq!(resolve(&routes, "//"), Dispatch::NotFound);
        assert_eq!(resolve(&routes, "/a.sh/extra"), Dispatch::NotFound);
    }

    #[test]
    fn test_empty_table_still_serves_index() {
        let routes = RouteTable::default();
        assert_eq!(resolve(&routes, "/"), Dispatch::Index);
        assert_eq!(resolve(&routes, "/a.sh"), Dispatch::NotFound);
    }
}
