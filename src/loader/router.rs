use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::loader::request::parse_locator;
use crate::loader::{AsyncLoader, Completion, LoadError, LoadRequest};

/// Dispatches each load to the loader registered for the locator's scheme.
///
/// Locator and routing failures are delivered from a runtime task, never
/// before `load()` returns.
#[derive(Default, Clone)]
pub struct SchemeRouter {
    routes: HashMap<String, Arc<dyn AsyncLoader>>,
}

impl SchemeRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, scheme: &str, loader: Arc<dyn AsyncLoader>) -> Self {
        self.routes.insert(scheme.to_ascii_lowercase(), loader);
        self
    }

    pub fn schemes(&self) -> Vec<&str> {
        let mut schemes: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        schemes.sort_unstable();
        schemes
    }
}

impl AsyncLoader for SchemeRouter {
    fn load(&self, request: LoadRequest, on_complete: Completion) {
        debug_assert_eq!(on_complete.request_id(), request.id, "completion must belong to the request");

        let url = match parse_locator(&request.locator) {
            Ok(url) => url,
            Err(e) => return on_complete.complete_detached(Err(e)),
        };

        match self.routes.get(url.scheme()) {
            Some(loader) => {
                debug!("Routing load {} to '{}' loader", request.id, url.scheme());
                loader.load(request, on_complete);
            }
            None => on_complete.complete_detached(Err(LoadError::InvalidLocator(format!(
                "no loader registered for scheme '{}'",
                url.scheme()
            )))),
        }
    }
}
