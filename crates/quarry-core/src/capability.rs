//! Endpoint capability probing.

use crate::serving::ServingClient;

/// Task type prefixes of endpoints that accept conversational requests.
pub const SUPPORTED_TASK_PREFIXES: [&str; 3] = ["agent/", "llm/v1/chat", "llm/v1/completions"];

pub fn is_supported_task(task_type: &str) -> bool {
    SUPPORTED_TASK_PREFIXES
        .iter()
        .any(|prefix| task_type.starts_with(prefix))
}

/// Checks whether an endpoint declares a conversational task type.
///
/// A failed lookup counts as supported: the query itself will then fail with
/// a more useful error than the metadata call would.
pub async fn is_endpoint_supported<C: ServingClient + ?Sized>(client: &C, endpoint: &str) -> bool {
    match client.endpoint_task(endpoint).await {
        Ok(task_type) => {
            let supported = is_supported_task(&task_type);
            log::info!(
                "Endpoint {} has task type: {}, supported: {}",
                endpoint,
                task_type,
                supported
            );
            supported
        }
        Err(e) => {
            log::warn!("Could not determine task type for endpoint {}: {}", endpoint, e);
            true
        }
    }
}
