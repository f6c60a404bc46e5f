//! Ordered fallback over interchangeable attempts.

use std::future::Future;

/// Preferred model first, then the fallbacks, without blanks or repeats.
pub fn model_chain(preferred: &str, fallbacks: &[&str]) -> Vec<String> {
    let mut chain: Vec<String> = Vec::with_capacity(fallbacks.len() + 1);
    for model in std::iter::once(preferred).chain(fallbacks.iter().copied()) {
        let model = model.trim();
        if !model.is_empty() && !chain.iter().any(|m| m == model) {
            chain.push(model.to_string());
        }
    }
    chain
}

/// Runs `attempt` over `items` in order and returns the first success.
/// Failures are logged and never retried.
pub async fn first_success<I, T, F, Fut>(label: &str, items: I, mut attempt: F) -> Option<T>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    for (index, item) in items.into_iter().enumerate() {
        match attempt(item).await {
            Ok(value) => return Some(value),
            Err(e) => {
                tracing::warn!(chain = label, attempt = index, error = %e, "fallback attempt failed");
            }
        }
    }
    None
}
