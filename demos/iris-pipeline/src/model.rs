//! The demo's classifier, held as a lifecycle resource.
//!
//! A nearest-centroid model over the classic iris dataset: small enough to
//! embed, realistic enough to show the pattern — a model loaded once per
//! worker at startup, shared read-only by handlers, released at teardown.

use std::sync::Arc;
use streambind_core::lifecycle::{AcquireFuture, ReleaseFuture, Resource, SharedResource};

/// Per-species feature centroids, in the order
/// `[sepal_length, sepal_width, petal_length, petal_width]`.
pub struct IrisModel {
    classes: Vec<(&'static str, [f64; 4])>,
}

impl IrisModel {
    /// Class means of the iris dataset.
    #[must_use]
    pub fn pretrained() -> Self {
        Self {
            classes: vec![
                ("setosa", [5.01, 3.43, 1.46, 0.25]),
                ("versicolor", [5.94, 2.77, 4.26, 1.33]),
                ("virginica", [6.59, 2.97, 5.55, 2.03]),
            ],
        }
    }

    /// Name of the species whose centroid is nearest to `features`.
    #[must_use]
    pub fn classify(&self, features: [f64; 4]) -> &'static str {
        let mut best = ("setosa", f64::INFINITY);
        for (name, centroid) in &self.classes {
            let distance: f64 = centroid
                .iter()
                .zip(&features)
                .map(|(c, f)| (c - f).powi(2))
                .sum();
            if distance < best.1 {
                best = (name, distance);
            }
        }
        best.0
    }
}

/// Lifecycle resource that loads the model during worker setup.
///
/// In a real pipeline this is where weights come off disk or an object
/// store; here the model is embedded and loading is instant.
pub struct ModelLoader;

impl Resource for ModelLoader {
    fn name(&self) -> &str {
        "model"
    }

    fn acquire(&self) -> AcquireFuture<'_> {
        Box::pin(async move {
            let model = IrisModel::pretrained();
            tracing::info!(classes = model.classes.len(), "iris model loaded");
            Ok(Arc::new(model) as SharedResource)
        })
    }

    fn release(&self, _instance: SharedResource) -> ReleaseFuture<'_> {
        Box::pin(async move {
            tracing::info!("iris model released");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_each_centroid_as_its_own_species() {
        let model = IrisModel::pretrained();
        assert_eq!(model.classify([5.01, 3.43, 1.46, 0.25]), "setosa");
        assert_eq!(model.classify([5.94, 2.77, 4.26, 1.33]), "versicolor");
        assert_eq!(model.classify([6.59, 2.97, 5.55, 2.03]), "virginica");
    }

    #[test]
    fn classifies_a_typical_setosa_sample() {
        let model = IrisModel::pretrained();
        assert_eq!(model.classify([5.1, 3.5, 1.4, 0.2]), "setosa");
    }
}
