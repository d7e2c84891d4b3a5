//! Iris classification pipeline.
//!
//! The tutorial scenario end to end: JSON feature vectors arrive on
//! `input_data`, the handler classifies them with a model held as a
//! lifecycle resource, and predictions go out on `predictions`.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p iris-pipeline -- --broker local --workers 2
//! ```
//!
//! Then feed it a sample:
//!
//! ```bash
//! echo '{"sepal_length": 5.1, "sepal_width": 3.5,
//!        "petal_length": 1.4, "petal_width": 0.2}' \
//!   | kcat -b localhost:9092 -t input_data -P
//! kcat -b localhost:9092 -t predictions -C
//! ```
//!
//! `RUST_LOG` controls verbosity (default `info`). Ctrl-c drains the
//! workers and releases the model before exiting.

mod model;

use crate::model::{IrisModel, ModelLoader};
use std::process::ExitCode;
use std::sync::Arc;
use streambind_core::app::Application;
use streambind_core::bindings::OffsetReset;
use streambind_core::broker::BrokerConfig;
use streambind_core::handler::{Handler, HandlerError, OutboundMessage, handler_fn};
use streambind_core::lifecycle::LifecycleContext;
use streambind_core::schema::{Constraint, FieldType, MessageSchema, TypedMessage};
use streambind_core::transport::TransportFactory;
use streambind_kafka::KafkaTransportFactory;
use streambind_runtime::launch::{LaunchOptions, launch};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

fn features_schema() -> MessageSchema {
    MessageSchema::new("IrisFeatures")
        .field("sepal_length", FieldType::Float, Constraint::NonNegative)
        .field("sepal_width", FieldType::Float, Constraint::NonNegative)
        .field("petal_length", FieldType::Float, Constraint::NonNegative)
        .field("petal_width", FieldType::Float, Constraint::NonNegative)
}

fn prediction_schema() -> MessageSchema {
    MessageSchema::new("IrisPrediction").field(
        "species",
        FieldType::Text,
        Constraint::OneOf(vec![
            "setosa".to_string(),
            "versicolor".to_string(),
            "virginica".to_string(),
        ]),
    )
}

fn classify_handler() -> Arc<dyn Handler> {
    Arc::new(handler_fn(
        |message: TypedMessage, ctx: Arc<LifecycleContext>| async move {
            let model = ctx.get::<IrisModel>("model").map_err(HandlerError::new)?;
            let features = [
                message.f64("sepal_length").unwrap_or_default(),
                message.f64("sepal_width").unwrap_or_default(),
                message.f64("petal_length").unwrap_or_default(),
                message.f64("petal_width").unwrap_or_default(),
            ];
            let species = model.classify(features);
            tracing::info!(species, "classified sample");

            let prediction = TypedMessage::builder("IrisPrediction")
                .set("species", species)
                .build();
            Ok(vec![OutboundMessage::new("predictions", prediction)])
        },
    ))
}

fn build_app() -> Result<Application, streambind_core::error::ConfigurationError> {
    Application::builder("iris-pipeline")
        .broker(
            BrokerConfig::new("local", "localhost", 9092)
                .description("local development broker"),
        )
        .broker(
            BrokerConfig::new("docker", "kafka", 9092)
                .description("broker inside the compose network"),
        )
        .resource(Arc::new(ModelLoader))
        .consumer(
            "input_data",
            features_schema(),
            OffsetReset::Earliest,
            classify_handler(),
        )
        .producer("predictions", prediction_schema())
        .build()
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let options = match LaunchOptions::from_args(std::env::args().skip(1)) {
        Ok(options) => options,
        Err(e) => {
            tracing::error!(error = %e, "invalid launch arguments");
            return ExitCode::FAILURE;
        }
    };

    let app = match build_app() {
        Ok(app) => Arc::new(app),
        Err(e) => {
            tracing::error!(error = %e, "invalid application declaration");
            return ExitCode::FAILURE;
        }
    };

    let factory = Arc::new(KafkaTransportFactory::new()) as Arc<dyn TransportFactory>;
    match launch(app, factory, options).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "pipeline failed");
            ExitCode::FAILURE
        }
    }
}
