//! kubedeploy - render Kubernetes manifest templates and watch them roll out

pub mod attempt;
pub mod binding;
pub mod cluster;
pub mod error;
pub mod limits;
pub mod partials;
pub mod renderer;
pub mod resource;
pub mod template;
pub mod watcher;

pub use attempt::DeployAttempt;
pub use binding::Bindings;
pub use cluster::{ClusterQuery, Kubectl, MockCluster, QueryOutput};
pub use error::{DeployError, FixSuggestion, RenderErrorKind, TemplateRenderError};
pub use limits::WatchLimits;
pub use renderer::{RenderedDocument, RenderedTemplate, TemplateRenderer};
pub use resource::{from_document, ObservationState, ResourceStatusPoller};
pub use watcher::{ResourceOutcome, ResourceReport, ResourceWatcher, WatchSummary};
