//! Resolate E2E verification
//!
//! Drives a WordPress admin through Playwright to verify the Resolate
//! document-type workflow end to end:
//! - Probes the target WordPress instance
//! - Controls Playwright through a long-lived Node.js driver (JSON lines)
//! - Runs the eight-step dynamic fields scenario
//! - Checks the metabox screenshot, optionally against a baseline
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    E2E Test Runner (Rust)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner                                                 │
//! │    ├── TargetProbe::wait_until_reachable()                  │
//! │    ├── PlaywrightPage::launch() -> impl Page                │
//! │    ├── DynamicFieldsScenario::run(&mut dyn Page)            │
//! │    │     ├── authenticate                                   │
//! │    │     ├── upload_template      -> AttachmentId           │
//! │    │     ├── create_document_type (uses AttachmentId)       │
//! │    │     ├── create_document                                │
//! │    │     ├── verify_metabox                                 │
//! │    │     ├── fill_fields                                    │
//! │    │     ├── capture_screenshot   -> PNG                    │
//! │    │     └── save_and_verify                                │
//! │    ├── VisualTester::compare(png) (optional)                │
//! │    └── write_results() -> test-results.json                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod attachment;
pub mod cli;
pub mod config;
pub mod error;
pub mod page;
pub mod playwright;
pub mod runner;
pub mod scenario;
pub mod server;
pub mod steps;
pub mod visual;

pub use attachment::AttachmentId;
pub use config::E2eConfig;
pub use error::{E2eError, E2eResult};
pub use page::{Locator, Page};
pub use runner::{RunReport, TestRunner};
pub use scenario::{DynamicFieldsScenario, ScenarioReport};
pub use steps::{StepName, StepPolicy, StepResult};
