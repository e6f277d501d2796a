//! Orchestrator phases: the pipeline stages, one module each.
//!
//! - **Preparation** (`prep`) - request validation, host tools, destination, disk space
//! - **Credential gate** (`credentials`) - signing keys in the user's keyring
//! - **Provisioning** (`provision`) - build root creation
//! - **Reconciliation** (`reconcile`) - kernel version inside the build root
//! - **Building** (`build`) - package A, then package B against A's artifacts
//! - **Collection** (`collect`) - built packages into the destination
//!
//! Release resolution and downloads live in `crate::upstream`.

pub mod build;
pub mod collect;
pub mod credentials;
pub mod prep;
pub mod provision;
pub mod reconcile;

pub use build::build_stages;
pub use collect::{collect, collect_context};
pub use credentials::ensure_keys;
pub use prep::{check_free_space, prepare, validate_request};
pub use provision::provision;
pub use reconcile::{reconcile, reconcile_context};
