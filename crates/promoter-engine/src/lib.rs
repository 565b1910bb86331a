//! Redacted comparison, copy and split of key-value secrets.
//!
//! Every operation works on two [`Endpoint`]s, each a location paired with
//! the store adapter that serves it. The two sides may live in different
//! environments, different backend instances or different backend kinds.
//!
//! - [`diff::compare`] classifies keys as added, removed or modified.
//! - [`copy::copy`] merges selected source keys into the target in one write.
//! - [`split::split`] moves sensitive keys into a new document, then removes
//!   them from the source.
//!
//! All three take a [`RedactionPolicy`]. Equality is always decided on raw
//! values; the policy only shapes what results and logs show.
//!
//! The engine never prints or prompts, and reads the process environment
//! only for `PROMOTER_` configuration overrides. Callers build stores
//! (see `promoter_secrets::StoreProvider`), format results and append
//! [`OperationRecord`]s to an [`OperationLog`].

pub mod config;
pub mod copy;
pub mod diff;
pub mod endpoint;
pub mod error;
pub mod oplog;
pub mod redaction;
pub mod split;
pub mod textdiff;

pub use config::{ConfigError, PromoterConfig};
pub use copy::{copy, plan_copy, CopyOptions, CopyOutcome, CopyPlan};
pub use diff::{compare, diff_documents, ComparisonResult, DiffCounts, DiffEntry, DiffStatus};
pub use endpoint::Endpoint;
pub use error::{EngineError, ErrorKind, StoreOperation};
pub use oplog::{LogError, OperationKind, OperationLog, OperationRecord};
pub use redaction::{RedactionPolicy, RenderedValue, DEFAULT_SENSITIVE_KEYS, PLACEHOLDER};
pub use split::{plan_split, split, SplitOutcome, SplitPlan};
