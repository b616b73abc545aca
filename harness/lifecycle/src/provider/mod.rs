mod error;

pub use self::error::{IntoProviderError, ProviderError, ProviderResult, Resources};
use crate::idempotency::Idempotency;
use crate::outputs::Outputs;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// The binary used when a unit does not name one.
pub const DEFAULT_BINARY: &str = "terraform";

/// Where the state of a [`ProvisioningUnit`] is stored. The bucket is shared between runs, the
/// key is owned by exactly one unit.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Backend {
    pub bucket: String,
    pub key: String,
    pub region: String,
}

/// One infrastructure module instance, e.g. one EKS cluster or one Aurora cluster.
#[derive(Clone, Debug, Serialize)]
pub struct ProvisioningUnit {
    /// A short name used in logs and errors, e.g. `eks-cluster`.
    pub name: String,
    /// The directory holding the module to apply.
    pub module_dir: PathBuf,
    /// Variable files, relative to `module_dir` or absolute.
    pub var_files: Vec<PathBuf>,
    /// Inline variables. Strings are passed as-is, everything else as JSON.
    pub vars: BTreeMap<String, Value>,
    pub backend: Option<Backend>,
    /// The provisioning binary, `terraform` or `tofu`.
    pub binary: String,
    /// When set, passed to the binary as `TF_DATA_DIR`.
    pub data_dir: Option<PathBuf>,
    /// Extra environment for the binary, e.g. `AWS_PROFILE`.
    pub env: BTreeMap<String, String>,
    pub idempotency: Idempotency,
}

impl ProvisioningUnit {
    pub fn new<S, P>(name: S, module_dir: P) -> Self
    where
        S: Into<String>,
        P: Into<PathBuf>,
    {
        Self {
            name: name.into(),
            module_dir: module_dir.into(),
            var_files: Vec::new(),
            vars: BTreeMap::new(),
            backend: None,
            binary: DEFAULT_BINARY.to_string(),
            data_dir: None,
            env: BTreeMap::new(),
            idempotency: Idempotency::default(),
        }
    }

    pub fn var<S, V>(mut self, name: S, value: V) -> Self
    where
        S: Into<String>,
        V: Into<Value>,
    {
        self.vars.insert(name.into(), value.into());
        self
    }

    pub fn var_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.var_files.push(path.into());
        self
    }

    pub fn backend(mut self, backend: Backend) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn binary<S: Into<String>>(mut self, binary: S) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn data_dir<P: Into<PathBuf>>(mut self, data_dir: P) -> Self {
        self.data_dir = Some(data_dir.into());
        self
    }

    pub fn env<S1, S2>(mut self, name: S1, value: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        self.env.insert(name.into(), value.into());
        self
    }

    pub fn idempotency(mut self, idempotency: Idempotency) -> Self {
        self.idempotency = idempotency;
        self
    }
}

/// The resource counts reported at the end of an apply.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct ApplySummary {
    pub added: u32,
    pub changed: u32,
    pub destroyed: u32,
}

impl ApplySummary {
    /// `true` when the apply did not touch anything.
    pub fn is_noop(&self) -> bool {
        self.added == 0 && self.changed == 0 && self.destroyed == 0
    }
}

impl Display for ApplySummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} added, {} changed, {} destroyed",
            self.added, self.changed, self.destroyed
        )
    }
}

/// You implement [`Provision`] to apply and destroy infrastructure. In practice this is the
/// [`TerraformCli`]; tests inject mocks.
///
/// Every error must say whether infrastructure was left behind (see [`Resources`]) so that the
/// [`Coordinator`] knows whether a failed apply still needs a destroy.
#[async_trait::async_trait]
pub trait Provision: Send + Sync {
    /// Prepare the working directory and configure the backend. Must not create infrastructure.
    async fn init(&self, unit: &ProvisioningUnit) -> ProviderResult<()>;

    /// Apply the unit and report what changed.
    async fn apply(&self, unit: &ProvisioningUnit) -> ProviderResult<ApplySummary>;

    /// Read the outputs of the last apply.
    async fn outputs(&self, unit: &ProvisioningUnit) -> ProviderResult<Outputs>;

    /// Destroy everything the unit created.
    async fn destroy(&self, unit: &ProvisioningUnit) -> ProviderResult<()>;
}
