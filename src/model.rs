//! Model identification and per-model policy.
//!
//! The model is resolved once at startup from the firmware DMI strings
//! and never changes. Everything model-specific the dispatcher needs is
//! collected into one `ModelPolicy` descriptor looked up from a fixed
//! table — the translation logic itself stays model-agnostic.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::events::{ModeFlag, Profile};

const DMI_ROOT: &str = "/sys/class/dmi/id";
const VENDOR_SYSFS_ROOT: &str = "/sys/devices/platform/qc71_laptop";

/// Known laptop models, from the DMI product string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Model {
    ProX,
    Executive,
    Titan,
    Hero,
    Unknown,
}

impl Model {
    fn from_product(product: &str) -> Self {
        let p = product.to_ascii_uppercase();
        if p.contains("PROX") {
            Self::ProX
        } else if p.contains("EXECUTIVE") {
            Self::Executive
        } else if p.contains("TITAN") {
            Self::Titan
        } else if p.contains("HERO") {
            Self::Hero
        } else {
            Self::Unknown
        }
    }
}

/// Resolved firmware identity: vendor string plus the specific model.
#[derive(Debug, Clone)]
pub struct ModelIdentity {
    pub vendor: String,
    pub model: Model,
}

impl ModelIdentity {
    /// Read the identity from the standard DMI location.
    pub fn resolve() -> Self {
        Self::resolve_from(Path::new(DMI_ROOT))
    }

    /// Read DMI strings under `root`.
    ///
    /// Some early Titan firmwares ship an empty product_name and put
    /// the model string in board_name instead, so that field is the
    /// fallback.
    pub fn resolve_from(root: &Path) -> Self {
        let vendor = read_dmi(root, "sys_vendor");
        let mut product = read_dmi(root, "product_name");
        if product.is_empty() {
            product = read_dmi(root, "board_name");
        }

        let model = Model::from_product(&product);
        info!(%vendor, %product, ?model, "firmware identity resolved");
        Self { vendor, model }
    }

    /// Whether this looks like supported vendor hardware at all.
    pub fn supported(&self) -> bool {
        self.vendor.to_ascii_uppercase().contains("SLIMBOOK")
    }
}

fn read_dmi(root: &Path, name: &str) -> String {
    match fs::read_to_string(root.join(name)) {
        Ok(s) => s.trim().to_string(),
        Err(_) => String::new(),
    }
}

/// Everything model-specific the dispatcher consults.
#[derive(Debug, Clone, Copy)]
pub struct ModelPolicy {
    /// Performance key cycles a 3-way profile on this family.
    pub three_way_profile: bool,
    /// The 3-way mode is only visible as two boolean sysfs flags, so
    /// the periodic poller runs.
    pub tri_state_flags: bool,
    /// Profile changes may be written back to the sysfs flags.
    pub profile_writes: bool,
    /// The family has a super-key-lock flag.
    pub super_key_lock: bool,
}

const POLICY_BINARY_SILENT: ModelPolicy = ModelPolicy {
    three_way_profile: false,
    tri_state_flags: false,
    profile_writes: false,
    super_key_lock: true,
};

const POLICY_TRI_STATE: ModelPolicy = ModelPolicy {
    three_way_profile: true,
    tri_state_flags: true,
    profile_writes: true,
    super_key_lock: true,
};

const POLICY_NONE: ModelPolicy = ModelPolicy {
    three_way_profile: false,
    tri_state_flags: false,
    profile_writes: false,
    super_key_lock: false,
};

/// Fixed policy table, keyed by model.
pub fn policy_for(model: Model) -> ModelPolicy {
    match model {
        Model::ProX | Model::Executive => POLICY_BINARY_SILENT,
        Model::Titan | Model::Hero => POLICY_TRI_STATE,
        Model::Unknown => POLICY_NONE,
    }
}

/// Derive the 3-way mode from the two boolean flags.
///
/// Equal flags mean neither extreme is active (balanced); otherwise
/// whichever flag is set wins.
pub fn derive_mode(silent: u32, turbo: u32) -> ModeFlag {
    if silent == turbo {
        ModeFlag::Normal
    } else if silent != 0 {
        ModeFlag::Silent
    } else {
        ModeFlag::Turbo
    }
}

impl ModeFlag {
    /// Profile equivalent of a derived mode.
    pub fn profile(self) -> Profile {
        match self {
            Self::Silent => Profile::EnergySaver,
            Self::Normal => Profile::Balanced,
            Self::Turbo => Profile::Performance,
        }
    }
}

/// The vendor kernel module's sysfs surface: a directory of small flag
/// files. The root is injectable so tests can run against a temp tree.
#[derive(Debug, Clone)]
pub struct VendorSysfs {
    root: PathBuf,
}

pub const FLAG_SILENT_MODE: &str = "silent_mode";
pub const FLAG_TURBO_MODE: &str = "turbo_mode";
pub const FLAG_SUPER_KEY_LOCK: &str = "super_key_lock";

impl VendorSysfs {
    pub fn system() -> Self {
        Self {
            root: PathBuf::from(VENDOR_SYSFS_ROOT),
        }
    }

    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Whether the kernel module is loaded (its platform directory
    /// exists).
    pub fn present(&self) -> bool {
        self.root.is_dir()
    }

    /// Read one boolean flag file.
    pub fn read_flag(&self, name: &str) -> Result<u32> {
        let path = self.root.join(name);
        let text = fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        text.trim()
            .parse()
            .with_context(|| format!("parsing {}", path.display()))
    }

    /// Write one boolean flag file.
    pub fn write_flag(&self, name: &str, value: u32) -> Result<()> {
        let path = self.root.join(name);
        fs::write(&path, value.to_string())
            .with_context(|| format!("writing {}", path.display()))
    }

    /// Current 3-way profile, derived from the two boolean flags.
    pub fn current_profile(&self) -> Result<Profile> {
        let silent = self.read_flag(FLAG_SILENT_MODE)?;
        let turbo = self.read_flag(FLAG_TURBO_MODE)?;
        Ok(derive_mode(silent, turbo).profile())
    }

    /// Write a 3-way profile back as the two boolean flags.
    pub fn write_profile(&self, profile: Profile) -> Result<()> {
        let (silent, turbo) = match profile {
            Profile::EnergySaver => (1, 0),
            Profile::Balanced => (0, 0),
            Profile::Performance => (0, 1),
        };
        self.write_flag(FLAG_SILENT_MODE, silent)?;
        self.write_flag(FLAG_TURBO_MODE, turbo)
    }
}
