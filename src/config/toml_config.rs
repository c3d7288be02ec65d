use crate::adapters::airtable::{AirtableSettings, AirtableTables};
use crate::adapters::dodo::DodoSettings;
use crate::adapters::firestore::{FirestoreCollections, FirestoreSettings};
use crate::core::creation::CreationSettings;
use crate::core::packages::PackageOrderPlan;
use crate::core::sweep::{SweepSettings, DEFAULT_CANCEL_REASON};
use crate::domain::model::TimeOfDay;
use crate::domain::policy::{IdentifierOrder, WaitingPolicy};
use crate::utils::error::{DispatchError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_range, validate_required_field, validate_secret,
    validate_url, Validate,
};
use regex::Regex;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_FIRESTORE_URL: &str = "https://firestore.googleapis.com/v1";
pub const DEFAULT_AIRTABLE_VIEW: &str = "Grid view";
pub const DEFAULT_COURIER_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_CONFIRM_WINDOW_MINUTES: i64 = 35;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Airtable,
    Firestore,
}

impl FromStr for StoreBackend {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "airtable" => Ok(StoreBackend::Airtable),
            "firestore" | "firebase" => Ok(StoreBackend::Firestore),
            other => Err(DispatchError::InvalidConfigValueError {
                field: "store.backend".to_string(),
                value: other.to_string(),
                reason: "Valid backends: airtable, firestore".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    pub store: StoreConfig,
    pub courier: CourierConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
    #[serde(default)]
    pub creation: CreationConfig,
    #[serde(default)]
    pub packages: PackagesConfig,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    pub api_key: String,
    /// Airtable: `https://api.airtable.com/v0/<base id>`. Firestore: REST root.
    pub base_url: Option<String>,
    pub project_id: Option<String>,
    pub database: Option<String>,
    pub view: Option<String>,
    pub tables: Option<TableNames>,
}

/// Airtable tables or Firestore collections, depending on the backend.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TableNames {
    pub donors: Option<String>,
    pub charities: Option<String>,
    pub orders: Option<String>,
    pub offers: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CourierConfig {
    pub oauth_uri: String,
    pub scope: String,
    pub client_id: String,
    pub client_secret: String,
    pub orders_api: String,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SweepConfig {
    pub confirm_window_minutes: Option<i64>,
    pub waiting_policy: Option<WaitingPolicy>,
    pub cancel_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreationConfig {
    pub days_ahead: Option<u32>,
    pub identifier_order: Option<IdentifierOrder>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackagesConfig {
    pub days_ahead: Option<u32>,
    pub pickup_from: Option<TimeOfDay>,
    pub pickup_to: Option<TimeOfDay>,
    pub deliver_from: Option<TimeOfDay>,
    pub deliver_to: Option<TimeOfDay>,
    pub pickup_note: Option<String>,
    pub deliver_note: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
}

fn pick(name: &Option<String>, default: String) -> String {
    name.clone().unwrap_or(default)
}

impl StoreConfig {
    pub fn airtable_settings(&self) -> Result<AirtableSettings> {
        let base_url = validate_required_field("store.base_url", &self.base_url)?;
        let defaults = AirtableTables::default();
        let tables = self.tables.clone().unwrap_or_default();

        Ok(AirtableSettings {
            base_url: base_url.clone(),
            api_key: self.api_key.clone(),
            view: self
                .view
                .clone()
                .unwrap_or_else(|| DEFAULT_AIRTABLE_VIEW.to_string()),
            tables: AirtableTables {
                donors: pick(&tables.donors, defaults.donors),
                charities: pick(&tables.charities, defaults.charities),
                orders: pick(&tables.orders, defaults.orders),
                offers: pick(&tables.offers, defaults.offers),
            },
        })
    }

    pub fn firestore_settings(&self) -> Result<FirestoreSettings> {
        let project_id = validate_required_field("store.project_id", &self.project_id)?;
        let defaults = FirestoreCollections::default();
        let tables = self.tables.clone().unwrap_or_default();

        Ok(FirestoreSettings {
            base_url: self
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_FIRESTORE_URL.to_string()),
            project_id: project_id.clone(),
            database: self
                .database
                .clone()
                .unwrap_or_else(|| "(default)".to_string()),
            api_key: self.api_key.clone(),
            collections: FirestoreCollections {
                donors: pick(&tables.donors, defaults.donors),
                charities: pick(&tables.charities, defaults.charities),
                orders: pick(&tables.orders, defaults.orders),
                offers: pick(&tables.offers, defaults.offers),
            },
        })
    }
}

impl CourierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(
            self.timeout_seconds
                .unwrap_or(DEFAULT_COURIER_TIMEOUT_SECONDS),
        )
    }

    pub fn dodo_settings(&self) -> DodoSettings {
        DodoSettings {
            oauth_uri: self.oauth_uri.clone(),
            scope: self.scope.clone(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            orders_api: self.orders_api.clone(),
            timeout: self.timeout(),
        }
    }
}

impl DispatchConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| DispatchError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${DODO_CLIENT_SECRET})
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| DispatchError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        // 找不到的變數保留原樣，交給驗證階段回報
        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 沒有設定檔時，直接讀取部署環境的變數
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| DispatchError::MissingConfigError {
                    field: name.to_string(),
                })
        };

        let backend = match lookup("STORE_BACKEND") {
            Some(value) => value.parse()?,
            None => StoreBackend::default(),
        };

        let store = match backend {
            StoreBackend::Airtable => StoreConfig {
                backend,
                api_key: required("AIRTABLE_API_KEY")?,
                base_url: Some(required("AIRTABLE_BASE_URL")?),
                project_id: None,
                database: None,
                view: None,
                tables: None,
            },
            StoreBackend::Firestore => StoreConfig {
                backend,
                api_key: required("FIREBASE_API_KEY")?,
                base_url: None,
                project_id: Some(required("FIREBASE_PROJECT_ID")?),
                database: None,
                view: None,
                tables: None,
            },
        };

        let courier = CourierConfig {
            oauth_uri: required("DODO_OAUTH_URI")?,
            scope: required("DODO_SCOPE")?,
            client_id: required("DODO_CLIENT_ID")?,
            client_secret: required("DODO_CLIENT_SECRET")?,
            orders_api: required("DODO_ORDERS_API")?,
            timeout_seconds: None,
        };

        Ok(Self {
            store,
            courier,
            sweep: SweepConfig {
                confirm_window_minutes: parse_optional("CONFIRM_WINDOW_MINUTES", lookup("CONFIRM_WINDOW_MINUTES"))?,
                ..SweepConfig::default()
            },
            creation: CreationConfig {
                days_ahead: parse_optional("DAYS_AHEAD", lookup("DAYS_AHEAD"))?,
                ..CreationConfig::default()
            },
            packages: PackagesConfig::default(),
            monitoring: None,
        })
    }

    /// 命令列參數優先於設定檔
    pub fn apply_overrides(&mut self, confirm_window_minutes: Option<i64>, days_ahead: Option<u32>) {
        if confirm_window_minutes.is_some() {
            self.sweep.confirm_window_minutes = confirm_window_minutes;
        }
        if days_ahead.is_some() {
            self.creation.days_ahead = days_ahead;
        }
    }

    pub fn confirm_window_minutes(&self) -> i64 {
        self.sweep
            .confirm_window_minutes
            .unwrap_or(DEFAULT_CONFIRM_WINDOW_MINUTES)
    }

    pub fn sweep_settings(&self, dry_run: bool) -> SweepSettings {
        SweepSettings {
            confirm_window: chrono::Duration::minutes(self.confirm_window_minutes()),
            waiting_policy: self.sweep.waiting_policy.unwrap_or_default(),
            cancel_reason: self
                .sweep
                .cancel_reason
                .clone()
                .unwrap_or_else(|| DEFAULT_CANCEL_REASON.to_string()),
            dry_run,
        }
    }

    pub fn creation_settings(&self, dry_run: bool) -> CreationSettings {
        let defaults = CreationSettings::default();
        CreationSettings {
            days_ahead: self.creation.days_ahead.unwrap_or(defaults.days_ahead),
            identifier_order: self.creation.identifier_order.unwrap_or_default(),
            dry_run,
        }
    }

    pub fn package_plan(&self) -> PackageOrderPlan {
        let defaults = PackageOrderPlan::default();
        let packages = &self.packages;
        PackageOrderPlan {
            days_ahead: packages.days_ahead.unwrap_or(defaults.days_ahead),
            pickup_from: packages.pickup_from.unwrap_or(defaults.pickup_from),
            pickup_to: packages.pickup_to.unwrap_or(defaults.pickup_to),
            deliver_from: packages.deliver_from.unwrap_or(defaults.deliver_from),
            deliver_to: packages.deliver_to.unwrap_or(defaults.deliver_to),
            pickup_note: packages.pickup_note.clone().unwrap_or(defaults.pickup_note),
            deliver_note: packages.deliver_note.clone().unwrap_or(defaults.deliver_note),
        }
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validate_secret("store.api_key", &self.store.api_key)?;
        match self.store.backend {
            StoreBackend::Airtable => {
                let settings = self.store.airtable_settings()?;
                validate_url("store.base_url", &settings.base_url)?;
                validate_non_empty_string("store.view", &settings.view)?;
            }
            StoreBackend::Firestore => {
                let settings = self.store.firestore_settings()?;
                validate_url("store.base_url", &settings.base_url)?;
                validate_non_empty_string("store.project_id", &settings.project_id)?;
            }
        }

        validate_url("courier.oauth_uri", &self.courier.oauth_uri)?;
        validate_url("courier.orders_api", &self.courier.orders_api)?;
        validate_non_empty_string("courier.scope", &self.courier.scope)?;
        validate_secret("courier.client_id", &self.courier.client_id)?;
        validate_secret("courier.client_secret", &self.courier.client_secret)?;
        if let Some(timeout) = self.courier.timeout_seconds {
            validate_range("courier.timeout_seconds", timeout, 1, 300)?;
        }

        validate_range(
            "sweep.confirm_window_minutes",
            self.confirm_window_minutes(),
            1,
            24 * 60,
        )?;
        if let Some(days) = self.creation.days_ahead {
            validate_range("creation.days_ahead", days, 0, 60)?;
        }

        let plan = self.package_plan();
        validate_window("packages.pickup", plan.pickup_from, plan.pickup_to)?;
        validate_window("packages.deliver", plan.deliver_from, plan.deliver_to)?;

        Ok(())
    }
}

fn parse_optional<T: FromStr>(name: &str, value: Option<String>) -> Result<Option<T>> {
    match value {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| DispatchError::InvalidConfigValueError {
                field: name.to_string(),
                value: raw.clone(),
                reason: "Expected a whole number".to_string(),
            }),
    }
}

fn validate_window(field: &str, from: TimeOfDay, to: TimeOfDay) -> Result<()> {
    if from > to {
        return Err(DispatchError::InvalidConfigValueError {
            field: field.to_string(),
            value: format!("{}-{}", from, to),
            reason: "Window must not end before it starts".to_string(),
        });
    }
    Ok(())
}

impl Validate for DispatchConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
