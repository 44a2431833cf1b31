pub mod config;
pub mod mutex;
pub mod nav_mode;
pub mod settings;
pub mod tabs;
pub mod tool;
pub mod toolbar;

pub use config::{ConfigKey, ConfigStore, ConfigTarget, ConfigValue};
pub use mutex::MutexCoordinator;
pub use nav_mode::{NavModeHost, NavModeMediator};
pub use settings::ViewerPreferences;
pub use tabs::{ActivationSource, ExplorerTabs, ViewGroup, ViewId, NO_TAB};
pub use tool::{Tool, ToolGroup, ToolId};
pub use toolbar::{ClickOutcome, Measurement, ToolChange, Toolbar};
