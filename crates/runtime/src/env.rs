use academy_common::{env_or, EnvVars};

pub const DEFAULT_CATALOG_PATH: &str = "cards.csv";
pub const DEFAULT_EXPORT_DIR: &str = "抽卡紀錄";

/// Where the draw runtime finds its catalog, config, and export directory.
pub struct RuntimeEnv {
    pub catalog_path: String,
    pub export_dir: String,
    /// Optional JSON `DrawConfig`; empty means the weighted preset.
    pub draw_config_path: String,
}

impl EnvVars for RuntimeEnv {
    fn load() -> Self {
        Self {
            catalog_path: env_or("CATALOG_PATH", DEFAULT_CATALOG_PATH),
            export_dir: env_or("EXPORT_DIR", DEFAULT_EXPORT_DIR),
            draw_config_path: env_or("DRAW_CONFIG_PATH", ""),
        }
    }

    fn get_env_var(&self, key: &str) -> String {
        match key {
            "CATALOG_PATH" => self.catalog_path.clone(),
            "EXPORT_DIR" => self.export_dir.clone(),
            "DRAW_CONFIG_PATH" => self.draw_config_path.clone(),
            _ => panic!("{} is not set", key),
        }
    }
}
