use academy_common::{env_or, EnvVars};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://draw_card.db";

pub struct DatabaseEnv {
    pub database_url: String,
}

impl EnvVars for DatabaseEnv {
    fn load() -> Self {
        Self {
            database_url: env_or("DATABASE_URL", DEFAULT_DATABASE_URL),
        }
    }

    fn get_env_var(&self, key: &str) -> String {
        match key {
            "DATABASE_URL" => self.database_url.clone(),
            _ => panic!("Invalid environment variable: {}", key),
        }
    }
}
